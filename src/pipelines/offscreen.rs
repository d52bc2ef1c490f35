//! Main camera pass into an offscreen colour + depth target.

use cgmath::Matrix4;

use crate::{
    camera::Camera,
    context::{
        Attachment, ClearBuffer, FramebufferId, RenderContext, RenderFormat, TextureId,
        UniformValue,
    },
    light::Light,
    pipelines::{
        shadow::{SHADOW_TEXTURE_UNIT, ShadowMapRenderer},
        skybox::Skybox,
    },
    render::SceneObject,
};

/// What the main pass draws, borrowed from the scene for one frame.
pub struct MainPass<'a> {
    pub objects: &'a [SceneObject],
    pub camera: &'a Camera,
    pub light: &'a Light,
    pub shadows: &'a ShadowMapRenderer,
    pub skybox: Option<&'a Skybox>,
}

#[derive(Copy, Clone, Debug)]
struct FrameTarget {
    color: TextureId,
    depth: TextureId,
    framebuffer: FramebufferId,
    width: u32,
    height: u32,
}

pub struct OffscreenFrameRenderer {
    clear_color: [f32; 4],
    target: Option<FrameTarget>,
}

impl OffscreenFrameRenderer {
    pub fn new(clear_color: [f32; 4]) -> Self {
        Self {
            clear_color,
            target: None,
        }
    }

    /// Allocates the targets at `width`×`height`.
    pub fn init_gl(&mut self, ctx: &mut dyn RenderContext, width: u32, height: u32) {
        let framebuffer = ctx.create_framebuffer();
        self.allocate(ctx, framebuffer, width, height);
    }

    /// Allocates fresh targets at the new size and attaches them to the
    /// existing framebuffer. The old textures are not freed. Does nothing
    /// before [`Self::init_gl`], for an unchanged size or an empty one.
    pub fn resize(&mut self, ctx: &mut dyn RenderContext, width: u32, height: u32) {
        let Some(target) = self.target else {
            return;
        };
        if width == 0 || height == 0 || (target.width, target.height) == (width, height) {
            return;
        }
        self.allocate(ctx, target.framebuffer, width, height);
    }

    fn allocate(
        &mut self,
        ctx: &mut dyn RenderContext,
        framebuffer: FramebufferId,
        width: u32,
        height: u32,
    ) {
        let color = ctx.create_render_texture(RenderFormat::Color, width, height);
        let depth = ctx.create_render_texture(RenderFormat::Depth, width, height);
        let previous = ctx.current_framebuffer();
        ctx.bind_framebuffer(framebuffer);
        ctx.attach_texture(Attachment::Color, color, None);
        ctx.attach_texture(Attachment::Depth, depth, None);
        ctx.bind_framebuffer(previous);
        log::debug!("Created {width}x{height} offscreen frame");
        self.target = Some(FrameTarget {
            color,
            depth,
            framebuffer,
            width,
            height,
        });
    }

    pub fn color_texture(&self) -> Option<TextureId> {
        self.target.map(|target| target.color)
    }

    pub fn depth_texture(&self) -> Option<TextureId> {
        self.target.map(|target| target.depth)
    }

    /// Size the targets were allocated with.
    pub fn size(&self) -> Option<(u32, u32)> {
        self.target.map(|target| (target.width, target.height))
    }

    pub fn render_main_pass(
        &self,
        ctx: &mut dyn RenderContext,
        pass: &MainPass,
        width: u32,
        height: u32,
    ) {
        let Some(target) = self.target else {
            log::warn!("OffscreenFrameRenderer::render_main_pass called before init_gl");
            return;
        };
        ctx.bind_framebuffer(target.framebuffer);
        ctx.viewport(width, height);
        ctx.set_clear_color(self.clear_color);
        ctx.clear(ClearBuffer::Color);
        ctx.clear(ClearBuffer::Depth);

        let aspect = width as f32 / height.max(1) as f32;
        let projection = pass.camera.world_projection(aspect);
        let view = pass.camera.view_transform();
        for object in pass.objects {
            let Some(program) = object.program() else {
                log::warn!("Skipping an object that was never initialised");
                continue;
            };
            ctx.use_program(Some(program.program()));
            set_frame_uniforms(ctx, object, pass, projection, view);
            object.render(ctx, program);
        }

        if let Some(skybox) = pass.skybox {
            skybox.render(ctx, pass.camera, projection);
        }
        ctx.use_program(None);
    }
}

fn set_frame_uniforms(
    ctx: &mut dyn RenderContext,
    object: &SceneObject,
    pass: &MainPass,
    projection: Matrix4<f32>,
    view: Matrix4<f32>,
) {
    let Some(program) = object.program() else {
        return;
    };
    program.set_uniform(ctx, "projection_transform", projection);
    program.set_uniform(ctx, "view_transform", view);
    program.set_uniform(ctx, "light_position", pass.light.position());
    program.set_uniform(ctx, "light_intensity", pass.light.intensity);
    program.set_uniform(
        ctx,
        "shadow_depth_range",
        UniformValue::Vec2(pass.shadows.depth_range()),
    );
    if let (Some(location), Some(cube)) = (
        program.uniform_location("shadow_texture"),
        pass.shadows.shadow_texture(),
    ) {
        ctx.bind_texture(SHADOW_TEXTURE_UNIT, cube);
        ctx.set_uniform(location, UniformValue::Unit(SHADOW_TEXTURE_UNIT));
    }
}

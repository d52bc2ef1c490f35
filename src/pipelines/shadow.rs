//! Omnidirectional shadow map of the point light.
//!
//! The scene is rendered depth-only into the six faces of a depth cube map.
//! The map is cached: [`ShadowMapRenderer::render_shadow_map`] only redraws it
//! while [`Light::needs_shadow_render`] is set and clears the flag once all
//! faces are done.

use std::rc::Rc;

use cgmath::{Deg, Matrix4, Vector3};

use crate::{
    camera::OPENGL_TO_WGPU_MATRIX,
    config::SceneConfig,
    context::{
        Attachment, Capability, ClearBuffer, CubeFace, FramebufferId, RenderContext, TextureId,
    },
    light::Light,
    render::SceneObject,
    shader::{Shader, ShaderCache},
};

pub const SHADOW_PROGRAM: &str = "shadow";
/// Unit the lit program samples the cube map from.
pub const SHADOW_TEXTURE_UNIT: u32 = 0;

/// Orientation of the camera looking out through `face`.
fn face_rotation(face: CubeFace) -> Matrix4<f32> {
    match face {
        CubeFace::PositiveX => Matrix4::from_angle_y(Deg(-90.0)),
        CubeFace::NegativeX => Matrix4::from_angle_y(Deg(90.0)),
        CubeFace::PositiveY => Matrix4::from_angle_x(Deg(90.0)),
        CubeFace::NegativeY => Matrix4::from_angle_x(Deg(-90.0)),
        CubeFace::PositiveZ => Matrix4::from_angle_y(Deg(0.0)),
        CubeFace::NegativeZ => Matrix4::from_angle_y(Deg(180.0)),
    }
}

/// View transform of one cube face as seen from `light`.
///
/// Cube maps are addressed with a left-handed face basis, hence the mirror in
/// Z. Texture rows already run top-down, so no flip in Y is needed.
pub fn face_view_transform(face: CubeFace, light: Vector3<f32>) -> Matrix4<f32> {
    Matrix4::from_nonuniform_scale(1.0, 1.0, -1.0)
        * face_rotation(face)
        * Matrix4::from_translation(-light)
}

/// 90° square frustum covering exactly one face.
pub fn face_projection(near: f32, far: f32) -> Matrix4<f32> {
    OPENGL_TO_WGPU_MATRIX * cgmath::perspective(Deg(90.0), 1.0, near, far)
}

struct ShadowGpu {
    cube: TextureId,
    framebuffer: FramebufferId,
    program: Rc<Shader>,
}

pub struct ShadowMapRenderer {
    size: u32,
    near: f32,
    far: f32,
    gpu: Option<ShadowGpu>,
}

impl ShadowMapRenderer {
    pub fn new(config: &SceneConfig) -> Self {
        Self {
            size: config.shadow_map_size,
            near: config.shadow_near,
            far: config.shadow_far,
            gpu: None,
        }
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    /// `[near, far]` of the face projection, as the lit shader needs it.
    pub fn depth_range(&self) -> [f32; 2] {
        [self.near, self.far]
    }

    pub fn shadow_texture(&self) -> Option<TextureId> {
        self.gpu.as_ref().map(|gpu| gpu.cube)
    }

    pub fn init_gl(&mut self, ctx: &mut dyn RenderContext, shaders: &mut ShaderCache) {
        let cube = ctx.create_shadow_cube_map(self.size);
        let framebuffer = ctx.create_framebuffer();
        let program = shaders.get_shader(ctx, SHADOW_PROGRAM);
        log::debug!("Created {0}x{0} shadow cube map", self.size);
        self.gpu = Some(ShadowGpu {
            cube,
            framebuffer,
            program,
        });
    }

    /// Redraws all six faces if the light moved. Returns whether it did.
    pub fn render_shadow_map(
        &self,
        ctx: &mut dyn RenderContext,
        light: &mut Light,
        objects: &[SceneObject],
    ) -> bool {
        if !light.needs_shadow_render() {
            return false;
        }
        let Some(gpu) = &self.gpu else {
            log::warn!("ShadowMapRenderer::render_shadow_map called before init_gl");
            return false;
        };
        let program = &gpu.program;
        let projection = face_projection(self.near, self.far);
        let culling = ctx.is_enabled(Capability::CullFace);

        ctx.bind_framebuffer(gpu.framebuffer);
        ctx.viewport(self.size, self.size);
        ctx.use_program(Some(program.program()));
        // the face views are mirrored, which flips the winding
        ctx.set_enabled(Capability::CullFace, false);

        for face in CubeFace::ALL {
            ctx.attach_texture(Attachment::Depth, gpu.cube, Some(face));
            ctx.clear(ClearBuffer::Depth);
            program.set_uniform(ctx, "projection_transform", projection);
            program.set_uniform(
                ctx,
                "view_transform",
                face_view_transform(face, light.position()),
            );
            for object in objects {
                object.render(ctx, program);
            }
        }

        ctx.set_enabled(Capability::CullFace, culling);
        ctx.use_program(None);
        light.mark_shadow_rendered();
        log::debug!("Rendered shadow map for light at {:?}", light.position());
        true
    }
}

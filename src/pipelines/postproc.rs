//! Full-screen composite of the offscreen frame into the visible target.

use std::rc::Rc;

use crate::{
    context::{Capability, FramebufferId, RenderContext, TextureId, Topology, UniformValue},
    shader::{Shader, ShaderCache},
};

pub const POSTPROC_PROGRAM: &str = "postproc";
pub const FRAME_TEXTURE_UNIT: u32 = 0;

#[derive(Default)]
pub struct PostProcessCompositor {
    program: Option<Rc<Shader>>,
}

impl PostProcessCompositor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn init_gl(&mut self, ctx: &mut dyn RenderContext, shaders: &mut ShaderCache) {
        self.program = Some(shaders.get_shader(ctx, POSTPROC_PROGRAM));
    }

    /// Draws `color` over the whole of `target`.
    ///
    /// Depth testing is off for the quad and switched back on before
    /// returning.
    pub fn composite(
        &self,
        ctx: &mut dyn RenderContext,
        target: FramebufferId,
        color: TextureId,
        width: u32,
        height: u32,
    ) {
        let Some(program) = &self.program else {
            log::warn!("PostProcessCompositor::composite called before init_gl");
            return;
        };
        ctx.bind_framebuffer(target);
        ctx.viewport(width, height);
        ctx.set_enabled(Capability::DepthTest, false);

        ctx.use_program(Some(program.program()));
        ctx.bind_texture(FRAME_TEXTURE_UNIT, color);
        program.set_uniform(ctx, "frame", UniformValue::Unit(FRAME_TEXTURE_UNIT));
        // the quad's corners come from the vertex index
        ctx.draw_arrays(Topology::TriangleStrip, &[], 0, 4);

        ctx.use_program(None);
        ctx.set_enabled(Capability::DepthTest, true);
    }
}

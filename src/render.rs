//! Renderable scene objects.
//!
//! A [`SceneObject`] pairs a loaded [`SceneAsset`] with the GPU handles it was
//! uploaded to and the program it is lit with. Passes call
//! [`SceneObject::render`] with whichever program they have in use, so the
//! same object feeds both the shadow pass and the main pass.

use std::rc::Rc;

use cgmath::{Deg, Matrix4};

use crate::{
    context::RenderContext,
    data_structures::{asset::SceneAsset, scene_graph::draw_nodes},
    resources::upload::{GpuAsset, upload},
    shader::{Shader, ShaderCache},
};

/// Name of the program objects are lit with.
pub const MAIN_PROGRAM: &str = "main";

/// Root transform of every asset: glTF is Y-up, the world is Z-up.
pub fn asset_root_transform() -> Matrix4<f32> {
    Matrix4::from_angle_x(Deg(90.0))
}

#[derive(Debug)]
pub struct SceneObject {
    asset: SceneAsset,
    gpu: Option<GpuAsset>,
    program: Option<Rc<Shader>>,
}

impl SceneObject {
    pub fn new(asset: SceneAsset) -> Self {
        Self {
            asset,
            gpu: None,
            program: None,
        }
    }

    pub fn asset(&self) -> &SceneAsset {
        &self.asset
    }

    pub fn gpu(&self) -> Option<&GpuAsset> {
        self.gpu.as_ref()
    }

    /// The program set up by [`SceneObject::init_gl`].
    pub fn program(&self) -> Option<&Rc<Shader>> {
        self.program.as_ref()
    }

    /// Uploads the asset and fetches the main program.
    pub fn init_gl(
        &mut self,
        ctx: &mut dyn RenderContext,
        shaders: &mut ShaderCache,
    ) -> anyhow::Result<()> {
        self.program = Some(shaders.get_shader(ctx, MAIN_PROGRAM));
        self.gpu = Some(upload(ctx, &self.asset)?);
        Ok(())
    }

    /// Draws the active scene with `program`, which must already be in use.
    pub fn render(&self, ctx: &mut dyn RenderContext, program: &Shader) {
        let Some(gpu) = &self.gpu else {
            log::warn!("SceneObject::render called before init_gl");
            return;
        };
        draw_nodes(
            ctx,
            &self.asset,
            gpu,
            self.asset.root_nodes(),
            asset_root_transform(),
            program,
        );
    }
}

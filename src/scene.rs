//! Frame orchestration.
//!
//! A [`Scene`] owns everything a frame needs: the objects, camera, light, the
//! shader cache and the three passes. The host constructs it before a GPU
//! context exists, calls [`Scene::init_gl`] once the context is up and then
//! [`Scene::render`] every frame.

use image::RgbaImage;

use crate::{
    camera::Camera,
    config::SceneConfig,
    context::{Capability, RenderContext},
    light::Light,
    pipelines::{
        offscreen::{MainPass, OffscreenFrameRenderer},
        postproc::PostProcessCompositor,
        shadow::ShadowMapRenderer,
        skybox::Skybox,
    },
    render::SceneObject,
    shader::{ShaderCache, ShaderSourceProvider},
};

pub struct Scene {
    pub objects: Vec<SceneObject>,
    pub camera: Camera,
    pub light: Light,
    config: SceneConfig,
    shaders: ShaderCache,
    skybox: Option<Skybox>,
    shadows: ShadowMapRenderer,
    offscreen: OffscreenFrameRenderer,
    compositor: PostProcessCompositor,
    initialized: bool,
}

impl Scene {
    pub fn new(objects: Vec<SceneObject>, camera: Camera, light: Light) -> Self {
        let config = SceneConfig::default();
        Self {
            objects,
            camera,
            light,
            shaders: ShaderCache::default(),
            skybox: None,
            shadows: ShadowMapRenderer::new(&config),
            offscreen: OffscreenFrameRenderer::new(config.clear_color),
            compositor: PostProcessCompositor::new(),
            config,
            initialized: false,
        }
    }

    /// Draws `image`, a 4×3 cube cross, behind the scene.
    pub fn with_skybox(mut self, image: RgbaImage) -> Self {
        self.skybox = Some(Skybox::new(image));
        self
    }

    /// Reads programs from `provider` instead of the built-in ones.
    pub fn with_shader_source(mut self, provider: impl ShaderSourceProvider + 'static) -> Self {
        self.shaders = ShaderCache::new(provider);
        self
    }

    pub fn with_config(mut self, config: SceneConfig) -> Self {
        self.shadows = ShadowMapRenderer::new(&config);
        self.offscreen = OffscreenFrameRenderer::new(config.clear_color);
        self.config = config;
        self
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn shaders(&self) -> &ShaderCache {
        &self.shaders
    }

    pub fn shadows(&self) -> &ShadowMapRenderer {
        &self.shadows
    }

    pub fn offscreen(&self) -> &OffscreenFrameRenderer {
        &self.offscreen
    }

    pub fn skybox(&self) -> Option<&Skybox> {
        self.skybox.as_ref()
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Allocates every GPU resource of the scene. Only the first call does
    /// anything.
    pub fn init_gl(
        &mut self,
        ctx: &mut dyn RenderContext,
        width: u32,
        height: u32,
    ) -> anyhow::Result<()> {
        if self.initialized {
            log::warn!("Scene::init_gl called twice; keeping the existing resources");
            return Ok(());
        }
        ctx.set_enabled(Capability::DepthTest, true);
        ctx.set_enabled(Capability::CullFace, true);
        ctx.set_clear_color(self.config.clear_color);

        for object in &mut self.objects {
            object.init_gl(ctx, &mut self.shaders)?;
        }
        self.shadows.init_gl(ctx, &mut self.shaders);
        self.offscreen.init_gl(ctx, width, height);
        self.compositor.init_gl(ctx, &mut self.shaders);
        if let Some(skybox) = &mut self.skybox {
            skybox.init_gl(ctx, &mut self.shaders)?;
        }
        self.initialized = true;
        log::info!(
            "Scene initialised with {} objects and {} programs",
            self.objects.len(),
            self.shaders.len()
        );
        Ok(())
    }

    /// Reallocates the size dependent targets after the visible target changed
    /// size. The shadow map keeps its configured size.
    pub fn resize(&mut self, ctx: &mut dyn RenderContext, width: u32, height: u32) {
        if !self.initialized {
            return;
        }
        self.offscreen.resize(ctx, width, height);
    }

    /// Renders one frame into whichever framebuffer is bound on entry.
    pub fn render(&mut self, ctx: &mut dyn RenderContext, width: u32, height: u32) {
        if !self.initialized {
            log::warn!("Scene::render called before init_gl");
            return;
        }
        let target = ctx.current_framebuffer();

        self.shadows
            .render_shadow_map(ctx, &mut self.light, &self.objects);

        let pass = MainPass {
            objects: &self.objects,
            camera: &self.camera,
            light: &self.light,
            shadows: &self.shadows,
            skybox: self.skybox.as_ref(),
        };
        self.offscreen.render_main_pass(ctx, &pass, width, height);

        if let Some(color) = self.offscreen.color_texture() {
            self.compositor.composite(ctx, target, color, width, height);
        }
    }
}

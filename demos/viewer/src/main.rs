//! Walk through a glTF scene lit by one shadow-casting point light.
//!
//! Usage: `viewer <scene.gltf|.glb> [skybox-cross.png] [shader-dir]`
//!
//! Click to grab the mouse and look around, Escape to let go. WASD/QE fly
//! the camera, IJKL/UO move the light.

use anyhow::Context;
use shadow_ngin::{
    Camera, Light, Scene, SceneObject,
    cgmath::Deg,
    flow, load_scene_asset,
    resources::load_skybox_image,
    shader::DirectoryShaders,
};

fn main() -> anyhow::Result<()> {
    let mut args = std::env::args().skip(1);
    let scene_path = args
        .next()
        .context("usage: viewer <scene.gltf|.glb> [skybox-cross.png] [shader-dir]")?;
    let skybox_path = args.next();
    let shader_dir = args.next();

    // Loading reads files through tokio; the window loop brings its own runtime.
    let (asset, skybox) = tokio::runtime::Runtime::new()?.block_on(async {
        let asset = load_scene_asset(&scene_path).await?;
        let skybox = match skybox_path {
            Some(path) => Some(load_skybox_image(&path).await?),
            None => None,
        };
        anyhow::Ok((asset, skybox))
    })?;

    let mut scene = Scene::new(
        vec![SceneObject::new(asset)],
        Camera::new((0.0, -5.0, 2.0), Deg(60.0)),
        Light::new((0.0, 0.0, 5.0), 50.0),
    );
    if let Some(image) = skybox {
        scene = scene.with_skybox(image);
    }
    if let Some(dir) = shader_dir {
        scene = scene.with_shader_source(DirectoryShaders::new(dir));
    }

    flow::run(scene)
}

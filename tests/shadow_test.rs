mod common;

use cgmath::{Deg, Vector3};
use common::test_utils::*;
use shadow_ngin::{
    Camera, Light, Scene, SceneConfig, SceneObject,
    context::{Attachment, Capability, CubeFace, RenderContext},
    pipelines::shadow::{SHADOW_PROGRAM, ShadowMapRenderer, face_view_transform},
    shader::ShaderCache,
};

fn scene() -> Scene {
    Scene::new(
        vec![SceneObject::new(triangle_asset())],
        Camera::new((0.0, -5.0, 2.0), Deg(45.0)),
        Light::new((8.0, 11.0, 8.0), 100.0),
    )
}

fn initialised(scene: &mut Scene) -> RecordingContext {
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();
    ctx.take_calls();
    ctx
}

fn shadow_draws(ctx: &RecordingContext) -> usize {
    ctx.draws_with(SHADOW_PROGRAM).len()
}

#[test]
fn should_render_the_shadow_map_once_until_the_light_moves() {
    let mut scene = scene();
    let mut ctx = initialised(&mut scene);
    assert!(scene.light.needs_shadow_render());

    scene.render(&mut ctx, 320, 240);
    assert_eq!(shadow_draws(&ctx), 6);
    assert!(!scene.light.needs_shadow_render());

    ctx.take_calls();
    scene.render(&mut ctx, 320, 240);
    scene.render(&mut ctx, 320, 240);
    assert_eq!(shadow_draws(&ctx), 0);
    assert!(!ctx.draws_with("main").is_empty());
}

#[test]
fn should_rerender_after_the_light_moves() {
    let mut scene = scene();
    let mut ctx = initialised(&mut scene);
    scene.render(&mut ctx, 320, 240);
    ctx.take_calls();

    scene.light.translate(Vector3::new(0.0, 0.0, 1.0));
    assert!(scene.light.needs_shadow_render());
    scene.render(&mut ctx, 320, 240);
    assert_eq!(shadow_draws(&ctx), 6);
    assert!(!scene.light.needs_shadow_render());
}

#[test]
fn should_mark_dirty_on_writes_of_the_same_position() {
    let mut scene = scene();
    let mut ctx = initialised(&mut scene);
    scene.render(&mut ctx, 320, 240);
    ctx.take_calls();

    let position = scene.light.position();
    scene.light.set_position(position);
    scene.render(&mut ctx, 320, 240);
    assert_eq!(shadow_draws(&ctx), 6);
}

fn assert_faces_look_from(ctx: &RecordingContext, light: Vector3<f32>) {
    let draws = ctx.draws_with(SHADOW_PROGRAM);
    assert_eq!(draws.len(), 6);
    for (draw, face) in draws.iter().zip(CubeFace::ALL) {
        assert!(approx_eq(
            draw.mat4("view_transform").unwrap(),
            face_view_transform(face, light)
        ));
    }
}

#[test]
fn should_follow_a_move_between_frames() {
    let start = Vector3::new(8.0, 11.0, 8.0);
    let mut scene = Scene::new(
        vec![SceneObject::new(triangle_asset())],
        Camera::new((0.0, 0.0, 0.0), Deg(45.0)),
        Light::new(start, 100.0),
    );
    let mut ctx = initialised(&mut scene);

    // frame 1: dirty since construction
    scene.render(&mut ctx, 320, 240);
    assert_faces_look_from(&ctx, start);
    ctx.take_calls();

    // frame 2: nothing moved
    scene.render(&mut ctx, 320, 240);
    assert_eq!(shadow_draws(&ctx), 0);
    ctx.take_calls();

    // frame 3: the light moved to the origin
    let origin = Vector3::new(0.0, 0.0, 0.0);
    scene.light.set_position(origin);
    scene.render(&mut ctx, 320, 240);
    assert_faces_look_from(&ctx, origin);
}

#[test]
fn should_cover_every_cube_face_into_the_depth_attachment() {
    let mut scene = scene();
    let mut ctx = initialised(&mut scene);
    scene.render(&mut ctx, 320, 240);

    let cube = scene.shadows().shadow_texture().unwrap();
    let draws = ctx.draws_with(SHADOW_PROGRAM);
    let faces: Vec<_> = draws
        .iter()
        .map(|draw| draw.depth_attachment)
        .collect();
    let expected: Vec<_> = CubeFace::ALL
        .iter()
        .map(|face| Some((cube, Some(*face))))
        .collect();
    assert_eq!(faces, expected);
    assert!(draws.iter().all(|draw| !draw.cull_face && draw.depth_test));

    let attached_faces = ctx
        .calls
        .iter()
        .filter(|call| {
            matches!(call, Call::Attach { attachment: Attachment::Depth, texture, face: Some(_) } if *texture == cube)
        })
        .count();
    assert_eq!(attached_faces, 6);
}

#[test]
fn should_restore_culling_after_the_shadow_pass() {
    let mut ctx = RecordingContext::new();
    let mut shaders = ShaderCache::default();
    let mut object = SceneObject::new(triangle_asset());
    object.init_gl(&mut ctx, &mut shaders).unwrap();
    let mut renderer = ShadowMapRenderer::new(&SceneConfig::default());
    renderer.init_gl(&mut ctx, &mut shaders);
    ctx.set_enabled(Capability::CullFace, true);

    let mut light = Light::new((0.0, 0.0, 3.0), 50.0);
    assert!(renderer.render_shadow_map(&mut ctx, &mut light, std::slice::from_ref(&object)));
    assert!(ctx.is_enabled(Capability::CullFace));
    assert!(!renderer.render_shadow_map(&mut ctx, &mut light, std::slice::from_ref(&object)));
}

#[test]
fn should_keep_the_flag_while_uninitialised() {
    let renderer = ShadowMapRenderer::new(&SceneConfig::default());
    let mut ctx = RecordingContext::new();
    let mut light = Light::new((0.0, 0.0, 3.0), 50.0);
    assert!(!renderer.render_shadow_map(&mut ctx, &mut light, &[]));
    assert!(light.needs_shadow_render());
}

#[test]
fn should_allocate_the_configured_cube_size() {
    let mut scene = scene().with_config(SceneConfig {
        shadow_map_size: 512,
        ..SceneConfig::default()
    });
    let ctx = initialised(&mut scene);
    assert!(ctx.textures.contains(&CreatedTexture::ShadowCube { size: 512 }));
}

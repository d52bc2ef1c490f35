mod common;

use cgmath::{Deg, Matrix4, SquareMatrix};
use common::test_utils::*;
use image::RgbaImage;
use shadow_ngin::{
    Camera, Light, Scene, SceneObject,
    context::{Capability, ClearBuffer, DepthFunc, FramebufferId, RenderContext, Topology},
    pipelines::{
        postproc::POSTPROC_PROGRAM,
        skybox::{SKYBOX_PROGRAM, Skybox},
    },
    shader::ShaderCache,
};

fn scene() -> Scene {
    Scene::new(
        vec![
            SceneObject::new(triangle_asset()),
            SceneObject::new(triangle_asset()),
        ],
        Camera::new((0.0, -5.0, 2.0), Deg(45.0)),
        Light::new((8.0, 11.0, 8.0), 100.0),
    )
}

fn cross_image(face: u32) -> RgbaImage {
    RgbaImage::from_pixel(face * 4, face * 3, image::Rgba([10, 20, 30, 255]))
}

#[test]
fn should_initialise_state_and_resources_once() {
    let mut scene = scene();
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();

    assert!(scene.is_initialized());
    assert!(ctx.is_enabled(Capability::DepthTest));
    assert!(ctx.is_enabled(Capability::CullFace));
    assert!(ctx
        .calls
        .iter()
        .any(|call| matches!(call, Call::SetClearColor(c) if *c == [0.1, 0.1, 0.1, 1.0])));
    assert_eq!(scene.offscreen().size(), Some((320, 240)));
    // main, shadow and postproc; the two objects share main
    assert_eq!(ctx.program_count(), 3);

    let texture_count = ctx.textures.len();
    scene.init_gl(&mut ctx, 640, 480).unwrap();
    assert_eq!(ctx.textures.len(), texture_count);
    assert_eq!(scene.offscreen().size(), Some((320, 240)));
}

#[test]
fn should_do_nothing_before_init() {
    let mut scene = scene();
    let mut ctx = RecordingContext::new();
    scene.render(&mut ctx, 320, 240);
    assert!(ctx.calls.is_empty());
}

#[test]
fn should_render_shadow_then_main_then_composite() {
    let mut scene = scene();
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();
    ctx.take_calls();

    scene.render(&mut ctx, 320, 240);
    let order: Vec<&str> = ctx
        .draws()
        .iter()
        .map(|draw| draw.program_name.as_str())
        .collect();
    let mut expected = vec!["shadow"; 12];
    expected.extend(["main", "main", POSTPROC_PROGRAM]);
    assert_eq!(order, expected);
}

#[test]
fn should_keep_depth_testing_enabled_around_the_composite() {
    let mut scene = scene();
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();
    ctx.take_calls();

    scene.render(&mut ctx, 320, 240);
    for draw in ctx.draws() {
        let expect_depth = draw.program_name != POSTPROC_PROGRAM;
        assert_eq!(draw.depth_test, expect_depth, "{}", draw.program_name);
    }
    assert!(ctx.is_enabled(Capability::DepthTest));

    // the next frame still starts with depth testing on
    ctx.take_calls();
    scene.render(&mut ctx, 320, 240);
    let main = ctx.draws_with("main");
    assert!(main.iter().all(|draw| draw.depth_test));
}

#[test]
fn should_composite_into_the_framebuffer_bound_on_entry() {
    let mut scene = scene();
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();
    let host_target = ctx.create_framebuffer();
    ctx.bind_framebuffer(host_target);
    ctx.take_calls();

    scene.render(&mut ctx, 320, 240);
    let composite = ctx.draws_with(POSTPROC_PROGRAM);
    assert_eq!(composite.len(), 1);
    assert_eq!(composite[0].framebuffer, host_target);
    assert_eq!(composite[0].topology, Topology::TriangleStrip);
    assert_eq!(composite[0].vertex_count, 4);
    assert_eq!(
        composite[0].units.get(&0),
        scene.offscreen().color_texture().as_ref()
    );

    let main = ctx.draws_with("main");
    assert!(main.iter().all(|draw| draw.framebuffer != host_target));
    assert!(main.iter().all(|draw| draw.framebuffer != FramebufferId::DEFAULT));
}

#[test]
fn should_leave_the_host_binding_alone_during_init() {
    let mut scene = scene();
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();
    assert_eq!(ctx.current_framebuffer(), FramebufferId::DEFAULT);

    scene.render(&mut ctx, 320, 240);
    let composite = ctx.draws_with(POSTPROC_PROGRAM);
    assert_eq!(composite[0].framebuffer, FramebufferId::DEFAULT);
}

#[test]
fn should_reallocate_the_offscreen_frame_on_resize() {
    let mut scene = scene();
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();
    let old_color = scene.offscreen().color_texture();
    let main_framebuffer = {
        scene.render(&mut ctx, 320, 240);
        ctx.draws_with("main")[0].framebuffer
    };
    ctx.take_calls();

    scene.resize(&mut ctx, 640, 480);
    assert_eq!(scene.offscreen().size(), Some((640, 480)));
    assert_ne!(scene.offscreen().color_texture(), old_color);
    let created: Vec<_> = ctx
        .calls
        .iter()
        .filter_map(|call| match call {
            Call::CreateTexture(texture) => Some(texture.clone()),
            _ => None,
        })
        .collect();
    assert_eq!(created.len(), 2);
    assert!(created.iter().all(|texture| matches!(
        texture,
        CreatedTexture::Render { width: 640, height: 480, .. }
    )));
    assert_eq!(ctx.current_framebuffer(), FramebufferId::DEFAULT);

    ctx.take_calls();
    scene.render(&mut ctx, 640, 480);
    assert!(ctx
        .draws_with("main")
        .iter()
        .all(|draw| draw.framebuffer == main_framebuffer));
    assert_eq!(
        ctx.draws_with(POSTPROC_PROGRAM)[0].units.get(&0),
        scene.offscreen().color_texture().as_ref()
    );

    // same size again allocates nothing
    ctx.take_calls();
    scene.resize(&mut ctx, 640, 480);
    assert!(ctx.calls.is_empty());
}

#[test]
fn should_clear_the_offscreen_target_every_frame() {
    let mut scene = scene();
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();
    ctx.take_calls();
    scene.render(&mut ctx, 320, 240);
    scene.render(&mut ctx, 320, 240);

    let color_clears = ctx
        .calls
        .iter()
        .filter(|call| matches!(call, Call::Clear(ClearBuffer::Color)))
        .count();
    assert_eq!(color_clears, 2);
}

#[test]
fn should_feed_the_lit_program_light_and_shadow_inputs() {
    let mut scene = scene();
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();
    ctx.take_calls();
    scene.render(&mut ctx, 320, 240);

    let cube = scene.shadows().shadow_texture().unwrap();
    for draw in ctx.draws_with("main") {
        assert_eq!(
            draw.uniforms.get("light_position"),
            Some(&shadow_ngin::context::UniformValue::Vec3([8.0, 11.0, 8.0]))
        );
        assert_eq!(draw.units.get(&0), Some(&cube));
        assert!(draw.mat4("projection_transform").is_some());
        assert!(draw.mat4("view_transform").is_some());
    }
}

#[test]
fn should_draw_the_skybox_last_with_less_equal() {
    let mut scene = scene().with_skybox(cross_image(8));
    let mut ctx = RecordingContext::new();
    scene.init_gl(&mut ctx, 320, 240).unwrap();
    assert!(ctx.textures.contains(&CreatedTexture::Cube { face_size: (8, 8) }));
    ctx.take_calls();

    scene.render(&mut ctx, 320, 240);
    let draws = ctx.draws();
    let skybox_index = draws
        .iter()
        .position(|draw| draw.program_name == SKYBOX_PROGRAM)
        .unwrap();
    assert_eq!(draws[skybox_index].depth_func, DepthFunc::LessEqual);
    assert_eq!(draws[skybox_index].vertex_count, 36);
    assert_eq!(draws[skybox_index + 1].program_name, POSTPROC_PROGRAM);
    assert!(draws[skybox_index - 1].program_name == "main");

    let view = draws[skybox_index].mat4("view_transform").unwrap();
    assert!(approx_eq(view, scene.camera.rotation_transform()));
    assert!(draws[skybox_index + 1..]
        .iter()
        .all(|draw| draw.depth_func == DepthFunc::Less));
}

#[test]
fn should_restore_the_depth_function_after_the_skybox() {
    let mut skybox = Skybox::new(cross_image(4));
    let mut shaders = ShaderCache::default();
    let mut ctx = RecordingContext::new();
    skybox.init_gl(&mut ctx, &mut shaders).unwrap();
    let camera = Camera::new((0.0, 0.0, 0.0), Deg(60.0));

    ctx.set_depth_func(DepthFunc::Always);
    skybox.render(&mut ctx, &camera, Matrix4::identity());

    assert_eq!(ctx.draws_with(SKYBOX_PROGRAM)[0].depth_func, DepthFunc::LessEqual);
    assert_eq!(ctx.depth_func(), DepthFunc::Always);
}

#[test]
fn should_reject_a_malformed_skybox_image() {
    let mut scene = scene().with_skybox(RgbaImage::new(7, 5));
    let mut ctx = RecordingContext::new();
    assert!(scene.init_gl(&mut ctx, 320, 240).is_err());
}

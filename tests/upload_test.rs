mod common;

use common::test_utils::*;
use shadow_ngin::{
    context::{IndexFormat, VertexComponent},
    data_structures::asset::{
        ComponentType, Dimensions, MagFilter, MinFilter, Sampler, SceneAsset, Target, Wrap,
    },
    resources::upload::upload,
};

/// Gives the first primitive of `asset` a texture coordinate accessor over
/// `bytes`.
fn add_texcoords(asset: &mut SceneAsset, bytes: Vec<u8>, component_type: ComponentType, normalized: bool) {
    let view = push_view(asset, bytes, None, Some(Target::Vertex));
    let accessor = push_accessor(asset, view, 3, component_type, Dimensions::Vec2);
    asset.accessors[accessor].normalized = normalized;
    asset.meshes[0].primitives[0].attributes.texcoord = Some(accessor);
}

#[test]
fn should_create_buffers_only_for_targeted_views() {
    let mut asset = triangle_asset();
    add_textured_material(&mut asset, 2, None);
    let mut ctx = RecordingContext::new();

    let gpu = upload(&mut ctx, &asset).unwrap();

    // positions, normals, indices; the image view has no target
    assert_eq!(ctx.buffers.len(), 3);
    assert_eq!(gpu.buffers.len(), asset.buffer_views.len());
    assert_eq!(gpu.buffers.last(), Some(&None));
    let targets: Vec<Target> = ctx.buffers.iter().map(|(target, _)| *target).collect();
    assert_eq!(targets, [Target::Vertex, Target::Vertex, Target::Index]);
    assert_eq!(ctx.buffers[0].1.len(), 36);
}

#[test]
fn should_upload_full_mip_chains_with_the_declared_sampler() {
    let sampler = Sampler {
        mag_filter: Some(MagFilter::Nearest),
        min_filter: Some(MinFilter::LinearMipmapLinear),
        wrap_s: Wrap::ClampToEdge,
        wrap_t: Wrap::MirroredRepeat,
    };
    let mut asset = SceneAsset::default();
    add_textured_material(&mut asset, 8, Some(sampler));
    add_textured_material(&mut asset, 1, None);
    let mut ctx = RecordingContext::new();

    let gpu = upload(&mut ctx, &asset).unwrap();
    assert_eq!(gpu.textures.len(), 2);
    assert_eq!(
        ctx.textures[0],
        CreatedTexture::Texture2d {
            levels: vec![(8, 8), (4, 4), (2, 2), (1, 1)],
            sampler,
        }
    );
    assert_eq!(
        ctx.textures[1],
        CreatedTexture::Texture2d {
            levels: vec![(1, 1)],
            sampler: Sampler::default(),
        }
    );
}

#[test]
fn should_resolve_primitive_bindings() {
    let asset = triangle_asset();
    let mut ctx = RecordingContext::new();
    let gpu = upload(&mut ctx, &asset).unwrap();

    let primitive = &gpu.meshes[0][0];
    assert_eq!(primitive.position.stride, 0);
    assert_eq!(primitive.normal.stride, 12);
    assert_eq!(primitive.texcoord, None);
    assert_eq!(primitive.index.count, 3);
    assert_eq!(primitive.material, Some(0));
}

#[test]
fn should_drop_primitives_reading_untargeted_views() {
    let mut asset = triangle_asset();
    let index_view = asset.accessors[asset.meshes[0].primitives[0].indices]
        .buffer_view
        .unwrap();
    asset.buffer_views[index_view].target = None;
    let mut ctx = RecordingContext::new();

    let gpu = upload(&mut ctx, &asset).unwrap();
    assert!(gpu.meshes[0].is_empty());
}

#[test]
fn should_fail_on_undecodable_images() {
    let mut asset = SceneAsset::default();
    add_textured_material(&mut asset, 2, None);
    let view = asset.buffer_views.len() - 1;
    let buffer = asset.buffer_views[view].buffer;
    asset.buffers[buffer] = vec![1, 2, 3, 4];
    asset.buffer_views[view].byte_length = 4;
    let mut ctx = RecordingContext::new();

    assert!(upload(&mut ctx, &asset).is_err());
}

#[test]
fn should_fail_on_views_outside_their_buffer() {
    let mut asset = triangle_asset();
    asset.buffer_views[0].byte_length = 1024;
    let mut ctx = RecordingContext::new();

    assert!(upload(&mut ctx, &asset).is_err());
}

#[test]
fn should_widen_byte_indices() {
    let mut asset = triangle_asset();
    let view = push_view(&mut asset, vec![2, 1, 0, 0], None, Some(Target::Index));
    let accessor = push_accessor(&mut asset, view, 3, ComponentType::U8, Dimensions::Scalar);
    asset.meshes[0].primitives[0].indices = accessor;
    let mut ctx = RecordingContext::new();

    let gpu = upload(&mut ctx, &asset).unwrap();

    let index = gpu.meshes[0][0].index;
    assert_eq!(index.format, IndexFormat::U16);
    assert_eq!(index.offset, 0);
    assert_eq!(index.count, 3);
    let (target, bytes) = &ctx.buffers[index.buffer.0 as usize];
    assert_eq!(*target, Target::Index);
    let widened: Vec<u16> = bytes
        .chunks_exact(2)
        .map(|pair| u16::from_ne_bytes([pair[0], pair[1]]))
        .collect();
    assert_eq!(widened, [2, 1, 0]);
}

#[test]
fn should_read_normalized_texcoords_as_unorm() {
    let mut bytes_asset = triangle_asset();
    add_texcoords(&mut bytes_asset, vec![0, 0, 255, 0, 0, 255], ComponentType::U8, true);
    let mut ctx = RecordingContext::new();
    let gpu = upload(&mut ctx, &bytes_asset).unwrap();
    let texcoord = gpu.meshes[0][0].texcoord.unwrap();
    assert_eq!(texcoord.component, VertexComponent::Unorm8);
    assert_eq!(gpu.meshes[0][0].position.component, VertexComponent::F32);

    let mut shorts_asset = triangle_asset();
    let shorts: [u16; 6] = [0, 0, 65535, 0, 0, 65535];
    add_texcoords(&mut shorts_asset, bytemuck::cast_slice(&shorts).to_vec(), ComponentType::U16, true);
    let mut ctx = RecordingContext::new();
    let gpu = upload(&mut ctx, &shorts_asset).unwrap();
    assert_eq!(gpu.meshes[0][0].texcoord.unwrap().component, VertexComponent::Unorm16);
}

#[test]
fn should_drop_primitives_with_unnormalized_integer_texcoords() {
    let mut asset = triangle_asset();
    add_texcoords(&mut asset, vec![0, 0, 1, 0, 0, 1], ComponentType::U8, false);
    let mut ctx = RecordingContext::new();

    let gpu = upload(&mut ctx, &asset).unwrap();
    assert!(gpu.meshes[0].is_empty());
}

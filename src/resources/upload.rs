//! One-time upload of a [`SceneAsset`] to the GPU.
//!
//! Buffer views become GPU buffers, textures become mipmapped 2D textures and
//! every primitive gets its draw bindings resolved up front so that drawing a
//! frame never walks accessors again. Nothing uploaded here is ever freed.

use anyhow::Context;

use crate::{
    context::{
        BufferId, IndexBinding, IndexFormat, RenderContext, TextureId, VertexBinding,
        VertexComponent,
    },
    data_structures::asset::{ComponentType, ImageData, Primitive, SceneAsset, Target},
    resources::texture::{decode_rgba, mip_chain},
};

/// Draw bindings of one primitive.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveDraw {
    pub position: VertexBinding,
    pub normal: VertexBinding,
    pub texcoord: Option<VertexBinding>,
    pub index: IndexBinding,
    pub material: Option<usize>,
}

/// GPU handles of an uploaded asset, indexed like the asset's own tables.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GpuAsset {
    /// One entry per buffer view; views without a declared target get none.
    pub buffers: Vec<Option<BufferId>>,
    pub textures: Vec<TextureId>,
    /// Per mesh, the primitives that could be resolved.
    pub meshes: Vec<Vec<PrimitiveDraw>>,
}

pub fn upload(ctx: &mut dyn RenderContext, asset: &SceneAsset) -> anyhow::Result<GpuAsset> {
    let mut buffers = Vec::with_capacity(asset.buffer_views.len());
    for (index, view) in asset.buffer_views.iter().enumerate() {
        let buffer = match view.target {
            Some(target) => {
                let bytes = asset
                    .view_bytes(index)
                    .with_context(|| format!("buffer view {index} lies outside its buffer"))?;
                Some(ctx.create_buffer(target, bytes))
            }
            None => None,
        };
        buffers.push(buffer);
    }

    let mut textures = Vec::with_capacity(asset.textures.len());
    for (index, texture) in asset.textures.iter().enumerate() {
        let image = asset
            .images
            .get(texture.source)
            .with_context(|| format!("texture {index} references a missing image"))?;
        let (bytes, mime_type) = match &image.data {
            ImageData::View {
                buffer_view,
                mime_type,
            } => (
                asset
                    .view_bytes(*buffer_view)
                    .with_context(|| format!("image of texture {index} lies outside its buffer"))?,
                mime_type.as_deref(),
            ),
            ImageData::Encoded(bytes) => (bytes.as_slice(), None),
        };
        let decoded = decode_rgba(bytes, mime_type)
            .with_context(|| format!("failed to decode the image of texture {index}"))?;
        let sampler = texture
            .sampler
            .and_then(|sampler| asset.samplers.get(sampler).copied())
            .unwrap_or_default();
        textures.push(ctx.create_texture_2d(&mip_chain(decoded), &sampler));
    }

    let mut meshes = Vec::with_capacity(asset.meshes.len());
    for (mesh_index, mesh) in asset.meshes.iter().enumerate() {
        let mut draws = Vec::with_capacity(mesh.primitives.len());
        for (primitive_index, primitive) in mesh.primitives.iter().enumerate() {
            match resolve_primitive(ctx, asset, &buffers, primitive) {
                Some(draw) => draws.push(draw),
                None => log::warn!(
                    "Primitive {primitive_index} of mesh {mesh_index} cannot be bound and will not be drawn"
                ),
            }
        }
        meshes.push(draws);
    }

    log::debug!(
        "Uploaded {} buffers and {} textures",
        buffers.iter().flatten().count(),
        textures.len()
    );
    Ok(GpuAsset {
        buffers,
        textures,
        meshes,
    })
}

fn resolve_primitive(
    ctx: &mut dyn RenderContext,
    asset: &SceneAsset,
    buffers: &[Option<BufferId>],
    primitive: &Primitive,
) -> Option<PrimitiveDraw> {
    let texcoord = match primitive.attributes.texcoord {
        Some(accessor) => Some(vertex_binding(asset, buffers, accessor)?),
        None => None,
    };
    Some(PrimitiveDraw {
        position: vertex_binding(asset, buffers, primitive.attributes.position)?,
        normal: vertex_binding(asset, buffers, primitive.attributes.normal)?,
        texcoord,
        index: index_binding(ctx, asset, buffers, primitive.indices)?,
        material: primitive.material,
    })
}

fn vertex_binding(
    asset: &SceneAsset,
    buffers: &[Option<BufferId>],
    accessor: usize,
) -> Option<VertexBinding> {
    let accessor = asset.accessors.get(accessor)?;
    let component = match (accessor.component_type, accessor.normalized) {
        (ComponentType::F32, _) => VertexComponent::F32,
        (ComponentType::U8, true) => VertexComponent::Unorm8,
        (ComponentType::U16, true) => VertexComponent::Unorm16,
        (other, normalized) => {
            log::warn!("Unsupported vertex component type {other:?} (normalized: {normalized})");
            return None;
        }
    };
    let view_index = accessor.buffer_view?;
    let view = asset.buffer_views.get(view_index)?;
    Some(VertexBinding {
        buffer: (*buffers.get(view_index)?)?,
        offset: accessor.byte_offset as u64,
        stride: view.byte_stride.unwrap_or(0) as u64,
        component,
    })
}

fn index_binding(
    ctx: &mut dyn RenderContext,
    asset: &SceneAsset,
    buffers: &[Option<BufferId>],
    accessor: usize,
) -> Option<IndexBinding> {
    let accessor = asset.accessors.get(accessor)?;
    let view_index = accessor.buffer_view?;
    let buffer = (*buffers.get(view_index)?)?;
    let (buffer, offset, format) = match accessor.component_type {
        ComponentType::U16 => (buffer, accessor.byte_offset as u64, IndexFormat::U16),
        ComponentType::U32 => (buffer, accessor.byte_offset as u64, IndexFormat::U32),
        // no 8 bit index format on the GPU
        ComponentType::U8 => {
            let bytes = asset
                .view_bytes(view_index)?
                .get(accessor.byte_offset..accessor.byte_offset.checked_add(accessor.count)?)?;
            let widened: Vec<u16> = bytes.iter().map(|&index| u16::from(index)).collect();
            let buffer = ctx.create_buffer(Target::Index, bytemuck::cast_slice(&widened));
            (buffer, 0, IndexFormat::U16)
        }
        other => {
            log::warn!("Unsupported index component type {other:?}");
            return None;
        }
    };
    Some(IndexBinding {
        buffer,
        offset,
        count: accessor.count as u32,
        format,
    })
}

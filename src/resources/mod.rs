//! Loading scene assets and images from disk, and uploading them to the GPU.
//!
//! [`load_scene_asset`] resolves a `.gltf`/`.glb` document into the plain
//! [`SceneAsset`] tables; external buffers and images are read relative to the
//! document. [`upload::upload`] turns the tables into GPU handles.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use cgmath::Matrix4;

use crate::data_structures::asset::{
    Accessor, BufferView, ComponentType, Dimensions, Image, ImageData, Material, MaterialKind,
    Mesh, Node, Primitive, PrimitiveAttributes, Sampler, Scene, SceneAsset, Target, Texture,
};

pub mod texture;
pub mod upload;

/// Reads a whole file. Must run inside a tokio runtime.
pub async fn load_binary(path: &Path) -> anyhow::Result<Vec<u8>> {
    #[cfg(not(target_arch = "wasm32"))]
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    #[cfg(target_arch = "wasm32")]
    let data = bail!("cannot read {} without a filesystem", path.display());
    Ok(data)
}

fn resolve_uri(base: &Path, uri: &str) -> anyhow::Result<PathBuf> {
    if uri.starts_with("data:") {
        bail!("embedded data URIs are not supported, convert the asset to .glb");
    }
    Ok(base.join(uri))
}

/// Reads a glTF document and everything it references.
pub async fn load_scene_asset(path: impl AsRef<Path>) -> anyhow::Result<SceneAsset> {
    let path = path.as_ref();
    let base = path.parent().unwrap_or(Path::new("."));
    let bytes = load_binary(path).await?;
    let gltf = gltf::Gltf::from_slice(&bytes)
        .with_context(|| format!("{} is not a valid glTF document", path.display()))?;

    let mut buffers = Vec::new();
    for buffer in gltf.buffers() {
        let data = match buffer.source() {
            gltf::buffer::Source::Bin => gltf
                .blob
                .clone()
                .context("the document references a missing GLB binary chunk")?,
            gltf::buffer::Source::Uri(uri) => load_binary(&resolve_uri(base, uri)?).await?,
        };
        buffers.push(data);
    }

    let buffer_views = gltf
        .views()
        .map(|view| BufferView {
            buffer: view.buffer().index(),
            byte_offset: view.offset(),
            byte_length: view.length(),
            byte_stride: view.stride(),
            target: view.target().map(|target| match target {
                gltf::buffer::Target::ArrayBuffer => Target::Vertex,
                gltf::buffer::Target::ElementArrayBuffer => Target::Index,
            }),
        })
        .collect();

    let accessors = gltf
        .accessors()
        .map(|accessor| Accessor {
            buffer_view: accessor.view().map(|view| view.index()),
            byte_offset: accessor.offset(),
            count: accessor.count(),
            normalized: accessor.normalized(),
            component_type: match accessor.data_type() {
                gltf::accessor::DataType::I8 => ComponentType::I8,
                gltf::accessor::DataType::U8 => ComponentType::U8,
                gltf::accessor::DataType::I16 => ComponentType::I16,
                gltf::accessor::DataType::U16 => ComponentType::U16,
                gltf::accessor::DataType::U32 => ComponentType::U32,
                gltf::accessor::DataType::F32 => ComponentType::F32,
            },
            dimensions: match accessor.dimensions() {
                gltf::accessor::Dimensions::Scalar => Dimensions::Scalar,
                gltf::accessor::Dimensions::Vec2 => Dimensions::Vec2,
                gltf::accessor::Dimensions::Vec3 => Dimensions::Vec3,
                gltf::accessor::Dimensions::Vec4 => Dimensions::Vec4,
                gltf::accessor::Dimensions::Mat2 => Dimensions::Mat2,
                gltf::accessor::Dimensions::Mat3 => Dimensions::Mat3,
                gltf::accessor::Dimensions::Mat4 => Dimensions::Mat4,
            },
        })
        .collect();

    let meshes = gltf
        .meshes()
        .map(|mesh| Mesh {
            name: mesh.name().map(str::to_string),
            primitives: mesh
                .primitives()
                .filter_map(|primitive| load_primitive(&mesh, &primitive))
                .collect(),
        })
        .collect();

    let materials = gltf
        .materials()
        .map(|material| {
            let pbr = material.pbr_metallic_roughness();
            let kind = match pbr.base_color_texture() {
                Some(info) => MaterialKind::Textured {
                    texture: info.texture().index(),
                },
                None => MaterialKind::Flat(pbr.base_color_factor()),
            };
            Material {
                name: material.name().map(str::to_string),
                kind,
            }
        })
        .collect();

    let textures = gltf
        .textures()
        .map(|texture| Texture {
            source: texture.source().index(),
            sampler: texture.sampler().index(),
        })
        .collect();

    let mut images = Vec::new();
    for image in gltf.images() {
        let data = match image.source() {
            gltf::image::Source::View { view, mime_type } => ImageData::View {
                buffer_view: view.index(),
                mime_type: Some(mime_type.to_string()),
            },
            gltf::image::Source::Uri { uri, .. } => {
                ImageData::Encoded(load_binary(&resolve_uri(base, uri)?).await?)
            }
        };
        images.push(Image {
            name: image.name().map(str::to_string),
            data,
        });
    }

    let samplers = gltf
        .samplers()
        .map(|sampler| {
            Sampler::from_gl(
                sampler.mag_filter().map(|filter| filter.as_gl_enum()),
                sampler.min_filter().map(|filter| filter.as_gl_enum()),
                sampler.wrap_s().as_gl_enum(),
                sampler.wrap_t().as_gl_enum(),
            )
        })
        .collect();

    let nodes = gltf
        .nodes()
        .map(|node| Node {
            name: node.name().map(str::to_string),
            matrix: local_matrix(node.transform()),
            children: node.children().map(|child| child.index()).collect(),
            mesh: node.mesh().map(|mesh| mesh.index()),
        })
        .collect();

    let scenes = gltf
        .scenes()
        .map(|scene| Scene {
            name: scene.name().map(str::to_string),
            nodes: scene.nodes().map(|node| node.index()).collect(),
        })
        .collect();

    let asset = SceneAsset {
        buffers,
        buffer_views,
        accessors,
        meshes,
        materials,
        textures,
        images,
        samplers,
        nodes,
        scenes,
        scene: gltf.default_scene().map(|scene| scene.index()),
    };
    log::info!(
        "Loaded {} ({} nodes, {} meshes, {} textures)",
        path.display(),
        asset.nodes.len(),
        asset.meshes.len(),
        asset.textures.len()
    );
    Ok(asset)
}

fn load_primitive(mesh: &gltf::Mesh, primitive: &gltf::Primitive) -> Option<Primitive> {
    let mesh_name = mesh.name().unwrap_or("unnamed");
    if primitive.mode() != gltf::mesh::Mode::Triangles {
        log::warn!(
            "Skipping primitive {} of mesh `{mesh_name}`: only triangle lists are drawn",
            primitive.index()
        );
        return None;
    }
    let position = primitive.get(&gltf::Semantic::Positions);
    let normal = primitive.get(&gltf::Semantic::Normals);
    let indices = primitive.indices();
    let (Some(position), Some(normal), Some(indices)) = (position, normal, indices) else {
        log::warn!(
            "Skipping primitive {} of mesh `{mesh_name}`: positions, normals and indices are required",
            primitive.index()
        );
        return None;
    };
    Some(Primitive {
        attributes: PrimitiveAttributes {
            position: position.index(),
            normal: normal.index(),
            texcoord: primitive
                .get(&gltf::Semantic::TexCoords(0))
                .map(|accessor| accessor.index()),
        },
        indices: indices.index(),
        material: primitive.material().index(),
    })
}

/// `None` for an absent or identity TRS so the walker composes identity.
fn local_matrix(transform: gltf::scene::Transform) -> Option<Matrix4<f32>> {
    match transform {
        gltf::scene::Transform::Matrix { matrix } => Some(matrix.into()),
        gltf::scene::Transform::Decomposed {
            translation,
            rotation,
            scale,
        } => {
            if translation == [0.0; 3] && rotation == [0.0, 0.0, 0.0, 1.0] && scale == [1.0; 3] {
                return None;
            }
            let decomposed = gltf::scene::Transform::Decomposed {
                translation,
                rotation,
                scale,
            };
            Some(decomposed.matrix().into())
        }
    }
}

/// Decodes the skybox cross image.
pub async fn load_skybox_image(path: impl AsRef<Path>) -> anyhow::Result<image::RgbaImage> {
    let path = path.as_ref();
    let bytes = load_binary(path).await?;
    texture::decode_rgba(&bytes, None).with_context(|| format!("failed to decode {}", path.display()))
}

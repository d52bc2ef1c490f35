//! Scene graph traversal.
//!
//! Walks the node forest of a [`SceneAsset`] and issues one draw per
//! primitive. World transforms are composed top-down: a node's world
//! transform is `inherited * local` (identity when the node declares no
//! matrix) and its children inherit that composed transform.

use cgmath::{Matrix4, SquareMatrix};

use crate::{
    context::{AttributeBinding, RenderContext, UniformValue},
    data_structures::asset::{Material, MaterialKind, SceneAsset},
    resources::upload::{GpuAsset, PrimitiveDraw},
    shader::Shader,
};

/// Texture unit of a textured material's base colour.
pub const COLOR_TEXTURE_UNIT: u32 = 1;

/// Deepest node nesting that is still drawn. glTF forbids cycles but nothing
/// below the loader checks, so a malformed graph stops here instead of
/// recursing forever.
pub const MAX_NODE_DEPTH: usize = 256;

/// Attribute locations of the program being drawn with.
#[derive(Copy, Clone, Debug)]
struct AttributeLocations {
    position: Option<u32>,
    normal: Option<u32>,
    texcoord: Option<u32>,
}

impl AttributeLocations {
    fn of(program: &Shader) -> Self {
        Self {
            position: program.attribute_location("position"),
            normal: program.attribute_location("normal"),
            texcoord: program.attribute_location("texcoord"),
        }
    }

    /// Bindings for the attributes the program actually reads.
    fn bind(&self, primitive: &PrimitiveDraw) -> Vec<AttributeBinding> {
        let mut bindings = Vec::with_capacity(3);
        if let Some(location) = self.position {
            bindings.push(AttributeBinding {
                location,
                binding: primitive.position,
            });
        }
        if let Some(location) = self.normal {
            bindings.push(AttributeBinding {
                location,
                binding: primitive.normal,
            });
        }
        if let (Some(location), Some(binding)) = (self.texcoord, primitive.texcoord) {
            bindings.push(AttributeBinding { location, binding });
        }
        bindings
    }
}

/// Draws `roots` and their descendants with `program`, which must be in use.
pub fn draw_nodes(
    ctx: &mut dyn RenderContext,
    asset: &SceneAsset,
    gpu: &GpuAsset,
    roots: &[usize],
    transform: Matrix4<f32>,
    program: &Shader,
) {
    let walker = Walker {
        asset,
        gpu,
        program,
        attributes: AttributeLocations::of(program),
    };
    for &root in roots {
        walker.draw_node(ctx, root, transform, 0);
    }
}

struct Walker<'a> {
    asset: &'a SceneAsset,
    gpu: &'a GpuAsset,
    program: &'a Shader,
    attributes: AttributeLocations,
}

impl Walker<'_> {
    fn draw_node(
        &self,
        ctx: &mut dyn RenderContext,
        index: usize,
        inherited: Matrix4<f32>,
        depth: usize,
    ) {
        if depth >= MAX_NODE_DEPTH {
            log::warn!("Node {index} is nested deeper than {MAX_NODE_DEPTH} levels; not drawn");
            return;
        }
        let Some(node) = self.asset.nodes.get(index) else {
            log::warn!("Scene graph references missing node {index}");
            return;
        };
        let transform = inherited * node.matrix.unwrap_or_else(Matrix4::identity);

        if let Some(mesh) = node.mesh {
            self.draw_mesh(ctx, mesh, transform);
        }
        for &child in &node.children {
            self.draw_node(ctx, child, transform, depth + 1);
        }
    }

    fn draw_mesh(&self, ctx: &mut dyn RenderContext, mesh: usize, transform: Matrix4<f32>) {
        let Some(primitives) = self.gpu.meshes.get(mesh) else {
            return;
        };
        self.program.set_uniform(ctx, "model_transform", transform);

        let default_material = Material::default();
        for primitive in primitives {
            let material = primitive
                .material
                .and_then(|material| self.asset.materials.get(material))
                .unwrap_or(&default_material);
            self.apply_material(ctx, material);
            ctx.draw_elements(&self.attributes.bind(primitive), &primitive.index);
        }
    }

    /// Sets exactly one of the two base colour paths, if the program has it.
    fn apply_material(&self, ctx: &mut dyn RenderContext, material: &Material) {
        match material.kind {
            MaterialKind::Textured { texture } => {
                let Some(location) = self.program.uniform_location("color_texture") else {
                    return;
                };
                let Some(&texture) = self.gpu.textures.get(texture) else {
                    log::warn!("Material references missing texture {texture}");
                    return;
                };
                ctx.bind_texture(COLOR_TEXTURE_UNIT, texture);
                ctx.set_uniform(location, UniformValue::Unit(COLOR_TEXTURE_UNIT));
                self.program
                    .set_uniform(ctx, "has_color_texture", UniformValue::I32(1));
            }
            MaterialKind::Flat(color) => {
                let Some(location) = self.program.uniform_location("base_color") else {
                    return;
                };
                ctx.set_uniform(location, UniformValue::Vec4(color));
                self.program
                    .set_uniform(ctx, "has_color_texture", UniformValue::I32(0));
            }
        }
    }
}

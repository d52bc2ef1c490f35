//! WGSL reflection.
//!
//! Programs follow a fixed binding convention so that names can be resolved
//! to locations the way a linked GL program would:
//!
//! - one uniform block at `@group(0) @binding(0)`, addressed per member by
//!   byte offset
//! - textures at `@group(1) @binding(2 * unit)`, each followed by its sampler
//!   at `@binding(2 * unit + 1)`
//! - vertex inputs of `vs_main` addressed by `@location`

use std::collections::BTreeMap;

use naga::{
    AddressSpace, Binding, ImageClass, ImageDimension, Module, ScalarKind, ShaderStage, TypeInner,
    VectorSize,
};

use crate::context::{UniformLocation, UniformType};

use super::{ShaderError, ShaderSource, Stage};

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UniformField {
    pub name: String,
    pub offset: u32,
    pub ty: UniformType,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Depth2d,
    Cube,
    DepthCube,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextureSlot {
    pub name: String,
    pub unit: u32,
    pub kind: TextureKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum AttributeFormat {
    Float32,
    Float32x2,
    Float32x3,
    Float32x4,
}

impl AttributeFormat {
    pub fn components(self) -> u64 {
        match self {
            AttributeFormat::Float32 => 1,
            AttributeFormat::Float32x2 => 2,
            AttributeFormat::Float32x3 => 3,
            AttributeFormat::Float32x4 => 4,
        }
    }

    pub fn size(self) -> u64 {
        match self {
            AttributeFormat::Float32 => 4,
            AttributeFormat::Float32x2 => 8,
            AttributeFormat::Float32x3 => 12,
            AttributeFormat::Float32x4 => 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VertexAttribute {
    pub name: String,
    pub location: u32,
    pub format: AttributeFormat,
}

/// Everything a backend needs to know about a linked program.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProgramLayout {
    /// Size of the uniform block in bytes; 0 when the program has none.
    pub uniform_block_size: u32,
    pub uniforms: Vec<UniformField>,
    pub textures: Vec<TextureSlot>,
    /// Sorted by location.
    pub attributes: Vec<VertexAttribute>,
}

impl ProgramLayout {
    pub fn uniform(&self, name: &str) -> Option<UniformLocation> {
        if let Some(field) = self.uniforms.iter().find(|field| field.name == name) {
            return Some(UniformLocation::Block {
                offset: field.offset,
                ty: field.ty,
            });
        }
        self.textures
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| UniformLocation::Sampler { unit: slot.unit })
    }

    pub fn attribute(&self, name: &str) -> Option<u32> {
        self.attributes
            .iter()
            .find(|attribute| attribute.name == name)
            .map(|attribute| attribute.location)
    }

    /// Reverse lookup, used for diagnostics.
    pub fn uniform_name(&self, location: UniformLocation) -> Option<&str> {
        match location {
            UniformLocation::Block { offset, .. } => self
                .uniforms
                .iter()
                .find(|field| field.offset == offset)
                .map(|field| field.name.as_str()),
            UniformLocation::Sampler { unit } => self
                .textures
                .iter()
                .find(|slot| slot.unit == unit)
                .map(|slot| slot.name.as_str()),
        }
    }

    pub fn texture(&self, unit: u32) -> Option<&TextureSlot> {
        self.textures.iter().find(|slot| slot.unit == unit)
    }
}

#[derive(Debug, Default)]
struct StageReflection {
    block: Option<(u32, Vec<UniformField>)>,
    textures: Vec<TextureSlot>,
    inputs: Vec<VertexAttribute>,
    outputs: Vec<u32>,
    has_entry: bool,
}

/// Compiles both stages and links them into a [`ProgramLayout`].
pub fn build_program(name: &str, source: &ShaderSource) -> Result<ProgramLayout, ShaderError> {
    let vertex = compile(name, Stage::Vertex, &source.vertex)?;
    let fragment = compile(name, Stage::Fragment, &source.fragment)?;
    let vertex = reflect_stage(name, &vertex, Stage::Vertex)?;
    let fragment = reflect_stage(name, &fragment, Stage::Fragment)?;
    link(name, vertex, fragment)
}

/// Parses and validates one stage.
pub fn compile(name: &str, stage: Stage, source: &str) -> Result<Module, ShaderError> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| ShaderError::Compile {
        name: name.to_string(),
        stage,
        log: e.emit_to_string(source),
    })?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|e| ShaderError::Compile {
        name: name.to_string(),
        stage,
        log: e.to_string(),
    })?;
    Ok(module)
}

fn link_error(name: &str, log: impl Into<String>) -> ShaderError {
    ShaderError::Link {
        name: name.to_string(),
        log: log.into(),
    }
}

fn reflect_stage(name: &str, module: &Module, stage: Stage) -> Result<StageReflection, ShaderError> {
    let mut reflection = StageReflection::default();

    for (_, var) in module.global_variables.iter() {
        let var_name = var.name.clone().unwrap_or_default();
        match var.space {
            AddressSpace::Uniform => {
                let binding = var.binding.as_ref();
                if !matches!(binding, Some(b) if b.group == 0 && b.binding == 0) {
                    return Err(link_error(
                        name,
                        format!("uniform `{var_name}` must be bound at @group(0) @binding(0)"),
                    ));
                }
                let TypeInner::Struct { members, span } = &module.types[var.ty].inner else {
                    return Err(link_error(name, format!("uniform `{var_name}` must be a struct")));
                };
                let mut fields = Vec::with_capacity(members.len());
                for member in members {
                    let member_name = member.name.clone().unwrap_or_default();
                    let ty = uniform_type(&module.types[member.ty].inner).ok_or_else(|| {
                        link_error(
                            name,
                            format!("uniform member `{member_name}` has an unsupported type"),
                        )
                    })?;
                    fields.push(UniformField {
                        name: member_name,
                        offset: member.offset,
                        ty,
                    });
                }
                reflection.block = Some((*span, fields));
            }
            AddressSpace::Handle => {
                let Some(binding) = var.binding.as_ref() else {
                    continue;
                };
                if binding.group != 1 {
                    return Err(link_error(
                        name,
                        format!("resource `{var_name}` must live in @group(1)"),
                    ));
                }
                match &module.types[var.ty].inner {
                    TypeInner::Image { dim, arrayed, class } => {
                        if binding.binding % 2 != 0 {
                            return Err(link_error(
                                name,
                                format!("texture `{var_name}` must use an even binding"),
                            ));
                        }
                        let kind = texture_kind(*dim, *arrayed, class).ok_or_else(|| {
                            link_error(name, format!("texture `{var_name}` has an unsupported type"))
                        })?;
                        reflection.textures.push(TextureSlot {
                            name: var_name,
                            unit: binding.binding / 2,
                            kind,
                        });
                    }
                    TypeInner::Sampler { .. } => {
                        if binding.binding % 2 != 1 {
                            return Err(link_error(
                                name,
                                format!("sampler `{var_name}` must use an odd binding"),
                            ));
                        }
                    }
                    _ => {}
                }
            }
            _ => {}
        }
    }

    let (entry_stage, entry_name) = match stage {
        Stage::Vertex => (ShaderStage::Vertex, VERTEX_ENTRY),
        Stage::Fragment => (ShaderStage::Fragment, FRAGMENT_ENTRY),
    };
    if let Some(entry) = module
        .entry_points
        .iter()
        .find(|entry| entry.stage == entry_stage && entry.name == entry_name)
    {
        reflection.has_entry = true;
        for argument in &entry.function.arguments {
            let arg_name = argument.name.clone().unwrap_or_default();
            match &argument.binding {
                Some(Binding::Location { location, .. }) => {
                    reflection
                        .inputs
                        .push(vertex_attribute(name, module, arg_name, *location, argument.ty)?);
                }
                Some(Binding::BuiltIn(_)) => {}
                None => {
                    if let TypeInner::Struct { members, .. } = &module.types[argument.ty].inner {
                        for member in members {
                            if let Some(Binding::Location { location, .. }) = &member.binding {
                                reflection.inputs.push(vertex_attribute(
                                    name,
                                    module,
                                    member.name.clone().unwrap_or_default(),
                                    *location,
                                    member.ty,
                                )?);
                            }
                        }
                    }
                }
            }
        }
        if let Some(result) = &entry.function.result {
            match &result.binding {
                Some(Binding::Location { location, .. }) => reflection.outputs.push(*location),
                Some(Binding::BuiltIn(_)) => {}
                None => {
                    if let TypeInner::Struct { members, .. } = &module.types[result.ty].inner {
                        reflection.outputs.extend(members.iter().filter_map(|member| {
                            match &member.binding {
                                Some(Binding::Location { location, .. }) => Some(*location),
                                _ => None,
                            }
                        }));
                    }
                }
            }
        }
    }

    Ok(reflection)
}

fn link(
    name: &str,
    vertex: StageReflection,
    fragment: StageReflection,
) -> Result<ProgramLayout, ShaderError> {
    if !vertex.has_entry {
        return Err(link_error(name, format!("vertex stage has no `{VERTEX_ENTRY}` entry point")));
    }
    if !fragment.has_entry {
        return Err(link_error(
            name,
            format!("fragment stage has no `{FRAGMENT_ENTRY}` entry point"),
        ));
    }
    for input in &fragment.inputs {
        if !vertex.outputs.contains(&input.location) {
            return Err(link_error(
                name,
                format!(
                    "fragment input `{}` at location {} is not written by the vertex stage",
                    input.name, input.location
                ),
            ));
        }
    }

    let (uniform_block_size, uniforms) = match (vertex.block, fragment.block) {
        (Some(v), Some(f)) if v != f => {
            return Err(link_error(name, "uniform blocks differ between stages"));
        }
        (Some(block), _) | (None, Some(block)) => block,
        (None, None) => (0, Vec::new()),
    };

    let mut textures: BTreeMap<u32, TextureSlot> = BTreeMap::new();
    for slot in vertex.textures.into_iter().chain(fragment.textures) {
        match textures.get(&slot.unit) {
            Some(existing) if *existing != slot => {
                return Err(link_error(
                    name,
                    format!("texture unit {} is declared twice with different types", slot.unit),
                ));
            }
            _ => {
                textures.insert(slot.unit, slot);
            }
        }
    }

    let mut attributes = vertex.inputs;
    attributes.sort_by_key(|attribute| attribute.location);

    Ok(ProgramLayout {
        uniform_block_size,
        uniforms,
        textures: textures.into_values().collect(),
        attributes,
    })
}

fn uniform_type(inner: &TypeInner) -> Option<UniformType> {
    match inner {
        TypeInner::Scalar(scalar) if scalar.width == 4 => match scalar.kind {
            ScalarKind::Float => Some(UniformType::F32),
            ScalarKind::Sint => Some(UniformType::I32),
            ScalarKind::Uint => Some(UniformType::U32),
            _ => None,
        },
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Bi => Some(UniformType::Vec2),
            VectorSize::Tri => Some(UniformType::Vec3),
            VectorSize::Quad => Some(UniformType::Vec4),
        },
        TypeInner::Matrix {
            columns: VectorSize::Quad,
            rows: VectorSize::Quad,
            scalar,
        } if scalar.kind == ScalarKind::Float => Some(UniformType::Mat4),
        _ => None,
    }
}

fn texture_kind(dim: ImageDimension, arrayed: bool, class: &ImageClass) -> Option<TextureKind> {
    if arrayed {
        return None;
    }
    match (dim, class) {
        (ImageDimension::D2, ImageClass::Sampled { kind: ScalarKind::Float, multi: false }) => {
            Some(TextureKind::D2)
        }
        (ImageDimension::Cube, ImageClass::Sampled { kind: ScalarKind::Float, multi: false }) => {
            Some(TextureKind::Cube)
        }
        (ImageDimension::D2, ImageClass::Depth { multi: false }) => Some(TextureKind::Depth2d),
        (ImageDimension::Cube, ImageClass::Depth { multi: false }) => Some(TextureKind::DepthCube),
        _ => None,
    }
}

fn vertex_attribute(
    program: &str,
    module: &Module,
    name: String,
    location: u32,
    ty: naga::Handle<naga::Type>,
) -> Result<VertexAttribute, ShaderError> {
    let format = match &module.types[ty].inner {
        TypeInner::Scalar(scalar) if scalar.kind == ScalarKind::Float => AttributeFormat::Float32,
        TypeInner::Vector { size, scalar } if scalar.kind == ScalarKind::Float => match size {
            VectorSize::Bi => AttributeFormat::Float32x2,
            VectorSize::Tri => AttributeFormat::Float32x3,
            VectorSize::Quad => AttributeFormat::Float32x4,
        },
        _ => {
            return Err(link_error(
                program,
                format!("input `{name}` at location {location} must be a float scalar or vector"),
            ));
        }
    };
    Ok(VertexAttribute {
        name,
        location,
        format,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERTEX: &str = r#"
struct Uniforms {
    transform: mat4x4<f32>,
    tint: vec4<f32>,
}

@group(0) @binding(0)
var<uniform> uniforms: Uniforms;

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
}

@vertex
fn vs_main(@location(0) position: vec3<f32>, @location(2) uv: vec2<f32>) -> VertexOutput {
    var out: VertexOutput;
    out.clip_position = uniforms.transform * vec4<f32>(position, 1.0);
    out.uv = uv;
    return out;
}
"#;

    const FRAGMENT: &str = r#"
@group(1) @binding(2)
var albedo: texture_2d<f32>;
@group(1) @binding(3)
var albedo_sampler: sampler;

@fragment
fn fs_main(@location(0) uv: vec2<f32>) -> @location(0) vec4<f32> {
    return textureSample(albedo, albedo_sampler, uv);
}
"#;

    #[test]
    fn should_reflect_uniforms_textures_and_attributes() {
        let layout = build_program("test", &ShaderSource::new(VERTEX, FRAGMENT)).unwrap();
        assert_eq!(layout.uniform_block_size, 80);
        assert_eq!(
            layout.uniform("tint"),
            Some(UniformLocation::Block {
                offset: 64,
                ty: UniformType::Vec4
            })
        );
        assert_eq!(layout.uniform("albedo"), Some(UniformLocation::Sampler { unit: 1 }));
        assert_eq!(layout.uniform("missing"), None);
        assert_eq!(layout.attribute("position"), Some(0));
        assert_eq!(layout.attribute("uv"), Some(2));
        assert_eq!(layout.attributes[1].format, AttributeFormat::Float32x2);
    }

    #[test]
    fn should_reject_fragment_inputs_without_vertex_outputs() {
        let fragment = FRAGMENT.replace("@location(0) uv", "@location(3) uv");
        let err = build_program("test", &ShaderSource::new(VERTEX, fragment)).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }

    #[test]
    fn should_reject_textures_outside_group_one() {
        let fragment = FRAGMENT.replace("@group(1) @binding(2)", "@group(2) @binding(2)");
        let err = build_program("test", &ShaderSource::new(VERTEX, fragment)).unwrap_err();
        assert!(matches!(err, ShaderError::Link { .. }));
    }
}

//! The render context boundary.
//!
//! Every pass in this crate talks to the GPU through [`RenderContext`]. The
//! trait deliberately mirrors the binding-state model of classic immediate
//! mode APIs: a current program, a current framebuffer, texture units and a
//! couple of capabilities. None of that state is owned by a component across
//! calls, so each pass binds everything it needs on entry and restores the
//! capabilities it toggles before returning.
//!
//! [`crate::backend::WgpuContext`] is the production implementation. Tests use
//! a recording implementation to count and inspect issued commands.

use crate::{
    data_structures::asset::{Sampler, Target},
    shader::{ProgramLayout, ShaderError, ShaderSource},
};

/// Handle of a linked program.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProgramId(pub u32);

/// Handle of a vertex or index buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferId(pub u32);

/// Handle of any texture (2D, render target or cube map).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(pub u32);

/// Handle of a framebuffer. [`FramebufferId::DEFAULT`] is the visible target.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(pub u32);

impl FramebufferId {
    pub const DEFAULT: FramebufferId = FramebufferId(0);
}

/// Storage kind of a buffer, taken from the asset's declared target.
pub type BufferTarget = Target;

/// One face of a cube map.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum CubeFace {
    PositiveX,
    NegativeX,
    PositiveY,
    NegativeY,
    PositiveZ,
    NegativeZ,
}

impl CubeFace {
    /// All faces in array-layer order.
    pub const ALL: [CubeFace; 6] = [
        CubeFace::PositiveX,
        CubeFace::NegativeX,
        CubeFace::PositiveY,
        CubeFace::NegativeY,
        CubeFace::PositiveZ,
        CubeFace::NegativeZ,
    ];

    pub fn layer(self) -> u32 {
        match self {
            CubeFace::PositiveX => 0,
            CubeFace::NegativeX => 1,
            CubeFace::PositiveY => 2,
            CubeFace::NegativeY => 3,
            CubeFace::PositiveZ => 4,
            CubeFace::NegativeZ => 5,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Attachment {
    Color,
    Depth,
}

/// Pixel format of a render texture.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum RenderFormat {
    /// 8-bit RGBA, linear.
    Color,
    /// 32-bit float depth.
    Depth,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum ClearBuffer {
    Color,
    Depth,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    DepthTest,
    CullFace,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum DepthFunc {
    #[default]
    Less,
    LessEqual,
    Always,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Topology {
    Triangles,
    /// Consecutive triangles sharing an edge; a 4-vertex strip covers a quad.
    TriangleStrip,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum IndexFormat {
    U16,
    U32,
}

impl IndexFormat {
    pub fn size(self) -> u64 {
        match self {
            IndexFormat::U16 => 2,
            IndexFormat::U32 => 4,
        }
    }
}

/// How each component of a vertex attribute is stored.
///
/// The normalized encodings are read as floats in `[0, 1]`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum VertexComponent {
    #[default]
    F32,
    Unorm8,
    Unorm16,
}

impl VertexComponent {
    pub fn size(self) -> u64 {
        match self {
            VertexComponent::F32 => 4,
            VertexComponent::Unorm8 => 1,
            VertexComponent::Unorm16 => 2,
        }
    }
}

/// Where one vertex attribute reads its data from.
///
/// A `stride` of 0 means tightly packed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct VertexBinding {
    pub buffer: BufferId,
    pub offset: u64,
    pub stride: u64,
    pub component: VertexComponent,
}

/// A vertex binding routed to a program's attribute location.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct AttributeBinding {
    pub location: u32,
    pub binding: VertexBinding,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct IndexBinding {
    pub buffer: BufferId,
    pub offset: u64,
    pub count: u32,
    pub format: IndexFormat,
}

/// Scalar layout of a uniform block member.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UniformType {
    F32,
    I32,
    U32,
    Vec2,
    Vec3,
    Vec4,
    Mat4,
}

impl UniformType {
    pub fn size(self) -> usize {
        match self {
            UniformType::F32 | UniformType::I32 | UniformType::U32 => 4,
            UniformType::Vec2 => 8,
            UniformType::Vec3 => 12,
            UniformType::Vec4 => 16,
            UniformType::Mat4 => 64,
        }
    }
}

/// A resolved uniform.
///
/// Block members are addressed by byte offset into the program's uniform
/// block; samplers are addressed by the texture unit the shader reads from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum UniformLocation {
    Block { offset: u32, ty: UniformType },
    Sampler { unit: u32 },
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub enum UniformValue {
    F32(f32),
    I32(i32),
    U32(u32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    /// Column major.
    Mat4([[f32; 4]; 4]),
    /// Texture unit for a sampler uniform.
    Unit(u32),
}

impl UniformValue {
    pub fn ty(&self) -> Option<UniformType> {
        Some(match self {
            UniformValue::F32(_) => UniformType::F32,
            UniformValue::I32(_) => UniformType::I32,
            UniformValue::U32(_) => UniformType::U32,
            UniformValue::Vec2(_) => UniformType::Vec2,
            UniformValue::Vec3(_) => UniformType::Vec3,
            UniformValue::Vec4(_) => UniformType::Vec4,
            UniformValue::Mat4(_) => UniformType::Mat4,
            UniformValue::Unit(_) => return None,
        })
    }

    /// Native-endian bytes as laid out in a uniform block.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            UniformValue::F32(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::I32(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::U32(v) | UniformValue::Unit(v) => bytemuck::bytes_of(v).to_vec(),
            UniformValue::Vec2(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Vec3(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Vec4(v) => bytemuck::cast_slice(v).to_vec(),
            UniformValue::Mat4(v) => bytemuck::cast_slice(v).to_vec(),
        }
    }
}

impl From<cgmath::Matrix4<f32>> for UniformValue {
    fn from(m: cgmath::Matrix4<f32>) -> Self {
        UniformValue::Mat4(m.into())
    }
}

impl From<cgmath::Vector3<f32>> for UniformValue {
    fn from(v: cgmath::Vector3<f32>) -> Self {
        UniformValue::Vec3(v.into())
    }
}

impl From<f32> for UniformValue {
    fn from(v: f32) -> Self {
        UniformValue::F32(v)
    }
}

/// GL-shaped command surface every render pass is written against.
pub trait RenderContext {
    /// Creates a program from already validated sources.
    fn create_program(
        &mut self,
        label: &str,
        source: &ShaderSource,
        layout: &ProgramLayout,
    ) -> Result<ProgramId, ShaderError>;
    fn use_program(&mut self, program: Option<ProgramId>);
    /// Writes a uniform of the program currently in use.
    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue);

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId;
    /// Creates a sRGB colour texture from a full mip chain (level 0 first).
    fn create_texture_2d(&mut self, levels: &[image::RgbaImage], sampler: &Sampler) -> TextureId;
    /// Creates a linear-filtered, edge-clamped texture usable as attachment.
    fn create_render_texture(&mut self, format: RenderFormat, width: u32, height: u32)
    -> TextureId;
    /// Creates a depth cube map sampled with a `<=` comparison.
    fn create_shadow_cube_map(&mut self, size: u32) -> TextureId;
    /// Creates a colour cube map; faces in [`CubeFace::ALL`] order.
    fn create_cube_map(&mut self, faces: &[image::RgbaImage; 6]) -> TextureId;

    fn create_framebuffer(&mut self) -> FramebufferId;
    fn current_framebuffer(&self) -> FramebufferId;
    fn bind_framebuffer(&mut self, framebuffer: FramebufferId);
    /// Attaches a texture (or one face of a cube map) to the bound framebuffer.
    fn attach_texture(&mut self, attachment: Attachment, texture: TextureId, face: Option<CubeFace>);

    fn viewport(&mut self, width: u32, height: u32);
    fn set_clear_color(&mut self, color: [f32; 4]);
    fn clear(&mut self, buffer: ClearBuffer);
    fn set_enabled(&mut self, capability: Capability, enabled: bool);
    fn is_enabled(&self, capability: Capability) -> bool;
    fn set_depth_func(&mut self, func: DepthFunc);
    fn depth_func(&self) -> DepthFunc;
    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    /// Indexed triangle-list draw with the program currently in use.
    fn draw_elements(&mut self, attributes: &[AttributeBinding], index: &IndexBinding);
    fn draw_arrays(
        &mut self,
        topology: Topology,
        attributes: &[AttributeBinding],
        first: u32,
        count: u32,
    );
}

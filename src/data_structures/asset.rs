//! In-memory scene asset graph.
//!
//! This is the resolved shape of a glTF document: plain indices into flat
//! tables, no GPU handles. [`crate::resources::load_scene_asset`] produces it
//! and [`crate::resources::upload::upload`] consumes it. The renderer does not
//! validate it; malformed references are the loader's concern.

use cgmath::Matrix4;

/// Declared usage of a buffer view.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Target {
    /// Vertex attribute data (`ARRAY_BUFFER`, 34962).
    Vertex,
    /// Index data (`ELEMENT_ARRAY_BUFFER`, 34963).
    Index,
}

impl Target {
    pub fn from_gl(value: u32) -> Option<Self> {
        match value {
            34962 => Some(Target::Vertex),
            34963 => Some(Target::Index),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct BufferView {
    pub buffer: usize,
    pub byte_offset: usize,
    pub byte_length: usize,
    pub byte_stride: Option<usize>,
    pub target: Option<Target>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ComponentType {
    I8,
    U8,
    I16,
    U16,
    U32,
    F32,
}

impl ComponentType {
    pub fn size(self) -> usize {
        match self {
            ComponentType::I8 | ComponentType::U8 => 1,
            ComponentType::I16 | ComponentType::U16 => 2,
            ComponentType::U32 | ComponentType::F32 => 4,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Dimensions {
    Scalar,
    Vec2,
    Vec3,
    Vec4,
    Mat2,
    Mat3,
    Mat4,
}

impl Dimensions {
    pub fn components(self) -> usize {
        match self {
            Dimensions::Scalar => 1,
            Dimensions::Vec2 => 2,
            Dimensions::Vec3 => 3,
            Dimensions::Vec4 | Dimensions::Mat2 => 4,
            Dimensions::Mat3 => 9,
            Dimensions::Mat4 => 16,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Accessor {
    pub buffer_view: Option<usize>,
    pub byte_offset: usize,
    pub count: usize,
    pub component_type: ComponentType,
    /// Integer components are read as floats in `[0, 1]`.
    pub normalized: bool,
    pub dimensions: Dimensions,
}

/// Accessor indices of the attributes a primitive is drawn with.
#[derive(Clone, Debug, PartialEq)]
pub struct PrimitiveAttributes {
    pub position: usize,
    pub normal: usize,
    pub texcoord: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Primitive {
    pub attributes: PrimitiveAttributes,
    pub indices: usize,
    pub material: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub name: Option<String>,
    pub primitives: Vec<Primitive>,
}

/// Base colour source of a material. A material has exactly one.
#[derive(Clone, Debug, PartialEq)]
pub enum MaterialKind {
    Flat([f32; 4]),
    /// Index into [`SceneAsset::textures`].
    Textured { texture: usize },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: Option<String>,
    pub kind: MaterialKind,
}

impl Default for Material {
    /// The glTF default material: opaque white.
    fn default() -> Self {
        Self {
            name: None,
            kind: MaterialKind::Flat([1.0, 1.0, 1.0, 1.0]),
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MagFilter {
    Nearest,
    Linear,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum MinFilter {
    Nearest,
    Linear,
    NearestMipmapNearest,
    LinearMipmapNearest,
    NearestMipmapLinear,
    LinearMipmapLinear,
}

impl MinFilter {
    pub fn uses_mipmaps(self) -> bool {
        !matches!(self, MinFilter::Nearest | MinFilter::Linear)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub enum Wrap {
    ClampToEdge,
    MirroredRepeat,
    #[default]
    Repeat,
}

/// Sampler state exactly as declared by the asset.
///
/// `None` filters mean "not declared"; the GPU's initial state applies
/// (see [`Sampler::effective_min_filter`]).
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Default)]
pub struct Sampler {
    pub mag_filter: Option<MagFilter>,
    pub min_filter: Option<MinFilter>,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
}

impl Sampler {
    pub fn effective_min_filter(&self) -> MinFilter {
        self.min_filter.unwrap_or(MinFilter::NearestMipmapLinear)
    }

    pub fn effective_mag_filter(&self) -> MagFilter {
        self.mag_filter.unwrap_or(MagFilter::Linear)
    }

    /// Decodes the numeric enums used by glTF (which are the GL constants).
    pub fn from_gl(mag: Option<u32>, min: Option<u32>, wrap_s: u32, wrap_t: u32) -> Self {
        let wrap = |value| match value {
            33071 => Wrap::ClampToEdge,
            33648 => Wrap::MirroredRepeat,
            _ => Wrap::Repeat,
        };
        Self {
            mag_filter: mag.and_then(|value| match value {
                9728 => Some(MagFilter::Nearest),
                9729 => Some(MagFilter::Linear),
                _ => None,
            }),
            min_filter: min.and_then(|value| match value {
                9728 => Some(MinFilter::Nearest),
                9729 => Some(MinFilter::Linear),
                9984 => Some(MinFilter::NearestMipmapNearest),
                9985 => Some(MinFilter::LinearMipmapNearest),
                9986 => Some(MinFilter::NearestMipmapLinear),
                9987 => Some(MinFilter::LinearMipmapLinear),
                _ => None,
            }),
            wrap_s: wrap(wrap_s),
            wrap_t: wrap(wrap_t),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Texture {
    pub source: usize,
    pub sampler: Option<usize>,
}

#[derive(Clone, Debug, PartialEq)]
pub enum ImageData {
    /// Encoded image stored in a buffer view (`.glb` embedded images).
    View {
        buffer_view: usize,
        mime_type: Option<String>,
    },
    /// Encoded image read from an external file.
    Encoded(Vec<u8>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    pub name: Option<String>,
    pub data: ImageData,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Node {
    pub name: Option<String>,
    /// Local transform; `None` means identity.
    pub matrix: Option<Matrix4<f32>>,
    pub children: Vec<usize>,
    pub mesh: Option<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct Scene {
    pub name: Option<String>,
    pub nodes: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct SceneAsset {
    pub buffers: Vec<Vec<u8>>,
    pub buffer_views: Vec<BufferView>,
    pub accessors: Vec<Accessor>,
    pub meshes: Vec<Mesh>,
    pub materials: Vec<Material>,
    pub textures: Vec<Texture>,
    pub images: Vec<Image>,
    pub samplers: Vec<Sampler>,
    pub nodes: Vec<Node>,
    pub scenes: Vec<Scene>,
    /// Active scene; the first scene when absent.
    pub scene: Option<usize>,
}

impl SceneAsset {
    /// Root nodes of the active scene.
    pub fn root_nodes(&self) -> &[usize] {
        self.scenes
            .get(self.scene.unwrap_or(0))
            .map(|scene| scene.nodes.as_slice())
            .unwrap_or(&[])
    }

    /// Bytes covered by a buffer view, if the view is in range.
    pub fn view_bytes(&self, view: usize) -> Option<&[u8]> {
        let view = self.buffer_views.get(view)?;
        self.buffers
            .get(view.buffer)?
            .get(view.byte_offset..view.byte_offset.checked_add(view.byte_length)?)
    }
}

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};

use cgmath::Matrix4;
use image::RgbaImage;
use shadow_ngin::{
    context::{
        Attachment, AttributeBinding, BufferId, BufferTarget, Capability, ClearBuffer, CubeFace,
        DepthFunc, FramebufferId, IndexBinding, ProgramId, RenderContext, RenderFormat,
        TextureId, Topology, UniformLocation, UniformValue,
    },
    data_structures::asset::{
        Accessor, BufferView, ComponentType, Dimensions, Image, ImageData, Material,
        MaterialKind, Mesh, Node, Primitive, PrimitiveAttributes, Sampler, Scene, SceneAsset,
        Target, Texture,
    },
    shader::{ProgramLayout, ShaderError, ShaderSource},
};

/// A texture as the recording context saw it being created.
#[derive(Clone, Debug, PartialEq)]
pub enum CreatedTexture {
    Texture2d { levels: Vec<(u32, u32)>, sampler: Sampler },
    Render { format: RenderFormat, width: u32, height: u32 },
    ShadowCube { size: u32 },
    Cube { face_size: (u32, u32) },
}

/// One draw with the state it was issued in.
#[derive(Clone, Debug)]
pub struct DrawRecord {
    pub program: ProgramId,
    pub program_name: String,
    pub framebuffer: FramebufferId,
    pub depth_attachment: Option<(TextureId, Option<CubeFace>)>,
    pub depth_test: bool,
    pub cull_face: bool,
    pub depth_func: DepthFunc,
    pub topology: Topology,
    pub attributes: Vec<AttributeBinding>,
    pub index: Option<IndexBinding>,
    pub vertex_count: u32,
    /// Uniform values of the program at draw time, by name.
    pub uniforms: HashMap<String, UniformValue>,
    pub units: BTreeMap<u32, TextureId>,
}

impl DrawRecord {
    pub fn mat4(&self, name: &str) -> Option<Matrix4<f32>> {
        match self.uniforms.get(name)? {
            UniformValue::Mat4(m) => Some(Matrix4::from(*m)),
            _ => None,
        }
    }
}

#[derive(Clone, Debug)]
pub enum Call {
    CreateProgram(String),
    UseProgram(Option<ProgramId>),
    SetUniform { program: ProgramId, name: String, value: UniformValue },
    CreateBuffer { target: BufferTarget, len: usize },
    CreateTexture(CreatedTexture),
    CreateFramebuffer(FramebufferId),
    BindFramebuffer(FramebufferId),
    Attach { attachment: Attachment, texture: TextureId, face: Option<CubeFace> },
    Viewport(u32, u32),
    SetClearColor([f32; 4]),
    Clear(ClearBuffer),
    SetEnabled(Capability, bool),
    SetDepthFunc(DepthFunc),
    BindTexture { unit: u32, texture: TextureId },
    Draw(DrawRecord),
}

#[derive(Default, Clone, Copy, Debug)]
struct FramebufferState {
    color: Option<TextureId>,
    depth: Option<(TextureId, Option<CubeFace>)>,
}

/// [`RenderContext`] that tracks GL-style state and records every call.
#[derive(Debug)]
pub struct RecordingContext {
    pub calls: Vec<Call>,
    programs: Vec<(String, ProgramLayout)>,
    uniforms: HashMap<ProgramId, HashMap<String, UniformValue>>,
    pub textures: Vec<CreatedTexture>,
    pub buffers: Vec<(BufferTarget, Vec<u8>)>,
    framebuffers: Vec<FramebufferState>,
    program: Option<ProgramId>,
    framebuffer: FramebufferId,
    depth_test: bool,
    cull_face: bool,
    depth_func: DepthFunc,
    units: BTreeMap<u32, TextureId>,
}

impl Default for RecordingContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingContext {
    pub fn new() -> Self {
        Self {
            calls: Vec::new(),
            programs: Vec::new(),
            uniforms: HashMap::new(),
            textures: Vec::new(),
            buffers: Vec::new(),
            framebuffers: vec![FramebufferState::default()],
            program: None,
            framebuffer: FramebufferId::DEFAULT,
            depth_test: false,
            cull_face: false,
            depth_func: DepthFunc::Less,
            units: BTreeMap::new(),
        }
    }

    /// Forgets the recorded calls, keeping resources and state.
    pub fn take_calls(&mut self) -> Vec<Call> {
        std::mem::take(&mut self.calls)
    }

    pub fn draws(&self) -> Vec<&DrawRecord> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                Call::Draw(draw) => Some(draw),
                _ => None,
            })
            .collect()
    }

    pub fn draws_with(&self, program_name: &str) -> Vec<&DrawRecord> {
        self.draws()
            .into_iter()
            .filter(|draw| draw.program_name == program_name)
            .collect()
    }

    pub fn program_name(&self, program: ProgramId) -> Option<&str> {
        self.programs
            .get(program.0 as usize)
            .map(|(name, _)| name.as_str())
    }

    pub fn program_count(&self) -> usize {
        self.programs.len()
    }

    fn record_draw(
        &mut self,
        topology: Topology,
        attributes: &[AttributeBinding],
        index: Option<IndexBinding>,
        vertex_count: u32,
    ) {
        let Some(program) = self.program else {
            panic!("draw issued without a program in use");
        };
        let framebuffer = self.framebuffers[self.framebuffer.0 as usize];
        let record = DrawRecord {
            program,
            program_name: self.program_name(program).unwrap_or_default().to_string(),
            framebuffer: self.framebuffer,
            depth_attachment: framebuffer.depth,
            depth_test: self.depth_test,
            cull_face: self.cull_face,
            depth_func: self.depth_func,
            topology,
            attributes: attributes.to_vec(),
            index,
            vertex_count,
            uniforms: self.uniforms.get(&program).cloned().unwrap_or_default(),
            units: self.units.clone(),
        };
        self.calls.push(Call::Draw(record));
    }
}

impl RenderContext for RecordingContext {
    fn create_program(
        &mut self,
        label: &str,
        _source: &ShaderSource,
        layout: &ProgramLayout,
    ) -> Result<ProgramId, ShaderError> {
        self.programs.push((label.to_string(), layout.clone()));
        self.calls.push(Call::CreateProgram(label.to_string()));
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.program = program;
        self.calls.push(Call::UseProgram(program));
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let program = self.program.expect("uniform written without a program in use");
        let (_, layout) = &self.programs[program.0 as usize];
        let name = layout
            .uniform_name(location)
            .expect("uniform location does not belong to the program in use")
            .to_string();
        self.uniforms
            .entry(program)
            .or_default()
            .insert(name.clone(), value);
        self.calls.push(Call::SetUniform {
            program,
            name,
            value,
        });
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId {
        self.buffers.push((target, data.to_vec()));
        self.calls.push(Call::CreateBuffer {
            target,
            len: data.len(),
        });
        BufferId(self.buffers.len() as u32 - 1)
    }

    fn create_texture_2d(&mut self, levels: &[RgbaImage], sampler: &Sampler) -> TextureId {
        self.push_texture(CreatedTexture::Texture2d {
            levels: levels.iter().map(|level| level.dimensions()).collect(),
            sampler: *sampler,
        })
    }

    fn create_render_texture(
        &mut self,
        format: RenderFormat,
        width: u32,
        height: u32,
    ) -> TextureId {
        self.push_texture(CreatedTexture::Render {
            format,
            width,
            height,
        })
    }

    fn create_shadow_cube_map(&mut self, size: u32) -> TextureId {
        self.push_texture(CreatedTexture::ShadowCube { size })
    }

    fn create_cube_map(&mut self, faces: &[RgbaImage; 6]) -> TextureId {
        self.push_texture(CreatedTexture::Cube {
            face_size: faces[0].dimensions(),
        })
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        self.framebuffers.push(FramebufferState::default());
        let id = FramebufferId(self.framebuffers.len() as u32 - 1);
        self.calls.push(Call::CreateFramebuffer(id));
        id
    }

    fn current_framebuffer(&self) -> FramebufferId {
        self.framebuffer
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.framebuffer = framebuffer;
        self.calls.push(Call::BindFramebuffer(framebuffer));
    }

    fn attach_texture(&mut self, attachment: Attachment, texture: TextureId, face: Option<CubeFace>) {
        let framebuffer = &mut self.framebuffers[self.framebuffer.0 as usize];
        match attachment {
            Attachment::Color => framebuffer.color = Some(texture),
            Attachment::Depth => framebuffer.depth = Some((texture, face)),
        }
        self.calls.push(Call::Attach {
            attachment,
            texture,
            face,
        });
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.calls.push(Call::Viewport(width, height));
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.calls.push(Call::SetClearColor(color));
    }

    fn clear(&mut self, buffer: ClearBuffer) {
        self.calls.push(Call::Clear(buffer));
    }

    fn set_enabled(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::DepthTest => self.depth_test = enabled,
            Capability::CullFace => self.cull_face = enabled,
        }
        self.calls.push(Call::SetEnabled(capability, enabled));
    }

    fn is_enabled(&self, capability: Capability) -> bool {
        match capability {
            Capability::DepthTest => self.depth_test,
            Capability::CullFace => self.cull_face,
        }
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.depth_func = func;
        self.calls.push(Call::SetDepthFunc(func));
    }

    fn depth_func(&self) -> DepthFunc {
        self.depth_func
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.units.insert(unit, texture);
        self.calls.push(Call::BindTexture { unit, texture });
    }

    fn draw_elements(&mut self, attributes: &[AttributeBinding], index: &IndexBinding) {
        self.record_draw(Topology::Triangles, attributes, Some(*index), index.count);
    }

    fn draw_arrays(
        &mut self,
        topology: Topology,
        attributes: &[AttributeBinding],
        first: u32,
        count: u32,
    ) {
        let _ = first;
        self.record_draw(topology, attributes, None, count);
    }
}

impl RecordingContext {
    fn push_texture(&mut self, texture: CreatedTexture) -> TextureId {
        self.textures.push(texture.clone());
        self.calls.push(Call::CreateTexture(texture));
        TextureId(self.textures.len() as u32 - 1)
    }
}

pub fn push_view(asset: &mut SceneAsset, bytes: Vec<u8>, stride: Option<usize>, target: Option<Target>) -> usize {
    let byte_length = bytes.len();
    asset.buffers.push(bytes);
    asset.buffer_views.push(BufferView {
        buffer: asset.buffers.len() - 1,
        byte_offset: 0,
        byte_length,
        byte_stride: stride,
        target,
    });
    asset.buffer_views.len() - 1
}

pub fn push_accessor(
    asset: &mut SceneAsset,
    view: usize,
    count: usize,
    component_type: ComponentType,
    dimensions: Dimensions,
) -> usize {
    asset.accessors.push(Accessor {
        buffer_view: Some(view),
        byte_offset: 0,
        count,
        component_type,
        normalized: false,
        dimensions,
    });
    asset.accessors.len() - 1
}

/// Adds one triangle primitive per entry of `materials` as a single mesh.
pub fn add_triangle_mesh(asset: &mut SceneAsset, materials: &[Option<usize>]) -> usize {
    let positions: [[f32; 3]; 3] = [[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]];
    let normals: [[f32; 3]; 3] = [[0.0, 0.0, 1.0]; 3];
    let indices: [u16; 4] = [0, 1, 2, 0];

    let primitives = materials
        .iter()
        .map(|&material| {
            let position_view = push_view(
                asset,
                bytemuck::cast_slice(&positions).to_vec(),
                None,
                Some(Target::Vertex),
            );
            let normal_view = push_view(
                asset,
                bytemuck::cast_slice(&normals).to_vec(),
                Some(12),
                Some(Target::Vertex),
            );
            let index_view = push_view(
                asset,
                bytemuck::cast_slice(&indices).to_vec(),
                None,
                Some(Target::Index),
            );
            Primitive {
                attributes: PrimitiveAttributes {
                    position: push_accessor(asset, position_view, 3, ComponentType::F32, Dimensions::Vec3),
                    normal: push_accessor(asset, normal_view, 3, ComponentType::F32, Dimensions::Vec3),
                    texcoord: None,
                },
                indices: push_accessor(asset, index_view, 3, ComponentType::U16, Dimensions::Scalar),
                material,
            }
        })
        .collect();
    asset.meshes.push(Mesh {
        name: None,
        primitives,
    });
    asset.meshes.len() - 1
}

pub fn add_flat_material(asset: &mut SceneAsset, color: [f32; 4]) -> usize {
    asset.materials.push(Material {
        name: None,
        kind: MaterialKind::Flat(color),
    });
    asset.materials.len() - 1
}

pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, image::Rgba([200, 100, 50, 255]));
    let mut bytes = std::io::Cursor::new(Vec::new());
    image
        .write_to(&mut bytes, image::ImageFormat::Png)
        .expect("PNG encoding of an in-memory image");
    bytes.into_inner()
}

/// Adds a PNG image stored in an untargeted buffer view, a texture reading it
/// and a textured material using that texture.
pub fn add_textured_material(
    asset: &mut SceneAsset,
    size: u32,
    sampler: Option<Sampler>,
) -> usize {
    let view = push_view(asset, png_bytes(size, size), None, None);
    asset.images.push(Image {
        name: None,
        data: ImageData::View {
            buffer_view: view,
            mime_type: Some("image/png".to_string()),
        },
    });
    let sampler = sampler.map(|sampler| {
        asset.samplers.push(sampler);
        asset.samplers.len() - 1
    });
    asset.textures.push(Texture {
        source: asset.images.len() - 1,
        sampler,
    });
    asset.materials.push(Material {
        name: None,
        kind: MaterialKind::Textured {
            texture: asset.textures.len() - 1,
        },
    });
    asset.materials.len() - 1
}

pub fn add_node(
    asset: &mut SceneAsset,
    matrix: Option<Matrix4<f32>>,
    mesh: Option<usize>,
    children: Vec<usize>,
) -> usize {
    asset.nodes.push(Node {
        name: None,
        matrix,
        children,
        mesh,
    });
    asset.nodes.len() - 1
}

pub fn set_roots(asset: &mut SceneAsset, roots: Vec<usize>) {
    asset.scenes = vec![Scene {
        name: None,
        nodes: roots,
    }];
    asset.scene = Some(0);
}

/// One node holding one flat-shaded triangle.
pub fn triangle_asset() -> SceneAsset {
    let mut asset = SceneAsset::default();
    let material = add_flat_material(&mut asset, [0.8, 0.2, 0.2, 1.0]);
    let mesh = add_triangle_mesh(&mut asset, &[Some(material)]);
    let node = add_node(&mut asset, None, Some(mesh), Vec::new());
    set_roots(&mut asset, vec![node]);
    asset
}

pub fn approx_eq(a: Matrix4<f32>, b: Matrix4<f32>) -> bool {
    let a: [[f32; 4]; 4] = a.into();
    let b: [[f32; 4]; 4] = b.into();
    a.iter()
        .flatten()
        .zip(b.iter().flatten())
        .all(|(x, y)| (x - y).abs() < 1e-5)
}

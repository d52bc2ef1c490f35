//! Programs and render pipelines of the wgpu backend.
//!
//! A GL program has no notion of target formats or fixed-function state, a
//! wgpu pipeline bakes all of it in. Pipelines are therefore keyed by the
//! program plus every piece of state the draw was recorded with.

use std::num::NonZeroU64;

use crate::{
    context::{DepthFunc, ProgramId, Topology, VertexComponent},
    shader::{
        AttributeFormat, ProgramLayout, ShaderSource, TextureKind,
        reflect::{FRAGMENT_ENTRY, VERTEX_ENTRY},
    },
};

/// A linked program: both stages, its bind group layouts and the CPU copy of
/// its uniform block.
#[derive(Debug)]
pub struct Program {
    pub label: String,
    pub vertex: wgpu::ShaderModule,
    pub fragment: wgpu::ShaderModule,
    pub layout: ProgramLayout,
    pub uniform_layout: wgpu::BindGroupLayout,
    pub texture_layout: wgpu::BindGroupLayout,
    pub pipeline_layout: wgpu::PipelineLayout,
    pub uniforms: Vec<u8>,
}

impl Program {
    pub fn new(
        device: &wgpu::Device,
        label: &str,
        source: &ShaderSource,
        layout: &ProgramLayout,
    ) -> Self {
        let vertex = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} vertex")),
            source: wgpu::ShaderSource::Wgsl(source.vertex.as_str().into()),
        });
        let fragment = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(&format!("{label} fragment")),
            source: wgpu::ShaderSource::Wgsl(source.fragment.as_str().into()),
        });

        let uniform_entries: Vec<_> = NonZeroU64::new(layout.uniform_block_size as u64)
            .map(|size| wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: Some(size),
                },
                count: None,
            })
            .into_iter()
            .collect();
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} uniforms")),
            entries: &uniform_entries,
        });

        let texture_entries: Vec<_> = layout
            .textures
            .iter()
            .flat_map(|slot| texture_layout_entries(slot.unit, slot.kind))
            .collect();
        let texture_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&format!("{label} textures")),
            entries: &texture_entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&format!("{label} pipeline layout")),
            bind_group_layouts: &[&uniform_layout, &texture_layout],
            immediate_size: 0,
        });

        Self {
            label: label.to_string(),
            vertex,
            fragment,
            layout: layout.clone(),
            uniform_layout,
            texture_layout,
            pipeline_layout,
            uniforms: vec![0; layout.uniform_block_size as usize],
        }
    }

    pub fn has_uniforms(&self) -> bool {
        !self.uniforms.is_empty()
    }
}

fn texture_layout_entries(unit: u32, kind: TextureKind) -> [wgpu::BindGroupLayoutEntry; 2] {
    let (sample_type, view_dimension) = match kind {
        TextureKind::D2 => (
            wgpu::TextureSampleType::Float { filterable: true },
            wgpu::TextureViewDimension::D2,
        ),
        TextureKind::Depth2d => (
            wgpu::TextureSampleType::Depth,
            wgpu::TextureViewDimension::D2,
        ),
        TextureKind::Cube => (
            wgpu::TextureSampleType::Float { filterable: true },
            wgpu::TextureViewDimension::Cube,
        ),
        TextureKind::DepthCube => (
            wgpu::TextureSampleType::Depth,
            wgpu::TextureViewDimension::Cube,
        ),
    };
    let sampler = match kind {
        TextureKind::Depth2d | TextureKind::DepthCube => wgpu::SamplerBindingType::Comparison,
        TextureKind::D2 | TextureKind::Cube => wgpu::SamplerBindingType::Filtering,
    };
    [
        wgpu::BindGroupLayoutEntry {
            binding: unit * 2,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                multisampled: false,
                view_dimension,
                sample_type,
            },
            count: None,
        },
        wgpu::BindGroupLayoutEntry {
            binding: unit * 2 + 1,
            visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(sampler),
            count: None,
        },
    ]
}

/// Everything a recorded draw bakes into its pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PipelineKey {
    pub program: ProgramId,
    pub color_format: Option<wgpu::TextureFormat>,
    pub depth_format: Option<wgpu::TextureFormat>,
    pub depth_test: bool,
    pub depth_func: DepthFunc,
    pub cull: bool,
    pub topology: Topology,
    /// Stride and wgpu format per vertex buffer slot, one slot per program
    /// attribute.
    pub vertex_slots: Vec<(u64, wgpu::VertexFormat)>,
}

/// The wgpu format that feeds a shader input of `format` from data stored as
/// `component`. wgpu has no 3-component 8 or 16 bit formats and the loader
/// only hands out normalized data for texture coordinates.
pub fn vertex_format(
    format: AttributeFormat,
    component: VertexComponent,
) -> Option<wgpu::VertexFormat> {
    use wgpu::VertexFormat as F;
    Some(match (component, format) {
        (VertexComponent::F32, AttributeFormat::Float32) => F::Float32,
        (VertexComponent::F32, AttributeFormat::Float32x2) => F::Float32x2,
        (VertexComponent::F32, AttributeFormat::Float32x3) => F::Float32x3,
        (VertexComponent::F32, AttributeFormat::Float32x4) => F::Float32x4,
        (VertexComponent::Unorm8, AttributeFormat::Float32x2) => F::Unorm8x2,
        (VertexComponent::Unorm8, AttributeFormat::Float32x4) => F::Unorm8x4,
        (VertexComponent::Unorm16, AttributeFormat::Float32x2) => F::Unorm16x2,
        (VertexComponent::Unorm16, AttributeFormat::Float32x4) => F::Unorm16x4,
        _ => return None,
    })
}

fn compare_function(func: DepthFunc) -> wgpu::CompareFunction {
    match func {
        DepthFunc::Less => wgpu::CompareFunction::Less,
        DepthFunc::LessEqual => wgpu::CompareFunction::LessEqual,
        DepthFunc::Always => wgpu::CompareFunction::Always,
    }
}

pub fn mk_render_pipeline(
    device: &wgpu::Device,
    program: &Program,
    key: &PipelineKey,
) -> wgpu::RenderPipeline {
    let attributes: Vec<[wgpu::VertexAttribute; 1]> = program
        .layout
        .attributes
        .iter()
        .zip(&key.vertex_slots)
        .map(|(attribute, &(_, format))| {
            [wgpu::VertexAttribute {
                format,
                offset: 0,
                shader_location: attribute.location,
            }]
        })
        .collect();
    let buffers: Vec<wgpu::VertexBufferLayout> = attributes
        .iter()
        .zip(&key.vertex_slots)
        .map(|(attribute, &(stride, _))| wgpu::VertexBufferLayout {
            array_stride: stride,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: attribute,
        })
        .collect();

    let targets: Vec<Option<wgpu::ColorTargetState>> = key
        .color_format
        .map(|format| wgpu::ColorTargetState {
            format,
            blend: Some(wgpu::BlendState::REPLACE),
            write_mask: wgpu::ColorWrites::ALL,
        })
        .into_iter()
        .map(Some)
        .collect();

    let (topology, strip_index_format) = match key.topology {
        Topology::Triangles => (wgpu::PrimitiveTopology::TriangleList, None),
        Topology::TriangleStrip => (wgpu::PrimitiveTopology::TriangleStrip, None),
    };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        cache: None,
        label: Some(&program.label),
        layout: Some(&program.pipeline_layout),
        vertex: wgpu::VertexState {
            module: &program.vertex,
            entry_point: Some(VERTEX_ENTRY),
            buffers: &buffers,
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: &program.fragment,
            entry_point: Some(FRAGMENT_ENTRY),
            targets: &targets,
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: key.cull.then_some(wgpu::Face::Back),
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        // a disabled depth test neither tests nor writes, as in GL
        depth_stencil: key.depth_format.map(|format| wgpu::DepthStencilState {
            format,
            depth_write_enabled: key.depth_test,
            depth_compare: if key.depth_test {
                compare_function(key.depth_func)
            } else {
                wgpu::CompareFunction::Always
            },
            stencil: wgpu::StencilState::default(),
            bias: wgpu::DepthBiasState::default(),
        }),
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview_mask: None,
    })
}

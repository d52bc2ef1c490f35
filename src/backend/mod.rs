//! wgpu implementation of [`RenderContext`].
//!
//! Calls are recorded into a [`frame::Frame`] and only turned into wgpu
//! render passes by [`WgpuContext::present`]. Resources (buffers, textures,
//! programs, framebuffers) are created immediately and live as long as the
//! context.

mod frame;
mod pipeline;
mod texture;

use std::{
    collections::{BTreeMap, HashMap},
    iter,
    num::NonZeroU64,
    sync::Arc,
};

use anyhow::Context as _;
use image::RgbaImage;
use instant::Duration;
use wgpu::util::DeviceExt;
use winit::window::Window;

use crate::{
    context::{
        Attachment, AttributeBinding, BufferId, BufferTarget, Capability, ClearBuffer, CubeFace,
        DepthFunc, FramebufferId, IndexBinding, IndexFormat, ProgramId, RenderContext,
        RenderFormat, TextureId, Topology, UniformLocation, UniformValue, VertexComponent,
    },
    data_structures::asset::{Sampler, Target},
    shader::{ProgramLayout, ShaderError, ShaderSource, TextureKind},
};

use frame::{Attached, ColorTarget, Draw, DrawKind, Frame, PassTarget, VertexSource};
use pipeline::{PipelineKey, Program, mk_render_pipeline, vertex_format};
pub use texture::{COLOR_TARGET_FORMAT, DEPTH_FORMAT, SRGB_FORMAT, Texture};

const INITIAL_UNIFORM_CAPACITY: u64 = 64 * 1024;

/// Where the default framebuffer draws to.
enum DefaultTarget {
    Surface {
        surface: wgpu::Surface<'static>,
        config: wgpu::SurfaceConfiguration,
    },
    /// Offscreen stand-in for tests and screenshots.
    Headless { texture: Texture },
}

impl DefaultTarget {
    fn format(&self) -> wgpu::TextureFormat {
        match self {
            DefaultTarget::Surface { config, .. } => config.format,
            DefaultTarget::Headless { texture } => texture.format(),
        }
    }

    fn size(&self) -> (u32, u32) {
        match self {
            DefaultTarget::Surface { config, .. } => (config.width, config.height),
            DefaultTarget::Headless { texture } => texture.size(),
        }
    }
}

#[derive(Copy, Clone, Debug, Default)]
struct Framebuffer {
    color: Option<Attached>,
    depth: Option<Attached>,
}

/// Binding state, as a GL context would track it.
#[derive(Debug)]
struct State {
    program: Option<ProgramId>,
    framebuffer: FramebufferId,
    viewport: (u32, u32),
    clear_color: [f32; 4],
    depth_test: bool,
    cull_face: bool,
    depth_func: DepthFunc,
    units: BTreeMap<u32, TextureId>,
}

pub struct WgpuContext {
    device: wgpu::Device,
    queue: wgpu::Queue,
    target: DefaultTarget,
    programs: Vec<Program>,
    buffers: Vec<wgpu::Buffer>,
    textures: Vec<Texture>,
    /// Index 0 is [`FramebufferId::DEFAULT`].
    framebuffers: Vec<Framebuffer>,
    pipelines: Vec<wgpu::RenderPipeline>,
    pipeline_cache: HashMap<PipelineKey, usize>,
    texture_groups: Vec<wgpu::BindGroup>,
    texture_group_cache: HashMap<(ProgramId, Vec<Option<TextureId>>), usize>,
    fallbacks: HashMap<TextureKind, Texture>,
    zero_buffer: wgpu::Buffer,
    uniform_buffer: wgpu::Buffer,
    uniform_alignment: u64,
    state: State,
    frame: Frame,
}

impl WgpuContext {
    /// Creates a context presenting to `window`.
    pub async fn new(window: Arc<Window>) -> anyhow::Result<Self> {
        let size = window.inner_size();

        log::debug!("WGPU setup");
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::PRIMARY,
            ..Default::default()
        });
        let surface = instance
            .create_surface(window)
            .context("failed to create a surface for the window")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        let (device, queue) = request_device(&adapter).await?;

        let surface_caps = surface.get_capabilities(&adapter);
        // the composite pass writes linear colour and relies on an sRGB target
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .context("the surface supports no formats")?;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo),
            alpha_mode: surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        log::info!(
            "Rendering with {} to a {}x{} {:?} surface",
            adapter.get_info().name,
            config.width,
            config.height,
            config.format
        );

        Ok(Self::with_target(
            device,
            queue,
            DefaultTarget::Surface { surface, config },
        ))
    }

    /// Creates a context whose default framebuffer is an offscreen sRGB
    /// texture of the given size.
    pub async fn new_headless(width: u32, height: u32) -> anyhow::Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::default(),
                compatible_surface: None,
                force_fallback_adapter: false,
            })
            .await
            .context("no suitable GPU adapter")?;
        let (device, queue) = request_device(&adapter).await?;
        let texture = Texture::render_target(&device, SRGB_FORMAT, width, height, "headless target");
        Ok(Self::with_target(
            device,
            queue,
            DefaultTarget::Headless { texture },
        ))
    }

    fn with_target(device: wgpu::Device, queue: wgpu::Queue, target: DefaultTarget) -> Self {
        let zero_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("zero attribute"),
            contents: &[0; 16],
            usage: wgpu::BufferUsages::VERTEX,
        });
        let uniform_buffer = create_uniform_buffer(&device, INITIAL_UNIFORM_CAPACITY);
        let uniform_alignment = device.limits().min_uniform_buffer_offset_alignment as u64;
        let (width, height) = target.size();
        Self {
            device,
            queue,
            target,
            programs: Vec::new(),
            buffers: Vec::new(),
            textures: Vec::new(),
            framebuffers: vec![Framebuffer::default()],
            pipelines: Vec::new(),
            pipeline_cache: HashMap::new(),
            texture_groups: Vec::new(),
            texture_group_cache: HashMap::new(),
            fallbacks: HashMap::new(),
            zero_buffer,
            uniform_buffer,
            uniform_alignment,
            state: State {
                program: None,
                framebuffer: FramebufferId::DEFAULT,
                viewport: (width, height),
                clear_color: [0.0, 0.0, 0.0, 1.0],
                depth_test: false,
                cull_face: false,
                depth_func: DepthFunc::Less,
                units: BTreeMap::new(),
            },
            frame: Frame::default(),
        }
    }

    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    /// Size of the default framebuffer.
    pub fn size(&self) -> (u32, u32) {
        self.target.size()
    }

    /// Reconfigures the surface. Render textures keep their size, see
    /// [`crate::Scene::resize`].
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let DefaultTarget::Surface { surface, config } = &mut self.target {
            config.width = width;
            config.height = height;
            surface.configure(&self.device, config);
        }
    }

    /// Reconfigures the surface with its current configuration, after it was
    /// lost or became outdated.
    pub fn reconfigure(&mut self) {
        if let DefaultTarget::Surface { surface, config } = &self.target {
            surface.configure(&self.device, config);
        }
    }

    /// Submits everything recorded since the last call and presents.
    ///
    /// When the surface cannot be acquired the passes into offscreen targets
    /// are still submitted, so work such as a finished shadow map is kept, and
    /// the error is returned.
    pub fn present(&mut self) -> Result<(), wgpu::SurfaceError> {
        let frame = std::mem::take(&mut self.frame);
        if frame.is_empty() {
            return Ok(());
        }
        self.upload_uniforms(&frame);
        let uniform_groups = self.uniform_groups(&frame);

        let draws_to_default = frame
            .passes
            .iter()
            .any(|pass| pass.target.color == Some(ColorTarget::Default));
        let mut acquire_error = None;
        let surface_texture = match &self.target {
            DefaultTarget::Surface { surface, .. } if draws_to_default => {
                match surface.get_current_texture() {
                    Ok(texture) => Some(texture),
                    Err(e) => {
                        acquire_error = Some(e);
                        None
                    }
                }
            }
            _ => None,
        };
        let surface_view = surface_texture.as_ref().map(|texture| {
            texture
                .texture
                .create_view(&wgpu::TextureViewDescriptor::default())
        });
        let default_view = match &self.target {
            DefaultTarget::Headless { texture } => Some(&texture.view),
            DefaultTarget::Surface { .. } => surface_view.as_ref(),
        };

        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Render Encoder"),
            });
        for pass in &frame.passes {
            let color_view = match pass.target.color {
                Some(ColorTarget::Default) => match default_view {
                    Some(view) => Some(view),
                    None => continue,
                },
                Some(ColorTarget::Texture(attached)) => match self.attachment_view(attached) {
                    Some(view) => Some(view),
                    None => continue,
                },
                None => None,
            };
            let depth_view = match pass.target.depth {
                Some(attached) => match self.attachment_view(attached) {
                    Some(view) => Some(view),
                    None => continue,
                },
                None => None,
            };
            if color_view.is_none() && depth_view.is_none() {
                continue;
            }
            let target_size = self.target_size(pass.target);

            let color_attachments: Vec<_> = color_view
                .map(|view| wgpu::RenderPassColorAttachment {
                    view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: match pass.clear_color {
                            Some([r, g, b, a]) => wgpu::LoadOp::Clear(wgpu::Color {
                                r: r as f64,
                                g: g as f64,
                                b: b as f64,
                                a: a as f64,
                            }),
                            None => wgpu::LoadOp::Load,
                        },
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })
                .into_iter()
                .map(Some)
                .collect();
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Render Pass"),
                color_attachments: &color_attachments,
                depth_stencil_attachment: depth_view.map(|view| {
                    wgpu::RenderPassDepthStencilAttachment {
                        view,
                        depth_ops: Some(wgpu::Operations {
                            load: match pass.clear_depth {
                                Some(depth) => wgpu::LoadOp::Clear(depth),
                                None => wgpu::LoadOp::Load,
                            },
                            store: wgpu::StoreOp::Store,
                        }),
                        stencil_ops: None,
                    }
                }),
                occlusion_query_set: None,
                timestamp_writes: None,
                multiview_mask: None,
            });
            for draw in &pass.draws {
                self.encode_draw(&mut render_pass, draw, target_size, &uniform_groups);
            }
        }
        self.queue.submit(iter::once(encoder.finish()));
        if let Some(texture) = surface_texture {
            texture.present();
        }
        match acquire_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Reads back the headless target. Fails for surface-backed contexts.
    pub async fn read_default_target(&self) -> anyhow::Result<RgbaImage> {
        let DefaultTarget::Headless { texture } = &self.target else {
            anyhow::bail!("only headless contexts can read back their default target");
        };
        let (width, height) = texture.size();
        let unpadded = 4 * width;
        let padded = unpadded.div_ceil(wgpu::COPY_BYTES_PER_ROW_ALIGNMENT)
            * wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let output_buffer = self.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("readback"),
            size: (padded * height) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::TexelCopyTextureInfo {
                aspect: wgpu::TextureAspect::All,
                texture: &texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
            },
            wgpu::TexelCopyBufferInfo {
                buffer: &output_buffer,
                layout: wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(padded),
                    rows_per_image: Some(height),
                },
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        self.queue.submit(iter::once(encoder.finish()));

        let buffer_slice = output_buffer.slice(..);
        let (tx, rx) = futures::channel::oneshot::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        self.device.poll(wgpu::PollType::Wait {
            submission_index: None,
            timeout: Some(Duration::from_secs(3)),
        })?;
        rx.await??;

        let data = buffer_slice.get_mapped_range();
        let pixels: Vec<u8> = data
            .chunks(padded as usize)
            .flat_map(|row| &row[..unpadded as usize])
            .copied()
            .collect();
        drop(data);
        output_buffer.unmap();
        RgbaImage::from_raw(width, height, pixels).context("readback has the wrong size")
    }

    fn program(&self) -> Option<(ProgramId, &Program)> {
        let id = self.state.program?;
        self.programs.get(id.0 as usize).map(|program| (id, program))
    }

    fn texture(&self, id: TextureId) -> Option<&Texture> {
        self.textures.get(id.0 as usize)
    }

    fn attachment_view(&self, attached: Attached) -> Option<&wgpu::TextureView> {
        self.texture(attached.texture)
            .map(|texture| texture.attachment_view(attached.face))
    }

    fn target_size(&self, target: PassTarget) -> (u32, u32) {
        let attached = match (target.color, target.depth) {
            (Some(ColorTarget::Default), _) => return self.target.size(),
            (Some(ColorTarget::Texture(attached)), _) | (None, Some(attached)) => attached,
            (None, None) => return (0, 0),
        };
        self.texture(attached.texture)
            .map(Texture::size)
            .unwrap_or((0, 0))
    }

    fn pass_target(&self) -> PassTarget {
        if self.state.framebuffer == FramebufferId::DEFAULT {
            return PassTarget {
                color: Some(ColorTarget::Default),
                depth: None,
            };
        }
        let framebuffer = self
            .framebuffers
            .get(self.state.framebuffer.0 as usize)
            .copied()
            .unwrap_or_default();
        PassTarget {
            color: framebuffer.color.map(ColorTarget::Texture),
            depth: framebuffer.depth,
        }
    }

    fn target_formats(&self, target: PassTarget) -> (Option<wgpu::TextureFormat>, Option<wgpu::TextureFormat>) {
        let color = target.color.and_then(|color| match color {
            ColorTarget::Default => Some(self.target.format()),
            ColorTarget::Texture(attached) => self.texture(attached.texture).map(Texture::format),
        });
        let depth = target
            .depth
            .and_then(|attached| self.texture(attached.texture))
            .map(Texture::format);
        (color, depth)
    }

    fn pipeline(&mut self, key: PipelineKey) -> Option<usize> {
        if let Some(&index) = self.pipeline_cache.get(&key) {
            return Some(index);
        }
        let program = self.programs.get(key.program.0 as usize)?;
        let pipeline = mk_render_pipeline(&self.device, program, &key);
        log::debug!("Created pipeline {} for `{}`", self.pipelines.len(), program.label);
        self.pipelines.push(pipeline);
        self.pipeline_cache.insert(key, self.pipelines.len() - 1);
        Some(self.pipelines.len() - 1)
    }

    fn ensure_fallback(&mut self, kind: TextureKind) {
        if !self.fallbacks.contains_key(&kind) {
            let texture = Texture::fallback(&self.device, &self.queue, kind);
            self.fallbacks.insert(kind, texture);
        }
    }

    /// Bind group of the program's texture slots for the current units.
    /// Empty or mismatched units get a fallback texture.
    fn texture_group(&mut self, program: ProgramId) -> Option<usize> {
        let slots = self.programs.get(program.0 as usize)?.layout.textures.clone();
        let bound: Vec<Option<TextureId>> = slots
            .iter()
            .map(|slot| {
                self.state
                    .units
                    .get(&slot.unit)
                    .copied()
                    .filter(|&id| self.texture(id).is_some_and(|texture| texture.kind == slot.kind))
            })
            .collect();
        let key = (program, bound);
        if let Some(&index) = self.texture_group_cache.get(&key) {
            return Some(index);
        }
        for (slot, bound) in slots.iter().zip(&key.1) {
            if bound.is_none() {
                self.ensure_fallback(slot.kind);
            }
        }

        let mut entries = Vec::with_capacity(slots.len() * 2);
        for (slot, bound) in slots.iter().zip(&key.1) {
            let texture = match bound {
                Some(id) => self.texture(*id),
                None => self.fallbacks.get(&slot.kind),
            }?;
            entries.push(wgpu::BindGroupEntry {
                binding: slot.unit * 2,
                resource: wgpu::BindingResource::TextureView(&texture.view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: slot.unit * 2 + 1,
                resource: wgpu::BindingResource::Sampler(&texture.sampler),
            });
        }
        let program_ref = self.programs.get(program.0 as usize)?;
        let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&format!("{} textures", program_ref.label)),
            layout: &program_ref.texture_layout,
            entries: &entries,
        });
        self.texture_groups.push(group);
        self.texture_group_cache.insert(key, self.texture_groups.len() - 1);
        Some(self.texture_groups.len() - 1)
    }

    fn record_draw(
        &mut self,
        topology: Topology,
        attributes: &[AttributeBinding],
        kind: DrawKind,
    ) {
        let Some((program_id, program)) = self.program() else {
            log::warn!("Draw issued without a program in use");
            return;
        };
        let mut vertex_slots = Vec::with_capacity(program.layout.attributes.len());
        let mut vertex_buffers = Vec::with_capacity(program.layout.attributes.len());
        for attribute in &program.layout.attributes {
            let binding = attributes
                .iter()
                .find(|binding| binding.location == attribute.location)
                .map(|binding| binding.binding);
            let component = binding.map_or(VertexComponent::F32, |binding| binding.component);
            let Some(format) = vertex_format(attribute.format, component) else {
                log::warn!(
                    "Attribute {} of {} cannot read {component:?} data; draw skipped",
                    attribute.name,
                    program.label
                );
                return;
            };
            match binding {
                Some(binding) => {
                    let stride = match binding.stride {
                        0 => attribute.format.components() * component.size(),
                        stride => stride,
                    };
                    vertex_slots.push((stride, format));
                    vertex_buffers.push(VertexSource::Buffer {
                        buffer: binding.buffer,
                        offset: binding.offset,
                    });
                }
                None => {
                    vertex_slots.push((0, format));
                    vertex_buffers.push(VertexSource::Zero);
                }
            }
        }
        let uniforms = program.has_uniforms().then(|| program.uniforms.clone());

        let target = self.pass_target();
        let (color_format, depth_format) = self.target_formats(target);
        let key = PipelineKey {
            program: program_id,
            color_format,
            depth_format,
            depth_test: self.state.depth_test,
            depth_func: self.state.depth_func,
            cull: self.state.cull_face,
            topology,
            vertex_slots,
        };
        let Some(pipeline) = self.pipeline(key) else {
            return;
        };
        let Some(texture_group) = self.texture_group(program_id) else {
            return;
        };
        let uniform_offset = uniforms
            .map(|bytes| self.frame.push_uniforms(&bytes, self.uniform_alignment));
        let viewport = self.state.viewport;
        self.frame.pass_for(target).draws.push(Draw {
            pipeline,
            program: program_id,
            uniform_offset,
            texture_group,
            vertex_buffers,
            viewport,
            kind,
        });
    }

    fn upload_uniforms(&mut self, frame: &Frame) {
        if frame.uniforms.is_empty() {
            return;
        }
        let size = frame.uniform_size(self.uniform_alignment);
        if size > self.uniform_buffer.size() {
            self.uniform_buffer = create_uniform_buffer(&self.device, size.next_power_of_two());
        }
        self.queue.write_buffer(&self.uniform_buffer, 0, &frame.uniforms);
    }

    fn uniform_groups(&self, frame: &Frame) -> HashMap<ProgramId, wgpu::BindGroup> {
        let mut groups = HashMap::new();
        for draw in frame.passes.iter().flat_map(|pass| &pass.draws) {
            if groups.contains_key(&draw.program) {
                continue;
            }
            let Some(program) = self.programs.get(draw.program.0 as usize) else {
                continue;
            };
            let entries: Vec<_> = NonZeroU64::new(program.uniforms.len() as u64)
                .map(|size| wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                        buffer: &self.uniform_buffer,
                        offset: 0,
                        size: Some(size),
                    }),
                })
                .into_iter()
                .collect();
            let group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(&format!("{} uniforms", program.label)),
                layout: &program.uniform_layout,
                entries: &entries,
            });
            groups.insert(draw.program, group);
        }
        groups
    }

    fn encode_draw(
        &self,
        render_pass: &mut wgpu::RenderPass<'_>,
        draw: &Draw,
        target_size: (u32, u32),
        uniform_groups: &HashMap<ProgramId, wgpu::BindGroup>,
    ) {
        let width = draw.viewport.0.min(target_size.0);
        let height = draw.viewport.1.min(target_size.1);
        if width == 0 || height == 0 {
            return;
        }
        let (Some(pipeline), Some(uniform_group), Some(texture_group)) = (
            self.pipelines.get(draw.pipeline),
            uniform_groups.get(&draw.program),
            self.texture_groups.get(draw.texture_group),
        ) else {
            return;
        };
        render_pass.set_viewport(0.0, 0.0, width as f32, height as f32, 0.0, 1.0);
        render_pass.set_pipeline(pipeline);
        match draw.uniform_offset {
            Some(offset) => render_pass.set_bind_group(0, uniform_group, &[offset]),
            None => render_pass.set_bind_group(0, uniform_group, &[]),
        }
        render_pass.set_bind_group(1, texture_group, &[]);
        for (slot, source) in draw.vertex_buffers.iter().enumerate() {
            let slice = match source {
                VertexSource::Buffer { buffer, offset } => {
                    match self.buffers.get(buffer.0 as usize) {
                        Some(buffer) => buffer.slice(*offset..),
                        None => return,
                    }
                }
                VertexSource::Zero => self.zero_buffer.slice(..),
            };
            render_pass.set_vertex_buffer(slot as u32, slice);
        }
        match draw.kind {
            DrawKind::Indexed {
                buffer,
                offset,
                format,
                count,
            } => {
                let Some(buffer) = self.buffers.get(buffer.0 as usize) else {
                    return;
                };
                let format = match format {
                    IndexFormat::U16 => wgpu::IndexFormat::Uint16,
                    IndexFormat::U32 => wgpu::IndexFormat::Uint32,
                };
                render_pass.set_index_buffer(buffer.slice(offset..), format);
                render_pass.draw_indexed(0..count, 0, 0..1);
            }
            DrawKind::Arrays { first, count } => {
                render_pass.draw(first..first + count, 0..1);
            }
        }
    }

    fn push_texture(&mut self, texture: Texture) -> TextureId {
        self.textures.push(texture);
        TextureId(self.textures.len() as u32 - 1)
    }
}

async fn request_device(adapter: &wgpu::Adapter) -> anyhow::Result<(wgpu::Device, wgpu::Queue)> {
    log::debug!("device and queue");
    adapter
        .request_device(&wgpu::DeviceDescriptor {
            label: None,
            required_features: wgpu::Features::empty(),
            required_limits: wgpu::Limits::default(),
            memory_hints: Default::default(),
            trace: wgpu::Trace::Off,
            ..Default::default()
        })
        .await
        .context("failed to create the GPU device")
}

fn create_uniform_buffer(device: &wgpu::Device, size: u64) -> wgpu::Buffer {
    device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("uniform ring"),
        size,
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    })
}

impl RenderContext for WgpuContext {
    fn create_program(
        &mut self,
        label: &str,
        source: &ShaderSource,
        layout: &ProgramLayout,
    ) -> Result<ProgramId, ShaderError> {
        self.programs
            .push(Program::new(&self.device, label, source, layout));
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn use_program(&mut self, program: Option<ProgramId>) {
        self.state.program = program;
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformValue) {
        let Some(id) = self.state.program else {
            log::warn!("Uniform written without a program in use");
            return;
        };
        let Some(program) = self.programs.get_mut(id.0 as usize) else {
            return;
        };
        match location {
            UniformLocation::Block { offset, ty } => {
                if value.ty() != Some(ty) {
                    log::warn!(
                        "`{}`: {:?} written to a {ty:?} uniform",
                        program.label,
                        value
                    );
                    return;
                }
                let bytes = value.to_bytes();
                let start = offset as usize;
                if let Some(target) = program.uniforms.get_mut(start..start + bytes.len()) {
                    target.copy_from_slice(&bytes);
                }
            }
            UniformLocation::Sampler { unit } => {
                if value != UniformValue::Unit(unit) {
                    log::warn!(
                        "`{}`: sampler at unit {unit} can only read unit {unit}, got {value:?}",
                        program.label
                    );
                }
            }
        }
    }

    fn create_buffer(&mut self, target: BufferTarget, data: &[u8]) -> BufferId {
        let usage = match target {
            Target::Vertex => wgpu::BufferUsages::VERTEX,
            Target::Index => wgpu::BufferUsages::INDEX,
        };
        let buffer = self
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(match target {
                    Target::Vertex => "vertex buffer",
                    Target::Index => "index buffer",
                }),
                contents: data,
                usage,
            });
        self.buffers.push(buffer);
        BufferId(self.buffers.len() as u32 - 1)
    }

    fn create_texture_2d(&mut self, levels: &[RgbaImage], sampler: &Sampler) -> TextureId {
        let texture =
            Texture::from_mip_chain(&self.device, &self.queue, levels, sampler, "asset texture");
        self.push_texture(texture)
    }

    fn create_render_texture(
        &mut self,
        format: RenderFormat,
        width: u32,
        height: u32,
    ) -> TextureId {
        let (format, label) = match format {
            RenderFormat::Color => (COLOR_TARGET_FORMAT, "offscreen color"),
            RenderFormat::Depth => (DEPTH_FORMAT, "offscreen depth"),
        };
        let texture = Texture::render_target(&self.device, format, width, height, label);
        self.push_texture(texture)
    }

    fn create_shadow_cube_map(&mut self, size: u32) -> TextureId {
        let texture = Texture::shadow_cube(&self.device, size, "shadow cube map");
        self.push_texture(texture)
    }

    fn create_cube_map(&mut self, faces: &[RgbaImage; 6]) -> TextureId {
        let texture = Texture::color_cube(&self.device, &self.queue, faces, "cube map");
        self.push_texture(texture)
    }

    fn create_framebuffer(&mut self) -> FramebufferId {
        self.framebuffers.push(Framebuffer::default());
        FramebufferId(self.framebuffers.len() as u32 - 1)
    }

    fn current_framebuffer(&self) -> FramebufferId {
        self.state.framebuffer
    }

    fn bind_framebuffer(&mut self, framebuffer: FramebufferId) {
        if (framebuffer.0 as usize) < self.framebuffers.len() {
            self.state.framebuffer = framebuffer;
        } else {
            log::warn!("Unknown framebuffer {framebuffer:?}");
        }
    }

    fn attach_texture(&mut self, attachment: Attachment, texture: TextureId, face: Option<CubeFace>) {
        if self.state.framebuffer == FramebufferId::DEFAULT {
            log::warn!("The default framebuffer has no attachments to replace");
            return;
        }
        if self.texture(texture).is_none() {
            log::warn!("Unknown texture {texture:?}");
            return;
        }
        let Some(framebuffer) = self.framebuffers.get_mut(self.state.framebuffer.0 as usize) else {
            return;
        };
        let attached = Some(Attached { texture, face });
        match attachment {
            Attachment::Color => framebuffer.color = attached,
            Attachment::Depth => framebuffer.depth = attached,
        }
    }

    fn viewport(&mut self, width: u32, height: u32) {
        self.state.viewport = (width, height);
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.state.clear_color = color;
    }

    fn clear(&mut self, buffer: ClearBuffer) {
        let target = self.pass_target();
        match buffer {
            ClearBuffer::Color if target.color.is_some() => {
                self.frame.clear_color(target, self.state.clear_color);
            }
            ClearBuffer::Depth if target.depth.is_some() => self.frame.clear_depth(target),
            _ => log::debug!("Clear of {buffer:?} ignored, nothing attached"),
        }
    }

    fn set_enabled(&mut self, capability: Capability, enabled: bool) {
        match capability {
            Capability::DepthTest => self.state.depth_test = enabled,
            Capability::CullFace => self.state.cull_face = enabled,
        }
    }

    fn is_enabled(&self, capability: Capability) -> bool {
        match capability {
            Capability::DepthTest => self.state.depth_test,
            Capability::CullFace => self.state.cull_face,
        }
    }

    fn set_depth_func(&mut self, func: DepthFunc) {
        self.state.depth_func = func;
    }

    fn depth_func(&self) -> DepthFunc {
        self.state.depth_func
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.state.units.insert(unit, texture);
    }

    fn draw_elements(&mut self, attributes: &[AttributeBinding], index: &IndexBinding) {
        self.record_draw(
            Topology::Triangles,
            attributes,
            DrawKind::Indexed {
                buffer: index.buffer,
                offset: index.offset,
                format: index.format,
                count: index.count,
            },
        );
    }

    fn draw_arrays(
        &mut self,
        topology: Topology,
        attributes: &[AttributeBinding],
        first: u32,
        count: u32,
    ) {
        self.record_draw(topology, attributes, DrawKind::Arrays { first, count });
    }
}

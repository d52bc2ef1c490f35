//! Cube-mapped background drawn behind all geometry.

use std::rc::Rc;

use anyhow::Context;
use cgmath::Matrix4;
use image::RgbaImage;

use crate::{
    camera::Camera,
    context::{
        AttributeBinding, BufferId, DepthFunc, RenderContext, TextureId, Topology, UniformValue,
        VertexBinding, VertexComponent,
    },
    data_structures::asset::Target,
    resources::texture::slice_cross,
    shader::{Shader, ShaderCache},
};

pub const SKYBOX_PROGRAM: &str = "skybox";
pub const SKYBOX_TEXTURE_UNIT: u32 = 0;

/// Unit cube, two triangles per face, counter-clockwise seen from inside.
#[rustfmt::skip]
const CUBE_VERTICES: [[f32; 3]; 36] = [
    [1.0, -1.0, -1.0], [1.0, 1.0, 1.0], [1.0, 1.0, -1.0],
    [1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0], [-1.0, 1.0, -1.0], [-1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0], [-1.0, 1.0, 1.0], [-1.0, -1.0, 1.0],
    [-1.0, 1.0, -1.0], [1.0, 1.0, 1.0], [-1.0, 1.0, 1.0],
    [-1.0, 1.0, -1.0], [1.0, 1.0, -1.0], [1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0], [-1.0, -1.0, 1.0], [1.0, -1.0, 1.0],
    [-1.0, -1.0, -1.0], [1.0, -1.0, 1.0], [1.0, -1.0, -1.0],
    [-1.0, -1.0, 1.0], [1.0, 1.0, 1.0], [1.0, -1.0, 1.0],
    [-1.0, -1.0, 1.0], [-1.0, 1.0, 1.0], [1.0, 1.0, 1.0],
    [-1.0, -1.0, -1.0], [1.0, -1.0, -1.0], [1.0, 1.0, -1.0],
    [-1.0, -1.0, -1.0], [1.0, 1.0, -1.0], [-1.0, 1.0, -1.0],
];

struct SkyboxGpu {
    cube: TextureId,
    vertices: BufferId,
    program: Rc<Shader>,
}

pub struct Skybox {
    image: RgbaImage,
    gpu: Option<SkyboxGpu>,
}

impl Skybox {
    /// `image` is a 4×3 horizontal cross, see [`crate::resources::texture::CROSS_LAYOUT`].
    pub fn new(image: RgbaImage) -> Self {
        Self { image, gpu: None }
    }

    pub fn cube_texture(&self) -> Option<TextureId> {
        self.gpu.as_ref().map(|gpu| gpu.cube)
    }

    pub fn init_gl(
        &mut self,
        ctx: &mut dyn RenderContext,
        shaders: &mut ShaderCache,
    ) -> anyhow::Result<()> {
        let faces = slice_cross(&self.image).context("invalid skybox image")?;
        let cube = ctx.create_cube_map(&faces);
        let vertices = ctx.create_buffer(Target::Vertex, bytemuck::cast_slice(&CUBE_VERTICES));
        let program = shaders.get_shader(ctx, SKYBOX_PROGRAM);
        log::debug!("Created skybox with {}px faces", faces[0].width());
        self.gpu = Some(SkyboxGpu {
            cube,
            vertices,
            program,
        });
        Ok(())
    }

    /// Draws into the bound framebuffer; expects the depth buffer to hold the
    /// scene. The depth function in effect on entry is restored afterwards.
    pub fn render(&self, ctx: &mut dyn RenderContext, camera: &Camera, projection: Matrix4<f32>) {
        let Some(gpu) = &self.gpu else {
            log::warn!("Skybox::render called before init_gl");
            return;
        };
        let program = &gpu.program;
        ctx.use_program(Some(program.program()));
        program.set_uniform(ctx, "projection_transform", projection);
        program.set_uniform(ctx, "view_transform", camera.rotation_transform());
        if let Some(location) = program.uniform_location("skybox_texture") {
            ctx.bind_texture(SKYBOX_TEXTURE_UNIT, gpu.cube);
            ctx.set_uniform(location, UniformValue::Unit(SKYBOX_TEXTURE_UNIT));
        }

        let mut attributes = Vec::with_capacity(1);
        if let Some(location) = program.attribute_location("position") {
            attributes.push(AttributeBinding {
                location,
                binding: VertexBinding {
                    buffer: gpu.vertices,
                    offset: 0,
                    stride: 12,
                    component: VertexComponent::F32,
                },
            });
        }
        // far plane depth is exactly 1.0, which only passes with <=
        let previous = ctx.depth_func();
        ctx.set_depth_func(DepthFunc::LessEqual);
        ctx.draw_arrays(Topology::Triangles, &attributes, 0, CUBE_VERTICES.len() as u32);
        ctx.set_depth_func(previous);
    }
}

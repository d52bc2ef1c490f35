//! GPU textures of the wgpu backend.
//!
//! [`Texture`] wraps a wgpu texture together with its default view, the
//! sampler it is read with and, for cube maps, one 2D view per face so that a
//! single face can be attached as a render target.

use image::RgbaImage;

use crate::{
    context::CubeFace,
    data_structures::asset::{self, MagFilter, MinFilter, Wrap},
    shader::TextureKind,
};

pub const COLOR_TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
pub const SRGB_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8UnormSrgb;

#[derive(Debug)]
pub struct Texture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    /// How shaders may declare this texture.
    pub kind: TextureKind,
    /// Per-face 2D views, cube maps only, in [`CubeFace::ALL`] order.
    pub face_views: Vec<wgpu::TextureView>,
}

impl Texture {
    pub fn format(&self) -> wgpu::TextureFormat {
        self.texture.format()
    }

    pub fn size(&self) -> (u32, u32) {
        (self.texture.width(), self.texture.height())
    }

    /// The view to render into, either the whole texture or one cube face.
    pub fn attachment_view(&self, face: Option<CubeFace>) -> &wgpu::TextureView {
        match face {
            Some(face) => self
                .face_views
                .get(face.layer() as usize)
                .unwrap_or(&self.view),
            None => &self.view,
        }
    }

    /// Uploads a full mip chain, level 0 first, as an sRGB texture.
    pub fn from_mip_chain(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        levels: &[RgbaImage],
        sampler: &asset::Sampler,
        label: &str,
    ) -> Self {
        let (width, height) = levels
            .first()
            .map(|level| level.dimensions())
            .unwrap_or((1, 1));
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width, height, 1),
            mip_level_count: levels.len().max(1) as u32,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SRGB_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (mip_level, level) in levels.iter().enumerate() {
            write_rgba(queue, &texture, level, mip_level as u32, 0);
        }
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let sampler = device.create_sampler(&sampler_descriptor(sampler, label));
        Self {
            texture,
            view,
            sampler,
            kind: TextureKind::D2,
            face_views: Vec::new(),
        }
    }

    /// A texture that can be both attached and sampled.
    pub fn render_target(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width.max(1), height.max(1), 1),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let is_depth = format.has_depth_aspect();
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            compare: is_depth.then_some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        Self {
            texture,
            view,
            sampler,
            kind: if is_depth {
                TextureKind::Depth2d
            } else {
                TextureKind::D2
            },
            face_views: Vec::new(),
        }
    }

    /// Depth cube map read through a `<=` comparison sampler.
    pub fn shadow_cube(device: &wgpu::Device, size: u32, label: &str) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(size.max(1), size.max(1), 6),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        Self::cube(texture, sampler, TextureKind::DepthCube)
    }

    /// Colour cube map from six faces in [`CubeFace::ALL`] order.
    pub fn color_cube(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        faces: &[RgbaImage; 6],
        label: &str,
    ) -> Self {
        let (width, height) = faces[0].dimensions();
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: extent(width.max(1), height.max(1), 6),
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: SRGB_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        for (layer, face) in faces.iter().enumerate() {
            write_rgba(queue, &texture, face, 0, layer as u32);
        }
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some(label),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Nearest,
            ..Default::default()
        });
        Self::cube(texture, sampler, TextureKind::Cube)
    }

    /// Stand-in bound to a texture unit the caller left empty.
    pub fn fallback(device: &wgpu::Device, queue: &wgpu::Queue, kind: TextureKind) -> Self {
        match kind {
            TextureKind::D2 => {
                let white = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
                Self::from_mip_chain(
                    device,
                    queue,
                    &[white],
                    &asset::Sampler::default(),
                    "fallback 2d",
                )
            }
            TextureKind::Depth2d => {
                Self::render_target(device, DEPTH_FORMAT, 1, 1, "fallback depth")
            }
            TextureKind::Cube => {
                let white = RgbaImage::from_pixel(1, 1, image::Rgba([255, 255, 255, 255]));
                let faces = [(); 6].map(|_| white.clone());
                Self::color_cube(device, queue, &faces, "fallback cube")
            }
            TextureKind::DepthCube => Self::shadow_cube(device, 1, "fallback shadow cube"),
        }
    }

    fn cube(texture: wgpu::Texture, sampler: wgpu::Sampler, kind: TextureKind) -> Self {
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });
        let face_views = CubeFace::ALL
            .iter()
            .map(|face| {
                texture.create_view(&wgpu::TextureViewDescriptor {
                    dimension: Some(wgpu::TextureViewDimension::D2),
                    base_array_layer: face.layer(),
                    array_layer_count: Some(1),
                    ..Default::default()
                })
            })
            .collect();
        Self {
            texture,
            view,
            sampler,
            kind,
            face_views,
        }
    }
}

fn extent(width: u32, height: u32, layers: u32) -> wgpu::Extent3d {
    wgpu::Extent3d {
        width,
        height,
        depth_or_array_layers: layers,
    }
}

fn write_rgba(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    image: &RgbaImage,
    mip_level: u32,
    layer: u32,
) {
    let (width, height) = image.dimensions();
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            aspect: wgpu::TextureAspect::All,
            texture,
            mip_level,
            origin: wgpu::Origin3d {
                x: 0,
                y: 0,
                z: layer,
            },
        },
        image,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * width),
            rows_per_image: Some(height),
        },
        extent(width, height, 1),
    );
}

fn address_mode(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrap::MirroredRepeat => wgpu::AddressMode::MirrorRepeat,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
    }
}

/// Maps asset sampler state onto wgpu. Non-mipmapped minification is
/// emulated by clamping the LOD to the base level.
pub fn sampler_descriptor<'a>(
    sampler: &asset::Sampler,
    label: &'a str,
) -> wgpu::SamplerDescriptor<'a> {
    use wgpu::{FilterMode as F, MipmapFilterMode as M};

    let mag_filter = match sampler.effective_mag_filter() {
        MagFilter::Nearest => F::Nearest,
        MagFilter::Linear => F::Linear,
    };
    let (min_filter, mipmap_filter) = match sampler.effective_min_filter() {
        MinFilter::Nearest | MinFilter::NearestMipmapNearest => (F::Nearest, M::Nearest),
        MinFilter::Linear | MinFilter::LinearMipmapNearest => (F::Linear, M::Nearest),
        MinFilter::NearestMipmapLinear => (F::Nearest, M::Linear),
        MinFilter::LinearMipmapLinear => (F::Linear, M::Linear),
    };
    let lod_max_clamp = if sampler.effective_min_filter().uses_mipmaps() {
        32.0
    } else {
        0.0
    };
    wgpu::SamplerDescriptor {
        label: Some(label),
        address_mode_u: address_mode(sampler.wrap_s),
        address_mode_v: address_mode(sampler.wrap_t),
        address_mode_w: wgpu::AddressMode::Repeat,
        mag_filter,
        min_filter,
        mipmap_filter,
        lod_min_clamp: 0.0,
        lod_max_clamp,
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_pass_declared_sampler_state_through() {
        let sampler = asset::Sampler::from_gl(Some(9728), Some(9985), 33071, 10497);
        let desc = sampler_descriptor(&sampler, "test");
        assert_eq!(desc.mag_filter, wgpu::FilterMode::Nearest);
        assert_eq!(desc.min_filter, wgpu::FilterMode::Linear);
        assert_eq!(desc.mipmap_filter, wgpu::MipmapFilterMode::Nearest);
        assert_eq!(desc.address_mode_u, wgpu::AddressMode::ClampToEdge);
        assert_eq!(desc.address_mode_v, wgpu::AddressMode::Repeat);
    }

    #[test]
    fn should_clamp_lod_without_mipmapped_minification() {
        let sampler = asset::Sampler::from_gl(None, Some(9729), 10497, 10497);
        assert_eq!(sampler_descriptor(&sampler, "test").lod_max_clamp, 0.0);
        let defaults = sampler_descriptor(&asset::Sampler::default(), "test");
        assert_eq!(defaults.mipmap_filter, wgpu::MipmapFilterMode::Linear);
        assert!(defaults.lod_max_clamp > 0.0);
    }
}

//! CPU-side image preparation: decoding, mip chains and cube-cross slicing.

use anyhow::{Context, bail};
use image::{ImageFormat, RgbaImage, imageops::FilterType, load_from_memory_with_format};

/// Decodes an encoded image into RGBA8.
///
/// * `mime_type` is an optional hint such as `image/png`; the format is
///   guessed from the bytes when it is absent or unknown.
pub fn decode_rgba(bytes: &[u8], mime_type: Option<&str>) -> anyhow::Result<RgbaImage> {
    let img = match mime_type.and_then(ImageFormat::from_mime_type) {
        Some(format) => load_from_memory_with_format(bytes, format)?,
        None => image::load_from_memory(bytes).context("unrecognised image format")?,
    };
    Ok(img.to_rgba8())
}

/// Number of levels of a full mip chain down to 1×1.
pub fn mip_level_count(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

/// Level 0 followed by successively halved copies.
pub fn mip_chain(base: RgbaImage) -> Vec<RgbaImage> {
    let count = mip_level_count(base.width(), base.height());
    let mut levels = Vec::with_capacity(count as usize);
    levels.push(base);
    for _ in 1..count {
        let Some(previous) = levels.last() else { break };
        let width = (previous.width() / 2).max(1);
        let height = (previous.height() / 2).max(1);
        let next = image::imageops::resize(previous, width, height, FilterType::Triangle);
        levels.push(next);
    }
    levels
}

/// Grid cell (column, row) of each face in a 4×3 horizontal cross, in
/// +X, −X, +Y, −Y, +Z, −Z order.
pub const CROSS_LAYOUT: [(u32, u32); 6] = [(2, 1), (0, 1), (1, 0), (1, 2), (1, 1), (3, 1)];

/// Cuts a horizontal-cross cube image into its six square faces.
pub fn slice_cross(image: &RgbaImage) -> anyhow::Result<[RgbaImage; 6]> {
    let (width, height) = image.dimensions();
    let size = width / 4;
    if size == 0 || width % 4 != 0 || height != size * 3 {
        bail!("a cube cross must be a 4x3 grid of square faces, got {width}x{height}");
    }
    Ok(CROSS_LAYOUT.map(|(column, row)| {
        image::imageops::crop_imm(image, column * size, row * size, size, size).to_image()
    }))
}

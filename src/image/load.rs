//! Image loading and luminance encoding.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage};
use ndarray::Array4;

use crate::error::{Error, Result};

use super::{LuminanceTensor, RasterImage, LUMA_CHANNELS};

/// Load an image from disk, ready for encoding.
///
/// The image is:
/// 1. Decoded from the specified path
/// 2. Converted to grayscale
/// 3. Resized to `width` x `height` with a bilinear filter
/// 4. Returned as an RGBA raster with R = G = B
///
/// # Errors
///
/// Returns an error if the image cannot be decoded or the target size is zero.
pub fn load_image<P: AsRef<Path>>(path: P, width: u32, height: u32) -> Result<RasterImage> {
    let path = path.as_ref();
    check_dimensions(width, height)?;

    let img = image::open(path).map_err(|source| Error::ImageLoad {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(prepare(&img, width, height))
}

/// Decode an in-memory image, ready for encoding.
///
/// `name` only labels the error when decoding fails.
///
/// # Errors
///
/// Returns an error if the bytes are not a supported image or the target size is zero.
pub fn load_image_from_memory(
    bytes: &[u8],
    name: &str,
    width: u32,
    height: u32,
) -> Result<RasterImage> {
    check_dimensions(width, height)?;

    let img = image::load_from_memory(bytes).map_err(|source| Error::ImageDecode {
        name: name.to_string(),
        source,
    })?;

    Ok(prepare(&img, width, height))
}

fn prepare(img: &DynamicImage, width: u32, height: u32) -> RasterImage {
    img.grayscale()
        .resize_exact(width, height, FilterType::Triangle)
        .to_rgba8()
}

fn check_dimensions(width: u32, height: u32) -> Result<()> {
    if width == 0 || height == 0 {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: "width and height must be non-zero".to_string(),
        });
    }
    Ok(())
}

/// BT.601 luma of an RGB triple, rounded to the nearest integer.
///
/// Computed in fixed point so exact halves always round up.
#[inline]
#[allow(clippy::cast_possible_truncation)]
#[must_use]
pub fn luminance(r: u8, g: u8, b: u8) -> u8 {
    let weighted = 299 * u32::from(r) + 587 * u32::from(g) + 114 * u32::from(b);
    // Safe: at most (255_000 + 500) / 1000 = 255
    ((weighted + 500) / 1000) as u8
}

/// Convert an RGBA raster to a normalized `(1, 1, H, W)` luminance tensor.
///
/// Alpha is discarded.
///
/// # Errors
///
/// Returns an error if the raster has a zero dimension.
pub fn image_to_tensor(img: &RasterImage) -> Result<LuminanceTensor> {
    let (width, height) = img.dimensions();
    check_dimensions(width, height)?;

    let data: Vec<f32> = img
        .pixels()
        .map(|p| f32::from(luminance(p[0], p[1], p[2])) / 255.0)
        .collect();

    Array4::from_shape_vec(
        (1, LUMA_CHANNELS, height as usize, width as usize),
        data,
    )
    .map_err(|err| Error::ShapeMismatch {
        expected: format!("[1, {LUMA_CHANNELS}, {height}, {width}]"),
        actual: err.to_string(),
    })
}

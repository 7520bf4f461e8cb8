//! Luminance decoding and image saving utilities.

use std::path::Path;

use image::{ImageBuffer, Rgba};

use crate::error::{Error, Result};
use crate::model::{OutputTensor, TensorData};

use super::RasterImage;

/// Save a raster to an image file.
///
/// The format is inferred from the extension. JPEG output drops alpha and uses
/// `quality` (1-100); every other format ignores it.
///
/// # Errors
///
/// Returns an error if the image cannot be encoded or written.
pub fn save_image<P: AsRef<Path>>(img: &RasterImage, path: P, quality: u8) -> Result<()> {
    let path = path.as_ref();

    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("png")
        .to_lowercase();

    match extension.as_str() {
        "jpg" | "jpeg" => {
            let mut output = std::fs::File::create(path)?;
            let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(&mut output, quality);
            image::DynamicImage::ImageRgba8(img.clone())
                .to_rgb8()
                .write_with_encoder(encoder)
                .map_err(|source| Error::ImageSave {
                    path: path.to_path_buf(),
                    source,
                })?;
        }
        _ => {
            img.save(path).map_err(|source| Error::ImageSave {
                path: path.to_path_buf(),
                source,
            })?;
        }
    }

    Ok(())
}

/// Expand a single-channel tensor into an opaque gray RGBA raster.
///
/// The i-th value becomes the i-th pixel in row-major order. Values are scaled
/// by 255 and clamped, so anything at or below 0 is black and anything at or
/// above 1 is white.
///
/// # Errors
///
/// Returns an error if the data is not float32, if its length is not
/// `width * height`, or if either dimension is zero.
pub fn tensor_to_image(data: &TensorData, width: u32, height: u32) -> Result<RasterImage> {
    let TensorData::Float32(values) = data else {
        return Err(Error::UnsupportedTensorEncoding {
            found: data.type_name(),
        });
    };

    if width == 0 || height == 0 {
        return Err(Error::UnsupportedDimensions {
            width,
            height,
            reason: "width and height must be non-zero".to_string(),
        });
    }

    let expected = width as usize * height as usize;
    if values.len() != expected {
        return Err(Error::ShapeMismatch {
            expected: format!("{expected} values ({width}x{height})"),
            actual: format!("{} values", values.len()),
        });
    }

    let mut pixels = Vec::with_capacity(expected * super::RGBA_CHANNELS);
    for &value in values {
        let p = denormalize(value);
        pixels.extend_from_slice(&[p, p, p, u8::MAX]);
    }

    ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, pixels).ok_or_else(|| {
        Error::ShapeMismatch {
            expected: format!("{width}x{height} RGBA buffer"),
            actual: "undersized buffer".to_string(),
        }
    })
}

/// Read `(width, height)` from a single-channel output tensor shape.
///
/// Accepts `[1, 1, H, W]`, `[1, H, W]`, and `[H, W]`.
///
/// # Errors
///
/// Returns an error for any other rank, batch, or channel count.
pub fn output_dimensions(tensor: &OutputTensor) -> Result<(u32, u32)> {
    let (h, w) = match tensor.shape.as_slice() {
        [1, 1, h, w] | [1, h, w] | [h, w] => (*h, *w),
        other => {
            return Err(Error::ShapeMismatch {
                expected: "[1, 1, H, W]".to_string(),
                actual: format!("{other:?}"),
            })
        }
    };

    let to_u32 = |v: usize| {
        u32::try_from(v).map_err(|_| Error::ShapeMismatch {
            expected: "dimension within u32".to_string(),
            actual: v.to_string(),
        })
    };

    Ok((to_u32(w)?, to_u32(h)?))
}

/// Denormalize a value from [0, 1] to [0, 255] with clamping.
#[inline]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn denormalize(value: f32) -> u8 {
    // Safe: clamped to [0, 255] range before casting; NaN saturates to 0
    (value * 255.0).round().clamp(0.0, 255.0) as u8
}

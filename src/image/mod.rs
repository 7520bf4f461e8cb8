//! Image loading, tensor conversion, presentation, and saving utilities.

mod load;
mod present;
mod save;

pub use load::{image_to_tensor, load_image, load_image_from_memory, luminance};
pub use present::{Canvas, Presentation};
pub use save::{output_dimensions, save_image, tensor_to_image};

use ndarray::Array4;

/// RGBA raster with 4 interleaved 8-bit channels per pixel.
pub type RasterImage = image::RgbaImage;

/// Luminance tensor in NCHW format (1, 1, height, width).
/// Values are normalized to [0, 1] and stored in standard row-major layout.
pub type LuminanceTensor = Array4<f32>;

/// Default input resolution of the demo model.
pub const DEFAULT_IMAGE_SIZE: u32 = 224;

/// Number of channels in a luminance tensor.
pub const LUMA_CHANNELS: usize = 1;

/// Number of interleaved channels in a raster pixel.
pub const RGBA_CHANNELS: usize = 4;

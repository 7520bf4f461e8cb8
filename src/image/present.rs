//! Side-by-side presentation of a pipeline run.

use std::time::Duration;

use image::{imageops, imageops::FilterType};

use crate::pipeline::RunOutput;

use super::RasterImage;

/// A fixed-size paintable surface.
#[derive(Debug, Clone)]
pub struct Canvas {
    pixels: RasterImage,
}

impl Canvas {
    /// Create a transparent canvas.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            pixels: RasterImage::new(width, height),
        }
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixels.width()
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixels.height()
    }

    /// Scale `img` to the canvas size and composite it at (0, 0).
    pub fn draw_image(&mut self, img: &RasterImage) {
        let scaled = imageops::resize(img, self.width(), self.height(), FilterType::Triangle);
        imageops::overlay(&mut self.pixels, &scaled, 0, 0);
    }

    /// Write `img` at (0, 0) without scaling or blending.
    ///
    /// Pixels outside the canvas are dropped.
    pub fn put_image_data(&mut self, img: &RasterImage) {
        imageops::replace(&mut self.pixels, img, 0, 0);
    }

    #[must_use]
    pub fn pixels(&self) -> &RasterImage {
        &self.pixels
    }
}

/// Two canvases (original and upscaled) plus a status line.
#[derive(Debug, Clone)]
pub struct Presentation {
    original: Canvas,
    upscaled: Canvas,
    status: String,
}

impl Presentation {
    /// Create a presentation whose canvases are each `width` x `height`.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            original: Canvas::new(width, height),
            upscaled: Canvas::new(width, height),
            status: String::new(),
        }
    }

    /// Paint a finished run onto both canvases.
    pub fn show(&mut self, run: &RunOutput) {
        self.original.draw_image(&run.original);
        self.upscaled.put_image_data(&run.upscaled);
        self.status = format_status(run.inference_time);
    }

    #[must_use]
    pub fn status(&self) -> &str {
        &self.status
    }

    #[must_use]
    pub fn original(&self) -> &Canvas {
        &self.original
    }

    #[must_use]
    pub fn upscaled(&self) -> &Canvas {
        &self.upscaled
    }

    /// Place both canvases next to each other in one raster.
    #[must_use]
    pub fn compose(&self) -> RasterImage {
        let (width, height) = (self.original.width(), self.original.height());
        let mut out = RasterImage::new(width * 2, height);
        imageops::replace(&mut out, self.original.pixels(), 0, 0);
        imageops::replace(&mut out, self.upscaled.pixels(), i64::from(width), 0);
        out
    }
}

fn format_status(elapsed: Duration) -> String {
    format!("Inference speed: {} seconds", elapsed.as_secs_f64())
}

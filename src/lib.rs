//! # superres
//!
//! A small grayscale super-resolution demo built around a pretrained ONNX model.
//!
//! A sample image is converted to a single-channel luminance tensor (`[1, 1, H, W]`,
//! values in `[0, 1]`), run through the model, and the output tensor is expanded back
//! into an opaque gray RGBA raster that can be shown next to the original.
//!
//! ## Example
//!
//! ```no_run
//! use superres::{Config, Pipeline, Presentation, Sample, SampleSet};
//!
//! # fn main() -> superres::Result<()> {
//! let config = Config {
//!     samples: SampleSet::new(vec![Sample::parse("samples/cat.png")]),
//!     ..Config::default()
//! };
//! let mut pipeline = Pipeline::new(config)?;
//!
//! let run = pipeline.run_random()?;
//! let mut presentation = Presentation::new(224, 224);
//! presentation.show(&run);
//! println!("{}", presentation.status());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod image;
pub mod model;
pub mod pipeline;

pub use error::{Error, Result};
pub use self::image::Presentation;
pub use pipeline::{Config, Pipeline, RunOutput, Sample, SampleSet};

//! Sample → tensor → model → raster pipeline.

use std::path::Path;
use std::time::Duration;

use rand::{rngs::StdRng, SeedableRng};

use crate::error::{Error, Result};
use crate::image::{
    image_to_tensor, load_image_from_memory, output_dimensions, save_image, tensor_to_image,
    RasterImage, DEFAULT_IMAGE_SIZE,
};
use crate::model::{Inference, ModelCache, ModelSource, OnnxModel, SessionOptions, SuperResolve};

use super::samples::{Sample, SampleSet};

/// Configuration for the super-resolution pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// Width the sample is resized to before encoding.
    pub width: u32,

    /// Height the sample is resized to before encoding.
    pub height: u32,

    /// Where to load the ONNX model from.
    pub model: ModelSource,

    /// Samples a run is picked from.
    pub samples: SampleSet,

    /// Number of intra-op threads for the inference session.
    pub intra_threads: usize,

    /// Output JPEG quality (1-100).
    pub output_quality: u8,

    /// Random seed for sample selection. None for random.
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            width: DEFAULT_IMAGE_SIZE,
            height: DEFAULT_IMAGE_SIZE,
            model: ModelSource::default(),
            samples: SampleSet::default(),
            intra_threads: 1,
            output_quality: 95,
            seed: None,
        }
    }
}

impl Config {
    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any parameter is out of valid range.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidParameter {
                name: "width/height".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if self.intra_threads == 0 {
            return Err(Error::InvalidParameter {
                name: "intra_threads".to_string(),
                reason: "must be greater than 0".to_string(),
            });
        }

        if !(1..=100).contains(&self.output_quality) {
            return Err(Error::InvalidParameter {
                name: "output_quality".to_string(),
                reason: "must be between 1 and 100".to_string(),
            });
        }

        if self.samples.is_empty() {
            return Err(Error::NoSamples);
        }

        Ok(())
    }
}

/// Everything a presentation layer needs from one run.
#[derive(Debug, Clone)]
pub struct RunOutput {
    /// Label of the sample that was processed.
    pub sample: String,
    /// The grayscale input at the configured resolution.
    pub original: RasterImage,
    /// The decoded model output, at the model's output resolution.
    pub upscaled: RasterImage,
    /// Time spent inside the model call.
    pub inference_time: Duration,
}

/// Super-resolution pipeline holding one loaded model.
pub struct Pipeline<M = OnnxModel> {
    config: Config,
    model: M,
    rng: StdRng,
}

impl Pipeline<OnnxModel> {
    /// Create a new pipeline with the given configuration.
    ///
    /// This will download the model if it is not already cached.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the model cannot be loaded.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;

        tracing::info!("Initializing pipeline with model {}", config.model);

        let cache = ModelCache::new()?;
        let model_path = cache.resolve(&config.model)?;

        tracing::info!("Loading {}...", config.model.name());
        let options = SessionOptions {
            intra_threads: config.intra_threads,
        };
        let model = OnnxModel::load(&model_path, &options)?;

        tracing::info!("Pipeline initialized successfully");

        Ok(Self::assemble(config, model))
    }
}

impl<M: SuperResolve> Pipeline<M> {
    /// Create a pipeline around an already loaded model.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid.
    pub fn with_model(config: Config, model: M) -> Result<Self> {
        config.validate()?;
        Ok(Self::assemble(config, model))
    }

    /// Build from an already validated configuration.
    fn assemble(config: Config, model: M) -> Self {
        let rng = config
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        Self { config, model, rng }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Save a raster with the configured output quality.
    ///
    /// # Errors
    ///
    /// Returns an error if the image cannot be encoded or written.
    pub fn save<P: AsRef<Path>>(&self, img: &RasterImage, path: P) -> Result<()> {
        save_image(img, path, self.config.output_quality)
    }

    /// Pick a sample at random and run it.
    ///
    /// # Errors
    ///
    /// Returns an error if any stage of [`Pipeline::run`] fails.
    pub fn run_random(&mut self) -> Result<RunOutput> {
        let sample = self.config.samples.pick(&mut self.rng)?.clone();
        self.run(&sample)
    }

    /// Run one sample through the pipeline.
    ///
    /// # Errors
    ///
    /// Returns an error if the sample cannot be fetched or decoded, if inference
    /// fails, or if the model output is not a single-channel float32 image.
    pub fn run(&mut self, sample: &Sample) -> Result<RunOutput> {
        tracing::info!("Processing sample: {} ({})", sample.label, sample.source);

        let bytes = sample.fetch()?;
        let original =
            load_image_from_memory(&bytes, &sample.label, self.config.width, self.config.height)?;

        let input = image_to_tensor(&original)?;
        tracing::debug!("Input tensor {:?}", input.shape());

        tracing::info!("Running inference...");
        let Inference { output, elapsed } = self.model.infer(&input)?;

        let (width, height) = output_dimensions(&output)?;
        let upscaled = tensor_to_image(&output.data, width, height)?;

        tracing::info!("Inference complete in {elapsed:.2?}, output {width}x{height}");

        Ok(RunOutput {
            sample: sample.label.clone(),
            original,
            upscaled,
            inference_time: elapsed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{OutputTensor, TensorData};
    use image::Rgba;

    /// Nearest-neighbour upscaler standing in for the ONNX model.
    struct Nearest {
        scale: usize,
        calls: usize,
    }

    impl SuperResolve for Nearest {
        fn infer(&mut self, input: &crate::image::LuminanceTensor) -> Result<Inference> {
            self.calls += 1;
            let (_, _, h, w) = input.dim();
            let (oh, ow) = (h * self.scale, w * self.scale);
            let mut data = Vec::with_capacity(oh * ow);
            for y in 0..oh {
                for x in 0..ow {
                    data.push(input[[0, 0, y / self.scale, x / self.scale]]);
                }
            }
            Ok(Inference {
                output: OutputTensor {
                    shape: vec![1, 1, oh, ow],
                    data: TensorData::Float32(data),
                },
                elapsed: Duration::from_millis(3),
            })
        }
    }

    /// Returns a fixed output regardless of input.
    struct Fixed(OutputTensor);

    impl SuperResolve for Fixed {
        fn infer(&mut self, _input: &crate::image::LuminanceTensor) -> Result<Inference> {
            Ok(Inference {
                output: self.0.clone(),
                elapsed: Duration::ZERO,
            })
        }
    }

    fn write_sample(dir: &Path, name: &str, value: u8) -> Sample {
        let path = dir.join(name);
        RasterImage::from_pixel(16, 8, Rgba([value, value, value, 255]))
            .save(&path)
            .unwrap();
        Sample::parse(path.to_str().unwrap())
    }

    fn config(samples: Vec<Sample>) -> Config {
        Config {
            width: 4,
            height: 4,
            samples: SampleSet::new(samples),
            seed: Some(1),
            ..Config::default()
        }
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let sample = Sample::parse("x.png");
        assert!(matches!(
            Config { width: 0, ..config(vec![sample.clone()]) }.validate(),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            Config { output_quality: 0, ..config(vec![sample.clone()]) }.validate(),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(
            Config { intra_threads: 0, ..config(vec![sample]) }.validate(),
            Err(Error::InvalidParameter { .. })
        ));
        assert!(matches!(config(vec![]).validate(), Err(Error::NoSamples)));
    }

    #[test]
    fn test_with_model_rejects_invalid_config() {
        let result = Pipeline::with_model(
            Config { height: 0, ..config(vec![Sample::parse("x.png")]) },
            Nearest { scale: 2, calls: 0 },
        );
        assert!(matches!(result, Err(Error::InvalidParameter { .. })));
    }

    #[test]
    fn test_run_upscales_gray_sample() {
        let dir = tempfile::tempdir().unwrap();
        let sample = write_sample(dir.path(), "gray.png", 120);
        let mut pipeline = Pipeline::with_model(
            config(vec![sample.clone()]),
            Nearest { scale: 3, calls: 0 },
        )
        .unwrap();

        let out = pipeline.run(&sample).unwrap();

        assert_eq!(out.sample, "gray.png");
        assert_eq!(out.original.dimensions(), (4, 4));
        assert_eq!(out.upscaled.dimensions(), (12, 12));
        assert!(out.upscaled.pixels().all(|p| *p == Rgba([120, 120, 120, 255])));
        assert_eq!(out.inference_time, Duration::from_millis(3));
    }

    #[test]
    fn test_model_loaded_once_across_runs() {
        let dir = tempfile::tempdir().unwrap();
        let samples = vec![
            write_sample(dir.path(), "a.png", 10),
            write_sample(dir.path(), "b.png", 200),
        ];
        let mut pipeline =
            Pipeline::with_model(config(samples), Nearest { scale: 2, calls: 0 }).unwrap();

        for _ in 0..5 {
            let out = pipeline.run_random().unwrap();
            assert!(out.sample == "a.png" || out.sample == "b.png");
        }
        assert_eq!(pipeline.model.calls, 5);
    }

    #[test]
    fn test_integer_output_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sample = write_sample(dir.path(), "s.png", 50);
        let model = Fixed(OutputTensor {
            shape: vec![1, 1, 2, 2],
            data: TensorData::Int64(vec![1; 4]),
        });
        let mut pipeline = Pipeline::with_model(config(vec![sample.clone()]), model).unwrap();

        assert!(matches!(
            pipeline.run(&sample),
            Err(Error::UnsupportedTensorEncoding { found: "int64" })
        ));
    }

    #[test]
    fn test_mismatched_output_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let sample = write_sample(dir.path(), "s.png", 50);
        let model = Fixed(OutputTensor {
            shape: vec![1, 1, 3, 3],
            data: TensorData::Float32(vec![0.5; 8]),
        });
        let mut pipeline = Pipeline::with_model(config(vec![sample.clone()]), model).unwrap();

        assert!(matches!(
            pipeline.run(&sample),
            Err(Error::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_undecodable_sample_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.png");
        std::fs::write(&path, b"definitely not a png").unwrap();
        let sample = Sample::parse(path.to_str().unwrap());
        let mut pipeline = Pipeline::with_model(
            config(vec![sample.clone()]),
            Nearest { scale: 2, calls: 0 },
        )
        .unwrap();

        assert!(matches!(
            pipeline.run(&sample),
            Err(Error::ImageDecode { .. })
        ));
        assert_eq!(pipeline.model.calls, 0);
    }

    #[test]
    fn test_save_uses_configured_quality() {
        let dir = tempfile::tempdir().unwrap();
        let sample = write_sample(dir.path(), "s.png", 50);
        let mut noisy = RasterImage::new(64, 64);
        for (x, y, px) in noisy.enumerate_pixels_mut() {
            let v = u8::try_from((x * 37 + y * 91 + x * y) % 256).unwrap();
            *px = Rgba([v, v, v, 255]);
        }

        let low = Pipeline::with_model(
            Config { output_quality: 10, ..config(vec![sample.clone()]) },
            Nearest { scale: 2, calls: 0 },
        )
        .unwrap();
        let high = Pipeline::with_model(
            Config { output_quality: 100, ..config(vec![sample]) },
            Nearest { scale: 2, calls: 0 },
        )
        .unwrap();
        let low_path = dir.path().join("low.jpg");
        let high_path = dir.path().join("high.jpg");
        low.save(&noisy, &low_path).unwrap();
        high.save(&noisy, &high_path).unwrap();

        let low_size = std::fs::metadata(&low_path).unwrap().len();
        let high_size = std::fs::metadata(&high_path).unwrap().len();
        assert!(low_size < high_size, "{low_size} >= {high_size}");
    }
}

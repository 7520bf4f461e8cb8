//! ONNX Runtime session wrapper and the inference boundary types.

use std::path::Path;
use std::time::{Duration, Instant};

use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Tensor;

use crate::error::{Error, Result};
use crate::image::LuminanceTensor;

/// Anything that can upscale a luminance tensor.
pub trait SuperResolve {
    /// Run one inference pass.
    ///
    /// # Errors
    ///
    /// Returns an error if the model fails or its output cannot be read.
    fn infer(&mut self, input: &LuminanceTensor) -> Result<Inference>;
}

/// Element data of a model output, tagged with the type the runtime returned.
#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    Int64(Vec<i64>),
    Int32(Vec<i32>),
    Uint8(Vec<u8>),
}

impl TensorData {
    /// ONNX name of the element type.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Float32(_) => "float32",
            Self::Float64(_) => "float64",
            Self::Int64(_) => "int64",
            Self::Int32(_) => "int32",
            Self::Uint8(_) => "uint8",
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Float32(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Int64(v) => v.len(),
            Self::Int32(v) => v.len(),
            Self::Uint8(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A model output tensor copied out of the runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputTensor {
    pub shape: Vec<usize>,
    pub data: TensorData,
}

impl OutputTensor {
    fn from_runtime(dims: &[i64], data: TensorData) -> Result<Self> {
        let shape = dims
            .iter()
            .map(|&d| usize::try_from(d))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| Error::ShapeMismatch {
                expected: "non-negative dimensions".to_string(),
                actual: format!("{dims:?}"),
            })?;

        let count: usize = shape.iter().product();
        if count != data.len() {
            return Err(Error::ShapeMismatch {
                expected: format!("{count} elements for {shape:?}"),
                actual: format!("{} elements", data.len()),
            });
        }

        Ok(Self { shape, data })
    }
}

/// Result of one inference pass.
#[derive(Debug, Clone)]
pub struct Inference {
    pub output: OutputTensor,
    pub elapsed: Duration,
}

/// Session settings for [`OnnxModel::load`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Number of intra-op threads.
    pub intra_threads: usize,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self { intra_threads: 1 }
    }
}

/// A super-resolution model held in a single ONNX Runtime session.
///
/// The session is created once and released when this value is dropped.
pub struct OnnxModel {
    session: Session,
    input_name: String,
    output_name: String,
}

impl OnnxModel {
    /// Load a model from disk with full graph optimization.
    ///
    /// # Errors
    ///
    /// Returns an error if the runtime cannot build a session from the file,
    /// or if the model has no inputs or outputs.
    pub fn load<P: AsRef<Path>>(path: P, options: &SessionOptions) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();

        let session = build_session(path, options).map_err(|source| Error::ModelLoad {
            name: name.clone(),
            source,
        })?;

        let input_name = session
            .inputs()
            .first()
            .map(|input| input.name().to_string())
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "at least one model input".to_string(),
                actual: "no inputs".to_string(),
            })?;
        let output_name = session
            .outputs()
            .first()
            .map(|output| output.name().to_string())
            .ok_or_else(|| Error::ShapeMismatch {
                expected: "at least one model output".to_string(),
                actual: "no outputs".to_string(),
            })?;

        tracing::info!("Model session created for {name} ({input_name} -> {output_name})");

        Ok(Self {
            session,
            input_name,
            output_name,
        })
    }

    #[must_use]
    pub fn input_name(&self) -> &str {
        &self.input_name
    }

    #[must_use]
    pub fn output_name(&self) -> &str {
        &self.output_name
    }
}

fn build_session(path: &Path, options: &SessionOptions) -> ort::Result<Session> {
    let session = Session::builder()?
        .with_optimization_level(GraphOptimizationLevel::Level3)?
        .with_intra_threads(options.intra_threads)?
        .commit_from_file(path)?;
    Ok(session)
}

impl SuperResolve for OnnxModel {
    fn infer(&mut self, input: &LuminanceTensor) -> Result<Inference> {
        let input_value =
            Tensor::from_array(input.clone()).map_err(|source| Error::Inference { source })?;

        let start = Instant::now();
        let outputs = self
            .session
            .run(ort::inputs![self.input_name.as_str() => &input_value])
            .map_err(|source| Error::Inference { source })?;
        let elapsed = start.elapsed();

        let value = &outputs[self.output_name.as_str()];

        // Keep the element type so the decoder can reject non-float output.
        let output = if let Ok((shape, data)) = value.try_extract_tensor::<f32>() {
            OutputTensor::from_runtime(shape, TensorData::Float32(data.to_vec()))?
        } else if let Ok((shape, data)) = value.try_extract_tensor::<f64>() {
            OutputTensor::from_runtime(shape, TensorData::Float64(data.to_vec()))?
        } else if let Ok((shape, data)) = value.try_extract_tensor::<i64>() {
            OutputTensor::from_runtime(shape, TensorData::Int64(data.to_vec()))?
        } else if let Ok((shape, data)) = value.try_extract_tensor::<i32>() {
            OutputTensor::from_runtime(shape, TensorData::Int32(data.to_vec()))?
        } else {
            let (shape, data) = value
                .try_extract_tensor::<u8>()
                .map_err(|source| Error::Inference { source })?;
            OutputTensor::from_runtime(shape, TensorData::Uint8(data.to_vec()))?
        };

        tracing::debug!(
            "Inference output {:?} ({}) in {elapsed:.2?}",
            output.shape,
            output.data.type_name()
        );

        Ok(Inference { output, elapsed })
    }
}

impl Drop for OnnxModel {
    fn drop(&mut self) {
        tracing::debug!("Releasing model session");
    }
}

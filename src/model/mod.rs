//! Super-resolution model loading and the inference boundary.

mod loader;
mod session;

pub(crate) use loader::is_url;
pub use loader::{ModelCache, ModelSource, DEFAULT_MODEL_URL};
pub use session::{Inference, OnnxModel, OutputTensor, SessionOptions, SuperResolve, TensorData};

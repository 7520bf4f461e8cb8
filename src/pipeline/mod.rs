//! Super-resolution demo pipeline.

mod runner;
mod samples;

pub use runner::{Config, Pipeline, RunOutput};
pub use samples::{Sample, SampleSet, SampleSource};

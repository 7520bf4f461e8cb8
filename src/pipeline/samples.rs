//! Sample images the demo picks from.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;

use crate::error::{Error, Result};
use crate::model::is_url;

const IMAGE_EXTENSIONS: [&str; 6] = ["png", "jpg", "jpeg", "bmp", "gif", "webp"];

/// Where a sample image lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SampleSource {
    Path(PathBuf),
    Url(String),
}

impl fmt::Display for SampleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

/// A labelled sample image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sample {
    pub label: String,
    pub source: SampleSource,
}

impl Sample {
    /// Build a sample from a CLI argument. `http://` and `https://` are URLs.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        let source = if is_url(value) {
            SampleSource::Url(value.to_string())
        } else {
            SampleSource::Path(PathBuf::from(value))
        };
        let label = value
            .rsplit(['/', '\\'])
            .find(|s| !s.is_empty())
            .unwrap_or(value)
            .to_string();
        Self { label, source }
    }

    /// Read the raw encoded bytes of the sample.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the download fails.
    pub fn fetch(&self) -> Result<Vec<u8>> {
        match &self.source {
            SampleSource::Path(path) => Ok(fs::read(path)?),
            SampleSource::Url(url) => {
                tracing::debug!("Fetching sample {url}");
                let to_err = |source| Error::AssetFetch {
                    url: url.clone(),
                    source,
                };
                let response = reqwest::blocking::get(url)
                    .and_then(reqwest::blocking::Response::error_for_status)
                    .map_err(to_err)?;
                let bytes = response.bytes().map_err(to_err)?;
                Ok(bytes.to_vec())
            }
        }
    }
}

/// The set of samples a run is picked from.
#[derive(Debug, Clone, Default)]
pub struct SampleSet {
    samples: Vec<Sample>,
}

impl SampleSet {
    #[must_use]
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Collect every image file directly inside `dir`, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn from_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir.as_ref())? {
            let path = entry?.path();
            if path.is_file() && has_image_extension(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        let samples = paths
            .into_iter()
            .map(|path| Sample {
                label: path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                source: SampleSource::Path(path),
            })
            .collect();

        Ok(Self { samples })
    }

    pub fn extend(&mut self, other: Self) {
        self.samples.extend(other.samples);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    /// Pick one sample uniformly at random.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoSamples`] if the set is empty.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<&Sample> {
        if self.samples.is_empty() {
            return Err(Error::NoSamples);
        }
        Ok(&self.samples[rng.random_range(0..self.samples.len())])
    }
}

fn has_image_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_lowercase().as_str()))
}

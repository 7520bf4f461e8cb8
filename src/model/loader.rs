//! Model resolution, downloading, and caching.

use std::fmt;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Sub-pixel CNN super-resolution model from the ONNX model zoo.
/// Input `[1, 1, 224, 224]`, output `[1, 1, 672, 672]`.
pub const DEFAULT_MODEL_URL: &str = "https://github.com/onnx/models/raw/main/validated/vision/super_resolution/sub_pixel_cnn_2016/model/super-resolution-10.onnx";

/// Approximate size of the default model, used until the server reports one.
const DEFAULT_APPROX_SIZE: u64 = 240_000;

/// Where to get the ONNX model from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSource {
    /// A model file on disk.
    Path(PathBuf),
    /// A model to download into the cache on first use.
    Url(String),
}

impl ModelSource {
    /// Interpret a CLI argument: `http://` and `https://` are URLs, anything else a path.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if is_url(value) {
            Self::Url(value.to_string())
        } else {
            Self::Path(PathBuf::from(value))
        }
    }

    /// Name used in logs and errors.
    #[must_use]
    pub fn name(&self) -> String {
        match self {
            Self::Path(path) => path
                .file_name()
                .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned()),
            Self::Url(url) => url_file_name(url),
        }
    }
}

impl Default for ModelSource {
    fn default() -> Self {
        Self::Url(DEFAULT_MODEL_URL.to_string())
    }
}

impl fmt::Display for ModelSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => write!(f, "{}", path.display()),
            Self::Url(url) => f.write_str(url),
        }
    }
}

pub(crate) fn is_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

/// Last path segment of a URL, query stripped.
fn url_file_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or("model.onnx")
        .to_string()
}

/// File name a URL is cached under. Prefixed with a digest of the full URL so
/// sources sharing a file name never share a cache entry.
fn cache_file_name(url: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(url.as_bytes()));
    format!("{}-{}", &digest[..16], url_file_name(url))
}

/// Manages the model cache directory and downloads.
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a new model cache.
    ///
    /// Uses the platform-appropriate cache directory:
    /// - Windows: `%LOCALAPPDATA%\superres\models`
    /// - Linux: `~/.cache/superres/models`
    /// - macOS: `~/Library/Caches/superres/models`
    ///
    /// # Errors
    ///
    /// Returns an error if the cache directory cannot be created.
    pub fn new() -> Result<Self> {
        let base = dirs::cache_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::with_dir(base.join("superres").join("models"))
    }

    /// Create a cache rooted at `cache_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created.
    pub fn with_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();

        fs::create_dir_all(&cache_dir).map_err(|source| Error::CacheDir {
            path: cache_dir.clone(),
            source,
        })?;

        Ok(Self { cache_dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the path to a model file, downloading if necessary.
    ///
    /// # Errors
    ///
    /// Returns an error if the model cannot be downloaded or accessed.
    pub fn resolve(&self, source: &ModelSource) -> Result<PathBuf> {
        match source {
            ModelSource::Path(path) => {
                if !path.is_file() {
                    return Err(Error::Io(std::io::Error::new(
                        std::io::ErrorKind::NotFound,
                        format!("model file not found: {}", path.display()),
                    )));
                }
                Ok(path.clone())
            }
            ModelSource::Url(url) => {
                let name = cache_file_name(url);
                let path = self.cache_dir.join(&name);
                if path.exists() {
                    tracing::debug!("Using cached model {}", path.display());
                } else {
                    download_file(url, &path, &name, DEFAULT_APPROX_SIZE)?;
                }
                Ok(path)
            }
        }
    }
}

/// Download a file from a URL to a path with progress indication.
fn download_file(url: &str, path: &Path, name: &str, approx_size: u64) -> Result<()> {
    tracing::info!("Downloading {name} from {url}");

    let client = reqwest::blocking::Client::new();
    let response = client
        .get(url)
        .send()
        .and_then(reqwest::blocking::Response::error_for_status)
        .map_err(|source| Error::ModelDownload {
            name: name.to_string(),
            source,
        })?;

    let total_size = response.content_length().unwrap_or(approx_size);

    let pb = ProgressBar::new(total_size);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
            .expect("valid template")
            .progress_chars("#>-"),
    );
    pb.set_message(format!("Downloading {name}"));

    let result = write_atomically(path, &mut pb.wrap_read(response));
    match &result {
        Ok(()) => pb.finish_with_message(format!("Downloaded {name}")),
        Err(_) => pb.abandon_with_message(format!("Failed to download {name}")),
    }
    result
}

/// Stream `reader` into a temporary sibling of `path`, then rename it into place.
///
/// The temporary file is removed if anything fails before the rename.
fn write_atomically<R: Read>(path: &Path, reader: &mut R) -> Result<()> {
    let temp_path = path.with_extension("tmp");

    let written = fs::File::create(&temp_path).and_then(|mut file| {
        io::copy(reader, &mut file)?;
        file.sync_all()
    });
    if let Err(err) = written {
        if let Err(cleanup) = fs::remove_file(&temp_path) {
            tracing::warn!("Could not remove {}: {cleanup}", temp_path.display());
        }
        return Err(err.into());
    }

    fs::rename(&temp_path, path)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_source() {
        assert_eq!(
            ModelSource::parse("https://example.com/m.onnx"),
            ModelSource::Url("https://example.com/m.onnx".to_string())
        );
        assert_eq!(
            ModelSource::parse("models/m.onnx"),
            ModelSource::Path(PathBuf::from("models/m.onnx"))
        );
    }

    #[test]
    fn test_url_file_name() {
        assert_eq!(url_file_name(DEFAULT_MODEL_URL), "super-resolution-10.onnx");
        assert_eq!(
            url_file_name("https://example.com/a/b.onnx?download=1"),
            "b.onnx"
        );
        assert_eq!(url_file_name("https://example.com/dir/"), "dir");
    }

    #[test]
    fn test_cache_file_name_keyed_by_url() {
        let a = cache_file_name("https://a.example/x/model.onnx");
        let b = cache_file_name("https://b.example/y/model.onnx");

        assert_ne!(a, b);
        assert!(a.ends_with("-model.onnx"));
        assert!(b.ends_with("-model.onnx"));
        assert_eq!(a, cache_file_name("https://a.example/x/model.onnx"));
    }

    #[test]
    fn test_resolve_local_path() {
        let dir = tempfile::tempdir().unwrap();
        let model = dir.path().join("local.onnx");
        fs::write(&model, b"onnx").unwrap();
        let cache = ModelCache::with_dir(dir.path().join("cache")).unwrap();

        assert!(cache.dir().is_dir());
        assert_eq!(cache.resolve(&ModelSource::Path(model.clone())).unwrap(), model);
    }

    #[test]
    fn test_resolve_missing_path() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::with_dir(dir.path()).unwrap();
        let err = cache
            .resolve(&ModelSource::Path(dir.path().join("missing.onnx")))
            .unwrap_err();

        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_resolve_cached_url_skips_download() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::with_dir(dir.path()).unwrap();
        let url = "https://invalid.invalid/cached.onnx";
        let cached = dir.path().join(cache_file_name(url));
        fs::write(&cached, b"onnx").unwrap();

        let source = ModelSource::Url(url.to_string());
        assert_eq!(cache.resolve(&source).unwrap(), cached);
    }

    #[test]
    fn test_same_file_name_urls_resolve_apart() {
        let dir = tempfile::tempdir().unwrap();
        let cache = ModelCache::with_dir(dir.path()).unwrap();
        let first = "https://a.invalid/x/model.onnx";
        let second = "https://b.invalid/y/model.onnx";
        fs::write(dir.path().join(cache_file_name(first)), b"first").unwrap();
        fs::write(dir.path().join(cache_file_name(second)), b"second").unwrap();

        let first_path = cache.resolve(&ModelSource::Url(first.to_string())).unwrap();
        let second_path = cache.resolve(&ModelSource::Url(second.to_string())).unwrap();

        assert_ne!(first_path, second_path);
        assert_eq!(fs::read(first_path).unwrap(), b"first");
        assert_eq!(fs::read(second_path).unwrap(), b"second");
    }

    /// Yields some bytes, then fails.
    struct BrokenReader {
        sent: bool,
    }

    impl Read for BrokenReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.sent {
                return Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
            }
            self.sent = true;
            buf[..4].copy_from_slice(b"onnx");
            Ok(4)
        }
    }

    #[test]
    fn test_write_atomically() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.onnx");

        write_atomically(&path, &mut &b"weights"[..]).unwrap();

        assert_eq!(fs::read(&path).unwrap(), b"weights");
        assert!(!dir.path().join("m.tmp").exists());
    }

    #[test]
    fn test_write_atomically_cleans_up_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("m.onnx");

        let err = write_atomically(&path, &mut BrokenReader { sent: false }).unwrap_err();

        assert!(matches!(err, Error::Io(_)));
        assert!(!path.exists());
        assert!(!dir.path().join("m.tmp").exists());
    }

    #[test]
    fn test_source_name() {
        assert_eq!(ModelSource::default().name(), "super-resolution-10.onnx");
        assert_eq!(
            ModelSource::Path(PathBuf::from("/tmp/x/sr.onnx")).name(),
            "sr.onnx"
        );
    }
}

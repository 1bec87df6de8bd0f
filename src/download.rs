//! Model downloading and resolution
//!
//! `ModelDownloader` streams a model file into the cache with SHA-256
//! verification and an atomic rename. `ModelResolver` turns a `ModelSpec`
//! into a local file, downloading presets and URLs on first use.

use crate::cache::{ModelCache, PARTIAL_SUFFIX};
use crate::error::{BgRemovalError, Result};
use crate::models::{ModelManager, ModelSource, ModelSpec};
use crate::tracing_config::spans;
use futures_util::stream::TryStreamExt;
#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::Client;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio_util::io::StreamReader;
use tracing::Instrument;

/// Upper bound on a single model download
const DOWNLOAD_TIMEOUT_SECS: u64 = 300;

/// Progress bar abstraction that works with and without CLI features
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

impl ProgressIndicator {
    fn new(show_progress: bool) -> Self {
        #[cfg(feature = "cli")]
        if show_progress {
            let pb = ProgressBar::new(0);
            if let Ok(style) = ProgressStyle::default_bar().template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}",
            ) {
                pb.set_style(style.progress_chars("#>-"));
            }
            return Self::Indicatif(pb);
        }
        #[cfg(not(feature = "cli"))]
        let _ = show_progress;
        Self::NoOp
    }

    pub fn set_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }

    pub fn set_length(&self, len: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_length(len),
            Self::NoOp => {
                let _ = len;
            },
        }
    }

    pub fn set_position(&self, pos: u64) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.set_position(pos),
            Self::NoOp => {
                let _ = pos;
            },
        }
    }

    pub fn finish_with_message(&self, msg: String) {
        match self {
            #[cfg(feature = "cli")]
            Self::Indicatif(pb) => pb.finish_with_message(msg),
            Self::NoOp => {
                let _ = msg;
            },
        }
    }
}

/// Lowercase hex SHA-256 of `data`
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

/// Model downloader with progress reporting
#[derive(Debug, Clone)]
pub struct ModelDownloader {
    client: Client,
    cache: ModelCache,
}

impl ModelDownloader {
    /// Create a downloader writing into `cache`
    ///
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(cache: ModelCache) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(DOWNLOAD_TIMEOUT_SECS))
            .build()
            .map_err(|e| BgRemovalError::network_error("Failed to create HTTP client", e))?;

        Ok(Self { client, cache })
    }

    /// Download `url` into the cache as `file_name` unless it is already there
    ///
    /// The body is streamed into `<file_name>.part` while being hashed. When
    /// `expected_sha256` is given and does not match, the partial file is
    /// deleted and an error returned; otherwise it is renamed into place.
    ///
    /// # Errors
    /// - Network errors or non-success HTTP status
    /// - Checksum mismatch
    /// - File system errors while writing the cache
    pub async fn download(
        &self,
        url: &str,
        file_name: &str,
        expected_sha256: Option<&str>,
        show_progress: bool,
    ) -> Result<PathBuf> {
        let final_path = self.cache.model_path(file_name);
        if self.cache.is_cached(file_name) {
            log::info!("Model already cached: {}", final_path.display());
            return Ok(final_path);
        }

        log::info!("Downloading model from: {}", url);
        let partial_path = final_path.with_file_name(format!("{}.{}", file_name, PARTIAL_SUFFIX));
        let progress = ProgressIndicator::new(show_progress);
        progress.set_message(format!("Downloading {}", file_name));

        let digest = match self
            .stream_to_file(url, &partial_path, &progress)
            .instrument(spans::download(url, &final_path))
            .await
        {
            Ok(digest) => digest,
            Err(e) => {
                Self::remove_partial(&partial_path).await;
                progress.finish_with_message("❌ Download failed".to_string());
                return Err(e);
            },
        };

        if let Some(expected) = expected_sha256 {
            if !digest.eq_ignore_ascii_case(expected.trim()) {
                Self::remove_partial(&partial_path).await;
                progress.finish_with_message("❌ Checksum mismatch".to_string());
                return Err(BgRemovalError::model(format!(
                    "Checksum mismatch for {}: expected {}, got {}",
                    url, expected, digest
                )));
            }
        }

        tokio::fs::rename(&partial_path, &final_path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("move downloaded model", &final_path, &e))?;

        progress.finish_with_message(format!("✅ Downloaded {}", file_name));
        log::info!("Model saved to {} (sha256 {})", final_path.display(), digest);
        Ok(final_path)
    }

    /// Stream the response body to `path`, returning the body's SHA-256
    async fn stream_to_file(
        &self,
        url: &str,
        path: &Path,
        progress: &ProgressIndicator,
    ) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| BgRemovalError::network_error("Failed to start download", e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BgRemovalError::network_error(
                "Download failed",
                format!("HTTP {} for {}", status, url),
            ));
        }

        if let Some(total) = response.content_length() {
            progress.set_length(total);
        }

        let mut file = tokio::fs::File::create(path)
            .await
            .map_err(|e| BgRemovalError::file_io_error("create file", path, &e))?;

        let mut stream = StreamReader::new(
            response
                .bytes_stream()
                .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
        );

        let mut hasher = Sha256::new();
        let mut downloaded = 0u64;
        let mut buffer = vec![0; 64 * 1024];

        loop {
            let bytes_read = stream
                .read(&mut buffer)
                .await
                .map_err(|e| BgRemovalError::network_error("Failed to read download stream", e))?;
            if bytes_read == 0 {
                break;
            }

            let chunk = buffer.get(..bytes_read).unwrap_or(&[]);
            hasher.update(chunk);
            file.write_all(chunk)
                .await
                .map_err(|e| BgRemovalError::file_io_error("write to file", path, &e))?;

            downloaded += bytes_read as u64;
            progress.set_position(downloaded);
        }

        file.flush()
            .await
            .map_err(|e| BgRemovalError::file_io_error("flush file", path, &e))?;

        if downloaded == 0 {
            return Err(BgRemovalError::network_error(
                "Download failed",
                format!("empty response body from {}", url),
            ));
        }

        log::debug!("Downloaded {} bytes to {}", downloaded, path.display());
        Ok(format!("{:x}", hasher.finalize()))
    }

    async fn remove_partial(path: &Path) {
        if let Err(e) = tokio::fs::remove_file(path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::warn!("Failed to remove partial download {}: {}", path.display(), e);
            }
        }
    }

    #[must_use]
    pub fn cache(&self) -> &ModelCache {
        &self.cache
    }
}

/// Resolves model specifications to local files
#[derive(Debug, Clone)]
pub struct ModelResolver {
    downloader: ModelDownloader,
    show_progress: bool,
}

impl ModelResolver {
    /// # Errors
    /// - Failed to create HTTP client
    pub fn new(cache: ModelCache, show_progress: bool) -> Result<Self> {
        Ok(Self {
            downloader: ModelDownloader::new(cache)?,
            show_progress,
        })
    }

    /// Local path of the model weights, downloading them if needed
    ///
    /// # Errors
    /// - Local file does not exist
    /// - Download failures
    pub async fn resolve(&self, spec: &ModelSpec) -> Result<PathBuf> {
        match &spec.source {
            ModelSource::File(path) => {
                if path.is_file() {
                    Ok(path.clone())
                } else {
                    Err(BgRemovalError::model(format!(
                        "Model file not found: {}",
                        path.display()
                    )))
                }
            },
            ModelSource::Preset(preset) => {
                self.downloader
                    .download(&preset.download_url(), &preset.file_name(), None, self.show_progress)
                    .await
            },
            ModelSource::Url(url) => {
                let file_name = ModelCache::url_to_file_name(url);
                self.downloader
                    .download(url, &file_name, None, self.show_progress)
                    .await
            },
        }
    }

    /// Resolve `spec` and wrap the result in a `ModelManager`
    ///
    /// # Errors
    /// - Same as [`Self::resolve`]
    pub async fn resolve_manager(&self, spec: &ModelSpec) -> Result<ModelManager> {
        let path = self.resolve(spec).await?;
        ModelManager::new(spec.clone(), path)
    }

    #[must_use]
    pub fn downloader(&self) -> &ModelDownloader {
        &self.downloader
    }
}

//! Model cache management for downloaded models
//!
//! Downloaded `.onnx` files live flat in a single cache directory:
//! - `$BGREMOVE_CACHE_DIR` when set
//! - otherwise `<user cache dir>/bgremove-server/models`
//!   (`~/.cache` on Linux, `~/Library/Caches` on macOS, `%LOCALAPPDATA%` on Windows)

use crate::error::{BgRemovalError, Result};
use crate::models::{ModelPreset, ModelSource};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache location
pub const CACHE_DIR_ENV: &str = "BGREMOVE_CACHE_DIR";

/// Suffix of partially downloaded files
pub const PARTIAL_SUFFIX: &str = "part";

/// Information about a cached model file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedModelInfo {
    pub file_name: String,
    pub path: PathBuf,
    /// The preset this file belongs to, if any
    pub preset: Option<ModelPreset>,
    pub size_bytes: u64,
}

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Open the default cache, creating the directory if needed
    ///
    /// # Errors
    /// - No user cache directory and no `BGREMOVE_CACHE_DIR`
    /// - Failed to create the cache directory
    pub fn new() -> Result<Self> {
        let cache_dir = Self::resolve_cache_dir(std::env::var_os(CACHE_DIR_ENV))?;
        Self::with_custom_cache_dir(&cache_dir)
    }

    /// Open a cache rooted at `cache_dir`, creating it if needed
    ///
    /// # Errors
    /// - Failed to create the cache directory
    pub fn with_custom_cache_dir(cache_dir: &Path) -> Result<Self> {
        if !cache_dir.exists() {
            fs::create_dir_all(cache_dir).map_err(|e| {
                BgRemovalError::file_io_error("create cache directory", cache_dir, &e)
            })?;
        }
        Ok(Self {
            cache_dir: cache_dir.to_path_buf(),
        })
    }

    /// Default cache location without creating it
    ///
    /// # Errors
    /// - No user cache directory and no `BGREMOVE_CACHE_DIR`
    pub fn default_cache_dir() -> Result<PathBuf> {
        Self::resolve_cache_dir(std::env::var_os(CACHE_DIR_ENV))
    }

    fn resolve_cache_dir(env_override: Option<OsString>) -> Result<PathBuf> {
        if let Some(dir) = env_override.filter(|dir| !dir.is_empty()) {
            return Ok(PathBuf::from(dir));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                BgRemovalError::invalid_config(format!(
                    "Failed to determine cache directory. Set {} environment variable.",
                    CACHE_DIR_ENV
                ))
            })?
            .join("bgremove-server")
            .join("models"))
    }

    /// Derive a stable, filesystem-safe file name for a model URL
    ///
    /// The name combines a short hash of the full URL with the URL's last path
    /// segment, so different URLs never collide and names stay recognizable.
    ///
    /// # Examples
    /// ```
    /// use bgremove_server::cache::ModelCache;
    ///
    /// let name = ModelCache::url_to_file_name("https://example.com/models/custom.onnx");
    /// assert!(name.starts_with("url-"));
    /// assert!(name.ends_with("-custom.onnx"));
    /// ```
    #[must_use]
    pub fn url_to_file_name(url: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(url.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        let short_hash = digest.get(..12).unwrap_or(&digest);

        let last_segment = url
            .split(['?', '#'])
            .next()
            .unwrap_or(url)
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .unwrap_or_default();
        let stem: String = last_segment
            .trim_end_matches(".onnx")
            .chars()
            .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            .collect();

        if stem.is_empty() {
            format!("url-{}.onnx", short_hash)
        } else {
            format!("url-{}-{}.onnx", short_hash, stem)
        }
    }

    /// Cache file name for a model source; local files are never cached
    #[must_use]
    pub fn file_name_for(source: &ModelSource) -> Option<String> {
        match source {
            ModelSource::Preset(preset) => Some(preset.file_name()),
            ModelSource::Url(url) => Some(Self::url_to_file_name(url)),
            ModelSource::File(_) => None,
        }
    }

    /// Path a model file has (or will have) inside the cache
    #[must_use]
    pub fn model_path(&self, file_name: &str) -> PathBuf {
        self.cache_dir.join(file_name)
    }

    /// Whether a complete, non-empty model file is present
    #[must_use]
    pub fn is_cached(&self, file_name: &str) -> bool {
        fs::metadata(self.model_path(file_name)).is_ok_and(|meta| meta.is_file() && meta.len() > 0)
    }

    /// List the cached model files, sorted by name
    ///
    /// Partial downloads are skipped.
    ///
    /// # Errors
    /// - Failed to read the cache directory
    pub fn list_cached(&self) -> Result<Vec<CachedModelInfo>> {
        let mut models = Vec::new();
        if !self.cache_dir.exists() {
            return Ok(models);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            BgRemovalError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries {
            let entry = entry.map_err(|e| {
                BgRemovalError::file_io_error("read cache directory entry", &self.cache_dir, &e)
            })?;
            let path = entry.path();
            let is_model = path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("onnx"));
            if !path.is_file() || !is_model {
                continue;
            }

            let file_name = entry.file_name().to_string_lossy().into_owned();
            let preset = ModelPreset::ALL
                .into_iter()
                .find(|preset| preset.file_name() == file_name);
            let size_bytes = entry.metadata().map(|meta| meta.len()).unwrap_or(0);

            models.push(CachedModelInfo {
                file_name,
                path,
                preset,
                size_bytes,
            });
        }

        models.sort_by(|a, b| a.file_name.cmp(&b.file_name));
        Ok(models)
    }

    /// Remove one cached model file
    ///
    /// Returns `false` if it was not cached.
    ///
    /// # Errors
    /// - Failed to delete the file
    pub fn remove(&self, file_name: &str) -> Result<bool> {
        let path = self.model_path(file_name);
        if !path.exists() {
            return Ok(false);
        }
        log::info!("Removing cached model: {}", file_name);
        fs::remove_file(&path)
            .map_err(|e| BgRemovalError::file_io_error("remove cached model", &path, &e))?;
        Ok(true)
    }

    /// Remove every cached model and partial download
    ///
    /// Returns the removed file names.
    ///
    /// # Errors
    /// - Failed to read the cache directory or delete a file
    pub fn clear(&self) -> Result<Vec<String>> {
        let mut removed = Vec::new();
        if !self.cache_dir.exists() {
            return Ok(removed);
        }

        let entries = fs::read_dir(&self.cache_dir).map_err(|e| {
            BgRemovalError::file_io_error("read cache directory", &self.cache_dir, &e)
        })?;

        for entry in entries.flatten() {
            let path = entry.path();
            let removable = path.extension().is_some_and(|ext| {
                ext.eq_ignore_ascii_case("onnx") || ext.eq_ignore_ascii_case(PARTIAL_SUFFIX)
            });
            if path.is_file() && removable {
                fs::remove_file(&path)
                    .map_err(|e| BgRemovalError::file_io_error("remove cached model", &path, &e))?;
                removed.push(entry.file_name().to_string_lossy().into_owned());
            }
        }

        removed.sort();
        Ok(removed)
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }
}

/// Format file size in human-readable format
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= 1024.0 && unit_index < UNITS.len() - 1 {
        size /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        format!("{} {}", bytes, UNITS.get(unit_index).unwrap_or(&"B"))
    } else {
        format!("{:.1} {}", size, UNITS.get(unit_index).unwrap_or(&"B"))
    }
}

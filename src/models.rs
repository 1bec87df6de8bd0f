//! Segmentation model presets, specifications and loading

use crate::error::{BgRemovalError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Base URL of the public model release the presets are downloaded from
pub const MODEL_RELEASE_BASE_URL: &str =
    "https://github.com/danielgatis/rembg/releases/download/v0.0.0";

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Image preprocessing expected by a model
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Model input size as `[width, height]`
    pub target_size: [u32; 2],
    pub normalization_mean: [f32; 3],
    pub normalization_std: [f32; 3],
}

/// Known segmentation models
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelPreset {
    /// General purpose salient object segmentation
    #[default]
    U2net,
    /// Lightweight variant of `u2net`
    U2netp,
    /// Tuned for people
    U2netHumanSeg,
    /// `u2net` pruned to a smaller footprint
    Silueta,
    /// `IS-Net` general use, higher resolution input
    IsnetGeneralUse,
}

impl ModelPreset {
    pub const ALL: [ModelPreset; 5] = [
        Self::U2net,
        Self::U2netp,
        Self::U2netHumanSeg,
        Self::Silueta,
        Self::IsnetGeneralUse,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::U2net => "u2net",
            Self::U2netp => "u2netp",
            Self::U2netHumanSeg => "u2net_human_seg",
            Self::Silueta => "silueta",
            Self::IsnetGeneralUse => "isnet-general-use",
        }
    }

    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|preset| preset.name() == name)
    }

    #[must_use]
    pub const fn description(self) -> &'static str {
        match self {
            Self::U2net => "General purpose salient object segmentation (176 MB)",
            Self::U2netp => "Lightweight general purpose segmentation (4.7 MB)",
            Self::U2netHumanSeg => "Human segmentation (176 MB)",
            Self::Silueta => "Reduced-size u2net (43 MB)",
            Self::IsnetGeneralUse => "IS-Net general use, 1024px input (179 MB)",
        }
    }

    /// File name used in the release and in the local cache
    #[must_use]
    pub fn file_name(self) -> String {
        format!("{}.onnx", self.name())
    }

    #[must_use]
    pub fn download_url(self) -> String {
        format!("{}/{}", MODEL_RELEASE_BASE_URL, self.file_name())
    }

    #[must_use]
    pub const fn preprocessing(self) -> PreprocessingConfig {
        match self {
            Self::IsnetGeneralUse => PreprocessingConfig {
                target_size: [1024, 1024],
                normalization_mean: [0.5, 0.5, 0.5],
                normalization_std: [1.0, 1.0, 1.0],
            },
            Self::U2net | Self::U2netp | Self::U2netHumanSeg | Self::Silueta => {
                PreprocessingConfig {
                    target_size: [320, 320],
                    normalization_mean: IMAGENET_MEAN,
                    normalization_std: IMAGENET_STD,
                }
            },
        }
    }
}

impl std::fmt::Display for ModelPreset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for ModelPreset {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_name(s).ok_or_else(|| {
            let known: Vec<&str> = Self::ALL.iter().map(|p| p.name()).collect();
            BgRemovalError::invalid_config(format!(
                "Unknown model '{}'. Known models: {}",
                s,
                known.join(", ")
            ))
        })
    }
}

impl TryFrom<String> for ModelPreset {
    type Error = BgRemovalError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<ModelPreset> for String {
    fn from(preset: ModelPreset) -> Self {
        preset.name().to_string()
    }
}

/// Where the model weights come from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ModelSource {
    /// One of the published presets, downloaded into the cache on demand
    Preset(ModelPreset),
    /// An arbitrary `.onnx` URL, downloaded into the cache on demand
    Url(String),
    /// A local `.onnx` file
    File(PathBuf),
}

impl ModelSource {
    /// Get a display name for tracing and logging
    #[must_use]
    pub fn display_name(&self) -> String {
        match self {
            Self::Preset(preset) => format!("preset:{}", preset),
            Self::Url(url) => format!("url:{}", url),
            Self::File(path) => format!(
                "file:{}",
                path.file_name().unwrap_or_default().to_string_lossy()
            ),
        }
    }
}

/// Model source plus the preprocessing preset it expects
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSpec {
    pub source: ModelSource,
    /// Preprocessing family; always equals the preset for `ModelSource::Preset`
    pub kind: ModelPreset,
}

impl Default for ModelSpec {
    fn default() -> Self {
        Self::from_preset(ModelPreset::default())
    }
}

impl ModelSpec {
    #[must_use]
    pub fn from_preset(preset: ModelPreset) -> Self {
        Self {
            source: ModelSource::Preset(preset),
            kind: preset,
        }
    }

    /// Classify a model argument
    ///
    /// Known preset names win, then `http(s)://` URLs; anything else is taken
    /// as a local file path. Non-preset sources default to `u2net`
    /// preprocessing; use [`ModelSpec::with_kind`] to change it.
    ///
    /// # Examples
    /// ```rust
    /// use bgremove_server::{ModelPreset, ModelSource, ModelSpec};
    ///
    /// let spec = ModelSpec::parse("isnet-general-use");
    /// assert_eq!(spec.source, ModelSource::Preset(ModelPreset::IsnetGeneralUse));
    ///
    /// let spec = ModelSpec::parse("https://example.com/custom.onnx");
    /// assert!(matches!(spec.source, ModelSource::Url(_)));
    /// ```
    #[must_use]
    pub fn parse(model_arg: &str) -> Self {
        if let Some(preset) = ModelPreset::from_name(model_arg) {
            return Self::from_preset(preset);
        }

        let source = if model_arg.starts_with("http://") || model_arg.starts_with("https://") {
            ModelSource::Url(model_arg.to_string())
        } else {
            ModelSource::File(PathBuf::from(model_arg))
        };

        Self {
            source,
            kind: ModelPreset::default(),
        }
    }

    /// Override the preprocessing family (ignored for presets)
    #[must_use]
    pub fn with_kind(mut self, kind: ModelPreset) -> Self {
        if !matches!(self.source, ModelSource::Preset(_)) {
            self.kind = kind;
        }
        self
    }

    #[must_use]
    pub fn preprocessing_config(&self) -> PreprocessingConfig {
        self.kind.preprocessing()
    }
}

/// Model information and metadata
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub name: String,
    pub size_bytes: usize,
    pub input_shape: (usize, usize, usize, usize), // NCHW format
    pub output_shape: (usize, usize, usize, usize),
}

/// A model whose weights are available on the local filesystem
#[derive(Debug, Clone)]
pub struct ModelManager {
    spec: ModelSpec,
    model_path: PathBuf,
}

impl ModelManager {
    /// Create a manager for weights already present at `model_path`
    ///
    /// # Errors
    /// - `model_path` does not exist or is not a file
    pub fn new<P: AsRef<Path>>(spec: ModelSpec, model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref().to_path_buf();
        if !model_path.is_file() {
            return Err(BgRemovalError::model(format!(
                "Model file not found: {}",
                model_path.display()
            )));
        }
        Ok(Self { spec, model_path })
    }

    /// Read the model weights
    ///
    /// # Errors
    /// - File I/O errors when reading model data
    /// - Empty model file
    pub fn load_model(&self) -> Result<Vec<u8>> {
        let data = fs::read(&self.model_path)
            .map_err(|e| BgRemovalError::file_io_error("read model", &self.model_path, &e))?;
        if data.is_empty() {
            return Err(BgRemovalError::model(format!(
                "Model file is empty: {}",
                self.model_path.display()
            )));
        }
        Ok(data)
    }

    #[must_use]
    pub fn get_info(&self, size_bytes: usize) -> ModelInfo {
        let [width, height] = self.spec.preprocessing_config().target_size;
        let (width, height) = (width as usize, height as usize);
        ModelInfo {
            name: self.spec.source.display_name(),
            size_bytes,
            input_shape: (1, 3, height, width),
            output_shape: (1, 1, height, width),
        }
    }

    #[must_use]
    pub fn get_preprocessing_config(&self) -> PreprocessingConfig {
        self.spec.preprocessing_config()
    }

    #[must_use]
    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    #[must_use]
    pub fn model_path(&self) -> &Path {
        &self.model_path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preset_names_round_trip() {
        for preset in ModelPreset::ALL {
            assert_eq!(ModelPreset::from_name(preset.name()), Some(preset));
            assert_eq!(preset.name().parse::<ModelPreset>().unwrap(), preset);
        }
        assert!("u3net".parse::<ModelPreset>().is_err());
    }

    #[test]
    fn test_preset_urls() {
        assert_eq!(
            ModelPreset::U2net.download_url(),
            "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx"
        );
        assert!(ModelPreset::IsnetGeneralUse
            .download_url()
            .ends_with("/isnet-general-use.onnx"));
    }

    #[test]
    fn test_preset_preprocessing() {
        let u2net = ModelPreset::U2net.preprocessing();
        assert_eq!(u2net.target_size, [320, 320]);
        assert_eq!(u2net.normalization_mean, [0.485, 0.456, 0.406]);

        let isnet = ModelPreset::IsnetGeneralUse.preprocessing();
        assert_eq!(isnet.target_size, [1024, 1024]);
        assert_eq!(isnet.normalization_std, [1.0, 1.0, 1.0]);
    }

    #[test]
    fn test_model_spec_parse() {
        let spec = ModelSpec::parse("u2netp");
        assert_eq!(spec.source, ModelSource::Preset(ModelPreset::U2netp));
        assert_eq!(spec.kind, ModelPreset::U2netp);

        let spec = ModelSpec::parse("https://example.com/models/custom.onnx");
        assert_eq!(
            spec.source,
            ModelSource::Url("https://example.com/models/custom.onnx".to_string())
        );
        assert_eq!(spec.kind, ModelPreset::U2net);

        let spec = ModelSpec::parse("./weights/mine.onnx");
        assert_eq!(spec.source, ModelSource::File(PathBuf::from("./weights/mine.onnx")));
    }

    #[test]
    fn test_model_spec_with_kind() {
        let spec = ModelSpec::parse("/tmp/custom.onnx").with_kind(ModelPreset::IsnetGeneralUse);
        assert_eq!(spec.preprocessing_config().target_size, [1024, 1024]);

        // Presets keep their own preprocessing
        let spec = ModelSpec::parse("u2net").with_kind(ModelPreset::IsnetGeneralUse);
        assert_eq!(spec.kind, ModelPreset::U2net);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(
            ModelSource::Preset(ModelPreset::Silueta).display_name(),
            "preset:silueta"
        );
        assert_eq!(
            ModelSource::File(PathBuf::from("/a/b/model.onnx")).display_name(),
            "file:model.onnx"
        );
    }

    #[test]
    fn test_model_manager_loading() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.onnx");

        assert!(ModelManager::new(ModelSpec::default(), &path).is_err());

        fs::write(&path, b"").unwrap();
        let manager = ModelManager::new(ModelSpec::default(), &path).unwrap();
        assert!(matches!(manager.load_model(), Err(BgRemovalError::Model(_))));

        fs::write(&path, b"onnx-bytes").unwrap();
        assert_eq!(manager.load_model().unwrap(), b"onnx-bytes");

        let info = manager.get_info(10);
        assert_eq!(info.input_shape, (1, 3, 320, 320));
        assert_eq!(info.output_shape, (1, 1, 320, 320));
    }

    #[test]
    fn test_preset_serde() {
        let json = serde_json::to_string(&ModelPreset::U2netHumanSeg).unwrap();
        assert_eq!(json, "\"u2net_human_seg\"");
        let parsed: ModelPreset = serde_json::from_str("\"silueta\"").unwrap();
        assert_eq!(parsed, ModelPreset::Silueta);
    }
}

//! Configuration types for the compositor, the HTTP server and the service as a whole

use crate::error::{BgRemovalError, Result};
use crate::utils::ColorParser;
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default canvas edge length in pixels
pub const DEFAULT_CANVAS_SIZE: u32 = 2000;

/// Default background color for the flattened output
pub const DEFAULT_BACKGROUND_HEX: &str = "#f7f7f7";

/// Default request body limit (10 MiB)
pub const DEFAULT_MAX_CONTENT_LENGTH: u64 = 10 * 1024 * 1024;

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionProvider {
    /// Auto-detect best available provider (CUDA > `CoreML` > CPU)
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
    /// Apple Silicon GPU acceleration
    #[serde(rename = "coreml")]
    CoreMl,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
            Self::CoreMl => write!(f, "coreml"),
        }
    }
}

/// PNG compression effort for the encoded canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
#[serde(rename_all = "lowercase")]
pub enum PngCompression {
    /// Fastest encoding, larger files
    #[default]
    Fast,
    Default,
    /// Smallest files, slowest encoding
    Best,
}

impl PngCompression {
    #[must_use]
    pub const fn compression_type(self) -> image::codecs::png::CompressionType {
        match self {
            Self::Fast => image::codecs::png::CompressionType::Fast,
            Self::Default => image::codecs::png::CompressionType::Default,
            Self::Best => image::codecs::png::CompressionType::Best,
        }
    }
}

/// Solid RGB background color
///
/// Serializes as a `#rrggbb` hex string so config files stay readable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct BackgroundColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl BackgroundColor {
    #[must_use]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    #[must_use]
    pub const fn white() -> Self {
        Self::new(255, 255, 255)
    }

    /// The light gray used for product shots (`#f7f7f7`)
    #[must_use]
    pub const fn light_gray() -> Self {
        Self::new(247, 247, 247)
    }

    #[must_use]
    pub const fn to_rgb(self) -> image::Rgb<u8> {
        image::Rgb([self.r, self.g, self.b])
    }
}

impl Default for BackgroundColor {
    fn default() -> Self {
        Self::light_gray()
    }
}

impl std::str::FromStr for BackgroundColor {
    type Err = BgRemovalError;

    fn from_str(s: &str) -> Result<Self> {
        ColorParser::parse_hex(s)
    }
}

impl std::fmt::Display for BackgroundColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&ColorParser::to_hex(self, true))
    }
}

impl TryFrom<String> for BackgroundColor {
    type Error = BgRemovalError;

    fn try_from(value: String) -> Result<Self> {
        ColorParser::parse_hex(&value)
    }
}

impl From<BackgroundColor> for String {
    fn from(color: BackgroundColor) -> Self {
        color.to_string()
    }
}

/// Unsharp mask parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UnsharpMaskConfig {
    /// Gaussian blur radius (sigma) in pixels
    pub radius: f32,
    /// Sharpening strength in percent
    pub percent: u32,
    /// Minimum local contrast before a pixel is sharpened
    pub threshold: u8,
}

impl Default for UnsharpMaskConfig {
    fn default() -> Self {
        Self {
            radius: 1.0,
            percent: 100,
            threshold: 3,
        }
    }
}

/// Lighting and sharpening applied when enhancement is requested
///
/// A factor of `1.0` leaves the corresponding property unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnhancementConfig {
    pub brightness: f32,
    pub contrast: f32,
    pub saturation: f32,
    pub sharpen: UnsharpMaskConfig,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            brightness: 1.1,
            contrast: 1.1,
            saturation: 1.05,
            sharpen: UnsharpMaskConfig::default(),
        }
    }
}

impl EnhancementConfig {
    /// Configuration that leaves every pixel untouched
    #[must_use]
    pub fn identity() -> Self {
        Self {
            brightness: 1.0,
            contrast: 1.0,
            saturation: 1.0,
            sharpen: UnsharpMaskConfig {
                radius: 0.0,
                percent: 0,
                threshold: 0,
            },
        }
    }

    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("brightness", self.brightness),
            ("contrast", self.contrast),
            ("saturation", self.saturation),
            ("sharpen radius", self.sharpen.radius),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(BgRemovalError::config_value_error(name, value, ">= 0.0"));
            }
        }
        Ok(())
    }
}

/// Output canvas description shared by every request
///
/// Built once at startup and passed by reference into the compositor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasSpec {
    pub width: u32,
    pub height: u32,
    pub background: BackgroundColor,
    pub enhancement: EnhancementConfig,
}

impl Default for CanvasSpec {
    fn default() -> Self {
        Self {
            width: DEFAULT_CANVAS_SIZE,
            height: DEFAULT_CANVAS_SIZE,
            background: BackgroundColor::default(),
            enhancement: EnhancementConfig::default(),
        }
    }
}

impl CanvasSpec {
    #[must_use]
    pub fn new(width: u32, height: u32, background: BackgroundColor) -> Self {
        Self {
            width,
            height,
            background,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_enhancement(mut self, enhancement: EnhancementConfig) -> Self {
        self.enhancement = enhancement;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(BgRemovalError::invalid_config(format!(
                "Canvas dimensions must be non-zero, got {}x{}",
                self.width, self.height
            )));
        }
        self.enhancement.validate()
    }
}

/// HTTP server settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Largest accepted request body in bytes
    pub max_content_length: u64,
    /// Directory holding `index.html` and other static assets
    pub static_dir: PathBuf,
    /// Upper bound on processing time for a single request
    pub request_timeout_secs: u64,
    /// Whether enhancement runs when a request does not say
    pub enhance_by_default: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            static_dir: PathBuf::from("static"),
            request_timeout_secs: 120,
            enhance_by_default: false,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }

    /// Resolve host and port into a bindable address
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|e| {
            BgRemovalError::invalid_config(format!("Invalid host '{}': {}", self.host, e))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        if self.max_content_length == 0 {
            return Err(BgRemovalError::config_value_error(
                "max content length",
                self.max_content_length,
                "> 0",
            ));
        }
        if self.request_timeout_secs == 0 {
            return Err(BgRemovalError::config_value_error(
                "request timeout",
                self.request_timeout_secs,
                "> 0 seconds",
            ));
        }
        Ok(())
    }
}

/// Builder for `ServerConfig`
#[derive(Debug, Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    #[must_use]
    pub fn host<S: Into<String>>(mut self, host: S) -> Self {
        self.config.host = host.into();
        self
    }

    #[must_use]
    pub fn port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    #[must_use]
    pub fn max_content_length(mut self, bytes: u64) -> Self {
        self.config.max_content_length = bytes;
        self
    }

    #[must_use]
    pub fn static_dir<P: Into<PathBuf>>(mut self, dir: P) -> Self {
        self.config.static_dir = dir.into();
        self
    }

    #[must_use]
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn enhance_by_default(mut self, enhance: bool) -> Self {
        self.config.enhance_by_default = enhance;
        self
    }

    pub fn build(self) -> Result<ServerConfig> {
        let config = self.config;
        config.validate()?;
        Ok(config)
    }
}

/// Complete service configuration as loaded from a JSON file
///
/// Every field is optional in the file; missing values fall back to defaults.
///
/// ```json
/// {
///   "server": { "port": 8080, "enhance_by_default": true },
///   "canvas": { "width": 1500, "height": 1500, "background": "#ffffff" },
///   "model": "u2netp",
///   "execution_provider": "tract:cpu"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub server: ServerConfig,
    pub canvas: CanvasSpec,
    /// Preset name, model URL or path to an `.onnx` file
    pub model: String,
    /// Preprocessing preset for models given by URL or path
    pub model_kind: Option<String>,
    /// Backend and provider in `backend:provider` form
    pub execution_provider: String,
    /// Inference threads (0 = backend default)
    pub threads: usize,
    pub png_compression: PngCompression,
    pub cache_dir: Option<PathBuf>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            canvas: CanvasSpec::default(),
            model: crate::models::ModelPreset::default().name().to_string(),
            model_kind: None,
            execution_provider: "tract:cpu".to_string(),
            threads: 0,
            png_compression: PngCompression::default(),
            cache_dir: None,
        }
    }
}

impl ServiceConfig {
    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)
            .map_err(|e| BgRemovalError::file_io_error("read config file", path, &e))?;
        Self::from_json_str(&contents)
    }

    pub fn from_json_str(contents: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(contents)
            .map_err(|e| BgRemovalError::invalid_config(format!("Malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        self.server.validate()?;
        self.canvas.validate()
    }
}

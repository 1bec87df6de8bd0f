#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Background Removal Server
//!
//! An HTTP service that removes the background of an uploaded image with a
//! pretrained segmentation model and places the subject, centered and scaled
//! to fit, on a fixed-size solid-color canvas.
//!
//! ## Pipeline
//!
//! 1. Decode the uploaded bytes (PNG, JPEG, WebP)
//! 2. Segment: the model predicts a foreground mask which becomes the alpha
//!    channel of a cutout
//! 3. Composite: scale to fit the canvas (Bicubic when enlarging, Lanczos
//!    otherwise), optionally enhance, center, flatten onto the background
//! 4. Encode the canvas as PNG
//!
//! ## Features
//!
//! - **Backends**: Tract (pure Rust, default) and ONNX Runtime (`onnx` feature)
//! - **Hardware Acceleration**: CUDA and `CoreML` through ONNX Runtime
//! - **Model Management**: presets and URLs are downloaded once into a local
//!   cache, with optional SHA-256 verification
//! - **CLI**: the `bgremove-server` binary (`cli` feature) serves HTTP or
//!   processes single files offline
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bgremove_server::{
//!     initialize_processor, run_server, ModelCache, ProcessorConfig, ServerConfig,
//! };
//!
//! # async fn example() -> anyhow::Result<()> {
//! let processor = initialize_processor(ProcessorConfig::default(), ModelCache::new()?, false).await?;
//!
//! // Offline use
//! let input = std::fs::read("input.jpg")?;
//! let result = processor.process_bytes(&input, Some(true))?;
//! std::fs::write("output.png", &result.png)?;
//!
//! // Or serve it over HTTP
//! run_server(ServerConfig::default(), processor).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Compositing without a model
//!
//! The compositor only needs a cutout, so it can be used on its own:
//!
//! ```rust
//! use bgremove_server::{composite, CanvasSpec, Cutout};
//! use image::{Rgba, RgbaImage};
//!
//! let cutout = Cutout::new(RgbaImage::from_pixel(500, 1000, Rgba([200, 10, 10, 255]))).unwrap();
//! let result = composite(&cutout, &CanvasSpec::default(), false).unwrap();
//!
//! assert_eq!(result.image.dimensions(), (2000, 2000));
//! assert_eq!((result.placement.width, result.placement.height), (1000, 2000));
//! assert_eq!(result.placement.offset_x, 500);
//! ```
//!
//! ### Feature Flags
//!
//! - `tract` (default): Pure Rust inference backend
//! - `onnx`: ONNX Runtime backend with GPU acceleration support
//! - `cli` (default): Command-line interface, progress bars and log output
//! - `webp-support` (default): WebP input support
//! - `tracing-json`: JSON log output

pub mod backends;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod download;
pub mod enhance;
pub mod error;
pub mod inference;
pub mod models;
pub mod processor;
pub mod segmentation;
pub mod server;
pub mod services;
pub mod tracing_config;
pub mod types;
pub mod utils;

pub use backends::*;
pub use cache::{format_size, CachedModelInfo, ModelCache};
pub use compositor::composite;
pub use config::{
    BackgroundColor, CanvasSpec, EnhancementConfig, ExecutionProvider, PngCompression,
    ServerConfig, ServiceConfig, UnsharpMaskConfig,
};
pub use download::{ModelDownloader, ModelResolver};
pub use error::{BgRemovalError, Result};
pub use inference::InferenceBackend;
pub use models::{ModelManager, ModelPreset, ModelSource, ModelSpec};
pub use processor::{
    BackendFactory, BackendType, BackgroundRemovalProcessor, DefaultBackendFactory,
    ProcessorConfig, ProcessorConfigBuilder,
};
pub use segmentation::{BackgroundRemover, ModelBackgroundRemover};
pub use server::{routes, run_server, AppState};
pub use tracing_config::{TracingConfig, TracingFormat};
pub use types::{CompositeResult, Cutout, Placement, ProcessedImage, ProcessingTimings};
pub use utils::{ColorParser, ExecutionProviderManager, UploadValidator};

/// Resolve the configured model and initialize a processor around it
///
/// Presets and URLs are downloaded into `cache` on first use. Model loading
/// runs on the blocking thread pool.
///
/// # Errors
/// - Model file missing, download failure or checksum mismatch
/// - Backend not compiled in or model failed to initialize
pub async fn initialize_processor(
    config: ProcessorConfig,
    cache: ModelCache,
    show_progress: bool,
) -> Result<BackgroundRemovalProcessor> {
    let resolver = ModelResolver::new(cache, show_progress)?;
    let model_manager = resolver.resolve_manager(&config.model_spec).await?;

    tokio::task::spawn_blocking(move || {
        BackgroundRemovalProcessor::from_config(config, model_manager)
    })
    .await
    .map_err(|e| BgRemovalError::internal(format!("Model initialization task failed: {}", e)))?
}

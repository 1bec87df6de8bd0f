//! Background removal processor
//!
//! `BackgroundRemovalProcessor` drives a request through the whole pipeline:
//! decode, segment, composite, encode. It is shared between the HTTP server
//! and the offline CLI mode so both produce identical output.

use crate::{
    compositor,
    config::{CanvasSpec, ExecutionProvider, PngCompression},
    error::{BgRemovalError, Result},
    inference::{InferenceBackend, InferenceConfig},
    models::{ModelManager, ModelSpec},
    segmentation::{BackgroundRemover, ModelBackgroundRemover},
    services::ImageIOService,
    tracing_config::spans,
    types::{Cutout, ProcessedImage, ProcessingTimings},
};
use image::DynamicImage;
use instant::Instant;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info as trace_info, instrument, span, Level};

/// Backend type enumeration for runtime selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendType {
    /// ONNX Runtime backend (supports GPU acceleration)
    Onnx,
    /// Tract backend (pure Rust, no external dependencies)
    Tract,
}

impl BackendType {
    /// Whether this backend was compiled into the current build
    #[must_use]
    pub const fn is_compiled_in(self) -> bool {
        match self {
            Self::Onnx => cfg!(feature = "onnx"),
            Self::Tract => cfg!(feature = "tract"),
        }
    }
}

impl std::fmt::Display for BackendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Onnx => write!(f, "onnx"),
            Self::Tract => write!(f, "tract"),
        }
    }
}

/// Factory trait for creating inference backends
pub trait BackendFactory: Send + Sync {
    /// Create an uninitialized backend of the specified type
    ///
    /// # Errors
    /// - Backend type not compiled into this build
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>>;

    /// List available backend types
    fn available_backends(&self) -> Vec<BackendType>;
}

/// Backend factory for the backends enabled by cargo features
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultBackendFactory;

impl BackendFactory for DefaultBackendFactory {
    fn create_backend(
        &self,
        backend_type: BackendType,
        model_manager: ModelManager,
    ) -> Result<Box<dyn InferenceBackend>> {
        match backend_type {
            #[cfg(feature = "onnx")]
            BackendType::Onnx => Ok(Box::new(crate::backends::OnnxBackend::with_model_manager(
                model_manager,
            ))),
            #[cfg(feature = "tract")]
            BackendType::Tract => Ok(Box::new(crate::backends::TractBackend::with_model_manager(
                model_manager,
            ))),
            #[allow(unreachable_patterns)]
            other => {
                drop(model_manager);
                Err(BgRemovalError::invalid_config(format!(
                    "Backend '{}' is not available in this build (enable the '{}' feature)",
                    other, other
                )))
            },
        }
    }

    fn available_backends(&self) -> Vec<BackendType> {
        [BackendType::Tract, BackendType::Onnx]
            .into_iter()
            .filter(|backend| backend.is_compiled_in())
            .collect()
    }
}

/// Configuration for the background removal processor
#[derive(Debug, Clone, PartialEq)]
pub struct ProcessorConfig {
    /// Output canvas, background and enhancement settings
    pub canvas: CanvasSpec,
    /// Whether enhancement runs when the caller does not decide
    pub enhance_by_default: bool,
    pub png_compression: PngCompression,
    /// Model to load at startup
    pub model_spec: ModelSpec,
    /// Backend type to use for inference
    pub backend_type: BackendType,
    /// Execution provider for the backend
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = auto)
    pub intra_threads: usize,
}

impl ProcessorConfig {
    #[must_use]
    pub fn builder() -> ProcessorConfigBuilder {
        ProcessorConfigBuilder::new()
    }

    #[must_use]
    pub fn inference_config(&self) -> InferenceConfig {
        InferenceConfig {
            execution_provider: self.execution_provider,
            intra_threads: self.intra_threads,
        }
    }
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            canvas: CanvasSpec::default(),
            enhance_by_default: false,
            png_compression: PngCompression::default(),
            model_spec: ModelSpec::default(),
            backend_type: BackendType::Tract,
            execution_provider: ExecutionProvider::Cpu,
            intra_threads: 0,
        }
    }
}

/// Builder for `ProcessorConfig`
#[derive(Debug, Default)]
pub struct ProcessorConfigBuilder {
    config: ProcessorConfig,
}

impl ProcessorConfigBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn canvas(mut self, canvas: CanvasSpec) -> Self {
        self.config.canvas = canvas;
        self
    }

    #[must_use]
    pub fn enhance_by_default(mut self, enhance: bool) -> Self {
        self.config.enhance_by_default = enhance;
        self
    }

    #[must_use]
    pub fn png_compression(mut self, compression: PngCompression) -> Self {
        self.config.png_compression = compression;
        self
    }

    #[must_use]
    pub fn model_spec(mut self, model_spec: ModelSpec) -> Self {
        self.config.model_spec = model_spec;
        self
    }

    #[must_use]
    pub fn backend_type(mut self, backend_type: BackendType) -> Self {
        self.config.backend_type = backend_type;
        self
    }

    #[must_use]
    pub fn execution_provider(mut self, provider: ExecutionProvider) -> Self {
        self.config.execution_provider = provider;
        self
    }

    #[must_use]
    pub fn intra_threads(mut self, threads: usize) -> Self {
        self.config.intra_threads = threads;
        self
    }

    /// Build the processor configuration
    ///
    /// # Errors
    /// - Zero-sized canvas
    /// - Negative or non-finite enhancement factors
    pub fn build(self) -> Result<ProcessorConfig> {
        self.config.canvas.validate()?;
        Ok(self.config)
    }
}

/// Runs the decode, segment, composite, encode pipeline
///
/// Holds no per-request state and is shared across requests behind an `Arc`.
#[derive(Clone)]
pub struct BackgroundRemovalProcessor {
    config: ProcessorConfig,
    remover: Arc<dyn BackgroundRemover>,
}

impl std::fmt::Debug for BackgroundRemovalProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemovalProcessor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl BackgroundRemovalProcessor {
    /// Create a processor around an existing remover
    ///
    /// # Errors
    /// - Invalid canvas configuration
    pub fn new(config: ProcessorConfig, remover: Arc<dyn BackgroundRemover>) -> Result<Self> {
        config.canvas.validate()?;
        Ok(Self { config, remover })
    }

    /// Create the configured backend, load the model and build a processor
    ///
    /// The model is fully initialized when this returns.
    ///
    /// # Errors
    /// - Backend not compiled in
    /// - Model loading or initialization failures
    pub fn from_config(config: ProcessorConfig, model_manager: ModelManager) -> Result<Self> {
        Self::with_factory(config, model_manager, &DefaultBackendFactory)
    }

    /// Like [`Self::from_config`] with a custom backend factory
    ///
    /// # Errors
    /// - Backend creation or model initialization failures
    pub fn with_factory(
        config: ProcessorConfig,
        model_manager: ModelManager,
        factory: &dyn BackendFactory,
    ) -> Result<Self> {
        let _span = spans::model_loading(
            &config.model_spec.source.display_name(),
            &format!("{}:{}", config.backend_type, config.execution_provider),
        )
        .entered();
        info!("Initializing background removal processor");
        debug!("Model spec: {:?}", config.model_spec);
        debug!("Backend type: {}", config.backend_type);
        debug!("Execution provider: {}", config.execution_provider);

        let backend = factory.create_backend(config.backend_type, model_manager)?;
        let remover = ModelBackgroundRemover::new(backend, &config.inference_config())?;

        info!(
            "Background removal processor initialized with model {}",
            remover.model_info().name
        );
        Self::new(config, Arc::new(remover))
    }

    #[must_use]
    pub fn config(&self) -> &ProcessorConfig {
        &self.config
    }

    /// Process encoded image bytes into a PNG on the configured canvas
    ///
    /// `enhance` overrides the configured default when given.
    ///
    /// # Errors
    /// - `Decode` for unreadable input
    /// - `Segmentation` when the subject cannot be extracted
    /// - `Encode` when the PNG cannot be written
    #[instrument(skip(self, bytes), fields(input_bytes = bytes.len()))]
    pub fn process_bytes(&self, bytes: &[u8], enhance: Option<bool>) -> Result<ProcessedImage> {
        let total_start = Instant::now();

        let decode_start = Instant::now();
        let image = {
            let _span = span!(Level::DEBUG, "decode").entered();
            ImageIOService::load_from_bytes(bytes)?
        };
        let image_decode_ms = elapsed_ms(decode_start);

        let mut result = self.process_image(&image, enhance)?;
        result.timings.image_decode_ms = image_decode_ms;
        result.timings.total_ms = elapsed_ms(total_start);
        Ok(result)
    }

    /// Process an already decoded image
    ///
    /// # Errors
    /// - `Segmentation` when the subject cannot be extracted
    /// - `Encode` when the PNG cannot be written
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    pub fn process_image(&self, image: &DynamicImage, enhance: Option<bool>) -> Result<ProcessedImage> {
        let enhance = enhance.unwrap_or(self.config.enhance_by_default);
        let total_start = Instant::now();
        let mut timings = ProcessingTimings::new();

        let source = image.to_rgba8();
        let source_dimensions = source.dimensions();

        let segmentation_start = Instant::now();
        let cutout = {
            let _span = span!(Level::INFO, "segmentation").entered();
            let cutout = self.remover.remove_background(&source).map_err(|e| match e {
                BgRemovalError::Segmentation(_) => e,
                other => BgRemovalError::segmentation(other.to_string()),
            })?;
            if cutout.dimensions() != source_dimensions {
                return Err(BgRemovalError::segmentation(format!(
                    "Cutout size {:?} does not match input size {:?}",
                    cutout.dimensions(),
                    source_dimensions
                )));
            }
            Cutout::new(cutout).map_err(|e| BgRemovalError::segmentation(e.to_string()))?
        };
        timings.segmentation_ms = elapsed_ms(segmentation_start);

        let composite_start = Instant::now();
        let composite = {
            let _span = span!(Level::DEBUG, "composite", enhance).entered();
            compositor::composite(&cutout, &self.config.canvas, enhance)?
        };
        timings.composite_ms = elapsed_ms(composite_start);

        let encode_start = Instant::now();
        let png = {
            let _span = span!(Level::DEBUG, "encode").entered();
            ImageIOService::encode_png_with(&composite.image, self.config.png_compression)?
        };
        timings.image_encode_ms = elapsed_ms(encode_start);
        timings.total_ms = elapsed_ms(total_start);

        trace_info!(
            segmentation_ms = timings.segmentation_ms,
            composite_ms = timings.composite_ms,
            encode_ms = timings.image_encode_ms,
            output_bytes = png.len(),
            "Image processed"
        );

        Ok(ProcessedImage {
            png,
            dimensions: composite.image.dimensions(),
            placement: composite.placement,
            timings,
        })
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

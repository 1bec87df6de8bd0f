//! Configuration conversion utilities for CLI arguments
//!
//! Values are layered: built-in defaults, then the `--config` JSON file, then
//! explicitly given flags (or their environment variables).

use crate::cache::ModelCache;
use crate::cli::main_impl::Cli;
use crate::{
    config::ServiceConfig,
    models::{ModelPreset, ModelSpec},
    processor::ProcessorConfig,
    utils::{ColorParser, ExecutionProviderManager},
};
use anyhow::{Context, Result};

/// Convert CLI arguments to the library's configuration types
pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Load the optional config file and apply the explicit flags on top
    pub(crate) fn service_config(cli: &Cli) -> Result<ServiceConfig> {
        let config = match &cli.config {
            Some(path) => ServiceConfig::from_json_file(path)
                .with_context(|| format!("Failed to load config file {}", path.display()))?,
            None => ServiceConfig::default(),
        };

        let config = Self::apply_overrides(config, cli)?;
        config.validate().context("Invalid configuration")?;
        Ok(config)
    }

    fn apply_overrides(mut config: ServiceConfig, cli: &Cli) -> Result<ServiceConfig> {
        let server = &mut config.server;
        if let Some(host) = &cli.host {
            server.host.clone_from(host);
        }
        if let Some(port) = cli.port {
            server.port = port;
        }
        if let Some(static_dir) = &cli.static_dir {
            server.static_dir.clone_from(static_dir);
        }
        if let Some(max_content_length) = cli.max_content_length {
            server.max_content_length = max_content_length;
        }
        if let Some(timeout) = cli.request_timeout_secs {
            server.request_timeout_secs = timeout;
        }
        if cli.enhance {
            server.enhance_by_default = true;
        }

        let canvas = &mut config.canvas;
        if let Some(width) = cli.canvas_width {
            canvas.width = width;
        }
        if let Some(height) = cli.canvas_height {
            canvas.height = height;
        }
        if let Some(color) = &cli.background_color {
            canvas.background = ColorParser::parse_hex(color).context("Invalid --background-color")?;
        }

        let enhancement = &mut canvas.enhancement;
        if let Some(brightness) = cli.brightness {
            enhancement.brightness = brightness;
        }
        if let Some(contrast) = cli.contrast {
            enhancement.contrast = contrast;
        }
        if let Some(saturation) = cli.saturation {
            enhancement.saturation = saturation;
        }
        if let Some(radius) = cli.sharpen_radius {
            enhancement.sharpen.radius = radius;
        }
        if let Some(percent) = cli.sharpen_percent {
            enhancement.sharpen.percent = percent;
        }
        if let Some(threshold) = cli.sharpen_threshold {
            enhancement.sharpen.threshold = threshold;
        }

        if let Some(model) = &cli.model {
            config.model.clone_from(model);
        }
        if let Some(kind) = &cli.model_kind {
            config.model_kind = Some(kind.clone());
        }
        if let Some(provider) = &cli.execution_provider {
            config.execution_provider.clone_from(provider);
        }
        if let Some(threads) = cli.threads {
            config.threads = threads;
        }
        if let Some(compression) = cli.png_compression {
            config.png_compression = compression;
        }
        if let Some(cache_dir) = &cli.cache_dir {
            config.cache_dir = Some(cache_dir.clone());
        }

        Ok(config)
    }

    /// Model selection described by `config`
    pub(crate) fn model_spec(config: &ServiceConfig) -> Result<ModelSpec> {
        let spec = ModelSpec::parse(&config.model);
        match &config.model_kind {
            Some(kind) => {
                let kind: ModelPreset = kind.parse().context("Invalid --model-kind")?;
                Ok(spec.with_kind(kind))
            },
            None => Ok(spec),
        }
    }

    /// Build the processor configuration described by `config`
    pub(crate) fn processor_config(config: &ServiceConfig) -> Result<ProcessorConfig> {
        let (backend_type, execution_provider) =
            ExecutionProviderManager::parse_provider_string(&config.execution_provider)
                .context("Invalid execution provider format")?;

        if !backend_type.is_compiled_in() {
            anyhow::bail!(
                "Backend '{}' is not available in this build (rebuild with --features {})",
                backend_type,
                backend_type
            );
        }

        ProcessorConfig::builder()
            .canvas(config.canvas.clone())
            .enhance_by_default(config.server.enhance_by_default)
            .png_compression(config.png_compression)
            .model_spec(Self::model_spec(config)?)
            .backend_type(backend_type)
            .execution_provider(execution_provider)
            .intra_threads(config.threads)
            .build()
            .context("Invalid processor configuration")
    }

    /// Model cache honoring `cache_dir`, then `BGREMOVE_CACHE_DIR`, then the
    /// platform cache directory
    pub(crate) fn model_cache(config: &ServiceConfig) -> Result<ModelCache> {
        match &config.cache_dir {
            Some(dir) => ModelCache::with_custom_cache_dir(dir)
                .context("Failed to create cache with custom directory"),
            None => ModelCache::new().context("Failed to create model cache"),
        }
    }
}

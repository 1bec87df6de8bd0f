//! Background removal server CLI
//!
//! Starts the HTTP service by default. The same binary can also process a
//! single file offline and manage the model cache.

use super::config::CliConfigBuilder;
use crate::{
    cache::{format_size, ModelCache},
    config::{PngCompression, ServiceConfig},
    download::ModelResolver,
    initialize_processor,
    models::ModelPreset,
    processor::BackgroundRemovalProcessor,
    server::run_server,
    tracing_config::{TracingConfig, TracingFormat},
    utils::{ExecutionProviderManager, UploadValidator},
};
use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Background removal HTTP service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "bgremove-server")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// JSON configuration file; explicit flags override its values
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Interface to bind [default: 0.0.0.0]
    #[arg(long, env = "HOST")]
    pub host: Option<String>,

    /// Port to listen on [default: 5000]
    #[arg(short, long, env = "PORT")]
    pub port: Option<u16>,

    /// Directory served at `/` [default: static]
    #[arg(long, value_name = "DIR")]
    pub static_dir: Option<PathBuf>,

    /// Largest accepted upload in bytes [default: 10485760]
    #[arg(long, value_name = "BYTES")]
    pub max_content_length: Option<u64>,

    /// Per-request processing timeout [default: 120]
    #[arg(long, value_name = "SECS")]
    pub request_timeout_secs: Option<u64>,

    /// Enhance by default (requests can still opt out with enhance=false)
    #[arg(long)]
    pub enhance: bool,

    /// Output canvas width in pixels [default: 2000]
    #[arg(long)]
    pub canvas_width: Option<u32>,

    /// Output canvas height in pixels [default: 2000]
    #[arg(long)]
    pub canvas_height: Option<u32>,

    /// Canvas background as #RRGGBB or #RGB [default: #f7f7f7]
    #[arg(long, value_name = "HEX")]
    pub background_color: Option<String>,

    /// Brightness factor used when enhancing [default: 1.1]
    #[arg(long)]
    pub brightness: Option<f32>,

    /// Contrast factor used when enhancing [default: 1.1]
    #[arg(long)]
    pub contrast: Option<f32>,

    /// Saturation factor used when enhancing [default: 1.05]
    #[arg(long)]
    pub saturation: Option<f32>,

    /// Unsharp mask radius [default: 1.0]
    #[arg(long)]
    pub sharpen_radius: Option<f32>,

    /// Unsharp mask strength in percent [default: 100]
    #[arg(long)]
    pub sharpen_percent: Option<u32>,

    /// Unsharp mask noise threshold [default: 3]
    #[arg(long)]
    pub sharpen_threshold: Option<u8>,

    /// PNG compression effort [default: fast]
    #[arg(long, value_enum)]
    pub png_compression: Option<PngCompression>,

    /// Model preset name, URL, or path to an .onnx file [default: u2net]
    #[arg(short, long, env = "BGREMOVE_MODEL")]
    pub model: Option<String>,

    /// Preprocessing preset for models given by URL or path
    #[arg(long, value_name = "PRESET")]
    pub model_kind: Option<String>,

    /// Execution provider as backend:provider (e.g. tract:cpu, onnx:auto, onnx:cuda)
    #[arg(short, long)]
    pub execution_provider: Option<String>,

    /// Number of inference threads (0 = backend default)
    #[arg(short, long)]
    pub threads: Option<usize>,

    /// Use custom model cache directory
    #[arg(long, value_name = "PATH")]
    pub cache_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, default_value = "console")]
    pub log_format: String,

    /// Increase logging verbosity (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Process a single image offline instead of serving
    #[arg(short, long, value_name = "FILE")]
    pub input: Option<PathBuf>,

    /// Output path for --input [default: bg_removed_<name>.png next to the input]
    #[arg(short, long, value_name = "FILE", requires = "input")]
    pub output: Option<PathBuf>,

    /// Download the configured model and exit
    #[arg(long)]
    pub only_download: bool,

    /// Print the model cache directory and exit
    #[arg(long)]
    pub show_cache_dir: bool,

    /// List the model presets and their cache status, then exit
    #[arg(long)]
    pub list_models: bool,

    /// Remove cached models (only the --model one when given) and exit
    #[arg(long)]
    pub clear_cache: bool,

    /// Show backend and execution provider diagnostics and exit
    #[arg(long)]
    pub show_providers: bool,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_tracing(&cli).context("Failed to initialize tracing")?;

    if cli.show_providers {
        show_provider_diagnostics();
        return Ok(());
    }

    let config = CliConfigBuilder::service_config(&cli)?;
    let cache = CliConfigBuilder::model_cache(&config)?;

    if cli.show_cache_dir {
        show_cache_dir(&cache);
        return Ok(());
    }

    if cli.list_models {
        return list_models(&cache);
    }

    if cli.clear_cache {
        return clear_cache(&cache, &config, cli.model.is_some());
    }

    let processor_config = CliConfigBuilder::processor_config(&config)?;

    if cli.only_download {
        let resolver =
            ModelResolver::new(cache, true).context("Failed to create model resolver")?;
        let path = resolver
            .resolve(&processor_config.model_spec)
            .await
            .context("Failed to download model")?;
        println!("✅ Model ready: {}", path.display());
        return Ok(());
    }

    info!(
        "Model: {}, provider: {}",
        processor_config.model_spec.source.display_name(),
        config.execution_provider
    );
    let processor = initialize_processor(processor_config, cache, true)
        .await
        .context("Failed to initialize background removal processor")?;

    if let Some(input) = &cli.input {
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(input));
        return process_file(&processor, input, &output, config.server.enhance_by_default);
    }

    run_server(config.server, processor)
        .await
        .context("Server terminated with an error")
}

fn init_tracing(cli: &Cli) -> Result<()> {
    let format: TracingFormat = cli.log_format.parse().map_err(anyhow::Error::msg)?;

    TracingConfig::new()
        .with_verbosity(cli.verbose)
        .with_format(format)
        .init()
        .context("Failed to initialize tracing subscriber")?;

    tracing::debug!(verbosity = cli.verbose, format = ?format, "Tracing initialized");
    Ok(())
}

/// `bg_removed_<stem>.png` in the input's directory
fn default_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default();
    input.with_file_name(format!(
        "bg_removed_{}.png",
        UploadValidator::secure_filename(&stem)
    ))
}

/// Run one file through the same pipeline the server uses
fn process_file(
    processor: &BackgroundRemovalProcessor,
    input: &Path,
    output: &Path,
    enhance: bool,
) -> Result<()> {
    let filename = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    UploadValidator::validate_filename(&filename)
        .with_context(|| format!("Unsupported input {}", input.display()))?;

    let start = Instant::now();
    let bytes =
        std::fs::read(input).with_context(|| format!("Failed to read {}", input.display()))?;
    let processed = processor
        .process_bytes(&bytes, Some(enhance))
        .with_context(|| format!("Failed to process {}", input.display()))?;
    std::fs::write(output, &processed.png)
        .with_context(|| format!("Failed to write {}", output.display()))?;

    let (width, height) = processed.dimensions;
    let placement = processed.placement;
    println!(
        "✅ {} -> {} ({}x{}, subject {}x{} at +{}+{}, {:.0}ms)",
        input.display(),
        output.display(),
        width,
        height,
        placement.width,
        placement.height,
        placement.offset_x,
        placement.offset_y,
        start.elapsed().as_secs_f64() * 1000.0
    );
    info!(
        "Timings: decode {}ms, segmentation {}ms, composite {}ms, encode {}ms",
        processed.timings.image_decode_ms,
        processed.timings.segmentation_ms,
        processed.timings.composite_ms,
        processed.timings.image_encode_ms
    );
    Ok(())
}

fn show_provider_diagnostics() {
    println!("🔍 Backend and Execution Provider Diagnostics");

    let cpu_count = std::thread::available_parallelism()
        .map(std::num::NonZeroUsize::get)
        .unwrap_or(1);
    println!("💻 System: {cpu_count} CPU cores detected");

    println!("\n🚀 Execution Providers:");
    for provider in ExecutionProviderManager::list_all_providers() {
        let status = if provider.available {
            "✅ Available"
        } else {
            "❌ Not compiled in"
        };
        println!("  • {}: {} - {}", provider.name, status, provider.description);
    }

    #[cfg(feature = "onnx")]
    {
        println!("\n🔧 ONNX Runtime hardware support:");
        for (name, available, description) in crate::backends::OnnxBackend::list_providers() {
            let status = if available { "✅" } else { "❌" };
            println!("  • {name}: {status} {description}");
        }
    }

    println!("\n💡 Usage Examples:");
    println!("  --execution-provider tract:cpu    # Pure Rust backend (default)");
    println!("  --execution-provider onnx:auto    # Best available ONNX Runtime provider");
    println!("  --execution-provider onnx:cuda    # NVIDIA CUDA");
    println!("  --execution-provider onnx:coreml  # Apple CoreML");
}

fn show_cache_dir(cache: &ModelCache) {
    println!("📁 Model cache directory:");
    println!("   Path: {}", cache.cache_dir().display());

    if std::env::var_os(crate::cache::CACHE_DIR_ENV).is_some() {
        println!("   Source: {} environment variable", crate::cache::CACHE_DIR_ENV);
    } else {
        println!("   Source: --cache-dir, config file, or platform cache directory");
    }
}

fn list_models(cache: &ModelCache) -> Result<()> {
    println!("📦 Model presets");
    for preset in ModelPreset::ALL {
        let status = if cache.is_cached(&preset.file_name()) {
            "✅ cached"
        } else {
            "⬇️  not downloaded"
        };
        let [width, height] = preset.preprocessing().target_size;
        println!(
            "  • {:<18} {} ({}x{} input) - {}",
            preset.name(),
            status,
            width,
            height,
            preset.description()
        );
    }

    let cached = cache.list_cached().context("Failed to list cached models")?;
    let custom: Vec<_> = cached.iter().filter(|model| model.preset.is_none()).collect();
    if !custom.is_empty() {
        println!("\n📁 Other cached models:");
        for model in custom {
            println!("  • {} ({})", model.file_name, format_size(model.size_bytes));
        }
    }

    println!("\n   Cache location: {}", cache.cache_dir().display());
    Ok(())
}

fn clear_cache(cache: &ModelCache, config: &ServiceConfig, only_selected: bool) -> Result<()> {
    if only_selected {
        let spec = CliConfigBuilder::model_spec(config)?;
        let Some(file_name) = ModelCache::file_name_for(&spec.source) else {
            anyhow::bail!("'{}' is a local file, not a cached model", config.model);
        };
        if cache
            .remove(&file_name)
            .with_context(|| format!("Failed to remove {}", file_name))?
        {
            println!("✅ Removed {}", file_name);
        } else {
            println!("⚠️  {} is not cached", file_name);
        }
        return Ok(());
    }

    let removed = cache.clear().context("Failed to clear cache")?;
    if removed.is_empty() {
        println!("💡 Cache was already empty");
    } else {
        println!("✅ Removed {} file(s):", removed.len());
        for file_name in &removed {
            println!("   • {}", file_name);
        }
    }
    Ok(())
}

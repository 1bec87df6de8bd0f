//! Tracing configuration module for structured logging and observability
//!
//! The library only emits events and spans; binaries install a subscriber
//! through [`TracingConfig::init`]. `log` records are forwarded to the same
//! subscriber.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Configuration for tracing output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Human-readable console output with colors
    #[default]
    Console,
    /// Compact console output without ANSI colors, for CI and containers
    Compact,
    /// JSON structured logging for log aggregation
    #[cfg(feature = "tracing-json")]
    Json,
}

impl std::str::FromStr for TracingFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "console" | "pretty" => Ok(Self::Console),
            "compact" => Ok(Self::Compact),
            #[cfg(feature = "tracing-json")]
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Unknown log format '{}'. Supported: {}",
                other,
                Self::supported().join(", ")
            )),
        }
    }
}

impl TracingFormat {
    /// Format names accepted by this build
    #[must_use]
    pub fn supported() -> Vec<&'static str> {
        let mut formats = vec!["console", "compact"];
        if cfg!(feature = "tracing-json") {
            formats.push("json");
        }
        formats
    }
}

/// Tracing configuration builder
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Verbosity level (maps to log levels)
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directive; `RUST_LOG` still takes precedence
    pub env_filter: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Convert verbosity level to tracing filter string
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info",  // Default: startup, requests, model loading
            1 => "debug", // -v: per-stage timings and placement
            _ => "trace", // -vv+: everything, including dependencies
        }
    }

    /// Filter directive used when `RUST_LOG` is not set
    #[must_use]
    pub fn filter_directive(&self) -> String {
        self.env_filter
            .clone()
            .unwrap_or_else(|| self.verbosity_to_filter().to_string())
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::try_new(self.filter_directive())?,
        };

        let registry = Registry::default().with(filter);

        match self.format {
            TracingFormat::Console => {
                let fmt_layer = fmt::layer()
                    .with_ansi(true)
                    .with_target(false)
                    .with_level(true)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            TracingFormat::Compact => {
                let fmt_layer = fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .compact();
                registry.with(fmt_layer).try_init()?;
            },
            #[cfg(feature = "tracing-json")]
            TracingFormat::Json => {
                let fmt_layer = fmt::layer()
                    .json()
                    .with_current_span(true)
                    .with_span_list(true);
                registry.with(fmt_layer).try_init()?;
            },
        }

        Ok(())
    }
}

/// Span creation helpers for common operations
pub mod spans {
    use tracing::{Level, Span};

    /// Span covering one HTTP request, keyed by its request id
    pub fn request(request_id: &str, route: &'static str) -> Span {
        tracing::span!(
            Level::INFO,
            "request",
            request_id = %request_id,
            route = route
        )
    }

    /// Span for loading and initializing the segmentation model
    pub fn model_loading(model_name: &str, provider: &str) -> Span {
        tracing::span!(
            Level::INFO,
            "model_loading",
            model_name = %model_name,
            provider = %provider
        )
    }

    /// Span for a model download
    pub fn download(url: &str, destination: &std::path::Path) -> Span {
        tracing::span!(
            Level::INFO,
            "download",
            url = %url,
            destination = %destination.display()
        )
    }
}

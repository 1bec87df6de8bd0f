//! Error types for background removal and compositing operations

use thiserror::Error;

/// Result type alias for background removal operations
pub type Result<T> = std::result::Result<T, BgRemovalError>;

/// Error types for the background removal pipeline and its HTTP boundary
#[derive(Error, Debug)]
pub enum BgRemovalError {
    /// Input bytes could not be decoded into an image
    #[error("Decode error: {0}")]
    Decode(String),

    /// The segmentation capability failed or timed out
    #[error("Segmentation error: {0}")]
    Segmentation(String),

    /// The composited image could not be serialized
    #[error("Encode error: {0}")]
    Encode(String),

    /// Rejected upload (missing file, disallowed extension, empty image)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Invalid configuration or parameters
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Model loading or initialization errors
    #[error("Model error: {0}")]
    Model(String),

    /// Model download errors
    #[error("Network error: {0}")]
    Network(String),

    /// Input/output errors (file not found, permission denied, etc.)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error for unexpected conditions
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BgRemovalError {
    /// Create a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Create a new segmentation error
    pub fn segmentation<S: Into<String>>(msg: S) -> Self {
        Self::Segmentation(msg.into())
    }

    /// Create a new encode error
    pub fn encode<S: Into<String>>(msg: S) -> Self {
        Self::Encode(msg.into())
    }

    /// Create a new validation error
    pub fn validation<S: Into<String>>(msg: S) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a new invalid configuration error
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Create a new model error
    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    /// Create a new internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Create network error with the failing operation as context
    pub fn network_error<E: std::fmt::Display>(operation: &str, error: E) -> Self {
        Self::Network(format!("{}: {}", operation, error))
    }

    /// Create file I/O error with operation context
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let path_display = path.as_ref().display();
        Self::Io(std::io::Error::new(
            error.kind(),
            format!("Failed to {} '{}': {}", operation, path_display, error),
        ))
    }

    /// Create configuration error with valid ranges
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!(
            "Invalid {}: {} (valid range: {})",
            parameter, value, valid_range
        ))
    }

    /// HTTP status code the boundary layer reports for this error
    ///
    /// Only validation failures are the client's fault; everything else is
    /// reported as a server-side processing failure.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            _ => 500,
        }
    }

    /// Generic user-facing message that never exposes internal details
    #[must_use]
    pub fn public_message(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Invalid file",
            _ => "Image processing failed",
        }
    }
}

impl From<image::ImageError> for BgRemovalError {
    fn from(error: image::ImageError) -> Self {
        match error {
            image::ImageError::Encoding(e) => Self::Encode(e.to_string()),
            image::ImageError::IoError(e) => Self::Io(e),
            other => Self::Decode(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let err = BgRemovalError::invalid_config("test config error");
        assert!(matches!(err, BgRemovalError::InvalidConfig(_)));

        let err = BgRemovalError::segmentation("model exploded");
        assert!(matches!(err, BgRemovalError::Segmentation(_)));

        let err = BgRemovalError::decode("not an image");
        assert!(matches!(err, BgRemovalError::Decode(_)));
    }

    #[test]
    fn test_error_display() {
        let err = BgRemovalError::invalid_config("Invalid model path");
        assert_eq!(err.to_string(), "Invalid configuration: Invalid model path");

        let err = BgRemovalError::encode("buffer full");
        assert_eq!(err.to_string(), "Encode error: buffer full");
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(BgRemovalError::validation("bad ext").status_code(), 400);
        assert_eq!(BgRemovalError::decode("garbage").status_code(), 500);
        assert_eq!(BgRemovalError::segmentation("timeout").status_code(), 500);
        assert_eq!(BgRemovalError::encode("oops").status_code(), 500);
        assert_eq!(BgRemovalError::internal("join").status_code(), 500);
    }

    #[test]
    fn test_public_message_hides_details() {
        let err = BgRemovalError::model("/secret/path/u2net.onnx is corrupt");
        assert_eq!(err.public_message(), "Image processing failed");
        assert!(!err.public_message().contains("secret"));

        let err = BgRemovalError::validation("extension .gif");
        assert_eq!(err.public_message(), "Invalid file");
    }

    #[test]
    fn test_enhanced_error_context() {
        let io_error = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = BgRemovalError::file_io_error(
            "read config file",
            Path::new("/etc/bgremove.json"),
            &io_error,
        );
        let error_string = err.to_string();
        assert!(error_string.contains("read config file"));
        assert!(error_string.contains("/etc/bgremove.json"));

        let err = BgRemovalError::config_value_error("brightness", -1.0, ">= 0.0");
        let error_string = err.to_string();
        assert!(error_string.contains("brightness"));
        assert!(error_string.contains("-1"));
        assert!(error_string.contains(">= 0.0"));

        let err = BgRemovalError::network_error("GET https://example.com/model.onnx", "404");
        assert!(err.to_string().starts_with("Network error: GET"));
    }

    #[test]
    fn test_image_error_conversion() {
        let decode_err = image::load_from_memory(b"definitely not an image").unwrap_err();
        let err: BgRemovalError = decode_err.into();
        assert!(matches!(err, BgRemovalError::Decode(_)));
    }
}

//! Inference backend abstraction

use crate::config::ExecutionProvider;
use crate::error::Result;
use crate::models::{ModelInfo, PreprocessingConfig};
use ndarray::Array4;

// Use instant crate for cross-platform time compatibility
use instant::Duration;

/// Runtime options handed to a backend at initialization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct InferenceConfig {
    pub execution_provider: ExecutionProvider,
    /// Number of intra-op threads (0 = backend default)
    pub intra_threads: usize,
}

/// Trait for inference backends
///
/// Backends are not required to be reentrant; callers that share one across
/// threads must serialize access.
pub trait InferenceBackend: Send {
    /// Load the model and prepare it for inference
    ///
    /// Returns the model load time on first initialization and `None` when
    /// the backend was already initialized.
    ///
    /// # Errors
    /// - Model loading or validation errors
    /// - Execution provider setup failures
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>>;

    /// Run inference on an NCHW input tensor
    ///
    /// # Errors
    /// - Backend not initialized
    /// - Model inference failures
    /// - Output tensor is not 4D
    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>>;

    /// Expected input shape (NCHW)
    fn input_shape(&self) -> (usize, usize, usize, usize);

    /// Preprocessing the loaded model expects
    ///
    /// # Errors
    /// - No model attached to the backend
    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig>;

    /// Model metadata
    ///
    /// # Errors
    /// - No model attached to the backend
    fn get_model_info(&self) -> Result<ModelInfo>;

    fn is_initialized(&self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockBackend;

    #[test]
    fn test_backend_trait_object_lifecycle() {
        let mut backend: Box<dyn InferenceBackend> = Box::new(MockBackend::new(16));
        assert!(!backend.is_initialized());
        assert!(backend.infer(&Array4::zeros((1, 3, 16, 16))).is_err());

        let load_time = backend.initialize(&InferenceConfig::default()).unwrap();
        assert!(load_time.is_some());
        assert!(backend.is_initialized());

        // Second initialization is a no-op
        assert!(backend.initialize(&InferenceConfig::default()).unwrap().is_none());

        let output = backend.infer(&Array4::zeros((1, 3, 16, 16))).unwrap();
        assert_eq!(output.shape(), &[1, 1, 16, 16]);
        assert_eq!(backend.input_shape(), (1, 3, 16, 16));
    }

    #[test]
    fn test_inference_config_default() {
        let config = InferenceConfig::default();
        assert_eq!(config.execution_provider, ExecutionProvider::Auto);
        assert_eq!(config.intra_threads, 0);
    }
}

//! Mock inference backend for exercising the segmentation pipeline without
//! model files

use crate::{
    error::{BgRemovalError, Result},
    inference::{InferenceBackend, InferenceConfig},
    models::{ModelInfo, PreprocessingConfig},
};
use instant::Duration;
use ndarray::Array4;
use std::sync::{Arc, Mutex};

/// Square-input mock that predicts a centered square foreground
///
/// The output is `1.0` inside the middle half of each axis and `0.0`
/// elsewhere, so after mask post-processing the subject sits in the center
/// of the source image.
#[derive(Debug, Clone)]
pub struct MockBackend {
    size: usize,
    initialized: bool,
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail_init: bool,
    should_fail_inference: bool,
}

impl MockBackend {
    #[must_use]
    pub fn new(size: usize) -> Self {
        Self {
            size,
            initialized: false,
            call_history: Arc::new(Mutex::new(Vec::new())),
            should_fail_init: false,
            should_fail_inference: false,
        }
    }

    #[must_use]
    pub fn new_failing_init(size: usize) -> Self {
        Self {
            should_fail_init: true,
            ..Self::new(size)
        }
    }

    #[must_use]
    pub fn new_failing_inference(size: usize) -> Self {
        Self {
            should_fail_inference: true,
            ..Self::new(size)
        }
    }

    /// Shared handle to the recorded calls (survives moving the backend into a box)
    #[must_use]
    pub fn call_history(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.call_history)
    }

    fn record_call(&self, method: &str) {
        if let Ok(mut history) = self.call_history.lock() {
            history.push(method.to_string());
        }
    }

    fn generate_mask(&self, batch_size: usize) -> Array4<f32> {
        let lower = self.size / 4;
        let upper = self.size - self.size / 4;
        Array4::from_shape_fn((batch_size, 1, self.size, self.size), |(_, _, y, x)| {
            if (lower..upper).contains(&x) && (lower..upper).contains(&y) {
                1.0
            } else {
                0.0
            }
        })
    }
}

impl InferenceBackend for MockBackend {
    fn initialize(&mut self, _config: &InferenceConfig) -> Result<Option<Duration>> {
        self.record_call("initialize");
        if self.should_fail_init {
            return Err(BgRemovalError::model("Mock initialization failure"));
        }
        if self.initialized {
            return Ok(None);
        }
        self.initialized = true;
        Ok(Some(Duration::from_millis(1)))
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        self.record_call("infer");
        if !self.initialized {
            return Err(BgRemovalError::segmentation("Mock backend not initialized"));
        }
        if self.should_fail_inference {
            return Err(BgRemovalError::segmentation("Mock inference failure"));
        }
        let expected = [1, 3, self.size, self.size];
        if input.shape() != expected {
            return Err(BgRemovalError::segmentation(format!(
                "Mock expected input {:?}, got {:?}",
                expected,
                input.shape()
            )));
        }
        Ok(self.generate_mask(1))
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        (1, 3, self.size, self.size)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        let size = self.size as u32;
        Ok(PreprocessingConfig {
            target_size: [size, size],
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        })
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(ModelInfo {
            name: "mock".to_string(),
            size_bytes: 0,
            input_shape: self.input_shape(),
            output_shape: (1, 1, self.size, self.size),
        })
    }

    fn is_initialized(&self) -> bool {
        self.initialized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_records_calls() {
        let mut backend = MockBackend::new(8);
        let history = backend.call_history();

        backend.initialize(&InferenceConfig::default()).unwrap();
        backend.infer(&Array4::zeros((1, 3, 8, 8))).unwrap();

        assert_eq!(*history.lock().unwrap(), vec!["initialize", "infer"]);
    }

    #[test]
    fn test_mock_failures() {
        let mut backend = MockBackend::new_failing_init(8);
        assert!(backend.initialize(&InferenceConfig::default()).is_err());
        assert!(!backend.is_initialized());

        let mut backend = MockBackend::new_failing_inference(8);
        backend.initialize(&InferenceConfig::default()).unwrap();
        assert!(matches!(
            backend.infer(&Array4::zeros((1, 3, 8, 8))),
            Err(BgRemovalError::Segmentation(_))
        ));
    }

    #[test]
    fn test_mock_mask_pattern() {
        let mut backend = MockBackend::new(8);
        backend.initialize(&InferenceConfig::default()).unwrap();
        let mask = backend.infer(&Array4::zeros((1, 3, 8, 8))).unwrap();

        assert!((mask[[0, 0, 4, 4]] - 1.0).abs() < f32::EPSILON);
        assert!(mask[[0, 0, 0, 0]].abs() < f32::EPSILON);
        assert!(mask[[0, 0, 7, 2]].abs() < f32::EPSILON);
    }
}

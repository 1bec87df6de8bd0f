//! Tract backend implementation
//!
//! Pure Rust ONNX inference with no native dependencies. Only CPU execution
//! is available.

use crate::error::{BgRemovalError, Result};
use crate::inference::{InferenceBackend, InferenceConfig};
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use tract_onnx::prelude::*;

/// Type alias for the complex Tract model type to reduce complexity warnings
type TractModel = RunnableModel<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// Tract backend for running segmentation models using pure Rust inference
#[derive(Debug)]
pub struct TractBackend {
    model: Option<TractModel>,
    model_manager: ModelManager,
    model_size_bytes: usize,
}

impl TractBackend {
    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            model: None,
            model_manager,
            model_size_bytes: 0,
        }
    }

    /// Load, pin the input shape of, and optimize the ONNX graph
    fn load_model(&mut self) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_data = self.model_manager.load_model()?;
        self.model_size_bytes = model_data.len();
        let (batch, channels, height, width) = self.input_shape();

        log::info!("🚀 Initializing Tract backend");
        log::info!("🧠 Model: {}", self.model_manager.spec().source.display_name());
        log::info!("📐 Input shape: {}x{}x{}x{}", batch, channels, height, width);
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = self.model_size_bytes as f64 / (1024.0 * 1024.0);
        log::info!("📏 Model size: {size_mb:.2} MB");

        let model = onnx()
            .model_for_read(&mut std::io::Cursor::new(model_data))
            .map_err(|e| BgRemovalError::model(format!("Failed to load ONNX model: {e}")))?
            .with_input_fact(0, f32::fact([batch, channels, height, width]).into())
            .map_err(|e| BgRemovalError::model(format!("Failed to set input shape: {e}")))?
            .into_optimized()
            .map_err(|e| BgRemovalError::model(format!("Failed to optimize model: {e}")))?
            .into_runnable()
            .map_err(|e| BgRemovalError::model(format!("Failed to create runnable model: {e}")))?;

        self.model = Some(model);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "✅ Tract backend initialized in {}ms",
            model_load_time.as_millis()
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for TractBackend {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.model.is_some() {
            return Ok(None);
        }
        if config.intra_threads > 0 {
            log::debug!(
                "Tract ignores the thread setting ({} requested)",
                config.intra_threads
            );
        }
        self.load_model().map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let model = self
            .model
            .as_ref()
            .ok_or_else(|| BgRemovalError::segmentation("Tract model not initialized"))?;

        log::debug!("🔮 Running Tract inference on {:?}", input.shape());
        let inference_start = Instant::now();

        let contiguous = input.as_standard_layout();
        let data = contiguous
            .as_slice()
            .ok_or_else(|| BgRemovalError::internal("Input tensor is not contiguous"))?;
        let input_tensor = Tensor::from_shape(input.shape(), data)
            .map_err(|e| BgRemovalError::segmentation(format!("Failed to build input tensor: {e}")))?;

        let outputs = model
            .run(tvec![input_tensor.into()])
            .map_err(|e| BgRemovalError::segmentation(format!("Tract inference failed: {e}")))?;

        let output_tensor = outputs
            .into_iter()
            .next()
            .ok_or_else(|| BgRemovalError::segmentation("No output tensor found"))?
            .into_arc_tensor();

        let shape = output_tensor.shape().to_vec();
        let &[batch, channels, height, width] = shape.as_slice() else {
            return Err(BgRemovalError::segmentation(format!(
                "Expected 4D output tensor, got shape {:?}",
                shape
            )));
        };
        let values = output_tensor
            .as_slice::<f32>()
            .map_err(|e| BgRemovalError::segmentation(format!("Unexpected output type: {e}")))?;

        let output_array = Array4::from_shape_vec((batch, channels, height, width), values.to_vec())
            .map_err(|e| {
                BgRemovalError::segmentation(format!("Failed to reshape output tensor: {e}"))
            })?;

        log::debug!(
            "✅ Tract inference completed in {}ms",
            inference_start.elapsed().as_millis()
        );
        Ok(output_array)
    }

    fn input_shape(&self) -> (usize, usize, usize, usize) {
        let [width, height] = self.model_manager.get_preprocessing_config().target_size;
        (1, 3, height as usize, width as usize)
    }

    fn get_preprocessing_config(&self) -> Result<PreprocessingConfig> {
        Ok(self.model_manager.get_preprocessing_config())
    }

    fn get_model_info(&self) -> Result<ModelInfo> {
        Ok(self.model_manager.get_info(self.model_size_bytes))
    }

    fn is_initialized(&self) -> bool {
        self.model.is_some()
    }
}

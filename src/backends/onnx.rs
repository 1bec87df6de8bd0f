//! ONNX Runtime backend implementation
//!
//! Runs segmentation models through ONNX Runtime with CPU, CUDA or CoreML
//! execution providers. Providers that are requested but unavailable fall
//! back to CPU with a warning.

use crate::config::ExecutionProvider;
use crate::error::{BgRemovalError, Result};
use crate::inference::{InferenceBackend, InferenceConfig};
use crate::models::{ModelInfo, ModelManager, PreprocessingConfig};
use ndarray::Array4;
use ort::execution_providers::{
    CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider as OrtExecutionProvider,
    ExecutionProviderDispatch,
};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;

// Use instant crate for cross-platform time compatibility
use instant::{Duration, Instant};

/// ONNX Runtime backend for running segmentation models
#[derive(Debug)]
pub struct OnnxBackend {
    session: Option<Session>,
    model_manager: ModelManager,
    model_size_bytes: usize,
}

fn cuda_available() -> bool {
    OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false)
}

fn coreml_available() -> bool {
    OrtExecutionProvider::is_available(&CoreMLExecutionProvider::default()).unwrap_or(false)
}

impl OnnxBackend {
    /// List all ONNX Runtime execution providers with availability status and descriptions
    ///
    /// # Examples
    /// ```rust,no_run
    /// use bgremove_server::backends::OnnxBackend;
    ///
    /// for (name, available, description) in OnnxBackend::list_providers() {
    ///     println!("{}: {} - {}", name, if available { "✅" } else { "❌" }, description);
    /// }
    /// ```
    #[must_use]
    pub fn list_providers() -> Vec<(String, bool, String)> {
        log::debug!("🔍 System: {} / {}", std::env::consts::OS, std::env::consts::ARCH);

        vec![
            (
                "CPU".to_string(),
                true,
                "Always available, uses CPU for inference".to_string(),
            ),
            (
                "CUDA".to_string(),
                cuda_available(),
                "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
            ),
            (
                "CoreML".to_string(),
                coreml_available(),
                "Apple Silicon GPU acceleration (macOS only)".to_string(),
            ),
        ]
    }

    #[must_use]
    pub fn with_model_manager(model_manager: ModelManager) -> Self {
        Self {
            session: None,
            model_manager,
            model_size_bytes: 0,
        }
    }

    /// Execution providers to register for the requested provider, in priority order
    fn execution_providers(requested: ExecutionProvider) -> Vec<ExecutionProviderDispatch> {
        let mut providers = Vec::new();
        match requested {
            ExecutionProvider::Auto => {
                if cuda_available() {
                    log::info!("🚀 CUDA execution provider is available and will be used");
                    providers.push(CUDAExecutionProvider::default().build());
                }
                if coreml_available() {
                    log::info!("🍎 CoreML execution provider is available and will be used");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                }
                if providers.is_empty() {
                    log::info!("No hardware acceleration available, using CPU");
                }
            },
            ExecutionProvider::Cpu => {
                log::info!("Using CPU execution provider");
            },
            ExecutionProvider::Cuda => {
                if cuda_available() {
                    log::info!("Using CUDA execution provider");
                    providers.push(CUDAExecutionProvider::default().build());
                } else {
                    log::warn!(
                        "CUDA execution provider requested but not available, falling back to CPU"
                    );
                }
            },
            ExecutionProvider::CoreMl => {
                if coreml_available() {
                    log::info!("🍎 Using CoreML execution provider (explicitly requested)");
                    providers.push(CoreMLExecutionProvider::default().with_subgraphs(true).build());
                } else {
                    log::warn!(
                        "CoreML execution provider requested but not available, falling back to CPU"
                    );
                }
            },
        }
        providers
    }

    fn load_model(&mut self, config: &InferenceConfig) -> Result<Duration> {
        let model_load_start = Instant::now();

        let model_data = self.model_manager.load_model()?;
        self.model_size_bytes = model_data.len();

        let mut session_builder = Session::builder()
            .map_err(|e| BgRemovalError::model(format!("Failed to create session builder: {e}")))?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to set optimization level: {e}"))
            })?;

        let providers = Self::execution_providers(config.execution_provider);
        if !providers.is_empty() {
            session_builder = session_builder
                .with_execution_providers(providers)
                .map_err(|e| {
                    BgRemovalError::model(format!("Failed to set execution providers: {e}"))
                })?;
        }

        let intra_threads = if config.intra_threads > 0 {
            config.intra_threads
        } else {
            std::thread::available_parallelism()
                .map(std::num::NonZeroUsize::get)
                .unwrap_or(4)
        };

        let session = session_builder
            .with_intra_threads(intra_threads)
            .map_err(|e| BgRemovalError::model(format!("Failed to set intra threads: {e}")))?
            .commit_from_memory(&model_data)
            .map_err(|e| {
                BgRemovalError::model(format!("Failed to create session from model data: {e}"))
            })?;

        log::debug!("✅ ONNX Runtime session created");
        log::debug!("  - Requested provider: {}", config.execution_provider);
        log::debug!("  - Threading: {intra_threads} intra-op threads");
        log::debug!("  - Model: {}", self.model_manager.spec().source.display_name());
        #[allow(clippy::cast_precision_loss)] // Precision loss acceptable for logging display
        let size_mb = self.model_size_bytes as f64 / (1024.0 * 1024.0);
        log::debug!("  - Model size: {size_mb:.2} MB");

        self.session = Some(session);

        let model_load_time = model_load_start.elapsed();
        log::info!(
            "📊 Model loading complete: {:.0}ms",
            model_load_time.as_secs_f64() * 1000.0
        );
        Ok(model_load_time)
    }
}

impl InferenceBackend for OnnxBackend {
    fn initialize(&mut self, config: &InferenceConfig) -> Result<Option<Duration>> {
        if self.session.is_some() {
            return Ok(None);
        }
        self.load_model(config).map(Some)
    }

    fn infer(&mut self, input: &Array4<f32>) -> Result<Array4<f32>> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| BgRemovalError::segmentation("ONNX session not initialized"))?;

        let inference_start = Instant::now();
        log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

        let input_value = Value::from_array(input.clone()).map_err(|e| {
            BgRemovalError::segmentation(format!("Failed to convert input tensor: {e}"))
        })?;

        // Positional inputs and outputs keep us independent of tensor names
        let outputs = session
            .run(ort::inputs![input_value])
            .map_err(|e| BgRemovalError::segmentation(format!("ONNX inference failed: {e}")))?;

        let output_tensor = {
            let first_key = outputs
                .keys()
                .next()
                .ok_or_else(|| BgRemovalError::segmentation("No output tensors found"))?;
            outputs
                .get(first_key)
                .ok_or_else(|| BgRemovalError::segmentation("First output tensor not found"))?
                .try_extract_array::<f32>()
                .map_err(|e| {
                    BgRemovalError::segmentation(format!("Failed to extract output tensor: {e}"))
                })?
        };

        let shape = output_tensor.shape().to_vec();
        let &[batch, channels, height, width] = shape.as_slice() else {
            return Err(BgRemovalError::segmentation(format!(
                "Expected 4D output tensor, got {}D",
                shape.len()
            )));
        };
        let values: Vec<f32> = output_tensor.iter().copied().collect();
        let output_array = Array4::from_shape_vec((batch, channels, height, width), values)
            .map_err(|e| {
                BgRemovalError::segmentation(format!("Failed to reshape output tensor: {e}"))
            })?;

        log::debug!(
            "📊 Inference complete: {:.2}ms",
            inference_start.elapsed().as_secs_f64() * 1000.0
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
        self.session.is_some()
    }
}

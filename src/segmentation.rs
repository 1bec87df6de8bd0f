//! Background removal capability
//!
//! `BackgroundRemover` is the seam between the pipeline and whatever produces
//! cutouts. `ModelBackgroundRemover` is the model-backed implementation: it
//! runs a salient object segmentation network and applies the predicted mask
//! to the source image.

use crate::{
    compositor::blend_channel,
    error::{BgRemovalError, Result},
    inference::{InferenceBackend, InferenceConfig},
    models::{ModelInfo, PreprocessingConfig},
    utils::ImagePreprocessor,
};
use image::{GrayImage, Rgba, RgbaImage};
use std::sync::Mutex;
use tracing::{instrument, span, Level};

/// Anything that can turn an image into a cutout of its foreground
///
/// The returned image has the same dimensions as the input, with background
/// pixels made transparent.
pub trait BackgroundRemover: Send + Sync {
    /// # Errors
    /// - `Segmentation` when the subject cannot be extracted
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage>;
}

/// Apply a grayscale mask to an image, compositing it over transparent black
///
/// Every channel, alpha included, is scaled once by the mask value. An
/// opaque source therefore ends up with the mask as its alpha, and masked-out
/// pixels become fully transparent black.
///
/// # Errors
/// - `Segmentation` when the mask and image sizes differ
pub fn apply_mask(image: &RgbaImage, mask: &GrayImage) -> Result<RgbaImage> {
    if image.dimensions() != mask.dimensions() {
        return Err(BgRemovalError::segmentation(format!(
            "Mask size {:?} does not match image size {:?}",
            mask.dimensions(),
            image.dimensions()
        )));
    }

    Ok(RgbaImage::from_fn(image.width(), image.height(), |x, y| {
        let pixel = image.get_pixel(x, y);
        let m = mask.get_pixel(x, y)[0];
        Rgba([
            blend_channel(pixel[0], 0, m),
            blend_channel(pixel[1], 0, m),
            blend_channel(pixel[2], 0, m),
            blend_channel(pixel[3], 0, m),
        ])
    }))
}

/// Model-backed background remover
///
/// Inference backends need exclusive access, so concurrent callers are
/// serialized on an internal lock. Preprocessing and mask application run
/// outside of it.
pub struct ModelBackgroundRemover {
    backend: Mutex<Box<dyn InferenceBackend>>,
    preprocessing: PreprocessingConfig,
    model_info: ModelInfo,
}

impl std::fmt::Debug for ModelBackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelBackgroundRemover")
            .field("preprocessing", &self.preprocessing)
            .field("model_info", &self.model_info)
            .finish_non_exhaustive()
    }
}

impl ModelBackgroundRemover {
    /// Initialize `backend` and wrap it
    ///
    /// Model loading happens here, once, so the first request does not pay
    /// for it.
    ///
    /// # Errors
    /// - Model loading or execution provider setup failures
    pub fn new(mut backend: Box<dyn InferenceBackend>, config: &InferenceConfig) -> Result<Self> {
        if let Some(load_time) = backend.initialize(config)? {
            log::info!("Segmentation model ready in {}ms", load_time.as_millis());
        }
        let preprocessing = backend.get_preprocessing_config()?;
        let model_info = backend.get_model_info()?;

        Ok(Self {
            backend: Mutex::new(backend),
            preprocessing,
            model_info,
        })
    }

    #[must_use]
    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    #[must_use]
    pub fn preprocessing_config(&self) -> &PreprocessingConfig {
        &self.preprocessing
    }

    /// Predict the alpha mask for `image` at its own resolution
    ///
    /// # Errors
    /// - Preprocessing, inference or post-processing failures
    pub fn predict_mask(&self, image: &RgbaImage) -> Result<GrayImage> {
        let input = {
            let _span = span!(Level::DEBUG, "preprocessing").entered();
            ImagePreprocessor::preprocess_for_inference(image, &self.preprocessing)?
        };

        let output = {
            let _span = span!(Level::DEBUG, "inference", model = %self.model_info.name).entered();
            let mut backend = self
                .backend
                .lock()
                .map_err(|_| BgRemovalError::internal("Inference backend lock poisoned"))?;
            backend.infer(&input)?
        };

        let _span = span!(Level::DEBUG, "postprocessing").entered();
        ImagePreprocessor::tensor_to_mask(&output, image.width(), image.height())
    }
}

impl BackgroundRemover for ModelBackgroundRemover {
    #[instrument(skip(self, image), fields(width = image.width(), height = image.height()))]
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let mask = self.predict_mask(image).map_err(|e| match e {
            BgRemovalError::Segmentation(_) => e,
            other => BgRemovalError::segmentation(other.to_string()),
        })?;
        apply_mask(image, &mask)
    }
}

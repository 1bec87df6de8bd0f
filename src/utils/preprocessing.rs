//! Tensor conversion for segmentation models
//!
//! Turns images into normalized NCHW tensors and model outputs back into
//! full-resolution alpha masks.

use crate::{
    error::{BgRemovalError, Result},
    models::PreprocessingConfig,
};
use image::buffer::ConvertBuffer;
use image::imageops::{self, FilterType};
use image::{GrayImage, RgbImage, RgbaImage};
use ndarray::Array4;

/// Lower bound for the per-image scale divisor (avoids dividing by zero on black images)
const MIN_SCALE_DIVISOR: f32 = 1e-6;

/// Shared image preprocessing utilities
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// Build the model input tensor for an image
    ///
    /// The image is stretched (aspect ratio is not preserved) to the model's
    /// input size with a Lanczos filter, scaled by its own brightest channel
    /// value and normalized per channel.
    ///
    /// # Returns
    /// * `Ok(tensor)` - `[1, 3, height, width]` tensor ready for inference
    /// * `Err(BgRemovalError)` - Zero-sized image or model input size
    pub fn preprocess_for_inference(
        image: &RgbaImage,
        preprocessing_config: &PreprocessingConfig,
    ) -> Result<Array4<f32>> {
        let [target_width, target_height] = preprocessing_config.target_size;
        if target_width == 0 || target_height == 0 {
            return Err(BgRemovalError::invalid_config(
                "Model input size must be non-zero",
            ));
        }
        if image.width() == 0 || image.height() == 0 {
            return Err(BgRemovalError::validation("Cannot preprocess an empty image"));
        }

        let rgb: RgbImage = image.convert();
        let resized = imageops::resize(&rgb, target_width, target_height, FilterType::Lanczos3);

        Ok(Self::canvas_to_tensor(&resized, preprocessing_config))
    }

    /// Convert a resized RGB image to a normalized tensor
    fn canvas_to_tensor(canvas: &RgbImage, preprocessing_config: &PreprocessingConfig) -> Array4<f32> {
        let (width, height) = canvas.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        let max_value = canvas.as_raw().iter().copied().max().unwrap_or(0);
        let divisor = f32::from(max_value).max(MIN_SCALE_DIVISOR);

        let mean = preprocessing_config.normalization_mean;
        let std = preprocessing_config.normalization_std;

        #[allow(clippy::indexing_slicing)]
        // Safe: tensor dimensions pre-allocated to match canvas size
        for (x, y, pixel) in canvas.enumerate_pixels() {
            let (x, y) = (x as usize, y as usize);
            for channel in 0..3 {
                let scaled = f32::from(pixel[channel]) / divisor;
                tensor[[0, channel, y, x]] = (scaled - mean[channel]) / std[channel];
            }
        }

        tensor
    }

    /// Convert the first output channel of a model into an alpha mask
    ///
    /// The prediction is min-max normalized, quantized to `u8` (truncating)
    /// and resized back to `width x height` with a Lanczos filter. A constant
    /// prediction yields an all-transparent mask.
    pub fn tensor_to_mask(output: &Array4<f32>, width: u32, height: u32) -> Result<GrayImage> {
        let shape = output.shape();
        let (Some(&channels), Some(&out_height), Some(&out_width)) =
            (shape.get(1), shape.get(2), shape.get(3))
        else {
            return Err(BgRemovalError::segmentation("Model output is not a 4D tensor"));
        };
        if shape.first() == Some(&0) || channels == 0 || out_height == 0 || out_width == 0 {
            return Err(BgRemovalError::segmentation(format!(
                "Model output has an empty dimension: {:?}",
                shape
            )));
        }

        let prediction = output.slice(ndarray::s![0, 0, .., ..]);
        let (min, max) = prediction
            .iter()
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let range = max - min;

        let mut mask = GrayImage::new(out_width as u32, out_height as u32);
        if range.is_finite() && range > 0.0 {
            for ((y, x), &value) in prediction.indexed_iter() {
                let normalized = (value - min) / range;
                mask.put_pixel(x as u32, y as u32, image::Luma([(normalized * 255.0) as u8]));
            }
        }

        if mask.dimensions() == (width, height) {
            return Ok(mask);
        }
        Ok(imageops::resize(&mask, width, height, FilterType::Lanczos3))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn u2net_config() -> PreprocessingConfig {
        PreprocessingConfig {
            target_size: [32, 32],
            normalization_mean: [0.485, 0.456, 0.406],
            normalization_std: [0.229, 0.224, 0.225],
        }
    }

    #[test]
    fn test_preprocess_shape_is_stretched_to_model_size() {
        let image = RgbaImage::from_pixel(100, 40, Rgba([255, 0, 0, 255]));
        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &u2net_config()).unwrap();
        assert_eq!(tensor.shape(), &[1, 3, 32, 32]);
    }

    #[test]
    fn test_preprocess_normalization_values() {
        // Solid red: max channel is 255, so red scales to 1.0 and others to 0.0
        let image = RgbaImage::from_pixel(16, 16, Rgba([255, 0, 0, 255]));
        let config = u2net_config();
        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &config).unwrap();

        let expected_r = (1.0 - 0.485) / 0.229;
        let expected_g = (0.0 - 0.456) / 0.224;
        assert!((tensor[[0, 0, 5, 5]] - expected_r).abs() < 1e-3);
        assert!((tensor[[0, 1, 5, 5]] - expected_g).abs() < 1e-3);
    }

    #[test]
    fn test_preprocess_scales_by_brightest_value() {
        // Max value 100 means a 100-valued channel maps to 1.0
        let image = RgbaImage::from_pixel(8, 8, Rgba([100, 50, 0, 255]));
        let config = PreprocessingConfig {
            target_size: [8, 8],
            normalization_mean: [0.0; 3],
            normalization_std: [1.0; 3],
        };
        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &config).unwrap();
        assert!((tensor[[0, 0, 0, 0]] - 1.0).abs() < 1e-3);
        assert!((tensor[[0, 1, 0, 0]] - 0.5).abs() < 1e-2);
    }

    #[test]
    fn test_preprocess_black_image_does_not_divide_by_zero() {
        let image = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 0]));
        let tensor = ImagePreprocessor::preprocess_for_inference(&image, &u2net_config()).unwrap();
        assert!(tensor.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_preprocess_rejects_empty_input() {
        let image = RgbaImage::new(0, 10);
        assert!(ImagePreprocessor::preprocess_for_inference(&image, &u2net_config()).is_err());
    }

    #[test]
    fn test_tensor_to_mask_normalizes_and_resizes() {
        let mut output = Array4::<f32>::zeros((1, 1, 4, 4));
        output[[0, 0, 0, 0]] = -2.0;
        output[[0, 0, 3, 3]] = 6.0;

        let mask = ImagePreprocessor::tensor_to_mask(&output, 4, 4).unwrap();
        assert_eq!(mask.get_pixel(0, 0)[0], 0);
        assert_eq!(mask.get_pixel(3, 3)[0], 255);
        // (0 - -2) / 8 * 255 = 63.75, truncated
        assert_eq!(mask.get_pixel(1, 1)[0], 63);

        let resized = ImagePreprocessor::tensor_to_mask(&output, 10, 7).unwrap();
        assert_eq!(resized.dimensions(), (10, 7));
    }

    #[test]
    fn test_tensor_to_mask_constant_prediction() {
        let output = Array4::<f32>::from_elem((1, 1, 3, 3), 0.7);
        let mask = ImagePreprocessor::tensor_to_mask(&output, 3, 3).unwrap();
        assert!(mask.pixels().all(|p| p[0] == 0));
    }

    #[test]
    fn test_tensor_to_mask_rejects_empty_output() {
        let output = Array4::<f32>::zeros((1, 0, 3, 3));
        assert!(ImagePreprocessor::tensor_to_mask(&output, 3, 3).is_err());
    }
}

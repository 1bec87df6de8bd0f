//! Core data types passed between pipeline stages

use crate::error::{BgRemovalError, Result};
use image::{RgbImage, RgbaImage};
use serde::{Deserialize, Serialize};

/// Foreground subject with background pixels made transparent
///
/// Guaranteed to be non-empty.
#[derive(Debug, Clone, PartialEq)]
pub struct Cutout {
    image: RgbaImage,
}

impl Cutout {
    /// Wrap an RGBA buffer, rejecting zero-sized images
    pub fn new(image: RgbaImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(BgRemovalError::validation(format!(
                "Cutout must be non-empty, got {}x{}",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image })
    }

    #[must_use]
    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    #[must_use]
    pub fn as_image(&self) -> &RgbaImage {
        &self.image
    }

    #[must_use]
    pub fn into_image(self) -> RgbaImage {
        self.image
    }
}

/// Resampling filter used when scaling the cutout onto the canvas
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResampleFilter {
    /// Cubic (Catmull-Rom), used when enlarging
    Bicubic,
    /// Lanczos with window 3, used when shrinking or keeping size
    Lanczos,
}

impl ResampleFilter {
    /// Bicubic for upscaling (`ratio > 1`), Lanczos otherwise
    #[must_use]
    pub fn for_ratio(ratio: f64) -> Self {
        if ratio > 1.0 {
            Self::Bicubic
        } else {
            Self::Lanczos
        }
    }

    #[must_use]
    pub fn filter_type(self) -> image::imageops::FilterType {
        match self {
            Self::Bicubic => image::imageops::FilterType::CatmullRom,
            Self::Lanczos => image::imageops::FilterType::Lanczos3,
        }
    }
}

/// Where and how the subject was placed on the canvas
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    /// Uniform scale factor applied to both axes
    pub ratio: f64,
    pub width: u32,
    pub height: u32,
    pub offset_x: u32,
    pub offset_y: u32,
    pub filter: ResampleFilter,
}

/// Flattened canvas ready for encoding
#[derive(Debug, Clone)]
pub struct CompositeResult {
    pub image: RgbImage,
    pub placement: Placement,
}

/// Per-stage timing for a processed request
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessingTimings {
    /// Decoding the uploaded bytes
    pub image_decode_ms: u64,

    /// Background removal (preprocessing, inference, mask application)
    pub segmentation_ms: u64,

    /// Scaling, optional enhancement and flattening
    pub composite_ms: u64,

    /// PNG encoding
    pub image_encode_ms: u64,

    /// Total end-to-end processing time
    pub total_ms: u64,
}

impl ProcessingTimings {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Share of the total spent in segmentation
    #[must_use]
    pub fn segmentation_ratio(&self) -> f64 {
        if self.total_ms == 0 {
            0.0
        } else {
            self.segmentation_ms as f64 / self.total_ms as f64
        }
    }
}

/// Final output of the pipeline
#[derive(Debug, Clone)]
pub struct ProcessedImage {
    /// PNG-encoded canvas
    pub png: Vec<u8>,
    pub dimensions: (u32, u32),
    pub placement: Placement,
    pub timings: ProcessingTimings,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cutout_rejects_empty_images() {
        assert!(Cutout::new(RgbaImage::new(0, 10)).is_err());
        assert!(Cutout::new(RgbaImage::new(10, 0)).is_err());

        let cutout = Cutout::new(RgbaImage::new(3, 4)).unwrap();
        assert_eq!(cutout.dimensions(), (3, 4));
    }

    #[test]
    fn test_filter_selection() {
        assert_eq!(ResampleFilter::for_ratio(2.0), ResampleFilter::Bicubic);
        assert_eq!(ResampleFilter::for_ratio(1.000_001), ResampleFilter::Bicubic);
        assert_eq!(ResampleFilter::for_ratio(1.0), ResampleFilter::Lanczos);
        assert_eq!(ResampleFilter::for_ratio(0.25), ResampleFilter::Lanczos);
    }

    #[test]
    fn test_segmentation_ratio() {
        let timings = ProcessingTimings {
            segmentation_ms: 75,
            total_ms: 100,
            ..ProcessingTimings::new()
        };
        assert!((timings.segmentation_ratio() - 0.75).abs() < f64::EPSILON);
        assert!(ProcessingTimings::new().segmentation_ratio().abs() < f64::EPSILON);
    }
}

//! Image decoding and PNG encoding

use crate::config::PngCompression;
use crate::error::{BgRemovalError, Result};
use image::codecs::png::{FilterType, PngEncoder};
use image::{DynamicImage, ImageEncoder, RgbImage};
use std::path::Path;

/// Service for turning bytes into images and images into bytes
pub struct ImageIOService;

impl ImageIOService {
    /// Decode an uploaded image, detecting the format from its content
    ///
    /// # Errors
    /// - `Decode` when the bytes are empty, truncated or not a supported format
    pub fn load_from_bytes(bytes: &[u8]) -> Result<DynamicImage> {
        if bytes.is_empty() {
            return Err(BgRemovalError::decode("Empty image data"));
        }
        image::load_from_memory(bytes).map_err(|e| {
            BgRemovalError::decode(format!(
                "Failed to decode image ({} bytes): {}",
                bytes.len(),
                e
            ))
        })
    }

    /// Read and decode an image file
    ///
    /// # Examples
    /// ```rust,no_run
    /// use bgremove_server::services::ImageIOService;
    ///
    /// let image = ImageIOService::load_image("input.jpg")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();
        let data = std::fs::read(path_ref)
            .map_err(|e| BgRemovalError::file_io_error("read image file", path_ref, &e))?;
        Self::load_from_bytes(&data)
    }

    /// Encode an RGB canvas as PNG using fast compression
    ///
    /// # Errors
    /// - `Encode` when the encoder rejects the buffer
    pub fn encode_png(image: &RgbImage) -> Result<Vec<u8>> {
        Self::encode_png_with(image, PngCompression::Fast)
    }

    /// Encode an RGB canvas as PNG with the given compression effort
    pub fn encode_png_with(image: &RgbImage, compression: PngCompression) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let encoder = PngEncoder::new_with_quality(
            &mut buffer,
            compression.compression_type(),
            FilterType::Adaptive,
        );
        encoder
            .write_image(
                image.as_raw(),
                image.width(),
                image.height(),
                image::ExtendedColorType::Rgb8,
            )
            .map_err(|e| BgRemovalError::encode(format!("Failed to encode PNG: {}", e)))?;
        Ok(buffer)
    }

    /// Write PNG bytes to disk, creating parent directories as needed
    pub fn save_png<P: AsRef<Path>>(png: &[u8], path: P) -> Result<()> {
        let path_ref = path.as_ref();
        if let Some(parent) = path_ref.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| BgRemovalError::file_io_error("create output directory", parent, &e))?;
        }
        std::fs::write(path_ref, png)
            .map_err(|e| BgRemovalError::file_io_error("write output file", path_ref, &e))
    }
}

//! Shared fixtures for integration tests

#![allow(dead_code)]

use bgremove_server::{
    AppState, BackgroundRemovalProcessor, BackgroundRemover, BgRemovalError, ProcessorConfig,
    Result, ServerConfig,
};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use std::sync::Arc;

pub const BOUNDARY: &str = "----bgremove-test-boundary";

/// Canvas background used by default, `#f7f7f7`
pub const BACKGROUND: [u8; 3] = [247, 247, 247];

/// Segmentation stand-in that keeps every pixel of the input
pub struct PassThroughRemover;

impl BackgroundRemover for PassThroughRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        Ok(image.clone())
    }
}

/// Segmentation stand-in that keeps only a centered box of half the size
pub struct CenterBoxRemover;

impl BackgroundRemover for CenterBoxRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        let mut cutout = image.clone();
        for (x, y, pixel) in cutout.enumerate_pixels_mut() {
            let inside = (width / 4..width - width / 4).contains(&x)
                && (height / 4..height - height / 4).contains(&y);
            if !inside {
                pixel[3] = 0;
            }
        }
        Ok(cutout)
    }
}

/// Segmentation stand-in that always fails
pub struct FailingRemover;

impl BackgroundRemover for FailingRemover {
    fn remove_background(&self, _image: &RgbaImage) -> Result<RgbaImage> {
        Err(BgRemovalError::segmentation("model exploded at /secret/weights.onnx"))
    }
}

/// Segmentation stand-in that takes longer than any test timeout
pub struct SlowRemover;

impl BackgroundRemover for SlowRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        std::thread::sleep(std::time::Duration::from_secs(3));
        Ok(image.clone())
    }
}

/// Encode a solid-color image in `format`
pub fn solid_image_bytes(width: u32, height: u32, color: [u8; 4], format: ImageFormat) -> Vec<u8> {
    let image = RgbaImage::from_pixel(width, height, Rgba(color));
    let mut bytes = Vec::new();
    match format {
        ImageFormat::Jpeg => image::DynamicImage::ImageRgba8(image)
            .to_rgb8()
            .write_to(&mut Cursor::new(&mut bytes), format)
            .unwrap(),
        _ => image.write_to(&mut Cursor::new(&mut bytes), format).unwrap(),
    }
    bytes
}

pub fn solid_png(width: u32, height: u32, color: [u8; 4]) -> Vec<u8> {
    solid_image_bytes(width, height, color, ImageFormat::Png)
}

/// One field of a hand-built multipart body
pub enum FormField<'a> {
    File {
        name: &'a str,
        filename: &'a str,
        content_type: &'a str,
        data: &'a [u8],
    },
    Text {
        name: &'a str,
        value: &'a str,
    },
}

/// Build a `multipart/form-data` body delimited by [`BOUNDARY`]
pub fn multipart_body(fields: &[FormField<'_>]) -> Vec<u8> {
    let mut body = Vec::new();
    for field in fields {
        body.extend_from_slice(format!("--{}\r\n", BOUNDARY).as_bytes());
        match field {
            FormField::File {
                name,
                filename,
                content_type,
                data,
            } => {
                body.extend_from_slice(
                    format!(
                        "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\nContent-Type: {}\r\n\r\n",
                        name, filename, content_type
                    )
                    .as_bytes(),
                );
                body.extend_from_slice(data);
            },
            FormField::Text { name, value } => {
                body.extend_from_slice(
                    format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n{}", name, value)
                        .as_bytes(),
                );
            },
        }
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{}--\r\n", BOUNDARY).as_bytes());
    body
}

pub fn multipart_content_type() -> String {
    format!("multipart/form-data; boundary={}", BOUNDARY)
}

/// Processor on a small canvas so tests stay fast
pub fn small_canvas_config(size: u32) -> ProcessorConfig {
    let mut config = ProcessorConfig::default();
    config.canvas.width = size;
    config.canvas.height = size;
    config
}

pub fn processor_with(
    remover: impl BackgroundRemover + 'static,
    config: ProcessorConfig,
) -> BackgroundRemovalProcessor {
    BackgroundRemovalProcessor::new(config, Arc::new(remover)).unwrap()
}

pub fn app_state(processor: BackgroundRemovalProcessor, static_dir: &Path) -> AppState {
    let config = ServerConfig::builder().static_dir(static_dir).build().unwrap();
    AppState::new(processor, config)
}

//! Lighting and sharpening adjustments applied before compositing
//!
//! Brightness, contrast and saturation interpolate each color channel between
//! a degenerate image and the original (`degenerate + factor * (v - degenerate)`),
//! so a factor of `1.0` is the identity. Results are truncated toward zero and
//! clamped to `0..=255`. The alpha channel is never modified.

use crate::config::{EnhancementConfig, UnsharpMaskConfig};
use image::{imageops, Rgba, RgbaImage};

/// ITU-R 601-2 luma with 16-bit fixed point weights, rounded
#[inline]
#[must_use]
pub fn luma(pixel: &Rgba<u8>) -> u8 {
    let [r, g, b, _] = pixel.0;
    let weighted = u32::from(r) * 19595 + u32::from(g) * 38470 + u32::from(b) * 7471 + 0x8000;
    (weighted >> 16) as u8
}

#[inline]
fn interpolate(degenerate: u8, value: u8, factor: f32) -> u8 {
    let degenerate = f32::from(degenerate);
    let blended = degenerate + factor * (f32::from(value) - degenerate);
    (blended as i32).clamp(0, 255) as u8
}

/// Multiply every color channel by `factor`
pub fn adjust_brightness(image: &mut RgbaImage, factor: f32) {
    for pixel in image.pixels_mut() {
        for channel in 0..3 {
            pixel[channel] = interpolate(0, pixel[channel], factor);
        }
    }
}

/// Spread channel values away from (or toward) the image's mean luma
pub fn adjust_contrast(image: &mut RgbaImage, factor: f32) {
    let pixel_count = u64::from(image.width()) * u64::from(image.height());
    if pixel_count == 0 {
        return;
    }
    let total: u64 = image.pixels().map(|p| u64::from(luma(p))).sum();
    let mean = (total as f64 / pixel_count as f64 + 0.5) as u8;

    for pixel in image.pixels_mut() {
        for channel in 0..3 {
            pixel[channel] = interpolate(mean, pixel[channel], factor);
        }
    }
}

/// Blend each pixel with its own gray value
pub fn adjust_saturation(image: &mut RgbaImage, factor: f32) {
    for pixel in image.pixels_mut() {
        let gray = luma(pixel);
        for channel in 0..3 {
            pixel[channel] = interpolate(gray, pixel[channel], factor);
        }
    }
}

/// Sharpen by adding back the difference from a Gaussian-blurred copy
///
/// Channels whose difference from the blur is below `threshold` are left as
/// they are so flat regions and compression noise are not amplified.
pub fn unsharp_mask(image: &mut RgbaImage, settings: &UnsharpMaskConfig) {
    if settings.radius <= 0.0 || settings.percent == 0 {
        return;
    }

    let blurred = imageops::blur(&*image, settings.radius);
    let amount = settings.percent as f32 / 100.0;
    let threshold = i32::from(settings.threshold);

    for (pixel, soft) in image.pixels_mut().zip(blurred.pixels()) {
        for channel in 0..3 {
            let original = i32::from(pixel[channel]);
            let diff = original - i32::from(soft[channel]);
            if diff.abs() < threshold {
                continue;
            }
            let sharpened = original as f32 + diff as f32 * amount;
            pixel[channel] = sharpened.round().clamp(0.0, 255.0) as u8;
        }
    }
}

/// Run the full enhancement sequence: brightness, contrast, saturation, then sharpening
///
/// Sharpening runs last so the lighting changes are not re-amplified by the
/// sharpen kernel.
pub fn apply(image: &mut RgbaImage, config: &EnhancementConfig) {
    adjust_brightness(image, config.brightness);
    adjust_contrast(image, config.contrast);
    adjust_saturation(image, config.saturation);
    unsharp_mask(image, &config.sharpen);
}

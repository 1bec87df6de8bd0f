//! Image compositor
//!
//! Scales a cutout to fit the canvas, optionally enhances it, centers it on a
//! transparent canvas and flattens the result onto a solid background color.
//! The compositor is a pure function of its inputs and holds no state.

use crate::config::{BackgroundColor, CanvasSpec};
use crate::enhance;
use crate::error::Result;
use crate::types::{CompositeResult, Cutout, Placement, ResampleFilter};
use image::{imageops, Rgb, RgbImage, Rgba, RgbaImage};
use tracing::{instrument, span, Level};

/// Rounded division by 255 using shifts (`(a + 128 + ((a + 128) >> 8)) >> 8`)
#[inline]
fn div255(value: u32) -> u8 {
    let tmp = value + 128;
    (((tmp >> 8) + tmp) >> 8) as u8
}

/// Blend `src` over `dst` with an 8-bit mask value
#[inline]
pub(crate) fn blend_channel(src: u8, dst: u8, mask: u8) -> u8 {
    let mask = u32::from(mask);
    div255(u32::from(src) * mask + u32::from(dst) * (255 - mask))
}

/// Compute the uniform scale factor and the truncated target size
///
/// `ratio = min(canvas_w / w, canvas_h / h)`; each resized dimension is the
/// product truncated toward zero, clamped to at least one pixel.
///
/// # Examples
/// ```rust
/// use bgremove_server::compositor::scale_to_fit;
///
/// let (ratio, w, h) = scale_to_fit(500, 1000, 2000, 2000);
/// assert_eq!((ratio, w, h), (2.0, 1000, 2000));
/// ```
#[must_use]
pub fn scale_to_fit(width: u32, height: u32, canvas_width: u32, canvas_height: u32) -> (f64, u32, u32) {
    let ratio = (f64::from(canvas_width) / f64::from(width))
        .min(f64::from(canvas_height) / f64::from(height));

    let new_width = ((f64::from(width) * ratio) as u32).clamp(1, canvas_width.max(1));
    let new_height = ((f64::from(height) * ratio) as u32).clamp(1, canvas_height.max(1));

    (ratio, new_width, new_height)
}

/// Top-left offset that centers a `width x height` subject (floor division)
#[must_use]
pub fn placement_offset(canvas_width: u32, canvas_height: u32, width: u32, height: u32) -> (u32, u32) {
    (
        canvas_width.saturating_sub(width) / 2,
        canvas_height.saturating_sub(height) / 2,
    )
}

/// Paste `src` onto `dst` at `(x, y)` using `src`'s alpha as the mask
///
/// Every channel, alpha included, becomes `src * m + dst * (255 - m)` scaled
/// back by 255. Pixels falling outside `dst` are skipped.
pub fn paste_with_mask(dst: &mut RgbaImage, src: &RgbaImage, x: u32, y: u32) {
    let (dst_width, dst_height) = dst.dimensions();

    for (sx, sy, pixel) in src.enumerate_pixels() {
        let (Some(dx), Some(dy)) = (x.checked_add(sx), y.checked_add(sy)) else {
            continue;
        };
        if dx >= dst_width || dy >= dst_height {
            continue;
        }

        let mask = pixel[3];
        match mask {
            0 => {},
            255 => dst.put_pixel(dx, dy, *pixel),
            _ => {
                let under = dst.get_pixel(dx, dy);
                let blended = Rgba([
                    blend_channel(pixel[0], under[0], mask),
                    blend_channel(pixel[1], under[1], mask),
                    blend_channel(pixel[2], under[2], mask),
                    blend_channel(pixel[3], under[3], mask),
                ]);
                dst.put_pixel(dx, dy, blended);
            },
        }
    }
}

/// Flatten an RGBA canvas onto a solid color, using its alpha as the mask
///
/// Partially transparent pixels blend proportionally with the background.
#[must_use]
pub fn flatten_onto_background(canvas: &RgbaImage, background: BackgroundColor) -> RgbImage {
    let bg = background.to_rgb();
    let (width, height) = canvas.dimensions();

    RgbImage::from_fn(width, height, |x, y| {
        let pixel = canvas.get_pixel(x, y);
        match pixel[3] {
            0 => bg,
            255 => Rgb([pixel[0], pixel[1], pixel[2]]),
            mask => Rgb([
                blend_channel(pixel[0], bg[0], mask),
                blend_channel(pixel[1], bg[1], mask),
                blend_channel(pixel[2], bg[2], mask),
            ]),
        }
    })
}

/// Compose a cutout onto the configured canvas
///
/// 1. scale to fit (truncating), choosing bicubic for enlargement and
///    Lanczos otherwise
/// 2. optionally enhance (brightness, contrast, saturation, unsharp mask)
/// 3. paste centered onto a transparent canvas using the cutout's alpha
/// 4. flatten onto `spec.background`
///
/// The output is always exactly `spec.width x spec.height`.
///
/// # Errors
/// - `spec` fails validation (zero-sized canvas, invalid enhancement factors)
#[instrument(skip(cutout, spec), fields(
    cutout_width = cutout.dimensions().0,
    cutout_height = cutout.dimensions().1,
    canvas_width = spec.width,
    canvas_height = spec.height,
))]
pub fn composite(cutout: &Cutout, spec: &CanvasSpec, enhance: bool) -> Result<CompositeResult> {
    spec.validate()?;

    let (width, height) = cutout.dimensions();
    let (ratio, new_width, new_height) = scale_to_fit(width, height, spec.width, spec.height);
    let filter = ResampleFilter::for_ratio(ratio);

    let mut resized = {
        let _resize_span = span!(Level::DEBUG, "resize", new_width, new_height, ?filter).entered();
        if (new_width, new_height) == (width, height) {
            cutout.as_image().clone()
        } else {
            imageops::resize(cutout.as_image(), new_width, new_height, filter.filter_type())
        }
    };

    if enhance {
        let _enhance_span = span!(Level::DEBUG, "enhance").entered();
        enhance::apply(&mut resized, &spec.enhancement);
    }

    let (offset_x, offset_y) = placement_offset(spec.width, spec.height, new_width, new_height);

    let image = {
        let _compose_span = span!(Level::DEBUG, "center_compose", offset_x, offset_y).entered();
        let mut canvas = RgbaImage::new(spec.width, spec.height);
        paste_with_mask(&mut canvas, &resized, offset_x, offset_y);
        flatten_onto_background(&canvas, spec.background)
    };

    log::debug!(
        "Composited {}x{} cutout as {}x{} at ({}, {}) using {:?} (ratio {:.4})",
        width,
        height,
        new_width,
        new_height,
        offset_x,
        offset_y,
        filter,
        ratio
    );

    Ok(CompositeResult {
        image,
        placement: Placement {
            ratio,
            width: new_width,
            height: new_height,
            offset_x,
            offset_y,
            filter,
        },
    })
}

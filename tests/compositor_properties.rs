//! Geometric and color properties of the compositor

mod common;

use bgremove_server::compositor::{placement_offset, scale_to_fit};
use bgremove_server::types::ResampleFilter;
use bgremove_server::{composite, CanvasSpec, Cutout, EnhancementConfig, UnsharpMaskConfig};
use common::BACKGROUND;
use image::{Rgb, Rgba, RgbaImage};

fn opaque_cutout(width: u32, height: u32, color: [u8; 3]) -> Cutout {
    Cutout::new(RgbaImage::from_pixel(
        width,
        height,
        Rgba([color[0], color[1], color[2], 255]),
    ))
    .unwrap()
}

fn small_canvas(size: u32) -> CanvasSpec {
    CanvasSpec {
        width: size,
        height: size,
        ..CanvasSpec::default()
    }
}

#[test]
fn output_is_always_canvas_sized() {
    let spec = CanvasSpec::default();
    for (width, height) in [(100, 400), (400, 100), (2000, 2000), (3000, 1000), (1, 1)] {
        let result = composite(&opaque_cutout(width, height, [10, 20, 30]), &spec, false).unwrap();
        assert_eq!(
            result.image.dimensions(),
            (2000, 2000),
            "input {}x{}",
            width,
            height
        );
    }
}

#[test]
fn aspect_ratio_is_preserved_within_truncation() {
    let spec = small_canvas(500);
    for (width, height) in [(333, 777), (640, 480), (1920, 1080), (37, 911)] {
        let result = composite(&opaque_cutout(width, height, [0, 0, 0]), &spec, false).unwrap();
        let placement = result.placement;

        let exact_width = f64::from(width) * placement.ratio;
        let exact_height = f64::from(height) * placement.ratio;
        assert!(
            exact_width - f64::from(placement.width) < 1.0
                && exact_height - f64::from(placement.height) < 1.0,
            "{}x{} scaled to {}x{}",
            width,
            height,
            placement.width,
            placement.height
        );
        // the limiting axis fills the canvas up to truncation
        assert!(placement.width >= 499 || placement.height >= 499);
    }
}

#[test]
fn subject_is_centered_with_floor_offsets() {
    let spec = small_canvas(501);
    for (width, height) in [(100, 400), (400, 100), (333, 777), (501, 501)] {
        let result = composite(&opaque_cutout(width, height, [0, 0, 0]), &spec, false).unwrap();
        let p = result.placement;
        assert_eq!(
            (p.offset_x, p.offset_y),
            ((501 - p.width) / 2, (501 - p.height) / 2)
        );
        assert_eq!(
            (p.offset_x, p.offset_y),
            placement_offset(501, 501, p.width, p.height)
        );
    }
}

#[test]
fn opaque_subject_is_reproduced_at_interior_pixels() {
    let spec = small_canvas(400);
    let color = [200, 30, 90];
    let result = composite(&opaque_cutout(100, 300, color), &spec, false).unwrap();
    let p = result.placement;

    for y in (p.offset_y + 3)..(p.offset_y + p.height - 3) {
        for x in (p.offset_x + 3)..(p.offset_x + p.width - 3) {
            assert_eq!(*result.image.get_pixel(x, y), Rgb(color), "pixel ({}, {})", x, y);
        }
    }
}

#[test]
fn everything_outside_subject_box_is_background() {
    let spec = small_canvas(400);
    let result = composite(&opaque_cutout(300, 100, [0, 0, 0]), &spec, false).unwrap();
    let p = result.placement;

    for (x, y, pixel) in result.image.enumerate_pixels() {
        let inside = (p.offset_x..p.offset_x + p.width).contains(&x)
            && (p.offset_y..p.offset_y + p.height).contains(&y);
        if !inside {
            assert_eq!(*pixel, Rgb(BACKGROUND), "pixel ({}, {})", x, y);
        }
    }
}

#[test]
fn filter_depends_on_scale_direction() {
    let spec = small_canvas(400);

    let enlarged = composite(&opaque_cutout(100, 50, [0, 0, 0]), &spec, false).unwrap();
    assert!(enlarged.placement.ratio > 1.0);
    assert_eq!(enlarged.placement.filter, ResampleFilter::Bicubic);

    let shrunk = composite(&opaque_cutout(800, 400, [0, 0, 0]), &spec, false).unwrap();
    assert!(shrunk.placement.ratio < 1.0);
    assert_eq!(shrunk.placement.filter, ResampleFilter::Lanczos);

    let same = composite(&opaque_cutout(400, 200, [0, 0, 0]), &spec, false).unwrap();
    assert!((same.placement.ratio - 1.0).abs() < f64::EPSILON);
    assert_eq!(same.placement.filter, ResampleFilter::Lanczos);
}

#[test]
fn portrait_cutout_gets_side_margins() {
    let result = composite(
        &opaque_cutout(500, 1000, [20, 40, 60]),
        &CanvasSpec::default(),
        false,
    )
    .unwrap();
    let p = result.placement;

    assert_eq!((p.width, p.height), (1000, 2000));
    assert_eq!((p.offset_x, p.offset_y), (500, 0));
    assert_eq!(scale_to_fit(500, 1000, 2000, 2000), (2.0, 1000, 2000));

    for y in (0..2000).step_by(97) {
        for x in (0..500).chain(1500..2000) {
            assert_eq!(*result.image.get_pixel(x, y), Rgb(BACKGROUND), "margin ({}, {})", x, y);
        }
        assert_eq!(*result.image.get_pixel(1000, y), Rgb([20, 40, 60]));
    }
}

#[test]
fn brightness_enhancement_lightens_mid_gray() {
    let spec = small_canvas(200).with_enhancement(EnhancementConfig {
        brightness: 1.1,
        contrast: 1.0,
        saturation: 1.0,
        sharpen: UnsharpMaskConfig::default(),
    });
    let cutout = opaque_cutout(200, 200, [128, 128, 128]);

    let plain = composite(&cutout, &spec, false).unwrap();
    let enhanced = composite(&cutout, &spec, true).unwrap();

    assert_eq!(*plain.image.get_pixel(100, 100), Rgb([128, 128, 128]));
    let lightened = enhanced.image.get_pixel(100, 100);
    for channel in lightened.0 {
        assert!((140..=142).contains(&channel), "channel {}", channel);
    }
}

#[test]
fn partial_alpha_blends_with_background() {
    let spec = small_canvas(100);
    let cutout = Cutout::new(RgbaImage::from_pixel(100, 100, Rgba([0, 0, 0, 128]))).unwrap();

    let result = composite(&cutout, &spec, false).unwrap();
    let pixel = result.image.get_pixel(50, 50);

    // the mask is applied twice (paste, then flatten), so alpha 128 ends up
    // as 64 and the result is 247 * 191 / 255, about 185
    for channel in pixel.0 {
        assert!((183..=187).contains(&channel), "channel {}", channel);
    }
}

#[test]
fn background_color_is_configurable() {
    let mut spec = small_canvas(100);
    spec.background = "#102030".parse().unwrap();
    let cutout = Cutout::new(RgbaImage::from_pixel(10, 10, Rgba([0, 0, 0, 0]))).unwrap();

    let result = composite(&cutout, &spec, false).unwrap();
    assert!(result.image.pixels().all(|p| *p == Rgb([0x10, 0x20, 0x30])));
}

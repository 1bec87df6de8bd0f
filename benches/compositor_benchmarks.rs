use bgremove_server::{
    composite, BackgroundRemovalProcessor, BackgroundRemover, CanvasSpec, Cutout, ProcessorConfig,
    Result,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::Arc;

/// Keeps a centered ellipse, roughly what a portrait mask looks like
struct EllipseRemover;

impl BackgroundRemover for EllipseRemover {
    fn remove_background(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let (width, height) = image.dimensions();
        let (cx, cy) = (f64::from(width) / 2.0, f64::from(height) / 2.0);
        let mut cutout = image.clone();
        for (x, y, pixel) in cutout.enumerate_pixels_mut() {
            let dx = (f64::from(x) - cx) / cx;
            let dy = (f64::from(y) - cy) / cy;
            if dx * dx + dy * dy > 0.8 {
                pixel[3] = 0;
            }
        }
        Ok(cutout)
    }
}

fn gradient(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        Rgba([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8, 255])
    })
}

fn bench_composite(c: &mut Criterion) {
    let spec = CanvasSpec::default();
    let mut group = c.benchmark_group("composite");
    group.sample_size(10);

    // enlarge (bicubic), shrink (lanczos) and no-op resize
    for (width, height) in [(500, 1000), (4000, 3000), (2000, 2000)] {
        let cutout = Cutout::new(gradient(width, height)).unwrap();
        let id = format!("{}x{}", width, height);

        group.bench_with_input(BenchmarkId::new("plain", &id), &cutout, |b, cutout| {
            b.iter(|| composite(black_box(cutout), &spec, false).unwrap());
        });
        group.bench_with_input(BenchmarkId::new("enhanced", &id), &cutout, |b, cutout| {
            b.iter(|| composite(black_box(cutout), &spec, true).unwrap());
        });
    }

    group.finish();
}

fn bench_pipeline(c: &mut Criterion) {
    let processor =
        BackgroundRemovalProcessor::new(ProcessorConfig::default(), Arc::new(EllipseRemover))
            .unwrap();

    let mut input = Vec::new();
    gradient(1200, 1600)
        .write_to(&mut Cursor::new(&mut input), ImageFormat::Png)
        .unwrap();

    let mut group = c.benchmark_group("pipeline");
    group.sample_size(10);
    group.bench_function("decode_segment_composite_encode", |b| {
        b.iter(|| processor.process_bytes(black_box(&input), Some(false)).unwrap());
    });
    group.finish();
}

criterion_group!(benches, bench_composite, bench_pipeline);
criterion_main!(benches);

use closet_bgremove::{
    backends::threshold::otsu_threshold, BackendType, BackgroundRemovalProcessor,
    InferenceBackend, RemovalConfig, ThresholdBackend,
};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use image::{DynamicImage, Rgb, RgbImage};
use ndarray::Array4;

fn garment_photo(size: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_fn(size, size * 3 / 4, |x, y| {
        let inside = x > size / 4 && x < size * 3 / 4 && y > size / 8 && y < size * 5 / 8;
        if inside {
            Rgb([230, 225, 215])
        } else {
            Rgb([((x + y) % 40) as u8, 30, 35])
        }
    }))
}

fn bench_otsu(c: &mut Criterion) {
    let mut histogram = [0u64; 256];
    for (level, count) in histogram.iter_mut().enumerate() {
        *count = ((level * 7919) % 1000) as u64;
    }

    c.bench_function("otsu_threshold", |b| {
        b.iter(|| otsu_threshold(black_box(&histogram)));
    });
}

fn bench_threshold_infer(c: &mut Criterion) {
    let mut group = c.benchmark_group("threshold_infer");
    let config = RemovalConfig::default();

    for canvas in [320usize, 1024] {
        let mut backend = ThresholdBackend::with_canvas_size(false, canvas as u32);
        backend.initialize(&config).unwrap();
        let input = Array4::from_shape_fn((1, 3, canvas, canvas), |(_, c, y, x)| {
            ((x + y + c) % 17) as f32 / 17.0
        });

        group.bench_with_input(BenchmarkId::from_parameter(canvas), &input, |b, input| {
            b.iter(|| backend.infer(black_box(input)).unwrap());
        });
    }

    group.finish();
}

fn bench_process_image(c: &mut Criterion) {
    let mut group = c.benchmark_group("process_image");
    group.sample_size(20);

    let config = RemovalConfig::builder()
        .backend_type(BackendType::Threshold { inverted: false })
        .build()
        .unwrap();

    for size in [256u32, 1024, 2048] {
        let image = garment_photo(size);
        let mut processor = BackgroundRemovalProcessor::new(config.clone()).unwrap();

        group.bench_with_input(BenchmarkId::from_parameter(size), &image, |b, image| {
            b.iter(|| processor.process_image(black_box(image)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_otsu,
    bench_threshold_infer,
    bench_process_image
);
criterion_main!(benches);

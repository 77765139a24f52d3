use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use octslice::core::{PixelBuffer, Samples};
use octslice::processing::{process, CropRect, TransformParams};

fn slice_u16(width: u32, height: u32) -> PixelBuffer {
    let samples = (0..width * height).map(|v| (v % 4096) as u16).collect();
    PixelBuffer::gray(width, height, Samples::U16(samples)).expect("valid slice")
}

fn slice_f32(width: u32, height: u32) -> PixelBuffer {
    let samples = (0..width * height).map(|v| (v as f32).sin()).collect();
    PixelBuffer::gray(width, height, Samples::F32(samples)).expect("valid slice")
}

fn bench_normalize(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    for &(width, height) in &[(512u32, 496u32), (1024, 885)] {
        let u16_slice = slice_u16(width, height);
        let f32_slice = slice_f32(width, height);
        let label = format!("{}x{}", width, height);

        group.bench_with_input(BenchmarkId::new("u16", &label), &u16_slice, |b, slice| {
            b.iter(|| black_box(slice).normalize())
        });
        group.bench_with_input(BenchmarkId::new("f32", &label), &f32_slice, |b, slice| {
            b.iter(|| black_box(slice).normalize())
        });
    }
    group.finish();
}

fn bench_transform(c: &mut Criterion) {
    let image = slice_u16(1024, 885).normalize().expect("normalizes");
    let mut group = c.benchmark_group("transform");

    for rotation in [0, 90, 180, 270] {
        let params = TransformParams::new()
            .with_rotation(rotation)
            .with_crop(CropRect::new(100, 100, 512, 512));
        group.bench_with_input(BenchmarkId::new("rotate_crop", rotation), &params, |b, params| {
            b.iter(|| process(black_box(&image), params))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_normalize, bench_transform);
criterion_main!(benches);

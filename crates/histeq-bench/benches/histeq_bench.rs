//! Benchmarks for the equalization pipeline.
//!
//! Run with: `cargo bench` (add `--features wgpu` for GPU runs)

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use histeq_compute::{CpuDevice, EqualizeConfig, Equalizer, Histogram, Normalization, ScanStrategy};
use histeq_bench::noise_image;

const SIZES: [(u32, u32); 3] = [(256, 256), (1024, 768), (3840, 2160)];

/// Full pipeline on the CPU backend.
fn bench_equalize_cpu(c: &mut Criterion) {
    let mut group = c.benchmark_group("equalize_cpu");
    group.sample_size(20);
    let eq = Equalizer::new(CpuDevice::new());

    for (w, h) in SIZES {
        let image = noise_image(w, h, 3).unwrap();
        group.throughput(Throughput::Bytes(image.size_bytes() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{w}x{h}")), &image, |b, img| {
            b.iter(|| eq.equalize(black_box(img)))
        });
    }

    group.finish();
}

/// Histogram stage alone against the host reference.
fn bench_histogram(c: &mut Criterion) {
    let mut group = c.benchmark_group("histogram");
    let eq = Equalizer::new(CpuDevice::new());
    let image = noise_image(1024, 768, 3).unwrap();
    group.throughput(Throughput::Bytes(image.size_bytes() as u64));

    group.bench_function("device_atomic", |b| b.iter(|| eq.build_histogram(black_box(&image))));
    group.bench_function("host_sequential", |b| b.iter(|| Histogram::of_image(black_box(&image))));

    group.finish();
}

/// Direct vs Blelloch prefix sum.
fn bench_scan(c: &mut Criterion) {
    let mut group = c.benchmark_group("cumulate");
    let image = noise_image(512, 512, 4).unwrap();
    let hist = Equalizer::new(CpuDevice::new())
        .build_histogram(&image)
        .unwrap();

    for scan in [ScanStrategy::Direct, ScanStrategy::Blelloch] {
        let config = EqualizeConfig { scan, ..Default::default() };
        let eq = Equalizer::with_config(CpuDevice::new(), config);
        group.bench_function(scan.name(), |b| b.iter(|| eq.cumulate(black_box(&hist))));
    }

    group.finish();
}

/// Remap with both normalizations.
fn bench_remap(c: &mut Criterion) {
    let mut group = c.benchmark_group("remap");
    let image = noise_image(1024, 768, 3).unwrap();
    let base = Equalizer::new(CpuDevice::new());
    let cdf = base.cumulate(&base.build_histogram(&image).unwrap()).unwrap();

    for normalization in [Normalization::MinNonZero, Normalization::Linear] {
        let config = EqualizeConfig { normalization, ..Default::default() };
        let eq = Equalizer::with_config(CpuDevice::new(), config);
        group.bench_function(normalization.name(), |b| b.iter(|| eq.remap(black_box(&image), &cdf)));
    }

    group.finish();
}

#[cfg(feature = "wgpu")]
fn bench_equalize_wgpu(c: &mut Criterion) {
    use histeq_compute::WgpuDevice;

    let Ok(device) = WgpuDevice::new() else {
        eprintln!("no wgpu adapter, skipping GPU benchmarks");
        return;
    };
    let eq = Equalizer::new(device);
    let mut group = c.benchmark_group("equalize_wgpu");
    group.sample_size(20);

    for (w, h) in SIZES {
        let image = noise_image(w, h, 3).unwrap();
        group.throughput(Throughput::Bytes(image.size_bytes() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(format!("{w}x{h}")), &image, |b, img| {
            b.iter(|| eq.equalize(black_box(img)))
        });
    }

    group.finish();
}

#[cfg(not(feature = "wgpu"))]
fn bench_equalize_wgpu(_c: &mut Criterion) {}

criterion_group!(
    benches,
    bench_equalize_cpu,
    bench_histogram,
    bench_scan,
    bench_remap,
    bench_equalize_wgpu,
);

criterion_main!(benches);

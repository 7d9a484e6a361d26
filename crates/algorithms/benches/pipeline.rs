//! Benchmarks for the index and classification stages

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use vegcover_algorithms::classification::{classify, KmeansParams};
use vegcover_algorithms::imagery::compute_index;
use vegcover_core::{GeoTransform, Raster};

fn create_band(size: usize, base: f64) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    r.set_transform(GeoTransform::new(0.0, size as f64, 10.0, -10.0));
    for row in 0..size {
        for col in 0..size {
            let v = base + ((row * 7 + col * 13) % 200) as f64;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn bench_index(c: &mut Criterion) {
    let mut group = c.benchmark_group("imagery/index");
    for size in [256, 512, 1024, 2048] {
        let red = create_band(size, 100.0);
        let nir = create_band(size, 300.0);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| compute_index(black_box(&red), black_box(&nir)).unwrap())
        });
    }
    group.finish();
}

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("classification/kmeans");
    group.sample_size(20);
    let params = KmeansParams::default();
    for size in [256, 512, 1024] {
        let index = compute_index(&create_band(size, 100.0), &create_band(size, 300.0)).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| classify(black_box(&index), black_box(&params)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, bench_index, bench_classify);
criterion_main!(benches);

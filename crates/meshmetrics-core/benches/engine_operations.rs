//! Benchmarks for engine operations and backend resolution.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meshmetrics_core::types::{DMatrix, DVector};
use meshmetrics_core::{BackendPreference, BackendResolver, CpuEngine, Engine, ResolverConfig};

fn bench_reductions(c: &mut Criterion) {
    let mut group = c.benchmark_group("reductions");
    let sequential = CpuEngine::with_thresholds(usize::MAX, usize::MAX);
    let parallel = CpuEngine::with_thresholds(1, 1);

    for size in [1_000, 10_000, 100_000, 1_000_000] {
        let a = DVector::<f64>::from_fn(size, |i, _| (i as f64 * 0.001).sin());
        let b = DVector::<f64>::from_fn(size, |i, _| (i as f64 * 0.002).cos());
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(BenchmarkId::new("dot_sequential", size), &size, |bench, _| {
            let ops = sequential.f64_ops();
            bench.iter(|| ops.dot(black_box(&a), black_box(&b)))
        });
        group.bench_with_input(BenchmarkId::new("dot_parallel", size), &size, |bench, _| {
            let ops = parallel.f64_ops();
            bench.iter(|| ops.dot(black_box(&a), black_box(&b)))
        });
        group.bench_with_input(BenchmarkId::new("sum_default", size), &size, |bench, _| {
            let engine = CpuEngine::new();
            let ops = engine.f64_ops();
            bench.iter(|| ops.sum(black_box(&a)))
        });
    }

    group.finish();
}

fn bench_element_wise(c: &mut Criterion) {
    let mut group = c.benchmark_group("element_wise");
    let engine = CpuEngine::new();
    let ops = engine.f32_ops();

    for size in [1_000, 100_000] {
        let a = DVector::<f32>::from_element(size, 1.5);
        let b = DVector::<f32>::from_element(size, 2.5);
        let mut out = DVector::<f32>::zeros(size);
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(BenchmarkId::new("mul", size), |bench| {
            bench.iter(|| ops.element_wise_mul(black_box(&a), black_box(&b), &mut out))
        });
    }

    group.finish();
}

fn bench_batch(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch");
    let engine = CpuEngine::new();
    let ops = engine.f64_ops();

    for batch in [2, 16, 128] {
        let pairs: Vec<_> = (0..batch)
            .map(|k| (DVector::<f64>::from_element(256, k as f64), DVector::<f64>::from_element(256, 0.5)))
            .collect();
        group.bench_with_input(BenchmarkId::new("batch_dot", batch), &batch, |bench, _| {
            bench.iter(|| ops.batch_dot(black_box(&pairs)))
        });
    }

    group.finish();
}

fn bench_gemm(c: &mut Criterion) {
    let mut group = c.benchmark_group("gemm");
    let engine = CpuEngine::new();
    let ops = engine.f64_ops();

    for n in [16, 64, 256] {
        let a = DMatrix::<f64>::from_fn(n, n, |i, j| (i + j) as f64 / n as f64);
        let b = DMatrix::<f64>::identity(n, n);
        let mut out = DMatrix::<f64>::zeros(n, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, _| {
            bench.iter(|| ops.gemm(1.0, black_box(&a), black_box(&b), 0.0, &mut out))
        });
    }

    group.finish();
}

fn bench_resolution(c: &mut Criterion) {
    let auto = BackendResolver::default();
    let cpu = BackendResolver::new(
        ResolverConfig::builder()
            .preference(BackendPreference::Cpu)
            .build(),
    );

    c.bench_function("resolve_auto", |bench| bench.iter(|| auto.resolve()));
    c.bench_function("resolve_cpu", |bench| bench.iter(|| cpu.resolve()));
}

criterion_group!(
    benches,
    bench_reductions,
    bench_element_wise,
    bench_batch,
    bench_gemm,
    bench_resolution
);
criterion_main!(benches);

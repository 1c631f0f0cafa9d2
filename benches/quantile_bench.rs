use criterion::{Criterion, black_box, criterion_group, criterion_main};
use permset::quantile::{Interpolation, hist_quantile, quantile};

fn scores(n: usize) -> Vec<f64> {
    (0..n).map(|i| ((i * 7919) % n) as f64 / n as f64 - 0.5).collect()
}

fn bench_exact_quantile_10k(c: &mut Criterion) {
    let values = scores(10_000);
    c.bench_function("quantile_exact_10k", |b| {
        b.iter(|| quantile(black_box(&values), 0.95, None, Interpolation::Fraction))
    });
}

fn bench_hist_quantile_1k_bins(c: &mut Criterion) {
    let counts: Vec<u64> = (0..1000u64).map(|i| (i * 31) % 97).collect();
    let edges: Vec<f64> = (0..=1000).map(|i| -1.0 + 0.002 * i as f64).collect();
    c.bench_function("hist_quantile_1k_bins", |b| {
        b.iter(|| hist_quantile(black_box(&counts), black_box(&edges), 0.95, None, None))
    });
}

criterion_group!(benches, bench_exact_quantile_10k, bench_hist_quantile_1k_bins);
criterion_main!(benches);

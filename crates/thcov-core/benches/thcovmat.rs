use criterion::{black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion};
use thcov_core::{build, promote, thcovmat, ScaleGrid, ShiftSampler};

#[track_caller]
fn unwrap_ok<T, E: core::fmt::Debug>(context: &str, result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(error) => panic!("{context}: {error:?}"),
    }
}

fn bench_pairwise_contraction(c: &mut Criterion) {
    // RUST_LOG / THCOV_TRACE_CHROME apply to bench runs too
    if let Err(error) = thcov_config::init_tracing() {
        eprintln!("tracing disabled: {error}");
    }
    let mut group = c.benchmark_group("thcovmat");

    for processes in [2usize, 4, 7] {
        let sizes: Vec<usize> = (0..processes).map(|k| 50 + 25 * k).collect();
        let raw = ShiftSampler::seeded(ScaleGrid::default(), 7).sample(&sizes);
        let promoted = unwrap_ok("promotion failed", promote(&raw));

        group.bench_with_input(
            BenchmarkId::new("contract", processes),
            &promoted,
            |b, promoted| {
                b.iter(|| black_box(unwrap_ok("contraction failed", thcovmat(promoted))));
            },
        );

        group.bench_function(BenchmarkId::new("end_to_end", processes), |b| {
            b.iter_batched(
                || raw.clone(),
                |raw| black_box(unwrap_ok("pipeline failed", build(&raw))),
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(benches, bench_pairwise_contraction);
criterion_main!(benches);

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use cps_concurrency::deferred::many;
use cps_concurrency::prelude::*;

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("inline sources");
    for max in [10usize, 100, 1000] {
        group.bench_with_input(BenchmarkId::new("all", max), &max, |b, &max| {
            b.iter(|| all_test(black_box(max)))
        });
        group.bench_with_input(BenchmarkId::new("any", max), &max, |b, &max| {
            b.iter(|| any_test(black_box(max)))
        });
        group.bench_with_input(BenchmarkId::new("many", max), &max, |b, &max| {
            b.iter(|| many_test(black_box(max)))
        });
    }
    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);

fn sources(max: usize) -> Vec<Await<usize>> {
    (0..max).map(Await::ready).collect()
}

fn all_test(max: usize) {
    let results = sources(max).all().wait_success(None).unwrap();
    assert_eq!(results.len(), max);
}

fn any_test(max: usize) {
    let first = sources(max).any().wait_success(None).unwrap();
    assert_eq!(first, 0);
}

/// Every source reports without a decision, so the default path is taken.
fn many_test(max: usize) {
    let res = many(|_: Result<usize>, _| Ok(None), max, sources(max))
        .wait_success(None)
        .unwrap();
    assert_eq!(res, max);
}

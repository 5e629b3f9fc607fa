//! Alignment benchmark: Needleman-Wunsch cost of label sequences of evaluation size.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use presence_sim::data::RandomLogGenerator;
use presence_sim::evaluation::NeedlemanWunsch;

fn labels(seed: u64, n: usize) -> Vec<usize> {
    RandomLogGenerator::new(Some(seed))
        .uniform_log(30, n)
        .iter()
        .map(|e| e.device)
        .collect()
}

fn bench_align(c: &mut Criterion) {
    let nw = NeedlemanWunsch::default();
    let mut group = c.benchmark_group("needleman_wunsch");
    for n in [100usize, 600, 3000] {
        let a = labels(1, n);
        let b = labels(2, n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |bench, _| {
            bench.iter(|| black_box(nw.align(black_box(&a), black_box(&b))))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_align);
criterion_main!(benches);

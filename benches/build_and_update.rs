//! `of`/`update`/`map` benchmarks, modeled on `diamond-types`'s
//! `benches/core.rs`: one `criterion` group per operation, `BenchmarkId` to
//! vary the input size/shape, `black_box` around anything the optimizer
//! could otherwise see through.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use decoration_set::{Change, Decoration, DecorationSet, Filter, RangeDescriptor, WidgetHandle};

#[derive(Debug, Clone, PartialEq, Eq)]
struct NoWidget;
impl WidgetHandle for NoWidget {
    fn eq_spec(&self, _other: &Self) -> bool {
        true
    }
}

fn ranges(n: u32) -> Vec<Decoration<NoWidget>> {
    (0..n).map(|i| Decoration::range(i, i + 1 + (i % 4), RangeDescriptor::default()).unwrap()).collect()
}

fn build_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("of");
    for size in [100u32, 1_000, 10_000] {
        group.throughput(Throughput::Elements(size as u64));
        group.bench_function(BenchmarkId::new("build", size), |b| {
            b.iter(|| {
                let set = DecorationSet::of(ranges(size));
                black_box(set.size);
            })
        });
    }
    group.finish();
}

fn update_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("update");
    for size in [1_000u32, 10_000] {
        let base = DecorationSet::of(ranges(size));
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(BenchmarkId::new("localized_addition", size), |b| {
            let mid = base.length / 2;
            b.iter(|| {
                let updated = base.update(vec![Decoration::range(mid, mid + 1, RangeDescriptor::default()).unwrap()], None, 0, 0);
                black_box(updated.size);
            })
        });

        group.bench_function(BenchmarkId::new("scattered_addition", size), |b| {
            let extra = ranges(size / 10);
            b.iter(|| {
                let updated = base.update(extra.clone(), None, 0, 0);
                black_box(updated.size);
            })
        });

        group.bench_function(BenchmarkId::new("filter_half", size), |b| {
            let filter: &Filter<NoWidget> = &|from, _, _| from % 2 == 0;
            b.iter(|| {
                let updated = base.update(Vec::new(), Some(filter), 0, base.length);
                black_box(updated.size);
            })
        });
    }
    group.finish();
}

fn map_benchmarks(c: &mut Criterion) {
    let mut group = c.benchmark_group("map");
    for size in [1_000u32, 10_000] {
        let base = DecorationSet::of(ranges(size));
        group.throughput(Throughput::Elements(size as u64));

        group.bench_function(BenchmarkId::new("single_localized_insert", size), |b| {
            let mid = base.length / 2;
            let changes = [Change::new(mid, mid, 5)];
            b.iter(|| {
                let mapped = base.map(&changes);
                black_box(mapped.size);
            })
        });

        group.bench_function(BenchmarkId::new("scattered_edits", size), |b| {
            let changes: Vec<Change> = (0..size / 20).map(|i| Change::new(i * 20, i * 20 + 1, 3)).collect();
            b.iter(|| {
                let mapped = base.map(&changes);
                black_box(mapped.size);
            })
        });
    }
    group.finish();
}

criterion_group!(benches, build_benchmarks, update_benchmarks, map_benchmarks);
criterion_main!(benches);

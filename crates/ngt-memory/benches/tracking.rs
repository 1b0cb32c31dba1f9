// Allocation tracking benchmarks for the NGT memory crate
//
// Run with: cargo bench --bench tracking

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ngt_memory::{root, scope, TrackedAlloc};

// The bench binary allocates through the hook, same as a real host.
#[global_allocator]
static ALLOC: TrackedAlloc = TrackedAlloc;

fn benchmark_hooked_alloc(c: &mut Criterion) {
    let mut group = c.benchmark_group("hooked_alloc");
    group.throughput(Throughput::Elements(1));

    group.bench_function("unscoped", |b| {
        b.iter(|| black_box(vec![0u8; 256]));
    });

    let ctx = root().new_child("bench_scoped");
    group.bench_function("scoped", |b| {
        let _scope = scope::enter(&ctx);
        b.iter(|| black_box(vec![0u8; 256]));
    });

    group.finish();
}

fn benchmark_direct_alloc(c: &mut Criterion) {
    let ctx = root().new_child("bench_direct");

    let mut group = c.benchmark_group("direct_alloc");
    group.throughput(Throughput::Elements(1));

    for size in [64usize, 4096].iter() {
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
            b.iter(|| {
                let ptr = ctx.allocate(size);
                // SAFETY: ptr came from allocate on the line above.
                unsafe { ctx.deallocate(black_box(ptr)) };
            });
        });
    }

    group.finish();
}

fn benchmark_cross_context_release(c: &mut Criterion) {
    let owner = root().new_child("bench_owner");
    let stranger = root().new_child("bench_stranger");

    let mut group = c.benchmark_group("cross_context_release");
    group.throughput(Throughput::Elements(1));

    // Worst case: the record is never local, every free walks the tree.
    group.bench_function("sibling_free", |b| {
        b.iter(|| {
            let ptr = owner.allocate(64);
            // SAFETY: ptr came from allocate on the line above.
            unsafe { stranger.deallocate(black_box(ptr)) };
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_hooked_alloc,
    benchmark_direct_alloc,
    benchmark_cross_context_release
);
criterion_main!(benches);

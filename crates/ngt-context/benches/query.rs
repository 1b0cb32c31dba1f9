// Registry benchmarks for the NGT context crate
//
// Run with: cargo bench --bench query

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use ngt_context::{ComponentContext, DepRef, Registration};
use std::sync::Arc;

trait Service: Send + Sync {
    fn id(&self) -> u32;
}

struct ServiceImpl(u32);

impl Service for ServiceImpl {
    fn id(&self) -> u32 {
        self.0
    }
}

trait Filler: Send + Sync {}
struct FillerImpl;
impl Filler for FillerImpl {}

fn context_with_entries(count: usize) -> Arc<ComponentContext> {
    let ctx = ComponentContext::new_root("bench");
    for _ in 0..count {
        ctx.register(Registration::new(FillerImpl).implements::<dyn Filler>(|v| v))
            .persist();
    }
    ctx.register(Registration::new(ServiceImpl(42)).implements::<dyn Service>(|v| v))
        .persist();
    ctx
}

fn benchmark_register_deregister(c: &mut Criterion) {
    let ctx = ComponentContext::new_root("bench");

    let mut group = c.benchmark_group("registration");
    group.throughput(Throughput::Elements(1));

    group.bench_function("register_deregister", |b| {
        b.iter(|| {
            let handle =
                ctx.register(Registration::new(ServiceImpl(1)).implements::<dyn Service>(|v| v));
            black_box(handle.deregister())
        });
    });

    group.finish();
}

fn benchmark_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("query");
    group.throughput(Throughput::Elements(1));

    // The wanted entry sits behind a growing pile of unrelated ones.
    for count in [0usize, 16, 256].iter() {
        let ctx = context_with_entries(*count);
        group.bench_with_input(BenchmarkId::from_parameter(count), count, |b, _| {
            b.iter(|| black_box(ctx.query::<dyn Service>()).map(|s| s.id()));
        });
    }

    group.finish();
}

fn benchmark_query_through_child(c: &mut Criterion) {
    let root = context_with_entries(16);
    let child = ComponentContext::new_child("bench_child", &root);

    let mut group = c.benchmark_group("query_parent_chain");
    group.throughput(Throughput::Elements(1));

    group.bench_function("child_to_root", |b| {
        b.iter(|| black_box(child.query::<dyn Service>()).map(|s| s.id()));
    });

    group.finish();
}

fn benchmark_dep_ref(c: &mut Criterion) {
    let ctx = context_with_entries(16);
    let dep = DepRef::<dyn Service>::new(&ctx);

    let mut group = c.benchmark_group("dep_ref");
    group.throughput(Throughput::Elements(1));

    group.bench_function("cached_get", |b| {
        b.iter(|| black_box(dep.get()).map(|s| s.id()));
    });

    group.finish();
}

criterion_group!(
    benches,
    benchmark_register_deregister,
    benchmark_query,
    benchmark_query_through_child,
    benchmark_dep_ref
);
criterion_main!(benches);

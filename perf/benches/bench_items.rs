use criterion::{Criterion, black_box, criterion_group, criterion_main};
use perfcore_items::{ItemRecord, ItemRegistry, Template, TemplateIterator, TemplatePool};

fn build_registry(n: u32) -> ItemRegistry {
    let records = (0..n).map(|i| ItemRecord::new(i, "MarketByPrice", format!("ITEM{i}"))).collect();
    ItemRegistry::new(0, records)
}

fn bench_request_queue_round_trip(c: &mut Criterion) {
    let mut registry = build_registry(10_000);
    let mut cursor = 0u32;
    c.bench_function("request_queue_round_trip", |b| {
        b.iter(|| {
            let id = cursor % 10_000;
            cursor += 1;
            let _ = registry.add_to_request_queue(black_box(id));
            black_box(registry.pop_from_request_queue());
        });
    });
}

fn bench_refresh_complete_cycle(c: &mut Criterion) {
    let mut registry = build_registry(10_000);
    for i in 0..10_000 {
        let _ = registry.move_to_awaiting_refresh(i);
    }
    let mut cursor = 0u32;
    c.bench_function("refresh_complete_cycle", |b| {
        b.iter(|| {
            let id = cursor % 10_000;
            cursor += 1;
            let _ = registry.move_to_refresh_complete(black_box(id));
            let _ = registry.move_to_awaiting_refresh(id);
        });
    });
}

fn bench_resolve(c: &mut Criterion) {
    let registry = build_registry(10_000);
    let mut cursor = 0u32;
    c.bench_function("resolve", |b| {
        b.iter(|| {
            let id = cursor % 10_000;
            cursor += 1;
            black_box(registry.resolve(id)).ok();
        });
    });
}

fn bench_template_next_update(c: &mut Criterion) {
    let mut pool = TemplatePool::new();
    pool.add_update("MarketByPrice", Template::new("Update", 128));
    pool.add_update("MarketByPrice", Template::new("Update2", 96));
    let mut iter = TemplateIterator::new();
    c.bench_function("template_next_update", |b| {
        b.iter(|| {
            black_box(pool.next_update("MarketByPrice", &mut iter));
        });
    });
}

criterion_group!(
    benches,
    bench_request_queue_round_trip,
    bench_refresh_complete_cycle,
    bench_resolve,
    bench_template_next_update
);
criterion_main!(benches);

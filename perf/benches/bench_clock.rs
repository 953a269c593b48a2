use criterion::{Criterion, black_box, criterion_group, criterion_main};

fn bench_now_nanos(c: &mut Criterion) {
    c.bench_function("now_nanos", |b| {
        b.iter(|| {
            black_box(perfcore_clock::now_nanos());
        });
    });
}

fn bench_now_micros(c: &mut Criterion) {
    c.bench_function("now_micros", |b| {
        b.iter(|| {
            black_box(perfcore_clock::now_micros());
        });
    });
}

fn bench_nsec_per_tick(c: &mut Criterion) {
    c.bench_function("nsec_per_tick", |b| {
        b.iter(|| {
            black_box(perfcore_clock::nsec_per_tick(black_box(1000)));
        });
    });
}

fn bench_split_rate(c: &mut Criterion) {
    c.bench_function("split_rate", |b| {
        b.iter(|| {
            black_box(perfcore_clock::split_rate(black_box(10_000), black_box(1000)));
        });
    });
}

fn bench_burst_size(c: &mut Criterion) {
    let mut tick = 0u32;
    c.bench_function("burst_size", |b| {
        b.iter(|| {
            tick = (tick + 1) % 1000;
            black_box(perfcore_clock::burst_size(black_box(10_000), black_box(1000), tick));
        });
    });
}

criterion_group!(
    benches,
    bench_now_nanos,
    bench_now_micros,
    bench_nsec_per_tick,
    bench_split_rate,
    bench_burst_size
);
criterion_main!(benches);

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use perfcore_latency::LatencyRandomArray;

fn bench_new_single_window(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    c.bench_function("new_single_window", |b| {
        b.iter(|| {
            let arr = LatencyRandomArray::new(10_000, 1_000, 1_000, 1, &mut rng).unwrap();
            black_box(arr.len());
        });
    });
}

fn bench_new_minute_of_windows(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    c.bench_function("new_60_windows", |b| {
        b.iter(|| {
            let arr = LatencyRandomArray::new(10_000, 1_000, 1_000, 60, &mut rng).unwrap();
            black_box(arr.len());
        });
    });
}

fn bench_next(c: &mut Criterion) {
    let mut rng = rand::thread_rng();
    let mut arr = LatencyRandomArray::new(10_000, 1_000, 1_000, 1, &mut rng).unwrap();
    c.bench_function("next", |b| {
        b.iter(|| {
            black_box(arr.next());
        });
    });
}

criterion_group!(
    benches,
    bench_new_single_window,
    bench_new_minute_of_windows,
    bench_next
);
criterion_main!(benches);

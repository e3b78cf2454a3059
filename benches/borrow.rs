use criterion::{Criterion, criterion_group, criterion_main};
use poolside::{FnFactory, PoolConfig, build_pool};

fn bench_borrow_return(c: &mut Criterion) {
    let bounded = build_pool(
        "bench-bounded",
        PoolConfig::new().with_max_total(8).with_test_on_borrow(false),
        Box::new(FnFactory::new(|| Vec::<u8>::with_capacity(4096))),
    )
    .unwrap();

    c.bench_function("bounded_borrow_return", |b| {
        b.iter(|| {
            let lease = bounded.borrow().unwrap();
            std::hint::black_box(&*lease);
        })
    });

    let cached = build_pool(
        "bench-cached",
        PoolConfig::new()
            .with_provider("cached")
            .with_test_on_borrow(false),
        Box::new(FnFactory::new(|| Vec::<u8>::with_capacity(4096))),
    )
    .unwrap();

    c.bench_function("cached_borrow_return", |b| {
        b.iter(|| {
            let lease = cached.borrow().unwrap();
            std::hint::black_box(&*lease);
        })
    });
}

criterion_group!(benches, bench_borrow_return);
criterion_main!(benches);

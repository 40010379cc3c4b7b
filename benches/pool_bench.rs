// benches/pool_bench.rs
//! Checkout/release hot-path benchmark

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use isopool::{EnginePool, MockFactory, MockRuntime, PoolConfig, RuntimeFactory};
use std::sync::Arc;

fn bench_checkout_release(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .unwrap();

    let factory: Arc<dyn RuntimeFactory<Runtime = MockRuntime>> = MockFactory::new();
    let config = PoolConfig {
        pool_min_size: 2,
        pool_max_size: 8,
        ..Default::default()
    };
    let pool = rt.block_on(async { EnginePool::new(config, factory).unwrap() });

    c.bench_function("checkout_release", |b| {
        b.iter(|| {
            rt.block_on(async {
                let engine = pool.get_engine().await.unwrap();
                black_box(engine.index());
                pool.release_engine(&engine);
            })
        })
    });

    c.bench_function("checkout_release_warm_pair", |b| {
        b.iter(|| {
            rt.block_on(async {
                let first = pool.get_engine().await.unwrap();
                let second = pool.get_engine().await.unwrap();
                pool.release_engine(&first);
                pool.release_engine(&second);
            })
        })
    });

    rt.block_on(pool.close());
}

criterion_group!(benches, bench_checkout_release);
criterion_main!(benches);

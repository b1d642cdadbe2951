//! Benchmarks comparing the four rate limiting strategies.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use ratelimit_engine::{MemoryStorage, Options, RateLimiter, Strategy};
use std::time::Duration;
use tokio::runtime::Runtime;

fn limiter(strategy: Strategy) -> RateLimiter<MemoryStorage> {
    let opts = Options::builder()
        .points(1000)
        .duration(Duration::from_secs(1))
        .strategy(strategy)
        .build()
        .unwrap();
    RateLimiter::new(MemoryStorage::new(), opts)
}

fn bench_strategies(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("strategies");

    for (name, strategy) in [
        ("token_bucket", Strategy::TokenBucket),
        ("leaky_bucket", Strategy::LeakyBucket),
        ("sliding_window", Strategy::SlidingWindow),
        ("fixed_window", Strategy::FixedWindow),
    ] {
        group.bench_function(name, |b| {
            let limiter = limiter(strategy);
            let mut i = 0u64;
            b.iter(|| {
                i += 1;
                let key = format!("{name}:{}", i % 100);
                rt.block_on(async { black_box(limiter.consume_one(&key).await) })
            })
        });
    }

    group.finish();
}

fn bench_strategy_scaling(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("strategy_scaling");

    for num_keys in [1, 10, 100, 1000].iter() {
        for (name, strategy) in [
            ("token_bucket", Strategy::TokenBucket),
            ("fixed_window", Strategy::FixedWindow),
        ] {
            group.bench_with_input(
                BenchmarkId::new(name, num_keys),
                num_keys,
                |b, &num_keys| {
                    let limiter = limiter(strategy);
                    let mut i = 0u64;
                    b.iter(|| {
                        i += 1;
                        let key = format!("k:{}", i % num_keys);
                        rt.block_on(async { black_box(limiter.consume_one(&key).await) })
                    })
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_strategies, bench_strategy_scaling);
criterion_main!(benches);

//! Integration tests for rate limiting strategies and storage primitives.

use std::time::Duration;

use ratelimit_engine::{MemoryStorage, Options, RateLimiter, Storage, Strategy};

fn opts(points: u64, duration_secs: u64, strategy: Strategy) -> Options {
    Options::builder()
        .points(points)
        .duration(Duration::from_secs(duration_secs))
        .strategy(strategy)
        .build()
        .unwrap()
}

#[tokio::test]
async fn test_token_bucket_burst_then_deny() {
    let limiter = RateLimiter::new(MemoryStorage::new(), opts(5, 1, Strategy::TokenBucket));

    for i in 1..=5 {
        let result = limiter.consume_one("test:user").await.unwrap();
        assert!(result.allowed, "Request {i} should be allowed (burst)");
    }

    let result = limiter.consume_one("test:user").await.unwrap();
    assert!(!result.allowed, "6th request should be denied");
    assert!(
        result.retry_after_secs() > 0,
        "Should have a non-zero retry-after"
    );
}

#[tokio::test]
async fn test_separate_keys_independent() {
    let limiter = RateLimiter::new(MemoryStorage::new(), opts(2, 60, Strategy::TokenBucket));

    for _ in 0..2 {
        limiter.consume_one("user:1").await.unwrap();
    }
    let result = limiter.consume_one("user:1").await.unwrap();
    assert!(!result.allowed, "user:1 should be rate limited");

    let result = limiter.consume_one("user:2").await.unwrap();
    assert!(result.allowed, "user:2 should be allowed");
}

#[tokio::test]
async fn test_rate_limit_headers() {
    let limiter = RateLimiter::new(MemoryStorage::new(), opts(100, 60, Strategy::TokenBucket));

    let result = limiter.consume_one("test:headers").await.unwrap();
    let headers = result.to_headers();

    let header_names: Vec<_> = headers.iter().map(|(k, _)| *k).collect();
    assert!(
        header_names.contains(&"X-RateLimit-Limit"),
        "Missing X-RateLimit-Limit"
    );
    assert!(
        header_names.contains(&"X-RateLimit-Remaining"),
        "Missing X-RateLimit-Remaining"
    );
    assert!(
        header_names.contains(&"X-RateLimit-Reset"),
        "Missing X-RateLimit-Reset"
    );
}

#[tokio::test]
async fn test_storage_increment_operation() {
    let storage = MemoryStorage::new();

    let count = storage
        .increment("test:counter", 1, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(count, 1);

    let count = storage
        .increment("test:counter", 5, Duration::from_secs(60))
        .await
        .unwrap();
    assert_eq!(count, 6);
}

#[tokio::test]
async fn test_storage_reset_clears_counter() {
    let storage = MemoryStorage::new();

    storage
        .increment("test:counter", 10, Duration::from_secs(60))
        .await
        .unwrap();
    storage.reset("test:counter").await.unwrap();

    assert_eq!(storage.get_counter("test:counter").await.unwrap(), None);
}

#[tokio::test]
async fn test_all_four_strategies_enforce_their_quota() {
    for strategy in [
        Strategy::TokenBucket,
        Strategy::LeakyBucket,
        Strategy::SlidingWindow,
        Strategy::FixedWindow,
    ] {
        let limiter = RateLimiter::new(MemoryStorage::new(), opts(3, 60, strategy));

        for i in 1..=3 {
            let result = limiter.consume_one("user:1").await.unwrap();
            assert!(
                result.allowed,
                "{strategy:?}: request {i} should be allowed"
            );
        }

        let result = limiter.consume_one("user:1").await.unwrap();
        assert!(
            !result.allowed,
            "{strategy:?}: 4th request should be denied"
        );
    }
}

#[tokio::test]
async fn test_reset_restores_full_quota() {
    let limiter = RateLimiter::new(MemoryStorage::new(), opts(1, 60, Strategy::SlidingWindow));

    limiter.consume_one("user:1").await.unwrap();
    assert!(!limiter.consume_one("user:1").await.unwrap().allowed);

    limiter.reset("user:1").await.unwrap();
    assert!(limiter.consume_one("user:1").await.unwrap().allowed);
}

#[tokio::test]
async fn test_block_overrides_remaining_quota() {
    let limiter = RateLimiter::new(MemoryStorage::new(), opts(10, 60, Strategy::FixedWindow));

    limiter
        .block("user:1", Duration::from_secs(5))
        .await
        .unwrap();
    let result = limiter.consume_one("user:1").await.unwrap();
    assert!(
        !result.allowed,
        "blocked key should be denied despite unused quota"
    );
}

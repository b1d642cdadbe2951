//! The outcome of a `consume`/`get` call.
//!
//! Named `RateLimitResult` rather than `Result` to avoid colliding with
//! `std::result::Result`, which every fallible operation in this crate
//! also returns.

/// Structured outcome of a rate limit check, carrying enough state to
/// project standard rate-limit HTTP headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Milliseconds until the next point becomes available (0 when allowed
    /// and points remain).
    pub ms_before_next: u64,
    /// Points left in the current window after this call.
    pub remaining_points: u64,
    /// Points consumed by this call (0 when denied).
    pub consumed_points: u64,
    /// Whether this call started a fresh window/bucket.
    pub is_first_in_duration: bool,
    /// The configured quota this result was measured against.
    pub total_hits: u64,
    /// Whether the request was admitted.
    pub allowed: bool,
}

impl RateLimitResult {
    /// Seconds until the next point becomes available, rounded up.
    pub fn retry_after_secs(&self) -> u64 {
        self.ms_before_next.div_ceil(1000)
    }

    /// Absolute Unix timestamp (seconds) at which the quota resets, for the
    /// `X-RateLimit-Reset` header. Unlike `retry_after_secs`, which is a
    /// relative delta, this is wall-clock time so a client can compare it
    /// against its own clock rather than timing an interval.
    pub fn reset_unix_secs(&self) -> u64 {
        let now_unix = crate::storage::current_timestamp_ms() / 1000;
        now_unix + self.retry_after_secs()
    }

    /// Project this result onto the standard `X-RateLimit-*` headers,
    /// plus `Retry-After` when the request was denied.
    pub fn to_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            (
                crate::headers::names::RATE_LIMIT_LIMIT,
                self.total_hits.to_string(),
            ),
            (
                crate::headers::names::RATE_LIMIT_REMAINING,
                self.remaining_points.to_string(),
            ),
            (
                crate::headers::names::RATE_LIMIT_RESET,
                self.reset_unix_secs().to_string(),
            ),
        ];

        if !self.allowed {
            headers.push((
                crate::headers::names::RETRY_AFTER,
                self.retry_after_secs().to_string(),
            ));
        }

        headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allowed_result_has_no_retry_after_header() {
        let result = RateLimitResult {
            ms_before_next: 0,
            remaining_points: 4,
            consumed_points: 1,
            is_first_in_duration: false,
            total_hits: 5,
            allowed: true,
        };

        let headers = result.to_headers();
        assert!(
            headers
                .iter()
                .any(|(k, v)| *k == "X-RateLimit-Limit" && v == "5")
        );
        assert!(
            headers
                .iter()
                .any(|(k, v)| *k == "X-RateLimit-Remaining" && v == "4")
        );
        assert!(!headers.iter().any(|(k, _)| *k == "Retry-After"));
    }

    #[test]
    fn denied_result_carries_retry_after() {
        let result = RateLimitResult {
            ms_before_next: 2500,
            remaining_points: 0,
            consumed_points: 0,
            is_first_in_duration: false,
            total_hits: 5,
            allowed: false,
        };

        let headers = result.to_headers();
        assert!(headers.iter().any(|(k, v)| *k == "Retry-After" && v == "3"));
    }
}

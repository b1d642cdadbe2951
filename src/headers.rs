//! HTTP headers for rate limiting.
//!
//! Standard and extended headers for communicating rate limit status.

/// Standard rate limit header names.
pub mod names {
    /// Maximum points allowed per window.
    pub const RATE_LIMIT_LIMIT: &str = "X-RateLimit-Limit";

    /// Remaining points in the current window.
    pub const RATE_LIMIT_REMAINING: &str = "X-RateLimit-Remaining";

    /// Seconds until the rate limit resets.
    pub const RATE_LIMIT_RESET: &str = "X-RateLimit-Reset";

    /// Seconds until the client should retry (standard HTTP header).
    pub const RETRY_AFTER: &str = "Retry-After";
}

/// Builder for rate limit headers.
#[derive(Debug, Default)]
pub struct RateLimitHeaders {
    limit: Option<u64>,
    remaining: Option<u64>,
    reset: Option<u64>,
    retry_after: Option<u64>,
}

impl RateLimitHeaders {
    /// Create a new header builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limit header.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the remaining header.
    pub fn remaining(mut self, remaining: u64) -> Self {
        self.remaining = Some(remaining);
        self
    }

    /// Set the reset header (seconds until reset).
    pub fn reset(mut self, reset_seconds: u64) -> Self {
        self.reset = Some(reset_seconds);
        self
    }

    /// Set the retry-after header (seconds until retry).
    pub fn retry_after(mut self, seconds: u64) -> Self {
        self.retry_after = Some(seconds);
        self
    }

    /// Convert to a vector of (name, value) pairs.
    pub fn to_vec(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();

        if let Some(limit) = self.limit {
            headers.push((names::RATE_LIMIT_LIMIT, limit.to_string()));
        }
        if let Some(remaining) = self.remaining {
            headers.push((names::RATE_LIMIT_REMAINING, remaining.to_string()));
        }
        if let Some(reset) = self.reset {
            headers.push((names::RATE_LIMIT_RESET, reset.to_string()));
        }
        if let Some(retry_after) = self.retry_after {
            headers.push((names::RETRY_AFTER, retry_after.to_string()));
        }

        headers
    }
}

impl From<&crate::result::RateLimitResult> for RateLimitHeaders {
    fn from(result: &crate::result::RateLimitResult) -> Self {
        let mut headers = Self::new()
            .limit(result.total_hits)
            .remaining(result.remaining_points)
            .reset(result.reset_unix_secs());

        if !result.allowed {
            headers = headers.retry_after(result.retry_after_secs());
        }

        headers
    }
}

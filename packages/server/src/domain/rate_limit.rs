//! Rate limiter interface.

use async_trait::async_trait;

/// Per-identifier request limiter.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Count one request for `identifier` and report whether it is allowed.
    /// A denied request is not counted.
    async fn allow(&self, identifier: &str, max_requests: u32, window_ms: i64) -> bool;

    /// Drop windows whose reset time has passed. Returns how many were dropped.
    async fn sweep(&self) -> usize;
}

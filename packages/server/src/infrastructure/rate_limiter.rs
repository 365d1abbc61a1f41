//! Fixed-window rate limiter.
//!
//! Each request lands in the window `floor(now / window_ms)` of its
//! identifier. Windows are never rolled forward; stale ones stay in memory
//! until [`RateLimiter::sweep`] drops them. The allow/deny decision does not
//! depend on when the sweep runs.
//!
//! State is per process. A multi-node deployment needs a shared counter.

use std::{collections::HashMap, net::IpAddr, sync::Arc, time::Duration};

use async_trait::async_trait;
use onair_shared::time::Clock;
use sha2::{Digest, Sha256};
use tokio::{sync::Mutex, task::JoinHandle};

use crate::domain::RateLimiter;

/// Limit applied to one endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    /// Namespaces the identifier so endpoints do not share counters.
    pub scope: &'static str,
    pub max_requests: u32,
    pub window_ms: i64,
}

pub const CHAT_POLICY: RateLimitPolicy = RateLimitPolicy {
    scope: "chat",
    max_requests: 10,
    window_ms: 60_000,
};

/// Persisting a chat message over HTTP. Counted apart from [`CHAT_POLICY`]
/// because a client persists every message it pushes live.
pub const CHAT_PERSIST_POLICY: RateLimitPolicy = RateLimitPolicy {
    scope: "chat-persist",
    max_requests: 10,
    window_ms: 60_000,
};

pub const TOKEN_VALIDATION_POLICY: RateLimitPolicy = RateLimitPolicy {
    scope: "validate-token",
    max_requests: 30,
    window_ms: 60_000,
};

pub const ACCESS_LINK_POLICY: RateLimitPolicy = RateLimitPolicy {
    scope: "access-links",
    max_requests: 10,
    window_ms: 60_000,
};

pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    reset_at: i64,
}

pub struct FixedWindowRateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    clock: Arc<dyn Clock>,
}

impl FixedWindowRateLimiter {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Number of windows currently held.
    pub async fn window_count(&self) -> usize {
        self.windows.lock().await.len()
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn allow(&self, identifier: &str, max_requests: u32, window_ms: i64) -> bool {
        if max_requests == 0 {
            return false;
        }
        let window_ms = window_ms.max(1);
        let now = self.clock.now_millis();
        let window_index = now.div_euclid(window_ms);
        let key = format!("{identifier}:{window_index}");

        let mut windows = self.windows.lock().await;
        let window = windows.entry(key).or_insert(Window {
            count: 0,
            reset_at: (window_index + 1) * window_ms,
        });
        if window.count >= max_requests {
            return false;
        }
        window.count += 1;
        true
    }

    async fn sweep(&self) -> usize {
        let now = self.clock.now_millis();
        let mut windows = self.windows.lock().await;
        let before = windows.len();
        windows.retain(|_, window| now <= window.reset_at);
        before - windows.len()
    }
}

/// One-way identifier for a caller address, namespaced by `scope`.
pub fn hash_identifier(scope: &str, addr: IpAddr) -> String {
    let mut hasher = Sha256::new();
    hasher.update(addr.to_string().as_bytes());
    format!("{}:{:x}", scope, hasher.finalize())
}

/// Periodically drop expired windows until the handle is aborted.
pub fn spawn_sweeper(limiter: Arc<dyn RateLimiter>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let dropped = limiter.sweep().await;
            if dropped > 0 {
                tracing::debug!("Rate limiter sweep dropped {} windows", dropped);
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use std::net::Ipv4Addr;

    use onair_shared::time::FixedClock;

    use super::*;

    fn limiter_at(now: i64) -> (FixedWindowRateLimiter, Arc<FixedClock>) {
        let clock = Arc::new(FixedClock::new(now));
        (FixedWindowRateLimiter::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_n_plus_one_request_is_denied() {
        // テスト項目: 同一ウィンドウ内の N+1 回目は拒否される
        // given (前提条件):
        let (limiter, _clock) = limiter_at(10_000);

        // when (操作):
        let mut results = Vec::new();
        for _ in 0..4 {
            results.push(limiter.allow("ip-a", 3, 1_000).await);
        }

        // then (期待する結果):
        assert_eq!(results, vec![true, true, true, false]);
    }

    #[tokio::test]
    async fn test_next_window_is_allowed_again() {
        // テスト項目: ウィンドウ境界を越えた直後のリクエストは許可される
        // given (前提条件):
        let (limiter, clock) = limiter_at(10_999);
        assert!(limiter.allow("ip-a", 1, 1_000).await);
        assert!(!limiter.allow("ip-a", 1, 1_000).await);

        // when (操作):
        clock.set(11_000);

        // then (期待する結果):
        assert!(limiter.allow("ip-a", 1, 1_000).await);
    }

    #[tokio::test]
    async fn test_identifiers_are_counted_separately() {
        let (limiter, _clock) = limiter_at(0);

        assert!(limiter.allow("ip-a", 1, 1_000).await);
        assert!(limiter.allow("ip-b", 1, 1_000).await);
        assert!(!limiter.allow("ip-a", 1, 1_000).await);
    }

    #[tokio::test]
    async fn test_denied_requests_are_not_counted() {
        let (limiter, _clock) = limiter_at(0);
        assert!(limiter.allow("ip-a", 1, 1_000).await);
        for _ in 0..5 {
            assert!(!limiter.allow("ip-a", 1, 1_000).await);
        }
        let windows = limiter.windows.lock().await;
        assert_eq!(windows.values().next().map(|w| w.count), Some(1));
    }

    #[tokio::test]
    async fn test_zero_max_requests_denies() {
        let (limiter, _clock) = limiter_at(0);
        assert!(!limiter.allow("ip-a", 0, 1_000).await);
    }

    #[tokio::test]
    async fn test_sweep_drops_only_expired_windows() {
        // テスト項目: リセット時刻を過ぎたウィンドウのみ削除される
        // given (前提条件):
        let (limiter, clock) = limiter_at(500);
        limiter.allow("old", 5, 1_000).await;
        clock.set(1_500);
        limiter.allow("new", 5, 1_000).await;

        // when (操作):
        clock.set(1_001);
        let dropped_early = limiter.sweep().await;
        clock.set(2_001);
        let dropped_late = limiter.sweep().await;

        // then (期待する結果):
        assert_eq!(dropped_early, 1);
        assert_eq!(dropped_late, 1);
        assert_eq!(limiter.window_count().await, 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_requests_never_exceed_limit() {
        let (limiter, _clock) = limiter_at(0);
        let limiter = Arc::new(limiter);
        let mut handles = Vec::new();
        for _ in 0..50 {
            let limiter = limiter.clone();
            handles.push(tokio::spawn(
                async move { limiter.allow("ip-a", 10, 60_000).await },
            ));
        }

        let mut allowed = 0;
        for handle in handles {
            if handle.await.unwrap() {
                allowed += 1;
            }
        }

        assert_eq!(allowed, 10);
    }

    #[test]
    fn test_hash_identifier_is_one_way_and_scoped() {
        let addr = IpAddr::V4(Ipv4Addr::new(203, 0, 113, 7));

        let chat = hash_identifier("chat", addr);
        let other = hash_identifier("validate-token", addr);

        assert!(chat.starts_with("chat:"));
        assert!(!chat.contains("203.0.113.7"));
        assert_eq!(chat.len(), "chat:".len() + 64);
        assert_ne!(chat, other);
        assert_eq!(chat, hash_identifier("chat", addr));
    }
}

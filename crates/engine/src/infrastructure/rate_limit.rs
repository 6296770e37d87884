//! Fixed-window request limiter keyed by client.
//!
//! Counters live in memory only. Windows that have run out are dropped by
//! `cleanup_expired()` or replaced on the next request from the same client.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use axum::http::HeaderMap;
use tokio::sync::RwLock;

/// Uploads allowed per client per window.
pub const UPLOAD_RATE_LIMIT: u32 = 10;
pub const UPLOAD_RATE_WINDOW: Duration = Duration::from_secs(60);

pub struct RateLimiter {
    windows: RwLock<HashMap<String, Window>>,
    limit: u32,
    window: Duration,
}

struct Window {
    count: u32,
    started_at: Instant,
}

impl RateLimiter {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            limit,
            window,
        }
    }

    pub fn for_uploads() -> Self {
        Self::new(UPLOAD_RATE_LIMIT, UPLOAD_RATE_WINDOW)
    }

    /// Count one request for `client`. Returns false once the window is full;
    /// rejected requests do not extend or refill the window.
    pub async fn check(&self, client: &str) -> bool {
        self.check_at(client, Instant::now()).await
    }

    async fn check_at(&self, client: &str, now: Instant) -> bool {
        let mut guard = self.windows.write().await;
        match guard.get_mut(client) {
            Some(window) if now.duration_since(window.started_at) <= self.window => {
                if window.count >= self.limit {
                    return false;
                }
                window.count += 1;
                true
            }
            _ => {
                guard.insert(
                    client.to_string(),
                    Window {
                        count: 1,
                        started_at: now,
                    },
                );
                true
            }
        }
    }

    /// Drop finished windows and return how many were removed.
    pub async fn cleanup_expired(&self) -> usize {
        let mut guard = self.windows.write().await;
        let before_count = guard.len();
        guard.retain(|_, window| window.started_at.elapsed() <= self.window);
        before_count - guard.len()
    }

    pub async fn len(&self) -> usize {
        self.windows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.windows.read().await.is_empty()
    }
}

/// First `X-Forwarded-For` address, else `X-Real-IP`, else `unknown`.
pub fn client_identifier(headers: &HeaderMap) -> String {
    if let Some(forwarded) = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
    {
        return forwarded.split(',').next().unwrap_or_default().to_string();
    }
    headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string()
}

//! Application state and rate limiting.

use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

use a2p_provider::TrustHub;
use a2p_storage::RegistrationStore;
use a2p_workflow::{ActivityLog, Registrar, WebhookIngestor};

use super::RATE_LIMIT_WINDOW_SECS;

/// Per-IP request tracker: (request count, window start time).
type IpTracker = HashMap<IpAddr, (u64, Instant)>;

/// In-memory per-IP rate limiter.
///
/// Entries whose window has expired are dropped on every check, so the
/// tracker only holds addresses seen within the last window.
pub(crate) struct RateLimiter {
    tracker: Mutex<IpTracker>,
    window: Duration,
    /// Maximum requests per window. Zero disables limiting.
    pub(crate) max_requests: u64,
}

impl RateLimiter {
    pub(crate) fn new(max_requests: u64) -> Self {
        Self::with_window(max_requests, Duration::from_secs(RATE_LIMIT_WINDOW_SECS))
    }

    pub(crate) fn with_window(max_requests: u64, window: Duration) -> Self {
        Self {
            tracker: Mutex::new(HashMap::new()),
            window,
            max_requests,
        }
    }

    /// Returns `Err(retry_after_secs)` once `ip` has used up its window.
    pub(crate) async fn check(&self, ip: IpAddr) -> Result<(), u64> {
        if self.max_requests == 0 {
            return Ok(());
        }
        let mut tracker = self.tracker.lock().await;
        let now = Instant::now();
        let window = self.window;
        tracker.retain(|_, (_, start)| now.duration_since(*start) < window);

        let entry = tracker.entry(ip).or_insert((0, now));
        entry.0 += 1;
        if entry.0 > self.max_requests {
            let remaining = window.saturating_sub(now.duration_since(entry.1));
            Err(remaining.as_secs().max(1))
        } else {
            Ok(())
        }
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.tracker.lock().await.len()
    }
}

/// Shared by every request handler.
pub(crate) struct AppState {
    pub(crate) store: Arc<dyn RegistrationStore>,
    pub(crate) registrar: Registrar,
    pub(crate) ingestor: WebhookIngestor,
    pub(crate) activity: Arc<ActivityLog>,
    pub(crate) rate_limiter: RateLimiter,
    /// `None` = no auth required.
    pub(crate) api_key: Option<String>,
}

impl AppState {
    pub(crate) fn new(
        store: Arc<dyn RegistrationStore>,
        hub: Arc<dyn TrustHub>,
        base_url: &str,
        activity: Arc<ActivityLog>,
        rate_limit: u64,
        api_key: Option<String>,
    ) -> Self {
        Self {
            registrar: Registrar::new(store.clone(), hub, base_url, activity.clone()),
            ingestor: WebhookIngestor::new(store.clone(), activity.clone()),
            store,
            activity,
            rate_limiter: RateLimiter::new(rate_limit),
            api_key,
        }
    }
}

use std::{path::Path, sync::Arc, time::Duration};

use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    config::Config,
    domain::MediaKind,
    ports::Requester,
    progress::TransferProgress,
    Result,
};

#[derive(Clone, Copy, Debug)]
pub struct ThrottleConfig {
    /// Minimum spacing between calls to one requester (Telegram ~1 msg/sec per chat).
    pub min_interval: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            min_interval: Duration::from_millis(1050),
        }
    }
}

impl ThrottleConfig {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            min_interval: cfg.notify_min_interval,
        }
    }
}

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    fn reserve(&mut self) -> Duration {
        self.reserve_at(Instant::now())
    }

    /// Reserve the next slot and return how long to wait before using it.
    fn reserve_at(&mut self, now: Instant) -> Duration {
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// Requester decorator that spaces out outbound calls.
///
/// Best-effort protection against flood limits while a batch sends status lines and
/// progress edits; a 429 can still happen and is handled by the adapter.
pub struct ThrottledRequester {
    inner: Arc<dyn Requester>,
    limiter: Mutex<IntervalLimiter>,
}

impl ThrottledRequester {
    pub fn new(inner: Arc<dyn Requester>, cfg: ThrottleConfig) -> Self {
        Self {
            inner,
            limiter: Mutex::new(IntervalLimiter::new(cfg.min_interval)),
        }
    }

    async fn throttle(&self) {
        let wait = { self.limiter.lock().await.reserve() };
        if !wait.is_zero() {
            sleep(wait).await;
        }
    }
}

#[async_trait::async_trait]
impl Requester for ThrottledRequester {
    async fn notify(&self, text: &str) -> Result<()> {
        self.throttle().await;
        self.inner.notify(text).await
    }

    async fn notify_progress(&self, label: &str, progress: TransferProgress) -> Result<()> {
        self.throttle().await;
        self.inner.notify_progress(label, progress).await
    }

    async fn end_progress(&self) -> Result<()> {
        self.throttle().await;
        self.inner.end_progress().await
    }

    async fn deliver(&self, path: &Path, kind: MediaKind, caption: Option<&str>) -> Result<()> {
        self.throttle().await;
        self.inner.deliver(path, kind, caption).await
    }
}

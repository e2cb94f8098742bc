use std::time::{Duration, Instant};

use tokio::sync::watch;

use crate::{
    ports::Requester,
    utils::{human_bytes, human_duration},
};

pub const DOWNLOAD_LABEL: &str = "📥 Downloading";

/// Snapshot reported by the source while content is transferred.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransferProgress {
    pub done: u64,
    pub total: u64,
    pub elapsed: Duration,
}

impl TransferProgress {
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done >= self.total
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done as f64 / self.total as f64 * 100.0).min(100.0)
    }

    /// Bytes per second over the whole transfer so far.
    pub fn speed(&self) -> u64 {
        let secs = self.elapsed.as_secs_f64();
        if secs <= 0.0 {
            return 0;
        }
        (self.done as f64 / secs) as u64
    }

    pub fn eta(&self) -> Option<Duration> {
        let speed = self.speed();
        if speed == 0 || self.done >= self.total {
            return None;
        }
        Some(Duration::from_secs((self.total - self.done) / speed))
    }
}

/// Decides which progress snapshots reach the requester.
///
/// The first snapshot and the completing one always pass; the rest at most once
/// per `interval`.
#[derive(Debug)]
pub struct ProgressThrottle {
    interval: Duration,
    last: Option<Instant>,
}

impl ProgressThrottle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: None,
        }
    }

    pub fn should_emit_at(&mut self, progress: &TransferProgress, now: Instant) -> bool {
        let due = match self.last {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due || progress.is_complete() {
            self.last = Some(now);
            return true;
        }
        false
    }
}

/// Plain-text progress card.
pub fn render(label: &str, p: &TransferProgress) -> String {
    const WIDTH: usize = 10;
    let filled = ((p.percent() / 100.0) * WIDTH as f64).round() as usize;
    let bar = format!(
        "{}{}",
        "■".repeat(filled.min(WIDTH)),
        "□".repeat(WIDTH - filled.min(WIDTH))
    );
    let eta = p
        .eta()
        .map(human_duration)
        .unwrap_or_else(|| "-".to_string());
    format!(
        "{label}\n[{bar}] {:.1}%\n{} / {}\nSpeed: {}/s | ETA: {eta} | Elapsed: {}",
        p.percent(),
        human_bytes(p.done),
        human_bytes(p.total),
        human_bytes(p.speed()),
        human_duration(p.elapsed),
    )
}

/// Forward snapshots from `rx` to the requester until the sending side is dropped.
///
/// Only the latest snapshot matters, so a slow requester skips intermediate values.
pub(crate) async fn forward(
    mut rx: watch::Receiver<Option<TransferProgress>>,
    requester: &dyn Requester,
    label: &str,
    interval: Duration,
) {
    let mut throttle = ProgressThrottle::new(interval);
    while rx.changed().await.is_ok() {
        let latest = *rx.borrow_and_update();
        let Some(progress) = latest else {
            continue;
        };
        if !throttle.should_emit_at(&progress, Instant::now()) {
            continue;
        }
        if let Err(e) = requester.notify_progress(label, progress).await {
            tracing::debug!(error = %e, "progress update dropped");
        }
    }
}

/// Tell the requester the current transfer is over without a delivery.
pub(crate) async fn end(requester: &dyn Requester) {
    if let Err(e) = requester.end_progress().await {
        tracing::debug!(error = %e, "progress card not cleared");
    }
}

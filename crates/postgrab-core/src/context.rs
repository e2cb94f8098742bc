use std::{future::Future, sync::Arc, time::Duration};

use tokio_util::sync::CancellationToken;

use crate::{errors::Error, ports::Requester, Result};

/// Per-operation context: where replies go and the unit's cancellation signal.
#[derive(Clone)]
pub struct OpContext {
    pub requester: Arc<dyn Requester>,
    pub cancel: CancellationToken,
}

impl OpContext {
    pub fn new(requester: Arc<dyn Requester>, cancel: CancellationToken) -> Self {
        Self { requester, cancel }
    }

    /// Context with its own token, not tracked by any registry.
    pub fn detached(requester: Arc<dyn Requester>) -> Self {
        Self::new(requester, CancellationToken::new())
    }

    pub fn ensure_active(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        Ok(())
    }

    /// Run `fut` unless the unit is cancelled first; on cancellation `fut` is dropped.
    pub async fn guard<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Error::Cancelled),
            res = fut => res,
        }
    }

    /// Cancellable pacing delay.
    pub async fn pause(&self, delay: Duration) -> Result<()> {
        if delay.is_zero() {
            return self.ensure_active();
        }
        self.guard(async {
            tokio::time::sleep(delay).await;
            Ok(())
        })
        .await
    }

    /// Best-effort status message; failures are logged, never raised.
    pub async fn notify(&self, text: &str) {
        if let Err(e) = self.requester.notify(text).await {
            tracing::warn!(error = %e, "failed to notify requester");
        }
    }
}

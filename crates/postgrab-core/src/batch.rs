use std::time::Duration;

use crate::{
    context::OpContext,
    domain::PostReference,
    download::{Downloader, ItemStatus, SeenGroups},
    errors::Error,
    Result,
};

/// Per-item counts of a multi-item operation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct BatchSummary {
    pub attempted: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl BatchSummary {
    /// Final status line, e.g. `✅ Completed! Downloaded 3 items from News`.
    pub fn render(&self, scope: &str) -> String {
        let mut line = format!("✅ Completed! Downloaded {} items{scope}", self.delivered);
        match (self.skipped, self.failed) {
            (0, 0) => {}
            (s, 0) => line.push_str(&format!(" ({s} skipped)")),
            (0, f) => line.push_str(&format!(" ({f} failed)")),
            (s, f) => line.push_str(&format!(" ({s} skipped, {f} failed)")),
        }
        line
    }
}

/// Drives a sequence of posts through one `Downloader`.
///
/// Items never overlap. The pacing delay sits between consecutive items, and a failing
/// item is reported and counted without stopping the batch. Cancellation is the only
/// error `item` returns.
pub(crate) struct Batch<'a> {
    downloader: &'a Downloader,
    ctx: &'a OpContext,
    pacing: Duration,
    seen: SeenGroups,
    summary: BatchSummary,
}

impl<'a> Batch<'a> {
    pub(crate) fn new(downloader: &'a Downloader, ctx: &'a OpContext, pacing: Duration) -> Self {
        Self {
            downloader,
            ctx,
            pacing,
            seen: SeenGroups::default(),
            summary: BatchSummary::default(),
        }
    }

    pub(crate) fn seen(&self) -> &SeenGroups {
        &self.seen
    }

    pub(crate) fn summary(&self) -> BatchSummary {
        self.summary
    }

    pub(crate) async fn item(&mut self, reference: PostReference) -> Result<Option<ItemStatus>> {
        if self.summary.attempted > 0 {
            self.ctx.pause(self.pacing).await?;
        }
        self.ctx.ensure_active()?;
        self.summary.attempted += 1;

        match self
            .downloader
            .download(&reference, self.ctx, &mut self.seen)
            .await
        {
            Ok(status) => {
                if status.is_delivered() {
                    self.summary.delivered += 1;
                } else {
                    self.summary.skipped += 1;
                }
                Ok(Some(status))
            }
            Err(Error::Cancelled) => Err(Error::Cancelled),
            Err(e) => {
                self.summary.failed += 1;
                tracing::warn!(link = %reference, error = %e, "item failed");
                self.ctx
                    .notify(&format!("❌ Error at {reference}: {e}"))
                    .await;
                Ok(None)
            }
        }
    }

    pub(crate) fn finish(self) -> BatchSummary {
        self.summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn summary_mentions_only_non_zero_extras() {
        let mut s = BatchSummary {
            attempted: 3,
            delivered: 3,
            ..BatchSummary::default()
        };
        assert_eq!(s.render(""), "✅ Completed! Downloaded 3 items");

        s.failed = 1;
        assert_eq!(
            s.render(" from News"),
            "✅ Completed! Downloaded 3 items from News (1 failed)"
        );

        s.skipped = 2;
        assert!(s.render("").ends_with("(2 skipped, 1 failed)"));
    }
}

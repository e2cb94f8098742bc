use std::{sync::Arc, time::Duration};

use crate::{
    batch::{Batch, BatchSummary},
    context::OpContext,
    domain::{ContainerRef, ItemId, PostReference},
    download::Downloader,
    errors::Error,
    Result,
};

/// Check `start..=end` and return its length.
pub fn validate_range(start: ItemId, end: ItemId, max_len: Option<u32>) -> Result<u64> {
    if start.0 < 1 {
        return Err(Error::MalformedReference(format!(
            "item ids start at 1, got {start}"
        )));
    }
    if start > end {
        return Err(Error::InvalidRange {
            start: start.0,
            end: end.0,
        });
    }
    let len = (i64::from(end.0) - i64::from(start.0) + 1) as u64;
    if let Some(max) = max_len {
        if len > u64::from(max) {
            return Err(Error::RangeTooLong { len, max });
        }
    }
    Ok(len)
}

/// Downloads every id of a closed range, in ascending order.
#[derive(Clone)]
pub struct RangeIterator {
    downloader: Arc<Downloader>,
    pacing: Duration,
    max_len: Option<u32>,
}

impl RangeIterator {
    pub fn new(downloader: Arc<Downloader>, pacing: Duration, max_len: Option<u32>) -> Self {
        Self {
            downloader,
            pacing,
            max_len,
        }
    }

    pub fn validate(&self, start: ItemId, end: ItemId) -> Result<u64> {
        validate_range(start, end, self.max_len)
    }

    pub async fn run(
        &self,
        ctx: &OpContext,
        container: &ContainerRef,
        start: ItemId,
        end: ItemId,
    ) -> Result<BatchSummary> {
        let len = self.validate(start, end)?;
        tracing::info!(container = %container, %start, %end, len, "range download started");
        ctx.notify(&format!("📥 Downloading posts from {start} to {end}..."))
            .await;

        let mut batch = Batch::new(&self.downloader, ctx, self.pacing);
        for id in start.0..=end.0 {
            batch
                .item(PostReference::new(container.clone(), ItemId(id)))
                .await?;
        }

        let summary = batch.finish();
        tracing::info!(
            container = %container,
            delivered = summary.delivered,
            skipped = summary.skipped,
            failed = summary.failed,
            "range download finished"
        );
        ctx.notify(&summary.render("")).await;
        Ok(summary)
    }
}

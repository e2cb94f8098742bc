use std::{sync::Arc, time::Duration};

use crate::{
    batch::{Batch, BatchSummary},
    context::OpContext,
    domain::{ContainerRef, PostReference},
    download::Downloader,
    history::HistoryCursor,
    Result,
};

/// A running count goes out every this many delivered items.
const REPORT_EVERY: usize = 25;

/// Downloads a whole container's history, newest first.
#[derive(Clone)]
pub struct BulkIterator {
    downloader: Arc<Downloader>,
    page_size: usize,
    max_scan: Option<usize>,
    pacing: Duration,
}

impl BulkIterator {
    pub fn new(
        downloader: Arc<Downloader>,
        page_size: usize,
        max_scan: Option<usize>,
        pacing: Duration,
    ) -> Self {
        Self {
            downloader,
            page_size,
            max_scan,
            pacing,
        }
    }

    pub async fn run(&self, ctx: &OpContext, container: &ContainerRef) -> Result<BatchSummary> {
        let source = self.downloader.source().as_ref();
        let info = ctx.guard(source.resolve_container(container)).await?;
        let target = info.container_ref();
        tracing::info!(container = %target, title = %info.title, "bulk download started");
        ctx.notify(&format!("📥 Starting bulk download from {}...", info.title))
            .await;

        let mut cursor =
            HistoryCursor::new(source, target.clone(), self.page_size).with_limit(self.max_scan);
        let mut batch = Batch::new(&self.downloader, ctx, self.pacing);
        let mut reported = 0;

        while let Some(msg) = cursor.next(ctx).await? {
            if msg.is_empty() {
                continue;
            }
            if msg.group_id.as_ref().is_some_and(|g| batch.seen().contains(g)) {
                continue;
            }
            batch.item(PostReference::new(target.clone(), msg.id)).await?;

            let delivered = batch.summary().delivered;
            if delivered > reported && delivered % REPORT_EVERY == 0 {
                reported = delivered;
                ctx.notify(&format!(
                    "📦 {delivered} items downloaded so far from {}...",
                    info.title
                ))
                .await;
            }
        }

        let summary = batch.finish();
        tracing::info!(
            container = %target,
            scanned = cursor.yielded(),
            delivered = summary.delivered,
            failed = summary.failed,
            "bulk download finished"
        );
        ctx.notify(&summary.render(&format!(" from {}", info.title)))
            .await;
        Ok(summary)
    }
}

use std::{collections::BTreeSet, fmt::Write as _, sync::Arc, time::Duration};

use crate::{
    batch::{Batch, BatchSummary},
    context::OpContext,
    domain::{ContainerRef, ItemId, PostReference, RemoteMessage},
    download::Downloader,
    history::HistoryCursor,
    Result,
};

/// How many ids the scan report lists before summarizing the rest.
const LISTED_IDS: usize = 20;

/// Whether `msg` is the topic's opening message or a reply in it.
pub fn belongs_to_topic(msg: &RemoteMessage, topic: ItemId) -> bool {
    msg.id == topic || msg.reply_to_id == Some(topic) || msg.reply_to_resolved == Some(topic)
}

/// Distinct ids of a topic, ascending, with per-kind counts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ScanResult {
    ids: Vec<ItemId>,
    media_count: usize,
    text_count: usize,
}

impl ScanResult {
    pub fn ids(&self) -> &[ItemId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn media_count(&self) -> usize {
        self.media_count
    }

    pub fn text_count(&self) -> usize {
        self.text_count
    }

    pub fn report(&self) -> String {
        if self.is_empty() {
            return "❌ No messages found in this topic.".to_string();
        }
        let mut out = format!(
            "📊 Topic Scan Results\n\nTotal Messages: {}\nMedia Messages: {}\nText Messages: {}\n\nMessage IDs: ",
            self.len(),
            self.media_count,
            self.text_count
        );
        let listed: Vec<String> = self
            .ids
            .iter()
            .take(LISTED_IDS)
            .map(ToString::to_string)
            .collect();
        out.push_str(&listed.join(", "));
        if self.len() > LISTED_IDS {
            let _ = write!(out, " ... (+{} more)", self.len() - LISTED_IDS);
        }
        out
    }
}

#[derive(Default)]
struct ScanCollector {
    ids: BTreeSet<ItemId>,
    media_count: usize,
    text_count: usize,
}

impl ScanCollector {
    /// Count `msg` once, however many times the history yields it.
    fn offer(&mut self, msg: &RemoteMessage, topic: ItemId) {
        if !belongs_to_topic(msg, topic) || !self.ids.insert(msg.id) {
            return;
        }
        if msg.has_media() {
            self.media_count += 1;
        } else if msg.has_text() {
            self.text_count += 1;
        }
    }

    fn finish(self) -> ScanResult {
        ScanResult {
            ids: self.ids.into_iter().collect(),
            media_count: self.media_count,
            text_count: self.text_count,
        }
    }
}

/// Finds and downloads the messages of one forum topic.
#[derive(Clone)]
pub struct TopicScanner {
    downloader: Arc<Downloader>,
    page_size: usize,
    max_scan: Option<usize>,
    pacing: Duration,
}

impl TopicScanner {
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

    pub async fn scan(
        &self,
        ctx: &OpContext,
        container: &ContainerRef,
        topic: ItemId,
    ) -> Result<ScanResult> {
        let mut cursor = HistoryCursor::new(
            self.downloader.source().as_ref(),
            container.clone(),
            self.page_size,
        )
        .with_limit(self.max_scan);

        let mut collector = ScanCollector::default();
        while let Some(msg) = cursor.next(ctx).await? {
            collector.offer(&msg, topic);
        }
        let result = collector.finish();

        tracing::info!(
            container = %container,
            %topic,
            scanned = cursor.yielded(),
            matched = result.len(),
            "topic scanned"
        );
        Ok(result)
    }

    /// Resolve the container, scan, then download every matching id in ascending order.
    pub async fn download(
        &self,
        ctx: &OpContext,
        container: &ContainerRef,
        topic: ItemId,
    ) -> Result<BatchSummary> {
        let info = ctx
            .guard(self.downloader.source().resolve_container(container))
            .await?;
        ctx.notify(&format!("📥 Starting topic download from {}...", info.title))
            .await;

        let scan = self.scan(ctx, container, topic).await?;
        if scan.is_empty() {
            ctx.notify("❌ No messages found in this topic.").await;
            return Ok(BatchSummary::default());
        }
        ctx.notify(&format!(
            "📥 Found {} messages in topic {topic}, downloading...",
            scan.len()
        ))
        .await;

        let mut batch = Batch::new(&self.downloader, ctx, self.pacing);
        for id in scan.ids() {
            batch
                .item(PostReference::new(container.clone(), *id))
                .await?;
        }

        let summary = batch.finish();
        ctx.notify(&summary.render(" from topic")).await;
        Ok(summary)
    }
}

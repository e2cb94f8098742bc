use std::{collections::HashSet, sync::Arc, time::Duration};

use crate::{
    config::Config,
    context::OpContext,
    domain::{GroupId, PostReference},
    errors::Error,
    fetcher::{deliver_media, ItemFetcher, Outcome},
    media_group::GroupAggregator,
    ports::MessageSource,
    Result,
};

pub const NO_GROUP_MEDIA: &str = "Could not extract any valid media from the media group.";
pub const NOTHING_TO_SEND: &str = "No media or text found in the post.";

/// How a single post ended up, when it did not fail.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ItemStatus {
    /// Media went out: one file, or the delivered members of a group.
    Delivered(usize),
    /// The post was text and its body was sent as a message.
    Text,
    Empty,
    /// Another post of the same group was already aggregated in this operation.
    GroupAlreadyHandled,
    NoUsableGroupMedia,
}

impl ItemStatus {
    pub fn is_delivered(self) -> bool {
        matches!(self, ItemStatus::Delivered(_) | ItemStatus::Text)
    }
}

/// Group ids aggregated so far in one operation.
#[derive(Debug, Default)]
pub struct SeenGroups(HashSet<GroupId>);

impl SeenGroups {
    pub fn contains(&self, id: &GroupId) -> bool {
        self.0.contains(id)
    }

    pub fn insert(&mut self, id: GroupId) -> bool {
        self.0.insert(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Fetch-and-deliver for one post, including media groups and retries.
pub struct Downloader {
    fetcher: Arc<ItemFetcher>,
    aggregator: GroupAggregator,
    retries: u32,
    retry_delay: Duration,
}

impl Downloader {
    pub fn new(source: Arc<dyn MessageSource>, cfg: &Config) -> Self {
        let fetcher = Arc::new(ItemFetcher::new(source, cfg));
        Self {
            aggregator: GroupAggregator::new(fetcher.clone()),
            fetcher,
            retries: cfg.item_retries,
            retry_delay: cfg.item_pacing,
        }
    }

    pub fn source(&self) -> &Arc<dyn MessageSource> {
        self.fetcher.source()
    }

    /// Download and deliver `reference`.
    ///
    /// Transfer failures are retried up to the configured count; every other error is
    /// returned as-is. `seen` is updated only after a group was fully walked.
    pub async fn download(
        &self,
        reference: &PostReference,
        ctx: &OpContext,
        seen: &mut SeenGroups,
    ) -> Result<ItemStatus> {
        let mut attempt = 0;
        loop {
            match self.attempt(reference, ctx, seen).await {
                Err(e) if e.is_transient() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(link = %reference, attempt, error = %e, "retrying item");
                    ctx.pause(self.retry_delay).await?;
                }
                other => return other,
            }
        }
    }

    async fn attempt(
        &self,
        reference: &PostReference,
        ctx: &OpContext,
        seen: &mut SeenGroups,
    ) -> Result<ItemStatus> {
        tracing::debug!(link = %reference, "fetching post");
        match self.fetcher.fetch(reference, ctx).await? {
            Outcome::Media(media) => {
                deliver_media(ctx, media).await?;
                Ok(ItemStatus::Delivered(1))
            }
            Outcome::Text(body) => {
                ctx.guard(ctx.requester.notify(&body))
                    .await
                    .map_err(|e| match e {
                        Error::Cancelled => Error::Cancelled,
                        other => Error::Delivery(other.to_string()),
                    })?;
                Ok(ItemStatus::Text)
            }
            Outcome::GroupDeferred { group_id, seed } => {
                if seen.contains(&group_id) {
                    tracing::debug!(link = %reference, group = %group_id, "group already handled");
                    return Ok(ItemStatus::GroupAlreadyHandled);
                }
                let out = self
                    .aggregator
                    .collect(&reference.container, &seed, ctx)
                    .await?;
                seen.insert(group_id);
                if out.succeeded() {
                    Ok(ItemStatus::Delivered(out.delivered))
                } else {
                    ctx.notify(NO_GROUP_MEDIA).await;
                    Ok(ItemStatus::NoUsableGroupMedia)
                }
            }
            Outcome::Empty => Ok(ItemStatus::Empty),
        }
    }
}

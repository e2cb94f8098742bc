use std::sync::Arc;

use crate::{
    context::OpContext,
    domain::{ContainerRef, RemoteMessage},
    errors::Error,
    fetcher::{deliver_media, ItemFetcher},
    Result,
};

/// Tally of one group aggregation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GroupOutcome {
    pub members: usize,
    pub delivered: usize,
    pub skipped: usize,
    pub failed: usize,
}

impl GroupOutcome {
    /// A group counts as handled once any member reached the requester.
    pub fn succeeded(&self) -> bool {
        self.delivered > 0
    }
}

/// Extracts and delivers every usable member of a media group.
///
/// Members are handled one at a time in source order. A member that is not media is
/// skipped; a member that fails (size, transfer, delivery) is logged and the rest of
/// the group still goes out. Only cancellation aborts the walk.
pub struct GroupAggregator {
    fetcher: Arc<ItemFetcher>,
}

impl GroupAggregator {
    pub fn new(fetcher: Arc<ItemFetcher>) -> Self {
        Self { fetcher }
    }

    pub async fn aggregate(
        &self,
        container: &ContainerRef,
        seed: &RemoteMessage,
        ctx: &OpContext,
    ) -> Result<bool> {
        Ok(self.collect(container, seed, ctx).await?.succeeded())
    }

    pub async fn collect(
        &self,
        container: &ContainerRef,
        seed: &RemoteMessage,
        ctx: &OpContext,
    ) -> Result<GroupOutcome> {
        let members = ctx
            .guard(self.fetcher.source().fetch_group(container, seed))
            .await?;

        let mut out = GroupOutcome {
            members: members.len(),
            ..GroupOutcome::default()
        };

        for member in &members {
            ctx.ensure_active()?;
            let media = match self.fetcher.extract_media(container, member, ctx).await {
                Ok(Some(media)) => media,
                Ok(None) => {
                    out.skipped += 1;
                    continue;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    out.failed += 1;
                    tracing::warn!(item = %member.id, error = %e, "group member skipped");
                    continue;
                }
            };
            match deliver_media(ctx, media).await {
                Ok(()) => out.delivered += 1,
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    out.failed += 1;
                    tracing::warn!(item = %member.id, error = %e, "group member not delivered");
                }
            }
        }

        tracing::info!(
            group = ?seed.group_id,
            members = out.members,
            delivered = out.delivered,
            skipped = out.skipped,
            failed = out.failed,
            "media group handled"
        );
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        domain::MediaKind,
        testing::{empty, group_member, photo, test_config, text, video, FakeSource, RecordingRequester},
    };

    fn chan() -> ContainerRef {
        ContainerRef::Name("chan".into())
    }

    fn aggregator(source: FakeSource, dir: &std::path::Path) -> (Arc<FakeSource>, GroupAggregator) {
        let source = Arc::new(source);
        let fetcher = Arc::new(ItemFetcher::new(source.clone(), &test_config(dir)));
        (source, GroupAggregator::new(fetcher))
    }

    #[tokio::test]
    async fn non_media_members_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let (source, agg) = aggregator(
            FakeSource::new().with_messages([
                group_member(photo(10), "g"),
                group_member(empty(11), "g"),
                group_member(photo(12), "g"),
            ]),
            dir.path(),
        );
        let requester = Arc::new(RecordingRequester::default());
        let ctx = OpContext::detached(requester.clone());

        let seed = group_member(photo(10), "g");
        assert!(agg.aggregate(&chan(), &seed, &ctx).await.unwrap());

        let delivered = requester.deliveries();
        assert_eq!(delivered.len(), 2);
        assert!(delivered.iter().all(|d| d.kind == MediaKind::Photo));
        assert_eq!(delivered[0].body, "content-10");
        assert_eq!(delivered[1].body, "content-12");
        for path in source.written() {
            assert!(!path.exists(), "{} left behind", path.display());
        }
    }

    #[tokio::test]
    async fn a_group_without_media_is_not_a_success() {
        let dir = tempfile::tempdir().unwrap();
        let (_source, agg) = aggregator(
            FakeSource::new().with_messages([
                group_member(text(20, "caption only"), "g"),
                group_member(empty(21), "g"),
            ]),
            dir.path(),
        );
        let ctx = OpContext::detached(Arc::new(RecordingRequester::default()));

        let out = agg
            .collect(&chan(), &group_member(text(20, "x"), "g"), &ctx)
            .await
            .unwrap();
        assert_eq!(out.members, 2);
        assert_eq!(out.skipped, 2);
        assert!(!out.succeeded());
    }

    #[tokio::test]
    async fn one_bad_member_does_not_sink_the_group() {
        let dir = tempfile::tempdir().unwrap();
        let (_source, agg) = aggregator(
            FakeSource::new()
                .with_messages([
                    group_member(photo(30), "g"),
                    group_member(video(31, 5 * 1024 * 1024 * 1024), "g"),
                    group_member(photo(32), "g"),
                ])
                .failing_content(30, 1),
            dir.path(),
        );
        let requester = Arc::new(RecordingRequester::default());
        let ctx = OpContext::detached(requester.clone());

        let out = agg
            .collect(&chan(), &group_member(photo(30), "g"), &ctx)
            .await
            .unwrap();
        assert_eq!(out.delivered, 1);
        assert_eq!(out.failed, 2);
        assert_eq!(requester.deliveries()[0].body, "content-32");
    }

    #[tokio::test]
    async fn cancelled_context_stops_before_members() {
        let dir = tempfile::tempdir().unwrap();
        let (source, agg) = aggregator(
            FakeSource::new().with_messages([group_member(photo(40), "g")]),
            dir.path(),
        );
        let ctx = OpContext::detached(Arc::new(RecordingRequester::default()));
        ctx.cancel.cancel();

        let err = agg
            .collect(&chan(), &group_member(photo(40), "g"), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(source.content_calls().is_empty());
    }
}

//! Entry points for requests: validate input, register a unit of work in the
//! [`TaskRegistry`] and run it on its own task.

use std::{future::Future, sync::Arc, time::Instant};

use tokio::task::JoinHandle;

use crate::{
    bulk::BulkIterator,
    config::Config,
    context::OpContext,
    domain::{ContainerRef, ItemId},
    download::{Downloader, ItemStatus, SeenGroups, NOTHING_TO_SEND},
    errors::Error,
    ports::{MessageSource, Requester},
    progress,
    range::RangeIterator,
    reference::{parse_container_token, parse_range_links, parse_reference},
    registry::TaskRegistry,
    throttled::{ThrottleConfig, ThrottledRequester},
    topic::TopicScanner,
    utils::human_duration,
    Result,
};

pub struct Coordinator {
    registry: Arc<TaskRegistry>,
    downloader: Arc<Downloader>,
    range: RangeIterator,
    topic: TopicScanner,
    bulk: BulkIterator,
    throttle: ThrottleConfig,
}

impl Coordinator {
    /// Every unit talks to its requester through a [`ThrottledRequester`] spaced by
    /// `cfg.notify_min_interval`.
    pub fn new(
        cfg: &Config,
        source: Arc<dyn MessageSource>,
        registry: Arc<TaskRegistry>,
    ) -> Self {
        let downloader = Arc::new(Downloader::new(source, cfg));
        Self {
            range: RangeIterator::new(downloader.clone(), cfg.item_pacing, cfg.max_range_len),
            topic: TopicScanner::new(
                downloader.clone(),
                cfg.history_page_size,
                cfg.max_scan_messages,
                cfg.item_pacing,
            ),
            bulk: BulkIterator::new(
                downloader.clone(),
                cfg.history_page_size,
                cfg.max_scan_messages,
                cfg.item_pacing,
            ),
            downloader,
            registry,
            throttle: ThrottleConfig::from_config(cfg),
        }
    }

    pub fn registry(&self) -> &Arc<TaskRegistry> {
        &self.registry
    }

    /// Download one post link.
    pub async fn launch_download(
        &self,
        link: &str,
        requester: Arc<dyn Requester>,
    ) -> Result<JoinHandle<()>> {
        let reference = match parse_reference(link) {
            Ok(r) => r,
            Err(e) => return Err(reject(requester.as_ref(), e).await),
        };
        let downloader = self.downloader.clone();
        Ok(self.spawn(format!("download {reference}"), requester, move |ctx| async move {
            let mut seen = SeenGroups::default();
            match downloader.download(&reference, &ctx, &mut seen).await {
                Ok(ItemStatus::Empty) => {
                    ctx.notify(NOTHING_TO_SEND).await;
                    Ok(())
                }
                Ok(_) => Ok(()),
                Err(Error::Cancelled) => Err(Error::Cancelled),
                Err(e) => {
                    ctx.notify(&e.user_message()).await;
                    Err(e)
                }
            }
        }))
    }

    /// Download every post between two links of the same container.
    pub async fn launch_range(
        &self,
        start_link: &str,
        end_link: &str,
        requester: Arc<dyn Requester>,
    ) -> Result<JoinHandle<()>> {
        let checked = parse_range_links(start_link, end_link).and_then(|(container, start, end)| {
            self.range.validate(start, end)?;
            Ok((container, start, end))
        });
        let (container, start, end) = match checked {
            Ok(v) => v,
            Err(e) => return Err(reject(requester.as_ref(), e).await),
        };
        Ok(self.spawn_range(container, start, end, requester))
    }

    /// Download ids `start..=end` of a container given as link, username or id.
    pub async fn launch_container_range(
        &self,
        container: &str,
        start: i32,
        end: i32,
        requester: Arc<dyn Requester>,
    ) -> Result<JoinHandle<()>> {
        let (start, end) = (ItemId(start), ItemId(end));
        let checked = parse_container_token(container).and_then(|c| {
            self.range.validate(start, end)?;
            Ok(c)
        });
        let container = match checked {
            Ok(c) => c,
            Err(e) => return Err(reject(requester.as_ref(), e).await),
        };
        Ok(self.spawn_range(container, start, end, requester))
    }

    /// Download a container's whole history.
    pub async fn launch_bulk(
        &self,
        container: &str,
        requester: Arc<dyn Requester>,
    ) -> Result<JoinHandle<()>> {
        let container = match parse_container_token(container) {
            Ok(c) => c,
            Err(e) => return Err(reject(requester.as_ref(), e).await),
        };
        let bulk = self.bulk.clone();
        Ok(self.spawn(format!("bulk {container}"), requester, move |ctx| async move {
            report_failure(&ctx, bulk.run(&ctx, &container).await.map(drop)).await
        }))
    }

    /// Report the messages of the topic a link points at, without downloading.
    ///
    /// A thread link (`t.me/<chat>/<thread>/<item>`) names its thread; otherwise the
    /// linked post is taken as the topic's opening message.
    pub async fn launch_topic_scan(
        &self,
        link: &str,
        requester: Arc<dyn Requester>,
    ) -> Result<JoinHandle<()>> {
        let reference = match parse_reference(link) {
            Ok(r) => r,
            Err(e) => return Err(reject(requester.as_ref(), e).await),
        };
        let topic = self.topic.clone();
        let source = self.downloader.source().clone();
        Ok(self.spawn(format!("scan topic {reference}"), requester, move |ctx| async move {
            let res = async {
                let info = ctx.guard(source.resolve_container(&reference.container)).await?;
                ctx.notify(&format!("🔍 Scanning topic in {}...", info.title))
                    .await;
                let scan = topic.scan(&ctx, &reference.container, reference.topic()).await?;
                ctx.notify(&scan.report()).await;
                Ok::<_, Error>(())
            }
            .await;
            report_failure(&ctx, res).await
        }))
    }

    /// Download every message of the topic a link points at.
    pub async fn launch_topic_download(
        &self,
        link: &str,
        requester: Arc<dyn Requester>,
    ) -> Result<JoinHandle<()>> {
        let reference = match parse_reference(link) {
            Ok(r) => r,
            Err(e) => return Err(reject(requester.as_ref(), e).await),
        };
        let topic = self.topic.clone();
        Ok(self.spawn(format!("topic {reference}"), requester, move |ctx| async move {
            let res = topic
                .download(&ctx, &reference.container, reference.topic())
                .await
                .map(drop);
            report_failure(&ctx, res).await
        }))
    }

    /// Cancel every running unit and tell `requester` how many there were.
    pub async fn cancel_all(&self, requester: &dyn Requester) -> usize {
        for task in self.registry.snapshot() {
            tracing::info!(
                task = task.id.0,
                label = %task.label,
                running_for = %human_duration(task.running_for),
                "cancelling task"
            );
        }
        let n = self.registry.cancel_all();
        if let Err(e) = requester
            .notify(&format!("Cancelled {n} running task(s)."))
            .await
        {
            tracing::warn!(error = %e, "failed to confirm cancellation");
        }
        n
    }

    fn spawn_range(
        &self,
        container: ContainerRef,
        start: ItemId,
        end: ItemId,
        requester: Arc<dyn Requester>,
    ) -> JoinHandle<()> {
        let range = self.range.clone();
        let label = format!("range {container} {start}..={end}");
        self.spawn(label, requester, move |ctx| async move {
            let res = range.run(&ctx, &container, start, end).await.map(drop);
            report_failure(&ctx, res).await
        })
    }

    /// Register a unit and run `work` until it finishes or its token fires.
    ///
    /// The unit is registered before this returns and deregistered after `work` has
    /// been dropped, so transient files are gone by the time the registry forgets it.
    fn spawn<F, Fut>(&self, label: String, requester: Arc<dyn Requester>, work: F) -> JoinHandle<()>
    where
        F: FnOnce(OpContext) -> Fut + Send + 'static,
        Fut: Future<Output = Result<()>> + Send + 'static,
    {
        let guard = self.registry.register(label.clone());
        let token = guard.token();
        let requester: Arc<dyn Requester> =
            Arc::new(ThrottledRequester::new(requester, self.throttle));
        let ctx = OpContext::new(requester.clone(), guard.token());

        tokio::spawn(async move {
            let _guard = guard;
            let started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = token.cancelled() => Err(Error::Cancelled),
                res = work(ctx) => res,
            };
            if result.is_err() {
                progress::end(requester.as_ref()).await;
            }
            let elapsed = human_duration(started.elapsed());
            match result {
                Ok(()) => tracing::info!(%label, %elapsed, "task finished"),
                Err(Error::Cancelled) => tracing::info!(%label, %elapsed, "task cancelled"),
                Err(e) => tracing::warn!(%label, %elapsed, error = %e, "task failed"),
            }
        })
    }
}

async fn reject(requester: &dyn Requester, err: Error) -> Error {
    tracing::info!(error = %err, "request rejected");
    if let Err(e) = requester.notify(&err.user_message()).await {
        tracing::warn!(error = %e, "failed to notify requester");
    }
    err
}

/// Tell the requester about an operation-level failure, then pass it on for logging.
async fn report_failure(ctx: &OpContext, res: Result<()>) -> Result<()> {
    match res {
        Err(e) if !matches!(e, Error::Cancelled) => {
            ctx.notify(&e.user_message()).await;
            Err(e)
        }
        other => other,
    }
}

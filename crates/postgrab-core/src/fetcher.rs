//! Single-item fetch: resolve a reference, classify the payload, gate on size and
//! transfer the content into a transient local file.

use std::{path::PathBuf, sync::Arc, time::Duration};

use tokio::sync::watch;

use crate::{
    config::Config,
    context::OpContext,
    domain::{ContainerRef, GroupId, ItemId, MediaInfo, MediaKind, MessagePayload, PostReference, RemoteMessage},
    errors::Error,
    ports::MessageSource,
    progress::{self, TransferProgress, DOWNLOAD_LABEL},
    size_gate::{SizeGate, Tier},
    transient::TransientFile,
    utils::unique_file_name,
    Result,
};

/// Media sitting in a transient file, not yet handed to the requester.
#[derive(Debug)]
pub struct FetchedMedia {
    pub item: ItemId,
    pub kind: MediaKind,
    pub caption: Option<String>,
    pub file: TransientFile,
}

/// What a reference resolved to. Failures come back as the `Err` arm of `fetch`.
#[derive(Debug)]
pub enum Outcome {
    Media(FetchedMedia),
    Text(String),
    /// The message is part of a media group; the group path owns extraction.
    GroupDeferred {
        group_id: GroupId,
        seed: RemoteMessage,
    },
    Empty,
}

pub struct ItemFetcher {
    source: Arc<dyn MessageSource>,
    gate: SizeGate,
    download_dir: PathBuf,
    progress_interval: Duration,
}

impl ItemFetcher {
    pub fn new(source: Arc<dyn MessageSource>, cfg: &Config) -> Self {
        Self {
            source,
            gate: SizeGate::from_config(cfg),
            download_dir: cfg.download_dir.clone(),
            progress_interval: cfg.progress_interval,
        }
    }

    pub fn source(&self) -> &Arc<dyn MessageSource> {
        &self.source
    }

    pub async fn fetch(&self, reference: &PostReference, ctx: &OpContext) -> Result<Outcome> {
        ctx.ensure_active()?;
        let message = ctx
            .guard(
                self.source
                    .fetch_message(&reference.container, reference.item),
            )
            .await?;

        if let Some(media) = message.media() {
            self.check_size(media).await?;
        }

        if let Some(group_id) = message.group_id.clone() {
            return Ok(Outcome::GroupDeferred {
                group_id,
                seed: message,
            });
        }

        match &message.payload {
            MessagePayload::Media(info) => {
                let fetched = self
                    .transfer(&reference.container, &message, info, ctx)
                    .await?;
                Ok(Outcome::Media(fetched))
            }
            MessagePayload::Text(body) if !body.trim().is_empty() => Ok(Outcome::Text(body.clone())),
            _ => Ok(Outcome::Empty),
        }
    }

    /// Size-gate and transfer one message's media. `None` when it carries no media.
    pub async fn extract_media(
        &self,
        container: &ContainerRef,
        message: &RemoteMessage,
        ctx: &OpContext,
    ) -> Result<Option<FetchedMedia>> {
        let Some(info) = message.media() else {
            return Ok(None);
        };
        self.check_size(info).await?;
        self.transfer(container, message, info, ctx).await.map(Some)
    }

    async fn check_size(&self, media: &MediaInfo) -> Result<()> {
        let tier = Tier::from_elevated(self.source.is_elevated().await);
        self.gate
            .check(media.size, tier)
            .map_err(Error::SizeLimitExceeded)
    }

    async fn transfer(
        &self,
        container: &ContainerRef,
        message: &RemoteMessage,
        info: &MediaInfo,
        ctx: &OpContext,
    ) -> Result<FetchedMedia> {
        ctx.ensure_active()?;

        let name = unique_file_name(
            &file_stem(container, message.id),
            info.file_name.as_deref(),
            info.kind.default_extension(),
        );
        let mut file = TransientFile::reserve(&self.download_dir, &name)?;

        let (tx, rx) = watch::channel(None::<TransferProgress>);
        let source = &self.source;
        let dest = file.path().to_path_buf();
        let transfer = async move {
            let mut on_progress = move |p: TransferProgress| {
                let _ = tx.send(Some(p));
            };
            source.fetch_content(message, &dest, &mut on_progress).await
        };
        let forward = progress::forward(
            rx,
            ctx.requester.as_ref(),
            DOWNLOAD_LABEL,
            self.progress_interval,
        );

        let written = match ctx
            .guard(async {
                let (res, ()) = tokio::join!(transfer, forward);
                res
            })
            .await
        {
            Ok(written) => written,
            Err(e) => {
                progress::end(ctx.requester.as_ref()).await;
                return Err(e);
            }
        };
        file.adopt(written);

        tracing::info!(
            item = %message.id,
            kind = info.kind.as_str(),
            size = info.size,
            path = %file.path().display(),
            "downloaded media"
        );

        Ok(FetchedMedia {
            item: message.id,
            kind: info.kind,
            caption: message.caption.clone(),
            file,
        })
    }
}

/// Hand `media` to the requester, then delete the local file whatever the result.
pub async fn deliver_media(ctx: &OpContext, media: FetchedMedia) -> Result<()> {
    let FetchedMedia {
        item,
        kind,
        caption,
        file,
    } = media;

    let res = ctx
        .guard(
            ctx.requester
                .deliver(file.path(), kind, caption.as_deref()),
        )
        .await;
    file.release().await;

    match res {
        Ok(()) => Ok(()),
        Err(Error::Cancelled) => Err(Error::Cancelled),
        Err(e @ Error::Delivery(_)) => Err(e),
        Err(e) => {
            tracing::warn!(item = %item, error = %e, "delivery failed");
            Err(Error::Delivery(e.to_string()))
        }
    }
}

fn file_stem(container: &ContainerRef, item: ItemId) -> String {
    match container {
        ContainerRef::Name(name) => format!("{name}_{item}"),
        ContainerRef::Id(id) => format!("{}_{item}", id.unsigned_abs()),
    }
}

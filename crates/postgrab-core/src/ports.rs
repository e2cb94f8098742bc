use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::{
    domain::{ContainerInfo, ContainerRef, ItemId, MediaKind, RemoteMessage},
    progress::TransferProgress,
    Result,
};

/// Port for the messaging-service client that reads posts (a user session).
///
/// Implementations map lookup/authorization failures to `Error::NotFound` /
/// `Error::AccessDenied` and transfer failures to `Error::TransferFailed`.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn fetch_message(&self, container: &ContainerRef, item: ItemId)
        -> Result<RemoteMessage>;

    /// Every member of the group `seed` belongs to, in the order the service returns them.
    async fn fetch_group(
        &self,
        container: &ContainerRef,
        seed: &RemoteMessage,
    ) -> Result<Vec<RemoteMessage>>;

    /// Download the media of `message` to `dest` and return the path actually written
    /// (usually `dest`).
    async fn fetch_content(
        &self,
        message: &RemoteMessage,
        dest: &Path,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<PathBuf>;

    /// One page of history strictly older than `before` (newest first). An empty page
    /// means the history is exhausted.
    async fn history_page(
        &self,
        container: &ContainerRef,
        before: Option<ItemId>,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>>;

    async fn resolve_container(&self, container: &ContainerRef) -> Result<ContainerInfo>;

    /// Whether the acting session has the raised size limit.
    async fn is_elevated(&self) -> bool;
}

/// Port for whoever asked for the work (a chat with the bot).
#[async_trait]
pub trait Requester: Send + Sync {
    /// Fire-and-forget status text.
    async fn notify(&self, text: &str) -> Result<()>;

    /// Called at a bounded rate while a transfer runs.
    async fn notify_progress(&self, label: &str, progress: TransferProgress) -> Result<()>;

    /// The transfer behind the last progress update ended without a delivery. The next
    /// `notify_progress` belongs to a different transfer.
    async fn end_progress(&self) -> Result<()> {
        Ok(())
    }

    /// Hand over a finished file. The core deletes `path` once this returns, whether
    /// it succeeded or not.
    async fn deliver(&self, path: &Path, kind: MediaKind, caption: Option<&str>) -> Result<()>;
}

//! In-memory ports for unit tests.

use std::{
    collections::{BTreeMap, HashMap, VecDeque},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    config::Config,
    domain::{
        ContainerInfo, ContainerRef, GroupId, ItemId, MediaInfo, MediaKind, MessagePayload,
        RemoteMessage,
    },
    errors::Error,
    ports::{MessageSource, Requester},
    progress::TransferProgress,
    Result,
};

pub(crate) fn test_config(dir: &Path) -> Config {
    Config {
        download_dir: dir.to_path_buf(),
        item_pacing: Duration::ZERO,
        progress_interval: Duration::ZERO,
        notify_min_interval: Duration::ZERO,
        ..Config::default()
    }
}

fn media(id: i32, kind: MediaKind, size: u64) -> RemoteMessage {
    RemoteMessage::new(
        ItemId(id),
        MessagePayload::Media(MediaInfo {
            kind,
            size,
            file_name: None,
        }),
    )
}

pub(crate) fn photo(id: i32) -> RemoteMessage {
    media(id, MediaKind::Photo, 64)
}

pub(crate) fn video(id: i32, size: u64) -> RemoteMessage {
    media(id, MediaKind::Video, size)
}

pub(crate) fn text(id: i32, body: &str) -> RemoteMessage {
    RemoteMessage::new(ItemId(id), MessagePayload::Text(body.to_string()))
}

pub(crate) fn empty(id: i32) -> RemoteMessage {
    RemoteMessage::new(ItemId(id), MessagePayload::Empty)
}

pub(crate) fn group_member(mut msg: RemoteMessage, group: &str) -> RemoteMessage {
    msg.group_id = Some(GroupId(group.to_string()));
    msg
}

pub(crate) fn reply_to(mut msg: RemoteMessage, target: i32) -> RemoteMessage {
    msg.reply_to_id = Some(ItemId(target));
    msg
}

/// Scriptable message source.
///
/// Messages are looked up by id regardless of container. History is served from
/// `scripted_pages` when any are queued, otherwise computed from stored messages.
#[derive(Default)]
pub(crate) struct FakeSource {
    messages: Mutex<BTreeMap<i32, RemoteMessage>>,
    failing_fetch: Mutex<HashMap<i32, Error>>,
    failing_content: Mutex<HashMap<i32, usize>>,
    scripted_pages: Mutex<VecDeque<Vec<RemoteMessage>>>,
    elevated: AtomicBool,
    blocking: Option<Arc<Notify>>,
    info: Option<ContainerInfo>,
    fetch_calls: Mutex<Vec<i32>>,
    content_calls: Mutex<Vec<i32>>,
    history_calls: Mutex<Vec<Option<ItemId>>>,
    written: Mutex<Vec<PathBuf>>,
}

impl FakeSource {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_message(self, msg: RemoteMessage) -> Self {
        lock(&self.messages).insert(msg.id.0, msg);
        self
    }

    pub(crate) fn with_messages(self, msgs: impl IntoIterator<Item = RemoteMessage>) -> Self {
        msgs.into_iter().fold(self, Self::with_message)
    }

    pub(crate) fn with_page(self, page: Vec<RemoteMessage>) -> Self {
        lock(&self.scripted_pages).push_back(page);
        self
    }

    pub(crate) fn with_info(mut self, title: &str, username: Option<&str>) -> Self {
        self.info = Some(ContainerInfo {
            id: -1001234,
            title: title.to_string(),
            username: username.map(str::to_string),
        });
        self
    }

    pub(crate) fn failing_fetch(self, id: i32, err: Error) -> Self {
        lock(&self.failing_fetch).insert(id, err);
        self
    }

    /// The next `times` content transfers of `id` fail with `TransferFailed`.
    pub(crate) fn failing_content(self, id: i32, times: usize) -> Self {
        lock(&self.failing_content).insert(id, times);
        self
    }

    pub(crate) fn elevated(self, on: bool) -> Self {
        self.elevated.store(on, Ordering::SeqCst);
        self
    }

    /// Content transfers write a partial file, signal the returned notify and never finish.
    pub(crate) fn blocking_content(mut self) -> (Self, Arc<Notify>) {
        let started = Arc::new(Notify::new());
        self.blocking = Some(started.clone());
        (self, started)
    }

    pub(crate) fn fetch_calls(&self) -> Vec<i32> {
        lock(&self.fetch_calls).clone()
    }

    pub(crate) fn content_calls(&self) -> Vec<i32> {
        lock(&self.content_calls).clone()
    }

    pub(crate) fn history_calls(&self) -> Vec<Option<ItemId>> {
        lock(&self.history_calls).clone()
    }

    pub(crate) fn written(&self) -> Vec<PathBuf> {
        lock(&self.written).clone()
    }
}

#[async_trait]
impl MessageSource for FakeSource {
    async fn fetch_message(&self, _container: &ContainerRef, item: ItemId) -> Result<RemoteMessage> {
        lock(&self.fetch_calls).push(item.0);
        if let Some(err) = lock(&self.failing_fetch).get(&item.0) {
            return Err(clone_error(err));
        }
        lock(&self.messages)
            .get(&item.0)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("message {item}")))
    }

    async fn fetch_group(
        &self,
        _container: &ContainerRef,
        seed: &RemoteMessage,
    ) -> Result<Vec<RemoteMessage>> {
        let Some(group) = &seed.group_id else {
            return Ok(vec![seed.clone()]);
        };
        Ok(lock(&self.messages)
            .values()
            .filter(|m| m.group_id.as_ref() == Some(group))
            .cloned()
            .collect())
    }

    async fn fetch_content(
        &self,
        message: &RemoteMessage,
        dest: &Path,
        on_progress: &mut (dyn FnMut(TransferProgress) + Send),
    ) -> Result<PathBuf> {
        lock(&self.content_calls).push(message.id.0);
        {
            let mut failing = lock(&self.failing_content);
            if let Some(left) = failing.get_mut(&message.id.0) {
                if *left > 0 {
                    *left -= 1;
                    return Err(Error::TransferFailed("connection reset".to_string()));
                }
            }
        }

        let body = format!("content-{}", message.id);
        let total = body.len() as u64;
        std::fs::write(dest, &body)?;
        lock(&self.written).push(dest.to_path_buf());

        if let Some(started) = &self.blocking {
            on_progress(TransferProgress {
                done: total / 2,
                total,
                elapsed: Duration::from_millis(10),
            });
            started.notify_one();
            return std::future::pending().await;
        }

        for done in [total / 2, total] {
            on_progress(TransferProgress {
                done,
                total,
                elapsed: Duration::from_millis(10),
            });
            tokio::task::yield_now().await;
        }
        Ok(dest.to_path_buf())
    }

    async fn history_page(
        &self,
        _container: &ContainerRef,
        before: Option<ItemId>,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>> {
        lock(&self.history_calls).push(before);
        if let Some(page) = lock(&self.scripted_pages).pop_front() {
            return Ok(page);
        }
        Ok(lock(&self.messages)
            .values()
            .rev()
            .filter(|m| before.map_or(true, |b| m.id < b))
            .take(limit)
            .cloned()
            .collect())
    }

    async fn resolve_container(&self, container: &ContainerRef) -> Result<ContainerInfo> {
        self.info
            .clone()
            .ok_or_else(|| Error::AccessDenied(format!("cannot resolve {container}")))
    }

    async fn is_elevated(&self) -> bool {
        self.elevated.load(Ordering::SeqCst)
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Delivered {
    pub kind: MediaKind,
    pub caption: Option<String>,
    pub body: String,
}

/// Requester that records everything it is sent.
#[derive(Default)]
pub(crate) struct RecordingRequester {
    notes: Mutex<Vec<String>>,
    progress: Mutex<Vec<TransferProgress>>,
    deliveries: Mutex<Vec<Delivered>>,
    fail_delivery: AtomicBool,
    progress_ends: AtomicUsize,
}

impl RecordingRequester {
    pub(crate) fn failing_delivery(self) -> Self {
        self.fail_delivery.store(true, Ordering::SeqCst);
        self
    }

    pub(crate) fn notes(&self) -> Vec<String> {
        lock(&self.notes).clone()
    }

    pub(crate) fn progress(&self) -> Vec<TransferProgress> {
        lock(&self.progress).clone()
    }

    pub(crate) fn progress_ends(&self) -> usize {
        self.progress_ends.load(Ordering::SeqCst)
    }

    pub(crate) fn deliveries(&self) -> Vec<Delivered> {
        lock(&self.deliveries).clone()
    }

    pub(crate) fn saw(&self, needle: &str) -> bool {
        lock(&self.notes).iter().any(|n| n.contains(needle))
    }
}

#[async_trait]
impl Requester for RecordingRequester {
    async fn notify(&self, text: &str) -> Result<()> {
        lock(&self.notes).push(text.to_string());
        Ok(())
    }

    async fn notify_progress(&self, _label: &str, progress: TransferProgress) -> Result<()> {
        lock(&self.progress).push(progress);
        Ok(())
    }

    async fn end_progress(&self) -> Result<()> {
        self.progress_ends.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn deliver(&self, path: &Path, kind: MediaKind, caption: Option<&str>) -> Result<()> {
        if self.fail_delivery.load(Ordering::SeqCst) {
            return Err(Error::Delivery("upload rejected".to_string()));
        }
        let body = std::fs::read_to_string(path)?;
        lock(&self.deliveries).push(Delivered {
            kind,
            caption: caption.map(str::to_string),
            body,
        });
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn clone_error(err: &Error) -> Error {
    match err {
        Error::NotFound(s) => Error::NotFound(s.clone()),
        Error::AccessDenied(s) => Error::AccessDenied(s.clone()),
        Error::TransferFailed(s) => Error::TransferFailed(s.clone()),
        other => Error::External(other.to_string()),
    }
}

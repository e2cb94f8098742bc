//! Telegram adapter (teloxide).
//!
//! Implements the `postgrab-core` [`Requester`] port for one chat over the Bot API.

use std::path::Path;

use async_trait::async_trait;
use teloxide::{
    payloads::setters::*,
    requests::Requester as _,
    types::{ChatId, InputFile, MessageId},
    Bot,
};
use tokio::{sync::Mutex, time::sleep};

use postgrab_core::{
    domain::MediaKind,
    errors::Error,
    ports::Requester,
    progress::{render, TransferProgress},
    Result,
};

/// Bot API limit for message text.
pub const MAX_MESSAGE_LEN: usize = 4096;
/// Bot API limit for media captions.
pub const MAX_CAPTION_LEN: usize = 1024;

/// The chat a request came from.
pub struct TelegramRequester {
    bot: Bot,
    chat_id: ChatId,
    /// Status message that progress updates edit in place.
    status: Mutex<Option<MessageId>>,
}

impl TelegramRequester {
    pub fn new(bot: Bot, chat_id: ChatId) -> Self {
        Self {
            bot,
            chat_id,
            status: Mutex::new(None),
        }
    }

    pub fn chat_id(&self) -> ChatId {
        self.chat_id
    }

    fn map_err(e: teloxide::RequestError) -> Error {
        Error::External(format!("telegram error: {e}"))
    }

    async fn with_retry<T, Fut>(&self, mut op: impl FnMut() -> Fut) -> Result<T>
    where
        Fut: std::future::IntoFuture<Output = std::result::Result<T, teloxide::RequestError>>,
        Fut::IntoFuture: Send,
    {
        const MAX_RETRIES: usize = 1;
        let mut attempts = 0usize;
        loop {
            match op().await {
                Ok(v) => return Ok(v),
                Err(teloxide::RequestError::RetryAfter(d)) if attempts < MAX_RETRIES => {
                    attempts += 1;
                    tracing::debug!(chat = self.chat_id.0, wait_s = d.as_secs(), "rate limited, retrying");
                    sleep(d).await;
                }
                Err(other) => return Err(Self::map_err(other)),
            }
        }
    }

    async fn clear_status(&self) {
        let Some(id) = self.status.lock().await.take() else {
            return;
        };
        if let Err(e) = self.bot.delete_message(self.chat_id, id).await {
            tracing::debug!(chat = self.chat_id.0, error = %e, "status message not deleted");
        }
    }
}

#[async_trait]
impl Requester for TelegramRequester {
    async fn notify(&self, text: &str) -> Result<()> {
        for chunk in split_text(text, MAX_MESSAGE_LEN) {
            self.with_retry(|| self.bot.send_message(self.chat_id, chunk.clone()))
                .await?;
        }
        Ok(())
    }

    async fn notify_progress(&self, label: &str, progress: TransferProgress) -> Result<()> {
        let text = render(label, &progress);
        let mut status = self.status.lock().await;
        match *status {
            Some(id) => {
                // Identical text makes the edit fail; the card is simply unchanged.
                if let Err(e) = self
                    .with_retry(|| self.bot.edit_message_text(self.chat_id, id, text.clone()))
                    .await
                {
                    tracing::debug!(chat = self.chat_id.0, error = %e, "progress edit skipped");
                }
            }
            None => {
                let msg = self
                    .with_retry(|| self.bot.send_message(self.chat_id, text.clone()))
                    .await?;
                *status = Some(msg.id);
            }
        }
        Ok(())
    }

    async fn end_progress(&self) -> Result<()> {
        self.clear_status().await;
        Ok(())
    }

    async fn deliver(&self, path: &Path, kind: MediaKind, caption: Option<&str>) -> Result<()> {
        let caption = caption
            .map(|c| clamp_caption(c, MAX_CAPTION_LEN))
            .filter(|c| !c.is_empty());
        let file = || InputFile::file(path.to_path_buf());
        let chat = self.chat_id;

        let sent = match kind {
            MediaKind::Photo => {
                self.with_retry(|| {
                    let req = self.bot.send_photo(chat, file());
                    match &caption {
                        Some(c) => req.caption(c.clone()),
                        None => req,
                    }
                })
                .await
            }
            MediaKind::Video => {
                self.with_retry(|| {
                    let req = self.bot.send_video(chat, file());
                    match &caption {
                        Some(c) => req.caption(c.clone()),
                        None => req,
                    }
                })
                .await
            }
            MediaKind::Audio => {
                self.with_retry(|| {
                    let req = self.bot.send_audio(chat, file());
                    match &caption {
                        Some(c) => req.caption(c.clone()),
                        None => req,
                    }
                })
                .await
            }
            MediaKind::Document => {
                self.with_retry(|| {
                    let req = self.bot.send_document(chat, file());
                    match &caption {
                        Some(c) => req.caption(c.clone()),
                        None => req,
                    }
                })
                .await
            }
        };

        self.clear_status().await;
        match sent {
            Ok(_) => {
                tracing::info!(chat = chat.0, kind = kind.as_str(), "media delivered");
                Ok(())
            }
            Err(e) => Err(Error::Delivery(e.to_string())),
        }
    }
}

/// Split `text` into chunks of at most `max` chars, breaking after a newline when one
/// falls in the second half of a chunk.
pub fn split_text(text: &str, max: usize) -> Vec<String> {
    let max = max.max(1);
    let mut out = Vec::new();
    let mut rest: Vec<char> = text.chars().collect();

    while rest.len() > max {
        let window = &rest[..max];
        let cut = window
            .iter()
            .rposition(|&c| c == '\n')
            .filter(|&i| i + 1 >= max / 2)
            .map(|i| i + 1)
            .unwrap_or(max);
        out.push(rest[..cut].iter().collect());
        rest.drain(..cut);
    }
    if !rest.is_empty() {
        out.push(rest.into_iter().collect());
    }
    out
}

/// First `max` chars of `caption`.
pub fn clamp_caption(caption: &str, max: usize) -> String {
    caption.chars().take(max).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        assert_eq!(split_text("hello", MAX_MESSAGE_LEN), vec!["hello".to_string()]);
        assert!(split_text("", MAX_MESSAGE_LEN).is_empty());
    }

    #[test]
    fn long_text_prefers_newline_breaks() {
        let text = format!("{}\n{}", "a".repeat(7), "b".repeat(5));
        let chunks = split_text(&text, 10);
        assert_eq!(chunks, vec![format!("{}\n", "a".repeat(7)), "b".repeat(5)]);
    }

    #[test]
    fn long_text_without_newlines_is_cut_hard() {
        let chunks = split_text(&"x".repeat(25), 10);
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chars().count() <= 10));
        assert_eq!(chunks.concat(), "x".repeat(25));
    }

    #[test]
    fn chunks_never_split_multibyte_chars() {
        let text = "é".repeat(MAX_MESSAGE_LEN + 3);
        let chunks = split_text(&text, MAX_MESSAGE_LEN);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1].chars().count(), 3);
    }

    #[test]
    fn captions_are_clamped_by_chars() {
        let long = "ü".repeat(MAX_CAPTION_LEN + 10);
        assert_eq!(clamp_caption(&long, MAX_CAPTION_LEN).chars().count(), MAX_CAPTION_LEN);
        assert_eq!(clamp_caption("short", MAX_CAPTION_LEN), "short");
    }
}

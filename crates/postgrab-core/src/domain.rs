use std::fmt;

/// Remote message id (numeric, always >= 1 once parsed).
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ItemId(pub i32);

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Media group (album) identifier.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct GroupId(pub String);

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Prefix Telegram puts in front of private channel ids (`t.me/c/<n>` -> `-100<n>`).
const CHANNEL_ID_PREFIX: i64 = -1_000_000_000_000;

/// A chat/channel, either by numeric id or by public username.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum ContainerRef {
    Id(i64),
    Name(String),
}

impl ContainerRef {
    /// Numeric id for a `t.me/c/<n>` link, `None` when `-100<n>` does not fit an i64.
    pub fn private_channel(short_id: i64) -> Option<Self> {
        CHANNEL_ID_PREFIX.checked_sub(short_id).map(ContainerRef::Id)
    }

    /// The `<n>` of `-100<n>`, if this is a private channel id.
    pub fn short_channel_id(&self) -> Option<i64> {
        match self {
            ContainerRef::Id(id) if *id < CHANNEL_ID_PREFIX => Some(CHANNEL_ID_PREFIX - id),
            _ => None,
        }
    }

    fn link_base(&self) -> String {
        match self {
            ContainerRef::Name(name) => format!("https://t.me/{name}"),
            ContainerRef::Id(id) => match self.short_channel_id() {
                Some(short) => format!("https://t.me/c/{short}"),
                None => format!("https://t.me/c/{id}"),
            },
        }
    }
}

impl fmt::Display for ContainerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContainerRef::Id(id) => write!(f, "{id}"),
            ContainerRef::Name(name) => write!(f, "@{name}"),
        }
    }
}

/// A parsed post link.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct PostReference {
    pub container: ContainerRef,
    pub item: ItemId,
    /// Forum thread segment of `t.me/<chat>/<thread>/<item>` links.
    pub thread: Option<ItemId>,
}

impl PostReference {
    pub fn new(container: ContainerRef, item: ItemId) -> Self {
        Self {
            container,
            item,
            thread: None,
        }
    }

    /// Topic the link points into: its thread segment, else the post itself.
    pub fn topic(&self) -> ItemId {
        self.thread.unwrap_or(self.item)
    }

    /// Canonical link (thread segment dropped).
    pub fn link(&self) -> String {
        format!("{}/{}", self.container.link_base(), self.item)
    }
}

impl fmt::Display for PostReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.link())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MediaKind {
    Photo,
    Video,
    Audio,
    Document,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Photo => "photo",
            MediaKind::Video => "video",
            MediaKind::Audio => "audio",
            MediaKind::Document => "document",
        }
    }

    /// File extension used when the source does not name the file.
    pub fn default_extension(self) -> &'static str {
        match self {
            MediaKind::Photo => "jpg",
            MediaKind::Video => "mp4",
            MediaKind::Audio => "mp3",
            MediaKind::Document => "bin",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MediaInfo {
    pub kind: MediaKind,
    /// Declared size in bytes.
    pub size: u64,
    pub file_name: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MessagePayload {
    Media(MediaInfo),
    Text(String),
    /// Nothing downloadable (service message, poll, sticker-less placeholder...).
    Empty,
}

/// A message as returned by the source client. Read-only to the core.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteMessage {
    pub id: ItemId,
    pub group_id: Option<GroupId>,
    /// Declared reply target id.
    pub reply_to_id: Option<ItemId>,
    /// Id of the reply target after the client resolved it.
    pub reply_to_resolved: Option<ItemId>,
    pub caption: Option<String>,
    pub payload: MessagePayload,
}

impl RemoteMessage {
    pub fn new(id: ItemId, payload: MessagePayload) -> Self {
        Self {
            id,
            group_id: None,
            reply_to_id: None,
            reply_to_resolved: None,
            caption: None,
            payload,
        }
    }

    pub fn media(&self) -> Option<&MediaInfo> {
        match &self.payload {
            MessagePayload::Media(m) => Some(m),
            _ => None,
        }
    }

    pub fn has_media(&self) -> bool {
        self.media().is_some()
    }

    pub fn has_text(&self) -> bool {
        matches!(&self.payload, MessagePayload::Text(body) if !body.trim().is_empty())
    }

    pub fn is_empty(&self) -> bool {
        !self.has_media() && !self.has_text()
    }
}

/// Container metadata from `resolve_container`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContainerInfo {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
}

impl ContainerInfo {
    /// Reference used when synthesizing per-item links (username preferred).
    pub fn container_ref(&self) -> ContainerRef {
        match &self.username {
            Some(name) if !name.is_empty() => ContainerRef::Name(name.clone()),
            _ => ContainerRef::Id(self.id),
        }
    }
}

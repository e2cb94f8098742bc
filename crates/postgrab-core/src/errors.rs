use crate::size_gate::SizeRejection;

/// Core error type.
///
/// Adapter crates map their specific errors into this type so the core can tell a
/// per-item failure (skip and continue) from bad input (abort before fetching).
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("malformed reference: {0}")]
    MalformedReference(String),

    #[error("start id {start} is greater than end id {end}")]
    InvalidRange { start: i32, end: i32 },

    #[error("both links must point to the same container")]
    ContainerMismatch,

    #[error("range spans {len} items, the limit is {max}")]
    RangeTooLong { len: u64, max: u32 },

    #[error("size limit exceeded: {0}")]
    SizeLimitExceeded(SizeRejection),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("delivery failed: {0}")]
    Delivery(String),

    #[error("cancelled")]
    Cancelled,

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("external error: {0}")]
    External(String),
}

impl Error {
    /// Lookup/authorization failures: the user client cannot see the container.
    pub fn is_access_problem(&self) -> bool {
        matches!(self, Error::NotFound(_) | Error::AccessDenied(_))
    }

    /// Failures worth another sequential attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::TransferFailed(_))
    }

    /// Input errors are reported before any fetch happens.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Error::MalformedReference(_)
                | Error::InvalidRange { .. }
                | Error::ContainerMismatch
                | Error::RangeTooLong { .. }
        )
    }

    /// Text shown to the requester for a failed single-item request.
    pub fn user_message(&self) -> String {
        if self.is_access_problem() {
            return "Make sure the user client is part of the chat.".to_string();
        }
        format!("❌ {self}")
    }
}

pub type Result<T> = std::result::Result<T, Error>;

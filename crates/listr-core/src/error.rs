use std::time::Duration;

use crate::models::{ChannelId, MessageId};

/// Failures reported by a [`MessageStore`](crate::store::MessageStore).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Message not found")]
    NotFound,
    #[error("Missing permission for this operation")]
    Forbidden,
    #[error("Throttled by the transport, retry after {retry_after:?}")]
    Throttled { retry_after: Duration },
    #[error("Transport error: {0}")]
    Transport(String),
}

impl StoreError {
    /// Whether a later attempt of the same call can succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Throttled { .. })
    }
}

/// Errors raised by the item engine.
#[derive(Debug, thiserror::Error)]
pub enum ListrError {
    #[error("Message {0} is not an item")]
    NotAnItem(MessageId),
    #[error("Message {0} has no text to turn into an item")]
    EmptyContent(MessageId),
    #[error("Channel {0} does not support sending messages")]
    NotMessageable(ChannelId),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ListrError>;

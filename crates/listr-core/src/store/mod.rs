//! The message store capability consumed by the engine.
//!
//! A store wraps whatever transport hosts the channels. The engine never
//! caches channel order: every scan goes back through [`history`].

pub mod memory;
pub mod retry;

use std::collections::VecDeque;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};

use crate::constants::HISTORY_PAGE_SIZE;
use crate::error::StoreError;
use crate::models::{ChannelId, Message, MessageId, UserId, VisualForm};

pub use memory::{MemoryStore, StoreOp};
pub use retry::{RetryPolicy, RetryingStore};

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HistoryOrder {
    OldestFirst,
    NewestFirst,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// The user the engine posts as
    fn current_user(&self) -> UserId;

    /// Whether the channel supports sending and reading history
    fn supports_messages(&self, channel: ChannelId) -> bool;

    async fn send(&self, channel: ChannelId, form: VisualForm) -> StoreResult<Message>;

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        form: VisualForm,
    ) -> StoreResult<Message>;

    async fn delete(&self, channel: ChannelId, message: MessageId) -> StoreResult<()>;

    async fn fetch(&self, channel: ChannelId, message: MessageId) -> StoreResult<Message>;

    /// One page of history strictly past `cursor` in the given order.
    ///
    /// Returns fewer than `limit` messages only when the log is exhausted.
    async fn history_page(
        &self,
        channel: ChannelId,
        order: HistoryOrder,
        cursor: Option<MessageId>,
        limit: usize,
    ) -> StoreResult<Vec<Message>>;
}

/// Shared stores: lets a test harness keep a handle on the store it hands to
/// the engine.
#[async_trait]
impl<S: MessageStore + ?Sized> MessageStore for Arc<S> {
    fn current_user(&self) -> UserId {
        (**self).current_user()
    }

    fn supports_messages(&self, channel: ChannelId) -> bool {
        (**self).supports_messages(channel)
    }

    async fn send(&self, channel: ChannelId, form: VisualForm) -> StoreResult<Message> {
        (**self).send(channel, form).await
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        form: VisualForm,
    ) -> StoreResult<Message> {
        (**self).edit(channel, message, form).await
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> StoreResult<()> {
        (**self).delete(channel, message).await
    }

    async fn fetch(&self, channel: ChannelId, message: MessageId) -> StoreResult<Message> {
        (**self).fetch(channel, message).await
    }

    async fn history_page(
        &self,
        channel: ChannelId,
        order: HistoryOrder,
        cursor: Option<MessageId>,
        limit: usize,
    ) -> StoreResult<Vec<Message>> {
        (**self).history_page(channel, order, cursor, limit).await
    }
}

struct Pager {
    cursor: Option<MessageId>,
    buffer: VecDeque<Message>,
    remaining: Option<usize>,
    exhausted: bool,
}

/// Lazy walk over a channel's history, fetched one page at a time.
///
/// The stream is finite and ends after the first error. Calling this again
/// starts a fresh walk over the live log.
pub fn history<'a>(
    store: &'a dyn MessageStore,
    channel: ChannelId,
    order: HistoryOrder,
    limit: Option<usize>,
) -> BoxStream<'a, StoreResult<Message>> {
    let pager = Pager {
        cursor: None,
        buffer: VecDeque::new(),
        remaining: limit,
        exhausted: false,
    };

    stream::unfold(pager, move |mut pager| async move {
        loop {
            if pager.remaining == Some(0) {
                return None;
            }
            if let Some(message) = pager.buffer.pop_front() {
                pager.remaining = pager.remaining.map(|r| r - 1);
                return Some((Ok(message), pager));
            }
            if pager.exhausted {
                return None;
            }

            let page_size = pager
                .remaining
                .map_or(HISTORY_PAGE_SIZE, |r| r.min(HISTORY_PAGE_SIZE));
            match store.history_page(channel, order, pager.cursor, page_size).await {
                Ok(page) => {
                    pager.exhausted = page.len() < page_size;
                    if let Some(last) = page.last() {
                        pager.cursor = Some(last.id);
                    }
                    pager.buffer.extend(page);
                }
                Err(e) => {
                    pager.exhausted = true;
                    return Some((Err(e), pager));
                }
            }
        }
    })
    .boxed()
}

/// Read the whole channel into memory.
pub async fn collect_history(
    store: &dyn MessageStore,
    channel: ChannelId,
    order: HistoryOrder,
) -> StoreResult<Vec<Message>> {
    history(store, channel, order, None).try_collect().await
}

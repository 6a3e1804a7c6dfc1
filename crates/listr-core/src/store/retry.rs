use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::{HistoryOrder, MessageStore, StoreResult};
use crate::constants::{
    DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_BASE_DELAY_MS, DEFAULT_RETRY_MAX_DELAY_MS,
};
use crate::error::StoreError;
use crate::models::{ChannelId, Message, MessageId, UserId, VisualForm};

/// Bounded exponential backoff for throttled store calls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryPolicy {
    /// Total attempts including the first one
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_RETRY_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `attempt` (1-based), never shorter than the
    /// transport's own `retry_after` hint.
    pub fn delay_for(&self, attempt: u32, retry_after: Duration) -> Duration {
        let exp = self
            .base_delay_ms
            .saturating_mul(1u64 << attempt.saturating_sub(1).min(20));
        let backoff = Duration::from_millis(exp.min(self.max_delay_ms));
        backoff.max(retry_after)
    }

    pub async fn run<T, F, Fut>(&self, op_name: &str, mut call: F) -> StoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 1;
        loop {
            match call().await {
                Err(StoreError::Throttled { retry_after })
                    if attempt < self.max_attempts =>
                {
                    let delay = self.delay_for(attempt, retry_after);
                    warn!(op = op_name, attempt, ?delay, "Store call throttled, backing off");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                result => return result,
            }
        }
    }
}

/// Store decorator that retries throttled calls.
///
/// `NotFound`, `Forbidden` and transport errors are returned immediately.
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: MessageStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: MessageStore> MessageStore for RetryingStore<S> {
    fn current_user(&self) -> UserId {
        self.inner.current_user()
    }

    fn supports_messages(&self, channel: ChannelId) -> bool {
        self.inner.supports_messages(channel)
    }

    async fn send(&self, channel: ChannelId, form: VisualForm) -> StoreResult<Message> {
        self.policy
            .run("send", || self.inner.send(channel, form.clone()))
            .await
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        form: VisualForm,
    ) -> StoreResult<Message> {
        self.policy
            .run("edit", || self.inner.edit(channel, message, form.clone()))
            .await
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> StoreResult<()> {
        self.policy
            .run("delete", || self.inner.delete(channel, message))
            .await
    }

    async fn fetch(&self, channel: ChannelId, message: MessageId) -> StoreResult<Message> {
        self.policy
            .run("fetch", || self.inner.fetch(channel, message))
            .await
    }

    async fn history_page(
        &self,
        channel: ChannelId,
        order: HistoryOrder,
        cursor: Option<MessageId>,
        limit: usize,
    ) -> StoreResult<Vec<Message>> {
        self.policy
            .run("history", || {
                self.inner.history_page(channel, order, cursor, limit)
            })
            .await
    }
}

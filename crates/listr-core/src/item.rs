//! A list entry bound to one chat message.
//!
//! Items are never mutated in place: every setter persists a new rendering
//! through the store and returns the item bound to the resulting message.
//! With [`MutationMode::Edit`] the message id is preserved, with
//! [`MutationMode::Recreate`] the old message is deleted and a new one is
//! appended, so callers must re-resolve any handle they kept.

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::error::{ListrError, Result, StoreError};
use crate::format::{self, DoneState, ItemParts};
use crate::models::{ChannelId, Colour, Controls, EmojiId, Message, MessageId};
use crate::store::{MessageStore, StoreResult};

/// How a mutation is persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationMode {
    /// Edit the backing message; identity preserved
    Edit,
    /// Delete the backing message and append a new one; identity replaced
    Recreate,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Item {
    message: Message,
    parts: ItemParts,
}

impl Item {
    /// True iff the message carries a visual form with a non-empty body.
    pub fn is_item(message: &Message) -> bool {
        message
            .form
            .as_ref()
            .is_some_and(|form| !form.body.trim().is_empty())
    }

    pub fn try_from_message(message: Message) -> Result<Self> {
        let mut parts = match message.form.as_ref() {
            Some(form) if Self::is_item(&message) => format::parse(form),
            _ => return Err(ListrError::NotAnItem(message.id)),
        };
        parts.timestamp = parts.timestamp.or(Some(message.created_at));
        Ok(Self { message, parts })
    }

    /// Create an item card from any message.
    ///
    /// Existing items keep their content, icon, timestamp and done state;
    /// plain messages contribute their text, author avatar and creation time.
    /// The new card is sent while the source is deleted (when requested).
    pub async fn from_message(
        store: &dyn MessageStore,
        message: &Message,
        controls: &Controls,
        delete_source: bool,
    ) -> Result<Self> {
        let channel = message.channel_id;
        if !store.supports_messages(channel) {
            return Err(ListrError::NotMessageable(channel));
        }

        let parts = if Self::is_item(message) {
            Self::try_from_message(message.clone())?.parts
        } else {
            let content = format::strip_strike(&message.content);
            if content.trim().is_empty() {
                return Err(ListrError::EmptyContent(message.id));
            }
            ItemParts {
                content,
                icon_url: message.author.avatar_url.clone(),
                timestamp: Some(message.created_at),
                done: DoneState::Open,
            }
        };

        let form = format::render(&parts, controls);
        let sent = if delete_source {
            let (sent, ()) = tokio::try_join!(
                store.send(channel, form),
                delete_if_present(store, channel, message.id)
            )?;
            sent
        } else {
            store.send(channel, form).await?
        };

        debug!(source = %message.id, item = %sent.id, delete_source, "Created item");
        Self::try_from_message(sent)
    }

    pub fn message(&self) -> &Message {
        &self.message
    }

    pub fn into_message(self) -> Message {
        self.message
    }

    pub fn id(&self) -> MessageId {
        self.message.id
    }

    pub fn channel_id(&self) -> ChannelId {
        self.message.channel_id
    }

    pub fn parts(&self) -> &ItemParts {
        &self.parts
    }

    pub fn content(&self) -> &str {
        &self.parts.content
    }

    /// Duplicate and sort key
    pub fn clean_content(&self) -> String {
        format::normalize(&self.parts.content)
    }

    pub fn icon_url(&self) -> Option<&str> {
        self.parts.icon_url.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.parts.timestamp.unwrap_or(self.message.created_at)
    }

    pub fn done_state(&self) -> DoneState {
        self.parts.done
    }

    pub fn is_struck(&self) -> bool {
        self.parts.done == DoneState::Struck
    }

    pub fn controls(&self) -> Controls {
        self.message
            .form
            .as_ref()
            .map(|f| f.controls.clone())
            .unwrap_or_default()
    }

    pub async fn set_content(
        self,
        store: &dyn MessageStore,
        content: impl Into<String>,
        mode: MutationMode,
    ) -> Result<Self> {
        let content: String = content.into();
        let mut parts = self.parts.clone();
        parts.content = format::strip_strike(&content);
        self.persist(store, parts, mode).await
    }

    pub async fn set_done_state(
        self,
        store: &dyn MessageStore,
        done: DoneState,
        mode: MutationMode,
    ) -> Result<Self> {
        let mut parts = self.parts.clone();
        parts.done = done;
        self.persist(store, parts, mode).await
    }

    pub async fn set_timestamp(
        self,
        store: &dyn MessageStore,
        timestamp: DateTime<Utc>,
        mode: MutationMode,
    ) -> Result<Self> {
        let mut parts = self.parts.clone();
        parts.timestamp = Some(timestamp);
        self.persist(store, parts, mode).await
    }

    /// Strike or unstrike. Unstriking leaves a highlight untouched.
    pub async fn set_struck(
        self,
        store: &dyn MessageStore,
        struck: bool,
        mode: MutationMode,
    ) -> Result<Self> {
        let done = match (struck, self.parts.done) {
            (true, _) => DoneState::Struck,
            (false, DoneState::Struck) => DoneState::Open,
            (false, other) => other,
        };
        if done == self.parts.done {
            return Ok(self);
        }
        self.set_done_state(store, done, mode).await
    }

    /// Open items become done with `colour`; anything else goes back to open.
    pub async fn toggle_done_state(
        self,
        store: &dyn MessageStore,
        colour: Colour,
        mode: MutationMode,
    ) -> Result<Self> {
        let done = if self.parts.done.is_open() {
            DoneState::Done(colour)
        } else {
            DoneState::Open
        };
        self.set_done_state(store, done, mode).await
    }

    /// Parity policy: the item is struck iff the count of `emoji` is even.
    ///
    /// The bot's own control reaction keeps the resting count at 1, so every
    /// user add or remove flips the state. The item must wrap a freshly
    /// fetched message for the count to be current.
    pub async fn toggle_strike(self, store: &dyn MessageStore, emoji: &EmojiId) -> Result<Self> {
        let count = self.message.reaction_count(emoji);
        let struck = count % 2 == 0;
        debug!(item = %self.id(), count, struck, "Strike parity");
        self.set_struck(store, struck, MutationMode::Edit).await
    }

    async fn persist(
        self,
        store: &dyn MessageStore,
        parts: ItemParts,
        mode: MutationMode,
    ) -> Result<Self> {
        let form = format::render(&parts, &self.controls());
        let channel = self.channel_id();
        let message = match mode {
            MutationMode::Edit => store.edit(channel, self.id(), form).await?,
            MutationMode::Recreate => {
                let (sent, ()) = tokio::try_join!(
                    store.send(channel, form),
                    delete_if_present(store, channel, self.id())
                )?;
                sent
            }
        };
        Self::try_from_message(message)
    }
}

/// Delete a message, treating an already-missing message as success.
pub(crate) async fn delete_if_present(
    store: &dyn MessageStore,
    channel: ChannelId,
    message: MessageId,
) -> StoreResult<()> {
    match store.delete(channel, message).await {
        Err(StoreError::NotFound) => Ok(()),
        other => other,
    }
}

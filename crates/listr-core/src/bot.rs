//! Event dispatcher tying the engine together.
//!
//! `Listr` is what a transport adapter talks to: it receives created
//! messages, control interactions, reaction changes and commands, and turns
//! each into store calls. Handlers for one channel run one at a time when
//! `serializeChannels` is on.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::commands::{self, Command, CommandOutcome};
use crate::config::ListrConfig;
use crate::constants::NOTHING_TO_UNDO;
use crate::error::{ListrError, Result};
use crate::history::{self, HistoryStore, UndoOutcome};
use crate::item::{delete_if_present, Item};
use crate::lifecycle::{lifecycle_for, ItemAction, ItemLifecycle, ReactionKind};
use crate::models::{ChannelId, EmojiId, Message, MessageId, ReactionEmoji, UserId};
use crate::queue::ChannelQueue;
use crate::reconcile::delete_duplicates;
use crate::scan::ScanReport;
use crate::sort;
use crate::store::{MessageStore, RetryingStore};

/// A click on one of an item's controls.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteractionEvent {
    pub channel: ChannelId,
    pub message: MessageId,
    pub custom_id: String,
}

/// A reaction added to or removed from a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReactionEvent {
    pub channel: ChannelId,
    pub message: MessageId,
    pub user: UserId,
    pub emoji: ReactionEmoji,
    pub kind: ReactionKind,
}

#[derive(Debug)]
pub enum MessageOutcome {
    /// Own message, empty message or nothing to do
    Ignored,
    Itemized { item: Item, duplicates: ScanReport },
    Command(CommandOutcome),
}

#[derive(Debug)]
pub enum ActionOutcome {
    Ignored,
    Updated(Item),
    Deleted(MessageId),
}

pub struct Listr {
    store: Arc<dyn MessageStore>,
    config: ListrConfig,
    lifecycle: Box<dyn ItemLifecycle>,
    history: HistoryStore,
    queue: ChannelQueue,
}

impl Listr {
    pub fn new(store: Arc<dyn MessageStore>, config: ListrConfig) -> Self {
        let lifecycle = lifecycle_for(&config);
        let history = HistoryStore::new(config.history.clone());
        let queue = ChannelQueue::new(config.serialize_channels);
        info!(style = ?lifecycle.style(), serialize = config.serialize_channels, "Listr ready");
        Self {
            store,
            config,
            lifecycle,
            history,
            queue,
        }
    }

    /// Wrap `store` with throttle retries configured from `config.retry`.
    pub fn with_retries<S: MessageStore + 'static>(store: S, config: ListrConfig) -> Self {
        let retrying = RetryingStore::new(store, config.retry.clone());
        Self::new(Arc::new(retrying), config)
    }

    pub fn store(&self) -> &dyn MessageStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &ListrConfig {
        &self.config
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    /// A message was created in a channel.
    ///
    /// Command text is executed; any other user message becomes an item and
    /// older copies of the same item are removed.
    pub async fn on_message(
        &self,
        message: Message,
        cancel: &CancellationToken,
    ) -> Result<MessageOutcome> {
        if message.is_from(self.store.current_user()) {
            return Ok(MessageOutcome::Ignored);
        }

        let _turn = self.queue.acquire(message.channel_id).await;
        if let Some(command) = Command::parse(&message.content, &self.config.command_prefix) {
            delete_if_present(self.store(), message.channel_id, message.id).await?;
            let outcome = self.run_command_in_turn(message.channel_id, command, cancel).await;
            return Ok(MessageOutcome::Command(outcome));
        }

        let controls = self.lifecycle.controls();
        let item = match Item::from_message(self.store(), &message, &controls, true).await {
            Ok(item) => item,
            Err(ListrError::EmptyContent(id)) => {
                debug!(message = %id, "Ignoring message without text");
                return Ok(MessageOutcome::Ignored);
            }
            Err(e) => return Err(e),
        };
        let duplicates = delete_duplicates(self.store(), &item, cancel).await?;
        Ok(MessageOutcome::Itemized { item, duplicates })
    }

    pub async fn on_interaction(&self, event: &InteractionEvent) -> Result<ActionOutcome> {
        let Some(action) = self.lifecycle.interaction_action(&event.custom_id) else {
            debug!(custom_id = %event.custom_id, "Unknown control");
            return Ok(ActionOutcome::Ignored);
        };
        self.apply(event.channel, event.message, action).await
    }

    /// React to a reaction change. The event only says what changed; counts
    /// are read back from the live message.
    pub async fn on_reaction(&self, event: &ReactionEvent) -> Result<ActionOutcome> {
        if event.user == self.store.current_user() {
            return Ok(ActionOutcome::Ignored);
        }
        let emoji = EmojiId::from(&event.emoji);
        let Some(action) = self.lifecycle.reaction_action(&emoji, event.kind) else {
            return Ok(ActionOutcome::Ignored);
        };
        self.apply(event.channel, event.message, action).await
    }

    async fn apply(
        &self,
        channel: ChannelId,
        message: MessageId,
        action: ItemAction,
    ) -> Result<ActionOutcome> {
        let _turn = self.queue.acquire(channel).await;
        let live = self.store.fetch(channel, message).await?;
        if !live.is_from(self.store.current_user()) {
            return Ok(ActionOutcome::Ignored);
        }
        let item = Item::try_from_message(live)?;

        match action {
            ItemAction::Complete => {
                let item = self.lifecycle.complete(self.store(), item).await?;
                debug!(%channel, item = %item.id(), done = ?item.done_state(), "Completed item");
                Ok(ActionOutcome::Updated(item))
            }
            ItemAction::Delete => {
                self.store.delete(channel, item.id()).await?;
                self.history.record_deletion(channel, &item);
                info!(%channel, item = %item.id(), "Deleted item");
                Ok(ActionOutcome::Deleted(item.id()))
            }
        }
    }

    /// Run a command against a channel. Errors become a failure reply.
    pub async fn run_command(
        &self,
        channel: ChannelId,
        command: Command,
        cancel: &CancellationToken,
    ) -> CommandOutcome {
        let _turn = self.queue.acquire(channel).await;
        self.run_command_in_turn(channel, command, cancel).await
    }

    /// Caller must hold the channel's turn.
    async fn run_command_in_turn(
        &self,
        channel: ChannelId,
        command: Command,
        cancel: &CancellationToken,
    ) -> CommandOutcome {
        info!(%channel, command = command.name(), "Running command");
        match self.execute(channel, command, cancel).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(%channel, command = command.name(), error = %e, "Command failed");
                CommandOutcome::failure(command, &e)
            }
        }
    }

    async fn execute(
        &self,
        channel: ChannelId,
        command: Command,
        cancel: &CancellationToken,
    ) -> Result<CommandOutcome> {
        let store = self.store();
        let controls = self.lifecycle.controls();
        match command {
            Command::List => {
                let report = commands::list(store, channel, &controls, cancel).await?;
                Ok(CommandOutcome::scan("Listed", report))
            }
            Command::Sort { by } => {
                let report = sort::sort(store, channel, by, &controls, cancel).await?;
                Ok(CommandOutcome::scan("Sorted", report))
            }
            Command::Clear => {
                let report = commands::clear(store, &self.history, channel, cancel).await?;
                Ok(CommandOutcome::scan("Cleared", report))
            }
            Command::Undo => match history::undo(store, &self.history, channel, &controls).await? {
                UndoOutcome::Restored(item) => Ok(CommandOutcome::reply(format!(
                    "Restored \"{}\"",
                    item.content()
                ))),
                UndoOutcome::NothingToUndo => Ok(CommandOutcome::reply(NOTHING_TO_UNDO)),
            },
        }
    }
}

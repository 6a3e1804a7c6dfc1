//! In-process message store.
//!
//! Hosts channels in memory with the same observable behavior as a chat
//! transport: monotonically increasing ids, bot-added control reactions,
//! per-user reaction toggling. Backs the test-suite and the sandbox runner.

use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use super::{HistoryOrder, MessageStore, StoreResult};
use crate::error::StoreError;
use crate::models::{
    Author, ChannelId, Controls, EmojiId, Message, MessageId, Reaction, ReactionEmoji, UserId,
    VisualForm,
};

/// Store calls that can be made to fail on demand.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Send,
    Edit,
    Delete,
    Fetch,
    History,
}

#[derive(Default)]
struct ChannelLog {
    messageable: bool,
    messages: BTreeMap<MessageId, Message>,
    reactors: HashMap<(MessageId, EmojiId), (ReactionEmoji, HashSet<UserId>)>,
}

struct MemoryState {
    next_id: u64,
    last_created_at: DateTime<Utc>,
    channels: HashMap<ChannelId, ChannelLog>,
    mutations: usize,
    pending_failures: VecDeque<(StoreOp, StoreError)>,
    undeletable: HashSet<MessageId>,
}

pub struct MemoryStore {
    bot: Author,
    state: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_bot(Author {
            id: UserId(1),
            name: "listr".to_string(),
            avatar_url: None,
            bot: true,
        })
    }

    pub fn with_bot(bot: Author) -> Self {
        Self {
            bot,
            state: Mutex::new(MemoryState {
                next_id: 1000,
                last_created_at: DateTime::<Utc>::MIN_UTC,
                channels: HashMap::new(),
                mutations: 0,
                pending_failures: VecDeque::new(),
                undeletable: HashSet::new(),
            }),
        }
    }

    /// Register a channel that exists but cannot carry messages.
    pub fn add_unmessageable_channel(&self, channel: ChannelId) {
        let mut state = self.state.lock();
        state.channels.entry(channel).or_default().messageable = false;
    }

    /// Post a message as a regular user, bypassing the mutation counter.
    pub fn post_user_message(&self, channel: ChannelId, author: Author, content: &str) -> Message {
        let mut state = self.state.lock();
        let message = state.new_message(channel, author, content.to_string(), None);
        state
            .channel_mut(channel)
            .messages
            .insert(message.id, message.clone());
        message
    }

    /// Add or remove one user's reaction, returning the updated message.
    pub fn toggle_reaction(
        &self,
        channel: ChannelId,
        message: MessageId,
        user: UserId,
        emoji: ReactionEmoji,
        added: bool,
    ) -> StoreResult<Message> {
        let bot_id = self.bot.id;
        let mut state = self.state.lock();
        let log = state.channel_mut(channel);
        if !log.messages.contains_key(&message) {
            return Err(StoreError::NotFound);
        }

        let key = (message, EmojiId::from(&emoji));
        let entry = log
            .reactors
            .entry(key)
            .or_insert_with(|| (emoji, HashSet::new()));
        if added {
            entry.1.insert(user);
        } else {
            entry.1.remove(&user);
        }

        log.refresh_reactions(message, bot_id)
    }

    /// Make the next call of `op` fail with `error`.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.state.lock().pending_failures.push_back((op, error));
    }

    /// Make every delete of `message` fail with `Forbidden`.
    pub fn forbid_delete(&self, message: MessageId) {
        self.state.lock().undeletable.insert(message);
    }

    /// Number of successful send/edit/delete calls so far.
    pub fn mutation_count(&self) -> usize {
        self.state.lock().mutations
    }

    /// Snapshot of the channel, oldest first.
    pub fn messages(&self, channel: ChannelId) -> Vec<Message> {
        self.state
            .lock()
            .channels
            .get(&channel)
            .map(|log| log.messages.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Card bodies of the channel's messages in log order, skipping plain messages.
    pub fn bodies(&self, channel: ChannelId) -> Vec<String> {
        self.messages(channel)
            .into_iter()
            .filter_map(|m| m.form.map(|f| f.body))
            .collect()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryState {
    fn channel_mut(&mut self, channel: ChannelId) -> &mut ChannelLog {
        self.channels.entry(channel).or_insert_with(|| ChannelLog {
            messageable: true,
            ..Default::default()
        })
    }

    fn take_failure(&mut self, op: StoreOp) -> StoreResult<()> {
        if let Some(pos) = self.pending_failures.iter().position(|(o, _)| *o == op) {
            if let Some((_, error)) = self.pending_failures.remove(pos) {
                return Err(error);
            }
        }
        Ok(())
    }

    /// Strictly increasing creation times so ordering by time matches log order.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let next = if now > self.last_created_at {
            now
        } else {
            self.last_created_at + Duration::milliseconds(1)
        };
        self.last_created_at = next;
        next
    }

    fn new_message(
        &mut self,
        channel: ChannelId,
        author: Author,
        content: String,
        form: Option<VisualForm>,
    ) -> Message {
        self.next_id += 1;
        Message {
            id: MessageId(self.next_id),
            channel_id: channel,
            author,
            content,
            form,
            reactions: Vec::new(),
            created_at: self.tick(),
        }
    }
}

impl ChannelLog {
    fn refresh_reactions(&mut self, message: MessageId, bot: UserId) -> StoreResult<Message> {
        let mut reactions: Vec<Reaction> = self
            .reactors
            .iter()
            .filter(|((id, _), (_, users))| *id == message && !users.is_empty())
            .map(|(_, (emoji, users))| Reaction {
                emoji: emoji.clone(),
                count: users.len() as u32,
                me: users.contains(&bot),
            })
            .collect();
        reactions.sort_by(|a, b| a.id().as_str().cmp(b.id().as_str()));

        let entry = self.messages.get_mut(&message).ok_or(StoreError::NotFound)?;
        entry.reactions = reactions;
        Ok(entry.clone())
    }
}

#[async_trait]
impl MessageStore for MemoryStore {
    fn current_user(&self) -> UserId {
        self.bot.id
    }

    fn supports_messages(&self, channel: ChannelId) -> bool {
        self.state
            .lock()
            .channels
            .get(&channel)
            .map_or(true, |log| log.messageable)
    }

    async fn send(&self, channel: ChannelId, form: VisualForm) -> StoreResult<Message> {
        let bot = self.bot.clone();
        let mut state = self.state.lock();
        state.take_failure(StoreOp::Send)?;
        if !state.channel_mut(channel).messageable {
            return Err(StoreError::Forbidden);
        }

        let control_emoji = match &form.controls {
            Controls::Reactions { strike, delete } => vec![strike.clone(), delete.clone()],
            _ => Vec::new(),
        };
        let message = state.new_message(channel, bot.clone(), String::new(), Some(form));
        state.mutations += 1;

        let log = state.channel_mut(channel);
        log.messages.insert(message.id, message.clone());
        if control_emoji.is_empty() {
            return Ok(message);
        }
        for emoji in control_emoji {
            let raw = ReactionEmoji::Unicode(emoji.as_str().to_string());
            log.reactors
                .insert((message.id, emoji), (raw, HashSet::from([bot.id])));
        }
        log.refresh_reactions(message.id, bot.id)
    }

    async fn edit(
        &self,
        channel: ChannelId,
        message: MessageId,
        form: VisualForm,
    ) -> StoreResult<Message> {
        let bot_id = self.bot.id;
        let mut state = self.state.lock();
        state.take_failure(StoreOp::Edit)?;
        let log = state.channel_mut(channel);
        let entry = log.messages.get_mut(&message).ok_or(StoreError::NotFound)?;
        if entry.author.id != bot_id {
            return Err(StoreError::Forbidden);
        }
        entry.form = Some(form);
        let updated = entry.clone();
        state.mutations += 1;
        Ok(updated)
    }

    async fn delete(&self, channel: ChannelId, message: MessageId) -> StoreResult<()> {
        let mut state = self.state.lock();
        state.take_failure(StoreOp::Delete)?;
        if state.undeletable.contains(&message) {
            return Err(StoreError::Forbidden);
        }
        let log = state.channel_mut(channel);
        log.messages.remove(&message).ok_or(StoreError::NotFound)?;
        log.reactors.retain(|(id, _), _| *id != message);
        state.mutations += 1;
        Ok(())
    }

    async fn fetch(&self, channel: ChannelId, message: MessageId) -> StoreResult<Message> {
        let mut state = self.state.lock();
        state.take_failure(StoreOp::Fetch)?;
        state
            .channels
            .get(&channel)
            .and_then(|log| log.messages.get(&message))
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn history_page(
        &self,
        channel: ChannelId,
        order: HistoryOrder,
        cursor: Option<MessageId>,
        limit: usize,
    ) -> StoreResult<Vec<Message>> {
        let mut state = self.state.lock();
        state.take_failure(StoreOp::History)?;
        let Some(log) = state.channels.get(&channel) else {
            return Ok(Vec::new());
        };

        let page = match (order, cursor) {
            (HistoryOrder::OldestFirst, None) => {
                log.messages.values().take(limit).cloned().collect()
            }
            (HistoryOrder::OldestFirst, Some(after)) => log
                .messages
                .range(MessageId(after.0.saturating_add(1))..)
                .map(|(_, m)| m)
                .take(limit)
                .cloned()
                .collect(),
            (HistoryOrder::NewestFirst, None) => {
                log.messages.values().rev().take(limit).cloned().collect()
            }
            (HistoryOrder::NewestFirst, Some(before)) => log
                .messages
                .range(..before)
                .rev()
                .map(|(_, m)| m)
                .take(limit)
                .cloned()
                .collect(),
        };
        Ok(page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Author {
        Author {
            id: UserId(42),
            name: "alice".to_string(),
            avatar_url: Some("https://cdn.example/alice.png".to_string()),
            bot: false,
        }
    }

    fn card(controls: Controls) -> VisualForm {
        VisualForm {
            body: "buy milk".to_string(),
            icon_url: None,
            timestamp: None,
            colour: None,
            controls,
        }
    }

    #[tokio::test]
    async fn test_send_with_reaction_controls_adds_bot_reactions() {
        let store = MemoryStore::new();
        let controls = Controls::Reactions {
            strike: EmojiId::from("✅"),
            delete: EmojiId::from("🗑️"),
        };
        let sent = store.send(ChannelId(1), card(controls)).await.unwrap();

        assert_eq!(sent.reaction_count(&EmojiId::from("✅")), 1);
        assert_eq!(sent.reaction_count(&EmojiId::from("🗑️")), 1);
        assert!(sent.reactions.iter().all(|r| r.me));
    }

    #[tokio::test]
    async fn test_toggle_reaction_counts_distinct_users() {
        let store = MemoryStore::new();
        let channel = ChannelId(1);
        let posted = store.post_user_message(channel, alice(), "hi");
        let tick = ReactionEmoji::Unicode("✅".to_string());

        store
            .toggle_reaction(channel, posted.id, UserId(42), tick.clone(), true)
            .unwrap();
        let again = store
            .toggle_reaction(channel, posted.id, UserId(42), tick.clone(), true)
            .unwrap();
        assert_eq!(again.reaction_count(&EmojiId::from("✅")), 1);

        let removed = store
            .toggle_reaction(channel, posted.id, UserId(42), tick, false)
            .unwrap();
        assert!(removed.reactions.is_empty());
    }

    #[tokio::test]
    async fn test_edit_user_message_forbidden() {
        let store = MemoryStore::new();
        let channel = ChannelId(1);
        let posted = store.post_user_message(channel, alice(), "hi");
        let result = store.edit(channel, posted.id, card(Controls::None)).await;
        assert_eq!(result, Err(StoreError::Forbidden));
    }

    #[tokio::test]
    async fn test_unmessageable_channel() {
        let store = MemoryStore::new();
        store.add_unmessageable_channel(ChannelId(9));
        assert!(!store.supports_messages(ChannelId(9)));
        assert!(store.supports_messages(ChannelId(10)));
        assert_eq!(
            store.send(ChannelId(9), card(Controls::None)).await,
            Err(StoreError::Forbidden)
        );
    }

    #[tokio::test]
    async fn test_mutation_count_and_injected_failure() {
        let store = MemoryStore::new();
        let channel = ChannelId(1);
        store.fail_next(StoreOp::Send, StoreError::Transport("boom".to_string()));
        assert!(store.send(channel, card(Controls::None)).await.is_err());
        let sent = store.send(channel, card(Controls::None)).await.unwrap();
        store.delete(channel, sent.id).await.unwrap();
        assert_eq!(store.mutation_count(), 2);
        assert_eq!(store.delete(channel, sent.id).await, Err(StoreError::NotFound));
    }

    #[tokio::test]
    async fn test_creation_times_strictly_increase() {
        let store = MemoryStore::new();
        let channel = ChannelId(1);
        let a = store.post_user_message(channel, alice(), "a");
        let b = store.post_user_message(channel, alice(), "b");
        assert!(b.created_at > a.created_at);
        assert!(b.id > a.id);
    }
}

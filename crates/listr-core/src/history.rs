//! Per-channel undo history.
//!
//! Holds the items removed by explicit delete and clear actions, most recent
//! last. Duplicate removal and sort recreation never record here. Entries live
//! for the process lifetime unless the policy caps them.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info};

use crate::error::{ListrError, Result};
use crate::item::Item;
use crate::models::{ChannelId, Controls, Message};
use crate::store::MessageStore;

/// Capacity and expiry for each channel's stack. `None` means unbounded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HistoryPolicy {
    pub capacity: Option<usize>,
    pub ttl_secs: Option<u64>,
}

impl HistoryPolicy {
    fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }
}

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub message: Message,
    pub removed_at: Instant,
}

#[derive(Debug)]
pub enum UndoOutcome {
    Restored(Item),
    NothingToUndo,
}

pub struct HistoryStore {
    policy: HistoryPolicy,
    stacks: Mutex<HashMap<ChannelId, VecDeque<HistoryEntry>>>,
}

impl HistoryStore {
    pub fn new(policy: HistoryPolicy) -> Self {
        Self {
            policy,
            stacks: Mutex::new(HashMap::new()),
        }
    }

    pub fn policy(&self) -> &HistoryPolicy {
        &self.policy
    }

    pub fn record_deletion(&self, channel: ChannelId, item: &Item) {
        let mut stacks = self.stacks.lock();
        let stack = stacks.entry(channel).or_default();
        stack.push_back(HistoryEntry {
            message: item.message().clone(),
            removed_at: Instant::now(),
        });

        if let Some(capacity) = self.policy.capacity {
            while stack.len() > capacity {
                stack.pop_front();
            }
        }
        debug!(%channel, item = %item.id(), depth = stack.len(), "Recorded deletion");
    }

    /// Most recent live entry for the channel, dropping expired ones.
    pub fn pop(&self, channel: ChannelId) -> Option<Message> {
        self.pop_entry(channel).map(|e| e.message)
    }

    fn pop_entry(&self, channel: ChannelId) -> Option<HistoryEntry> {
        let mut stacks = self.stacks.lock();
        let stack = stacks.get_mut(&channel)?;
        self.prune(stack);
        let entry = stack.pop_back();
        if stack.is_empty() {
            stacks.remove(&channel);
        }
        entry
    }

    /// Put a popped entry back on top of the channel's stack.
    fn restore(&self, channel: ChannelId, entry: HistoryEntry) {
        debug!(%channel, item = %entry.message.id, "Restored history entry");
        self.stacks
            .lock()
            .entry(channel)
            .or_default()
            .push_back(entry);
    }

    pub fn len(&self, channel: ChannelId) -> usize {
        let mut stacks = self.stacks.lock();
        match stacks.get_mut(&channel) {
            Some(stack) => {
                self.prune(stack);
                stack.len()
            }
            None => 0,
        }
    }

    pub fn is_empty(&self, channel: ChannelId) -> bool {
        self.len(channel) == 0
    }

    fn prune(&self, stack: &mut VecDeque<HistoryEntry>) {
        if let Some(ttl) = self.policy.ttl() {
            stack.retain(|entry| entry.removed_at.elapsed() < ttl);
        }
    }
}

/// Restore the most recently deleted item of the channel as a new message.
///
/// With nothing recorded the channel is left untouched. If the item cannot
/// be sent the entry stays in history.
pub async fn undo(
    store: &dyn MessageStore,
    history: &HistoryStore,
    channel: ChannelId,
    controls: &Controls,
) -> Result<UndoOutcome> {
    if !store.supports_messages(channel) {
        return Err(ListrError::NotMessageable(channel));
    }
    let Some(entry) = history.pop_entry(channel) else {
        return Ok(UndoOutcome::NothingToUndo);
    };

    match Item::from_message(store, &entry.message, controls, false).await {
        Ok(item) => {
            info!(%channel, restored = %item.id(), "Undid deletion");
            Ok(UndoOutcome::Restored(item))
        }
        Err(e) => {
            history.restore(channel, entry);
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::{MemoryStore, StoreOp};
    use crate::test_support::{buttons, seed_item, CHANNEL};

    #[tokio::test]
    async fn test_undo_restores_deleted_item() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy::default());
        let item = seed_item(&store, "buy milk").await;
        store.delete(CHANNEL, item.id()).await.unwrap();
        history.record_deletion(CHANNEL, &item);

        let outcome = undo(&store, &history, CHANNEL, &buttons()).await.unwrap();

        let UndoOutcome::Restored(restored) = outcome else {
            panic!("expected a restored item");
        };
        assert_eq!(restored.content(), "buy milk");
        assert_ne!(restored.id(), item.id());
        assert_eq!(restored.timestamp(), item.timestamp());
        assert!(history.is_empty(CHANNEL));
    }

    #[tokio::test]
    async fn test_undo_empty_history_touches_nothing() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy::default());
        seed_item(&store, "buy milk").await;
        let before = store.mutation_count();

        let outcome = undo(&store, &history, CHANNEL, &buttons()).await.unwrap();

        assert!(matches!(outcome, UndoOutcome::NothingToUndo));
        assert_eq!(store.mutation_count(), before);
    }

    #[tokio::test]
    async fn test_undo_is_lifo_per_channel() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy::default());
        let first = seed_item(&store, "first").await;
        let second = seed_item(&store, "second").await;
        history.record_deletion(CHANNEL, &first);
        history.record_deletion(CHANNEL, &second);
        history.record_deletion(crate::models::ChannelId(999), &first);

        assert_eq!(history.pop(CHANNEL).map(|m| m.id), Some(second.id()));
        assert_eq!(history.pop(CHANNEL).map(|m| m.id), Some(first.id()));
        assert!(history.pop(CHANNEL).is_none());
        assert_eq!(history.len(crate::models::ChannelId(999)), 1);
    }

    #[tokio::test]
    async fn test_capacity_evicts_oldest() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy {
            capacity: Some(2),
            ttl_secs: None,
        });
        for content in ["a", "b", "c"] {
            let item = seed_item(&store, content).await;
            history.record_deletion(CHANNEL, &item);
        }

        assert_eq!(history.len(CHANNEL), 2);
        let bodies: Vec<_> = std::iter::from_fn(|| history.pop(CHANNEL))
            .map(|m| m.form.unwrap().body)
            .collect();
        assert_eq!(bodies, vec!["c", "b"]);
    }

    #[tokio::test]
    async fn test_failed_undo_keeps_entry() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy::default());
        let item = seed_item(&store, "buy milk").await;
        store.delete(CHANNEL, item.id()).await.unwrap();
        history.record_deletion(CHANNEL, &item);
        store.fail_next(StoreOp::Send, StoreError::Transport("boom".to_string()));

        let failed = undo(&store, &history, CHANNEL, &buttons()).await;
        assert!(matches!(failed, Err(ListrError::Store(StoreError::Transport(_)))));
        assert_eq!(history.len(CHANNEL), 1);

        let retried = undo(&store, &history, CHANNEL, &buttons()).await.unwrap();
        assert!(matches!(retried, UndoOutcome::Restored(_)));
        assert_eq!(store.bodies(CHANNEL), vec!["buy milk"]);
        assert!(history.is_empty(CHANNEL));
    }

    #[tokio::test]
    async fn test_undo_in_unmessageable_channel() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy::default());
        let item = seed_item(&store, "buy milk").await;
        history.record_deletion(CHANNEL, &item);
        store.add_unmessageable_channel(CHANNEL);

        let result = undo(&store, &history, CHANNEL, &buttons()).await;
        assert!(matches!(result, Err(ListrError::NotMessageable(c)) if c == CHANNEL));
        assert_eq!(history.len(CHANNEL), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ttl_expires_entries() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy {
            capacity: None,
            ttl_secs: Some(60),
        });
        let stale = seed_item(&store, "stale").await;
        history.record_deletion(CHANNEL, &stale);
        tokio::time::advance(Duration::from_secs(61)).await;
        let fresh = seed_item(&store, "fresh").await;
        history.record_deletion(CHANNEL, &fresh);

        assert_eq!(history.len(CHANNEL), 1);
        assert_eq!(history.pop(CHANNEL).map(|m| m.id), Some(fresh.id()));
        assert!(history.pop(CHANNEL).is_none());
    }
}

//! Channel-wide commands: list, sort, clear and undo.

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ListrError, Result, StoreError};
use crate::history::HistoryStore;
use crate::item::Item;
use crate::models::{ChannelId, Controls};
use crate::scan::{ensure_active, ScanReport};
use crate::sort::SortBy;
use crate::store::{collect_history, HistoryOrder, MessageStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum Command {
    /// Turn every plain user message into an item
    List,
    Sort { by: SortBy },
    /// Remove every item that is not open
    Clear,
    Undo,
}

impl Command {
    /// Parse `"<prefix>sort newest"` style text. `None` for anything else.
    pub fn parse(text: &str, prefix: &str) -> Option<Self> {
        let rest = text.trim().strip_prefix(prefix)?;
        let mut words = rest.split_whitespace();
        let command = match words.next()?.to_lowercase().as_str() {
            "list" => Self::List,
            "clear" => Self::Clear,
            "undo" => Self::Undo,
            "sort" => {
                let by = match words.next() {
                    Some(arg) => SortBy::parse(arg)?,
                    None => SortBy::Alphabetical,
                };
                Self::Sort { by }
            }
            _ => return None,
        };
        Some(command)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::List => "list",
            Self::Sort { .. } => "sort",
            Self::Clear => "clear",
            Self::Undo => "undo",
        }
    }
}

/// What the invoking user is told once a command finishes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub reply: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ScanReport>,
}

impl CommandOutcome {
    pub fn reply(reply: impl Into<String>) -> Self {
        Self {
            success: true,
            reply: reply.into(),
            report: None,
        }
    }

    pub fn scan(verb: &str, report: ScanReport) -> Self {
        Self {
            success: true,
            reply: report.summary(verb),
            report: Some(report),
        }
    }

    pub fn failure(command: Command, error: &ListrError) -> Self {
        Self {
            success: false,
            reply: format!("Failed to {}: {}", command.name(), error),
            report: None,
        }
    }
}

/// Convert every plain, non-bot message of the channel into an item.
///
/// Messages with no text are skipped silently.
pub async fn list(
    store: &dyn MessageStore,
    channel: ChannelId,
    controls: &Controls,
    cancel: &CancellationToken,
) -> Result<ScanReport> {
    if !store.supports_messages(channel) {
        return Err(ListrError::NotMessageable(channel));
    }
    let messages = collect_history(store, channel, HistoryOrder::OldestFirst).await?;
    let mut report = ScanReport {
        scanned: messages.len(),
        ..Default::default()
    };

    let bot = store.current_user();
    for message in messages {
        if Item::is_item(&message) || message.author.bot || message.is_from(bot) {
            continue;
        }
        ensure_active(cancel)?;
        match Item::from_message(store, &message, controls, true).await {
            Ok(_) => report.changed += 1,
            Err(ListrError::EmptyContent(id)) => debug!(message = %id, "Nothing to list"),
            Err(e) => report.record_failure(message.id, &e),
        }
    }

    info!(%channel, listed = report.changed, failed = report.failed.len(), "Listed channel");
    Ok(report)
}

/// Delete every bot-authored item whose done state is not open, newest first.
///
/// Each removed item is recorded so `undo` can bring it back.
pub async fn clear(
    store: &dyn MessageStore,
    history: &HistoryStore,
    channel: ChannelId,
    cancel: &CancellationToken,
) -> Result<ScanReport> {
    if !store.supports_messages(channel) {
        return Err(ListrError::NotMessageable(channel));
    }
    let messages = collect_history(store, channel, HistoryOrder::NewestFirst).await?;
    let mut report = ScanReport {
        scanned: messages.len(),
        ..Default::default()
    };

    let bot = store.current_user();
    for message in messages {
        if !message.is_from(bot) {
            continue;
        }
        let Ok(item) = Item::try_from_message(message) else {
            continue;
        };
        if item.done_state().is_open() {
            continue;
        }

        ensure_active(cancel)?;
        match store.delete(channel, item.id()).await {
            Ok(()) => {
                history.record_deletion(channel, &item);
                report.changed += 1;
            }
            Err(StoreError::NotFound) => debug!(item = %item.id(), "Cleared item already gone"),
            Err(e) => report.record_failure(item.id(), &ListrError::from(e)),
        }
    }

    info!(%channel, cleared = report.changed, failed = report.failed.len(), "Cleared done items");
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::DoneState;
    use crate::history::{undo, HistoryPolicy, UndoOutcome};
    use crate::item::MutationMode;
    use crate::models::{Author, Colour, UserId};
    use crate::store::MemoryStore;
    use crate::test_support::{alice, buttons, seed_item, CHANNEL};

    #[test]
    fn test_parse_command() {
        assert_eq!(Command::parse("!list", "!"), Some(Command::List));
        assert_eq!(Command::parse("  !UNDO ", "!"), Some(Command::Undo));
        assert_eq!(
            Command::parse("!sort", "!"),
            Some(Command::Sort {
                by: SortBy::Alphabetical
            })
        );
        assert_eq!(
            Command::parse("!sort newest_first", "!"),
            Some(Command::Sort {
                by: SortBy::NewestFirst
            })
        );
        assert_eq!(Command::parse("!sort sideways", "!"), None);
        assert_eq!(Command::parse("list", "!"), None);
        assert_eq!(Command::parse("!dance", "!"), None);
    }

    #[test]
    fn test_command_json_shape() {
        let json = serde_json::to_value(Command::Sort {
            by: SortBy::NewestFirst,
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"name": "sort", "by": "newest_first"}));
        let parsed: Command = serde_json::from_str(r#"{"name":"clear"}"#).unwrap();
        assert_eq!(parsed, Command::Clear);
    }

    #[tokio::test]
    async fn test_list_itemizes_plain_messages() {
        let store = MemoryStore::new();
        store.post_user_message(CHANNEL, alice(), "eggs");
        store.post_user_message(CHANNEL, alice(), "   ");
        let other_bot = Author {
            id: UserId(77),
            name: "otherbot".to_string(),
            avatar_url: None,
            bot: true,
        };
        store.post_user_message(CHANNEL, other_bot, "beep");
        seed_item(&store, "milk").await;
        store.post_user_message(CHANNEL, alice(), "bread");

        let report = list(&store, CHANNEL, &buttons(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.changed, 2);
        assert!(report.is_clean());
        assert_eq!(store.bodies(CHANNEL), vec!["milk", "eggs", "bread"]);
        // the blank message and the other bot's message are untouched
        assert_eq!(store.messages(CHANNEL).len(), 5);
    }

    #[tokio::test]
    async fn test_clear_removes_done_items_into_history() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy::default());
        seed_item(&store, "open").await;
        let done = seed_item(&store, "done").await;
        done.set_done_state(&store, DoneState::Done(Colour(0xff0000)), MutationMode::Edit)
            .await
            .unwrap();
        let struck = seed_item(&store, "struck").await;
        struck
            .set_struck(&store, true, MutationMode::Edit)
            .await
            .unwrap();

        let report = clear(&store, &history, CHANNEL, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.changed, 2);
        assert_eq!(store.bodies(CHANNEL), vec!["open"]);
        assert_eq!(history.len(CHANNEL), 2);

        // newest-first scan: "struck" was removed first, so "done" comes back first
        let UndoOutcome::Restored(restored) = undo(&store, &history, CHANNEL, &buttons())
            .await
            .unwrap()
        else {
            panic!("expected a restored item");
        };
        assert_eq!(restored.content(), "done");
        assert_eq!(restored.done_state(), DoneState::Done(Colour(0xff0000)));
    }

    #[tokio::test]
    async fn test_clear_isolates_failures() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy::default());
        let stuck = seed_item(&store, "stuck")
            .await
            .set_struck(&store, true, MutationMode::Edit)
            .await
            .unwrap();
        seed_item(&store, "gone")
            .await
            .set_struck(&store, true, MutationMode::Edit)
            .await
            .unwrap();
        store.forbid_delete(stuck.id());

        let report = clear(&store, &history, CHANNEL, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, stuck.id());
        assert_eq!(history.len(CHANNEL), 1);
    }

    #[tokio::test]
    async fn test_clear_ignores_user_messages() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy::default());
        store.post_user_message(CHANNEL, alice(), "~~not mine~~");

        let report = clear(&store, &history, CHANNEL, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(report.changed, 0);
        assert_eq!(store.messages(CHANNEL).len(), 1);
    }

    #[tokio::test]
    async fn test_list_in_unmessageable_channel() {
        let store = MemoryStore::new();
        store.add_unmessageable_channel(CHANNEL);
        let result = list(&store, CHANNEL, &buttons(), &CancellationToken::new()).await;
        assert!(matches!(result, Err(ListrError::NotMessageable(c)) if c == CHANNEL));
    }

    #[tokio::test]
    async fn test_clear_in_unmessageable_channel() {
        let store = MemoryStore::new();
        let history = HistoryStore::new(HistoryPolicy::default());
        seed_item(&store, "done")
            .await
            .set_struck(&store, true, MutationMode::Edit)
            .await
            .unwrap();
        store.add_unmessageable_channel(CHANNEL);

        let result = clear(&store, &history, CHANNEL, &CancellationToken::new()).await;
        assert!(matches!(result, Err(ListrError::NotMessageable(c)) if c == CHANNEL));
        assert_eq!(store.bodies(CHANNEL), vec!["~~done~~"]);
        assert!(history.is_empty(CHANNEL));
    }

    #[test]
    fn test_failure_outcome() {
        let outcome = CommandOutcome::failure(Command::Clear, &ListrError::Cancelled);
        assert!(!outcome.success);
        assert_eq!(outcome.reply, "Failed to clear: Operation cancelled");
    }
}

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::emoji::{EmojiId, Reaction};

macro_rules! snowflake {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

snowflake!(
    /// Identifier of a channel (an append-only message log)
    ChannelId
);
snowflake!(
    /// Identifier of a single message within the transport
    MessageId
);
snowflake!(UserId);

/// Highlight colour of an item card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Colour(pub u32);

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:06x}", self.0 & 0xff_ffff)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub bot: bool,
}

/// Interactive controls rendered alongside an item card.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Controls {
    #[default]
    None,
    /// Two buttons carrying the `done` and `delete` action ids
    Buttons {
        done_label: String,
        delete_label: String,
    },
    /// Reactions pre-added by the bot; users toggle them to act on the item
    Reactions { strike: EmojiId, delete: EmojiId },
}

/// The structured visual form of a message (the rendered card).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualForm {
    pub body: String,
    #[serde(default)]
    pub icon_url: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub colour: Option<Colour>,
    #[serde(default)]
    pub controls: Controls,
}

/// Handle to a chat message as last read from the store.
///
/// This is a snapshot: the live message may have been edited or deleted since.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel_id: ChannelId,
    pub author: Author,
    /// Raw text content, empty for pure card messages
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub form: Option<VisualForm>,
    #[serde(default)]
    pub reactions: Vec<Reaction>,
    pub created_at: DateTime<Utc>,
}

impl Message {
    /// Count of the given reaction on this snapshot, 0 when absent.
    pub fn reaction_count(&self, emoji: &EmojiId) -> u32 {
        self.reactions
            .iter()
            .find(|r| &r.id() == emoji)
            .map(|r| r.count)
            .unwrap_or(0)
    }

    pub fn is_from(&self, user: UserId) -> bool {
        self.author.id == user
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ReactionEmoji;

    fn message_with(reactions: Vec<Reaction>) -> Message {
        Message {
            id: MessageId(1),
            channel_id: ChannelId(10),
            author: Author {
                id: UserId(5),
                name: "alice".to_string(),
                avatar_url: None,
                bot: false,
            },
            content: "hello".to_string(),
            form: None,
            reactions,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_reaction_count_matches_custom_by_name() {
        let message = message_with(vec![Reaction {
            emoji: ReactionEmoji::Custom {
                id: 3,
                name: "tick".to_string(),
            },
            count: 2,
            me: true,
        }]);
        assert_eq!(message.reaction_count(&EmojiId::from("tick")), 2);
        assert_eq!(message.reaction_count(&EmojiId::from("bin")), 0);
    }

    #[test]
    fn test_colour_display() {
        assert_eq!(Colour(0x2ecc71).to_string(), "#2ecc71");
        assert_eq!(Colour(0xff).to_string(), "#0000ff");
    }
}

use std::fmt;

use serde::{Deserialize, Serialize};

/// Emoji as delivered by the transport on a reaction.
///
/// Unicode emoji arrive as plain strings, custom emoji as an id/name pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ReactionEmoji {
    Unicode(String),
    Custom { id: u64, name: String },
}

/// Normalized emoji identifier used for every comparison.
///
/// Custom emoji collapse to their name so a configured `"check"` matches both
/// `Custom { name: "check", .. }` and a plain `"check"` string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EmojiId(String);

impl EmojiId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into().trim().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&ReactionEmoji> for EmojiId {
    fn from(emoji: &ReactionEmoji) -> Self {
        match emoji {
            ReactionEmoji::Unicode(s) => EmojiId::new(s.as_str()),
            ReactionEmoji::Custom { name, .. } => EmojiId::new(name.as_str()),
        }
    }
}

impl From<&str> for EmojiId {
    fn from(name: &str) -> Self {
        EmojiId::new(name)
    }
}

impl fmt::Display for EmojiId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Aggregated reaction on a message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: ReactionEmoji,
    pub count: u32,
    /// Whether the bot itself is one of the reactors
    #[serde(default)]
    pub me: bool,
}

impl Reaction {
    pub fn id(&self) -> EmojiId {
        EmojiId::from(&self.emoji)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_custom_emoji_normalizes_to_name() {
        let custom = ReactionEmoji::Custom {
            id: 991,
            name: "check".to_string(),
        };
        assert_eq!(EmojiId::from(&custom), EmojiId::from("check"));
    }

    #[test]
    fn test_unicode_emoji_trimmed() {
        let raw = ReactionEmoji::Unicode(" ✅".to_string());
        assert_eq!(EmojiId::from(&raw).as_str(), "✅");
    }

    #[test]
    fn test_untagged_deserialize() {
        let unicode: ReactionEmoji = serde_json::from_str(r#""🗑️""#).unwrap();
        assert_eq!(unicode, ReactionEmoji::Unicode("🗑️".to_string()));

        let custom: ReactionEmoji = serde_json::from_str(r#"{"id": 7, "name": "bin"}"#).unwrap();
        assert_eq!(EmojiId::from(&custom).as_str(), "bin");
    }
}

pub mod emoji;
pub mod message;

pub use emoji::{EmojiId, Reaction, ReactionEmoji};
pub use message::{Author, ChannelId, Colour, Controls, Message, MessageId, UserId, VisualForm};

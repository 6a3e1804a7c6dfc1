use crate::item::Item;
use crate::models::{Author, ChannelId, Controls, EmojiId, UserId};
use crate::store::MemoryStore;

pub const CHANNEL: ChannelId = ChannelId(500);

pub fn alice() -> Author {
    Author {
        id: UserId(42),
        name: "alice".to_string(),
        avatar_url: Some("https://cdn.example/alice.png".to_string()),
        bot: false,
    }
}

pub fn buttons() -> Controls {
    Controls::Buttons {
        done_label: "Done".to_string(),
        delete_label: "Delete".to_string(),
    }
}

pub fn reactions() -> Controls {
    Controls::Reactions {
        strike: EmojiId::from("✅"),
        delete: EmojiId::from("🗑️"),
    }
}

/// Post `content` as alice and turn it into a button item.
pub async fn seed_item(store: &MemoryStore, content: &str) -> Item {
    let plain = store.post_user_message(CHANNEL, alice(), content);
    Item::from_message(store, &plain, &buttons(), true)
        .await
        .unwrap()
}

//! The three list styles behind one interface.
//!
//! A lifecycle decides which controls an item card carries, which user events
//! map to which item action, and how "complete" is persisted. Deletion is the
//! same for every style and handled by the dispatcher.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::ListrConfig;
use crate::constants::actions;
use crate::error::Result;
use crate::item::{Item, MutationMode};
use crate::models::{Colour, Controls, EmojiId};
use crate::store::MessageStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ListStyle {
    /// Done/delete buttons, done toggles a highlight in place
    #[default]
    ButtonToggle,
    /// Strike/delete reactions, strike follows reaction parity in place
    ReactionStrike,
    /// Strike/delete reactions, strike recreates the item
    ReactionRecreate,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemAction {
    Complete,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReactionKind {
    Added,
    Removed,
}

#[async_trait]
pub trait ItemLifecycle: Send + Sync {
    fn style(&self) -> ListStyle;

    /// Controls rendered on every card this lifecycle creates
    fn controls(&self) -> Controls;

    fn interaction_action(&self, _custom_id: &str) -> Option<ItemAction> {
        None
    }

    fn reaction_action(&self, _emoji: &EmojiId, _kind: ReactionKind) -> Option<ItemAction> {
        None
    }

    /// Persist the "complete" action. `item` must wrap the live message.
    async fn complete(&self, store: &dyn MessageStore, item: Item) -> Result<Item>;
}

pub struct ButtonToggle {
    pub done_label: String,
    pub delete_label: String,
    pub colour: Colour,
}

#[async_trait]
impl ItemLifecycle for ButtonToggle {
    fn style(&self) -> ListStyle {
        ListStyle::ButtonToggle
    }

    fn controls(&self) -> Controls {
        Controls::Buttons {
            done_label: self.done_label.clone(),
            delete_label: self.delete_label.clone(),
        }
    }

    fn interaction_action(&self, custom_id: &str) -> Option<ItemAction> {
        match custom_id {
            actions::DONE => Some(ItemAction::Complete),
            actions::DELETE => Some(ItemAction::Delete),
            _ => None,
        }
    }

    async fn complete(&self, store: &dyn MessageStore, item: Item) -> Result<Item> {
        item.toggle_done_state(store, self.colour, MutationMode::Edit)
            .await
    }
}

pub struct ReactionStrike {
    pub strike: EmojiId,
    pub delete: EmojiId,
}

#[async_trait]
impl ItemLifecycle for ReactionStrike {
    fn style(&self) -> ListStyle {
        ListStyle::ReactionStrike
    }

    fn controls(&self) -> Controls {
        Controls::Reactions {
            strike: self.strike.clone(),
            delete: self.delete.clone(),
        }
    }

    fn reaction_action(&self, emoji: &EmojiId, kind: ReactionKind) -> Option<ItemAction> {
        if *emoji == self.strike {
            // both directions count toward parity
            Some(ItemAction::Complete)
        } else if *emoji == self.delete && kind == ReactionKind::Added {
            Some(ItemAction::Delete)
        } else {
            None
        }
    }

    async fn complete(&self, store: &dyn MessageStore, item: Item) -> Result<Item> {
        item.toggle_strike(store, &self.strike).await
    }
}

pub struct ReactionRecreate {
    pub strike: EmojiId,
    pub delete: EmojiId,
}

#[async_trait]
impl ItemLifecycle for ReactionRecreate {
    fn style(&self) -> ListStyle {
        ListStyle::ReactionRecreate
    }

    fn controls(&self) -> Controls {
        Controls::Reactions {
            strike: self.strike.clone(),
            delete: self.delete.clone(),
        }
    }

    // The recreated card starts with fresh reactions, so only adds matter.
    fn reaction_action(&self, emoji: &EmojiId, kind: ReactionKind) -> Option<ItemAction> {
        if kind != ReactionKind::Added {
            return None;
        }
        if *emoji == self.strike {
            Some(ItemAction::Complete)
        } else if *emoji == self.delete {
            Some(ItemAction::Delete)
        } else {
            None
        }
    }

    async fn complete(&self, store: &dyn MessageStore, item: Item) -> Result<Item> {
        let struck = !item.is_struck();
        item.set_struck(store, struck, MutationMode::Recreate).await
    }
}

pub fn lifecycle_for(config: &ListrConfig) -> Box<dyn ItemLifecycle> {
    match config.style {
        ListStyle::ButtonToggle => Box::new(ButtonToggle {
            done_label: config.done_label.clone(),
            delete_label: config.delete_label.clone(),
            colour: config.colour(),
        }),
        ListStyle::ReactionStrike => Box::new(ReactionStrike {
            strike: config.strike_emoji(),
            delete: config.delete_emoji(),
        }),
        ListStyle::ReactionRecreate => Box::new(ReactionRecreate {
            strike: config.strike_emoji(),
            delete: config.delete_emoji(),
        }),
    }
}

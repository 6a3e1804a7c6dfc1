//! Reordering items in an append-only channel.
//!
//! A channel cannot be reordered in place, so sorting recreates every item at
//! the tail of the log in the target order. Every item gets a new message id,
//! including items that were already in position. A failure partway leaves
//! the channel partially sorted; nothing is rolled back.

use std::cmp::Reverse;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{ListrError, Result};
use crate::item::Item;
use crate::models::{ChannelId, Controls};
use crate::scan::{ensure_active, ScanReport};
use crate::store::{collect_history, HistoryOrder, MessageStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Normalized content, ascending
    Alphabetical,
    /// Logical timestamp, descending
    NewestFirst,
}

impl SortBy {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', ' '], "_").as_str() {
            "alphabetical" | "alphabetically" | "az" => Some(Self::Alphabetical),
            "newest" | "newest_first" => Some(Self::NewestFirst),
            _ => None,
        }
    }
}

/// Stable-sort items in place by the given key.
pub fn order_items(items: &mut [Item], by: SortBy) {
    match by {
        SortBy::Alphabetical => items.sort_by_cached_key(|item| item.clean_content()),
        SortBy::NewestFirst => items.sort_by_key(|item| Reverse(item.timestamp())),
    }
}

pub async fn sort(
    store: &dyn MessageStore,
    channel: ChannelId,
    by: SortBy,
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

    let mut items: Vec<Item> = messages
        .into_iter()
        .filter_map(|m| Item::try_from_message(m).ok())
        .collect();
    order_items(&mut items, by);

    for item in &items {
        ensure_active(cancel)?;
        match Item::from_message(store, item.message(), controls, true).await {
            Ok(_) => report.changed += 1,
            Err(e) => report.record_failure(item.id(), &e),
        }
    }

    info!(%channel, ?by, recreated = report.changed, failed = report.failed.len(), "Sorted channel");
    Ok(report)
}

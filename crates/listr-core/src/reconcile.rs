//! Duplicate removal across a channel's full history.

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{ListrError, Result, StoreError};
use crate::item::Item;
use crate::scan::{ensure_active, ScanReport};
use crate::store::{history, HistoryOrder, MessageStore};

/// Delete every other item in the channel whose normalized content matches
/// `reference`.
///
/// The reference instance always survives, whichever copy is older. Two
/// concurrent calls from duplicate instances may each delete the other.
pub async fn delete_duplicates(
    store: &dyn MessageStore,
    reference: &Item,
    cancel: &CancellationToken,
) -> Result<ScanReport> {
    let key = reference.clean_content();
    let channel = reference.channel_id();
    let mut report = ScanReport::default();

    let mut log = history(store, channel, HistoryOrder::OldestFirst, None);
    while let Some(message) = log.next().await {
        let message = message?;
        report.scanned += 1;

        if message.id == reference.id() || !Item::is_item(&message) {
            continue;
        }
        let Ok(candidate) = Item::try_from_message(message) else {
            continue;
        };
        if candidate.clean_content() != key {
            continue;
        }

        ensure_active(cancel)?;
        match store.delete(channel, candidate.id()).await {
            Ok(()) => report.changed += 1,
            Err(StoreError::NotFound) => {
                debug!(message = %candidate.id(), "Duplicate already gone")
            }
            Err(e) => report.record_failure(candidate.id(), &ListrError::from(e)),
        }
    }

    if report.changed > 0 {
        info!(
            %channel,
            item = %reference.id(),
            removed = report.changed,
            "Removed duplicate items"
        );
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use crate::test_support::{alice, seed_item, CHANNEL};

    #[tokio::test]
    async fn test_deletes_normalized_duplicates_only() {
        let store = MemoryStore::new();
        seed_item(&store, "buy milk").await;
        let b = seed_item(&store, "Buy Milk ").await;
        seed_item(&store, "call mom").await;
        store.post_user_message(CHANNEL, alice(), "buy milk");

        let report = delete_duplicates(&store, &b, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(report.scanned, 4);
        assert_eq!(
            store.bodies(CHANNEL),
            vec!["Buy Milk ".to_string(), "call mom".to_string()]
        );
        // the plain chat message is left alone
        assert_eq!(store.messages(CHANNEL).len(), 3);
    }

    #[tokio::test]
    async fn test_reference_survives_even_when_newest() {
        let store = MemoryStore::new();
        seed_item(&store, "water plants").await;
        seed_item(&store, "WATER PLANTS").await;
        let newest = seed_item(&store, "water plants").await;

        delete_duplicates(&store, &newest, &CancellationToken::new())
            .await
            .unwrap();

        let remaining = store.messages(CHANNEL);
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, newest.id());
    }

    #[tokio::test]
    async fn test_undeletable_duplicate_does_not_stop_scan() {
        let store = MemoryStore::new();
        let stuck = seed_item(&store, "buy milk").await;
        seed_item(&store, "buy milk").await;
        let reference = seed_item(&store, "buy milk").await;
        store.forbid_delete(stuck.id());

        let report = delete_duplicates(&store, &reference, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(report.changed, 1);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, stuck.id());
        assert_eq!(store.messages(CHANNEL).len(), 2);
    }

    #[tokio::test]
    async fn test_cancelled_scan_issues_no_deletes() {
        let store = MemoryStore::new();
        seed_item(&store, "buy milk").await;
        let reference = seed_item(&store, "buy milk").await;
        let before = store.mutation_count();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = delete_duplicates(&store, &reference, &cancel).await;

        assert!(matches!(result, Err(ListrError::Cancelled)));
        assert_eq!(store.mutation_count(), before);
    }
}

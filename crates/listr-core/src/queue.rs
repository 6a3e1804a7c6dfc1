use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::models::ChannelId;

/// Per-channel single-flight gate.
///
/// Handlers hold the guard for the whole of their work on a channel so that
/// history scans and mutations on one channel never interleave. Waiters are
/// served in arrival order. Different channels proceed independently.
/// A channel's gate is dropped once no handler holds or waits for it.
pub struct ChannelQueue {
    enabled: bool,
    gates: Gates,
}

type Gates = Arc<Mutex<HashMap<ChannelId, Arc<AsyncMutex<()>>>>>;

/// Held while a handler owns its channel. Empty when the queue is disabled.
pub struct ChannelTurn {
    held: Option<(Gates, ChannelId, OwnedMutexGuard<()>)>,
}

impl ChannelQueue {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            gates: Arc::default(),
        }
    }

    pub async fn acquire(&self, channel: ChannelId) -> ChannelTurn {
        if !self.enabled {
            return ChannelTurn { held: None };
        }
        // clones only happen under the map lock, so the count seen in drop is exact
        let gate = self.gates.lock().entry(channel).or_default().clone();
        let guard = gate.lock_owned().await;
        ChannelTurn {
            held: Some((self.gates.clone(), channel, guard)),
        }
    }
}

impl Drop for ChannelTurn {
    fn drop(&mut self) {
        let Some((gates, channel, guard)) = self.held.take() else {
            return;
        };
        drop(guard);
        let mut gates = gates.lock();
        if gates
            .get(&channel)
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            gates.remove(&channel);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_channel_is_serialized() {
        let queue = Arc::new(ChannelQueue::new(true));
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = queue.acquire(ChannelId(1)).await;
        let waiter = {
            let queue = queue.clone();
            let log = log.clone();
            tokio::spawn(async move {
                let _turn = queue.acquire(ChannelId(1)).await;
                log.lock().push("second");
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        log.lock().push("first");
        drop(first);
        waiter.await.unwrap();

        assert_eq!(*log.lock(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn test_other_channels_not_blocked() {
        let queue = ChannelQueue::new(true);
        let _held = queue.acquire(ChannelId(1)).await;
        let other = tokio::time::timeout(Duration::from_millis(50), queue.acquire(ChannelId(2))).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn test_idle_channels_are_forgotten() {
        let queue = ChannelQueue::new(true);
        for id in 0..100 {
            let _turn = queue.acquire(ChannelId(id)).await;
        }
        assert_eq!(queue.gates.lock().len(), 0);
    }

    #[tokio::test]
    async fn test_gate_kept_while_someone_waits() {
        let queue = Arc::new(ChannelQueue::new(true));
        let first = queue.acquire(ChannelId(1)).await;
        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move {
                let _turn = queue.acquire(ChannelId(1)).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        drop(first);
        assert_eq!(queue.gates.lock().len(), 1);
        waiter.await.unwrap();
        assert_eq!(queue.gates.lock().len(), 0);
    }

    #[tokio::test]
    async fn test_disabled_queue_never_blocks() {
        let queue = ChannelQueue::new(false);
        let _held = queue.acquire(ChannelId(1)).await;
        let again = tokio::time::timeout(Duration::from_millis(50), queue.acquire(ChannelId(1))).await;
        assert!(again.is_ok());
    }
}

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{ListrError, Result};
use crate::models::MessageId;

/// Aggregate outcome of a bulk pass over a channel.
///
/// Per-message failures are recorded here instead of aborting the pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    /// Messages read from the channel log
    pub scanned: usize,
    /// Messages deleted, recreated or converted
    pub changed: usize,
    /// Messages whose operation failed, with the error text
    pub failed: Vec<(MessageId, String)>,
}

impl ScanReport {
    pub fn record_failure(&mut self, message: MessageId, error: &ListrError) {
        warn!(%message, %error, "Skipping message after failure");
        self.failed.push((message, error.to_string()));
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn summary(&self, verb: &str) -> String {
        if self.failed.is_empty() {
            format!("{} {} item(s)", verb, self.changed)
        } else {
            format!(
                "{} {} item(s), {} failed",
                verb,
                self.changed,
                self.failed.len()
            )
        }
    }
}

/// Stop before the next external mutation once the invoking request is gone.
pub fn ensure_active(cancel: &CancellationToken) -> Result<()> {
    if cancel.is_cancelled() {
        return Err(ListrError::Cancelled);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary() {
        let mut report = ScanReport {
            scanned: 4,
            changed: 3,
            failed: Vec::new(),
        };
        assert_eq!(report.summary("Sorted"), "Sorted 3 item(s)");
        report.record_failure(MessageId(9), &ListrError::NotAnItem(MessageId(9)));
        assert_eq!(report.summary("Sorted"), "Sorted 3 item(s), 1 failed");
        assert!(!report.is_clean());
    }

    #[test]
    fn test_ensure_active() {
        let cancel = CancellationToken::new();
        assert!(ensure_active(&cancel).is_ok());
        cancel.cancel();
        assert!(matches!(ensure_active(&cancel), Err(ListrError::Cancelled)));
    }
}

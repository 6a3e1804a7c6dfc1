//! Application-wide constants
//!
//! Centralized location for markup strings, action identifiers and the
//! default values used when no config file overrides them.

/// Markup pair wrapped around struck-through item text
pub const STRIKE_MARKUP: &str = "~~";

/// Reply sent when a channel has no deletions left to restore
pub const NOTHING_TO_UNDO: &str = "Nothing to undo 🤷";

/// Page size used when walking a channel's history
pub const HISTORY_PAGE_SIZE: usize = 100;

// Config defaults
pub const DEFAULT_COMMAND_PREFIX: &str = "!";
pub const DEFAULT_BOT_COLOUR: u32 = 0x2ecc71;
pub const DEFAULT_DONE_LABEL: &str = "Done";
pub const DEFAULT_DELETE_LABEL: &str = "Delete";
pub const DEFAULT_STRIKE_EMOJI: &str = "✅";
pub const DEFAULT_DELETE_EMOJI: &str = "🗑️";

// Retry defaults for throttled store calls
pub const DEFAULT_RETRY_ATTEMPTS: u32 = 4;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8_000;

/// Control identifiers attached to item buttons
pub mod actions {
    /// Toggle the done highlight
    pub const DONE: &str = "done";
    /// Delete the item (undoable)
    pub const DELETE: &str = "delete";
}

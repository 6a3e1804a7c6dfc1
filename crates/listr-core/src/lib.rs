pub mod bot;
pub mod commands;
pub mod config;
pub mod constants;
pub mod error;
pub mod format;
pub mod history;
pub mod item;
pub mod lifecycle;
pub mod models;
pub mod queue;
pub mod reconcile;
pub mod scan;
pub mod sort;
pub mod store;

#[cfg(test)]
mod test_support;

pub use bot::{ActionOutcome, InteractionEvent, Listr, MessageOutcome, ReactionEvent};
pub use commands::{Command, CommandOutcome};
pub use config::{ConfigError, ListrConfig};
pub use error::{ListrError, Result, StoreError};
pub use item::{Item, MutationMode};
pub use lifecycle::{ListStyle, ReactionKind};
pub use scan::ScanReport;
pub use sort::SortBy;
pub use store::{MemoryStore, MessageStore};

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BOT_COLOUR, DEFAULT_COMMAND_PREFIX, DEFAULT_DELETE_EMOJI, DEFAULT_DELETE_LABEL,
    DEFAULT_DONE_LABEL, DEFAULT_STRIKE_EMOJI,
};
use crate::history::HistoryPolicy;
use crate::lifecycle::ListStyle;
use crate::models::{Colour, EmojiId};
use crate::store::RetryPolicy;

const CONFIG_DIR: &str = ".listr";
const CONFIG_FILE: &str = "config.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Bot configuration, loaded from a JSON file. Every field has a default.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ListrConfig {
    pub command_prefix: String,
    /// Highlight colour applied to done items (0xRRGGBB)
    pub bot_colour: u32,
    pub done_label: String,
    pub delete_label: String,
    pub style: ListStyle,
    pub strike_emoji: String,
    pub delete_emoji: String,
    pub history: HistoryPolicy,
    /// Run all handlers touching one channel one at a time
    pub serialize_channels: bool,
    pub retry: RetryPolicy,
}

impl Default for ListrConfig {
    fn default() -> Self {
        Self {
            command_prefix: DEFAULT_COMMAND_PREFIX.to_string(),
            bot_colour: DEFAULT_BOT_COLOUR,
            done_label: DEFAULT_DONE_LABEL.to_string(),
            delete_label: DEFAULT_DELETE_LABEL.to_string(),
            style: ListStyle::ButtonToggle,
            strike_emoji: DEFAULT_STRIKE_EMOJI.to_string(),
            delete_emoji: DEFAULT_DELETE_EMOJI.to_string(),
            history: HistoryPolicy::default(),
            serialize_channels: true,
            retry: RetryPolicy::default(),
        }
    }
}

impl ListrConfig {
    /// `~/.listr/config.json`, falling back to the working directory
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(CONFIG_DIR)
            .join(CONFIG_FILE)
    }

    /// Load config from a JSON file, writing the defaults there first when
    /// the file is missing and `create_if_not_found` is set.
    pub fn load(path: &Path, create_if_not_found: bool) -> Result<Self, ConfigError> {
        if create_if_not_found && !path.exists() {
            let config = Self::default();
            config.save(path)?;
            return Ok(config);
        }

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write pretty JSON, creating parent directories. Every failure is a
    /// [`ConfigError::Write`].
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_err = |source| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(write_err)?;
        }
        let json =
            serde_json::to_string_pretty(self).map_err(|e| write_err(std::io::Error::from(e)))?;
        std::fs::write(path, json).map_err(write_err)
    }

    pub fn colour(&self) -> Colour {
        Colour(self.bot_colour)
    }

    pub fn strike_emoji(&self) -> EmojiId {
        EmojiId::new(self.strike_emoji.as_str())
    }

    pub fn delete_emoji(&self) -> EmojiId {
        EmojiId::new(self.delete_emoji.as_str())
    }
}

use serde::{Deserialize, Serialize};

use listr_core::models::{Author, ChannelId, UserId};
use listr_core::{Command, ListrError, StoreError};

/// One scripted event, read as a single JSON line
#[derive(Debug, Serialize, Deserialize)]
pub struct Request {
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

/// Answer to one event, written as a single JSON line
#[derive(Debug, Serialize, Deserialize)]
pub struct Response {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorInfo>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub code: String,
    pub message: String,
}

impl Response {
    pub fn success(id: u64, result: serde_json::Value) -> Self {
        Self {
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn error(id: u64, code: &str, message: &str) -> Self {
        Self {
            id,
            result: None,
            error: Some(ErrorInfo {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }

    pub fn from_listr_error(id: u64, error: &ListrError) -> Self {
        Self::error(id, error_code(error), &error.to_string())
    }
}

pub fn error_code(error: &ListrError) -> &'static str {
    match error {
        ListrError::NotAnItem(_) => "NOT_AN_ITEM",
        ListrError::EmptyContent(_) => "EMPTY_CONTENT",
        ListrError::NotMessageable(_) => "NOT_MESSAGEABLE",
        ListrError::Cancelled => "CANCELLED",
        ListrError::Store(StoreError::NotFound) => "NOT_FOUND",
        ListrError::Store(StoreError::Forbidden) => "FORBIDDEN",
        ListrError::Store(StoreError::Throttled { .. }) => "THROTTLED",
        ListrError::Store(StoreError::Transport(_)) => "TRANSPORT",
    }
}

/// Params of `message`: a user posts `content` into `channel`
#[derive(Debug, Deserialize)]
pub struct MessageParams {
    pub channel: ChannelId,
    pub content: String,
    #[serde(default = "sandbox_user")]
    pub author: Author,
}

/// Params of `command`
#[derive(Debug, Deserialize)]
pub struct CommandParams {
    pub channel: ChannelId,
    pub command: Command,
}

/// Params of `show`
#[derive(Debug, Deserialize)]
pub struct ShowParams {
    pub channel: ChannelId,
}

pub fn sandbox_user() -> Author {
    Author {
        id: UserId(100),
        name: "user".to_string(),
        avatar_url: None,
        bot: false,
    }
}

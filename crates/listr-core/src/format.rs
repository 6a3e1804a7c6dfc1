//! Conversion between item text and its decorated forms.
//!
//! Pure functions only: strike markup, the normalized comparison key, and
//! the mapping between [`ItemParts`] and the rendered [`VisualForm`].

use chrono::{DateTime, Utc};

use crate::constants::STRIKE_MARKUP;
use crate::models::{Colour, Controls, VisualForm};

/// Completion state of an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DoneState {
    #[default]
    Open,
    /// Done, shown with a highlight colour
    Done(Colour),
    /// Done, shown by wrapping the text in strike markup
    Struck,
}

impl DoneState {
    pub fn is_open(&self) -> bool {
        matches!(self, DoneState::Open)
    }
}

/// The user-visible fields of an item, independent of any message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemParts {
    pub content: String,
    pub icon_url: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
    pub done: DoneState,
}

pub fn is_struck(content: &str) -> bool {
    content.len() >= 2 * STRIKE_MARKUP.len()
        && content.starts_with(STRIKE_MARKUP)
        && content.ends_with(STRIKE_MARKUP)
}

/// Wrap or unwrap one strike markup pair. Already-correct input is returned unchanged.
pub fn apply_strike(content: &str, struck: bool) -> String {
    match (struck, is_struck(content)) {
        (true, false) => format!("{STRIKE_MARKUP}{content}{STRIKE_MARKUP}"),
        (false, true) => {
            content[STRIKE_MARKUP.len()..content.len() - STRIKE_MARKUP.len()].to_string()
        }
        _ => content.to_string(),
    }
}

/// Remove every outer strike markup pair from raw user text.
///
/// Item content never carries the wrapper, otherwise an open item would
/// render to a struck body.
pub fn strip_strike(content: &str) -> String {
    let mut stripped = content;
    while is_struck(stripped) {
        stripped = &stripped[STRIKE_MARKUP.len()..stripped.len() - STRIKE_MARKUP.len()];
    }
    stripped.to_string()
}

/// Comparison key for duplicate detection and alphabetical sorting.
pub fn normalize(content: &str) -> String {
    content.trim().to_lowercase()
}

pub fn render(parts: &ItemParts, controls: &Controls) -> VisualForm {
    let (body, colour) = match parts.done {
        DoneState::Open => (parts.content.clone(), None),
        DoneState::Done(colour) => (parts.content.clone(), Some(colour)),
        DoneState::Struck => (apply_strike(&parts.content, true), None),
    };

    VisualForm {
        body,
        icon_url: parts.icon_url.clone(),
        timestamp: parts.timestamp,
        colour,
        controls: controls.clone(),
    }
}

pub fn parse(form: &VisualForm) -> ItemParts {
    let (content, done) = if is_struck(&form.body) {
        (apply_strike(&form.body, false), DoneState::Struck)
    } else {
        let done = form.colour.map(DoneState::Done).unwrap_or(DoneState::Open);
        (form.body.clone(), done)
    };

    ItemParts {
        content,
        icon_url: form.icon_url.clone(),
        timestamp: form.timestamp,
        done,
    }
}

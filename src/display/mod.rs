//! Display Sinks
//!
//! Defines where rendered polls are published and how existing displays are
//! updated after a refresh.

pub mod console;
pub mod telegram;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use crate::polls::model::DisplayHandle;
pub use console::ConsoleDisplay;
pub use telegram::{TelegramConfig, TelegramDisplay};

/// Result type for display operations
pub type DisplayResult<T> = Result<T, DisplayError>;

/// Errors that can occur while publishing or updating a display
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    #[error("Invalid display target: {0}")]
    InvalidTarget(String),

    #[error("Display request failed: {0}")]
    RequestFailed(String),

    #[error("Display API error {code}: {description}")]
    Api { code: i64, description: String },

    #[error("Rate limited: retry after {0}s")]
    RateLimited(u64),
}

/// Separator between the action and arguments of a button's callback data
pub const CALLBACK_SEPARATOR: char = '|';

/// Inline button attached to a message
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Button {
    /// Button label
    pub label: String,
    /// Opaque data delivered back with the button press (`action|arg|arg`)
    pub callback_data: String,
}

impl Button {
    /// Create a button whose press carries `action` and `args`
    pub fn new(label: impl Into<String>, action: &str, args: &[String]) -> Self {
        let mut callback_data = action.to_string();
        for arg in args {
            callback_data.push(CALLBACK_SEPARATOR);
            callback_data.push_str(arg);
        }
        Self {
            label: label.into(),
            callback_data,
        }
    }

    /// Split callback data back into its action and arguments
    pub fn parse_callback(data: &str) -> (String, Vec<String>) {
        let mut parts = data.split(CALLBACK_SEPARATOR);
        let action = parts.next().unwrap_or_default().to_string();
        (action, parts.map(str::to_string).collect())
    }
}

/// Rows of inline buttons
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Keyboard {
    pub rows: Vec<Vec<Button>>,
}

impl Keyboard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a row of buttons
    pub fn row(mut self, buttons: Vec<Button>) -> Self {
        self.rows.push(buttons);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(|r| r.is_empty())
    }
}

/// Location a poll is published into (a chat ID for chat platforms)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DisplayTarget(pub String);

impl DisplayTarget {
    pub fn new(target: impl Into<String>) -> Self {
        Self(target.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DisplayTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Sink that shows rendered polls to users
#[async_trait]
pub trait DisplaySink: Send + Sync {
    /// Post a new message and return its handle
    async fn publish(
        &self,
        target: &DisplayTarget,
        text: &str,
        controls: &Keyboard,
    ) -> DisplayResult<DisplayHandle>;

    /// Replace the content of a previously published message
    async fn update(
        &self,
        handle: &DisplayHandle,
        text: &str,
        controls: &Keyboard,
    ) -> DisplayResult<()>;
}

/// Type-erased sink for sharing
pub type DynDisplay = Arc<dyn DisplaySink>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_button_callback_roundtrip() {
        let button = Button::new("Red", "vote", &["7".to_string(), "21".to_string()]);
        assert_eq!(button.callback_data, "vote|7|21");

        let (action, args) = Button::parse_callback(&button.callback_data);
        assert_eq!(action, "vote");
        assert_eq!(args, vec!["7", "21"]);
    }

    #[test]
    fn test_parse_callback_without_args() {
        let (action, args) = Button::parse_callback("poll_done");
        assert_eq!(action, "poll_done");
        assert!(args.is_empty());
    }

    #[test]
    fn test_keyboard_is_empty() {
        assert!(Keyboard::new().is_empty());
        assert!(Keyboard::new().row(vec![]).is_empty());
        let keyboard = Keyboard::new().row(vec![Button::new("Done", "poll_done", &[])]);
        assert!(!keyboard.is_empty());
    }
}

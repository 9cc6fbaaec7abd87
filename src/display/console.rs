//! Console display: prints poll messages to stdout and remembers the latest
//! text of each one.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{DisplayError, DisplayHandle, DisplayResult, DisplaySink, DisplayTarget, Keyboard};

/// [`DisplaySink`] for local use
#[derive(Debug, Default)]
pub struct ConsoleDisplay {
    next_message_id: AtomicI64,
    frames: Mutex<HashMap<DisplayHandle, String>>,
    quiet: bool,
}

impl ConsoleDisplay {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep frames without printing them
    pub fn quiet() -> Self {
        Self {
            quiet: true,
            ..Self::default()
        }
    }

    /// Latest text shown by a display
    pub fn current(&self, handle: &DisplayHandle) -> Option<String> {
        self.frames.lock().get(handle).cloned()
    }

    fn show(&self, handle: &DisplayHandle, text: &str, controls: &Keyboard) {
        self.frames.lock().insert(handle.clone(), text.to_string());
        if self.quiet {
            return;
        }

        println!("┌─ {}", handle);
        for line in text.lines() {
            println!("│ {}", line);
        }
        for row in &controls.rows {
            let labels: Vec<String> = row
                .iter()
                .map(|b| format!("[{}] {}", b.callback_data, b.label))
                .collect();
            println!("│ {}", labels.join("  "));
        }
        println!("└─");
    }
}

#[async_trait]
impl DisplaySink for ConsoleDisplay {
    async fn publish(
        &self,
        target: &DisplayTarget,
        text: &str,
        controls: &Keyboard,
    ) -> DisplayResult<DisplayHandle> {
        let chat_id = if target.as_str().is_empty() {
            0
        } else {
            target
                .as_str()
                .parse()
                .map_err(|_| DisplayError::InvalidTarget(target.to_string()))?
        };

        let message_id = self.next_message_id.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = DisplayHandle::Chat {
            chat_id,
            message_id,
        };
        self.show(&handle, text, controls);
        Ok(handle)
    }

    async fn update(
        &self,
        handle: &DisplayHandle,
        text: &str,
        controls: &Keyboard,
    ) -> DisplayResult<()> {
        if let DisplayHandle::Chat { .. } = handle {
            if !self.frames.lock().contains_key(handle) {
                return Err(DisplayError::Api {
                    code: 400,
                    description: format!("message to edit not found: {}", handle),
                });
            }
        }
        self.show(handle, text, controls);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_assigns_message_ids() {
        let display = ConsoleDisplay::quiet();
        let first = display
            .publish(&DisplayTarget::new("5"), "one", &Keyboard::new())
            .await
            .unwrap();
        let second = display
            .publish(&DisplayTarget::new(""), "two", &Keyboard::new())
            .await
            .unwrap();

        assert_eq!(first, DisplayHandle::Chat { chat_id: 5, message_id: 1 });
        assert_eq!(second, DisplayHandle::Chat { chat_id: 0, message_id: 2 });
        assert_eq!(display.current(&first).as_deref(), Some("one"));
    }

    #[tokio::test]
    async fn test_update_replaces_frame() {
        let display = ConsoleDisplay::quiet();
        let handle = display
            .publish(&DisplayTarget::new("1"), "before", &Keyboard::new())
            .await
            .unwrap();
        display.update(&handle, "after", &Keyboard::new()).await.unwrap();
        assert_eq!(display.current(&handle).as_deref(), Some("after"));
    }

    #[tokio::test]
    async fn test_update_unknown_chat_message_fails() {
        let display = ConsoleDisplay::quiet();
        let handle = DisplayHandle::Chat { chat_id: 1, message_id: 99 };
        assert!(display.update(&handle, "x", &Keyboard::new()).await.is_err());

        // Inline messages are created elsewhere and accepted as-is
        let inline = DisplayHandle::Inline {
            inline_message_id: "abc".to_string(),
        };
        display.update(&inline, "x", &Keyboard::new()).await.unwrap();
        assert_eq!(display.current(&inline).as_deref(), Some("x"));
    }

    #[tokio::test]
    async fn test_invalid_target() {
        let display = ConsoleDisplay::quiet();
        let result = display
            .publish(&DisplayTarget::new("general"), "x", &Keyboard::new())
            .await;
        assert!(matches!(result, Err(DisplayError::InvalidTarget(_))));
    }
}

//! Inbound events and outbound replies of the bot.

use serde::{Deserialize, Serialize};

use crate::display::{Button, Keyboard};
use crate::polls::{UserId, VoterProfile};

/// Button action that finishes option entry
pub const ACTION_DONE: &str = "poll_done";
/// Button action that confirms the previewed poll
pub const ACTION_CONFIRM_YES: &str = "poll_confirm_yes";
/// Button action that discards the previewed poll
pub const ACTION_CONFIRM_NO: &str = "poll_confirm_no";

/// The user an event came from
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatUser {
    pub id: UserId,
    #[serde(default)]
    pub profile: VoterProfile,
}

impl ChatUser {
    pub fn new(id: UserId) -> Self {
        Self {
            id,
            profile: VoterProfile::default(),
        }
    }

    /// Set the display attributes used when this user votes
    pub fn with_profile(mut self, profile: VoterProfile) -> Self {
        self.profile = profile;
        self
    }
}

/// Event delivered by the transport layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// User asked to build a new poll
    StartDialog { user: ChatUser },
    /// Free text typed by the user
    TextInput { user: ChatUser, text: String },
    /// Inline button pressed; `action` and `args` come from its callback data
    ButtonPress {
        user: ChatUser,
        action: String,
        args: Vec<String>,
    },
    /// User asked to abandon the current dialog
    CancelDialog { user: ChatUser },
}

impl Event {
    pub fn start(user: ChatUser) -> Self {
        Self::StartDialog { user }
    }

    pub fn text(user: ChatUser, text: impl Into<String>) -> Self {
        Self::TextInput {
            user,
            text: text.into(),
        }
    }

    pub fn button(user: ChatUser, action: impl Into<String>, args: Vec<String>) -> Self {
        Self::ButtonPress {
            user,
            action: action.into(),
            args,
        }
    }

    /// Button press decoded from raw callback data (`action|arg|arg`)
    pub fn from_callback(user: ChatUser, data: &str) -> Self {
        let (action, args) = Button::parse_callback(data);
        Self::ButtonPress { user, action, args }
    }

    pub fn cancel(user: ChatUser) -> Self {
        Self::CancelDialog { user }
    }

    /// The user the event came from
    pub fn user(&self) -> &ChatUser {
        match self {
            Self::StartDialog { user }
            | Self::TextInput { user, .. }
            | Self::ButtonPress { user, .. }
            | Self::CancelDialog { user } => user,
        }
    }
}

/// How a reply should be shown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Delivery {
    /// A chat message
    #[default]
    Message,
    /// A transient notification answering a button press
    Toast,
    /// A notification the user has to dismiss
    Alert,
}

/// Response directive for the transport layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub text: String,
    #[serde(default)]
    pub controls: Keyboard,
    #[serde(default)]
    pub delivery: Delivery,
}

impl Reply {
    pub fn message(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            controls: Keyboard::new(),
            delivery: Delivery::Message,
        }
    }

    pub fn toast(text: impl Into<String>) -> Self {
        Self {
            delivery: Delivery::Toast,
            ..Self::message(text)
        }
    }

    pub fn alert(text: impl Into<String>) -> Self {
        Self {
            delivery: Delivery::Alert,
            ..Self::message(text)
        }
    }

    /// Attach inline buttons
    pub fn with_controls(mut self, controls: Keyboard) -> Self {
        self.controls = controls;
        self
    }
}

/// "Done" button shown while options are being collected
pub fn done_controls() -> Keyboard {
    Keyboard::new().row(vec![Button::new("✅ Done", ACTION_DONE, &[])])
}

/// Yes/no buttons shown with the poll preview
pub fn confirm_controls() -> Keyboard {
    Keyboard::new().row(vec![
        Button::new("✅ Yes, create", ACTION_CONFIRM_YES, &[]),
        Button::new("❌ No, discard", ACTION_CONFIRM_NO, &[]),
    ])
}

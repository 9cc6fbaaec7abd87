//! Poll Data Model
//!
//! Polls, their options, current votes, the vote audit log and display bindings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Poll identifier (assigned by the store)
pub type PollId = i64;

/// Option identifier (unique across all polls, assigned by the store)
pub type OptionId = i64;

/// Chat user identifier
pub type UserId = i64;

/// Glyph used for an option's intensity bar when none was chosen
pub const DEFAULT_GLYPH: &str = "👍";

/// Minimum number of options a poll needs before it can be published or voted on
pub const MIN_OPTIONS: usize = 2;

/// Poll option/choice
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollOption {
    /// Option ID
    pub id: OptionId,
    /// Option text/label
    pub text: String,
    /// Optional glyph for the intensity bar
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glyph: Option<String>,
}

impl PollOption {
    /// Create a new poll option
    pub fn new(id: OptionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            glyph: None,
        }
    }

    /// Set glyph
    pub fn with_glyph(mut self, glyph: impl Into<String>) -> Self {
        self.glyph = Some(glyph.into());
        self
    }

    /// Glyph to draw, falling back to [`DEFAULT_GLYPH`]
    pub fn glyph(&self) -> &str {
        match self.glyph.as_deref() {
            Some(g) if !g.is_empty() => g,
            _ => DEFAULT_GLYPH,
        }
    }
}

/// A committed poll. Title and options never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Poll {
    /// Poll ID
    pub id: PollId,
    /// Poll title/question
    pub title: String,
    /// User who built the poll
    pub created_by: UserId,
    /// Options in display order
    pub options: Vec<PollOption>,
    /// Whether the poll accepts votes and may be published
    pub is_active: bool,
    /// When the poll was created
    pub created_at: DateTime<Utc>,
}

impl Poll {
    /// Look up one of this poll's options
    pub fn option(&self, option_id: OptionId) -> Option<&PollOption> {
        self.options.iter().find(|o| o.id == option_id)
    }

    /// Whether the poll has enough options to be published or voted on
    pub fn is_votable(&self) -> bool {
        self.is_active && self.options.len() >= MIN_OPTIONS
    }
}

/// Input for creating a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPoll {
    pub title: String,
    pub created_by: UserId,
    pub options: Vec<String>,
}

impl NewPoll {
    pub fn new(title: impl Into<String>, created_by: UserId, options: Vec<String>) -> Self {
        Self {
            title: title.into(),
            created_by,
            options,
        }
    }
}

/// Short listing entry for a creator's polls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollSummary {
    pub id: PollId,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

/// Display attributes of a voter, as reported by the chat platform
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoterProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
}

impl VoterProfile {
    /// Profile with a handle
    pub fn with_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    /// Profile with a first and optional last name
    pub fn with_name(first_name: impl Into<String>, last_name: Option<String>) -> Self {
        Self {
            username: None,
            first_name: Some(first_name.into()),
            last_name,
        }
    }

    /// Name shown in voter lists: `@handle`, else first and last name, else `anonymous`
    pub fn display_name(&self) -> String {
        if let Some(username) = non_empty(&self.username) {
            return format!("@{}", username);
        }

        let name = [non_empty(&self.first_name), non_empty(&self.last_name)]
            .into_iter()
            .flatten()
            .collect::<Vec<_>>()
            .join(" ");

        if name.is_empty() {
            "anonymous".to_string()
        } else {
            name
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// One vote attempt as submitted by a voter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ballot {
    pub poll_id: PollId,
    pub voter_id: UserId,
    pub option_id: OptionId,
    pub voter: VoterProfile,
}

impl Ballot {
    pub fn new(poll_id: PollId, voter_id: UserId, option_id: OptionId) -> Self {
        Self {
            poll_id,
            voter_id,
            option_id,
            voter: VoterProfile::default(),
        }
    }

    /// Attach voter display attributes
    pub fn with_voter(mut self, voter: VoterProfile) -> Self {
        self.voter = voter;
        self
    }
}

/// The single active vote of a voter in a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrentVote {
    pub poll_id: PollId,
    pub voter_id: UserId,
    pub option_id: OptionId,
    pub voter: VoterProfile,
    /// When the current choice was made (not bumped by a repeated identical vote)
    pub voted_at: DateTime<Utc>,
}

/// Append-only audit record of a vote attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteLogEntry {
    /// Position in the audit log (strictly increasing)
    pub seq: u64,
    pub poll_id: PollId,
    pub voter_id: UserId,
    pub option_id: OptionId,
    pub logged_at: DateTime<Utc>,
}

/// Where a published poll is displayed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DisplayHandle {
    /// A message posted into a chat
    Chat { chat_id: i64, message_id: i64 },
    /// A message sent through inline mode
    Inline { inline_message_id: String },
}

impl std::fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chat {
                chat_id,
                message_id,
            } => write!(f, "chat:{}/{}", chat_id, message_id),
            Self::Inline { inline_message_id } => write!(f, "inline:{}", inline_message_id),
        }
    }
}

//! Poll error types

use super::model::{OptionId, PollId};
use crate::display::DisplayError;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors reported by a [`PollStore`](super::store::PollStore)
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Poll {0} not found or not active")]
    PollNotFound(PollId),

    #[error("Option {option_id} does not belong to poll {poll_id}")]
    OptionNotFound { poll_id: PollId, option_id: OptionId },

    #[error("A poll needs at least {min} options, got {count}")]
    TooFewOptions { count: usize, min: usize },

    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    /// Whether the error names a missing poll or option (never worth retrying)
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::PollNotFound(_) | Self::OptionNotFound { .. })
    }
}

/// Errors surfaced by poll operations
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Only the creator of poll {0} can publish it")]
    NotOwner(PollId),

    #[error("Poll {poll_id} has {count} options, at least {min} are required")]
    TooFewOptions {
        poll_id: PollId,
        count: usize,
        min: usize,
    },

    #[error("Display error: {0}")]
    Display(#[from] DisplayError),
}

impl PollError {
    /// Whether the error is a missing poll or option
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}

/// Failure to refresh a published poll; logged by the refresh worker, never surfaced to voters
#[derive(Debug, thiserror::Error)]
pub enum RefreshError {
    #[error("Failed to load poll {poll_id}: {source}")]
    Load {
        poll_id: PollId,
        #[source]
        source: StoreError,
    },

    #[error("Failed to push poll {poll_id} to {failed} of {total} displays")]
    Push {
        poll_id: PollId,
        failed: usize,
        total: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(StoreError::PollNotFound(1).is_not_found());
        assert!(StoreError::OptionNotFound {
            poll_id: 1,
            option_id: 2
        }
        .is_not_found());
        assert!(!StoreError::Unavailable("down".to_string()).is_not_found());
        assert!(!StoreError::TooFewOptions { count: 1, min: 2 }.is_not_found());

        let err: PollError = StoreError::PollNotFound(3).into();
        assert!(err.is_not_found());
        assert!(!PollError::NotOwner(3).is_not_found());
    }

    #[test]
    fn test_error_messages() {
        let err = PollError::TooFewOptions {
            poll_id: 4,
            count: 1,
            min: 2,
        };
        assert_eq!(err.to_string(), "Poll 4 has 1 options, at least 2 are required");
        assert_eq!(
            PollError::from(StoreError::PollNotFound(9)).to_string(),
            "Poll 9 not found or not active"
        );
    }
}

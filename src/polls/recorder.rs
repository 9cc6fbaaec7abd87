//! Vote recording.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::error::PollError;
use super::model::Ballot;
use super::scheduler::UpdateScheduler;
use super::store::DynStore;

/// What a committed vote did to the voter's current vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteOutcome {
    /// First vote, or a switch to a different option
    Recorded,
    /// Same option as before; only the audit log grew
    Unchanged,
}

/// Records votes and requests a display refresh after each commit
pub struct VoteRecorder {
    store: DynStore,
    scheduler: Arc<UpdateScheduler>,
}

impl VoteRecorder {
    pub fn new(store: DynStore, scheduler: Arc<UpdateScheduler>) -> Self {
        Self { store, scheduler }
    }

    /// Commit a vote, then emit a refresh intent for its poll.
    ///
    /// Any committed vote is a success, whether or not the tally moved. Store
    /// errors are returned as-is so the caller can apply its own retry policy.
    pub async fn vote(&self, ballot: &Ballot) -> Result<VoteOutcome, PollError> {
        let applied = match self.store.record_vote(ballot).await {
            Ok(applied) => applied,
            Err(e) => {
                warn!(
                    poll_id = ballot.poll_id,
                    voter_id = ballot.voter_id,
                    option_id = ballot.option_id,
                    error = %e,
                    "vote rejected"
                );
                return Err(e.into());
            }
        };

        self.scheduler.schedule(ballot.poll_id);

        let outcome = if applied {
            VoteOutcome::Recorded
        } else {
            VoteOutcome::Unchanged
        };
        debug!(
            poll_id = ballot.poll_id,
            voter_id = ballot.voter_id,
            option_id = ballot.option_id,
            ?outcome,
            "vote committed"
        );
        Ok(outcome)
    }
}

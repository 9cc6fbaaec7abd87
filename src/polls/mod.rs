//! Polling Module
//!
//! Poll storage, audited single-choice voting, tally aggregation and the
//! coalescing refresh of published poll displays.

pub mod error;
pub mod model;
pub mod recorder;
pub mod scheduler;
pub mod store;
pub mod tally;

pub use error::{PollError, RefreshError, StoreError, StoreResult};
pub use model::{
    Ballot, CurrentVote, DisplayHandle, NewPoll, OptionId, Poll, PollId, PollOption, PollSummary,
    UserId, VoteLogEntry, VoterProfile, DEFAULT_GLYPH, MIN_OPTIONS,
};
pub use recorder::{VoteOutcome, VoteRecorder};
pub use scheduler::{refresh_loop, PollRefresher, UpdateScheduler};
pub use store::{DynStore, MemoryStore, PollStore};
pub use tally::{OptionTally, Tally};

//! Poll Store
//!
//! Persistence contract for polls, votes, the vote audit log and display
//! bindings, plus an in-memory implementation.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use super::error::{StoreError, StoreResult};
use super::model::{
    Ballot, CurrentVote, DisplayHandle, NewPoll, OptionId, Poll, PollId, PollOption, PollSummary,
    UserId, VoteLogEntry, MIN_OPTIONS,
};
use super::tally::{AggregateRow, Tally};

/// Persistence used by the poll engine
#[async_trait]
pub trait PollStore: Send + Sync {
    /// Create a poll with its options in one transaction. Polls with fewer
    /// than [`MIN_OPTIONS`] options are rejected.
    async fn create_poll(&self, poll: NewPoll) -> StoreResult<PollId>;

    /// Append the ballot to the audit log and upsert the voter's current vote,
    /// atomically. Returns whether the current vote changed.
    async fn record_vote(&self, ballot: &Ballot) -> StoreResult<bool>;

    /// Aggregate the current votes of an active poll
    async fn load_poll_aggregate(&self, poll_id: PollId) -> StoreResult<Tally>;

    /// Active polls of a creator, newest first
    async fn list_polls_by_creator(
        &self,
        creator: UserId,
        limit: usize,
    ) -> StoreResult<Vec<PollSummary>>;

    /// Fetch an active poll
    async fn poll(&self, poll_id: PollId) -> StoreResult<Poll>;

    /// Remember where a poll is displayed (idempotent)
    async fn add_display_binding(&self, poll_id: PollId, handle: DisplayHandle)
        -> StoreResult<()>;

    /// All displays of a poll, in binding order
    async fn display_bindings(&self, poll_id: PollId) -> StoreResult<Vec<DisplayHandle>>;

    /// Audit log entries of a poll, oldest first
    async fn vote_log(&self, poll_id: PollId) -> StoreResult<Vec<VoteLogEntry>>;
}

/// Type-erased store for sharing
pub type DynStore = Arc<dyn PollStore>;

/// A current vote plus its position in recording order
#[derive(Debug, Clone)]
struct VoteRow {
    vote: CurrentVote,
    order: u64,
}

#[derive(Debug, Default)]
struct Tables {
    next_poll_id: PollId,
    next_option_id: OptionId,
    next_seq: u64,
    polls: BTreeMap<PollId, Poll>,
    votes: HashMap<(PollId, UserId), VoteRow>,
    vote_log: Vec<VoteLogEntry>,
    bindings: HashMap<PollId, Vec<DisplayHandle>>,
}

impl Tables {
    fn active_poll(&self, poll_id: PollId) -> StoreResult<&Poll> {
        self.polls
            .get(&poll_id)
            .filter(|p| p.is_active)
            .ok_or(StoreError::PollNotFound(poll_id))
    }

    fn votable_poll(&self, poll_id: PollId) -> StoreResult<&Poll> {
        let poll = self.active_poll(poll_id)?;
        if !poll.is_votable() {
            return Err(StoreError::TooFewOptions {
                count: poll.options.len(),
                min: MIN_OPTIONS,
            });
        }
        Ok(poll)
    }

    fn bump_seq(&mut self) -> u64 {
        self.next_seq += 1;
        self.next_seq
    }
}

/// In-memory [`PollStore`].
///
/// Every operation runs under one lock, so multi-row writes are atomic and
/// concurrent votes are serialized in lock order.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a fully built poll, bypassing the creation checks
    #[cfg(test)]
    pub(crate) fn insert_poll(&self, poll: Poll) {
        self.tables.lock().polls.insert(poll.id, poll);
    }

    /// Stop a poll from accepting votes and appearing in listings
    pub fn deactivate_poll(&self, poll_id: PollId) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        let poll = tables
            .polls
            .get_mut(&poll_id)
            .ok_or(StoreError::PollNotFound(poll_id))?;
        poll.is_active = false;
        Ok(())
    }

    /// Current vote of a voter, if any
    pub fn current_vote(&self, poll_id: PollId, voter_id: UserId) -> Option<CurrentVote> {
        let tables = self.tables.lock();
        tables
            .votes
            .get(&(poll_id, voter_id))
            .map(|row| row.vote.clone())
    }

    /// Number of current votes in a poll
    pub fn current_vote_count(&self, poll_id: PollId) -> usize {
        let tables = self.tables.lock();
        tables.votes.keys().filter(|(p, _)| *p == poll_id).count()
    }
}

#[async_trait]
impl PollStore for MemoryStore {
    async fn create_poll(&self, poll: NewPoll) -> StoreResult<PollId> {
        if poll.options.len() < MIN_OPTIONS {
            return Err(StoreError::TooFewOptions {
                count: poll.options.len(),
                min: MIN_OPTIONS,
            });
        }

        let mut tables = self.tables.lock();

        tables.next_poll_id += 1;
        let poll_id = tables.next_poll_id;

        let mut options = Vec::with_capacity(poll.options.len());
        for text in poll.options {
            tables.next_option_id += 1;
            options.push(PollOption::new(tables.next_option_id, text));
        }

        tables.polls.insert(
            poll_id,
            Poll {
                id: poll_id,
                title: poll.title,
                created_by: poll.created_by,
                options,
                is_active: true,
                created_at: Utc::now(),
            },
        );

        Ok(poll_id)
    }

    async fn record_vote(&self, ballot: &Ballot) -> StoreResult<bool> {
        let mut guard = self.tables.lock();
        let tables = &mut *guard;

        let poll = tables.votable_poll(ballot.poll_id)?;
        if poll.option(ballot.option_id).is_none() {
            return Err(StoreError::OptionNotFound {
                poll_id: ballot.poll_id,
                option_id: ballot.option_id,
            });
        }

        // Validation is done; from here both writes apply together
        let now = Utc::now();
        let seq = tables.bump_seq();
        tables.vote_log.push(VoteLogEntry {
            seq,
            poll_id: ballot.poll_id,
            voter_id: ballot.voter_id,
            option_id: ballot.option_id,
            logged_at: now,
        });

        let key = (ballot.poll_id, ballot.voter_id);
        let applied = match tables.votes.get_mut(&key) {
            Some(row) if row.vote.option_id == ballot.option_id => false,
            Some(row) => {
                row.vote.option_id = ballot.option_id;
                row.vote.voter = ballot.voter.clone();
                row.vote.voted_at = now;
                row.order = seq;
                true
            }
            None => {
                tables.votes.insert(
                    key,
                    VoteRow {
                        vote: CurrentVote {
                            poll_id: ballot.poll_id,
                            voter_id: ballot.voter_id,
                            option_id: ballot.option_id,
                            voter: ballot.voter.clone(),
                            voted_at: now,
                        },
                        order: seq,
                    },
                );
                true
            }
        };

        Ok(applied)
    }

    async fn load_poll_aggregate(&self, poll_id: PollId) -> StoreResult<Tally> {
        let tables = self.tables.lock();
        let poll = tables.active_poll(poll_id)?;

        let mut votes: Vec<&VoteRow> = tables
            .votes
            .values()
            .filter(|row| row.vote.poll_id == poll_id)
            .collect();
        votes.sort_by_key(|row| (row.vote.option_id, row.order));

        let mut options: Vec<&PollOption> = poll.options.iter().collect();
        options.sort_by_key(|o| o.id);

        // Join options with their votes, keeping option-id then vote order
        let mut rows = Vec::with_capacity(options.len() + votes.len());
        let mut pending = votes.into_iter().peekable();
        for option in options {
            let mut matched = false;
            while let Some(row) = pending.next_if(|row| row.vote.option_id == option.id) {
                rows.push(AggregateRow {
                    option: option.clone(),
                    voter: Some(row.vote.voter.clone()),
                });
                matched = true;
            }
            if !matched {
                rows.push(AggregateRow {
                    option: option.clone(),
                    voter: None,
                });
            }
        }

        Ok(Tally::from_rows(poll.id, poll.title.clone(), rows))
    }

    async fn list_polls_by_creator(
        &self,
        creator: UserId,
        limit: usize,
    ) -> StoreResult<Vec<PollSummary>> {
        let tables = self.tables.lock();
        Ok(tables
            .polls
            .values()
            .rev()
            .filter(|p| p.is_active && p.created_by == creator)
            .take(limit)
            .map(|p| PollSummary {
                id: p.id,
                title: p.title.clone(),
                created_at: p.created_at,
            })
            .collect())
    }

    async fn poll(&self, poll_id: PollId) -> StoreResult<Poll> {
        let tables = self.tables.lock();
        tables.active_poll(poll_id).cloned()
    }

    async fn add_display_binding(
        &self,
        poll_id: PollId,
        handle: DisplayHandle,
    ) -> StoreResult<()> {
        let mut tables = self.tables.lock();
        tables.active_poll(poll_id)?;

        let bindings = tables.bindings.entry(poll_id).or_default();
        if !bindings.contains(&handle) {
            bindings.push(handle);
        }
        Ok(())
    }

    async fn display_bindings(&self, poll_id: PollId) -> StoreResult<Vec<DisplayHandle>> {
        let tables = self.tables.lock();
        Ok(tables.bindings.get(&poll_id).cloned().unwrap_or_default())
    }

    async fn vote_log(&self, poll_id: PollId) -> StoreResult<Vec<VoteLogEntry>> {
        let tables = self.tables.lock();
        Ok(tables
            .vote_log
            .iter()
            .filter(|e| e.poll_id == poll_id)
            .cloned()
            .collect())
    }
}

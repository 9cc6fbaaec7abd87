//! Per-user dialog sessions.
//!
//! One session per user, held only for the process lifetime. A single lock
//! guards the whole map; callers deliver each user's events in arrival order.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::{debug, info};

use crate::polls::UserId;

/// Where a user is in the poll-building dialog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogState {
    /// No dialog in progress
    #[default]
    Idle,
    /// Waiting for the poll title
    AwaitingTitle,
    /// Collecting options until the user is done
    AwaitingOption,
    /// Waiting for yes/no on the preview
    AwaitingConfirmation,
}

impl fmt::Display for DialogState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::AwaitingTitle => "awaiting_title",
            Self::AwaitingOption => "awaiting_option",
            Self::AwaitingConfirmation => "awaiting_confirmation",
        };
        f.write_str(name)
    }
}

/// Poll collected so far
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollDraft {
    pub title: Option<String>,
    pub options: Vec<String>,
}

/// Dialog state and draft of one user
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub state: DialogState,
    pub draft: PollDraft,
    touched_at: Instant,
}

impl Session {
    /// Fresh idle session with an empty draft
    pub fn idle() -> Self {
        Self::new(DialogState::Idle, PollDraft::default())
    }

    pub fn new(state: DialogState, draft: PollDraft) -> Self {
        Self {
            state,
            draft,
            touched_at: Instant::now(),
        }
    }

    /// Time since the session was last written
    pub fn idle_for(&self) -> Duration {
        self.touched_at.elapsed()
    }

    fn touch(&mut self) {
        self.touched_at = Instant::now();
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::idle()
    }
}

/// Shared table of dialog sessions keyed by user
#[derive(Debug, Default)]
pub struct SessionStore {
    sessions: Mutex<HashMap<UserId, Session>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of a user's session, creating an idle one on first access
    pub fn get_or_create(&self, user: UserId) -> Session {
        self.sessions
            .lock()
            .entry(user)
            .or_insert_with(Session::idle)
            .clone()
    }

    /// Snapshot of a user's session without creating one
    pub fn get(&self, user: UserId) -> Option<Session> {
        self.sessions.lock().get(&user).cloned()
    }

    /// Current state; users without a session are idle
    pub fn state(&self, user: UserId) -> DialogState {
        self.sessions
            .lock()
            .get(&user)
            .map(|s| s.state)
            .unwrap_or_default()
    }

    pub fn set_state(&self, user: UserId, state: DialogState) {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(user).or_insert_with(Session::idle);
        session.state = state;
        session.touch();
    }

    pub fn set_draft(&self, user: UserId, draft: PollDraft) {
        let mut sessions = self.sessions.lock();
        let session = sessions.entry(user).or_insert_with(Session::idle);
        session.draft = draft;
        session.touch();
    }

    pub fn draft(&self, user: UserId) -> Option<PollDraft> {
        self.sessions.lock().get(&user).map(|s| s.draft.clone())
    }

    /// Write state and draft together
    pub fn replace(&self, user: UserId, mut session: Session) {
        session.touch();
        self.sessions.lock().insert(user, session);
    }

    /// Back to idle with an empty draft
    pub fn reset(&self, user: UserId) {
        self.sessions.lock().insert(user, Session::idle());
    }

    /// Forget a user's session; returns whether one existed
    pub fn delete(&self, user: UserId) -> bool {
        self.sessions.lock().remove(&user).is_some()
    }

    /// Number of sessions held
    pub fn count(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Drop sessions not written for at least `ttl`; returns how many were removed
    pub fn sweep_idle(&self, ttl: Duration) -> usize {
        let mut sessions = self.sessions.lock();
        let before = sessions.len();
        sessions.retain(|_, s| s.idle_for() < ttl);
        before - sessions.len()
    }
}

/// Periodically sweep abandoned sessions until shutdown
pub async fn sweep_loop(
    sessions: Arc<SessionStore>,
    ttl: Duration,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(ttl_secs = ttl.as_secs(), "session sweeper started");
    let mut ticker = tokio::time::interval(every);
    // The first tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = shutdown.changed() => {
                break;
            }
        }

        if *shutdown.borrow() {
            break;
        }

        let removed = sessions.sweep_idle(ttl);
        if removed > 0 {
            debug!(removed, remaining = sessions.count(), "swept idle sessions");
        }
    }
}

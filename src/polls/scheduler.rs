//! Poll refresh scheduling.
//!
//! Votes and publishes mark a poll as needing a display refresh. Requests are
//! deduplicated in a pending set and a single worker drains the set, so a poll
//! voted on many times between drains is re-rendered once.

use std::collections::HashSet;
use std::sync::Arc;

use futures_util::future::join_all;
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tracing::{debug, info, warn};

use super::error::RefreshError;
use super::model::PollId;
use super::store::DynStore;
use super::tally;
use crate::display::DynDisplay;

/// Deduplicating set of polls awaiting a refresh, plus the worker's wake signal.
///
/// The wake signal holds at most one permit: a `schedule` that finds a permit
/// already pending is absorbed. The work itself lives in the pending set.
#[derive(Debug, Default)]
pub struct UpdateScheduler {
    pending: Mutex<HashSet<PollId>>,
    wake: Notify,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a poll for refresh. Never blocks on the worker.
    pub fn schedule(&self, poll_id: PollId) {
        let newly_pending = self.pending.lock().insert(poll_id);
        self.wake.notify_one();
        debug!(poll_id, newly_pending, "scheduled poll refresh");
    }

    /// Take every pending poll, leaving the set empty. Order is unspecified.
    pub fn drain(&self) -> Vec<PollId> {
        std::mem::take(&mut *self.pending.lock())
            .into_iter()
            .collect()
    }

    /// Number of polls waiting for the next drain
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Wait until at least one `schedule` happened since the last wake-up
    pub async fn woken(&self) {
        self.wake.notified().await
    }
}

/// Re-renders a poll and pushes it to every display it is bound to
pub struct PollRefresher {
    store: DynStore,
    display: DynDisplay,
}

impl PollRefresher {
    pub fn new(store: DynStore, display: DynDisplay) -> Self {
        Self { store, display }
    }

    /// Refresh one poll; returns how many displays were updated
    pub async fn refresh(&self, poll_id: PollId) -> Result<usize, RefreshError> {
        let tally = self
            .store
            .load_poll_aggregate(poll_id)
            .await
            .map_err(|source| RefreshError::Load { poll_id, source })?;
        let handles = self
            .store
            .display_bindings(poll_id)
            .await
            .map_err(|source| RefreshError::Load { poll_id, source })?;

        if handles.is_empty() {
            return Ok(0);
        }

        let text = tally::render(&tally);
        let controls = tally::vote_controls(&tally);

        let results = join_all(
            handles
                .iter()
                .map(|handle| self.display.update(handle, &text, &controls)),
        )
        .await;

        let mut failed = 0;
        for (handle, result) in handles.iter().zip(results) {
            if let Err(e) = result {
                warn!(poll_id, display = %handle, error = %e, "failed to update poll display");
                failed += 1;
            }
        }

        if failed > 0 {
            return Err(RefreshError::Push {
                poll_id,
                failed,
                total: handles.len(),
            });
        }
        Ok(handles.len())
    }
}

/// Run the refresh worker loop.
///
/// Wakes when a refresh is scheduled or on shutdown. Each wake drains the
/// whole pending set; polls scheduled mid-batch leave a permit behind and are
/// picked up by the next iteration. Failures are logged and not retried.
pub async fn refresh_loop(
    scheduler: Arc<UpdateScheduler>,
    refresher: Arc<PollRefresher>,
    mut shutdown: watch::Receiver<bool>,
) {
    info!("poll refresh worker started");

    loop {
        tokio::select! {
            _ = scheduler.woken() => {}
            _ = shutdown.changed() => {
                break;
            }
        }

        if *shutdown.borrow() {
            break;
        }

        for poll_id in scheduler.drain() {
            match refresher.refresh(poll_id).await {
                Ok(updated) => debug!(poll_id, updated, "poll displays refreshed"),
                Err(e) => warn!(poll_id, error = %e, "poll refresh failed"),
            }
        }
    }

    info!("poll refresh worker stopped");
}

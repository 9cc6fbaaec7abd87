//! Poll Bot
//!
//! Entry point for the transport layer. Routes events to the dialog or the
//! vote recorder, publishes polls and owns the background workers.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::dialog::{ChatUser, Event, PollBuilder, Reply};
use crate::display::{DisplayTarget, DynDisplay, Keyboard};
use crate::polls::tally::{self, Tally, VOTE_ACTION};
use crate::polls::{
    refresh_loop, Ballot, DisplayHandle, DynStore, PollError, PollId, PollRefresher,
    PollSummary, StoreError, UpdateScheduler, UserId, VoteOutcome, VoteRecorder, MIN_OPTIONS,
};
use crate::sessions::{sweep_loop, SessionStore};

/// Most polls shown by [`PollBot::list_polls`]
pub const LIST_LIMIT: usize = 10;

/// The only inline query the bot answers
pub const INLINE_QUERY: &str = "vote";

/// Most polls offered by [`PollBot::inline_results`]
pub const INLINE_LIMIT: usize = 5;

/// Result id of the placeholder offered when there is nothing to share
pub const NO_RESULTS_ID: &str = "no_results";

/// One shareable entry in the answer to an inline query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineResult {
    /// Poll carried by the result; `None` for the placeholder
    pub poll_id: Option<PollId>,
    pub title: String,
    pub description: Option<String>,
    /// Message text posted when the result is chosen
    pub text: String,
    pub controls: Keyboard,
}

impl InlineResult {
    /// Live poll with its vote buttons
    pub fn poll(tally: &Tally) -> Self {
        Self {
            poll_id: Some(tally.poll_id),
            title: tally.title.clone(),
            description: None,
            text: tally::render(tally),
            controls: tally::vote_controls(tally),
        }
    }

    /// Placeholder pointing at /createpoll
    pub fn no_polls() -> Self {
        Self {
            poll_id: None,
            title: "📊 No active polls".to_string(),
            description: Some("Create a new poll with /createpoll".to_string()),
            text: "📊 No active polls\n\nUse /createpoll in a private chat with the bot to create a new poll."
                .to_string(),
            controls: Keyboard::new(),
        }
    }

    /// Result id; the poll id, which comes back when the result is chosen
    pub fn id(&self) -> String {
        self.poll_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| NO_RESULTS_ID.to_string())
    }
}

/// The poll bot and its shared state
pub struct PollBot {
    sessions: Arc<SessionStore>,
    store: DynStore,
    display: DynDisplay,
    scheduler: Arc<UpdateScheduler>,
    builder: PollBuilder,
    recorder: VoteRecorder,
}

impl PollBot {
    pub fn new(store: DynStore, display: DynDisplay) -> Self {
        let sessions = Arc::new(SessionStore::new());
        let scheduler = Arc::new(UpdateScheduler::new());
        Self {
            builder: PollBuilder::new(sessions.clone(), store.clone()),
            recorder: VoteRecorder::new(store.clone(), scheduler.clone()),
            sessions,
            store,
            display,
            scheduler,
        }
    }

    pub fn sessions(&self) -> &Arc<SessionStore> {
        &self.sessions
    }

    pub fn scheduler(&self) -> &Arc<UpdateScheduler> {
        &self.scheduler
    }

    pub fn store(&self) -> &DynStore {
        &self.store
    }

    /// Handle one event; `None` when there is nothing to answer
    pub async fn dispatch(&self, event: Event) -> Option<Reply> {
        match event {
            Event::StartDialog { user } => Some(self.builder.start(&user)),
            Event::CancelDialog { user } => Some(self.builder.cancel(&user)),
            Event::TextInput { user, text } => Some(self.builder.text(&user, &text).await),
            Event::ButtonPress { action, .. } if action.is_empty() => None,
            Event::ButtonPress { user, action, args } if action == VOTE_ACTION => {
                Some(self.vote_button(&user, &args).await)
            }
            Event::ButtonPress { user, action, .. } => {
                Some(self.builder.button(&user, &action).await)
            }
        }
    }

    async fn vote_button(&self, user: &ChatUser, args: &[String]) -> Reply {
        let (poll_id, option_id) = match args {
            [poll, option] => match (poll.parse(), option.parse()) {
                (Ok(poll_id), Ok(option_id)) => (poll_id, option_id),
                _ => return Reply::toast("❌ Invalid vote data"),
            },
            _ => return Reply::toast("❌ Invalid vote data"),
        };

        let ballot = Ballot::new(poll_id, user.id, option_id).with_voter(user.profile.clone());
        match self.vote(&ballot).await {
            Ok(_) => Reply::toast("✅ Your vote has been counted!"),
            Err(e) if e.is_not_found() => Reply::toast("❌ Poll not found or closed"),
            Err(PollError::Store(StoreError::TooFewOptions { .. })) => {
                Reply::toast("❌ This poll is not open for voting")
            }
            Err(_) => Reply::toast("❌ Could not save your vote, please try again"),
        }
    }

    /// Record a vote and schedule a refresh of the poll's displays
    pub async fn vote(&self, ballot: &Ballot) -> Result<VoteOutcome, PollError> {
        self.recorder.vote(ballot).await
    }

    /// Request a refresh of every display of a poll
    pub fn schedule_refresh(&self, poll_id: PollId) {
        self.scheduler.schedule(poll_id);
    }

    /// Post a poll owned by `requester` to `target` and keep it live
    pub async fn publish(
        &self,
        requester: UserId,
        poll_id: PollId,
        target: &DisplayTarget,
    ) -> Result<DisplayHandle, PollError> {
        let poll = self.store.poll(poll_id).await?;
        if poll.created_by != requester {
            return Err(PollError::NotOwner(poll_id));
        }
        if poll.options.len() < MIN_OPTIONS {
            return Err(PollError::TooFewOptions {
                poll_id,
                count: poll.options.len(),
                min: MIN_OPTIONS,
            });
        }

        let tally = self.store.load_poll_aggregate(poll_id).await?;
        let handle = self
            .display
            .publish(target, &tally::render(&tally), &tally::vote_controls(&tally))
            .await?;
        self.store
            .add_display_binding(poll_id, handle.clone())
            .await?;

        info!(poll_id, requester, display = %handle, "poll published");
        Ok(handle)
    }

    /// Register a display created outside the bot (an inline result) and
    /// bring it up to date
    pub async fn bind_display(
        &self,
        poll_id: PollId,
        handle: DisplayHandle,
    ) -> Result<(), PollError> {
        self.store.poll(poll_id).await?;
        self.store
            .add_display_binding(poll_id, handle.clone())
            .await?;
        self.scheduler.schedule(poll_id);
        debug!(poll_id, display = %handle, "display bound");
        Ok(())
    }

    /// Newest active polls of a creator
    pub async fn list_polls(&self, creator: UserId) -> Result<Vec<PollSummary>, PollError> {
        Ok(self
            .store
            .list_polls_by_creator(creator, LIST_LIMIT)
            .await?)
    }

    /// Answer an inline query; any query other than [`INLINE_QUERY`] is ignored
    pub async fn answer_inline_query(
        &self,
        requester: UserId,
        query: &str,
    ) -> Result<Option<Vec<InlineResult>>, PollError> {
        if query.trim() != INLINE_QUERY {
            return Ok(None);
        }
        self.inline_results(requester).await.map(Some)
    }

    /// The requester's newest active polls as shareable results, each with
    /// its live tally. Never empty: without polls a placeholder is offered.
    pub async fn inline_results(&self, requester: UserId) -> Result<Vec<InlineResult>, PollError> {
        let polls = self
            .store
            .list_polls_by_creator(requester, INLINE_LIMIT)
            .await?;

        let mut results = Vec::with_capacity(polls.len().max(1));
        for summary in polls {
            match self.store.load_poll_aggregate(summary.id).await {
                Ok(tally) => results.push(InlineResult::poll(&tally)),
                // Deactivated since it was listed
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e.into()),
            }
        }
        if results.is_empty() {
            results.push(InlineResult::no_polls());
        }

        debug!(requester, results = results.len(), "inline results built");
        Ok(results)
    }

    /// Start the display refresh worker
    pub fn spawn_refresh_worker(&self, shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        let refresher = Arc::new(PollRefresher::new(
            self.store.clone(),
            self.display.clone(),
        ));
        tokio::spawn(refresh_loop(self.scheduler.clone(), refresher, shutdown))
    }

    /// Start the idle session sweeper
    pub fn spawn_session_sweeper(
        &self,
        ttl: Duration,
        every: Duration,
        shutdown: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        tokio::spawn(sweep_loop(self.sessions.clone(), ttl, every, shutdown))
    }
}

/// Numbered list of a creator's polls
pub fn render_poll_list(polls: &[PollSummary]) -> String {
    if polls.is_empty() {
        return "📊 You have no active polls.\n\nUse /createpoll to create one.".to_string();
    }

    let mut msg = String::from("📊 Your active polls:\n\n");
    for (i, poll) in polls.iter().enumerate() {
        msg.push_str(&format!(
            "{}. {}\n   🆔 ID: {} | 📅 {}\n\n",
            i + 1,
            poll.title,
            poll.id,
            poll.created_at.format("%d.%m.%Y %H:%M")
        ));
    }
    msg.push_str("Use /publishpoll <ID> to publish a poll");
    msg
}

/// User-facing text for a failed publish
pub fn publish_error_text(error: &PollError) -> String {
    match error {
        PollError::NotOwner(_) => {
            "❌ You can only publish your own polls.\n\nSee your polls: /listpolls".to_string()
        }
        e if e.is_not_found() => "❌ Poll not found or not active".to_string(),
        e => format!("❌ {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::{Delivery, ACTION_CONFIRM_YES, ACTION_DONE};
    use crate::display::ConsoleDisplay;
    use crate::polls::{MemoryStore, NewPoll, Poll, PollOption, PollStore};
    use chrono::{TimeZone, Utc};

    fn bot() -> (Arc<MemoryStore>, Arc<ConsoleDisplay>, PollBot) {
        let store = Arc::new(MemoryStore::new());
        let display = Arc::new(ConsoleDisplay::quiet());
        let bot = PollBot::new(store.clone(), display.clone());
        (store, display, bot)
    }

    async fn poll(store: &MemoryStore, creator: UserId, options: &[&str]) -> PollId {
        store
            .create_poll(NewPoll::new(
                "Best color?",
                creator,
                options.iter().map(|o| o.to_string()).collect(),
            ))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_dispatch_routes_dialog_events() {
        let (store, _, bot) = bot();
        let user = ChatUser::new(1);

        bot.dispatch(Event::start(user.clone())).await.unwrap();
        for text in ["Lunch?", "Pizza", "Sushi"] {
            bot.dispatch(Event::text(user.clone(), text)).await.unwrap();
        }
        bot.dispatch(Event::button(user.clone(), ACTION_DONE, vec![]))
            .await
            .unwrap();
        let reply = bot
            .dispatch(Event::button(user.clone(), ACTION_CONFIRM_YES, vec![]))
            .await
            .unwrap();

        assert!(reply.text.contains("Poll ID: 1"));
        assert_eq!(store.list_polls_by_creator(1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_vote_button_records_vote() {
        let (store, _, bot) = bot();
        let poll_id = poll(&store, 1, &["Red", "Blue"]).await;
        let red = store.poll(poll_id).await.unwrap().options[0].id;

        let event = Event::from_callback(ChatUser::new(9), &format!("vote|{}|{}", poll_id, red));
        let reply = bot.dispatch(event).await.unwrap();

        assert_eq!(reply.delivery, Delivery::Toast);
        assert!(reply.text.contains("counted"));
        assert_eq!(store.current_vote(poll_id, 9).unwrap().option_id, red);
        assert_eq!(bot.scheduler().drain(), vec![poll_id]);
    }

    #[tokio::test]
    async fn test_vote_button_bad_data() {
        let (_, _, bot) = bot();
        let user = ChatUser::new(9);

        let reply = bot
            .dispatch(Event::button(user.clone(), VOTE_ACTION, vec!["x".into(), "1".into()]))
            .await
            .unwrap();
        assert!(reply.text.contains("Invalid vote data"));

        let reply = bot
            .dispatch(Event::button(user.clone(), VOTE_ACTION, vec!["1".into()]))
            .await
            .unwrap();
        assert!(reply.text.contains("Invalid vote data"));

        let reply = bot
            .dispatch(Event::button(user, VOTE_ACTION, vec!["5".into(), "1".into()]))
            .await
            .unwrap();
        assert!(reply.text.contains("not found"));
    }

    #[tokio::test]
    async fn test_empty_button_is_ignored() {
        let (_, _, bot) = bot();
        assert!(bot
            .dispatch(Event::from_callback(ChatUser::new(1), ""))
            .await
            .is_none());
    }

    #[tokio::test]
    async fn test_publish_binds_display() {
        let (store, display, bot) = bot();
        let poll_id = poll(&store, 1, &["Red", "Blue"]).await;

        let handle = bot
            .publish(1, poll_id, &DisplayTarget::new("-100"))
            .await
            .unwrap();

        assert_eq!(store.display_bindings(poll_id).await.unwrap(), vec![handle.clone()]);
        let text = display.current(&handle).unwrap();
        assert!(text.starts_with("Best color?"));
        assert!(text.ends_with("👥 0 people voted so far."));
    }

    #[tokio::test]
    async fn test_publish_checks_owner_and_options() {
        let (store, _, bot) = bot();
        let target = DisplayTarget::new("1");

        let poll_id = poll(&store, 1, &["Red", "Blue"]).await;
        let err = bot.publish(2, poll_id, &target).await.unwrap_err();
        assert!(matches!(err, PollError::NotOwner(id) if id == poll_id));
        assert!(publish_error_text(&err).contains("your own polls"));

        store.insert_poll(Poll {
            id: 50,
            title: "Lonely?".to_string(),
            created_by: 1,
            options: vec![PollOption::new(51, "Red")],
            is_active: true,
            created_at: Utc::now(),
        });
        let err = bot.publish(1, 50, &target).await.unwrap_err();
        assert!(matches!(err, PollError::TooFewOptions { count: 1, min: 2, .. }));

        let err = bot.publish(1, 404, &target).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(publish_error_text(&err), "❌ Poll not found or not active");

        store.deactivate_poll(poll_id).unwrap();
        assert!(bot.publish(1, poll_id, &target).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_bind_display_schedules_refresh() {
        let (store, _, bot) = bot();
        let poll_id = poll(&store, 1, &["Red", "Blue"]).await;
        let handle = DisplayHandle::Inline {
            inline_message_id: "AAQ".to_string(),
        };

        bot.bind_display(poll_id, handle.clone()).await.unwrap();
        assert_eq!(store.display_bindings(poll_id).await.unwrap(), vec![handle.clone()]);
        assert_eq!(bot.scheduler().drain(), vec![poll_id]);

        assert!(bot.bind_display(404, handle).await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_vote_on_single_option_poll_is_refused() {
        let (store, _, bot) = bot();
        store.insert_poll(Poll {
            id: 60,
            title: "Solo?".to_string(),
            created_by: 1,
            options: vec![PollOption::new(61, "Only")],
            is_active: true,
            created_at: Utc::now(),
        });

        let reply = bot
            .dispatch(Event::from_callback(ChatUser::new(9), "vote|60|61"))
            .await
            .unwrap();
        assert_eq!(reply.text, "❌ This poll is not open for voting");
        assert!(store.current_vote(60, 9).is_none());
        assert_eq!(bot.scheduler().pending_count(), 0);
    }

    #[tokio::test]
    async fn test_inline_results_offer_live_polls() {
        let (store, _, bot) = bot();
        let older = poll(&store, 1, &["Red", "Blue"]).await;
        let newer = poll(&store, 1, &["Tea", "Coffee"]).await;
        poll(&store, 2, &["A", "B"]).await;
        let red = store.poll(older).await.unwrap().options[0].id;
        bot.vote(&Ballot::new(older, 5, red)).await.unwrap();

        let results = bot.inline_results(1).await.unwrap();
        let ids: Vec<_> = results.iter().map(|r| r.poll_id).collect();
        assert_eq!(ids, vec![Some(newer), Some(older)]);

        let shared = &results[1];
        assert_eq!(shared.id(), older.to_string());
        assert_eq!(shared.title, "Best color?");
        assert!(shared.text.ends_with("👥 1 people voted so far."));
        assert_eq!(shared.controls.rows.len(), 2);
        assert_eq!(
            shared.controls.rows[0][0].callback_data,
            format!("vote|{}|{}", older, red)
        );
    }

    #[tokio::test]
    async fn test_inline_results_limit_and_skip_closed() {
        let (store, _, bot) = bot();
        let mut ids = Vec::new();
        for _ in 0..7 {
            ids.push(poll(&store, 1, &["A", "B"]).await);
        }
        store.deactivate_poll(ids[6]).unwrap();

        let results = bot.inline_results(1).await.unwrap();
        assert_eq!(results.len(), INLINE_LIMIT);
        assert_eq!(results[0].poll_id, Some(ids[5]));
    }

    #[tokio::test]
    async fn test_inline_results_without_polls() {
        let (_, _, bot) = bot();

        let results = bot.inline_results(3).await.unwrap();
        assert_eq!(results, vec![InlineResult::no_polls()]);
        assert_eq!(results[0].id(), NO_RESULTS_ID);
        assert!(results[0].controls.is_empty());
        assert!(results[0].text.contains("/createpoll"));
    }

    #[tokio::test]
    async fn test_answer_inline_query_only_for_vote() {
        let (store, _, bot) = bot();
        poll(&store, 1, &["Red", "Blue"]).await;

        assert!(bot.answer_inline_query(1, "weather").await.unwrap().is_none());
        let results = bot.answer_inline_query(1, " vote ").await.unwrap().unwrap();
        assert_eq!(results.len(), 1);
    }

    #[tokio::test]
    async fn test_list_polls_limit() {
        let (store, _, bot) = bot();
        for _ in 0..12 {
            poll(&store, 1, &["A", "B"]).await;
        }
        poll(&store, 2, &["A", "B"]).await;

        let polls = bot.list_polls(1).await.unwrap();
        assert_eq!(polls.len(), LIST_LIMIT);
        assert!(bot.list_polls(3).await.unwrap().is_empty());
    }

    #[test]
    fn test_render_poll_list() {
        assert!(render_poll_list(&[]).contains("no active polls"));

        let polls = vec![PollSummary {
            id: 7,
            title: "Lunch?".to_string(),
            created_at: Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap(),
        }];
        insta::assert_snapshot!(render_poll_list(&polls), @r"
        📊 Your active polls:

        1. Lunch?
           🆔 ID: 7 | 📅 05.03.2024 14:30

        Use /publishpoll <ID> to publish a poll
        ");
    }

    #[tokio::test]
    async fn test_refresh_worker_updates_published_poll() {
        let (store, display, bot) = bot();
        let poll_id = poll(&store, 1, &["Red", "Blue"]).await;
        let red = store.poll(poll_id).await.unwrap().options[0].id;
        let handle = bot
            .publish(1, poll_id, &DisplayTarget::new("1"))
            .await
            .unwrap();

        let (tx, rx) = watch::channel(false);
        let worker = bot.spawn_refresh_worker(rx);

        bot.vote(&Ballot::new(poll_id, 5, red)).await.unwrap();

        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !display
            .current(&handle)
            .unwrap()
            .contains("👥 1 people voted so far.")
        {
            assert!(tokio::time::Instant::now() < deadline, "display never refreshed");
            tokio::time::sleep(Duration::from_millis(5)).await;
        }

        tx.send(true).unwrap();
        worker.await.unwrap();
    }
}

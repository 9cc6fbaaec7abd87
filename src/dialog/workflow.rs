//! Poll Builder
//!
//! Walks a user through title, options and confirmation. Each transition is
//! computed on a session snapshot and written back with a single `replace`,
//! so a rejected input or a failed save leaves the session untouched.

use std::sync::Arc;

use tracing::{debug, info, warn};

use super::event::{
    confirm_controls, done_controls, ChatUser, Reply, ACTION_CONFIRM_NO, ACTION_CONFIRM_YES,
    ACTION_DONE,
};
use super::validation::{
    is_one_of, validate_option, validate_option_count, validate_title, ValidationError,
    DONE_WORDS, NO_WORDS, YES_WORDS,
};
use crate::polls::{DynStore, NewPoll, PollId, UserId};
use crate::sessions::{DialogState, PollDraft, Session, SessionStore};

const NO_ACTIVE_POLL: &str = "❌ No poll is being created";
const IDLE_HINT: &str = "Use /createpoll to build a new poll or /help to see available commands.";

/// Drives the poll-building dialog for every user
pub struct PollBuilder {
    sessions: Arc<SessionStore>,
    store: DynStore,
}

impl PollBuilder {
    pub fn new(sessions: Arc<SessionStore>, store: DynStore) -> Self {
        Self { sessions, store }
    }

    /// Begin a new dialog, discarding any draft in progress
    pub fn start(&self, user: &ChatUser) -> Reply {
        self.sessions.replace(
            user.id,
            Session::new(DialogState::AwaitingTitle, PollDraft::default()),
        );
        debug!(user_id = user.id, "poll dialog started");
        Reply::message("📊 Creating a new poll\n\n📝 Step 1: send the poll title:")
    }

    /// Abandon the dialog
    pub fn cancel(&self, user: &ChatUser) -> Reply {
        if self.sessions.state(user.id) == DialogState::Idle {
            return Reply::message("❌ Nothing to cancel.");
        }
        self.sessions.reset(user.id);
        debug!(user_id = user.id, "poll dialog cancelled");
        Reply::message("✅ Poll creation cancelled.")
    }

    /// Free text, interpreted according to the user's dialog state
    pub async fn text(&self, user: &ChatUser, text: &str) -> Reply {
        let session = self.sessions.get_or_create(user.id);
        match session.state {
            DialogState::Idle => Reply::message(IDLE_HINT),
            DialogState::AwaitingTitle => self.accept_title(user.id, text),
            DialogState::AwaitingOption if is_one_of(text, DONE_WORDS) => {
                self.finish_options(user.id, session, false)
            }
            DialogState::AwaitingOption => self.accept_option(user.id, session, text),
            DialogState::AwaitingConfirmation if is_one_of(text, YES_WORDS) => {
                self.confirm(user.id, session).await
            }
            DialogState::AwaitingConfirmation if is_one_of(text, NO_WORDS) => {
                self.decline(user.id)
            }
            DialogState::AwaitingConfirmation => {
                Reply::message("Please answer «yes» or «no»:").with_controls(confirm_controls())
            }
        }
    }

    /// Dialog button; buttons that do not match the current state are refused
    pub async fn button(&self, user: &ChatUser, action: &str) -> Reply {
        let session = self.sessions.get_or_create(user.id);
        match (action, session.state) {
            (ACTION_DONE, DialogState::AwaitingOption) => {
                self.finish_options(user.id, session, true)
            }
            (ACTION_CONFIRM_YES, DialogState::AwaitingConfirmation) => {
                self.confirm(user.id, session).await
            }
            (ACTION_CONFIRM_NO, DialogState::AwaitingConfirmation) => self.decline(user.id),
            (ACTION_DONE | ACTION_CONFIRM_YES | ACTION_CONFIRM_NO, _) => {
                Reply::toast(NO_ACTIVE_POLL)
            }
            _ => Reply::toast("❌ Unknown command"),
        }
    }

    fn accept_title(&self, user_id: UserId, text: &str) -> Reply {
        let title = match validate_title(text) {
            Ok(title) => title,
            Err(e) => return retry(&e),
        };

        let draft = PollDraft {
            title: Some(title.clone()),
            options: Vec::new(),
        };
        self.sessions
            .replace(user_id, Session::new(DialogState::AwaitingOption, draft));

        Reply::message(format!(
            "✅ Title saved: \"{}\"\n\n📝 Step 2: add answer options\n\nSend the first option:",
            title
        ))
    }

    fn accept_option(&self, user_id: UserId, session: Session, text: &str) -> Reply {
        let option = match validate_option(text) {
            Ok(option) => option,
            Err(e) => return retry(&e),
        };

        let mut draft = session.draft;
        draft.options.push(option.clone());
        let count = draft.options.len();
        self.sessions
            .replace(user_id, Session::new(DialogState::AwaitingOption, draft));

        Reply::message(format!(
            "✅ Option {} added: \"{}\"\n\nTotal options: {}\n\nSend the next option or press «Done» to finish:",
            count, option, count
        ))
        .with_controls(done_controls())
    }

    fn finish_options(&self, user_id: UserId, session: Session, from_button: bool) -> Reply {
        if let Err(e) = validate_option_count(session.draft.options.len()) {
            return if from_button {
                Reply::alert(format!("❌ {}", e))
            } else {
                Reply::message(format!(
                    "❌ {}\n\nAdd more options, then send «done»:",
                    e
                ))
                .with_controls(done_controls())
            };
        }

        let preview = preview(&session.draft);
        self.sessions.replace(
            user_id,
            Session::new(DialogState::AwaitingConfirmation, session.draft),
        );
        Reply::message(preview).with_controls(confirm_controls())
    }

    async fn confirm(&self, user_id: UserId, session: Session) -> Reply {
        let draft = session.draft;
        let Some(title) = draft.title.clone() else {
            // A confirmation without a title cannot be built; start over
            self.sessions.reset(user_id);
            return Reply::message("❌ The draft is incomplete. Use /createpoll to start again.");
        };

        let new_poll = NewPoll::new(title, user_id, draft.options.clone());
        match self.store.create_poll(new_poll).await {
            Ok(poll_id) => {
                self.sessions.reset(user_id);
                info!(user_id, poll_id, options = draft.options.len(), "poll created");
                Reply::message(created(poll_id, &draft))
            }
            Err(e) => {
                warn!(user_id, error = %e, "failed to save poll");
                Reply::message(format!(
                    "❌ Failed to save the poll: {}\n\nPress «Yes» to try again or «No» to discard.",
                    e
                ))
                .with_controls(confirm_controls())
            }
        }
    }

    fn decline(&self, user_id: UserId) -> Reply {
        self.sessions.reset(user_id);
        debug!(user_id, "poll draft discarded");
        Reply::message("❌ Poll creation cancelled.\n\nUse /createpoll to start again.")
    }
}

fn retry(error: &ValidationError) -> Reply {
    Reply::message(format!("❌ {}. Try again:", error))
}

fn numbered(options: &[String]) -> String {
    options
        .iter()
        .enumerate()
        .map(|(i, option)| format!("{}. {}\n", i + 1, option))
        .collect()
}

fn preview(draft: &PollDraft) -> String {
    const RULE: &str = "━━━━━━━━━━━━━━━━━━━━";
    format!(
        "📊 Poll preview:\n\n{rule}\n📝 {title}\n{rule}\n\n{options}\n{rule}\n\nIs everything correct?",
        rule = RULE,
        title = draft.title.as_deref().unwrap_or_default(),
        options = numbered(&draft.options),
    )
}

fn created(poll_id: PollId, draft: &PollDraft) -> String {
    format!(
        "🎉 Poll created!\n\n📝 {}\n\n{}\n🆔 Poll ID: {}\n\nUse /publishpoll {} to publish it in a chat.",
        draft.title.as_deref().unwrap_or_default(),
        numbered(&draft.options),
        poll_id,
        poll_id
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialog::Delivery;
    use crate::polls::{
        Ballot, DisplayHandle, MemoryStore, Poll, PollStore, PollSummary, StoreError,
        StoreResult, Tally, VoteLogEntry,
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;

    fn builder() -> (Arc<SessionStore>, Arc<MemoryStore>, PollBuilder) {
        let sessions = Arc::new(SessionStore::new());
        let store = Arc::new(MemoryStore::new());
        let builder = PollBuilder::new(sessions.clone(), store.clone());
        (sessions, store, builder)
    }

    async fn fill(builder: &PollBuilder, user: &ChatUser, inputs: &[&str]) {
        builder.start(user);
        for input in inputs {
            builder.text(user, input).await;
        }
    }

    #[tokio::test]
    async fn test_full_dialog_creates_poll() {
        let (sessions, store, builder) = builder();
        let user = ChatUser::new(42);

        let reply = builder.start(&user);
        assert!(reply.text.contains("Step 1"));
        assert_eq!(sessions.state(42), DialogState::AwaitingTitle);

        let reply = builder.text(&user, "Best color?").await;
        assert!(reply.text.contains("Best color?"));
        assert_eq!(sessions.state(42), DialogState::AwaitingOption);

        builder.text(&user, "Red").await;
        let reply = builder.text(&user, "Blue").await;
        assert!(reply.text.contains("Option 2 added"));
        assert_eq!(reply.controls.rows[0][0].callback_data, ACTION_DONE);

        let reply = builder.button(&user, ACTION_DONE).await;
        assert!(reply.text.contains("1. Red\n2. Blue"));
        assert_eq!(sessions.state(42), DialogState::AwaitingConfirmation);

        let reply = builder.button(&user, ACTION_CONFIRM_YES).await;
        assert!(reply.text.contains("Poll ID: 1"));
        assert_eq!(sessions.state(42), DialogState::Idle);
        assert_eq!(sessions.draft(42).unwrap(), PollDraft::default());

        let poll = store.poll(1).await.unwrap();
        assert_eq!(poll.title, "Best color?");
        assert_eq!(poll.created_by, 42);
        let texts: Vec<_> = poll.options.iter().map(|o| o.text.as_str()).collect();
        assert_eq!(texts, vec!["Red", "Blue"]);
    }

    #[tokio::test]
    async fn test_invalid_title_keeps_state() {
        let (sessions, _, builder) = builder();
        let user = ChatUser::new(1);
        builder.start(&user);

        let reply = builder.text(&user, "ab").await;
        assert!(reply.text.contains("too short"));
        assert_eq!(sessions.state(1), DialogState::AwaitingTitle);
        assert_eq!(sessions.draft(1).unwrap().title, None);

        let reply = builder.text(&user, &"x".repeat(201)).await;
        assert!(reply.text.contains("too long"));
        assert_eq!(sessions.state(1), DialogState::AwaitingTitle);
    }

    #[tokio::test]
    async fn test_invalid_option_keeps_draft() {
        let (sessions, _, builder) = builder();
        let user = ChatUser::new(1);
        fill(&builder, &user, &["Lunch?", "Pizza"]).await;

        let reply = builder.text(&user, &"y".repeat(101)).await;
        assert!(reply.text.contains("too long"));
        let draft = sessions.draft(1).unwrap();
        assert_eq!(draft.options, vec!["Pizza"]);
        assert_eq!(sessions.state(1), DialogState::AwaitingOption);
    }

    #[tokio::test]
    async fn test_done_with_too_few_options() {
        let (sessions, _, builder) = builder();
        let user = ChatUser::new(1);
        fill(&builder, &user, &["Lunch?", "Pizza"]).await;

        let reply = builder.button(&user, ACTION_DONE).await;
        assert_eq!(reply.delivery, Delivery::Alert);
        assert!(reply.text.contains("current count: 1"));

        let reply = builder.text(&user, "done").await;
        assert_eq!(reply.delivery, Delivery::Message);
        assert!(reply.text.contains("At least 2 options"));
        assert_eq!(sessions.state(1), DialogState::AwaitingOption);
    }

    #[tokio::test]
    async fn test_done_word_is_case_insensitive() {
        let (sessions, _, builder) = builder();
        let user = ChatUser::new(1);
        fill(&builder, &user, &["Lunch?", "Pizza", "Sushi"]).await;

        let reply = builder.text(&user, "ГОТОВО").await;
        assert!(reply.text.contains("Poll preview"));
        assert_eq!(sessions.state(1), DialogState::AwaitingConfirmation);
        // The sentinel is never stored as an option
        assert_eq!(sessions.draft(1).unwrap().options.len(), 2);
    }

    #[tokio::test]
    async fn test_text_confirmation() {
        let (sessions, store, builder) = builder();
        let user = ChatUser::new(1);
        fill(&builder, &user, &["Lunch?", "Pizza", "Sushi", "done"]).await;

        let reply = builder.text(&user, "maybe").await;
        assert!(reply.text.contains("yes"));
        assert_eq!(sessions.state(1), DialogState::AwaitingConfirmation);

        builder.text(&user, "Да").await;
        assert_eq!(sessions.state(1), DialogState::Idle);
        assert_eq!(store.list_polls_by_creator(1, 10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_decline_discards_draft() {
        let (sessions, store, builder) = builder();
        let user = ChatUser::new(1);
        fill(&builder, &user, &["Lunch?", "Pizza", "Sushi", "done"]).await;

        let reply = builder.button(&user, ACTION_CONFIRM_NO).await;
        assert!(reply.text.contains("cancelled"));
        assert_eq!(sessions.state(1), DialogState::Idle);
        assert!(store.list_polls_by_creator(1, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restart_discards_draft() {
        let (sessions, _, builder) = builder();
        let user = ChatUser::new(1);
        fill(&builder, &user, &["Lunch?", "Pizza"]).await;

        builder.start(&user);
        assert_eq!(sessions.state(1), DialogState::AwaitingTitle);
        assert_eq!(sessions.draft(1).unwrap(), PollDraft::default());
    }

    #[tokio::test]
    async fn test_cancel() {
        let (sessions, _, builder) = builder();
        let user = ChatUser::new(1);

        assert!(builder.cancel(&user).text.contains("Nothing to cancel"));

        fill(&builder, &user, &["Lunch?"]).await;
        assert!(builder.cancel(&user).text.contains("cancelled"));
        assert_eq!(sessions.state(1), DialogState::Idle);
    }

    #[tokio::test]
    async fn test_idle_text_gets_hint() {
        let (sessions, _, builder) = builder();
        let user = ChatUser::new(1);
        let reply = builder.text(&user, "hello").await;
        assert_eq!(reply.text, IDLE_HINT);
        assert_eq!(sessions.state(1), DialogState::Idle);
    }

    #[tokio::test]
    async fn test_mismatched_buttons_are_refused() {
        let (sessions, _, builder) = builder();
        let user = ChatUser::new(1);

        let reply = builder.button(&user, ACTION_CONFIRM_YES).await;
        assert_eq!(reply.delivery, Delivery::Toast);
        assert_eq!(reply.text, NO_ACTIVE_POLL);

        fill(&builder, &user, &["Lunch?"]).await;
        let reply = builder.button(&user, ACTION_CONFIRM_NO).await;
        assert_eq!(reply.text, NO_ACTIVE_POLL);
        assert_eq!(sessions.state(1), DialogState::AwaitingOption);

        let reply = builder.button(&user, "frobnicate").await;
        assert!(reply.text.contains("Unknown"));
    }

    #[tokio::test]
    async fn test_users_are_isolated() {
        let (sessions, _, builder) = builder();
        let alice = ChatUser::new(1);
        let bob = ChatUser::new(2);

        builder.start(&alice);
        builder.text(&alice, "Alice's poll").await;
        builder.start(&bob);

        assert_eq!(sessions.state(1), DialogState::AwaitingOption);
        assert_eq!(sessions.state(2), DialogState::AwaitingTitle);
        assert_eq!(sessions.draft(2).unwrap().title, None);
    }

    /// Store whose poll creation fails until told otherwise
    #[derive(Default)]
    struct FlakyStore {
        inner: MemoryStore,
        failing: Mutex<bool>,
    }

    #[async_trait]
    impl PollStore for FlakyStore {
        async fn create_poll(&self, poll: NewPoll) -> StoreResult<PollId> {
            if *self.failing.lock() {
                return Err(StoreError::Unavailable("connection refused".to_string()));
            }
            self.inner.create_poll(poll).await
        }

        async fn record_vote(&self, ballot: &Ballot) -> StoreResult<bool> {
            self.inner.record_vote(ballot).await
        }

        async fn load_poll_aggregate(&self, poll_id: PollId) -> StoreResult<Tally> {
            self.inner.load_poll_aggregate(poll_id).await
        }

        async fn list_polls_by_creator(
            &self,
            creator: UserId,
            limit: usize,
        ) -> StoreResult<Vec<PollSummary>> {
            self.inner.list_polls_by_creator(creator, limit).await
        }

        async fn poll(&self, poll_id: PollId) -> StoreResult<Poll> {
            self.inner.poll(poll_id).await
        }

        async fn add_display_binding(
            &self,
            poll_id: PollId,
            handle: DisplayHandle,
        ) -> StoreResult<()> {
            self.inner.add_display_binding(poll_id, handle).await
        }

        async fn display_bindings(&self, poll_id: PollId) -> StoreResult<Vec<DisplayHandle>> {
            self.inner.display_bindings(poll_id).await
        }

        async fn vote_log(&self, poll_id: PollId) -> StoreResult<Vec<VoteLogEntry>> {
            self.inner.vote_log(poll_id).await
        }
    }

    #[tokio::test]
    async fn test_failed_save_keeps_session_for_retry() {
        let sessions = Arc::new(SessionStore::new());
        let store = Arc::new(FlakyStore::default());
        *store.failing.lock() = true;
        let builder = PollBuilder::new(sessions.clone(), store.clone());
        let user = ChatUser::new(7);
        fill(&builder, &user, &["Lunch?", "Pizza", "Sushi", "done"]).await;
        let before = sessions.get(7).unwrap();

        let reply = builder.button(&user, ACTION_CONFIRM_YES).await;
        assert!(reply.text.contains("Failed to save"));
        assert!(reply.text.contains("connection refused"));
        let after = sessions.get(7).unwrap();
        assert_eq!(after.state, DialogState::AwaitingConfirmation);
        assert_eq!(after.draft, before.draft);

        *store.failing.lock() = false;
        let reply = builder.button(&user, ACTION_CONFIRM_YES).await;
        assert!(reply.text.contains("Poll created"));
        assert_eq!(sessions.state(7), DialogState::Idle);
    }
}

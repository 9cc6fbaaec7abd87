//! Console front end: reads commands and text from stdin and feeds them to
//! the bot as the current console user.

use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::bot::{publish_error_text, render_poll_list, InlineResult, PollBot, INLINE_QUERY};
use crate::dialog::{ChatUser, Delivery, Event, ACTION_CONFIRM_NO, ACTION_CONFIRM_YES, ACTION_DONE};
use crate::display::{DisplayHandle, DisplayTarget, Keyboard};
use crate::polls::tally::VOTE_ACTION;
use crate::polls::{PollId, UserId, VoterProfile};

const HELP: &str = "\
📋 Available commands:

/createpoll - create a new poll
/cancel - cancel the current dialog
/done, /yes, /no - press the dialog buttons
/listpolls - list your polls
/publishpoll <ID> [chat] - publish a poll
/inline [query] - show the inline results for a query (default: vote)
/share <ID> <inline message id> - bind a chosen inline result
/vote <poll> <option> - vote in a poll
/press <data> - press a button by its callback data
/as <user id> [username] - act as another user
/status - show bot state
/quit - exit

Any other text is sent as a message.";

/// One line of console input
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Start,
    Cancel,
    /// Press a button by its callback data
    Press(String),
    List,
    Publish { poll_id: PollId, target: String },
    /// Inline query as typed after the bot's name
    Inline(String),
    /// A chosen inline result now living at an inline message
    Share { poll_id: PollId, inline_message_id: String },
    As { user_id: UserId, username: Option<String> },
    Status,
    Help,
    Quit,
    Text(String),
    Empty,
    /// Malformed command; carries the usage hint
    Invalid(String),
}

impl ConsoleCommand {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        if line.is_empty() {
            return Self::Empty;
        }
        if !line.starts_with('/') {
            return Self::Text(line.to_string());
        }

        let mut parts = line.split_whitespace();
        let command = parts.next().unwrap_or_default();
        let args: Vec<&str> = parts.collect();

        match (command, args.as_slice()) {
            ("/createpoll" | "/start", _) => Self::Start,
            ("/cancel", _) => Self::Cancel,
            ("/done", _) => Self::Press(ACTION_DONE.to_string()),
            ("/yes", _) => Self::Press(ACTION_CONFIRM_YES.to_string()),
            ("/no", _) => Self::Press(ACTION_CONFIRM_NO.to_string()),
            ("/press", [data]) => Self::Press(data.to_string()),
            ("/press", _) => Self::Invalid("Usage: /press <callback data>".to_string()),
            ("/vote", [poll, option]) => {
                Self::Press(format!("{}|{}|{}", VOTE_ACTION, poll, option))
            }
            ("/vote", _) => Self::Invalid("Usage: /vote <poll> <option>".to_string()),
            ("/listpolls", _) => Self::List,
            ("/publishpoll", [id, rest @ ..]) if rest.len() <= 1 => match id.parse() {
                Ok(poll_id) => Self::Publish {
                    poll_id,
                    target: rest.first().map(|t| t.to_string()).unwrap_or_default(),
                },
                Err(_) => Self::Invalid("❌ Invalid poll ID".to_string()),
            },
            ("/publishpoll", _) => Self::Invalid(
                "❌ Give the poll ID.\n\nUsage: /publishpoll <ID> [chat]\n\nSee your polls: /listpolls"
                    .to_string(),
            ),
            ("/inline", []) => Self::Inline(INLINE_QUERY.to_string()),
            ("/inline", query) => Self::Inline(query.join(" ")),
            ("/share", [id, inline_message_id]) => match id.parse() {
                Ok(poll_id) => Self::Share {
                    poll_id,
                    inline_message_id: inline_message_id.to_string(),
                },
                Err(_) => Self::Invalid("❌ Invalid poll ID".to_string()),
            },
            ("/share", _) => Self::Invalid("Usage: /share <ID> <inline message id>".to_string()),
            ("/as", [id, rest @ ..]) if rest.len() <= 1 => match id.parse() {
                Ok(user_id) => Self::As {
                    user_id,
                    username: rest.first().map(|u| u.trim_start_matches('@').to_string()),
                },
                Err(_) => Self::Invalid("❌ Invalid user ID".to_string()),
            },
            ("/as", _) => Self::Invalid("Usage: /as <user id> [username]".to_string()),
            ("/status", _) => Self::Status,
            ("/help", _) => Self::Help,
            ("/quit" | "/exit", _) => Self::Quit,
            _ => Self::Invalid(format!("Unknown command {}. Use /help", command)),
        }
    }
}

/// Console session acting as one user at a time
pub struct Console {
    bot: Arc<PollBot>,
    user: ChatUser,
}

impl Console {
    pub fn new(bot: Arc<PollBot>, user: ChatUser) -> Self {
        Self { bot, user }
    }

    pub fn user(&self) -> &ChatUser {
        &self.user
    }

    /// Run one command; returns the text to print, if any
    pub async fn execute(&mut self, command: ConsoleCommand) -> Option<String> {
        let event = match command {
            ConsoleCommand::Empty | ConsoleCommand::Quit => return None,
            ConsoleCommand::Invalid(hint) => return Some(hint),
            ConsoleCommand::Help => return Some(HELP.to_string()),
            ConsoleCommand::Status => return Some(self.status()),
            ConsoleCommand::As { user_id, username } => {
                let profile = username
                    .map(VoterProfile::with_username)
                    .unwrap_or_default();
                self.user = ChatUser::new(user_id).with_profile(profile);
                return Some(format!("Acting as {}", self.describe_user()));
            }
            ConsoleCommand::List => {
                return Some(match self.bot.list_polls(self.user.id).await {
                    Ok(polls) => render_poll_list(&polls),
                    Err(e) => format!("❌ Failed to list polls: {}", e),
                });
            }
            ConsoleCommand::Publish { poll_id, target } => {
                let target = DisplayTarget::new(target);
                return Some(match self.bot.publish(self.user.id, poll_id, &target).await {
                    Ok(handle) => format!("✅ Poll {} published as {}", poll_id, handle),
                    Err(e) => publish_error_text(&e),
                });
            }
            ConsoleCommand::Inline(query) => {
                return Some(match self.bot.answer_inline_query(self.user.id, &query).await {
                    Ok(Some(results)) => render_inline_results(&results),
                    Ok(None) => format!("No results for inline query {:?}", query),
                    Err(e) => format!("❌ Failed to load polls: {}", e),
                });
            }
            ConsoleCommand::Share {
                poll_id,
                inline_message_id,
            } => {
                let handle = DisplayHandle::Inline { inline_message_id };
                return Some(match self.bot.bind_display(poll_id, handle).await {
                    Ok(()) => format!("✅ Poll {} shared", poll_id),
                    Err(e) => publish_error_text(&e),
                });
            }
            ConsoleCommand::Start => Event::start(self.user.clone()),
            ConsoleCommand::Cancel => Event::cancel(self.user.clone()),
            ConsoleCommand::Press(data) => Event::from_callback(self.user.clone(), &data),
            ConsoleCommand::Text(text) => Event::text(self.user.clone(), text),
        };

        let reply = self.bot.dispatch(event).await?;
        let mut out = match reply.delivery {
            Delivery::Message => reply.text,
            Delivery::Toast => format!("(notice) {}", reply.text),
            Delivery::Alert => format!("(alert) {}", reply.text),
        };
        out.push_str(&render_controls(&reply.controls));
        Some(out)
    }

    fn describe_user(&self) -> String {
        format!("{} ({})", self.user.id, self.user.profile.display_name())
    }

    fn status(&self) -> String {
        format!(
            "👤 User: {}\n💬 Dialog: {}\n🗂 Sessions: {}\n🔄 Pending refreshes: {}",
            self.describe_user(),
            self.bot.sessions().state(self.user.id),
            self.bot.sessions().count(),
            self.bot.scheduler().pending_count()
        )
    }

    /// Read lines until end of input or `/quit`
    pub async fn run<R>(&mut self, input: R) -> std::io::Result<()>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = input.lines();
        while let Some(line) = lines.next_line().await? {
            let command = ConsoleCommand::parse(&line);
            if command == ConsoleCommand::Quit {
                break;
            }
            if let Some(out) = self.execute(command).await {
                println!("{}\n", out);
            }
        }
        Ok(())
    }
}

/// One line per button row, each button shown with its callback data
fn render_controls(controls: &Keyboard) -> String {
    let mut out = String::new();
    for row in &controls.rows {
        let buttons: Vec<String> = row
            .iter()
            .map(|b| format!("[{}] {}", b.callback_data, b.label))
            .collect();
        out.push('\n');
        out.push_str(&buttons.join("  "));
    }
    out
}

fn render_inline_results(results: &[InlineResult]) -> String {
    results
        .iter()
        .map(|r| {
            let mut entry = format!("── {} ({})", r.title, r.id());
            if let Some(description) = &r.description {
                entry.push_str(&format!("\n{}", description));
            }
            entry.push_str(&format!("\n\n{}", r.text));
            entry.push_str(&render_controls(&r.controls));
            entry
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

//! Tally Aggregation
//!
//! Folds current votes into per-option counts and voter lists, and renders the
//! live poll text with its vote buttons.

use std::collections::HashMap;

use serde::Serialize;

use super::model::{OptionId, PollId, PollOption, VoterProfile};
use crate::display::{Button, Keyboard};

/// Widest intensity bar, in glyphs
pub const MAX_INTENSITY_UNITS: usize = 14;

/// Callback action carried by vote buttons
pub const VOTE_ACTION: &str = "vote";

/// One joined row of poll option and (optional) current vote.
///
/// Rows must arrive ordered by option ID, then by the order the votes were
/// recorded. Options without votes appear once with `voter: None`.
#[derive(Debug, Clone)]
pub struct AggregateRow {
    pub option: PollOption,
    pub voter: Option<VoterProfile>,
}

/// Current standing of one option
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OptionTally {
    pub option: PollOption,
    /// Display names of voters currently holding this option, in vote order
    pub voters: Vec<String>,
}

impl OptionTally {
    pub fn votes(&self) -> usize {
        self.voters.len()
    }
}

/// Aggregated view of a poll
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    pub poll_id: PollId,
    pub title: String,
    pub options: Vec<OptionTally>,
    pub total_votes: usize,
}

impl Tally {
    /// Build a tally from joined rows in a single pass
    pub fn from_rows(
        poll_id: PollId,
        title: impl Into<String>,
        rows: impl IntoIterator<Item = AggregateRow>,
    ) -> Self {
        let mut options: Vec<OptionTally> = Vec::new();
        let mut index: HashMap<OptionId, usize> = HashMap::new();
        let mut total_votes = 0;

        for row in rows {
            let slot = *index.entry(row.option.id).or_insert_with(|| {
                options.push(OptionTally {
                    option: row.option.clone(),
                    voters: Vec::new(),
                });
                options.len() - 1
            });

            if let Some(voter) = row.voter {
                options[slot].voters.push(voter.display_name());
                total_votes += 1;
            }
        }

        Self {
            poll_id,
            title: title.into(),
            options,
            total_votes,
        }
    }

    /// Vote count of an option, if it belongs to this poll
    pub fn votes_for(&self, option_id: OptionId) -> Option<usize> {
        self.options
            .iter()
            .find(|o| o.option.id == option_id)
            .map(OptionTally::votes)
    }
}

/// Whole-number share of the vote, rounded down
pub fn percentage(votes: usize, total: usize) -> usize {
    if total == 0 {
        return 0;
    }
    votes * 100 / total
}

/// Length of an option's intensity bar.
///
/// Roughly one glyph per 7%, capped at [`MAX_INTENSITY_UNITS`]; an option
/// with any votes always shows at least one glyph.
pub fn intensity_units(votes: usize, percentage: usize) -> usize {
    let units = ((percentage + 6) / 7).min(MAX_INTENSITY_UNITS);
    if units == 0 && votes > 0 {
        1
    } else {
        units
    }
}

/// Render the live poll message
pub fn render(tally: &Tally) -> String {
    let mut msg = tally.title.clone();

    for opt in &tally.options {
        let votes = opt.votes();
        let pct = percentage(votes, tally.total_votes);

        msg.push_str(&format!("\n{} – {}\n", opt.option.text, votes));

        if votes > 0 {
            let bar = opt.option.glyph().repeat(intensity_units(votes, pct));
            msg.push_str(&format!("{} {}%\n", bar, pct));
            msg.push_str(&opt.voters.join(", "));
            msg.push('\n');
        } else {
            msg.push_str(&format!("▫️ {}%\n", pct));
        }
    }

    msg.push_str(&format!(
        "\n\n👥 {} people voted so far.",
        tally.total_votes
    ));
    msg
}

/// One vote button per option, in option order
pub fn vote_controls(tally: &Tally) -> Keyboard {
    tally
        .options
        .iter()
        .fold(Keyboard::new(), |keyboard, opt| {
            keyboard.row(vec![Button::new(
                opt.option.text.clone(),
                VOTE_ACTION,
                &[tally.poll_id.to_string(), opt.option.id.to_string()],
            )])
        })
}

//! tallybot library
//!
//! Chat poll bot core: a per-user dialog that builds polls, audited
//! single-choice voting, tally rendering, and a coalescing worker that keeps
//! every published poll message up to date.

pub mod bot;
pub mod cli;
pub mod config;
pub mod dialog;
pub mod display;
pub mod logging;
pub mod polls;
pub mod sessions;

pub use bot::PollBot;
pub use dialog::{ChatUser, Event, Reply};

//! Dialog Sessions
//!
//! Transient per-user state for the poll-building dialog.

pub mod store;

pub use store::{sweep_loop, DialogState, PollDraft, Session, SessionStore};

//! Poll Dialog
//!
//! The conversational workflow that turns a user's messages and button
//! presses into a new poll.

pub mod event;
pub mod validation;
pub mod workflow;

pub use event::{
    confirm_controls, done_controls, ChatUser, Delivery, Event, Reply, ACTION_CONFIRM_NO,
    ACTION_CONFIRM_YES, ACTION_DONE,
};
pub use validation::ValidationError;
pub use workflow::PollBuilder;

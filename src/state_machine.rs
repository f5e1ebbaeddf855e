//! Core conversation state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, WidgetEvent};
pub use event::Event;
pub use state::{ConversationSnapshot, ConversationState, InFlight, PendingRequest, Phase, RequestId};
pub use transition::{transition, TransitionError, TransitionResult};

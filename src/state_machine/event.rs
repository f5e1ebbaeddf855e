//! Events that can occur in a conversation

use super::state::RequestId;
use crate::context::ContextSnapshot;
use crate::transport::TransportError;

/// Events that trigger state transitions
#[derive(Debug, Clone)]
pub enum Event {
    // User events
    UserMessage {
        content: String,
        context: ContextSnapshot,
    },
    StartRequested {
        context: ContextSnapshot,
    },
    ClearRequested,
    EndRequested,

    // Transport events
    ReplyReceived {
        request_id: RequestId,
        text: String,
    },
    ReplyFailed {
        request_id: RequestId,
        error: TransportError,
    },
    WelcomeReceived {
        request_id: RequestId,
        text: String,
    },
}

impl Event {
    #[must_use]
    pub fn user_message(content: impl Into<String>, context: ContextSnapshot) -> Self {
        Event::UserMessage {
            content: content.into(),
            context,
        }
    }

    /// Request this event completes, if it is a transport completion
    #[must_use]
    pub fn completes(&self) -> Option<RequestId> {
        match self {
            Event::ReplyReceived { request_id, .. }
            | Event::ReplyFailed { request_id, .. }
            | Event::WelcomeReceived { request_id, .. } => Some(*request_id),
            _ => None,
        }
    }
}

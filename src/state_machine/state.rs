//! Conversation state types

use crate::context::ContextSnapshot;
use crate::message::Message;
use serde::Serialize;
use std::collections::VecDeque;

/// Identifies one outbound conversational request
pub type RequestId = u64;

/// A conversational request waiting for, or occupying, the request slot
#[derive(Debug, Clone, PartialEq)]
pub enum PendingRequest {
    /// Ask the assistant to answer `content`, sent as message `message_id`
    Reply {
        content: String,
        context: ContextSnapshot,
        message_id: u64,
    },
    /// Ask the backend for a welcome message
    Welcome { context: ContextSnapshot },
}

impl PendingRequest {
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            PendingRequest::Reply { .. } => "reply",
            PendingRequest::Welcome { .. } => "welcome",
        }
    }
}

/// The request currently on the wire
#[derive(Debug, Clone, PartialEq)]
pub struct InFlight {
    pub id: RequestId,
    pub request: PendingRequest,
}

/// Whether a request is outstanding
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Phase {
    /// No request in flight
    #[default]
    Idle,
    /// Exactly one request in flight
    Awaiting(InFlight),
}

/// Everything the state machine owns for one widget session
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationState {
    /// Chronological chat history
    pub messages: Vec<Message>,
    /// Chat view active (as opposed to the feedback form)
    pub conversation_mode: bool,
    pub phase: Phase,
    /// Requests accepted while the slot was busy, oldest first
    pub queue: VecDeque<PendingRequest>,
    pub next_request_id: RequestId,
}

impl Default for ConversationState {
    fn default() -> Self {
        Self {
            messages: Vec::new(),
            conversation_mode: false,
            phase: Phase::Idle,
            queue: VecDeque::new(),
            next_request_id: 1,
        }
    }
}

impl ConversationState {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self.phase, Phase::Awaiting(_))
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<&InFlight> {
        match &self.phase {
            Phase::Awaiting(in_flight) => Some(in_flight),
            Phase::Idle => None,
        }
    }

    #[must_use]
    pub fn last_message_id(&self) -> Option<u64> {
        self.messages.last().map(|m| m.id)
    }

    /// The view published to the presentation layer
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        ConversationSnapshot {
            messages: self.messages.clone(),
            is_loading: self.is_loading(),
            conversation_mode: self.conversation_mode,
            queued: self.queue.len(),
        }
    }
}

/// Read-only conversation view for the UI
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSnapshot {
    pub messages: Vec<Message>,
    pub is_loading: bool,
    pub conversation_mode: bool,
    /// Requests waiting behind the in-flight one
    pub queued: usize,
}

impl ConversationSnapshot {
    /// Nothing in flight and nothing waiting
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.is_loading && self.queued == 0
    }
}

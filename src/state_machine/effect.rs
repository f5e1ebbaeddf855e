//! Effects produced by state transitions

use super::state::RequestId;
use crate::context::ContextSnapshot;
use crate::message::Message;
use serde::Serialize;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Ask the transport for an assistant reply
    RequestReply {
        request_id: RequestId,
        content: String,
        context: ContextSnapshot,
    },

    /// Ask the transport for a welcome message
    RequestWelcome {
        request_id: RequestId,
        context: ContextSnapshot,
    },

    /// Abort the in-flight request
    CancelRequest { request_id: RequestId },

    /// Best-effort remote clear
    RemoteClear,

    /// Best-effort remote end
    RemoteEnd,

    /// Notify the presentation layer
    Notify(WidgetEvent),
}

impl Effect {
    #[must_use]
    pub fn message_appended(message: Message) -> Self {
        Effect::Notify(WidgetEvent::MessageAppended { message })
    }

    #[must_use]
    pub fn loading_changed(is_loading: bool) -> Self {
        Effect::Notify(WidgetEvent::LoadingChanged { is_loading })
    }
}

/// Change notifications pushed to the UI
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WidgetEvent {
    MessageAppended { message: Message },
    /// History replaced wholesale (conversation start)
    MessagesReplaced { messages: Vec<Message> },
    Cleared,
    LoadingChanged { is_loading: bool },
    ConversationMode { active: bool },
}

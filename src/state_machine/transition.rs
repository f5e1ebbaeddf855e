//! Pure state transition function
//!
//! Given the same state, event and clock reading this always produces the
//! same new state and effects. All I/O happens in the runtime.

use super::effect::WidgetEvent;
use super::state::{InFlight, PendingRequest, Phase, RequestId};
use super::{ConversationState, Effect, Event};
use crate::fallback;
use crate::message::{next_message_id, Message, Role};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: ConversationState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    #[must_use]
    pub fn new(state: ConversationState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    #[must_use]
    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    #[must_use]
    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Events the state machine declines to act on
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Message is empty")]
    EmptyMessage,
    #[error("Completion for request {0} does not match the in-flight request")]
    StaleCompletion(RequestId),
}

/// Pure transition function
///
/// # Errors
///
/// Returns an error, leaving the state untouched, for whitespace-only user
/// messages and for completions that no longer match the in-flight request.
pub fn transition(
    state: &ConversationState,
    event: Event,
    now: DateTime<Utc>,
) -> Result<TransitionResult, TransitionError> {
    match event {
        // ============================================================
        // User events
        // ============================================================
        Event::UserMessage { content, context } => {
            let content = content.trim();
            if content.is_empty() {
                return Err(TransitionError::EmptyMessage);
            }

            let mut next = state.clone();
            let message = push_message(&mut next, Role::User, content, now);
            let request = PendingRequest::Reply {
                content: content.to_string(),
                context,
                message_id: message.id,
            };
            let effects = submit(&mut next, request);

            Ok(TransitionResult::new(next)
                .with_effect(Effect::message_appended(message))
                .with_effects(effects))
        }

        Event::StartRequested { context } => {
            let mut next = state.clone();
            let effects = submit(&mut next, PendingRequest::Welcome { context });
            Ok(TransitionResult::new(next).with_effects(effects))
        }

        Event::ClearRequested => {
            let mut next = state.clone();
            next.messages.clear();
            next.queue.clear();
            next.phase = Phase::Idle;

            let mut result = TransitionResult::new(next);
            if let Some(in_flight) = state.in_flight() {
                result = result
                    .with_effect(Effect::CancelRequest {
                        request_id: in_flight.id,
                    })
                    .with_effect(Effect::loading_changed(false));
            }
            Ok(result
                .with_effect(Effect::RemoteClear)
                .with_effect(Effect::Notify(WidgetEvent::Cleared)))
        }

        Event::EndRequested => {
            Ok(TransitionResult::new(state.clone()).with_effect(Effect::RemoteEnd))
        }

        // ============================================================
        // Transport completions
        // ============================================================
        Event::ReplyReceived { request_id, text } => {
            expect_reply(state, request_id)?;
            let mut next = state.clone();
            let message = push_message(&mut next, Role::Assistant, text, now);
            let effects = advance(&mut next);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::message_appended(message))
                .with_effects(effects))
        }

        Event::ReplyFailed { request_id, .. } => {
            let content = expect_reply(state, request_id)?;
            let reply = fallback::respond(content);
            let mut next = state.clone();
            let message = push_message(&mut next, Role::Assistant, reply, now);
            let effects = advance(&mut next);
            Ok(TransitionResult::new(next)
                .with_effect(Effect::message_appended(message))
                .with_effects(effects))
        }

        Event::WelcomeReceived { request_id, text } => {
            match state.in_flight() {
                Some(InFlight {
                    id,
                    request: PendingRequest::Welcome { .. },
                }) if *id == request_id => {}
                _ => return Err(TransitionError::StaleCompletion(request_id)),
            }

            let mut next = state.clone();
            // Everything ahead of the welcome has been answered and is
            // replaced. Messages still waiting in the queue stay after it.
            let waiting: Vec<u64> = next
                .queue
                .iter()
                .filter_map(|request| match request {
                    PendingRequest::Reply { message_id, .. } => Some(*message_id),
                    PendingRequest::Welcome { .. } => None,
                })
                .collect();
            let kept: Vec<Message> = next
                .messages
                .drain(..)
                .filter(|m| m.is_user() && waiting.contains(&m.id))
                .collect();
            let id = match kept.first() {
                Some(first) => first.id.saturating_sub(1),
                None => next_message_id(None, now),
            };
            next.messages = std::iter::once(Message::new(id, Role::Assistant, text, now))
                .chain(kept)
                .collect();
            let was_active = next.conversation_mode;
            next.conversation_mode = true;
            let effects = advance(&mut next);
            let messages = next.messages.clone();

            let mut result = TransitionResult::new(next)
                .with_effect(Effect::Notify(WidgetEvent::MessagesReplaced { messages }));
            if !was_active {
                result = result.with_effect(Effect::Notify(WidgetEvent::ConversationMode {
                    active: true,
                }));
            }
            Ok(result.with_effects(effects))
        }
    }
}

/// Content of the in-flight reply request, if `request_id` names it
fn expect_reply(state: &ConversationState, request_id: RequestId) -> Result<&str, TransitionError> {
    match state.in_flight() {
        Some(InFlight {
            id,
            request: PendingRequest::Reply { content, .. },
        }) if *id == request_id => Ok(content),
        _ => Err(TransitionError::StaleCompletion(request_id)),
    }
}

fn push_message(
    state: &mut ConversationState,
    role: Role,
    content: impl Into<String>,
    now: DateTime<Utc>,
) -> Message {
    let id = next_message_id(state.last_message_id(), now);
    let message = Message::new(id, role, content, now);
    state.messages.push(message.clone());
    message
}

/// Put `request` on the wire if the slot is free, otherwise queue it
fn submit(state: &mut ConversationState, request: PendingRequest) -> Vec<Effect> {
    if state.is_loading() {
        state.queue.push_back(request);
        return vec![];
    }
    let effect = begin(state, request);
    vec![Effect::loading_changed(true), effect]
}

/// Release the slot and start the next queued request, if any
fn advance(state: &mut ConversationState) -> Vec<Effect> {
    match state.queue.pop_front() {
        Some(request) => vec![begin(state, request)],
        None => {
            state.phase = Phase::Idle;
            vec![Effect::loading_changed(false)]
        }
    }
}

fn begin(state: &mut ConversationState, request: PendingRequest) -> Effect {
    let request_id = state.next_request_id;
    state.next_request_id += 1;

    let effect = match &request {
        PendingRequest::Reply { content, context, .. } => Effect::RequestReply {
            request_id,
            content: content.clone(),
            context: context.clone(),
        },
        PendingRequest::Welcome { context } => Effect::RequestWelcome {
            request_id,
            context: context.clone(),
        },
    };
    state.phase = Phase::Awaiting(InFlight {
        id: request_id,
        request,
    });
    effect
}

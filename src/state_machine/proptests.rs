//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across arbitrary operation sequences.

use super::state::*;
use super::transition::*;
use super::*;
use crate::context::{ContextSnapshot, PageType};
use crate::fallback;
use crate::message::Role;
use crate::transport::TransportError;
use chrono::{DateTime, TimeZone, Utc};
use proptest::prelude::*;

// ============================================================================
// Operations
// ============================================================================

/// Abstract step; completions are resolved against the current in-flight id
#[derive(Debug, Clone)]
enum Op {
    Send(String),
    Start(PageType),
    Clear,
    End,
    Complete(String),
    Fail,
    Stale,
}

fn arb_page_type() -> impl Strategy<Value = PageType> {
    prop_oneof![
        Just(PageType::Payment),
        Just(PageType::Account),
        Just(PageType::Support),
        Just(PageType::General),
    ]
}

fn arb_text() -> impl Strategy<Value = String> {
    prop_oneof![
        "[a-zA-Z ]{1,30}",
        Just("help me".to_string()),
        Just("billing".to_string()),
        Just("   ".to_string()),
        Just(String::new()),
    ]
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => arb_text().prop_map(Op::Send),
        1 => arb_page_type().prop_map(Op::Start),
        1 => Just(Op::Clear),
        1 => Just(Op::End),
        3 => "[a-z ]{0,20}".prop_map(Op::Complete),
        2 => Just(Op::Fail),
        1 => Just(Op::Stale),
    ]
}

fn clock(step: usize) -> DateTime<Utc> {
    // several steps share a millisecond to exercise id bumping
    let millis = 1_700_000_000_000 + i64::try_from(step / 3).unwrap();
    Utc.timestamp_millis_opt(millis).unwrap()
}

fn to_event(state: &ConversationState, op: Op) -> Event {
    let in_flight = state.in_flight().cloned();
    match op {
        Op::Send(text) => Event::user_message(text, ContextSnapshot::default()),
        Op::Start(page_type) => Event::StartRequested {
            context: ContextSnapshot::new(page_type),
        },
        Op::Clear => Event::ClearRequested,
        Op::End => Event::EndRequested,
        Op::Complete(text) => match in_flight {
            Some(InFlight {
                id,
                request: PendingRequest::Welcome { .. },
            }) => Event::WelcomeReceived {
                request_id: id,
                text,
            },
            Some(InFlight { id, .. }) => Event::ReplyReceived {
                request_id: id,
                text,
            },
            None => Event::ReplyReceived {
                request_id: state.next_request_id,
                text,
            },
        },
        Op::Fail => Event::ReplyFailed {
            request_id: in_flight.map_or(state.next_request_id, |f| f.id),
            error: TransportError::network("connection refused"),
        },
        Op::Stale => Event::ReplyReceived {
            request_id: state.next_request_id + 100,
            text: "stale".to_string(),
        },
    }
}

fn check_invariants(state: &ConversationState) -> Result<(), TestCaseError> {
    // Queue is only non-empty while a request is in flight
    if !state.queue.is_empty() {
        prop_assert!(state.is_loading());
    }
    // In-flight ids are always behind the allocator
    if let Some(in_flight) = state.in_flight() {
        prop_assert!(in_flight.id < state.next_request_id);
    }
    // Ids strictly increase
    prop_assert!(state.messages.windows(2).all(|w| w[0].id < w[1].id));
    // Every assistant reply answers an earlier user message; only a welcome
    // may lead the history. Unanswered messages match pending reply requests.
    let leading_welcome = state.messages.first().is_some_and(|m| m.role == Role::Assistant);
    let mut unanswered = 0usize;
    for message in state.messages.iter().skip(usize::from(leading_welcome)) {
        match message.role {
            Role::User => unanswered += 1,
            Role::Assistant => {
                prop_assert!(unanswered > 0, "assistant reply without a user message");
                unanswered -= 1;
            }
        }
    }
    let pending_replies = state
        .in_flight()
        .map(|in_flight| &in_flight.request)
        .into_iter()
        .chain(&state.queue)
        .filter(|request| matches!(request, PendingRequest::Reply { .. }))
        .count();
    prop_assert_eq!(unanswered, pending_replies);
    // Snapshot mirrors the state
    let snapshot = state.snapshot();
    prop_assert_eq!(snapshot.is_loading, state.is_loading());
    prop_assert_eq!(snapshot.queued, state.queue.len());
    prop_assert_eq!(snapshot.messages.len(), state.messages.len());
    Ok(())
}

proptest! {
    #[test]
    fn prop_invariants_hold(ops in prop::collection::vec(arb_op(), 1..60)) {
        let mut state = ConversationState::default();
        for (step, op) in ops.into_iter().enumerate() {
            let event = to_event(&state, op);
            match transition(&state, event, clock(step)) {
                Ok(result) => state = result.new_state,
                Err(TransitionError::EmptyMessage | TransitionError::StaleCompletion(_)) => {}
            }
            check_invariants(&state)?;
        }
    }

    #[test]
    fn prop_rejected_events_leave_state_unchanged(
        ops in prop::collection::vec(arb_op(), 1..40),
        blank in "[ \t\n]{0,5}",
    ) {
        let mut state = ConversationState::default();
        for (step, op) in ops.into_iter().enumerate() {
            if let Ok(result) = transition(&state, to_event(&state, op), clock(step)) {
                state = result.new_state;
            }
        }

        let before = state.clone();
        let err = transition(&state, Event::user_message(blank, ContextSnapshot::default()), clock(99));
        prop_assert_eq!(err.unwrap_err(), TransitionError::EmptyMessage);
        prop_assert_eq!(&state, &before);

        let stale = to_event(&state, Op::Stale);
        prop_assert!(transition(&state, stale, clock(99)).is_err());
    }

    #[test]
    fn prop_every_send_gets_one_reply_in_order(
        texts in prop::collection::vec("[a-z]{1,10}( [a-z]{1,10})?", 1..12),
        failures in prop::collection::vec(any::<bool>(), 12),
    ) {
        let mut state = ConversationState::default();
        let mut step = 0;
        for text in &texts {
            state = transition(&state, Event::user_message(text.clone(), ContextSnapshot::default()), clock(step))
                .unwrap()
                .new_state;
            step += 1;
        }
        prop_assert_eq!(state.queue.len(), texts.len() - 1);

        for fail in failures.iter().take(texts.len()) {
            let op = if *fail { Op::Fail } else { Op::Complete("ok".to_string()) };
            state = transition(&state, to_event(&state, op), clock(step)).unwrap().new_state;
            step += 1;
        }

        prop_assert!(!state.is_loading());
        prop_assert_eq!(state.messages.len(), texts.len() * 2);

        // All user messages come first (accepted immediately), followed by
        // replies in request order
        let (users, replies) = state.messages.split_at(texts.len());
        prop_assert!(users.iter().all(|m| m.role == Role::User));
        prop_assert!(replies.iter().all(|m| m.role == Role::Assistant));
        for ((text, fail), reply) in texts.iter().zip(&failures).zip(replies) {
            let expected = if *fail { fallback::respond(text) } else { "ok" };
            prop_assert_eq!(reply.content.as_str(), expected);
        }
    }

    #[test]
    fn prop_clear_always_empties(ops in prop::collection::vec(arb_op(), 0..40)) {
        let mut state = ConversationState::default();
        for (step, op) in ops.into_iter().enumerate() {
            if let Ok(result) = transition(&state, to_event(&state, op), clock(step)) {
                state = result.new_state;
            }
        }
        let mode = state.conversation_mode;

        let result = transition(&state, Event::ClearRequested, clock(100)).unwrap();
        prop_assert!(result.new_state.messages.is_empty());
        prop_assert!(!result.new_state.is_loading());
        prop_assert!(result.new_state.queue.is_empty());
        prop_assert_eq!(result.new_state.conversation_mode, mode);
        prop_assert!(result.effects.contains(&Effect::RemoteClear));
    }

    #[test]
    fn prop_welcome_yields_single_assistant_message(
        ops in prop::collection::vec(arb_op(), 0..30),
        page_type in arb_page_type(),
    ) {
        let mut state = ConversationState::default();
        for (step, op) in ops.into_iter().enumerate() {
            if let Ok(result) = transition(&state, to_event(&state, op), clock(step)) {
                state = result.new_state;
            }
        }
        // Drain whatever is in flight so the start request gets the slot
        let mut step = 200;
        while state.is_loading() {
            state = transition(&state, to_event(&state, Op::Complete("done".to_string())), clock(step))
                .unwrap()
                .new_state;
            step += 1;
        }

        state = transition(
            &state,
            Event::StartRequested { context: ContextSnapshot::new(page_type) },
            clock(step),
        )
        .unwrap()
        .new_state;
        let welcome = fallback::welcome(page_type).to_string();
        state = transition(&state, to_event(&state, Op::Complete(welcome.clone())), clock(step + 1))
            .unwrap()
            .new_state;

        prop_assert_eq!(state.messages.len(), 1);
        prop_assert_eq!(state.messages[0].role, Role::Assistant);
        prop_assert_eq!(&state.messages[0].content, &welcome);
        prop_assert!(state.conversation_mode);
        prop_assert!(!state.is_loading());
    }
}

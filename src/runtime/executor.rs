//! Conversation runtime executor

use super::{Command, ConversationHandle};
use crate::state_machine::{
    transition, ConversationSnapshot, ConversationState, Effect, Event, RequestId,
    TransitionError, WidgetEvent,
};
use crate::transport::ConversationTransport;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const COMMAND_CAPACITY: usize = 32;
const EVENT_CAPACITY: usize = 32;
const BROADCAST_CAPACITY: usize = 128;

/// Owns one conversation and runs its effects
pub struct ConversationRuntime<T>
where
    T: ConversationTransport + 'static,
{
    state: ConversationState,
    transport: Arc<T>,
    command_rx: mpsc::Receiver<Command>,
    /// Completions from spawned transport calls
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    snapshot_tx: watch::Sender<ConversationSnapshot>,
    events_tx: broadcast::Sender<WidgetEvent>,
    /// Token to cancel the in-flight conversational request
    request_cancel: Option<(RequestId, CancellationToken)>,
}

impl<T> ConversationRuntime<T>
where
    T: ConversationTransport + 'static,
{
    /// Create a runtime and the handle that drives it. The runtime does
    /// nothing until [`run`](Self::run) is polled.
    #[must_use]
    pub fn new(transport: T) -> (ConversationHandle, Self) {
        let state = ConversationState::default();
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (event_tx, event_rx) = mpsc::channel(EVENT_CAPACITY);
        let (snapshot_tx, snapshot_rx) = watch::channel(state.snapshot());
        let (events_tx, _) = broadcast::channel(BROADCAST_CAPACITY);

        let handle = ConversationHandle {
            command_tx,
            snapshot_rx,
            events_tx: events_tx.clone(),
            session_id: transport.session_id().clone(),
        };
        let runtime = Self {
            state,
            transport: Arc::new(transport),
            command_rx,
            event_rx,
            event_tx,
            snapshot_tx,
            events_tx,
            request_cancel: None,
        };
        (handle, runtime)
    }

    pub async fn run(mut self) {
        let session_id = self.transport.session_id().clone();
        tracing::info!(session_id = %session_id, "Starting conversation runtime");

        loop {
            tokio::select! {
                command = self.command_rx.recv() => match command {
                    Some(command) => self.handle_command(command),
                    // every handle is gone
                    None => break,
                },
                Some(event) = self.event_rx.recv() => {
                    self.process_event(event);
                }
            }
        }

        if let Some((_, token)) = self.request_cancel.take() {
            token.cancel();
        }
        tracing::info!(session_id = %session_id, "Conversation runtime stopped");
    }

    fn handle_command(&mut self, command: Command) {
        match command {
            Command::Dispatch { event, ack } => {
                let bookkeeping = self.process_event(event);
                if bookkeeping.is_empty() {
                    let _ = ack.send(());
                } else {
                    tokio::spawn(async move {
                        for task in bookkeeping {
                            if let Err(e) = task.await {
                                tracing::warn!(error = %e, "Remote bookkeeping task failed");
                            }
                        }
                        let _ = ack.send(());
                    });
                }
            }
            Command::FetchHistory { reply } => {
                let transport = Arc::clone(&self.transport);
                tokio::spawn(async move {
                    let _ = reply.send(transport.conversation_history().await);
                });
            }
            Command::CheckHealth { reply } => {
                let transport = Arc::clone(&self.transport);
                tokio::spawn(async move {
                    let _ = reply.send(transport.health().await);
                });
            }
        }
    }

    /// Apply one event. Returns the remote bookkeeping tasks it started.
    fn process_event(&mut self, event: Event) -> Vec<JoinHandle<()>> {
        let completed = event.completes();
        let result = match transition(&self.state, event, Utc::now()) {
            Ok(result) => result,
            Err(TransitionError::EmptyMessage) => {
                tracing::debug!("Ignoring empty message");
                return Vec::new();
            }
            Err(e @ TransitionError::StaleCompletion(_)) => {
                tracing::debug!(error = %e, "Discarding stale completion");
                return Vec::new();
            }
        };

        if let Some(request_id) = completed {
            if matches!(&self.request_cancel, Some((id, _)) if *id == request_id) {
                self.request_cancel = None;
            }
        }

        self.state = result.new_state;
        self.snapshot_tx.send_replace(self.state.snapshot());

        result
            .effects
            .into_iter()
            .filter_map(|effect| self.execute_effect(effect))
            .collect()
    }

    fn execute_effect(&mut self, effect: Effect) -> Option<JoinHandle<()>> {
        match effect {
            Effect::RequestReply {
                request_id,
                content,
                context,
            } => {
                let transport = Arc::clone(&self.transport);
                let event_tx = self.event_tx.clone();
                let token = self.track_request(request_id);

                tokio::spawn(async move {
                    let event = tokio::select! {
                        () = token.cancelled() => {
                            tracing::debug!(request_id, "Reply request cancelled");
                            return;
                        }
                        result = transport.send_message(&content, &context) => match result {
                            Ok(text) => Event::ReplyReceived { request_id, text },
                            Err(error) => {
                                tracing::warn!(
                                    request_id,
                                    error = %error,
                                    "Reply request failed, answering locally"
                                );
                                Event::ReplyFailed { request_id, error }
                            }
                        },
                    };
                    let _ = event_tx.send(event).await;
                });
                None
            }

            Effect::RequestWelcome {
                request_id,
                context,
            } => {
                let transport = Arc::clone(&self.transport);
                let event_tx = self.event_tx.clone();
                let token = self.track_request(request_id);

                tokio::spawn(async move {
                    let text = tokio::select! {
                        () = token.cancelled() => {
                            tracing::debug!(request_id, "Welcome request cancelled");
                            return;
                        }
                        text = transport.start_conversation(&context) => text,
                    };
                    let _ = event_tx
                        .send(Event::WelcomeReceived { request_id, text })
                        .await;
                });
                None
            }

            Effect::CancelRequest { request_id } => {
                match self.request_cancel.take() {
                    Some((id, token)) if id == request_id => token.cancel(),
                    other => self.request_cancel = other,
                }
                None
            }

            Effect::RemoteClear => {
                let transport = Arc::clone(&self.transport);
                Some(tokio::spawn(async move {
                    transport.clear_conversation().await;
                }))
            }

            Effect::RemoteEnd => {
                let transport = Arc::clone(&self.transport);
                Some(tokio::spawn(async move {
                    transport.end_conversation().await;
                }))
            }

            Effect::Notify(event) => {
                // no subscribers is fine
                let _ = self.events_tx.send(event);
                None
            }
        }
    }

    fn track_request(&mut self, request_id: RequestId) -> CancellationToken {
        let token = CancellationToken::new();
        self.request_cancel = Some((request_id, token.clone()));
        token
    }
}

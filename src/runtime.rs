//! Runtime for executing conversations
//!
//! One runtime task per widget mount owns the conversation state. The
//! presentation layer talks to it through a [`ConversationHandle`].

mod executor;

#[cfg(test)]
pub mod testing;

pub use crate::state_machine::{ConversationSnapshot, WidgetEvent};
pub use executor::ConversationRuntime;

use crate::context::ContextSnapshot;
use crate::message::Message;
use crate::session::SessionId;
use crate::state_machine::Event;
use crate::transport::{ConversationTransport, HealthStatus, TransportError};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

#[derive(Debug, Error)]
pub enum HandleError {
    #[error("Conversation runtime has stopped")]
    Stopped,
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Requests from handles to the runtime task
pub(crate) enum Command {
    /// Feed a user event to the state machine. `ack` fires once the
    /// transition is applied and any remote bookkeeping it triggered is done.
    Dispatch {
        event: Event,
        ack: oneshot::Sender<()>,
    },
    FetchHistory {
        reply: oneshot::Sender<Vec<Message>>,
    },
    CheckHealth {
        reply: oneshot::Sender<Result<HealthStatus, TransportError>>,
    },
}

/// The surface the presentation layer may use
#[derive(Clone)]
pub struct ConversationHandle {
    command_tx: mpsc::Sender<Command>,
    snapshot_rx: watch::Receiver<ConversationSnapshot>,
    events_tx: broadcast::Sender<WidgetEvent>,
    session_id: SessionId,
}

/// Start a runtime for `transport` on the current Tokio runtime
#[must_use]
pub fn spawn<T: ConversationTransport + 'static>(transport: T) -> ConversationHandle {
    let (handle, runtime) = ConversationRuntime::new(transport);
    tokio::spawn(runtime.run());
    handle
}

impl ConversationHandle {
    #[must_use]
    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// Current messages and flags
    #[must_use]
    pub fn snapshot(&self) -> ConversationSnapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Watch channel that always holds the latest snapshot
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<ConversationSnapshot> {
        self.snapshot_rx.clone()
    }

    /// Stream of individual changes
    #[must_use]
    pub fn events(&self) -> broadcast::Receiver<WidgetEvent> {
        self.events_tx.subscribe()
    }

    /// Send a user message. Resolves once the message is in the history;
    /// the reply arrives later. Whitespace-only content is ignored.
    ///
    /// # Errors
    ///
    /// Fails only when the runtime has stopped.
    pub async fn send_message(
        &self,
        content: impl Into<String>,
        context: ContextSnapshot,
    ) -> Result<(), HandleError> {
        self.dispatch(Event::user_message(content, context)).await
    }

    /// Request a welcome message and switch to conversation mode.
    ///
    /// # Errors
    ///
    /// Fails only when the runtime has stopped.
    pub async fn start_conversation(&self, context: ContextSnapshot) -> Result<(), HandleError> {
        self.dispatch(Event::StartRequested { context }).await
    }

    /// Empty the local history and ask the backend to do the same. Resolves
    /// after the remote attempt, whatever its outcome.
    ///
    /// # Errors
    ///
    /// Fails only when the runtime has stopped.
    pub async fn clear_conversation(&self) -> Result<(), HandleError> {
        self.dispatch(Event::ClearRequested).await
    }

    /// Tell the backend the conversation is over. Local state is kept.
    ///
    /// # Errors
    ///
    /// Fails only when the runtime has stopped.
    pub async fn end_conversation(&self) -> Result<(), HandleError> {
        self.dispatch(Event::EndRequested).await
    }

    /// Remote history for this session (empty when unavailable).
    ///
    /// # Errors
    ///
    /// Fails only when the runtime has stopped.
    pub async fn history(&self) -> Result<Vec<Message>, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::FetchHistory { reply }).await?;
        rx.await.map_err(|_| HandleError::Stopped)
    }

    /// Backend health.
    ///
    /// # Errors
    ///
    /// Fails when the runtime has stopped or the backend cannot be reached.
    pub async fn health(&self) -> Result<HealthStatus, HandleError> {
        let (reply, rx) = oneshot::channel();
        self.command(Command::CheckHealth { reply }).await?;
        Ok(rx.await.map_err(|_| HandleError::Stopped)??)
    }

    /// Wait until nothing is in flight or queued.
    ///
    /// # Errors
    ///
    /// Fails when the runtime stops first.
    pub async fn settled(&self) -> Result<ConversationSnapshot, HandleError> {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(ConversationSnapshot::is_settled)
            .await
            .map_err(|_| HandleError::Stopped)?;
        Ok(snapshot.clone())
    }

    async fn dispatch(&self, event: Event) -> Result<(), HandleError> {
        let (ack, rx) = oneshot::channel();
        self.command(Command::Dispatch { event, ack }).await?;
        rx.await.map_err(|_| HandleError::Stopped)
    }

    async fn command(&self, command: Command) -> Result<(), HandleError> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| HandleError::Stopped)
    }
}

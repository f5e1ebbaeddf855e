//! Transport to the assistant backend
//!
//! Wraps the five conversational operations behind one interface. Only
//! `send_message` reports failures; every other call degrades to a safe
//! default so the chat keeps working when the backend is down.

mod error;
mod http;
mod types;

pub use error::{TransportError, TransportErrorKind};
pub use http::HttpTransport;
pub use types::{HealthStatus, UNPROCESSABLE_REPLY};

use crate::context::ContextSnapshot;
use crate::message::Message;
use crate::session::SessionId;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;

/// Remote operations available to a widget session
#[async_trait]
pub trait ConversationTransport: Send + Sync {
    /// Session every request is tagged with
    fn session_id(&self) -> &SessionId;

    /// Ask the assistant for a reply to `message`
    async fn send_message(
        &self,
        message: &str,
        context: &ContextSnapshot,
    ) -> Result<String, TransportError>;

    /// Welcome text for a new conversation. Never fails.
    async fn start_conversation(&self, context: &ContextSnapshot) -> String;

    /// Best-effort signal that the conversation is over
    async fn end_conversation(&self);

    /// Best-effort request to drop the remote history
    async fn clear_conversation(&self);

    /// Remote history, empty on failure
    async fn conversation_history(&self) -> Vec<Message>;

    async fn health(&self) -> Result<HealthStatus, TransportError>;
}

#[async_trait]
impl<T: ConversationTransport + ?Sized> ConversationTransport for Arc<T> {
    fn session_id(&self) -> &SessionId {
        (**self).session_id()
    }

    async fn send_message(
        &self,
        message: &str,
        context: &ContextSnapshot,
    ) -> Result<String, TransportError> {
        (**self).send_message(message, context).await
    }

    async fn start_conversation(&self, context: &ContextSnapshot) -> String {
        (**self).start_conversation(context).await
    }

    async fn end_conversation(&self) {
        (**self).end_conversation().await;
    }

    async fn clear_conversation(&self) {
        (**self).clear_conversation().await;
    }

    async fn conversation_history(&self) -> Vec<Message> {
        (**self).conversation_history().await
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        (**self).health().await
    }
}

/// Logging wrapper for transports
pub struct LoggingTransport<T> {
    inner: T,
}

impl<T: ConversationTransport> LoggingTransport<T> {
    #[must_use]
    pub fn new(inner: T) -> Self {
        Self { inner }
    }

    #[must_use]
    pub fn inner(&self) -> &T {
        &self.inner
    }
}

#[async_trait]
impl<T: ConversationTransport> ConversationTransport for LoggingTransport<T> {
    fn session_id(&self) -> &SessionId {
        self.inner.session_id()
    }

    async fn send_message(
        &self,
        message: &str,
        context: &ContextSnapshot,
    ) -> Result<String, TransportError> {
        let start = Instant::now();
        let result = self.inner.send_message(message, context).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    session_id = %self.session_id(),
                    duration_ms = %duration.as_millis(),
                    message_chars = message.chars().count(),
                    reply_chars = reply.chars().count(),
                    "Chat request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    session_id = %self.session_id(),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    status = ?e.status,
                    "Chat request failed"
                );
            }
        }

        result
    }

    async fn start_conversation(&self, context: &ContextSnapshot) -> String {
        let start = Instant::now();
        let welcome = self.inner.start_conversation(context).await;
        tracing::info!(
            session_id = %self.session_id(),
            page_type = %context.page_type,
            page_errors = context.errors.len(),
            duration_ms = %start.elapsed().as_millis(),
            "Conversation started"
        );
        welcome
    }

    async fn end_conversation(&self) {
        let start = Instant::now();
        self.inner.end_conversation().await;
        tracing::info!(
            session_id = %self.session_id(),
            duration_ms = %start.elapsed().as_millis(),
            "Conversation ended"
        );
    }

    async fn clear_conversation(&self) {
        let start = Instant::now();
        self.inner.clear_conversation().await;
        tracing::info!(
            session_id = %self.session_id(),
            duration_ms = %start.elapsed().as_millis(),
            "Conversation cleared"
        );
    }

    async fn conversation_history(&self) -> Vec<Message> {
        let history = self.inner.conversation_history().await;
        tracing::debug!(
            session_id = %self.session_id(),
            messages = history.len(),
            "Fetched conversation history"
        );
        history
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        let result = self.inner.health().await;
        match &result {
            Ok(health) => tracing::debug!(
                status = %health.status,
                assistant_available = health.assistant_available,
                "Backend health"
            ),
            Err(e) => tracing::warn!(error = %e, "Backend health check failed"),
        }
        result
    }
}

//! Mock implementations for testing
//!
//! These mocks enable runtime tests without real I/O.

use crate::context::ContextSnapshot;
use crate::fallback;
use crate::message::Message;
use crate::session::SessionId;
use crate::transport::{ConversationTransport, HealthStatus, TransportError};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{AcquireError, Semaphore};

// ============================================================================
// Mock Transport
// ============================================================================

/// Mock transport that returns queued replies
#[allow(dead_code)]
pub struct MockTransport {
    session_id: SessionId,
    replies: Mutex<VecDeque<Result<String, TransportError>>>,
    welcome: Mutex<Option<String>>,
    history: Mutex<Vec<Message>>,
    /// Record of every `send_message` call
    pub sent: Mutex<Vec<(String, ContextSnapshot)>>,
    /// Record of every `start_conversation` call
    pub starts: Mutex<Vec<ContextSnapshot>>,
    end_calls: AtomicUsize,
    clear_calls: AtomicUsize,
    /// When set, each reply and each welcome waits for a permit
    gate: Option<Semaphore>,
}

#[allow(dead_code)]
impl MockTransport {
    #[must_use]
    pub fn new() -> Self {
        Self {
            session_id: SessionId::generate(),
            replies: Mutex::new(VecDeque::new()),
            welcome: Mutex::new(None),
            history: Mutex::new(Vec::new()),
            sent: Mutex::new(Vec::new()),
            starts: Mutex::new(Vec::new()),
            end_calls: AtomicUsize::new(0),
            clear_calls: AtomicUsize::new(0),
            gate: None,
        }
    }

    /// Replies and welcomes are held until [`release`](Self::release) hands
    /// out permits
    #[must_use]
    pub fn gated() -> Self {
        Self {
            gate: Some(Semaphore::new(0)),
            ..Self::new()
        }
    }

    /// Let `n` held calls through
    pub fn release(&self, n: usize) {
        if let Some(gate) = &self.gate {
            gate.add_permits(n);
        }
    }

    /// Queue the outcome of the next `send_message`
    pub fn queue_reply(&self, reply: Result<String, TransportError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn set_welcome(&self, welcome: impl Into<String>) {
        *self.welcome.lock().unwrap() = Some(welcome.into());
    }

    pub fn set_history(&self, history: Vec<Message>) {
        *self.history.lock().unwrap() = history;
    }

    /// Messages passed to `send_message`, in call order
    #[must_use]
    pub fn sent_messages(&self) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }

    #[must_use]
    pub fn start_contexts(&self) -> Vec<ContextSnapshot> {
        self.starts.lock().unwrap().clone()
    }

    #[must_use]
    pub fn end_calls(&self) -> usize {
        self.end_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn clear_calls(&self) -> usize {
        self.clear_calls.load(Ordering::SeqCst)
    }

    /// Wait until `send_message` has been entered `n` times
    pub async fn wait_for_calls(&self, n: usize, timeout: Duration) {
        let deadline = tokio::time::Instant::now() + timeout;
        while self.sent.lock().unwrap().len() < n {
            assert!(
                tokio::time::Instant::now() < deadline,
                "timed out waiting for {n} send_message calls"
            );
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    }
}

impl MockTransport {
    async fn pass_gate(&self) -> Result<(), AcquireError> {
        if let Some(gate) = &self.gate {
            gate.acquire().await?.forget();
        }
        Ok(())
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationTransport for MockTransport {
    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    async fn send_message(
        &self,
        message: &str,
        context: &ContextSnapshot,
    ) -> Result<String, TransportError> {
        self.sent
            .lock()
            .unwrap()
            .push((message.to_string(), context.clone()));

        self.pass_gate()
            .await
            .map_err(|_| TransportError::network("Mock gate closed"))?;

        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TransportError::network("No mock reply queued")))
    }

    async fn start_conversation(&self, context: &ContextSnapshot) -> String {
        self.starts.lock().unwrap().push(context.clone());
        if self.pass_gate().await.is_err() {
            return fallback::welcome(context.page_type).to_string();
        }
        self.welcome
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| fallback::welcome(context.page_type).to_string())
    }

    async fn end_conversation(&self) {
        self.end_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn clear_conversation(&self) {
        self.clear_calls.fetch_add(1, Ordering::SeqCst);
    }

    async fn conversation_history(&self) -> Vec<Message> {
        self.history.lock().unwrap().clone()
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            assistant_available: false,
            timestamp: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Role;
    use chrono::Utc;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_mock_transport_replies() {
        let mock = MockTransport::new();
        mock.queue_reply(Ok("Hello".to_string()));
        let ctx = ContextSnapshot::default();

        assert_eq!(mock.send_message("hi", &ctx).await.unwrap(), "Hello");
        // Second call should fail (no more replies)
        assert!(mock.send_message("again", &ctx).await.is_err());
        assert_eq!(mock.sent_messages(), vec!["hi".to_string(), "again".to_string()]);
    }

    #[tokio::test]
    async fn test_mock_history() {
        let mock = MockTransport::new();
        let msg = Message::new(1, Role::User, "hi", Utc::now());
        mock.set_history(vec![msg.clone()]);
        assert_eq!(mock.conversation_history().await, vec![msg]);
    }

    #[tokio::test]
    async fn test_gate_holds_replies() {
        let mock = Arc::new(MockTransport::gated());
        mock.queue_reply(Ok("held".to_string()));

        let task = {
            let mock = Arc::clone(&mock);
            tokio::spawn(async move { mock.send_message("x", &ContextSnapshot::default()).await })
        };
        mock.wait_for_calls(1, Duration::from_secs(2)).await;
        assert!(!task.is_finished());

        mock.release(1);
        assert_eq!(task.await.unwrap().unwrap(), "held");
    }
}

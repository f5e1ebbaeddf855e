//! HTTP/JSON transport to the assistant backend

use super::types::{
    ChatRequest, ChatResponse, HealthStatus, HistoryResponse, LifecycleRequest, StartRequest,
    StartResponse,
};
use super::{ConversationTransport, TransportError};
use crate::config::WidgetConfig;
use crate::context::{ContextDefaults, ContextSnapshot};
use crate::fallback;
use crate::message::{iso_millis, Message};
use crate::session::SessionId;
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Transport talking to the backend over HTTP
pub struct HttpTransport {
    client: Client,
    base_url: String,
    session_id: SessionId,
    defaults: ContextDefaults,
}

impl HttpTransport {
    /// Build a transport with a freshly generated session.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn new(config: &WidgetConfig) -> Result<Self, TransportError> {
        Self::with_session(config, SessionId::generate())
    }

    /// Build a transport bound to an existing session.
    ///
    /// # Errors
    ///
    /// Fails when the HTTP client cannot be constructed.
    pub fn with_session(config: &WidgetConfig, session_id: SessionId) -> Result<Self, TransportError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| TransportError::network(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            session_id,
            defaults: config.context_defaults(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, TransportError>
    where
        B: Serialize + Sync + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;
        Self::read_json(response).await
    }

    async fn get_json<R: DeserializeOwned>(&self, path: &str) -> Result<R, TransportError> {
        let response = self
            .client
            .get(self.url(path))
            .header("content-type", "application/json")
            .send()
            .await
            .map_err(|e| TransportError::from_reqwest(&e))?;
        Self::read_json(response).await
    }

    async fn read_json<R: DeserializeOwned>(response: reqwest::Response) -> Result<R, TransportError> {
        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(TransportError::status(status.as_u16(), &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| TransportError::decode(format!("Failed to parse response: {e} - body: {body}")))
    }

    fn lifecycle(&self, action: &'static str) -> LifecycleRequest<'_> {
        LifecycleRequest {
            action,
            session_id: &self.session_id,
            timestamp: iso_millis::format(&Utc::now()),
        }
    }
}

#[async_trait]
impl ConversationTransport for HttpTransport {
    fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    async fn send_message(
        &self,
        message: &str,
        context: &ContextSnapshot,
    ) -> Result<String, TransportError> {
        let request = ChatRequest {
            message,
            session_id: &self.session_id,
            context: context.enrich(&self.defaults, Utc::now()),
        };
        let response: ChatResponse = self.post_json("/chat", &request).await?;
        Ok(response.into_reply())
    }

    async fn start_conversation(&self, context: &ContextSnapshot) -> String {
        let request = StartRequest {
            action: "start_conversation",
            session_id: &self.session_id,
            context: context.enrich(&self.defaults, Utc::now()),
        };
        let default_welcome = fallback::welcome(context.page_type);

        match self
            .post_json::<_, StartResponse>("/conversation/start", &request)
            .await
        {
            Ok(response) => response
                .welcome_message
                .unwrap_or_else(|| default_welcome.to_string()),
            Err(e) => {
                tracing::warn!(
                    session_id = %self.session_id,
                    error = %e,
                    "Failed to start conversation, using default welcome"
                );
                default_welcome.to_string()
            }
        }
    }

    async fn end_conversation(&self) {
        let request = self.lifecycle("end_conversation");
        if let Err(e) = self
            .post_json::<_, serde_json::Value>("/conversation/end", &request)
            .await
        {
            tracing::warn!(session_id = %self.session_id, error = %e, "Failed to end conversation");
        }
    }

    async fn clear_conversation(&self) {
        let request = self.lifecycle("clear_conversation");
        if let Err(e) = self
            .post_json::<_, serde_json::Value>("/conversation/clear", &request)
            .await
        {
            tracing::warn!(session_id = %self.session_id, error = %e, "Failed to clear conversation");
        }
    }

    async fn conversation_history(&self) -> Vec<Message> {
        let path = format!("/conversation/history/{}", self.session_id);
        match self.get_json::<HistoryResponse>(&path).await {
            Ok(history) => history.into_messages(Utc::now()),
            Err(e) => {
                tracing::warn!(session_id = %self.session_id, error = %e, "Failed to fetch conversation history");
                Vec::new()
            }
        }
    }

    async fn health(&self) -> Result<HealthStatus, TransportError> {
        self.get_json("/health").await
    }
}

//! Wire types for the assistant backend

use crate::message::{next_message_id, Message, Role};
use crate::session::SessionId;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Reply used when `/chat` succeeds but carries no usable text
pub const UNPROCESSABLE_REPLY: &str = "Sorry, I could not process your request.";

#[derive(Debug, Serialize)]
pub(crate) struct ChatRequest<'a> {
    pub message: &'a str,
    pub session_id: &'a SessionId,
    pub context: Value,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ChatResponse {
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ChatResponse {
    /// `response`, then `message`, then the fixed unprocessable reply
    #[must_use]
    pub fn into_reply(self) -> String {
        self.response
            .or(self.message)
            .unwrap_or_else(|| UNPROCESSABLE_REPLY.to_string())
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct StartRequest<'a> {
    pub action: &'static str,
    pub session_id: &'a SessionId,
    pub context: Value,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct StartResponse {
    #[serde(default)]
    pub welcome_message: Option<String>,
}

/// Body shared by the end and clear calls
#[derive(Debug, Serialize)]
pub(crate) struct LifecycleRequest<'a> {
    pub action: &'static str,
    pub session_id: &'a SessionId,
    pub timestamp: String,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct HistoryResponse {
    #[serde(default)]
    pub messages: Vec<HistoryEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct HistoryEntry {
    #[serde(default)]
    pub id: Option<u64>,
    pub role: String,
    pub content: String,
    #[serde(default, alias = "createdAt")]
    pub timestamp: Option<String>,
}

impl HistoryResponse {
    /// Convert backend entries into messages, skipping roles we do not render
    #[must_use]
    pub fn into_messages(self, now: DateTime<Utc>) -> Vec<Message> {
        let mut last_id = None;
        self.messages
            .into_iter()
            .filter_map(|entry| {
                let Some(role) = Role::parse(&entry.role) else {
                    tracing::debug!(role = %entry.role, "Skipping history entry with unknown role");
                    return None;
                };
                let created_at = entry
                    .timestamp
                    .as_deref()
                    .and_then(parse_timestamp)
                    .unwrap_or(now);
                let id = entry
                    .id
                    .filter(|id| last_id.map_or(true, |last| *id > last))
                    .unwrap_or_else(|| next_message_id(last_id, created_at));
                last_id = Some(id);
                Some(Message::new(id, role, entry.content, created_at))
            })
            .collect()
    }
}

/// Accept RFC 3339 as well as naive ISO timestamps (read as UTC)
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Backend health as reported by `GET /health`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    /// Whether the backend's assistant pipeline is loaded
    #[serde(default, alias = "langgraph_available")]
    pub assistant_available: bool,
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl HealthStatus {
    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

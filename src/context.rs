//! Page context snapshots
//!
//! The page-context collaborator hands the core a snapshot of where the widget
//! is mounted. The core passes it through to the backend on every
//! conversational call and only fills in defaults for missing fields.

use crate::message::iso_millis;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

/// Kind of page the widget is mounted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageType {
    Payment,
    Account,
    Support,
    #[default]
    #[serde(other)]
    General,
}

impl PageType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            PageType::Payment => "payment",
            PageType::Account => "account",
            PageType::Support => "support",
            PageType::General => "general",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PageType {
    type Err = std::convert::Infallible;

    /// Unknown names map to `General`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "payment" => PageType::Payment,
            "account" => PageType::Account,
            "support" => PageType::Support,
            _ => PageType::General,
        })
    }
}

/// An error observed on the host page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageError {
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Collaborator-specific fields (stack, source, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageError {
    #[must_use]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            timestamp: None,
            extra: Map::new(),
        }
    }
}

/// Opaque page metadata sent along with every conversational call
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextSnapshot {
    #[serde(default)]
    pub page_type: PageType,
    #[serde(default)]
    pub errors: Vec<PageError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContextSnapshot {
    #[must_use]
    pub fn new(page_type: PageType) -> Self {
        Self {
            page_type,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_errors(mut self, errors: impl IntoIterator<Item = PageError>) -> Self {
        self.errors.extend(errors);
        self
    }

    #[must_use]
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Serialize the snapshot and stamp it with call-time metadata.
    ///
    /// `timestamp` is always `now`. `user_agent` and `url` come from the
    /// snapshot when present, otherwise from `defaults`. The user agent is
    /// sent once, under `user_agent`.
    #[must_use]
    pub fn enrich(&self, defaults: &ContextDefaults, now: DateTime<Utc>) -> Value {
        let mut map = match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        };

        let user_agent = self
            .user_agent
            .clone()
            .unwrap_or_else(|| defaults.user_agent.clone());
        let url = self
            .url
            .clone()
            .or_else(|| defaults.page_url.clone())
            .unwrap_or_default();

        // the backend reads the snake_case key only
        map.remove("userAgent");
        map.insert("timestamp".to_string(), Value::String(iso_millis::format(&now)));
        map.insert("user_agent".to_string(), Value::String(user_agent));
        map.insert("url".to_string(), Value::String(url));
        Value::Object(map)
    }
}

/// Values used for context fields the page did not supply
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextDefaults {
    pub user_agent: String,
    pub page_url: Option<String>,
}

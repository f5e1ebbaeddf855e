//! Widget configuration

use crate::context::{ContextDefaults, PageType};
use reqwest::Url;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid API base URL {url:?}: {reason}")]
    InvalidBaseUrl { url: String, reason: String },
    #[error("Invalid value for {var}: {value:?}")]
    InvalidValue { var: &'static str, value: String },
}

/// Configuration for one widget mount
#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    /// Backend base URL, without a trailing slash
    pub api_base_url: String,
    pub request_timeout: Duration,
    /// Sent as the HTTP user agent and as the context default
    pub user_agent: String,
    /// Page URL reported when the context snapshot has none
    pub page_url: Option<String>,
    /// Page type used by the terminal driver for its context snapshots
    pub page_type: PageType,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_URL.to_string(),
            request_timeout: DEFAULT_TIMEOUT,
            user_agent: default_user_agent(),
            page_url: None,
            page_type: PageType::General,
        }
    }
}

impl WidgetConfig {
    /// Load configuration from `FEEDBACK_WIDGET_*` environment variables.
    ///
    /// # Errors
    ///
    /// Fails when a variable is set to a value that cannot be used.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Fails when a variable is set to a value that cannot be used.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(url) = lookup("FEEDBACK_WIDGET_API_URL") {
            config.api_base_url = url;
        }

        if let Some(raw) = lookup("FEEDBACK_WIDGET_TIMEOUT_SECS") {
            let secs: u64 = raw
                .trim()
                .parse()
                .ok()
                .filter(|s| *s > 0)
                .ok_or(ConfigError::InvalidValue {
                    var: "FEEDBACK_WIDGET_TIMEOUT_SECS",
                    value: raw.clone(),
                })?;
            config.request_timeout = Duration::from_secs(secs);
        }

        if let Some(agent) = lookup("FEEDBACK_WIDGET_USER_AGENT").filter(|a| !a.trim().is_empty()) {
            config.user_agent = agent;
        }

        config.page_url = lookup("FEEDBACK_WIDGET_PAGE_URL").filter(|u| !u.trim().is_empty());

        if let Some(page_type) = lookup("FEEDBACK_WIDGET_PAGE_TYPE") {
            config.page_type = page_type.parse().unwrap_or_default();
        }

        config.validate()
    }

    /// Normalize and check the base URL.
    ///
    /// # Errors
    ///
    /// Fails when the base URL is not an absolute http(s) URL.
    pub fn validate(mut self) -> Result<Self, ConfigError> {
        let trimmed = self.api_base_url.trim().trim_end_matches('/').to_string();
        let parsed = Url::parse(&trimmed).map_err(|e| ConfigError::InvalidBaseUrl {
            url: self.api_base_url.clone(),
            reason: e.to_string(),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBaseUrl {
                url: self.api_base_url,
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }
        self.api_base_url = trimmed;
        Ok(self)
    }

    /// Defaults applied while enriching context snapshots
    #[must_use]
    pub fn context_defaults(&self) -> ContextDefaults {
        ContextDefaults {
            user_agent: self.user_agent.clone(),
            page_url: self.page_url.clone(),
        }
    }
}

fn default_user_agent() -> String {
    format!("feedback-chat/{}", env!("CARGO_PKG_VERSION"))
}

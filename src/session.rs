//! Session identity
//!
//! Every widget mount owns exactly one session token. The backend uses it to
//! correlate all requests coming from that mount.

use chrono::Utc;
use rand::distributions::Uniform;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

const SUFFIX_LEN: usize = 9;
const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// Opaque session token of the form `session_<epoch-millis>_<suffix>`
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session token. Every call yields a new value.
    #[must_use]
    pub fn generate() -> Self {
        let millis = Utc::now().timestamp_millis();
        let digits = Uniform::from(0..BASE36.len());
        let suffix: String = rand::thread_rng()
            .sample_iter(digits)
            .take(SUFFIX_LEN)
            .map(|i| char::from(BASE36[i]))
            .collect();
        Self(format!("session_{millis}_{suffix}"))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SessionId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

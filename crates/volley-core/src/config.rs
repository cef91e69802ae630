use std::collections::HashMap;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Auth
// ---------------------------------------------------------------------------

/// Authentication applied to every request sent against a host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Auth {
    /// `Authorization: Bearer <token>`.
    Bearer { token: String },
    /// HTTP basic auth; password may be omitted.
    Basic {
        username: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        password: Option<String>,
    },
}

// ---------------------------------------------------------------------------
// HostConfig
// ---------------------------------------------------------------------------

/// Connection settings for one target host.
///
/// Immutable once loaded; shared read-only across all concurrent executions
/// against that host.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HostConfig {
    /// Base URL the step paths are appended to, e.g. `https://api.example.com`.
    pub base_url: String,
    /// Default request timeout in seconds; steps may override per request.
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,
    /// Headers applied to every request (step headers take precedence).
    #[serde(default)]
    pub headers: HashMap<String, String>,
    /// Whether to verify TLS certificates.
    #[serde(default = "default_true")]
    pub verify_ssl: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
}

fn default_timeout_seconds() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

impl HostConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            timeout_seconds: default_timeout_seconds(),
            headers: HashMap::new(),
            verify_ssl: true,
            auth: None,
        }
    }

    /// Base URL with any trailing slash removed, so `base_url + path` never
    /// produces a double slash.
    pub fn trimmed_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }
}

use serde::Serialize;

#[derive(Debug, thiserror::Error)]
pub enum VolleyError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unresolved template variable '{0}'")]
    Template(String),

    #[error("Extraction failed at '{path}': {reason}")]
    Extraction { path: String, reason: String },

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl VolleyError {
    /// Short classification string used to key the load-test error histogram.
    pub fn kind(&self) -> &'static str {
        match self {
            VolleyError::Http(_) => "http",
            VolleyError::Io(_) => "io",
            VolleyError::Serde(_) => "serde",
            VolleyError::Configuration(_) => "configuration",
            VolleyError::Template(_) => "template",
            VolleyError::Extraction { .. } => "extraction",
            VolleyError::Timeout(_) => "timeout",
            VolleyError::Transport(_) => "transport",
        }
    }
}

impl Serialize for VolleyError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

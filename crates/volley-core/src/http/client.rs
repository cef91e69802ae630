use std::collections::HashMap;
use std::time::{Duration, Instant};

use serde_json::Value;

use crate::config::{Auth, HostConfig};
use crate::error::VolleyError;
use crate::scenario::model::HttpMethod;

// ---------------------------------------------------------------------------
// Request / response data
// ---------------------------------------------------------------------------

/// A fully template-resolved request, ready to send.
#[derive(Debug, Clone)]
pub struct ResolvedRequest {
    pub method: HttpMethod,
    /// Path appended to the client's base URL.
    pub path: String,
    pub headers: HashMap<String, String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Per-request timeout; falls back to the host default.
    pub timeout_override: Option<Duration>,
}

impl ResolvedRequest {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            headers: HashMap::new(),
            query: Vec::new(),
            body: None,
            timeout_override: None,
        }
    }
}

/// Response data needed by the assertion and extraction machinery.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Response headers with lowercased names.
    pub headers: HashMap<String, String>,
    /// Parsed JSON body, or a string value for non-JSON payloads; `Null` for
    /// an empty body.
    pub body: Value,
    pub size_bytes: u64,
    pub elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// HttpClient
// ---------------------------------------------------------------------------

/// Pooled HTTP client bound to one [`HostConfig`].
///
/// The underlying `reqwest::Client` is cheap to clone and safe to share
/// across all concurrent executions against the host.
pub struct HttpClient {
    inner: reqwest::Client,
    base_url: String,
    default_headers: HashMap<String, String>,
    auth: Option<Auth>,
    default_timeout_secs: u64,
}

impl HttpClient {
    pub fn from_host_config(config: &HostConfig) -> Result<Self, VolleyError> {
        let inner = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .pool_max_idle_per_host(100)
            .pool_idle_timeout(Duration::from_secs(90))
            .user_agent(format!("volley/{}", env!("CARGO_PKG_VERSION")))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .gzip(true)
            .brotli(true)
            .build()?;

        Ok(Self {
            inner,
            base_url: config.trimmed_base_url().to_string(),
            default_headers: config.headers.clone(),
            auth: config.auth.clone(),
            default_timeout_secs: config.timeout_seconds,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL a resolved request will hit.
    pub fn url_for(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Send one request and return the response with timing data.
    ///
    /// An HTTP error status is a normal response here — only network-level
    /// failures and timeouts produce `Err`.
    pub async fn send(&self, request: &ResolvedRequest) -> Result<HttpResponse, VolleyError> {
        let method = match request.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Put => reqwest::Method::PUT,
            HttpMethod::Patch => reqwest::Method::PATCH,
            HttpMethod::Delete => reqwest::Method::DELETE,
            HttpMethod::Head => reqwest::Method::HEAD,
            HttpMethod::Options => reqwest::Method::OPTIONS,
        };

        let mut builder = self.inner.request(method, self.url_for(&request.path));

        // Host defaults first, so step headers win on collision.
        for (key, value) in &self.default_headers {
            builder = builder.header(key, value);
        }
        for (key, value) in &request.headers {
            builder = builder.header(key, value);
        }

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }

        if let Some(auth) = &self.auth {
            builder = match auth {
                Auth::Bearer { token } => builder.bearer_auth(token),
                Auth::Basic { username, password } => {
                    builder.basic_auth(username, password.as_deref())
                }
            };
        }

        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let timeout_secs = request
            .timeout_override
            .map(|d| d.as_secs())
            .unwrap_or(self.default_timeout_secs);
        if let Some(timeout) = request.timeout_override {
            builder = builder.timeout(timeout);
        }

        let start = Instant::now();
        let response = builder.send().await.map_err(|e| {
            if e.is_timeout() {
                VolleyError::Timeout(timeout_secs)
            } else {
                VolleyError::Transport(e.to_string())
            }
        })?;

        let status = response.status().as_u16();
        let headers: HashMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_lowercase(), v.to_string()))
            })
            .collect();

        let body_bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                VolleyError::Timeout(timeout_secs)
            } else {
                VolleyError::Transport(format!("error reading response body: {e}"))
            }
        })?;
        let elapsed_ms = start.elapsed().as_millis() as u64;
        let size_bytes = body_bytes.len() as u64;

        let body = parse_body(&body_bytes);

        Ok(HttpResponse {
            status,
            headers,
            body,
            size_bytes,
            elapsed_ms,
        })
    }
}

/// Parse a response body: JSON where possible, a string value otherwise,
/// `Null` when empty.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(_) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

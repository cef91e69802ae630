use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// HttpMethod
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// Assertions
// ---------------------------------------------------------------------------

/// Comparison operator applied by an [`Assertion`].
///
/// The set is closed: an unknown operator fails at scenario load time, not
/// mid-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssertionOperator {
    Eq,
    Ne,
    Gt,
    Lt,
    Gte,
    Lte,
    Contains,
    NotContains,
    In,
    NotIn,
    Regex,
    Exists,
}

impl std::fmt::Display for AssertionOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AssertionOperator::Eq => "eq",
            AssertionOperator::Ne => "ne",
            AssertionOperator::Gt => "gt",
            AssertionOperator::Lt => "lt",
            AssertionOperator::Gte => "gte",
            AssertionOperator::Lte => "lte",
            AssertionOperator::Contains => "contains",
            AssertionOperator::NotContains => "not_contains",
            AssertionOperator::In => "in",
            AssertionOperator::NotIn => "not_in",
            AssertionOperator::Regex => "regex",
            AssertionOperator::Exists => "exists",
        };
        write!(f, "{s}")
    }
}

/// A declarative check against one response field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Assertion {
    /// Dot-notation path rooted at `status` or `body`.
    pub field: String,
    pub operator: AssertionOperator,
    /// Comparison value; absent only for `exists`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    /// Custom failure message overriding the generated one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

/// A single HTTP request specification plus validation and extraction rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Step {
    pub name: String,
    pub method: HttpMethod,
    /// Request path appended to the host's base URL; may contain `{{var}}`
    /// references.
    pub path: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    #[serde(default)]
    pub query_params: HashMap<String, Value>,
    /// Request body; template references are resolved at any nesting depth.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    /// Per-step timeout override; falls back to the host default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_seconds: Option<u64>,
    #[serde(default)]
    pub delay_before_ms: u64,
    #[serde(default)]
    pub delay_after_ms: u64,
    #[serde(default)]
    pub assertions: Vec<Assertion>,
    /// Variable name → dot path extracted from the response on success.
    #[serde(default)]
    pub extract: HashMap<String, String>,
    /// Continue the scenario even if this step fails.
    #[serde(default)]
    pub skip_on_failure: bool,
    /// Additional attempts after the first on transport/timeout failure.
    #[serde(default)]
    pub retry: u32,
}

impl Step {
    pub fn new(name: impl Into<String>, method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            method,
            path: path.into(),
            headers: HashMap::new(),
            query_params: HashMap::new(),
            body: None,
            timeout_seconds: None,
            delay_before_ms: 0,
            delay_after_ms: 0,
            assertions: Vec::new(),
            extract: HashMap::new(),
            skip_on_failure: false,
            retry: 0,
        }
    }
}

// ---------------------------------------------------------------------------
// Load test configuration
// ---------------------------------------------------------------------------

/// Shape of the target-rate curve during ramp-up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Distribution {
    /// Flat at `target_tps` from the first tick; ramp-up shaping does not
    /// apply even when `ramp_up_seconds` is set.
    #[default]
    Constant,
    /// Rate grows proportionally with ramp progress.
    Linear,
    /// Rate grows with the square of ramp progress — slower early, catching
    /// up to the target by the end of ramp-up.
    Exponential,
}

/// What each dispatched load-test unit executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadMode {
    /// Fire the scenario's first step only.
    #[default]
    FirstStep,
    /// Run the full step chain, sequentially, per dispatched unit.
    FullScenario,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoadTestConfig {
    pub duration_seconds: u64,
    pub target_tps: f64,
    #[serde(default)]
    pub ramp_up_seconds: u64,
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
    #[serde(default)]
    pub distribution: Distribution,
    #[serde(default)]
    pub mode: LoadMode,
}

fn default_max_concurrent() -> usize {
    100
}

// ---------------------------------------------------------------------------
// Scenario
// ---------------------------------------------------------------------------

/// An ordered list of HTTP steps plus variables, run once end-to-end.
///
/// Immutable during a run — the live variable set used by the engines is a
/// separate mutable copy seeded from `variables`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Scenario {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// Host tag resolved by the caller against its host configurations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub variables: HashMap<String, Value>,
    pub steps: Vec<Step>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub load_test: Option<LoadTestConfig>,
}

impl Scenario {
    pub fn new(name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            host: None,
            tags: Vec::new(),
            variables: HashMap::new(),
            steps,
            load_test: None,
        }
    }
}

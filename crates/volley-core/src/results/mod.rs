pub mod export;

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::assertions::AssertionDetail;

/// Maximum length of a string response body kept in a [`StepResult`] snapshot.
pub const MAX_BODY_SNAPSHOT_LEN: usize = 4096;

// ---------------------------------------------------------------------------
// TestStatus
// ---------------------------------------------------------------------------

/// Final classification of a step, scenario, or dispatched load-test unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TestStatus {
    /// Every assertion passed (or none were configured).
    Success,
    /// A response was received but at least one assertion failed.
    Failure,
    /// No usable response: transport/timeout failure, template failure, or a
    /// rejected dispatch.
    Error,
}

impl std::fmt::Display for TestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TestStatus::Success => "success",
            TestStatus::Failure => "failure",
            TestStatus::Error => "error",
        };
        write!(f, "{s}")
    }
}

// ---------------------------------------------------------------------------
// StepResult
// ---------------------------------------------------------------------------

/// Everything observed while executing one step.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StepResult {
    pub step_name: String,
    pub method: String,
    /// The resolved URL that was requested.
    pub url: String,
    pub status: TestStatus,
    /// HTTP status code, absent when no response was received.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    pub response_time_ms: u64,
    /// Response-body snapshot (string bodies truncated to 4 KiB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Short classification of the error, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    pub assertions_passed: usize,
    pub assertions_failed: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertion_details: Vec<AssertionDetail>,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extracted_variables: HashMap<String, Value>,
    /// Attempts actually used (1 = no retries needed).
    pub attempts: u32,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// ScenarioResult
// ---------------------------------------------------------------------------

/// The artifact of one end-to-end scenario run. Fully populated by run end
/// and immutable thereafter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScenarioResult {
    pub run_id: Uuid,
    pub scenario_name: String,
    pub status: TestStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    /// Results for every attempted step, in execution order. Steps after a
    /// non-skipped failure are not attempted and do not appear.
    pub steps: Vec<StepResult>,
    /// Final state of the live variable set.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub variables: HashMap<String, Value>,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_requests: u64,
}

// ---------------------------------------------------------------------------
// Load-test results
// ---------------------------------------------------------------------------

/// Sealed metrics snapshot for one elapsed second of a load test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TimelineBucket {
    pub second: u64,
    /// Units credited to this second (by completion time).
    pub requests: u64,
    pub successes: u64,
    pub failures: u64,
    pub avg_response_ms: f64,
}

/// Complete result of a rate-controlled load test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoadTestResult {
    pub run_id: Uuid,
    pub scenario_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub duration_seconds: f64,
    pub target_tps: f64,
    pub actual_avg_tps: f64,
    pub total_requests: u64,
    pub successful_requests: u64,
    pub failed_requests: u64,
    pub error_requests: u64,
    /// Percentage of successful units over the total.
    pub success_rate: f64,
    pub avg_response_ms: f64,
    pub min_response_ms: u64,
    pub max_response_ms: u64,
    pub p50_response_ms: u64,
    pub p95_response_ms: u64,
    pub p99_response_ms: u64,
    #[serde(default)]
    pub status_code_distribution: BTreeMap<u16, u64>,
    /// Error-kind → count (e.g. `timeout`, `transport`, `concurrency_limit`).
    #[serde(default)]
    pub error_distribution: BTreeMap<String, u64>,
    /// Per-second metrics, ordered by second.
    #[serde(default)]
    pub timeline: Vec<TimelineBucket>,
}

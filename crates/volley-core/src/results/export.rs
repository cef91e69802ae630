use chrono::SecondsFormat;
use serde::Serialize;

use super::{LoadTestResult, ScenarioResult};

// ---------------------------------------------------------------------------
// JSON export
// ---------------------------------------------------------------------------

/// Export any result document as pretty-printed JSON.
pub fn export_json<T: Serialize>(result: &T) -> Result<String, serde_json::Error> {
    serde_json::to_string_pretty(result)
}

// ---------------------------------------------------------------------------
// CSV export
// ---------------------------------------------------------------------------

/// Export a scenario run as CSV: summary comment lines, a header row, and
/// one data row per executed step.
pub fn export_scenario_csv(result: &ScenarioResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("# volley scenario run — {}\n", result.scenario_name));
    out.push_str(&format!("# Run ID: {}\n", result.run_id.hyphenated()));
    out.push_str(&format!(
        "# Started:  {}\n",
        result.started_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    out.push_str(&format!(
        "# Finished: {}\n",
        result.finished_at.to_rfc3339_opts(SecondsFormat::Millis, true)
    ));
    out.push_str(&format!("# Status: {}\n", result.status));
    out.push_str(&format!("# Duration: {:.3}s\n", result.duration_seconds));
    out.push_str(&format!(
        "# Requests: {} total, {} successful, {} failed, {} errors\n",
        result.total_requests,
        result.successful_requests,
        result.failed_requests,
        result.error_requests
    ));
    out.push('\n');

    out.push_str(
        "timestamp,step_name,method,status,status_code,response_time_ms,assertions_passed,assertions_failed,attempts,error\n",
    );

    for step in &result.steps {
        let ts = step.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true);
        let code = step
            .status_code
            .map(|c| c.to_string())
            .unwrap_or_default();
        let error = step
            .error_message
            .as_deref()
            .map(csv_escape)
            .unwrap_or_default();
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{}\n",
            ts,
            csv_escape(&step.step_name),
            step.method,
            step.status,
            code,
            step.response_time_ms,
            step.assertions_passed,
            step.assertions_failed,
            step.attempts,
            error
        ));
    }

    out
}

/// Export a load-test run as CSV: summary comment lines, a header row, and
/// one data row per timeline second.
pub fn export_load_test_csv(result: &LoadTestResult) -> String {
    let mut out = String::new();

    out.push_str(&format!("# volley load test — {}\n", result.scenario_name));
    out.push_str(&format!("# Run ID: {}\n", result.run_id.hyphenated()));
    out.push_str(&format!(
        "# Target TPS: {:.2}  Actual avg TPS: {:.2}\n",
        result.target_tps, result.actual_avg_tps
    ));
    out.push_str(&format!(
        "# Requests: {} total, {} successful, {} failed, {} errors ({:.2}% success)\n",
        result.total_requests,
        result.successful_requests,
        result.failed_requests,
        result.error_requests,
        result.success_rate
    ));
    out.push_str(&format!(
        "# Response time: avg {:.2}ms  min {}ms  max {}ms  p50 {}ms  p95 {}ms  p99 {}ms\n",
        result.avg_response_ms,
        result.min_response_ms,
        result.max_response_ms,
        result.p50_response_ms,
        result.p95_response_ms,
        result.p99_response_ms
    ));
    out.push('\n');

    out.push_str("second,requests,successes,failures,avg_response_ms\n");
    for bucket in &result.timeline {
        out.push_str(&format!(
            "{},{},{},{},{:.2}\n",
            bucket.second,
            bucket.requests,
            bucket.successes,
            bucket.failures,
            bucket.avg_response_ms
        ));
    }

    out
}

/// Wrap a field value in quotes and escape any embedded quotes.
fn csv_escape(value: &str) -> String {
    if value.contains(',') || value.contains('"') || value.contains('\n') {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

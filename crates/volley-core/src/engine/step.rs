use std::collections::HashMap;
use std::time::Duration;

use chrono::Utc;
use serde_json::Value;
use tokio::time::sleep;

use crate::assertions::validate_all;
use crate::error::VolleyError;
use crate::http::{HttpClient, ResolvedRequest};
use crate::results::{StepResult, TestStatus, MAX_BODY_SNAPSHOT_LEN};
use crate::scenario::model::Step;
use crate::template;

/// Fixed delay between retry attempts after a transport/timeout failure.
const RETRY_DELAY: Duration = Duration::from_secs(1);

// ---------------------------------------------------------------------------
// execute_step
// ---------------------------------------------------------------------------

/// Execute one step against the live variable set.
///
/// The sequence: resolve templates, honor `delay_before`, attempt the call
/// with the retry budget, evaluate assertions on any received response,
/// merge extractions into `variables` on success, honor `delay_after`.
///
/// Never fails for ordinary HTTP or assertion outcomes — everything is
/// captured in the returned [`StepResult`]. A template failure produces an
/// `error` result immediately; retries apply to transport/timeout failures
/// only.
pub async fn execute_step(
    client: &HttpClient,
    step: &Step,
    variables: &mut HashMap<String, Value>,
) -> StepResult {
    let timestamp = Utc::now();

    let resolved = match resolve_request(step, variables) {
        Ok(resolved) => resolved,
        Err(e) => {
            return StepResult {
                step_name: step.name.clone(),
                method: step.method.to_string(),
                url: client.url_for(&step.path),
                status: TestStatus::Error,
                status_code: None,
                response_time_ms: 0,
                response_body: None,
                error_message: Some(e.to_string()),
                error_kind: Some(e.kind().to_string()),
                assertions_passed: 0,
                assertions_failed: 0,
                assertion_details: Vec::new(),
                extracted_variables: HashMap::new(),
                attempts: 1,
                timestamp,
            }
        }
    };
    let url = client.url_for(&resolved.path);

    if step.delay_before_ms > 0 {
        sleep(Duration::from_millis(step.delay_before_ms)).await;
    }

    let max_attempts = step.retry + 1;
    let mut attempts = 0;
    let mut last_error: Option<VolleyError> = None;
    let response = loop {
        attempts += 1;
        match client.send(&resolved).await {
            Ok(response) => break Some(response),
            Err(e) => {
                tracing::warn!(
                    step = %step.name,
                    attempt = attempts,
                    error = %e,
                    "request attempt failed"
                );
                last_error = Some(e);
                if attempts < max_attempts {
                    sleep(RETRY_DELAY).await;
                } else {
                    break None;
                }
            }
        }
    };

    let result = match response {
        Some(response) => {
            let (passed, failed, details) =
                validate_all(&step.assertions, response.status, &response.body);
            let status = if failed > 0 {
                TestStatus::Failure
            } else {
                TestStatus::Success
            };

            let mut extracted = HashMap::new();
            if status == TestStatus::Success {
                for (name, path) in &step.extract {
                    match template::extract(response.status, &response.body, path) {
                        Ok(value) => {
                            variables.insert(name.clone(), value.clone());
                            extracted.insert(name.clone(), value);
                        }
                        Err(e) => {
                            // Variable extraction failures are warnings only;
                            // the variable stays unset.
                            tracing::warn!(
                                step = %step.name,
                                variable = %name,
                                error = %e,
                                "variable extraction failed"
                            );
                        }
                    }
                }
            }

            StepResult {
                step_name: step.name.clone(),
                method: step.method.to_string(),
                url: url.clone(),
                status,
                status_code: Some(response.status),
                response_time_ms: response.elapsed_ms,
                response_body: Some(snapshot_body(response.body)),
                error_message: None,
                error_kind: None,
                assertions_passed: passed,
                assertions_failed: failed,
                assertion_details: details,
                extracted_variables: extracted,
                attempts,
                timestamp,
            }
        }
        None => {
            let (message, kind) = match last_error {
                Some(e) => (e.to_string(), e.kind().to_string()),
                None => ("request failed".to_string(), "transport".to_string()),
            };
            StepResult {
                step_name: step.name.clone(),
                method: step.method.to_string(),
                url: url.clone(),
                status: TestStatus::Error,
                status_code: None,
                response_time_ms: 0,
                response_body: None,
                error_message: Some(message),
                error_kind: Some(kind),
                assertions_passed: 0,
                assertions_failed: 0,
                assertion_details: Vec::new(),
                extracted_variables: HashMap::new(),
                attempts,
                timestamp,
            }
        }
    };

    if step.delay_after_ms > 0 {
        sleep(Duration::from_millis(step.delay_after_ms)).await;
    }

    result
}

/// Resolve every templated piece of a step into a sendable request.
fn resolve_request(
    step: &Step,
    variables: &HashMap<String, Value>,
) -> Result<ResolvedRequest, VolleyError> {
    let path = template::substitute_str(&step.path, variables)?;
    let headers = template::substitute_string_map(&step.headers, variables)?;

    let mut query = Vec::with_capacity(step.query_params.len());
    for (key, value) in &step.query_params {
        let resolved = template::substitute_value(value, variables)?;
        query.push((
            template::substitute_str(key, variables)?,
            template::value_to_string(&resolved),
        ));
    }

    let body = step
        .body
        .as_ref()
        .map(|b| template::substitute_value(b, variables))
        .transpose()?;

    Ok(ResolvedRequest {
        method: step.method,
        path,
        headers,
        query,
        body,
        timeout_override: step.timeout_seconds.map(Duration::from_secs),
    })
}

/// Body snapshot kept in the result; oversized string bodies are truncated.
fn snapshot_body(body: Value) -> Value {
    match body {
        Value::String(s) if s.chars().count() > MAX_BODY_SNAPSHOT_LEN => {
            let mut truncated: String = s.chars().take(MAX_BODY_SNAPSHOT_LEN).collect();
            truncated.push_str("…[truncated]");
            Value::String(truncated)
        }
        other => other,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

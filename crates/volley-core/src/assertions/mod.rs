//! Assertion engine — evaluates typed comparisons against a response's
//! status code and parsed body.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::scenario::model::{Assertion, AssertionOperator};
use crate::template;

// ---------------------------------------------------------------------------
// AssertionDetail
// ---------------------------------------------------------------------------

/// Result of evaluating a single assertion, kept for the step report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AssertionDetail {
    pub field: String,
    pub operator: AssertionOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<Value>,
    pub passed: bool,
    pub message: String,
}

// ---------------------------------------------------------------------------
// validate_assertion
// ---------------------------------------------------------------------------

/// Evaluate one assertion against the response.
///
/// Returns `(passed, message)` — never panics. An extraction failure on the
/// asserted field counts as an assertion failure.
pub fn validate_assertion(assertion: &Assertion, status: u16, body: &Value) -> (bool, String) {
    let extracted = template::extract(status, body, &assertion.field);

    // `exists` passes iff extraction succeeds; the comparison value is ignored.
    if assertion.operator == AssertionOperator::Exists {
        return match extracted {
            Ok(_) => (true, format!("{} exists", assertion.field)),
            Err(e) => (false, fail_message(assertion, &format!("{e}"))),
        };
    }

    let actual = match extracted {
        Ok(v) => v,
        Err(e) => return (false, fail_message(assertion, &format!("{e}"))),
    };

    let expected = match &assertion.value {
        Some(v) => v,
        None => {
            return (
                false,
                fail_message(
                    assertion,
                    &format!("operator '{}' requires a comparison value", assertion.operator),
                ),
            )
        }
    };

    match compare(&actual, assertion.operator, expected) {
        Ok(true) => (
            true,
            format!("{} {} {}", assertion.field, assertion.operator, expected),
        ),
        Ok(false) => (
            false,
            fail_message(
                assertion,
                &format!(
                    "expected {} {}, got {}",
                    assertion.operator, expected, actual
                ),
            ),
        ),
        Err(reason) => (false, fail_message(assertion, &reason)),
    }
}

/// Custom message if the assertion carries one, else the generated detail.
fn fail_message(assertion: &Assertion, detail: &str) -> String {
    match &assertion.message {
        Some(custom) => custom.clone(),
        None => format!("{}: {}", assertion.field, detail),
    }
}

/// Apply `operator` to `actual` and `expected`.
///
/// `Err` carries a type-mismatch description that becomes the failure
/// message.
fn compare(actual: &Value, operator: AssertionOperator, expected: &Value) -> Result<bool, String> {
    match operator {
        AssertionOperator::Eq => Ok(actual == expected),
        AssertionOperator::Ne => Ok(actual != expected),

        AssertionOperator::Gt
        | AssertionOperator::Lt
        | AssertionOperator::Gte
        | AssertionOperator::Lte => {
            let (a, e) = match (actual.as_f64(), expected.as_f64()) {
                (Some(a), Some(e)) => (a, e),
                _ => {
                    return Err(format!(
                        "numeric comparison requires numbers, got {actual} and {expected}"
                    ))
                }
            };
            Ok(match operator {
                AssertionOperator::Gt => a > e,
                AssertionOperator::Lt => a < e,
                AssertionOperator::Gte => a >= e,
                AssertionOperator::Lte => a <= e,
                _ => unreachable!(),
            })
        }

        AssertionOperator::Contains => Ok(contains(actual, expected)),
        AssertionOperator::NotContains => Ok(!contains(actual, expected)),

        AssertionOperator::In => match expected.as_array() {
            Some(candidates) => Ok(candidates.contains(actual)),
            None => Err(format!(
                "'in' requires a sequence of candidates, got {expected}"
            )),
        },
        AssertionOperator::NotIn => match expected.as_array() {
            Some(candidates) => Ok(!candidates.contains(actual)),
            None => Err(format!(
                "'not_in' requires a sequence of candidates, got {expected}"
            )),
        },

        AssertionOperator::Regex => {
            let pattern = expected
                .as_str()
                .ok_or_else(|| format!("regex pattern must be a string, got {expected}"))?;
            let target = match actual {
                Value::String(s) => s.clone(),
                Value::Number(_) | Value::Bool(_) => template::value_to_string(actual),
                other => return Err(format!("{other} is not coercible to a string")),
            };
            let re = Regex::new(pattern).map_err(|e| format!("invalid regex pattern: {e}"))?;
            Ok(re.is_match(&target))
        }

        // Handled before compare() is reached.
        AssertionOperator::Exists => Ok(true),
    }
}

/// Substring test for string targets, membership test for sequence targets.
/// Any other target type does not contain anything.
fn contains(actual: &Value, expected: &Value) -> bool {
    match actual {
        Value::String(s) => s.contains(&template::value_to_string(expected)),
        Value::Array(items) => items.contains(expected),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// validate_all
// ---------------------------------------------------------------------------

/// Evaluate every assertion independently — no short-circuit, so one failure
/// never hides later diagnostics.
///
/// Returns `(passed_count, failed_count, ordered details)`.
pub fn validate_all(
    assertions: &[Assertion],
    status: u16,
    body: &Value,
) -> (usize, usize, Vec<AssertionDetail>) {
    let mut passed = 0;
    let mut failed = 0;
    let mut details = Vec::with_capacity(assertions.len());

    for assertion in assertions {
        let (is_passed, message) = validate_assertion(assertion, status, body);
        if is_passed {
            passed += 1;
        } else {
            failed += 1;
        }
        details.push(AssertionDetail {
            field: assertion.field.clone(),
            operator: assertion.operator,
            expected: assertion.value.clone(),
            passed: is_passed,
            message,
        });
    }

    (passed, failed, details)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

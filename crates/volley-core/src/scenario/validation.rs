use regex::Regex;

use crate::error::VolleyError;
use crate::scenario::model::{Assertion, AssertionOperator, LoadTestConfig, Scenario, Step};
use crate::template;

/// Validate a [`Scenario`] and return every violation found.
///
/// An empty `Vec` means the scenario is runnable. The engines refuse to
/// start while violations exist — configuration errors surface before any
/// request is issued.
pub fn validate_scenario(scenario: &Scenario) -> Vec<VolleyError> {
    let mut errors = Vec::new();

    if scenario.name.trim().is_empty() {
        errors.push(VolleyError::Configuration(
            "Scenario name must not be empty".to_string(),
        ));
    }

    if scenario.steps.is_empty() {
        errors.push(VolleyError::Configuration(format!(
            "Scenario '{}' has no steps",
            scenario.name
        )));
    }

    for step in &scenario.steps {
        errors.extend(validate_step(step));
    }

    if let Some(load) = &scenario.load_test {
        errors.extend(validate_load_config(load));
    }

    errors
}

fn validate_step(step: &Step) -> Vec<VolleyError> {
    let mut errors = Vec::new();

    if step.name.trim().is_empty() {
        errors.push(VolleyError::Configuration(
            "Step name must not be empty".to_string(),
        ));
    }

    if step.path.trim().is_empty() {
        errors.push(VolleyError::Configuration(format!(
            "Step '{}': path must not be empty",
            step.name
        )));
    }

    for assertion in &step.assertions {
        errors.extend(validate_assertion(&step.name, assertion));
    }

    for (variable, path) in &step.extract {
        if let Err(e) = template::validate_path(path) {
            errors.push(VolleyError::Configuration(format!(
                "Step '{}': extraction '{}': {}",
                step.name, variable, e
            )));
        }
    }

    errors
}

fn validate_assertion(step_name: &str, assertion: &Assertion) -> Vec<VolleyError> {
    let mut errors = Vec::new();

    if let Err(e) = template::validate_path(&assertion.field) {
        errors.push(VolleyError::Configuration(format!(
            "Step '{step_name}': assertion on '{}': {}",
            assertion.field, e
        )));
    }

    // `exists` is the only operator without a comparison value.
    if assertion.operator != AssertionOperator::Exists && assertion.value.is_none() {
        errors.push(VolleyError::Configuration(format!(
            "Step '{step_name}': assertion on '{}': operator '{}' requires a value",
            assertion.field, assertion.operator
        )));
    }

    match (assertion.operator, &assertion.value) {
        (AssertionOperator::In | AssertionOperator::NotIn, Some(value)) => {
            if !value.is_array() {
                errors.push(VolleyError::Configuration(format!(
                    "Step '{step_name}': assertion on '{}': '{}' requires a sequence value",
                    assertion.field, assertion.operator
                )));
            }
        }
        (
            AssertionOperator::Gt
            | AssertionOperator::Lt
            | AssertionOperator::Gte
            | AssertionOperator::Lte,
            Some(value),
        ) => {
            if !value.is_number() {
                errors.push(VolleyError::Configuration(format!(
                    "Step '{step_name}': assertion on '{}': '{}' requires a numeric value",
                    assertion.field, assertion.operator
                )));
            }
        }
        (AssertionOperator::Regex, Some(value)) => match value.as_str() {
            Some(pattern) => {
                if let Err(e) = Regex::new(pattern) {
                    errors.push(VolleyError::Configuration(format!(
                        "Step '{step_name}': assertion on '{}': invalid regex: {e}",
                        assertion.field
                    )));
                }
            }
            None => {
                errors.push(VolleyError::Configuration(format!(
                    "Step '{step_name}': assertion on '{}': regex pattern must be a string",
                    assertion.field
                )));
            }
        },
        _ => {}
    }

    errors
}

/// Validate load-test bounds.
pub fn validate_load_config(config: &LoadTestConfig) -> Vec<VolleyError> {
    let mut errors = Vec::new();

    if config.duration_seconds == 0 {
        errors.push(VolleyError::Configuration(
            "duration_seconds must be greater than 0".to_string(),
        ));
    }

    if config.target_tps <= 0.0 || !config.target_tps.is_finite() {
        errors.push(VolleyError::Configuration(
            "target_tps must be a positive number".to_string(),
        ));
    }

    if config.ramp_up_seconds > config.duration_seconds {
        errors.push(VolleyError::Configuration(format!(
            "ramp_up_seconds ({}) must not exceed duration_seconds ({})",
            config.ramp_up_seconds, config.duration_seconds
        )));
    }

    if config.max_concurrent == 0 {
        errors.push(VolleyError::Configuration(
            "max_concurrent must be greater than 0".to_string(),
        ));
    }

    errors
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

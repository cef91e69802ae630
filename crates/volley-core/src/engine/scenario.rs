use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::config::HostConfig;
use crate::engine::step::execute_step;
use crate::error::VolleyError;
use crate::http::HttpClient;
use crate::results::{ScenarioResult, TestStatus};
use crate::scenario::model::Scenario;
use crate::scenario::validation::validate_scenario;

/// Observer hook invoked after each executed step with
/// `(step name, cumulative index, total steps)`.
pub type StepProgressFn = dyn Fn(&str, usize, usize) + Send + Sync;

// ---------------------------------------------------------------------------
// ScenarioEngine
// ---------------------------------------------------------------------------

/// Runs one scenario end-to-end: strictly sequential steps over a live
/// variable set seeded from the scenario's declared variables.
///
/// Steps cannot be parallelized within a run — later steps may depend on
/// variables extracted by earlier ones.
pub struct ScenarioEngine {
    client: HttpClient,
}

impl ScenarioEngine {
    pub fn new(host: &HostConfig) -> Result<Self, VolleyError> {
        Ok(Self {
            client: HttpClient::from_host_config(host)?,
        })
    }

    /// Execute a scenario and return its fully populated result.
    ///
    /// Only configuration errors surface as `Err` — step failures of every
    /// other kind are captured in the result, and the run always completes
    /// with a success/failure classification.
    pub async fn execute_scenario(
        &self,
        scenario: &Scenario,
        progress: Option<&StepProgressFn>,
    ) -> Result<ScenarioResult, VolleyError> {
        let violations = validate_scenario(scenario);
        if !violations.is_empty() {
            return Err(collect_configuration_errors(violations));
        }

        let started_at = Utc::now();
        let start = Instant::now();
        let mut variables = scenario.variables.clone();
        let mut steps = Vec::with_capacity(scenario.steps.len());
        let mut status = TestStatus::Success;
        let total = scenario.steps.len();

        for (index, step) in scenario.steps.iter().enumerate() {
            let result = execute_step(&self.client, step, &mut variables).await;
            let step_status = result.status;
            steps.push(result);

            if let Some(callback) = progress {
                callback(&step.name, index + 1, total);
            }

            if step_status != TestStatus::Success {
                status = step_status;
                if !step.skip_on_failure {
                    // Remaining steps are not attempted and do not appear in
                    // the result.
                    break;
                }
            }
        }

        let finished_at = Utc::now();
        let successful = steps
            .iter()
            .filter(|s| s.status == TestStatus::Success)
            .count() as u64;
        let failed = steps
            .iter()
            .filter(|s| s.status == TestStatus::Failure)
            .count() as u64;
        let errors = steps
            .iter()
            .filter(|s| s.status == TestStatus::Error)
            .count() as u64;

        Ok(ScenarioResult {
            run_id: Uuid::new_v4(),
            scenario_name: scenario.name.clone(),
            status,
            started_at,
            finished_at,
            duration_seconds: start.elapsed().as_secs_f64(),
            total_requests: steps.len() as u64,
            successful_requests: successful,
            failed_requests: failed,
            error_requests: errors,
            steps,
            variables,
        })
    }
}

/// Fold validation violations into one configuration error.
pub(crate) fn collect_configuration_errors(violations: Vec<VolleyError>) -> VolleyError {
    let joined = violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ");
    VolleyError::Configuration(joined)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

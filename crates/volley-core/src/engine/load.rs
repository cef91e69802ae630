use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::{mpsc, RwLock, Semaphore};
use tokio::task::JoinSet;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::config::HostConfig;
use crate::engine::aggregator::{LoadAggregator, ProgressSnapshot, RequestOutcome};
use crate::engine::scenario::collect_configuration_errors;
use crate::engine::step::execute_step;
use crate::error::VolleyError;
use crate::http::HttpClient;
use crate::results::{LoadTestResult, StepResult, TestStatus};
use crate::scenario::model::{Distribution, LoadMode, LoadTestConfig, Scenario};
use crate::scenario::validation::{validate_load_config, validate_scenario};

/// Scheduler tick granularity.
const TICK: Duration = Duration::from_millis(100);
/// How long a dispatched unit waits for a concurrency slot before it is
/// recorded as rejected. Short, so rejection is visible instead of queueing.
const SLOT_GRACE: Duration = Duration::from_millis(50);
/// Upper bound on waiting for in-flight units after dispatch stops.
const DRAIN_LIMIT: Duration = Duration::from_secs(30);

/// Observer hook receiving a metrics snapshot roughly once per second.
pub type LoadProgressFn = dyn Fn(&ProgressSnapshot) + Send + Sync;

// ---------------------------------------------------------------------------
// LoadTestEngine
// ---------------------------------------------------------------------------

/// Issues step executions against a target rate curve for a fixed duration,
/// bounded by a concurrency ceiling, and aggregates streaming metrics.
///
/// Each dispatched unit runs the scenario's first step (or the full chain in
/// [`LoadMode::FullScenario`]) with its own variable map seeded from the
/// scenario — live variables are never shared across concurrent units.
pub struct LoadTestEngine {
    client: Arc<HttpClient>,
    cancel: CancellationToken,
}

impl LoadTestEngine {
    pub fn new(host: &HostConfig) -> Result<Self, VolleyError> {
        Ok(Self {
            client: Arc::new(HttpClient::from_host_config(host)?),
            cancel: CancellationToken::new(),
        })
    }

    /// Token that stops dispatching when cancelled; in-flight units still
    /// drain into the result.
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the load test for its configured duration and return the final
    /// result. Individual request failures never abort the run; only
    /// configuration errors do, before any request is issued.
    pub async fn execute_load_test(
        &self,
        scenario: &Scenario,
        config: &LoadTestConfig,
        progress: Option<Arc<LoadProgressFn>>,
    ) -> Result<LoadTestResult, VolleyError> {
        let mut violations = validate_scenario(scenario);
        violations.extend(validate_load_config(config));
        if !violations.is_empty() {
            return Err(collect_configuration_errors(violations));
        }

        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let start = Instant::now();
        let duration = Duration::from_secs(config.duration_seconds);
        let scenario = Arc::new(scenario.clone());

        let aggregator = Arc::new(RwLock::new(LoadAggregator::new()));
        let (result_tx, mut result_rx) = mpsc::channel::<(Duration, RequestOutcome)>(4096);

        // Drain task — the only writer to the aggregator.
        let aggregator_for_drain = Arc::clone(&aggregator);
        let drain_task = tokio::spawn(async move {
            while let Some((elapsed, outcome)) = result_rx.recv().await {
                aggregator_for_drain.write().await.record(elapsed, &outcome);
            }
        });

        // Progress reporter — read-only snapshots once per second.
        let done = CancellationToken::new();
        let progress_task = progress.map(|callback| {
            let aggregator = Arc::clone(&aggregator);
            let done = done.clone();
            tokio::spawn(async move {
                let mut ticker = interval(Duration::from_secs(1));
                ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // The first tick fires immediately; skip it.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        _ = ticker.tick() => {
                            let snapshot = aggregator.read().await.snapshot(start.elapsed());
                            callback(&snapshot);
                        }
                        _ = done.cancelled() => break,
                    }
                }
            })
        });

        // Scheduler loop. The default (bursting) tick behavior compensates
        // for missed ticks, preserving the long-run dispatch average.
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent));
        let mut in_flight: JoinSet<()> = JoinSet::new();
        let mut carry = 0.0_f64;
        let mut ticker = interval(TICK);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = self.cancel.cancelled() => break,
            }
            let elapsed = start.elapsed();
            if elapsed >= duration {
                break;
            }

            let rate = instantaneous_rate(config, elapsed.as_secs_f64());
            let (count, next_carry) = dispatch_count(rate, TICK, carry);
            carry = next_carry;

            for _ in 0..count {
                let client = Arc::clone(&self.client);
                let scenario = Arc::clone(&scenario);
                let semaphore = Arc::clone(&semaphore);
                let tx = result_tx.clone();
                let mode = config.mode;

                in_flight.spawn(async move {
                    let permit = match timeout(SLOT_GRACE, semaphore.acquire_owned()).await {
                        Ok(Ok(permit)) => permit,
                        // No free slot within the grace window (or the
                        // semaphore closed) — rejected, never queued.
                        _ => {
                            let _ = tx.send((start.elapsed(), RequestOutcome::rejected())).await;
                            return;
                        }
                    };
                    let outcome = execute_unit(&client, &scenario, mode).await;
                    drop(permit);
                    let _ = tx.send((start.elapsed(), outcome)).await;
                });
            }

            // Reap already-finished units so the set stays small.
            while in_flight.try_join_next().is_some() {}
        }

        // Dispatch is over; let in-flight units drain (bounded), then close
        // the channel so the drain task finishes.
        drop(result_tx);
        let drained = timeout(DRAIN_LIMIT, async {
            while in_flight.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            tracing::error!(
                limit_secs = DRAIN_LIMIT.as_secs(),
                "in-flight requests did not drain in time; aborting the rest"
            );
            in_flight.abort_all();
            while in_flight.join_next().await.is_some() {}
        }
        let _ = drain_task.await;

        done.cancel();
        if let Some(task) = progress_task {
            let _ = task.await;
        }

        let finished_at = Utc::now();
        let result = aggregator.read().await.result(
            run_id,
            scenario.name.clone(),
            started_at,
            finished_at,
            start.elapsed(),
            config.target_tps,
        );
        Ok(result)
    }
}

// ---------------------------------------------------------------------------
// Unit execution
// ---------------------------------------------------------------------------

/// Run one dispatched unit with its own variable map.
async fn execute_unit(client: &HttpClient, scenario: &Scenario, mode: LoadMode) -> RequestOutcome {
    let mut variables = scenario.variables.clone();
    match mode {
        LoadMode::FirstStep => {
            // Validation guarantees at least one step.
            let Some(step) = scenario.steps.first() else {
                return RequestOutcome {
                    status: TestStatus::Error,
                    response_times_ms: Vec::new(),
                    status_codes: Vec::new(),
                    error_kinds: vec!["configuration".to_string()],
                };
            };
            let result = execute_step(client, step, &mut variables).await;
            outcome_from_steps(result.status, std::slice::from_ref(&result))
        }
        LoadMode::FullScenario => {
            let mut results = Vec::with_capacity(scenario.steps.len());
            let mut status = TestStatus::Success;
            for step in &scenario.steps {
                let result = execute_step(client, step, &mut variables).await;
                let step_status = result.status;
                results.push(result);
                if step_status != TestStatus::Success {
                    status = step_status;
                    if !step.skip_on_failure {
                        break;
                    }
                }
            }
            outcome_from_steps(status, &results)
        }
    }
}

fn outcome_from_steps(status: TestStatus, steps: &[StepResult]) -> RequestOutcome {
    let mut response_times_ms = Vec::new();
    let mut status_codes = Vec::new();
    let mut error_kinds = Vec::new();
    for step in steps {
        if let Some(code) = step.status_code {
            status_codes.push(code);
            response_times_ms.push(step.response_time_ms);
        }
        if let Some(kind) = &step.error_kind {
            error_kinds.push(kind.clone());
        }
    }
    RequestOutcome {
        status,
        response_times_ms,
        status_codes,
        error_kinds,
    }
}

// ---------------------------------------------------------------------------
// Rate math
// ---------------------------------------------------------------------------

/// Target rate at `elapsed_secs` into the run.
///
/// During ramp-up the rate follows the configured shape; `constant` ignores
/// ramp shaping entirely.
fn instantaneous_rate(config: &LoadTestConfig, elapsed_secs: f64) -> f64 {
    let ramp = config.ramp_up_seconds as f64;
    if elapsed_secs < ramp {
        let progress = elapsed_secs / ramp;
        match config.distribution {
            Distribution::Constant => config.target_tps,
            Distribution::Linear => config.target_tps * progress,
            Distribution::Exponential => config.target_tps * progress * progress,
        }
    } else {
        config.target_tps
    }
}

/// Requests to dispatch this tick, carrying the fractional remainder forward
/// so the long-run average matches the target exactly.
fn dispatch_count(rate: f64, tick: Duration, carry: f64) -> (u64, f64) {
    let exact = rate * tick.as_secs_f64() + carry;
    let count = exact.floor().max(0.0);
    (count as u64, exact - count)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

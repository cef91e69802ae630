use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use volley_core::engine::{LoadProgressFn, LoadTestEngine, ProgressSnapshot, ScenarioEngine};
use volley_core::results::export::{export_json, export_load_test_csv, export_scenario_csv};
use volley_core::scenario::io::{read_host_config, read_scenario};
use volley_core::scenario::model::LoadTestConfig;
use volley_core::scenario::validate_scenario;
use volley_core::VolleyError;

#[derive(Parser)]
#[command(
    name = "volley",
    version,
    about = "Scenario-driven API testing and rate-controlled load generation"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Execute a scenario once, end to end.
    Run {
        /// Scenario definition (JSON).
        scenario: PathBuf,
        /// Host configuration (JSON).
        #[arg(long)]
        host: PathBuf,
        /// Write the result document to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Emit CSV instead of JSON.
        #[arg(long)]
        csv: bool,
    },
    /// Run a rate-controlled load test against a scenario.
    Load {
        /// Scenario definition (JSON).
        scenario: PathBuf,
        /// Host configuration (JSON).
        #[arg(long)]
        host: PathBuf,
        /// Override the scenario's embedded test duration (seconds).
        #[arg(long)]
        duration: Option<u64>,
        /// Override the scenario's embedded target TPS.
        #[arg(long)]
        tps: Option<f64>,
        /// Write the result document to this file instead of stdout.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Emit CSV instead of JSON.
        #[arg(long)]
        csv: bool,
    },
    /// Validate a scenario file without sending any requests.
    Validate {
        /// Scenario definition (JSON).
        scenario: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), VolleyError> {
    match cli.command {
        Command::Run {
            scenario,
            host,
            output,
            csv,
        } => {
            let host = read_host_config(&host).await?;
            let scenario = read_scenario(&scenario).await?;
            let engine = ScenarioEngine::new(&host)?;

            let progress = |name: &str, index: usize, total: usize| {
                eprintln!("[{index}/{total}] {name}");
            };
            let result = engine.execute_scenario(&scenario, Some(&progress)).await?;

            eprintln!(
                "{}: {} — {} requests, {} successful, {} failed, {} errors ({:.2}s)",
                result.scenario_name,
                result.status,
                result.total_requests,
                result.successful_requests,
                result.failed_requests,
                result.error_requests,
                result.duration_seconds
            );

            let document = if csv {
                export_scenario_csv(&result)
            } else {
                export_json(&result)?
            };
            emit(document, output).await
        }

        Command::Load {
            scenario,
            host,
            duration,
            tps,
            output,
            csv,
        } => {
            let host = read_host_config(&host).await?;
            let scenario = read_scenario(&scenario).await?;

            let mut config = scenario.load_test.clone().unwrap_or(LoadTestConfig {
                duration_seconds: 0,
                target_tps: 0.0,
                ramp_up_seconds: 0,
                max_concurrent: 100,
                distribution: Default::default(),
                mode: Default::default(),
            });
            if let Some(duration) = duration {
                config.duration_seconds = duration;
            }
            if let Some(tps) = tps {
                config.target_tps = tps;
            }

            let engine = LoadTestEngine::new(&host)?;
            let progress: Arc<LoadProgressFn> = Arc::new(|snapshot: &ProgressSnapshot| {
                eprintln!(
                    "[{:>5.1}s] {} requests, {:.1} tps, {} ok / {} failed / {} errors, avg {:.1}ms, p95 {}ms",
                    snapshot.elapsed_seconds,
                    snapshot.total_requests,
                    snapshot.current_tps,
                    snapshot.successful_requests,
                    snapshot.failed_requests,
                    snapshot.error_requests,
                    snapshot.avg_response_ms,
                    snapshot.p95_response_ms
                );
            });
            let result = engine
                .execute_load_test(&scenario, &config, Some(progress))
                .await?;

            eprintln!(
                "{}: {} requests in {:.2}s — {:.1} tps (target {:.1}), {:.2}% success, p95 {}ms, p99 {}ms",
                result.scenario_name,
                result.total_requests,
                result.duration_seconds,
                result.actual_avg_tps,
                result.target_tps,
                result.success_rate,
                result.p95_response_ms,
                result.p99_response_ms
            );

            let document = if csv {
                export_load_test_csv(&result)
            } else {
                export_json(&result)?
            };
            emit(document, output).await
        }

        Command::Validate { scenario } => {
            let scenario = read_scenario(&scenario).await?;
            let violations = validate_scenario(&scenario);
            if violations.is_empty() {
                println!("OK: scenario '{}' is valid", scenario.name);
                Ok(())
            } else {
                for violation in &violations {
                    eprintln!("- {violation}");
                }
                Err(VolleyError::Configuration(format!(
                    "{} validation error(s) in scenario '{}'",
                    violations.len(),
                    scenario.name
                )))
            }
        }
    }
}

async fn emit(document: String, output: Option<PathBuf>) -> Result<(), VolleyError> {
    match output {
        Some(path) => {
            tokio::fs::write(&path, document).await?;
            eprintln!("result written to {}", path.display());
        }
        None => println!("{document}"),
    }
    Ok(())
}

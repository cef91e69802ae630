pub mod aggregator;
pub mod load;
pub mod scenario;
pub mod step;

pub use aggregator::{LoadAggregator, ProgressSnapshot, RequestOutcome};
pub use load::{LoadProgressFn, LoadTestEngine};
pub use scenario::{ScenarioEngine, StepProgressFn};
pub use step::execute_step;

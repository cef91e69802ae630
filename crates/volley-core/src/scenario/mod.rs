pub mod io;
pub mod model;
pub mod validation;

pub use model::{
    Assertion, AssertionOperator, Distribution, HttpMethod, LoadMode, LoadTestConfig, Scenario,
    Step,
};
pub use validation::{validate_load_config, validate_scenario};

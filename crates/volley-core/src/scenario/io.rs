use std::path::Path;

use crate::config::HostConfig;
use crate::error::VolleyError;
use crate::scenario::model::Scenario;

/// Read a scenario definition from a JSON file.
///
/// Schema violations (unknown operators, missing required fields) fail here,
/// before any request is issued.
pub async fn read_scenario(path: impl AsRef<Path>) -> Result<Scenario, VolleyError> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    let scenario: Scenario = serde_json::from_str(&content)?;
    Ok(scenario)
}

/// Write a [`Scenario`] to disk as pretty-printed JSON.
pub async fn write_scenario(
    scenario: &Scenario,
    path: impl AsRef<Path>,
) -> Result<(), VolleyError> {
    let content = serde_json::to_string_pretty(scenario)?;
    tokio::fs::write(path.as_ref(), content).await?;
    Ok(())
}

/// Read a host configuration from a JSON file.
pub async fn read_host_config(path: impl AsRef<Path>) -> Result<HostConfig, VolleyError> {
    let content = tokio::fs::read_to_string(path.as_ref()).await?;
    let config: HostConfig = serde_json::from_str(&content)?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::model::{Assertion, AssertionOperator, HttpMethod, Step};
    use serde_json::json;

    fn make_scenario() -> Scenario {
        let mut step = Step::new("Create user", HttpMethod::Post, "/api/users");
        step.body = Some(json!({"name": "{{user_name}}"}));
        step.assertions.push(Assertion {
            field: "status".to_string(),
            operator: AssertionOperator::Eq,
            value: Some(json!(201)),
            message: None,
        });
        step.extract
            .insert("user_id".to_string(), "body.id".to_string());

        let mut scenario = Scenario::new("Registration", vec![step]);
        scenario
            .variables
            .insert("user_name".to_string(), json!("alice"));
        scenario
    }

    #[tokio::test]
    async fn round_trip_write_then_read_preserves_scenario() {
        let scenario = make_scenario();
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let path = dir.path().join("scenario.json");

        write_scenario(&scenario, &path)
            .await
            .expect("write_scenario should succeed");
        let loaded = read_scenario(&path).await.expect("read_scenario should succeed");

        assert_eq!(loaded.name, scenario.name);
        assert_eq!(loaded.steps.len(), 1);
        assert_eq!(loaded.steps[0].name, "Create user");
        assert_eq!(loaded.steps[0].extract["user_id"], "body.id");
        assert_eq!(loaded.variables["user_name"], json!("alice"));
    }

    #[tokio::test]
    async fn read_scenario_rejects_unknown_operator() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        let content = r#"{
            "name": "Bad",
            "steps": [{
                "name": "S1",
                "method": "GET",
                "path": "/x",
                "assertions": [{"field": "status", "operator": "approx", "value": 200}]
            }]
        }"#;
        tokio::fs::write(&path, content).await.unwrap();
        let err = read_scenario(&path).await.unwrap_err();
        assert!(matches!(err, VolleyError::Serde(_)));
    }

    #[tokio::test]
    async fn read_scenario_missing_file_is_io_error() {
        let err = read_scenario("/nonexistent/scenario.json").await.unwrap_err();
        assert!(matches!(err, VolleyError::Io(_)));
    }

    #[tokio::test]
    async fn read_host_config_parses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("host.json");
        tokio::fs::write(&path, r#"{"base_url": "http://localhost:8080"}"#)
            .await
            .unwrap();
        let config = read_host_config(&path).await.unwrap();
        assert_eq!(config.base_url, "http://localhost:8080");
        assert_eq!(config.timeout_seconds, 30);
    }
}

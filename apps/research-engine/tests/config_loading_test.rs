//! Configuration Loading Integration Tests
//!
//! Exercises the on-disk loading path: YAML files, environment variable
//! interpolation with defaults, and error reporting for unreadable or
//! invalid files.

#![allow(clippy::expect_used, clippy::unwrap_used)]

use std::io::Write;

use research_engine::{ConfigError, load_config};
use tempfile::NamedTempFile;

fn write_temp_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("temp file creation should succeed");
    file.write_all(contents.as_bytes())
        .expect("temp file write should succeed");
    file
}

#[test]
fn test_load_config_from_disk() {
    let file = write_temp_config(
        r"
orchestrator:
  max_concurrent_jobs: 3
  progress_interval_ms: 500

optimization:
  max_combinations: 200

persistence:
  backend: in_memory
",
    );

    let config = load_config(Some(file.path().to_str().unwrap())).expect("config should load");

    assert_eq!(config.orchestrator.max_concurrent_jobs, 3);
    assert_eq!(config.orchestrator.progress_interval_ms, 500);
    assert_eq!(config.optimization.max_combinations, 200);
    assert_eq!(config.persistence.backend, "in_memory");
    // Untouched sections keep their defaults.
    assert_eq!(config.optimization.result_cap, 50);
    assert!(config.observability.metrics.enabled);
}

#[test]
fn test_env_defaults_interpolate_through_a_file() {
    // The variable is unset, so the `:-` fallback must be applied.
    let file = write_temp_config(
        r#"
persistence:
  backend: ${RESEARCH_TEST_UNSET_BACKEND:-in_memory}
  url: "${RESEARCH_TEST_UNSET_URL}"
"#,
    );

    let config = load_config(Some(file.path().to_str().unwrap())).expect("config should load");

    assert_eq!(config.persistence.backend, "in_memory");
    assert_eq!(config.persistence.url, "");
}

#[test]
fn test_missing_file_reports_the_path() {
    let result = load_config(Some("/nonexistent/research-engine/config.yaml"));

    let Err(ConfigError::ReadError { path, .. }) = result else {
        panic!("expected a read error for a missing file");
    };
    assert_eq!(path, "/nonexistent/research-engine/config.yaml");
}

#[test]
fn test_malformed_yaml_is_a_parse_error() {
    let file = write_temp_config("orchestrator: [not, a, mapping");

    let result = load_config(Some(file.path().to_str().unwrap()));
    assert!(matches!(result, Err(ConfigError::ParseError(_))));
}

#[test]
fn test_invalid_values_fail_validation() {
    let file = write_temp_config(
        r"
optimization:
  histogram_bins: 0
",
    );

    let result = load_config(Some(file.path().to_str().unwrap()));
    let Err(ConfigError::ValidationError(message)) = result else {
        panic!("expected a validation error for zero histogram bins");
    };
    assert!(message.contains("histogram_bins"));
}

//! Configuration types for Stepline.
//!
//! `SteplineConfig` represents the `stepline.toml` file that controls how plans
//! are rendered for the remote execution service and how logging is set up.
//! Every field has a default, so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SteplineConfig {
    #[serde(default)]
    pub compiler: CompilerConfig,
    #[serde(default)]
    pub tracing: TracingConfig,
}

/// Settings for the remote compiler and state-machine rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilerConfig {
    /// Resource identifier placed on every rendered task state.
    #[serde(default = "default_task_resource")]
    pub task_resource: String,
    /// Error names every retry clause matches.
    #[serde(default = "default_retry_error_equals")]
    pub retry_error_equals: Vec<String>,
    /// Comment for rendered definitions. Falls back to the plan name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

fn default_task_resource() -> String {
    "arn:aws:states:::lambda:invoke".to_string()
}

fn default_retry_error_equals() -> Vec<String> {
    vec!["States.TaskFailed".to_string()]
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            task_resource: default_task_resource(),
            retry_error_equals: default_retry_error_equals(),
            comment: None,
        }
    }
}

/// Settings for the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TracingConfig {
    /// Filter directive used when `RUST_LOG` is not set.
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
    /// Bridge spans to OpenTelemetry (stdout exporter).
    #[serde(default)]
    pub otel: bool,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            json: false,
            otel: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = SteplineConfig::default();
        assert_eq!(config.compiler.task_resource, "arn:aws:states:::lambda:invoke");
        assert_eq!(config.compiler.retry_error_equals, vec!["States.TaskFailed"]);
        assert!(config.compiler.comment.is_none());
        assert_eq!(config.tracing.filter, "info");
        assert!(!config.tracing.json);
        assert!(!config.tracing.otel);
    }

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config: SteplineConfig = toml::from_str("").unwrap();
        assert_eq!(config, SteplineConfig::default());
    }

    #[test]
    fn test_partial_toml_overrides() {
        let toml_str = r#"
[compiler]
retry_error_equals = ["States.ALL"]
comment = "nightly"

[tracing]
json = true
"#;
        let config: SteplineConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.compiler.retry_error_equals, vec!["States.ALL"]);
        assert_eq!(config.compiler.comment.as_deref(), Some("nightly"));
        assert_eq!(config.compiler.task_resource, "arn:aws:states:::lambda:invoke");
        assert!(config.tracing.json);
        assert_eq!(config.tracing.filter, "info");
    }
}

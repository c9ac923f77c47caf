//! Error types for plan construction, remote compilation, and local execution.
//!
//! Each failure domain gets its own enum so callers can tell a rejected plan
//! (fatal) from a failed compilation (retryable after fixing the resolver) and
//! from a failed local run.

use stepline_types::error::ResolutionError;
use thiserror::Error;

/// Boxed failure raised by a step's work item.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised while building and validating a plan.
#[derive(Debug, Error)]
pub enum PlanError {
    /// The dependency graph is not acyclic.
    #[error("cycle detected involving step '{0}'")]
    CycleDetected(String),

    /// Two distinct steps share a name.
    #[error("duplicate step name: '{0}'")]
    DuplicateStepName(String),

    /// A named dependency does not match any step in the plan.
    #[error("step '{step}' depends on unknown step '{dependency}'")]
    UnknownDependency { step: String, dependency: String },

    /// `set_target_resolver` was called more than once.
    #[error("target resolver already set")]
    ResolverAlreadySet,
}

/// Errors raised while compiling a plan into a workflow document.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The injected resolver could not map a step to its deployed target.
    #[error("resolution error: {0}")]
    Resolution(#[from] ResolutionError),

    /// The document could not be serialized.
    #[error("render error: {0}")]
    Render(String),
}

/// Errors raised while running a plan in-process.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// A step's work item returned an error.
    #[error("step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: BoxError,
    },

    /// A step referenced an upstream result that was never produced.
    #[error("step '{step}' needs the output of '{dependency}', which is not available")]
    MissingUpstream { step: String, dependency: String },

    /// A concurrently executed step panicked or was cancelled.
    #[error("step '{step}' did not complete: {reason}")]
    Join { step: String, reason: String },
}

impl ExecutionError {
    /// Name of the step the failure is attributed to.
    pub fn step(&self) -> &str {
        match self {
            ExecutionError::StepFailed { step, .. }
            | ExecutionError::MissingUpstream { step, .. }
            | ExecutionError::Join { step, .. } => step,
        }
    }
}

/// Errors raised by the strict configuration loader.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse error: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[test]
    fn test_plan_error_display() {
        let err = PlanError::UnknownDependency {
            step: "train".to_string(),
            dependency: "prepare".to_string(),
        };
        assert!(err.to_string().contains("train"));
        assert!(err.to_string().contains("prepare"));

        let err = PlanError::DuplicateStepName("train".to_string());
        assert_eq!(err.to_string(), "duplicate step name: 'train'");
    }

    #[test]
    fn test_step_failed_keeps_source_chain() {
        let err = ExecutionError::StepFailed {
            step: "train".to_string(),
            source: anyhow::anyhow!("out of memory").into(),
        };
        assert_eq!(err.step(), "train");
        assert!(err.to_string().contains("out of memory"));
        assert_eq!(err.source().unwrap().to_string(), "out of memory");
    }

    #[test]
    fn test_resolution_error_converts() {
        let err: CompileError = ResolutionError::new("train", "not deployed").into();
        assert!(err.to_string().contains("train"));
        assert!(err.to_string().contains("not deployed"));
    }
}

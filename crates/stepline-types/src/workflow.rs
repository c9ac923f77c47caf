//! Workflow domain types for Stepline.
//!
//! Holds the data a step carries without interpreting it (retry policy,
//! deployment metadata) and the declarative `WorkflowDocument` that the remote
//! compiler produces. Everything here is plain serde data so collaborators
//! outside the core (packaging, infrastructure generation, renderers) can
//! consume it without linking the engine.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Retry Policy
// ---------------------------------------------------------------------------

/// Retry policy recorded on a step.
///
/// The core never retries anything itself. The policy is copied verbatim into
/// the remote task descriptor for the execution service to honour.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetryPolicy {
    /// Maximum number of retry attempts. Zero disables the retry clause.
    #[serde(default)]
    pub max_attempts: u32,
    /// Seconds before the first retry (default 15).
    #[serde(default = "default_interval_seconds")]
    pub interval_seconds: u64,
    /// Multiplier applied to the interval after every attempt (default 4.0).
    #[serde(default = "default_backoff_rate")]
    pub backoff_rate: f64,
}

fn default_interval_seconds() -> u64 {
    15
}

fn default_backoff_rate() -> f64 {
    4.0
}

impl RetryPolicy {
    /// A policy with `max_attempts` and the default interval/backoff.
    pub fn attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Self::default()
        }
    }

    /// Whether this policy produces a retry clause at all.
    pub fn is_enabled(&self) -> bool {
        self.max_attempts > 0
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 0,
            interval_seconds: default_interval_seconds(),
            backoff_rate: default_backoff_rate(),
        }
    }
}

// ---------------------------------------------------------------------------
// Step Metadata
// ---------------------------------------------------------------------------

/// Deployment metadata attached to a step.
///
/// Opaque to the core: packaging and infrastructure collaborators read it when
/// they turn a step into a deployed function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct StepMetadata {
    /// Memory size for the deployed function, in megabytes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<u32>,
    /// Invocation timeout for the deployed function, in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    /// Runtime identifier (e.g. "python3.12").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,
    /// Environment variables for the deployed function.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    /// Additional permissions granted to the function's role.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub permissions: Vec<String>,
    /// Extra code layers attached to the function.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub layers: Vec<String>,
}

// ---------------------------------------------------------------------------
// Step Manifest
// ---------------------------------------------------------------------------

/// Per-step descriptor handed to packaging collaborators.
///
/// Carries everything about a step except its callable, with dependencies
/// flattened to names.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StepManifest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryPolicy>,
    #[serde(default)]
    pub metadata: StepMetadata,
}

// ---------------------------------------------------------------------------
// Workflow Document
// ---------------------------------------------------------------------------

/// Declarative workflow produced by the remote compiler.
///
/// Stages run strictly in order; stage `k + 1` starts only after stage `k`
/// completed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct WorkflowDocument {
    /// Plan name.
    pub name: String,
    /// Optional human-readable comment for the rendered definition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Sequential chain of stages, one per generation.
    pub stages: Vec<Stage>,
}

impl WorkflowDocument {
    /// Total number of task descriptors across all stages.
    pub fn task_count(&self) -> usize {
        self.stages.iter().map(|s| s.tasks().len()).sum()
    }
}

/// One link of the sequential chain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Stage {
    /// A generation with exactly one step.
    Task(TaskDescriptor),
    /// A generation with several independent steps, fanned out in parallel.
    Parallel {
        name: String,
        branches: Vec<TaskDescriptor>,
    },
}

impl Stage {
    /// Name of the stage as it appears in a rendered state machine.
    pub fn name(&self) -> &str {
        match self {
            Stage::Task(task) => &task.name,
            Stage::Parallel { name, .. } => name,
        }
    }

    /// The task descriptors contained in this stage.
    pub fn tasks(&self) -> &[TaskDescriptor] {
        match self {
            Stage::Task(task) => std::slice::from_ref(task),
            Stage::Parallel { branches, .. } => branches,
        }
    }
}

/// Invocation of one deployed step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct TaskDescriptor {
    /// Step name (state identifier).
    pub name: String,
    /// Externally-deployed invocation target (function name or ARN).
    pub target: String,
    /// How upstream data reaches the task.
    pub input_mode: InputMode,
    /// Static arguments, with step references left symbolic.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<ArgumentSpec>,
    /// Retry clause, present only for steps with `max_attempts > 0`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry: Option<RetryClause>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Input-passing mode of a task.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// The full upstream payload is passed through, augmented by static arguments.
    #[default]
    PassThrough,
}

/// One argument slot of a task descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ArgumentSpec {
    /// A static value known at compile time.
    Literal { value: Value },
    /// The output of an upstream step, looked up by name in the payload.
    StepOutput { step: String },
}

/// Retry clause of a task descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct RetryClause {
    /// Error names the clause applies to.
    pub error_equals: Vec<String>,
    pub max_attempts: u32,
    pub interval_seconds: u64,
    pub backoff_rate: f64,
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

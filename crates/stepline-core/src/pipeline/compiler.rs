//! Remote compiler: generations to a declarative workflow document.
//!
//! Every generation becomes one stage of a sequential chain. A generation with
//! a single step becomes a task stage; a wider generation becomes a parallel
//! stage with one branch per step. The document can then be rendered as a
//! state-machine definition for the remote execution service.

use serde_json::{Map, Value, json};
use stepline_types::config::CompilerConfig;
use stepline_types::error::ResolutionError;
use stepline_types::workflow::{
    ArgumentSpec, InputMode, RetryClause, Stage, TaskDescriptor, WorkflowDocument,
};

use super::error::CompileError;
use super::resolver::TargetResolver;
use super::step::{Step, StepArg};

/// Name given to the parallel stage built from generation `index`.
pub fn parallel_stage_name(index: usize) -> String {
    format!("parallel-{index}")
}

// ---------------------------------------------------------------------------
// Compilation
// ---------------------------------------------------------------------------

/// Compile `generations` into a workflow document.
///
/// Every target is resolved before any stage is assembled, so a resolution
/// failure never yields a partial document.
pub fn compile(
    plan_name: &str,
    generations: &[Vec<Step>],
    resolver: &dyn TargetResolver,
    config: &CompilerConfig,
) -> Result<WorkflowDocument, CompileError> {
    let targets = generations
        .iter()
        .map(|layer| {
            layer
                .iter()
                .map(|step| resolver.resolve(step))
                .collect::<Result<Vec<String>, ResolutionError>>()
        })
        .collect::<Result<Vec<_>, _>>()?;

    let stages = generations
        .iter()
        .zip(targets)
        .enumerate()
        .map(|(index, (layer, layer_targets))| {
            let mut tasks: Vec<TaskDescriptor> = layer
                .iter()
                .zip(layer_targets)
                .map(|(step, target)| task_descriptor(step, target, config))
                .collect();
            if tasks.len() == 1 {
                Stage::Task(tasks.remove(0))
            } else {
                Stage::Parallel {
                    name: parallel_stage_name(index),
                    branches: tasks,
                }
            }
        })
        .collect::<Vec<_>>();

    tracing::debug!(
        plan = plan_name,
        stages = stages.len(),
        "compiled workflow document"
    );

    Ok(WorkflowDocument {
        name: plan_name.to_string(),
        comment: config.comment.clone(),
        stages,
    })
}

fn task_descriptor(step: &Step, target: String, config: &CompilerConfig) -> TaskDescriptor {
    let arguments = step
        .args()
        .iter()
        .map(|arg| match arg {
            StepArg::Literal(value) => ArgumentSpec::Literal {
                value: value.clone(),
            },
            StepArg::Step(upstream) => ArgumentSpec::StepOutput {
                step: upstream.name().to_string(),
            },
        })
        .collect();

    let retry = step
        .retry_policy()
        .filter(|policy| policy.is_enabled())
        .map(|policy| RetryClause {
            error_equals: config.retry_error_equals.clone(),
            max_attempts: policy.max_attempts,
            interval_seconds: policy.interval_seconds,
            backoff_rate: policy.backoff_rate,
        });

    TaskDescriptor {
        name: step.name().to_string(),
        target,
        input_mode: InputMode::PassThrough,
        arguments,
        retry,
        comment: step.description().map(str::to_string),
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Render `doc` as a States Language definition.
///
/// Stages are chained with `Next`; the last one ends the execution. An empty
/// document renders a single `Succeed` state so the definition stays valid.
///
/// Task parameters carry only the target and the pass-through payload.
/// Literal arguments are not rendered: they travel with the deployed package
/// (see [`TaskDescriptor::arguments`] and the step manifest), and the deployed
/// side rebuilds the argument list with
/// [`resolve_args_from_payload`](super::payload::resolve_args_from_payload).
pub fn to_state_machine(doc: &WorkflowDocument, config: &CompilerConfig) -> Value {
    let comment = doc.comment.clone().unwrap_or_else(|| doc.name.clone());

    if doc.stages.is_empty() {
        return json!({
            "Comment": comment,
            "StartAt": "Done",
            "States": { "Done": { "Type": "Succeed" } },
        });
    }

    let mut states = Map::new();
    for (i, stage) in doc.stages.iter().enumerate() {
        let mut state = match stage {
            Stage::Task(task) => task_state(task, config),
            Stage::Parallel { branches, .. } => {
                let branches: Vec<Value> = branches
                    .iter()
                    .map(|task| {
                        let mut state = task_state(task, config);
                        state.insert("End".to_string(), Value::Bool(true));
                        let mut branch_states = Map::new();
                        branch_states.insert(task.name.clone(), Value::Object(state));
                        json!({
                            "StartAt": task.name,
                            "States": branch_states,
                        })
                    })
                    .collect();
                let mut state = Map::new();
                state.insert("Type".to_string(), json!("Parallel"));
                state.insert("Branches".to_string(), Value::Array(branches));
                state
            }
        };
        match doc.stages.get(i + 1) {
            Some(next) => state.insert("Next".to_string(), json!(next.name())),
            None => state.insert("End".to_string(), Value::Bool(true)),
        };
        states.insert(stage.name().to_string(), Value::Object(state));
    }

    json!({
        "Comment": comment,
        "StartAt": doc.stages[0].name(),
        "States": states,
    })
}

fn task_state(task: &TaskDescriptor, config: &CompilerConfig) -> Map<String, Value> {
    let mut parameters = Map::new();
    parameters.insert("FunctionName".to_string(), json!(task.target));
    parameters.insert("Payload.$".to_string(), json!("$"));

    let mut state = Map::new();
    state.insert("Type".to_string(), json!("Task"));
    state.insert("Resource".to_string(), json!(config.task_resource));
    state.insert("Parameters".to_string(), Value::Object(parameters));
    if let Some(comment) = &task.comment {
        state.insert("Comment".to_string(), json!(comment));
    }
    if let Some(retry) = &task.retry {
        state.insert(
            "Retry".to_string(),
            json!([{
                "ErrorEquals": retry.error_equals,
                "IntervalSeconds": retry.interval_seconds,
                "MaxAttempts": retry.max_attempts,
                "BackoffRate": retry.backoff_rate,
            }]),
        );
    }
    state
}

/// Pretty-printed JSON of the document itself.
pub fn to_json_pretty(doc: &WorkflowDocument) -> Result<String, CompileError> {
    serde_json::to_string_pretty(doc).map_err(|e| CompileError::Render(e.to_string()))
}

/// YAML rendering of the document itself.
pub fn to_yaml(doc: &WorkflowDocument) -> Result<String, CompileError> {
    serde_yaml_ng::to_string(doc).map_err(|e| CompileError::Render(e.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

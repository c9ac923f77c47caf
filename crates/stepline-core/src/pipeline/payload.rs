//! Pass-through payload handling for remotely executed steps.
//!
//! In pass-through mode a deployed task receives whatever the previous stage
//! produced: a single invocation result after a task stage, or an array of
//! results after a parallel stage. Each result wraps a `Payload` object keyed
//! by step name. A task returns its incoming payload with its own result
//! added, so every upstream output stays visible to later stages and the
//! deployed side resolves arguments the same way the local executor does.

use serde_json::{Map, Value};

use super::error::ExecutionError;
use super::step::{Step, StepArg};

/// Merge the `Payload` objects of an upstream event into one object.
///
/// - `{"Payload": {...}}` yields the inner object.
/// - `[{"Payload": {...}}, ...]` merges every inner object, later keys winning.
/// - Anything else yields an empty object.
pub fn combine_payload(event: &Value) -> Value {
    let mut combined = Map::new();
    match event {
        Value::Array(items) => {
            for item in items {
                if let Some(Value::Object(payload)) = item.get("Payload") {
                    combined.extend(payload.clone());
                }
            }
        }
        Value::Object(_) => {
            if let Some(Value::Object(payload)) = event.get("Payload") {
                combined.extend(payload.clone());
            }
        }
        _ => {}
    }
    Value::Object(combined)
}

/// The object a task returns: the combined incoming `event` plus its own
/// result under its name.
pub fn step_result_payload(step: &Step, event: &Value, result: Value) -> Value {
    let mut payload = match combine_payload(event) {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    payload.insert(step.name().to_string(), result);
    Value::Object(payload)
}

/// Resolve `step`'s arguments against a combined upstream payload.
///
/// Literal arguments pass through unchanged; step references are looked up by
/// the upstream step's name.
pub fn resolve_args_from_payload(
    step: &Step,
    payload: &Value,
) -> Result<Vec<Value>, ExecutionError> {
    step.args()
        .iter()
        .map(|arg| match arg {
            StepArg::Literal(value) => Ok(value.clone()),
            StepArg::Step(upstream) => {
                payload
                    .get(upstream.name())
                    .cloned()
                    .ok_or_else(|| ExecutionError::MissingUpstream {
                        step: step.name().to_string(),
                        dependency: upstream.name().to_string(),
                    })
            }
        })
        .collect()
}

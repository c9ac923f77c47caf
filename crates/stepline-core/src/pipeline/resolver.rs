//! Mapping from steps to their externally-deployed invocation targets.
//!
//! The deployable identifier of a step (function name, ARN) only exists once a
//! packaging collaborator has deployed it, so the remote compiler takes the
//! mapping as an injected `TargetResolver` rather than reading it off the step.

use std::collections::{BTreeMap, HashMap};

use stepline_types::error::ResolutionError;

use super::step::Step;

/// Resolves a step to the identifier the remote service invokes.
pub trait TargetResolver: Send + Sync {
    fn resolve(&self, step: &Step) -> Result<String, ResolutionError>;
}

/// Uses the step name as the target. Default when no resolver was injected.
#[derive(Debug, Clone, Copy, Default)]
pub struct StepNameResolver;

impl TargetResolver for StepNameResolver {
    fn resolve(&self, step: &Step) -> Result<String, ResolutionError> {
        Ok(step.name().to_string())
    }
}

impl TargetResolver for HashMap<String, String> {
    fn resolve(&self, step: &Step) -> Result<String, ResolutionError> {
        self.get(step.name())
            .cloned()
            .ok_or_else(|| ResolutionError::new(step.name(), "no deployed target registered"))
    }
}

impl TargetResolver for BTreeMap<String, String> {
    fn resolve(&self, step: &Step) -> Result<String, ResolutionError> {
        self.get(step.name())
            .cloned()
            .ok_or_else(|| ResolutionError::new(step.name(), "no deployed target registered"))
    }
}

/// Adapts a closure returning `None` for unknown steps.
pub struct FnResolver<F>(pub F);

impl<F> TargetResolver for FnResolver<F>
where
    F: Fn(&Step) -> Option<String> + Send + Sync,
{
    fn resolve(&self, step: &Step) -> Result<String, ResolutionError> {
        (self.0)(step)
            .ok_or_else(|| ResolutionError::new(step.name(), "resolver returned no target"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn step(name: &str) -> Step {
        Step::builder(|_args: &[Value]| -> anyhow::Result<Value> { Ok(Value::Null) })
            .name(name)
            .build()
    }

    #[test]
    fn test_step_name_resolver() {
        assert_eq!(StepNameResolver.resolve(&step("train")).unwrap(), "train");
    }

    #[test]
    fn test_map_resolver() {
        let mut targets = HashMap::new();
        targets.insert("train".to_string(), "arn:fn:train".to_string());
        assert_eq!(targets.resolve(&step("train")).unwrap(), "arn:fn:train");

        let err = targets.resolve(&step("evaluate")).unwrap_err();
        assert_eq!(err.step, "evaluate");
    }

    #[test]
    fn test_fn_resolver() {
        let resolver =
            FnResolver(|s: &Step| s.name().strip_prefix("ok-").map(|n| format!("fn-{n}")));
        assert_eq!(resolver.resolve(&step("ok-train")).unwrap(), "fn-train");
        assert!(resolver.resolve(&step("train")).is_err());
    }
}

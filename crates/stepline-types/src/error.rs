use thiserror::Error;

/// A step's externally-deployed identifier could not be resolved.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("cannot resolve target for step '{step}': {reason}")]
pub struct ResolutionError {
    pub step: String,
    pub reason: String,
}

impl ResolutionError {
    pub fn new(step: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            step: step.into(),
            reason: reason.into(),
        }
    }
}

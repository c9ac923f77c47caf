//! Steps: named, immutable units of work with declared dependencies.
//!
//! A `Step` is a cheap handle over shared, immutable state. Steps are built
//! with `StepBuilder`, which is the only place where argument slots get tagged
//! as literal values or references to other steps. Once built, nothing mutates
//! a step; plans and executors only read it.

use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use serde_json::Value;
use stepline_types::naming::{MAX_STEP_NAME_LEN, unique_step_name};
use stepline_types::workflow::{RetryPolicy, StepManifest, StepMetadata};
use uuid::Uuid;

/// Base used for generated names when the builder was given neither a name nor a base.
pub const DEFAULT_NAME_BASE: &str = "step";

// ---------------------------------------------------------------------------
// Invocable
// ---------------------------------------------------------------------------

/// The work item a step wraps.
///
/// Receives the step's arguments with every step reference already replaced
/// by that step's result.
pub trait Invocable: Send + Sync {
    fn invoke(&self, args: &[Value]) -> anyhow::Result<Value>;
}

impl<F> Invocable for F
where
    F: Fn(&[Value]) -> anyhow::Result<Value> + Send + Sync,
{
    fn invoke(&self, args: &[Value]) -> anyhow::Result<Value> {
        self(args)
    }
}

// ---------------------------------------------------------------------------
// Arguments and dependencies
// ---------------------------------------------------------------------------

/// One argument slot of a step.
#[derive(Clone, Debug)]
pub enum StepArg {
    /// Passed to the work item unchanged.
    Literal(Value),
    /// Replaced by the referenced step's result.
    Step(Step),
}

/// An explicit dependency that does not feed an argument.
#[derive(Clone, Debug)]
pub enum Dependency {
    /// A step held by handle.
    Step(Step),
    /// A step known only by name, resolved against the plan.
    Named(String),
}

// ---------------------------------------------------------------------------
// Step
// ---------------------------------------------------------------------------

struct StepInner {
    id: Uuid,
    name: String,
    description: Option<String>,
    work: Arc<dyn Invocable>,
    args: Vec<StepArg>,
    after: Vec<Dependency>,
    retry: Option<RetryPolicy>,
    metadata: StepMetadata,
}

/// Shared handle to an immutable step.
///
/// Equality and hashing use the step's identity, not its name: two steps
/// built separately are different steps even when their names collide.
#[derive(Clone)]
pub struct Step {
    inner: Arc<StepInner>,
}

impl Step {
    /// Start building a step around `work`.
    pub fn builder(work: impl Invocable + 'static) -> StepBuilder {
        StepBuilder::new(Arc::new(work))
    }

    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn description(&self) -> Option<&str> {
        self.inner.description.as_deref()
    }

    pub fn args(&self) -> &[StepArg] {
        &self.inner.args
    }

    pub fn retry_policy(&self) -> Option<&RetryPolicy> {
        self.inner.retry.as_ref()
    }

    pub fn metadata(&self) -> &StepMetadata {
        &self.inner.metadata
    }

    /// Run the work item with already-resolved arguments.
    pub fn invoke(&self, args: &[Value]) -> anyhow::Result<Value> {
        self.inner.work.invoke(args)
    }

    /// Steps this step depends on by handle: step-typed arguments first (in
    /// argument order), then explicit dependencies, each identity once.
    pub fn depends_on(&self) -> Vec<Step> {
        let mut seen = HashSet::new();
        let from_args = self.inner.args.iter().filter_map(|arg| match arg {
            StepArg::Step(step) => Some(step),
            StepArg::Literal(_) => None,
        });
        let from_after = self.inner.after.iter().filter_map(|dep| match dep {
            Dependency::Step(step) => Some(step),
            Dependency::Named(_) => None,
        });
        from_args
            .chain(from_after)
            .filter(|step| seen.insert(step.id()))
            .cloned()
            .collect()
    }

    /// Names of dependencies declared without a handle.
    pub fn named_dependencies(&self) -> impl Iterator<Item = &str> {
        self.inner.after.iter().filter_map(|dep| match dep {
            Dependency::Named(name) => Some(name.as_str()),
            Dependency::Step(_) => None,
        })
    }

    /// Per-step descriptor for packaging collaborators.
    pub fn manifest(&self) -> StepManifest {
        let mut depends_on: Vec<String> = self
            .depends_on()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        for name in self.named_dependencies() {
            if !depends_on.iter().any(|d| d == name) {
                depends_on.push(name.to_string());
            }
        }
        StepManifest {
            name: self.name().to_string(),
            description: self.inner.description.clone(),
            depends_on,
            retry: self.inner.retry.clone(),
            metadata: self.inner.metadata.clone(),
        }
    }
}

impl PartialEq for Step {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Step {}

impl Hash for Step {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.inner.id.hash(state);
    }
}

impl fmt::Debug for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Dependencies are printed by name to keep deep graphs readable.
        let deps: Vec<String> = self
            .depends_on()
            .iter()
            .map(|s| s.name().to_string())
            .collect();
        f.debug_struct("Step")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("depends_on", &deps)
            .field("retry", &self.inner.retry)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.inner.name)
    }
}

// ---------------------------------------------------------------------------
// StepBuilder
// ---------------------------------------------------------------------------

/// Builder for [`Step`].
pub struct StepBuilder {
    work: Arc<dyn Invocable>,
    name: Option<String>,
    name_base: Option<String>,
    description: Option<String>,
    args: Vec<StepArg>,
    after: Vec<Dependency>,
    retry: Option<RetryPolicy>,
    metadata: StepMetadata,
}

impl StepBuilder {
    fn new(work: Arc<dyn Invocable>) -> Self {
        Self {
            work,
            name: None,
            name_base: None,
            description: None,
            args: Vec::new(),
            after: Vec::new(),
            retry: None,
            metadata: StepMetadata::default(),
        }
    }

    /// Use `name` verbatim.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Generate a unique name from `base` instead of a fixed one.
    pub fn name_base(mut self, base: impl Into<String>) -> Self {
        self.name_base = Some(base.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Append a literal argument.
    pub fn arg(mut self, value: impl Into<Value>) -> Self {
        self.args.push(StepArg::Literal(value.into()));
        self
    }

    /// Append an argument fed by `step`'s result.
    pub fn step_arg(mut self, step: &Step) -> Self {
        self.args.push(StepArg::Step(step.clone()));
        self
    }

    /// Append pre-tagged arguments.
    pub fn args(mut self, args: impl IntoIterator<Item = StepArg>) -> Self {
        self.args.extend(args);
        self
    }

    /// Depend on `step` without consuming its result.
    pub fn after(mut self, step: &Step) -> Self {
        self.after.push(Dependency::Step(step.clone()));
        self
    }

    /// Depend on the step called `name` in the same plan.
    pub fn after_named(mut self, name: impl Into<String>) -> Self {
        self.after.push(Dependency::Named(name.into()));
        self
    }

    pub fn retry(mut self, policy: RetryPolicy) -> Self {
        self.retry = Some(policy);
        self
    }

    pub fn metadata(mut self, metadata: StepMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn build(self) -> Step {
        let name = match self.name {
            Some(name) => name,
            None => unique_step_name(
                self.name_base.as_deref().unwrap_or(DEFAULT_NAME_BASE),
                MAX_STEP_NAME_LEN,
            ),
        };
        Step {
            inner: Arc::new(StepInner {
                id: Uuid::now_v7(),
                name,
                description: self.description,
                work: self.work,
                args: self.args,
                after: self.after,
                retry: self.retry,
                metadata: self.metadata,
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

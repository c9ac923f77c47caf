//! `Plan`: the validated dependency graph plus its cached generations.
//!
//! A plan is built once from a set of root steps and is immutable afterwards,
//! except for the target resolver, which a packaging collaborator may inject
//! exactly once after the steps have been deployed.

use std::sync::{Arc, OnceLock};

use serde_json::Value;
use stepline_types::config::CompilerConfig;
use stepline_types::workflow::{StepManifest, WorkflowDocument};

use super::compiler;
use super::dag::{StepGraph, build_graph, compute_generations};
use super::error::{CompileError, ExecutionError, PlanError};
use super::executor::{LocalExecutor, LocalRun};
use super::resolver::{StepNameResolver, TargetResolver};
use super::step::Step;

/// A validated execution plan.
pub struct Plan {
    name: String,
    graph: StepGraph,
    generations: Vec<Vec<Step>>,
    resolver: OnceLock<Arc<dyn TargetResolver>>,
}

impl Plan {
    /// Build and validate a plan from `roots` and everything they depend on.
    ///
    /// Fails if the dependency graph has a cycle, if two distinct steps share
    /// a name, or if a named dependency matches no step.
    pub fn new(name: impl Into<String>, roots: &[Step]) -> Result<Self, PlanError> {
        let name = name.into();
        let graph = build_graph(roots)?;
        let generations = compute_generations(&graph);

        tracing::info!(
            plan = name.as_str(),
            steps = graph.len(),
            generations = generations.len(),
            "plan built"
        );

        Ok(Self {
            name,
            graph,
            generations,
            resolver: OnceLock::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Number of distinct steps.
    pub fn len(&self) -> usize {
        self.graph.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.is_empty()
    }

    /// Every step of the plan exactly once, in generation order.
    pub fn steps(&self) -> Vec<Step> {
        self.generations.iter().flatten().cloned().collect()
    }

    /// Steps in a dependency-respecting (topological) order.
    pub fn topological_steps(&self) -> impl Iterator<Item = &Step> {
        self.graph.steps()
    }

    /// The generation sequence. Identical on every call.
    pub fn generate_layers(&self) -> Vec<Vec<Step>> {
        self.generations.clone()
    }

    /// Borrowed view of the generation sequence.
    pub fn layers(&self) -> &[Vec<Step>] {
        &self.generations
    }

    /// Packaging descriptors for every step, in generation order.
    pub fn manifests(&self) -> Vec<StepManifest> {
        self.generations.iter().flatten().map(Step::manifest).collect()
    }

    // -----------------------------------------------------------------------
    // Remote compilation
    // -----------------------------------------------------------------------

    /// Inject the step -> deployed target mapping. Allowed once.
    pub fn set_target_resolver(
        &self,
        resolver: impl TargetResolver + 'static,
    ) -> Result<(), PlanError> {
        self.resolver
            .set(Arc::new(resolver))
            .map_err(|_| PlanError::ResolverAlreadySet)
    }

    /// Compile with the injected resolver, or with step names as targets
    /// when none was injected.
    pub fn compile_remote(
        &self,
        config: &CompilerConfig,
    ) -> Result<WorkflowDocument, CompileError> {
        match self.resolver.get() {
            Some(resolver) => self.compile_remote_with(resolver.as_ref(), config),
            None => self.compile_remote_with(&StepNameResolver, config),
        }
    }

    /// Compile with an explicit resolver.
    pub fn compile_remote_with(
        &self,
        resolver: &dyn TargetResolver,
        config: &CompilerConfig,
    ) -> Result<WorkflowDocument, CompileError> {
        compiler::compile(&self.name, &self.generations, resolver, config)
    }

    /// Compile and render as a state-machine definition.
    pub fn state_machine(&self, config: &CompilerConfig) -> Result<Value, CompileError> {
        let doc = self.compile_remote(config)?;
        Ok(compiler::to_state_machine(&doc, config))
    }

    // -----------------------------------------------------------------------
    // Local execution
    // -----------------------------------------------------------------------

    /// Run every step in-process, one at a time.
    pub fn run_local(&self) -> Result<LocalRun, ExecutionError> {
        tracing::info!(plan = self.name.as_str(), "starting local run");
        let run = LocalExecutor::run(&self.generations)?;
        tracing::info!(plan = self.name.as_str(), "local run completed");
        Ok(run)
    }

    /// Run every step in-process, each generation's steps concurrently.
    pub async fn run_local_concurrent(&self) -> Result<LocalRun, ExecutionError> {
        tracing::info!(plan = self.name.as_str(), "starting concurrent local run");
        let run = LocalExecutor::run_concurrent(&self.generations).await?;
        tracing::info!(plan = self.name.as_str(), "concurrent local run completed");
        Ok(run)
    }
}

impl std::fmt::Debug for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plan")
            .field("name", &self.name)
            .field("generations", &self.generations)
            .field("resolver_set", &self.resolver.get().is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

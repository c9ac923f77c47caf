//! Core engine for Stepline.
//!
//! Builds a dependency graph of steps, validates it, groups it into
//! generations, and either compiles it into a workflow document for a remote
//! state-machine service or runs it in-process.

pub mod config;
pub mod pipeline;

pub use pipeline::error::{CompileError, ConfigError, ExecutionError, PlanError};
pub use pipeline::plan::Plan;
pub use pipeline::resolver::{FnResolver, StepNameResolver, TargetResolver};
pub use pipeline::step::{Dependency, Invocable, Step, StepArg, StepBuilder};

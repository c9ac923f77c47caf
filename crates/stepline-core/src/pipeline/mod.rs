//! Step pipeline engine: graph construction, validation, layering, remote
//! compilation and local execution.
//!
//! - `step` -- `Step` handles, argument references and the step builder
//! - `dag` -- graph crawl, duplicate-name and cycle checks, generation layering
//! - `plan` -- validated `Plan` with cached generations and resolver slot
//! - `resolver` -- step -> deployed target mapping
//! - `compiler` -- workflow document and state-machine rendering
//! - `payload` -- pass-through payload helpers for deployed steps
//! - `executor` -- in-process sequential and per-generation concurrent runs
//! - `error` -- plan, compile, execution and config errors

pub mod compiler;
pub mod dag;
pub mod error;
pub mod executor;
pub mod payload;
pub mod plan;
pub mod resolver;
pub mod step;

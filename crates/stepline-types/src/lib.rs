//! Shared domain types for Stepline.
//!
//! Retry policy, step metadata, the declarative workflow document, and
//! configuration. No engine logic lives here.
//!
//! Zero infrastructure dependencies -- only serde, schemars, uuid, thiserror.

pub mod config;
pub mod error;
pub mod naming;
pub mod workflow;

//! Observability setup for Stepline: tracing subscriber and optional
//! OpenTelemetry export.

pub mod tracing_setup;

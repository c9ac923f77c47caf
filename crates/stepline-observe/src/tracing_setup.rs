//! Tracing subscriber initialization driven by [`TracingConfig`].
//!
//! ```no_run
//! use stepline_types::config::TracingConfig;
//!
//! stepline_observe::tracing_setup::init_tracing(&TracingConfig::default()).unwrap();
//! // ... build and run plans ...
//! stepline_observe::tracing_setup::shutdown_tracing();
//! ```

use std::sync::OnceLock;

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_sdk::trace::SdkTracerProvider;
use stepline_types::config::TracingConfig;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Held so `shutdown_tracing` can flush buffered spans.
static TRACER_PROVIDER: OnceLock<SdkTracerProvider> = OnceLock::new();

/// Pick the filter directive: a non-empty `RUST_LOG` value wins over the
/// configured one.
pub fn filter_directive(env_value: Option<String>, config: &TracingConfig) -> String {
    env_value
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| config.filter.clone())
}

/// Build the `EnvFilter` for `config`, honouring `RUST_LOG`.
pub fn build_env_filter(config: &TracingConfig) -> Result<EnvFilter, Box<dyn std::error::Error>> {
    let directive = filter_directive(std::env::var(EnvFilter::DEFAULT_ENV).ok(), config);
    Ok(EnvFilter::try_new(directive)?)
}

/// Install the global subscriber.
///
/// Output is human-readable or JSON lines per `config.json`; span close
/// events carry timings. With `config.otel` spans are also exported to
/// stdout through OpenTelemetry.
///
/// # Errors
///
/// Fails if the filter directive does not parse or a global subscriber is
/// already installed.
pub fn init_tracing(config: &TracingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let env_filter = build_env_filter(config)?;

    let json_layer = config.json.then(|| {
        tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });
    let text_layer = (!config.json).then(|| {
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_span_events(FmtSpan::CLOSE)
    });

    let otel_layer = config.otel.then(|| {
        let provider = SdkTracerProvider::builder()
            .with_simple_exporter(opentelemetry_stdout::SpanExporter::default())
            .build();
        let tracer = provider.tracer("stepline");
        let _ = TRACER_PROVIDER.set(provider.clone());
        opentelemetry::global::set_tracer_provider(provider);
        tracing_opentelemetry::layer().with_tracer(tracer)
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(json_layer)
        .with(text_layer)
        .with(otel_layer)
        .try_init()?;

    tracing::debug!(json = config.json, otel = config.otel, "tracing initialized");
    Ok(())
}

/// Flush and shut down the OpenTelemetry provider. No-op without otel.
pub fn shutdown_tracing() {
    if let Some(provider) = TRACER_PROVIDER.get() {
        if let Err(e) = provider.shutdown() {
            eprintln!("Warning: tracer provider shutdown failed: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_env_value_wins() {
        let config = TracingConfig::default();
        let directive = filter_directive(Some("stepline_core=trace".to_string()), &config);
        assert_eq!(directive, "stepline_core=trace");
    }

    #[test]
    fn test_falls_back_to_config() {
        let config = TracingConfig {
            filter: "warn".to_string(),
            ..TracingConfig::default()
        };
        assert_eq!(filter_directive(None, &config), "warn");
        assert_eq!(filter_directive(Some("  ".to_string()), &config), "warn");
    }

    #[test]
    fn test_configured_directive_parses() {
        assert!(EnvFilter::try_new("info,stepline_core=debug").is_ok());
    }

    #[test]
    fn test_shutdown_without_otel_is_noop() {
        shutdown_tracing();
    }
}

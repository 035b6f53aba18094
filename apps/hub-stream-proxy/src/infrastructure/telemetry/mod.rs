//! Tracing Setup
//!
//! Installs a `tracing` subscriber with a formatted console layer and, when
//! an OTLP collector is configured, an OpenTelemetry export layer.
//!
//! # Environment Variables
//!
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint; setting it enables export
//! - `OTEL_ENABLED`: `true` forces export on (default endpoint
//!   `http://localhost:4318`), `false` forces it off
//! - `OTEL_SERVICE_NAME`: overrides the binary's service name
//! - `RUST_LOG`: extra filter directives

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Default OTLP endpoint when export is forced on.
const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Directives added on top of `RUST_LOG`.
const BASE_DIRECTIVES: [&str; 4] = ["hub_stream_proxy=info", "tonic=info", "h2=warn", "hyper=warn"];

/// Shuts the tracer provider down when dropped so buffered spans are flushed.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("Failed to shut down tracer provider: {e}");
        }
    }
}

/// Telemetry configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// OTLP endpoint; `None` keeps export off.
    pub otlp_endpoint: Option<String>,
    /// Service name attached to exported spans.
    pub service_name: String,
}

impl TelemetryConfig {
    /// Read the configuration for a binary named `service_name`.
    #[must_use]
    pub fn from_env(service_name: &str) -> Self {
        Self::resolve(
            std::env::var("OTEL_ENABLED").ok().as_deref(),
            std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").ok(),
            std::env::var("OTEL_SERVICE_NAME").ok(),
            service_name,
        )
    }

    fn resolve(
        enabled: Option<&str>,
        endpoint: Option<String>,
        service_override: Option<String>,
        service_name: &str,
    ) -> Self {
        let otlp_endpoint = match enabled.map(str::to_lowercase).as_deref() {
            Some("false") => None,
            Some("true") => Some(endpoint.unwrap_or_else(|| DEFAULT_OTLP_ENDPOINT.to_string())),
            _ => endpoint,
        };

        Self {
            otlp_endpoint,
            service_name: service_override.unwrap_or_else(|| service_name.to_string()),
        }
    }
}

/// Initialize tracing for `service_name` from the environment.
///
/// Keep the returned guard alive for the lifetime of the program.
#[must_use]
pub fn init(service_name: &str) -> TelemetryGuard {
    init_with_config(TelemetryConfig::from_env(service_name))
}

/// Initialize tracing with an explicit configuration.
///
/// Falls back to console-only logging if the exporter cannot be built.
#[must_use]
pub fn init_with_config(config: TelemetryConfig) -> TelemetryGuard {
    let env_filter = BASE_DIRECTIVES
        .iter()
        .filter_map(|d| d.parse::<Directive>().ok())
        .fold(EnvFilter::from_default_env(), EnvFilter::add_directive);

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false);

    let exporter = config.otlp_endpoint.as_ref().map(|endpoint| {
        opentelemetry_otlp::SpanExporter::builder()
            .with_tonic()
            .with_endpoint(endpoint)
            .build()
    });

    let tracer_provider = match exporter {
        Some(Ok(exporter)) => Some(
            SdkTracerProvider::builder()
                .with_batch_exporter(exporter)
                .with_resource(
                    opentelemetry_sdk::Resource::builder()
                        .with_service_name(config.service_name.clone())
                        .build(),
                )
                .build(),
        ),
        Some(Err(e)) => {
            eprintln!("OTLP exporter unavailable, logging to console only: {e}");
            None
        }
        None => None,
    };

    let otel_layer = tracer_provider.as_ref().map(|provider| {
        tracing_opentelemetry::layer().with_tracer(provider.tracer(config.service_name.clone()))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(otel_layer)
        .init();

    TelemetryGuard { tracer_provider }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn export_is_off_without_endpoint() {
        let config = TelemetryConfig::resolve(None, None, None, "hub-stream-proxy");
        assert_eq!(config.otlp_endpoint, None);
        assert_eq!(config.service_name, "hub-stream-proxy");
    }

    #[test]
    fn endpoint_enables_export() {
        let config = TelemetryConfig::resolve(
            None,
            Some("http://otel:4317".into()),
            None,
            "hub-stream-consumer",
        );
        assert_eq!(config.otlp_endpoint.as_deref(), Some("http://otel:4317"));
    }

    #[test]
    fn explicit_switch_wins() {
        let off = TelemetryConfig::resolve(Some("FALSE"), Some("http://otel:4317".into()), None, "x");
        assert_eq!(off.otlp_endpoint, None);

        let on = TelemetryConfig::resolve(Some("true"), None, Some("custom".into()), "x");
        assert_eq!(on.otlp_endpoint.as_deref(), Some(DEFAULT_OTLP_ENDPOINT));
        assert_eq!(on.service_name, "custom");
    }

    #[test]
    fn base_directives_parse() {
        for directive in BASE_DIRECTIVES {
            assert!(directive.parse::<Directive>().is_ok());
        }
    }
}

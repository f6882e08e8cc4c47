//! Tracing Bootstrap
//!
//! One subscriber for the whole process: an `EnvFilter`, a fmt layer and,
//! unless disabled, an OTLP span exporter. If the exporter cannot be built
//! the bridge keeps logging locally.
//!
//! # Field conventions
//!
//! Bridge events carry structured fields rather than formatted text:
//!
//! - record metadata: `partition`, `offset`, `key`, `bytes`, `headers`
//! - execution relay: `execution_id`, `order_id`, `topic`
//! - librdkafka's own log lines: `client` (consumer, producer or metadata)
//!   and `kafka_facility` (the librdkafka facility, e.g. `REQTMOUT`)
//!
//! librdkafka lines are re-emitted from the `kafka` module, so the
//! `order_stream_bridge` directive governs them; `rdkafka=warn` only quiets
//! the wrapper crate.
//!
//! # Environment Variables
//!
//! - `OTEL_ENABLED`: Set to "false" or "0" to disable the exporter (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: http://localhost:4318)
//! - `OTEL_SERVICE_NAME`: Service name for traces (default: order-stream-bridge)
//! - `RUST_LOG`: Extra filter directives, applied before the built-in ones

use opentelemetry::trace::TracerProvider as _;
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::SdkTracerProvider;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

const DEFAULT_SERVICE_NAME: &str = "order-stream-bridge";

const DEFAULT_OTLP_ENDPOINT: &str = "http://localhost:4318";

/// Directives added on top of `RUST_LOG`.
const BUILTIN_DIRECTIVES: &[&str] = &[
    "order_stream_bridge=info",
    "rdkafka=warn",
    "h2=warn",
    "hyper=warn",
];

/// Shuts the tracer provider down when dropped, flushing pending spans.
pub struct TelemetryGuard {
    tracer_provider: Option<SdkTracerProvider>,
}

impl TelemetryGuard {
    /// Whether spans are being exported over OTLP.
    #[must_use]
    pub const fn is_exporting(&self) -> bool {
        self.tracer_provider.is_some()
    }
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.tracer_provider.take()
            && let Err(e) = provider.shutdown()
        {
            eprintln!("order-stream-bridge: tracer provider shutdown failed: {e}");
        }
    }
}

/// Exporter settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Export spans over OTLP.
    pub enabled: bool,
    /// Collector endpoint.
    pub otlp_endpoint: String,
    /// Reported as `service.name`.
    pub service_name: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            otlp_endpoint: DEFAULT_OTLP_ENDPOINT.to_string(),
            service_name: DEFAULT_SERVICE_NAME.to_string(),
        }
    }
}

impl TelemetryConfig {
    /// Read settings from the process environment.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read settings through `lookup`. Blank values count as unset.
    #[must_use]
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let defaults = Self::default();

        Self {
            enabled: get("OTEL_ENABLED").is_none_or(|v| {
                !matches!(v.trim().to_ascii_lowercase().as_str(), "false" | "0" | "no")
            }),
            otlp_endpoint: get("OTEL_EXPORTER_OTLP_ENDPOINT").unwrap_or(defaults.otlp_endpoint),
            service_name: get("OTEL_SERVICE_NAME").unwrap_or(defaults.service_name),
        }
    }
}

/// Add the built-in directives to `base`.
fn with_builtin_directives(base: EnvFilter) -> EnvFilter {
    BUILTIN_DIRECTIVES.iter().fold(base, |filter, directive| {
        match directive.parse() {
            Ok(parsed) => filter.add_directive(parsed),
            Err(_) => filter,
        }
    })
}

/// Install the subscriber using settings from the environment.
///
/// Keep the returned guard alive for the life of the process.
#[must_use]
pub fn init() -> TelemetryGuard {
    init_with_config(TelemetryConfig::from_env())
}

/// Install the subscriber with explicit settings.
#[must_use]
pub fn init_with_config(config: TelemetryConfig) -> TelemetryGuard {
    let env_filter = with_builtin_directives(EnvFilter::from_default_env());
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);
    let registry = tracing_subscriber::registry().with(env_filter).with(fmt_layer);

    if !config.enabled {
        registry.init();
        tracing::debug!("OTLP export disabled");
        return TelemetryGuard {
            tracer_provider: None,
        };
    }

    let exporter = match opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(&config.otlp_endpoint)
        .build()
    {
        Ok(exporter) => exporter,
        Err(e) => {
            registry.init();
            tracing::warn!(
                endpoint = %config.otlp_endpoint,
                error = %e,
                "OTLP exporter unavailable, continuing with local logging only"
            );
            return TelemetryGuard {
                tracer_provider: None,
            };
        }
    };

    let tracer_provider = SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_resource(
            opentelemetry_sdk::Resource::builder()
                .with_service_name(config.service_name.clone())
                .build(),
        )
        .build();
    let tracer = tracer_provider.tracer(config.service_name);

    registry
        .with(tracing_opentelemetry::layer().with_tracer(tracer))
        .init();

    TelemetryGuard {
        tracer_provider: Some(tracer_provider),
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use test_case::test_case;

    use super::*;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn unset_environment_uses_defaults() {
        assert_eq!(TelemetryConfig::from_lookup(lookup(&[])), TelemetryConfig::default());
    }

    #[test_case("false", false; "false")]
    #[test_case("FALSE", false; "upper case")]
    #[test_case("0", false; "zero")]
    #[test_case("no", false; "no")]
    #[test_case("true", true; "true")]
    #[test_case("   ", true; "blank")]
    fn otel_enabled_flag(raw: &str, expected: bool) {
        let config = TelemetryConfig::from_lookup(lookup(&[("OTEL_ENABLED", raw)]));
        assert_eq!(config.enabled, expected);
    }

    #[test]
    fn endpoint_and_service_name_override() {
        let config = TelemetryConfig::from_lookup(lookup(&[
            ("OTEL_EXPORTER_OTLP_ENDPOINT", "http://collector:4318"),
            ("OTEL_SERVICE_NAME", "bridge-canary"),
        ]));
        assert_eq!(config.otlp_endpoint, "http://collector:4318");
        assert_eq!(config.service_name, "bridge-canary");
    }

    #[test]
    fn builtin_directives_are_applied() {
        let rendered = with_builtin_directives(EnvFilter::new(""))
            .to_string()
            .to_ascii_lowercase();
        for directive in BUILTIN_DIRECTIVES {
            assert!(rendered.contains(directive), "{directive} missing from {rendered}");
        }
    }
}

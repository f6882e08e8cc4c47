//! Infrastructure Layer - Adapters and external integrations.
//!
//! Concrete implementations of the application ports plus the process-level
//! concerns (configuration, telemetry, metrics, health).

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// JSON file identity store.
pub mod identity;

/// Kafka readers, producer and metadata probe.
pub mod kafka;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Trading session adapters.
pub mod session;

/// OpenTelemetry tracing integration.
pub mod telemetry;

#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::needless_collect,
        clippy::option_if_let_else,
        clippy::default_trait_access,
        clippy::items_after_statements,
        clippy::or_fun_call
    )
)]

//! Order Stream Bridge - Kafka Order Ingestion and Execution Relay
//!
//! Consumes new-order records from a Kafka topic, resolves the submitting
//! identity, hands protocol-native orders to a trading session, and publishes
//! the session's execution events back to Kafka.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Order, identity, execution and consumption types
//!   - `order`: Inbound requests, client order ids, outbound orders
//!   - `identity`: Immutable token → identity directory
//!   - `execution`: Execution events
//!   - `consumption`: Consumption mode and the fallback policy
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Broker transport, publisher, trading session
//!   - `services`: Decoder, dispatcher, read loops, consumption monitor,
//!     execution relay
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `kafka`: Group and partition readers, producer, metadata probe
//!   - `session`: Paper trading session
//!   - `identity`: JSON identity store
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!
//! # Data Flow
//!
//! ```text
//! orders topic ──► group reader ─┐
//!                                ├─► decode ─► dispatch ─► trading session
//! orders topic ──► direct[p] ────┘                              │
//!                                                              ▼
//! exec topic ◄──── publisher ◄──── relay queue ◄──── execution handler
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::consumption::{ConsumptionMode, ConsumptionSnapshot};
pub use domain::execution::ExecutionEvent;
pub use domain::identity::{IdentityDirectory, IdentityRecord};
pub use domain::order::{ClientOrderId, OrderRequest, OutboundOrder};

// Services
pub use application::services::{
    BridgeStats, ConsumptionMonitor, ExecutionRelay, OrderDispatcher, OrderPipeline,
    execution_relay, log_topic_layout, spawn_topic_layout,
};

// Infrastructure config
pub use infrastructure::config::{BridgeConfig, ConfigError};

// Health server
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};

// Adapters
pub use infrastructure::identity::{IdentityStoreError, JsonIdentityStore};
pub use infrastructure::kafka::KafkaTransport;
pub use infrastructure::session::PaperTradingSession;

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{TelemetryConfig, TelemetryGuard, init as init_telemetry};

//! Order Stream Bridge Binary
//!
//! Starts the Kafka order ingestion pipeline and the execution relay.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin order-stream-bridge
//! ```
//!
//! # Environment Variables
//!
//! ## Kafka
//! - `KAFKA_BROKERS`: Comma-separated broker list (default: localhost:9092)
//! - `KAFKA_ORDERS_TOPIC`: Inbound order topic (default: new_orders)
//! - `KAFKA_EXEC_TOPIC`: Outbound execution topic (default: execution_report)
//! - `KAFKA_GROUP_ID`: Consumer group (default: order-stream-bridge)
//!
//! ## Optional
//! - `ORDER_BRIDGE_IDENTITY_FILE`: Identity list (default: config/identities.json)
//! - `ORDER_BRIDGE_SESSION_ID`: Paper session id (default: FIX.4.4:BRIDGE->PAPER)
//! - `ORDER_BRIDGE_HEALTH_PORT`: Health/metrics HTTP port, 0 disables (default: 8083)
//! - `ORDER_BRIDGE_FALLBACK_ENABLED`: Allow direct partition fallback (default: true)
//! - `ORDER_BRIDGE_SHUTDOWN_TIMEOUT_SECS`: Relay drain bound (default: 10)
//! - `OTEL_ENABLED`: Enable OpenTelemetry (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4318>)
//! - `RUST_LOG`: Log level (default: info)

use std::sync::Arc;

use anyhow::Context;
use order_stream_bridge::application::ports::{
    ConsumerTransport, OrderTrackerPort, RecordPublisher, TradingSessionPort,
};
use order_stream_bridge::infrastructure::telemetry;
use order_stream_bridge::{
    BridgeConfig, BridgeStats, ConsumptionMonitor, HealthServer, HealthServerState,
    JsonIdentityStore, KafkaTransport, OrderDispatcher, OrderPipeline, PaperTradingSession,
    execution_relay, init_metrics, spawn_topic_layout,
};
use tokio::signal;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_dotenv();

    // Initialize telemetry (OpenTelemetry + tracing)
    let telemetry_guard = telemetry::init();

    tracing::info!(
        otlp = telemetry_guard.is_exporting(),
        "Starting Order Stream Bridge"
    );

    // Initialize Prometheus metrics
    if let Err(e) = init_metrics() {
        tracing::warn!(error = %e, "Prometheus recorder not installed, metrics disabled");
    }

    let config = BridgeConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();

    // Collaborators
    let identities = JsonIdentityStore::new(config.session.identity_file.clone())
        .load()
        .context("failed to load identities")?;
    let session = Arc::new(PaperTradingSession::new(config.session.session_id.clone()));

    let transport = Arc::new(
        KafkaTransport::connect(config.kafka.clone(), config.tuning.clone())
            .context("failed to create Kafka clients")?,
    );

    // Execution relay: session callback -> bounded queue -> producer
    let stats = Arc::new(BridgeStats::new());
    let (callback, relay) = execution_relay(
        Arc::clone(&transport) as Arc<dyn RecordPublisher>,
        config.relay_config(),
        Arc::clone(&stats),
    );
    session.register_execution_handler(Arc::new(callback));

    // Ingestion pipeline
    let dispatcher = OrderDispatcher::new(
        Arc::new(identities),
        Arc::clone(&session) as Arc<dyn TradingSessionPort>,
        Arc::clone(&session) as Arc<dyn OrderTrackerPort>,
    );
    let pipeline = Arc::new(OrderPipeline::new(dispatcher, Arc::clone(&stats)));

    // Startup diagnostic; runs alongside the read loops
    let _layout_task = spawn_topic_layout(
        Arc::clone(&transport) as Arc<dyn ConsumerTransport>,
        config.kafka.orders_topic.clone(),
        shutdown_token.clone(),
    );

    let (monitor, consumption_rx) = ConsumptionMonitor::new(
        Arc::clone(&transport) as Arc<dyn ConsumerTransport>,
        pipeline,
        config.monitor_config(),
    );

    // Spawn consumption monitor (owns every read loop)
    let monitor_task = tokio::spawn(monitor.run(shutdown_token.clone()));

    // Spawn execution relay
    let relay_task = tokio::spawn(relay.run(shutdown_token.clone()));

    // Spawn health server
    if config.server.health_port == 0 {
        tracing::info!("Health server disabled");
    } else {
        let health_state = Arc::new(HealthServerState::new(
            env!("CARGO_PKG_VERSION").to_string(),
            Arc::clone(&stats),
            consumption_rx,
        ));
        let health_server = HealthServer::new(
            config.server.health_port,
            health_state,
            shutdown_token.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = health_server.run().await {
                tracing::error!(error = %e, "Health server error");
            }
        });
    }

    tracing::info!("Order stream bridge ready");

    await_shutdown(shutdown_token).await;

    match monitor_task.await {
        Ok(mode) => tracing::info!(mode = mode.as_str(), "Consumption monitor stopped"),
        Err(e) => tracing::error!(error = %e, "Consumption monitor task failed"),
    }
    if let Err(e) = relay_task.await {
        tracing::error!(error = %e, "Execution relay task failed");
    }
    if let Err(e) = transport.close().await {
        tracing::error!(error = %e, "Resource close failures during shutdown");
    }

    let totals = stats.snapshot();
    tracing::info!(
        records_received = totals.records_received,
        orders_dispatched = totals.orders_dispatched,
        executions_published = totals.executions_published,
        executions_dropped = totals.executions_dropped,
        "Order stream bridge stopped"
    );
    Ok(())
}

/// Log the parsed configuration.
fn log_config(config: &BridgeConfig) {
    tracing::info!(
        brokers = %config.kafka.bootstrap_servers(),
        orders_topic = %config.kafka.orders_topic,
        exec_topic = %config.kafka.exec_reports_topic,
        group_id = %config.kafka.group_id,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        check_interval_secs = config.monitor.check_interval.as_secs(),
        fallback_enabled = config.monitor.fallback_enabled,
        relay_queue = config.relay.queue_capacity,
        relay_in_flight = config.relay.max_in_flight,
        identity_file = %config.session.identity_file.display(),
        session_id = %config.session.session_id,
        "Bridge tuning"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel every task.
#[allow(clippy::expect_used)]
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("signal handler installation is critical for graceful shutdown");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("SIGTERM handler installation is critical for graceful shutdown")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();
    tracing::info!("Graceful shutdown started");
}

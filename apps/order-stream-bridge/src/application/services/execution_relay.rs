//! Execution Relay
//!
//! Bridges execution callbacks from the trading session onto the outbound
//! topic.
//!
//! ```text
//! session thread ──on_execution_event──► ExecutionCallback
//!                                          │ serialize, try_send
//!                                          ▼
//!                                   bounded mpsc queue
//!                                          │
//!                                          ▼
//!                 ExecutionRelay ──JoinSet (≤ max_in_flight)──► RecordPublisher
//! ```
//!
//! The callback never blocks: a full queue drops the event. Publish failures
//! are logged and dropped. Delivery is at most once.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ExecutionEventHandler, OutboundRecord, RecordPublisher};
use crate::application::services::stats::BridgeStats;
use crate::domain::execution::ExecutionEvent;
use crate::infrastructure::metrics;

/// Relay settings.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Outbound execution report topic.
    pub topic: String,
    /// Serialized events waiting for a publish slot.
    pub queue_capacity: usize,
    /// Concurrent publishes.
    pub max_in_flight: usize,
    /// How long in-flight publishes may run after shutdown starts.
    pub drain_timeout: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            topic: "execution_report".to_string(),
            queue_capacity: 1024,
            max_in_flight: 64,
            drain_timeout: Duration::from_secs(10),
        }
    }
}

struct PendingExecution {
    order_id: String,
    record: OutboundRecord,
}

/// Execution handler registered with the trading session.
pub struct ExecutionCallback {
    topic: String,
    tx: mpsc::Sender<PendingExecution>,
    stats: Arc<BridgeStats>,
}

impl ExecutionEventHandler for ExecutionCallback {
    fn on_execution_event(&self, event: ExecutionEvent) {
        tracing::debug!(
            execution_id = %event.execution_id,
            order_id = %event.order_id,
            fields = event.fields.len(),
            "Execution event received"
        );

        let payload = match event.to_payload() {
            Ok(payload) => payload,
            Err(e) => {
                self.stats.record_publish_failure();
                metrics::record_execution_publish_failed();
                tracing::error!(
                    execution_id = %event.execution_id,
                    error = %e,
                    "Failed to serialize execution event"
                );
                return;
            }
        };

        let pending = PendingExecution {
            order_id: event.order_id,
            record: OutboundRecord {
                topic: self.topic.clone(),
                key: event.execution_id,
                payload,
            },
        };

        match self.tx.try_send(pending) {
            Ok(()) => {}
            Err(TrySendError::Full(pending)) => {
                self.stats.record_execution_dropped();
                metrics::record_execution_dropped();
                tracing::warn!(
                    execution_id = %pending.record.key,
                    order_id = %pending.order_id,
                    "Execution relay queue full, dropping event"
                );
            }
            Err(TrySendError::Closed(pending)) => {
                self.stats.record_execution_dropped();
                metrics::record_execution_dropped();
                tracing::warn!(
                    execution_id = %pending.record.key,
                    order_id = %pending.order_id,
                    "Execution relay stopped, dropping event"
                );
            }
        }
    }
}

/// Publishing side of the relay; run it as a task.
pub struct ExecutionRelay {
    publisher: Arc<dyn RecordPublisher>,
    rx: mpsc::Receiver<PendingExecution>,
    config: RelayConfig,
    stats: Arc<BridgeStats>,
}

/// Create the callback/relay pair.
#[must_use]
pub fn execution_relay(
    publisher: Arc<dyn RecordPublisher>,
    config: RelayConfig,
    stats: Arc<BridgeStats>,
) -> (ExecutionCallback, ExecutionRelay) {
    let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
    let callback = ExecutionCallback {
        topic: config.topic.clone(),
        tx,
        stats: Arc::clone(&stats),
    };
    let relay = ExecutionRelay {
        publisher,
        rx,
        config,
        stats,
    };
    (callback, relay)
}

impl ExecutionRelay {
    /// Publish queued events until `cancel` fires, then drain in-flight
    /// publishes within the drain timeout.
    pub async fn run(mut self, cancel: CancellationToken) {
        let permits = Arc::new(Semaphore::new(self.config.max_in_flight.max(1)));
        let mut in_flight = JoinSet::new();

        tracing::info!(
            topic = %self.config.topic,
            max_in_flight = self.config.max_in_flight,
            "Execution relay started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                    log_join(joined);
                }
                pending = self.rx.recv() => {
                    let Some(pending) = pending else { break };
                    let permit = tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            self.drop_pending(&pending);
                            break;
                        }
                        permit = Arc::clone(&permits).acquire_owned() => permit,
                    };
                    let Ok(permit) = permit else { break };

                    let publisher = Arc::clone(&self.publisher);
                    let stats = Arc::clone(&self.stats);
                    in_flight.spawn(async move {
                        let _permit = permit;
                        publish_one(publisher.as_ref(), &stats, pending).await;
                    });
                }
            }
        }

        self.rx.close();
        while let Ok(pending) = self.rx.try_recv() {
            self.drop_pending(&pending);
        }

        self.drain(in_flight).await;
        tracing::info!("Execution relay stopped");
    }

    fn drop_pending(&self, pending: &PendingExecution) {
        self.stats.record_execution_dropped();
        metrics::record_execution_dropped();
        tracing::warn!(
            execution_id = %pending.record.key,
            order_id = %pending.order_id,
            "Shutting down, dropping queued execution event"
        );
    }

    async fn drain(&self, mut in_flight: JoinSet<()>) {
        if in_flight.is_empty() {
            return;
        }
        tracing::info!(in_flight = in_flight.len(), "Draining in-flight publishes");

        let drained = tokio::time::timeout(self.config.drain_timeout, async {
            while let Some(joined) = in_flight.join_next().await {
                log_join(joined);
            }
        })
        .await;

        if drained.is_err() {
            tracing::warn!(
                remaining = in_flight.len(),
                "Drain timeout elapsed, aborting remaining publishes"
            );
            in_flight.abort_all();
            while in_flight.join_next().await.is_some() {}
        }
    }
}

impl std::fmt::Debug for ExecutionRelay {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecutionRelay")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

async fn publish_one(publisher: &dyn RecordPublisher, stats: &BridgeStats, pending: PendingExecution) {
    let PendingExecution { order_id, record } = pending;
    let execution_id = record.key.clone();
    let topic = record.topic.clone();
    tracing::info!(
        execution_id = %execution_id,
        order_id = %order_id,
        topic = %topic,
        bytes = record.payload.len(),
        "Publishing execution event"
    );

    match publisher.publish(record).await {
        Ok(()) => {
            stats.record_execution_published();
            metrics::record_execution_published();
            tracing::info!(execution_id = %execution_id, topic = %topic, "Execution event published");
        }
        Err(e) => {
            stats.record_publish_failure();
            metrics::record_execution_publish_failed();
            tracing::warn!(
                execution_id = %execution_id,
                order_id = %order_id,
                topic = %topic,
                error = %e,
                "Execution event publish failed"
            );
        }
    }
}

fn log_join(joined: Result<(), tokio::task::JoinError>) {
    match joined {
        Err(e) if !e.is_cancelled() => tracing::error!(error = %e, "Publish task failed"),
        _ => {}
    }
}

//! Consumption Monitor
//!
//! Owns the group read loop and, after fallback, the direct partition
//! workers. On a fixed tick it inspects group statistics; when the group has
//! never been assigned a partition and nothing has been consumed, it swaps to
//! one direct reader per partition starting at the latest offset.
//!
//! # Fallback Sequence
//!
//! 1. Probe topic metadata (abort and retry next tick on failure)
//! 2. Open every direct reader (abort and retry next tick on failure)
//! 3. Re-read group statistics; if the group consumed or got an assignment
//!    in the meantime, close the new readers and stay on the group
//! 4. Stop and join the group read loop
//! 5. Close the group reader
//! 6. Spawn one worker per partition
//!
//! The switch is one-way. Only this task mutates the consumption mode;
//! everything else observes it through the published snapshot.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior, interval_at};
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ConsumerTransport, RecordReader, TransportError};
use crate::application::services::order_pipeline::{OrderPipeline, ReaderKind};
use crate::application::services::partition_workers::PartitionWorkers;
use crate::application::services::read_loop::{ReadLoopConfig, ReadLoopSummary, run_read_loop};
use crate::domain::consumption::{
    ConsumptionMode, ConsumptionSnapshot, FallbackDetector, GroupStats, TopicMetadata,
};
use crate::infrastructure::metrics;

/// Monitor settings.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Inbound topic whose partitions the direct readers bind to.
    pub orders_topic: String,
    /// Health check period; the first check runs one period after start.
    pub check_interval: Duration,
    /// Whether the no-assignment fallback may fire at all.
    pub fallback_enabled: bool,
    /// Retry pauses for every read loop the monitor starts.
    pub read_loop: ReadLoopConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            orders_topic: "new_orders".to_string(),
            check_interval: Duration::from_secs(5),
            fallback_enabled: true,
            read_loop: ReadLoopConfig::default(),
        }
    }
}

/// Why a fallback attempt was abandoned.
#[derive(Debug, thiserror::Error)]
pub enum FallbackError {
    /// Metadata probe failed.
    #[error("partition discovery failed: {0}")]
    Discovery(TransportError),

    /// The topic reported no partitions.
    #[error("topic {0} has no partitions")]
    NoPartitions(String),

    /// Opening the direct readers failed.
    #[error("opening direct readers failed: {0}")]
    OpenReaders(TransportError),
}

/// Health monitor and fallback controller.
pub struct ConsumptionMonitor {
    transport: Arc<dyn ConsumerTransport>,
    pipeline: Arc<OrderPipeline>,
    config: MonitorConfig,
    snapshot_tx: watch::Sender<ConsumptionSnapshot>,
}

impl ConsumptionMonitor {
    /// Create a monitor and the receiver for its published snapshots.
    #[must_use]
    pub fn new(
        transport: Arc<dyn ConsumerTransport>,
        pipeline: Arc<OrderPipeline>,
        config: MonitorConfig,
    ) -> (Self, watch::Receiver<ConsumptionSnapshot>) {
        let (snapshot_tx, snapshot_rx) = watch::channel(ConsumptionSnapshot::default());
        (
            Self {
                transport,
                pipeline,
                config,
                snapshot_tx,
            },
            snapshot_rx,
        )
    }

    /// Run until `cancel` fires, then stop and join every read loop.
    /// Returns the final consumption mode.
    pub async fn run(self, cancel: CancellationToken) -> ConsumptionMode {
        let group_cancel = cancel.child_token();
        let mut group_task = self.start_group_loop(&group_cancel);

        let mut workers = PartitionWorkers::new(cancel.clone());
        let mut detector = FallbackDetector::new(self.config.fallback_enabled);
        let mut mode = ConsumptionMode::Group;
        metrics::set_consumption_mode(mode);

        let period = self.config.check_interval;
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        tracing::info!(
            interval_ms = u64::try_from(period.as_millis()).unwrap_or(u64::MAX),
            fallback_enabled = self.config.fallback_enabled,
            "Consumption monitor started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if mode == ConsumptionMode::Direct {
                self.publish(mode, GroupStats::default(), workers.partitions());
                continue;
            }

            let Some(stats) = self.transport.group_reader().map(|reader| reader.stats()) else {
                tracing::warn!("Group reader unavailable");
                self.publish(mode, GroupStats::default(), Vec::new());
                continue;
            };

            tracing::debug!(
                assigned = ?stats.assigned_partitions,
                messages = stats.messages,
                "Group consumption check"
            );
            self.publish(mode, stats.clone(), Vec::new());

            if !detector.should_fall_back(&stats) {
                continue;
            }

            tracing::warn!(
                topic = %self.config.orders_topic,
                "Consumer group has no partition assignment and nothing consumed, falling back to direct readers"
            );

            let readers = match self.open_direct_readers(&cancel).await {
                Ok(readers) => readers,
                Err(e) => {
                    tracing::warn!(error = %e, "Fallback aborted, retrying next tick");
                    continue;
                }
            };

            // Discovery can take a while; the group may have come alive meanwhile.
            if let Some(latest) = self.transport.group_reader().map(|reader| reader.stats())
                && !detector.should_fall_back(&latest)
            {
                tracing::info!(
                    assigned = ?latest.assigned_partitions,
                    messages = latest.messages,
                    "Consumer group recovered during partition discovery, keeping group consumption"
                );
                close_unused_readers(&readers);
                self.publish(mode, latest, Vec::new());
                continue;
            }

            group_cancel.cancel();
            if let Some(task) = group_task.take() {
                join_group_loop(task).await;
            }
            match self.transport.close_group_reader() {
                Ok(true) => tracing::info!("Group reader closed"),
                Ok(false) => tracing::debug!("Group reader was already closed"),
                Err(e) => tracing::warn!(error = %e, "Closing group reader failed"),
            }

            for (partition, reader) in readers {
                workers.spawn(
                    partition,
                    reader,
                    Arc::clone(&self.pipeline),
                    self.config.read_loop,
                );
            }

            mode = ConsumptionMode::Direct;
            metrics::set_consumption_mode(mode);
            metrics::set_direct_readers(workers.len());
            self.publish(mode, GroupStats::default(), workers.partitions());
            tracing::info!(
                partitions = ?workers.partitions(),
                "Direct partition consumption active"
            );
        }

        group_cancel.cancel();
        if let Some(task) = group_task.take() {
            join_group_loop(task).await;
        }
        workers.shutdown().await;
        metrics::set_direct_readers(0);

        tracing::info!(mode = %mode, "Consumption monitor stopped");
        mode
    }

    fn start_group_loop(
        &self,
        cancel: &CancellationToken,
    ) -> Option<JoinHandle<ReadLoopSummary>> {
        let Some(reader) = self.transport.group_reader() else {
            tracing::warn!("No group reader available at startup");
            return None;
        };
        Some(tokio::spawn(run_read_loop(
            ReaderKind::Group,
            reader,
            Arc::clone(&self.pipeline),
            self.config.read_loop,
            cancel.clone(),
        )))
    }

    async fn open_direct_readers(
        &self,
        cancel: &CancellationToken,
    ) -> Result<Vec<(i32, Arc<dyn RecordReader>)>, FallbackError> {
        let metadata = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(FallbackError::Discovery(TransportError::Cancelled)),
            result = self.transport.probe_topic(&self.config.orders_topic) => {
                result.map_err(FallbackError::Discovery)?
            }
        };

        let partitions = metadata.partition_ids();
        if partitions.is_empty() {
            return Err(FallbackError::NoPartitions(self.config.orders_topic.clone()));
        }

        self.transport
            .open_direct_readers(&partitions)
            .map_err(FallbackError::OpenReaders)
    }

    fn publish(&self, mode: ConsumptionMode, group: GroupStats, direct_partitions: Vec<i32>) {
        self.snapshot_tx.send_replace(ConsumptionSnapshot {
            mode,
            group,
            direct_partitions,
            last_check: Some(Utc::now()),
        });
    }
}

impl std::fmt::Debug for ConsumptionMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsumptionMonitor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn close_unused_readers(readers: &[(i32, Arc<dyn RecordReader>)]) {
    for (partition, reader) in readers {
        if let Err(e) = reader.close() {
            tracing::warn!(partition, error = %e, "Closing unused direct reader failed");
        }
    }
}

async fn join_group_loop(task: JoinHandle<ReadLoopSummary>) {
    if let Err(e) = task.await {
        tracing::error!(error = %e, "Group read loop task failed");
    }
}

/// Run [`log_topic_layout`] as its own task so a slow metadata probe never
/// holds up the read loops.
pub fn spawn_topic_layout(
    transport: Arc<dyn ConsumerTransport>,
    topic: String,
    cancel: CancellationToken,
) -> JoinHandle<Option<TopicMetadata>> {
    tokio::spawn(async move { log_topic_layout(transport.as_ref(), &topic, &cancel).await })
}

/// One-shot startup diagnostic: log the partition layout of `topic`.
///
/// Failures are logged and swallowed.
pub async fn log_topic_layout(
    transport: &dyn ConsumerTransport,
    topic: &str,
    cancel: &CancellationToken,
) -> Option<TopicMetadata> {
    let result = tokio::select! {
        biased;
        () = cancel.cancelled() => return None,
        result = transport.probe_topic(topic) => result,
    };

    match result {
        Ok(metadata) => {
            tracing::info!(
                topic = %metadata.topic,
                partitions = metadata.partitions.len(),
                "Topic metadata"
            );
            for partition in &metadata.partitions {
                tracing::info!(
                    topic = %metadata.topic,
                    partition = partition.id,
                    leader = %partition.leader,
                    replicas = ?partition.replicas,
                    isr = ?partition.isr,
                    "Partition layout"
                );
            }
            Some(metadata)
        }
        Err(e) => {
            tracing::warn!(topic, error = %e, "Topic metadata probe failed");
            None
        }
    }
}

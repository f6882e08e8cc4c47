//! Partition Workers
//!
//! Registry of direct-reader loops keyed by partition id. Each worker has its
//! own child cancellation token so it can be stopped alone or together with
//! the rest on shutdown.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::ports::RecordReader;
use crate::application::services::order_pipeline::{OrderPipeline, ReaderKind};
use crate::application::services::read_loop::{ReadLoopConfig, ReadLoopSummary, run_read_loop};

struct PartitionWorker {
    cancel: CancellationToken,
    handle: JoinHandle<ReadLoopSummary>,
}

/// Supervised set of per-partition read loops.
pub struct PartitionWorkers {
    parent: CancellationToken,
    workers: BTreeMap<i32, PartitionWorker>,
}

impl PartitionWorkers {
    /// Create an empty registry whose workers stop when `parent` is cancelled.
    #[must_use]
    pub const fn new(parent: CancellationToken) -> Self {
        Self {
            parent,
            workers: BTreeMap::new(),
        }
    }

    /// Spawn a read loop for `partition`. Returns `false` if one is already
    /// running for it.
    pub fn spawn(
        &mut self,
        partition: i32,
        reader: Arc<dyn RecordReader>,
        pipeline: Arc<OrderPipeline>,
        config: ReadLoopConfig,
    ) -> bool {
        if self.workers.contains_key(&partition) {
            tracing::warn!(partition, "Direct reader already running");
            return false;
        }

        let cancel = self.parent.child_token();
        let handle = tokio::spawn(run_read_loop(
            ReaderKind::Direct(partition),
            reader,
            pipeline,
            config,
            cancel.clone(),
        ));
        self.workers.insert(partition, PartitionWorker { cancel, handle });
        true
    }

    /// Partitions with a running worker, ascending.
    #[must_use]
    pub fn partitions(&self) -> Vec<i32> {
        self.workers.keys().copied().collect()
    }

    /// Number of workers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.workers.len()
    }

    /// Whether no worker is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }

    /// Stop one worker and wait for it.
    pub async fn stop(&mut self, partition: i32) -> Option<ReadLoopSummary> {
        let worker = self.workers.remove(&partition)?;
        worker.cancel.cancel();
        join_worker(partition, worker.handle).await
    }

    /// Stop every worker and wait for all of them.
    pub async fn shutdown(&mut self) {
        for worker in self.workers.values() {
            worker.cancel.cancel();
        }
        let workers = std::mem::take(&mut self.workers);
        for (partition, worker) in workers {
            join_worker(partition, worker.handle).await;
        }
    }
}

impl std::fmt::Debug for PartitionWorkers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PartitionWorkers")
            .field("partitions", &self.partitions())
            .finish()
    }
}

async fn join_worker(
    partition: i32,
    handle: JoinHandle<ReadLoopSummary>,
) -> Option<ReadLoopSummary> {
    match handle.await {
        Ok(summary) => Some(summary),
        Err(e) => {
            tracing::error!(partition, error = %e, "Direct reader task failed");
            None
        }
    }
}

//! Read Loop
//!
//! One sequential read-and-process loop per reader. Records from a reader are
//! processed strictly in delivery order; the loop only exits on cancellation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::application::ports::RecordReader;
use crate::application::services::order_pipeline::{OrderPipeline, ReaderKind};
use crate::infrastructure::metrics;

/// Pauses applied after a failed read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadLoopConfig {
    /// Delay after a cancellation, timeout or end-of-stream.
    pub benign_retry_delay: Duration,
    /// Delay after any other read error.
    pub error_retry_delay: Duration,
}

impl Default for ReadLoopConfig {
    fn default() -> Self {
        Self {
            benign_retry_delay: Duration::from_millis(200),
            error_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Counters reported when a read loop exits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReadLoopSummary {
    /// Records handed to the pipeline.
    pub records: u64,
    /// Read attempts that returned an error.
    pub read_errors: u64,
}

/// Read from `reader` until `cancel` fires.
pub async fn run_read_loop<R>(
    kind: ReaderKind,
    reader: Arc<R>,
    pipeline: Arc<OrderPipeline>,
    config: ReadLoopConfig,
    cancel: CancellationToken,
) -> ReadLoopSummary
where
    R: RecordReader + ?Sized,
{
    tracing::info!(reader = %kind, "Read loop started");
    let mut summary = ReadLoopSummary::default();

    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = reader.next_record() => result,
        };

        match result {
            Ok(record) => {
                summary.records += 1;
                // Failures are logged and counted by the pipeline.
                let _ = pipeline.process(kind, &record).await;
            }
            Err(e) => {
                summary.read_errors += 1;
                metrics::record_read_error(kind.label(), e.kind());

                let delay = if e.is_benign() {
                    tracing::debug!(reader = %kind, error = %e, "Transient read error");
                    config.benign_retry_delay
                } else {
                    tracing::warn!(reader = %kind, error = %e, "Read error");
                    config.error_retry_delay
                };

                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }
            }
        }
    }

    tracing::info!(
        reader = %kind,
        records = summary.records,
        read_errors = summary.read_errors,
        "Read loop stopped"
    );
    summary
}

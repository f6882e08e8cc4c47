//! Order Pipeline
//!
//! Per-record processing shared by every read loop: log the record, decode it,
//! dispatch it. Failures stay local to the record.

use std::fmt;
use std::sync::Arc;

use crate::application::ports::InboundRecord;
use crate::application::services::order_decoder::{
    self, DecodeError, PAYLOAD_PREVIEW_BYTES, payload_preview,
};
use crate::application::services::order_dispatcher::{DispatchError, OrderDispatcher};
use crate::application::services::stats::BridgeStats;
use crate::domain::order::ClientOrderId;
use crate::infrastructure::metrics;

/// Which reader delivered a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderKind {
    /// The consumer-group reader.
    Group,
    /// A direct reader bound to one partition.
    Direct(i32),
}

impl ReaderKind {
    /// Label for metrics.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Direct(_) => "direct",
        }
    }
}

impl fmt::Display for ReaderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Group => f.write_str("group"),
            Self::Direct(partition) => write!(f, "direct[{partition}]"),
        }
    }
}

/// Why a record did not produce an order.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The record did not decode.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The decoded order was dropped.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Decode and dispatch stage for inbound records.
#[derive(Debug)]
pub struct OrderPipeline {
    dispatcher: OrderDispatcher,
    stats: Arc<BridgeStats>,
}

impl OrderPipeline {
    /// Create a pipeline.
    #[must_use]
    pub const fn new(dispatcher: OrderDispatcher, stats: Arc<BridgeStats>) -> Self {
        Self { dispatcher, stats }
    }

    /// Shared statistics.
    #[must_use]
    pub fn stats(&self) -> &Arc<BridgeStats> {
        &self.stats
    }

    /// Process one record.
    ///
    /// # Errors
    ///
    /// Returns the decode or dispatch failure that caused the record to be
    /// dropped. The failure has already been logged and counted.
    pub async fn process(
        &self,
        source: ReaderKind,
        record: &InboundRecord,
    ) -> Result<ClientOrderId, PipelineError> {
        self.stats.record_received();
        metrics::record_record_received(source.label());
        tracing::info!(
            reader = %source,
            partition = record.partition,
            offset = record.offset,
            key = %record.key_lossy(),
            bytes = record.payload_len(),
            headers = %record.headers_summary(),
            "Order record received"
        );

        let request = match order_decoder::decode(record.payload.as_deref()) {
            Ok(request) => request,
            Err(e) => {
                self.stats.record_decode_failure();
                metrics::record_decode_failure();
                tracing::warn!(
                    reader = %source,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    payload = %payload_preview(record.payload.as_deref().unwrap_or_default(), PAYLOAD_PREVIEW_BYTES),
                    "Dropping undecodable order record"
                );
                return Err(e.into());
            }
        };

        match self.dispatcher.handle(&request).await {
            Ok(client_order_id) => {
                self.stats.record_dispatched();
                metrics::record_order_dispatched();
                Ok(client_order_id)
            }
            Err(e) => {
                self.stats.record_dispatch_failure();
                metrics::record_dispatch_failure(e.reason());
                tracing::warn!(
                    reader = %source,
                    partition = record.partition,
                    offset = record.offset,
                    error = %e,
                    "Dropping order"
                );
                Err(e.into())
            }
        }
    }
}

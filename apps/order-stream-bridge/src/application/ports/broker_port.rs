//! Broker Transport Ports (Driven Ports)
//!
//! Interfaces the pipeline uses to read order records, discover topic layout,
//! swap consumption strategy and publish execution events.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::consumption::{GroupStats, TopicMetadata};

// =============================================================================
// Records
// =============================================================================

/// Header name and value size; values are never logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordHeader {
    /// Header name.
    pub name: String,
    /// Value length in bytes.
    pub len: usize,
}

/// A record read from the orders topic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InboundRecord {
    /// Source partition.
    pub partition: i32,
    /// Offset within the partition.
    pub offset: i64,
    /// Record key, if any.
    pub key: Option<Vec<u8>>,
    /// Record value; `None` for tombstones.
    pub payload: Option<Vec<u8>>,
    /// Header summary.
    pub headers: Vec<RecordHeader>,
}

impl InboundRecord {
    /// Record with a payload and nothing else, mostly for tests and fakes.
    #[must_use]
    pub fn with_payload(partition: i32, offset: i64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            partition,
            offset,
            payload: Some(payload.into()),
            ..Self::default()
        }
    }

    /// Key rendered for logs.
    #[must_use]
    pub fn key_lossy(&self) -> String {
        self.key
            .as_deref()
            .map(|k| String::from_utf8_lossy(k).into_owned())
            .unwrap_or_default()
    }

    /// Payload size in bytes.
    #[must_use]
    pub fn payload_len(&self) -> usize {
        self.payload.as_ref().map_or(0, Vec::len)
    }

    /// Headers formatted as `name[NB],...`, or `-` when there are none.
    #[must_use]
    pub fn headers_summary(&self) -> String {
        if self.headers.is_empty() {
            return "-".to_string();
        }
        self.headers
            .iter()
            .map(|h| format!("{}[{}B]", h.name, h.len))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A record to publish.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundRecord {
    /// Destination topic.
    pub topic: String,
    /// Record key.
    pub key: String,
    /// Record value.
    pub payload: Vec<u8>,
}

// =============================================================================
// Errors
// =============================================================================

/// Broker transport error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// The operation was cancelled.
    #[error("operation cancelled")]
    Cancelled,

    /// No record arrived within the bounded wait.
    #[error("read timed out after {0:?}")]
    Timeout(Duration),

    /// Stream end reached (rebalance or idle partition).
    #[error("end of stream")]
    EndOfStream,

    /// The reader has been closed.
    #[error("reader closed")]
    Closed,

    /// Could not reach the broker.
    #[error("broker connection error: {0}")]
    Connection(String),

    /// Metadata request failed or returned nothing usable.
    #[error("metadata error: {0}")]
    Metadata(String),

    /// Publishing a record failed.
    #[error("publish failed: {0}")]
    Publish(String),

    /// Any other broker client error.
    #[error("broker error: {0}")]
    Broker(String),
}

impl TransportError {
    /// Whether the error is expected during idle periods, rebalances or
    /// shutdown and should simply be retried after a short pause.
    #[must_use]
    pub const fn is_benign(&self) -> bool {
        matches!(self, Self::Cancelled | Self::Timeout(_) | Self::EndOfStream)
    }

    /// Short label for metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Timeout(_) => "timeout",
            Self::EndOfStream => "end_of_stream",
            Self::Closed => "closed",
            Self::Connection(_) => "connection",
            Self::Metadata(_) => "metadata",
            Self::Publish(_) => "publish",
            Self::Broker(_) => "broker",
        }
    }
}

/// One resource that failed to close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseFailure {
    /// Resource label, e.g. `group-reader` or `direct-reader[2]`.
    pub resource: String,
    /// Failure description.
    pub error: TransportError,
}

/// All close failures collected during shutdown.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct CloseError {
    failures: Vec<CloseFailure>,
}

impl CloseError {
    /// Turn collected failures into a result.
    ///
    /// # Errors
    ///
    /// Returns `CloseError` when `failures` is non-empty.
    pub fn check(failures: Vec<CloseFailure>) -> Result<(), Self> {
        if failures.is_empty() {
            Ok(())
        } else {
            Err(Self { failures })
        }
    }

    /// The individual failures.
    #[must_use]
    pub fn failures(&self) -> &[CloseFailure] {
        &self.failures
    }
}

impl fmt::Display for CloseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined = self
            .failures
            .iter()
            .map(|failure| format!("{}: {}", failure.resource, failure.error))
            .collect::<Vec<_>>()
            .join("; ");
        f.write_str(&joined)
    }
}

// =============================================================================
// Ports
// =============================================================================

/// A sequential source of records from one reader.
#[async_trait]
pub trait RecordReader: Send + Sync {
    /// Wait (bounded) for the next record.
    async fn next_record(&self) -> Result<InboundRecord, TransportError>;

    /// Close the reader. Closing twice is a no-op.
    fn close(&self) -> Result<(), TransportError>;
}

/// The consumer-group reader, which additionally exposes group statistics.
pub trait GroupReader: RecordReader {
    /// Current assignment and consumption counters.
    fn stats(&self) -> GroupStats;
}

/// Consumer-side transport operations used by the consumption monitor.
#[async_trait]
pub trait ConsumerTransport: Send + Sync {
    /// The group reader, unless it has been closed by fallback.
    fn group_reader(&self) -> Option<Arc<dyn GroupReader>>;

    /// One-shot metadata dial describing `topic`.
    async fn probe_topic(&self, topic: &str) -> Result<TopicMetadata, TransportError>;

    /// Open one reader per partition of the orders topic, starting at the
    /// latest offset. Either all readers open or none are kept.
    fn open_direct_readers(
        &self,
        partitions: &[i32],
    ) -> Result<Vec<(i32, Arc<dyn RecordReader>)>, TransportError>;

    /// Close and release the group reader. Returns `Ok(false)` if it was
    /// already released.
    fn close_group_reader(&self) -> Result<bool, TransportError>;
}

/// Publishes records to the broker.
#[async_trait]
pub trait RecordPublisher: Send + Sync {
    /// Send one record, waiting for broker acknowledgment.
    async fn publish(&self, record: OutboundRecord) -> Result<(), TransportError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn benign_classification() {
        assert!(TransportError::Cancelled.is_benign());
        assert!(TransportError::Timeout(Duration::from_millis(5)).is_benign());
        assert!(TransportError::EndOfStream.is_benign());
        assert!(!TransportError::Closed.is_benign());
        assert!(!TransportError::Broker("boom".to_string()).is_benign());
        assert!(!TransportError::Connection("refused".to_string()).is_benign());
    }

    #[test]
    fn headers_summary_format() {
        let mut record = InboundRecord::with_payload(0, 1, b"{}".to_vec());
        assert_eq!(record.headers_summary(), "-");

        record.headers = vec![
            RecordHeader {
                name: "trace".to_string(),
                len: 16,
            },
            RecordHeader {
                name: "src".to_string(),
                len: 3,
            },
        ];
        assert_eq!(record.headers_summary(), "trace[16B],src[3B]");
    }

    #[test]
    fn key_lossy_handles_missing_key() {
        let mut record = InboundRecord::default();
        assert_eq!(record.key_lossy(), "");
        record.key = Some(b"k-1".to_vec());
        assert_eq!(record.key_lossy(), "k-1");
    }

    #[test]
    fn close_error_joins_every_failure() {
        assert!(CloseError::check(Vec::new()).is_ok());

        let err = CloseError::check(vec![
            CloseFailure {
                resource: "group-reader".to_string(),
                error: TransportError::Broker("a".to_string()),
            },
            CloseFailure {
                resource: "producer".to_string(),
                error: TransportError::Broker("b".to_string()),
            },
        ])
        .unwrap_err();

        assert_eq!(err.failures().len(), 2);
        assert_eq!(
            err.to_string(),
            "group-reader: broker error: a; producer: broker error: b"
        );
    }
}

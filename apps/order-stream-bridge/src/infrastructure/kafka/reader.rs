//! Kafka Readers
//!
//! The consumer-group reader and the per-partition direct reader. Both wrap a
//! `StreamConsumer` and bound every read with a timeout.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rdkafka::consumer::{Consumer, StreamConsumer};
use rdkafka::error::KafkaError;
use rdkafka::message::{BorrowedMessage, Headers, Message};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::{Offset, TopicPartitionList};

use crate::application::ports::{
    GroupReader, InboundRecord, RecordHeader, RecordReader, TransportError,
};
use crate::domain::consumption::GroupStats;
use crate::infrastructure::config::{KafkaSettings, KafkaTuning};
use crate::infrastructure::kafka::client_config;
use crate::infrastructure::kafka::context::BridgeClientContext;

type BridgeConsumer = StreamConsumer<BridgeClientContext>;

/// Map a client error onto the transport taxonomy.
pub(crate) fn map_kafka_error(error: &KafkaError) -> TransportError {
    match error {
        KafkaError::PartitionEOF(_) => TransportError::EndOfStream,
        KafkaError::Canceled => TransportError::Cancelled,
        KafkaError::MessageConsumption(
            RDKafkaErrorCode::BrokerTransportFailure | RDKafkaErrorCode::AllBrokersDown,
        )
        | KafkaError::ClientCreation(_) => TransportError::Connection(error.to_string()),
        other => TransportError::Broker(other.to_string()),
    }
}

fn to_inbound(message: &BorrowedMessage<'_>) -> InboundRecord {
    let headers = message
        .headers()
        .map(|headers| {
            headers
                .iter()
                .map(|header| RecordHeader {
                    name: header.key.to_string(),
                    len: header.value.map_or(0, <[u8]>::len),
                })
                .collect()
        })
        .unwrap_or_default();

    InboundRecord {
        partition: message.partition(),
        offset: message.offset(),
        key: message.key().map(<[u8]>::to_vec),
        payload: message.payload().map(<[u8]>::to_vec),
        headers,
    }
}

async fn read_bounded(
    consumer: &BridgeConsumer,
    timeout: Duration,
) -> Result<InboundRecord, TransportError> {
    match tokio::time::timeout(timeout, consumer.recv()).await {
        Err(_) => Err(TransportError::Timeout(timeout)),
        Ok(Err(e)) => Err(map_kafka_error(&e)),
        Ok(Ok(message)) => Ok(to_inbound(&message)),
    }
}

// =============================================================================
// Group Reader
// =============================================================================

/// Consumer-group reader subscribed to the orders topic.
pub struct KafkaGroupReader {
    consumer: BridgeConsumer,
    topic: String,
    read_timeout: Duration,
    messages: AtomicU64,
    closed: AtomicBool,
}

impl KafkaGroupReader {
    /// Create the consumer and subscribe. No broker round trip happens here,
    /// so an unreachable broker does not fail startup.
    ///
    /// # Errors
    ///
    /// Returns an error if the client configuration is rejected or the
    /// subscription cannot be registered.
    pub fn open(settings: &KafkaSettings, tuning: &KafkaTuning) -> Result<Self, TransportError> {
        let consumer: BridgeConsumer = client_config::group_consumer(settings, tuning)
            .create_with_context(BridgeClientContext::new("group"))
            .map_err(|e| map_kafka_error(&e))?;
        consumer
            .subscribe(&[settings.orders_topic.as_str()])
            .map_err(|e| map_kafka_error(&e))?;

        tracing::info!(
            topic = %settings.orders_topic,
            group_id = %settings.group_id,
            "Consumer group reader opened"
        );

        Ok(Self {
            consumer,
            topic: settings.orders_topic.clone(),
            read_timeout: tuning.read_timeout,
            messages: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl RecordReader for KafkaGroupReader {
    async fn next_record(&self) -> Result<InboundRecord, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        let record = read_bounded(&self.consumer, self.read_timeout).await?;
        self.messages.fetch_add(1, Ordering::Relaxed);
        Ok(record)
    }

    fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.consumer.unsubscribe();
        tracing::info!(topic = %self.topic, "Consumer group reader unsubscribed");
        Ok(())
    }
}

impl GroupReader for KafkaGroupReader {
    fn stats(&self) -> GroupStats {
        let assigned_partitions = match self.consumer.assignment() {
            Ok(list) => {
                let mut partitions: Vec<i32> = list
                    .elements()
                    .iter()
                    .filter(|element| element.topic() == self.topic)
                    .map(rdkafka::topic_partition_list::TopicPartitionListElem::partition)
                    .collect();
                partitions.sort_unstable();
                partitions
            }
            Err(e) => {
                tracing::debug!(error = %e, "Could not read group assignment");
                Vec::new()
            }
        };

        GroupStats {
            assigned_partitions,
            messages: self.messages.load(Ordering::Relaxed),
        }
    }
}

// =============================================================================
// Direct Reader
// =============================================================================

/// Reader bound to a single partition, starting at the latest offset.
pub struct KafkaPartitionReader {
    consumer: BridgeConsumer,
    topic: String,
    partition: i32,
    read_timeout: Duration,
    closed: AtomicBool,
}

impl KafkaPartitionReader {
    /// Create the consumer and assign it to `partition` at the end offset.
    ///
    /// # Errors
    ///
    /// Returns an error if the client cannot be created or the assignment is
    /// rejected.
    pub fn open(
        settings: &KafkaSettings,
        tuning: &KafkaTuning,
        partition: i32,
    ) -> Result<Self, TransportError> {
        let consumer: BridgeConsumer = client_config::direct_consumer(settings, tuning)
            .create_with_context(BridgeClientContext::new("direct"))
            .map_err(|e| map_kafka_error(&e))?;

        let mut assignment = TopicPartitionList::new();
        assignment
            .add_partition_offset(&settings.orders_topic, partition, Offset::End)
            .map_err(|e| map_kafka_error(&e))?;
        consumer
            .assign(&assignment)
            .map_err(|e| map_kafka_error(&e))?;

        tracing::info!(
            topic = %settings.orders_topic,
            partition,
            "Direct partition reader opened at latest offset"
        );

        Ok(Self {
            consumer,
            topic: settings.orders_topic.clone(),
            partition,
            read_timeout: tuning.read_timeout,
            closed: AtomicBool::new(false),
        })
    }

    /// Bound partition.
    #[must_use]
    pub const fn partition(&self) -> i32 {
        self.partition
    }
}

#[async_trait]
impl RecordReader for KafkaPartitionReader {
    async fn next_record(&self) -> Result<InboundRecord, TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        read_bounded(&self.consumer, self.read_timeout).await
    }

    fn close(&self) -> Result<(), TransportError> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.consumer
            .unassign()
            .map_err(|e| map_kafka_error(&e))?;
        tracing::info!(topic = %self.topic, partition = self.partition, "Direct partition reader closed");
        Ok(())
    }
}

//! Kafka Transport Adapter
//!
//! All broker I/O for the bridge. The transport owns the consumer-group
//! reader, the direct partition readers opened by fallback, and the producer
//! used for execution reports.
//!
//! # Ownership
//!
//! ```text
//! KafkaTransport
//! ├── group:    Mutex<Option<Arc<KafkaGroupReader>>>   taken exactly once
//! ├── direct:   Mutex<BTreeMap<partition, Arc<KafkaPartitionReader>>>
//! └── producer: FutureProducer (shared by all publishes)
//! ```

mod client_config;
mod context;
mod metadata;
mod reader;

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::util::Timeout;

use crate::application::ports::{
    CloseError, CloseFailure, ConsumerTransport, GroupReader, OutboundRecord, RecordPublisher,
    RecordReader, TransportError,
};
use crate::domain::consumption::TopicMetadata;
use crate::infrastructure::config::{KafkaSettings, KafkaTuning};

pub use context::BridgeClientContext;
pub use reader::{KafkaGroupReader, KafkaPartitionReader};

use reader::map_kafka_error;

/// Broker transport backed by librdkafka.
pub struct KafkaTransport {
    settings: KafkaSettings,
    tuning: KafkaTuning,
    group: Mutex<Option<Arc<KafkaGroupReader>>>,
    direct: Mutex<BTreeMap<i32, Arc<KafkaPartitionReader>>>,
    producer: FutureProducer<BridgeClientContext>,
}

impl KafkaTransport {
    /// Open the group reader and the producer.
    ///
    /// Neither client dials the broker here; an unreachable broker surfaces
    /// later as read or publish errors.
    ///
    /// # Errors
    ///
    /// Returns an error if either client rejects its configuration.
    pub fn connect(settings: KafkaSettings, tuning: KafkaTuning) -> Result<Self, TransportError> {
        let group = KafkaGroupReader::open(&settings, &tuning)?;
        let producer: FutureProducer<BridgeClientContext> =
            client_config::producer(&settings, &tuning)
                .create_with_context(BridgeClientContext::new("producer"))
                .map_err(|e| map_kafka_error(&e))?;

        tracing::info!(
            brokers = %settings.bootstrap_servers(),
            orders_topic = %settings.orders_topic,
            exec_topic = %settings.exec_reports_topic,
            "Kafka transport ready"
        );

        Ok(Self {
            settings,
            tuning,
            group: Mutex::new(Some(Arc::new(group))),
            direct: Mutex::new(BTreeMap::new()),
            producer,
        })
    }

    /// Close every reader and flush the producer, collecting all failures.
    ///
    /// # Errors
    ///
    /// Returns `CloseError` listing each resource that failed to close.
    pub async fn close(&self) -> Result<(), CloseError> {
        let mut failures = Vec::new();

        let group = self.group.lock().take();
        if let Some(group) = group
            && let Err(error) = group.close()
        {
            failures.push(CloseFailure {
                resource: "group-reader".to_string(),
                error,
            });
        }

        let direct = std::mem::take(&mut *self.direct.lock());
        for (partition, reader) in direct {
            if let Err(error) = reader.close() {
                failures.push(CloseFailure {
                    resource: format!("direct-reader[{partition}]"),
                    error,
                });
            }
        }

        let producer = self.producer.clone();
        let timeout = self.tuning.publish_timeout;
        let flushed = tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| TransportError::Broker(e.to_string()))
            .and_then(|result| result.map_err(|e| map_kafka_error(&e)));
        if let Err(error) = flushed {
            failures.push(CloseFailure {
                resource: "producer".to_string(),
                error,
            });
        }

        let result = CloseError::check(failures);
        match &result {
            Ok(()) => tracing::info!("Kafka transport closed"),
            Err(e) => tracing::warn!(error = %e, "Kafka transport closed with errors"),
        }
        result
    }

    fn metadata_timeout(&self) -> Duration {
        self.tuning.metadata_timeout
    }
}

impl std::fmt::Debug for KafkaTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaTransport")
            .field("settings", &self.settings)
            .field("group_open", &self.group.lock().is_some())
            .field("direct", &self.direct.lock().keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ConsumerTransport for KafkaTransport {
    fn group_reader(&self) -> Option<Arc<dyn GroupReader>> {
        self.group
            .lock()
            .as_ref()
            .map(|reader| Arc::clone(reader) as Arc<dyn GroupReader>)
    }

    async fn probe_topic(&self, topic: &str) -> Result<TopicMetadata, TransportError> {
        let producer = self.producer.clone();
        let topic = topic.to_string();
        let timeout = self.metadata_timeout();

        tokio::task::spawn_blocking(move || metadata::fetch_topic(producer.client(), &topic, timeout))
            .await
            .map_err(|e| TransportError::Metadata(e.to_string()))?
    }

    fn open_direct_readers(
        &self,
        partitions: &[i32],
    ) -> Result<Vec<(i32, Arc<dyn RecordReader>)>, TransportError> {
        let mut opened = Vec::with_capacity(partitions.len());
        for &partition in partitions {
            let reader = KafkaPartitionReader::open(&self.settings, &self.tuning, partition)?;
            opened.push(Arc::new(reader));
        }

        let mut direct = self.direct.lock();
        let readers = opened
            .into_iter()
            .map(|reader| {
                let partition = reader.partition();
                direct.insert(partition, Arc::clone(&reader));
                (partition, reader as Arc<dyn RecordReader>)
            })
            .collect();
        Ok(readers)
    }

    fn close_group_reader(&self) -> Result<bool, TransportError> {
        let Some(group) = self.group.lock().take() else {
            return Ok(false);
        };
        group.close()?;
        Ok(true)
    }
}

#[async_trait]
impl RecordPublisher for KafkaTransport {
    async fn publish(&self, record: OutboundRecord) -> Result<(), TransportError> {
        let delivery = self
            .producer
            .send(
                FutureRecord::to(&record.topic)
                    .key(&record.key)
                    .payload(&record.payload),
                Timeout::After(self.tuning.publish_timeout),
            )
            .await;

        match delivery {
            Ok(_) => Ok(()),
            Err((e, _)) => Err(TransportError::Publish(e.to_string())),
        }
    }
}

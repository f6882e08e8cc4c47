//! Client Context
//!
//! Routes librdkafka's internal log lines and global errors into `tracing`.

use rdkafka::ClientContext;
use rdkafka::config::RDKafkaLogLevel;
use rdkafka::consumer::ConsumerContext;
use rdkafka::error::KafkaError;

/// Context shared by every consumer and the producer.
#[derive(Debug, Clone, Default)]
pub struct BridgeClientContext {
    client: &'static str,
}

impl BridgeClientContext {
    /// Context labelled with the client role (`group`, `direct`, `producer`).
    #[must_use]
    pub const fn new(client: &'static str) -> Self {
        Self { client }
    }
}

impl ClientContext for BridgeClientContext {
    fn log(&self, level: RDKafkaLogLevel, fac: &str, log_message: &str) {
        match level {
            RDKafkaLogLevel::Emerg
            | RDKafkaLogLevel::Alert
            | RDKafkaLogLevel::Critical
            | RDKafkaLogLevel::Error => {
                tracing::error!(client = self.client, kafka_facility = fac, "{log_message}");
            }
            RDKafkaLogLevel::Warning => {
                tracing::warn!(client = self.client, kafka_facility = fac, "{log_message}");
            }
            RDKafkaLogLevel::Notice | RDKafkaLogLevel::Info => {
                tracing::info!(client = self.client, kafka_facility = fac, "{log_message}");
            }
            RDKafkaLogLevel::Debug => {
                tracing::debug!(client = self.client, kafka_facility = fac, "{log_message}");
            }
        }
    }

    fn error(&self, error: KafkaError, reason: &str) {
        tracing::warn!(client = self.client, error = %error, reason, "Kafka client error");
    }
}

impl ConsumerContext for BridgeClientContext {}

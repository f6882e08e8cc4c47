//! Topic metadata probe.

use std::collections::HashMap;
use std::time::Duration;

use rdkafka::ClientContext;
use rdkafka::client::Client;
use rdkafka::metadata::Metadata;
use rdkafka::util::Timeout;

use crate::application::ports::TransportError;
use crate::domain::consumption::{PartitionMetadata, TopicMetadata};

/// Fetch metadata for `topic`. Blocks the calling thread for up to `timeout`.
pub(crate) fn fetch_topic<C: ClientContext>(
    client: &Client<C>,
    topic: &str,
    timeout: Duration,
) -> Result<TopicMetadata, TransportError> {
    let metadata = client
        .fetch_metadata(Some(topic), Timeout::After(timeout))
        .map_err(|e| TransportError::Metadata(e.to_string()))?;
    describe_topic(&metadata, topic)
}

fn describe_topic(metadata: &Metadata, topic: &str) -> Result<TopicMetadata, TransportError> {
    let brokers: HashMap<i32, String> = metadata
        .brokers()
        .iter()
        .map(|broker| (broker.id(), format!("{}:{}", broker.host(), broker.port())))
        .collect();

    let entry = metadata
        .topics()
        .iter()
        .find(|t| t.name() == topic)
        .ok_or_else(|| TransportError::Metadata(format!("topic {topic} not in metadata")))?;

    if let Some(err) = entry.error() {
        return Err(TransportError::Metadata(format!(
            "topic {topic} metadata error: {err:?}"
        )));
    }

    let partitions = entry
        .partitions()
        .iter()
        .map(|partition| PartitionMetadata {
            id: partition.id(),
            leader: leader_address(&brokers, partition.leader()),
            replicas: partition.replicas().to_vec(),
            isr: partition.isr().to_vec(),
        })
        .collect();

    Ok(TopicMetadata {
        topic: topic.to_string(),
        partitions,
    })
}

fn leader_address(brokers: &HashMap<i32, String>, leader: i32) -> String {
    if leader < 0 {
        return "none".to_string();
    }
    brokers
        .get(&leader)
        .cloned()
        .unwrap_or_else(|| format!("broker-{leader}"))
}

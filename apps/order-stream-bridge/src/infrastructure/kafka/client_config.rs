//! librdkafka client configuration for each role.

use rdkafka::ClientConfig;

use crate::infrastructure::config::{KafkaSettings, KafkaTuning};

const MAX_FETCH_BYTES: &str = "10485760";
const METADATA_REFRESH_MS: &str = "5000";

fn millis(duration: std::time::Duration) -> String {
    duration.as_millis().to_string()
}

/// Group-coordinated reader on the orders topic.
#[must_use]
pub fn group_consumer(settings: &KafkaSettings, tuning: &KafkaTuning) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", settings.bootstrap_servers())
        .set("group.id", &settings.group_id)
        .set("enable.auto.commit", "true")
        .set("auto.offset.reset", "latest")
        .set("enable.partition.eof", "false")
        .set("fetch.min.bytes", "1")
        .set("fetch.max.bytes", MAX_FETCH_BYTES)
        .set("fetch.wait.max.ms", millis(tuning.fetch_max_wait))
        .set("session.timeout.ms", millis(tuning.session_timeout))
        .set("heartbeat.interval.ms", millis(tuning.heartbeat_interval))
        .set("topic.metadata.refresh.interval.ms", METADATA_REFRESH_MS);
    config
}

/// Reader bound to one partition; never joins the consumer group and never
/// commits.
#[must_use]
pub fn direct_consumer(settings: &KafkaSettings, tuning: &KafkaTuning) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", settings.bootstrap_servers())
        .set("group.id", settings.direct_group_id())
        .set("enable.auto.commit", "false")
        .set("enable.auto.offset.store", "false")
        .set("auto.offset.reset", "latest")
        .set("enable.partition.eof", "false")
        .set("fetch.min.bytes", "1")
        .set("fetch.max.bytes", MAX_FETCH_BYTES)
        .set("fetch.wait.max.ms", millis(tuning.fetch_max_wait));
    config
}

/// Producer for execution reports: full-ISR acknowledgment, topic
/// auto-creation allowed.
#[must_use]
pub fn producer(settings: &KafkaSettings, tuning: &KafkaTuning) -> ClientConfig {
    let mut config = ClientConfig::new();
    config
        .set("bootstrap.servers", settings.bootstrap_servers())
        .set("acks", "all")
        .set("allow.auto.create.topics", "true")
        .set("message.timeout.ms", millis(tuning.publish_timeout));
    config
}

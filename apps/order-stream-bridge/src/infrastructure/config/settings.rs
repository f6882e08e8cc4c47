//! Bridge Configuration Settings
//!
//! Configuration types for the order stream bridge, loaded from environment
//! variables.

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::application::services::{MonitorConfig, ReadLoopConfig, RelayConfig};

/// Core broker configuration: where to connect and which topics to use.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct KafkaSettings {
    /// Bootstrap brokers as `host:port`.
    pub brokers: Vec<String>,
    /// Inbound order topic.
    pub orders_topic: String,
    /// Outbound execution report topic.
    pub exec_reports_topic: String,
    /// Consumer group id.
    pub group_id: String,
}

impl Default for KafkaSettings {
    fn default() -> Self {
        Self {
            brokers: vec!["localhost:9092".to_string()],
            orders_topic: "new_orders".to_string(),
            exec_reports_topic: "execution_report".to_string(),
            group_id: "order-stream-bridge".to_string(),
        }
    }
}

impl KafkaSettings {
    /// Brokers joined for `bootstrap.servers`.
    #[must_use]
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }

    /// Group id used by direct readers, which never join the main group.
    #[must_use]
    pub fn direct_group_id(&self) -> String {
        format!("{}-direct", self.group_id)
    }
}

/// Client timing settings.
#[derive(Debug, Clone)]
pub struct KafkaTuning {
    /// Bounded wait for a single read.
    pub read_timeout: Duration,
    /// Broker-side fetch wait.
    pub fetch_max_wait: Duration,
    /// Consumer group session timeout.
    pub session_timeout: Duration,
    /// Consumer group heartbeat interval.
    pub heartbeat_interval: Duration,
    /// Metadata probe timeout.
    pub metadata_timeout: Duration,
    /// Producer queue and delivery timeout.
    pub publish_timeout: Duration,
}

impl Default for KafkaTuning {
    fn default() -> Self {
        Self {
            read_timeout: Duration::from_secs(1),
            fetch_max_wait: Duration::from_millis(250),
            session_timeout: Duration::from_secs(30),
            heartbeat_interval: Duration::from_secs(3),
            metadata_timeout: Duration::from_secs(5),
            publish_timeout: Duration::from_secs(5),
        }
    }
}

/// Consumption monitor settings.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    /// Health check period.
    pub check_interval: Duration,
    /// Whether the no-assignment fallback may fire.
    pub fallback_enabled: bool,
    /// Delay after a transient read error.
    pub benign_retry_delay: Duration,
    /// Delay after other read errors.
    pub error_retry_delay: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            fallback_enabled: true,
            benign_retry_delay: Duration::from_millis(200),
            error_retry_delay: Duration::from_secs(1),
        }
    }
}

/// Execution relay settings.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    /// Events waiting for a publish slot.
    pub queue_capacity: usize,
    /// Concurrent publishes.
    pub max_in_flight: usize,
    /// Time allowed for in-flight publishes at shutdown.
    pub shutdown_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            max_in_flight: 64,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}

/// Trading session and identity settings.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    /// JSON identity file.
    pub identity_file: PathBuf,
    /// Identifier of the session orders are sent on.
    pub session_id: String,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            identity_file: PathBuf::from("config/identities.json"),
            session_id: "FIX.4.4:BRIDGE->PAPER".to_string(),
        }
    }
}

/// Server port settings.
#[derive(Debug, Clone)]
pub struct ServerSettings {
    /// Health and metrics HTTP port (0 = disabled).
    pub health_port: u16,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { health_port: 8083 }
    }
}

/// Complete bridge configuration.
#[derive(Debug, Clone, Default)]
pub struct BridgeConfig {
    /// Brokers and topics.
    pub kafka: KafkaSettings,
    /// Client timing.
    pub tuning: KafkaTuning,
    /// Consumption monitor.
    pub monitor: MonitorSettings,
    /// Execution relay.
    pub relay: RelaySettings,
    /// Trading session and identities.
    pub session: SessionSettings,
    /// HTTP server.
    pub server: ServerSettings,
}

impl BridgeConfig {
    /// Create configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if `KAFKA_BROKERS` is set but lists no broker, or a
    /// topic or group variable is set to an empty value.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Create configuration from an arbitrary variable source.
    ///
    /// # Errors
    ///
    /// See [`BridgeConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let brokers = match lookup("KAFKA_BROKERS") {
            Some(raw) => {
                let brokers: Vec<String> = raw
                    .split(',')
                    .map(str::trim)
                    .filter(|b| !b.is_empty())
                    .map(str::to_string)
                    .collect();
                if brokers.is_empty() {
                    return Err(ConfigError::EmptyValue("KAFKA_BROKERS".to_string()));
                }
                brokers
            }
            None => defaults.kafka.brokers,
        };

        let kafka = KafkaSettings {
            brokers,
            orders_topic: non_empty(&lookup, "KAFKA_ORDERS_TOPIC", defaults.kafka.orders_topic)?,
            exec_reports_topic: non_empty(
                &lookup,
                "KAFKA_EXEC_TOPIC",
                defaults.kafka.exec_reports_topic,
            )?,
            group_id: non_empty(&lookup, "KAFKA_GROUP_ID", defaults.kafka.group_id)?,
        };

        let tuning = KafkaTuning {
            read_timeout: parse_duration_millis(
                &lookup,
                "ORDER_BRIDGE_READ_TIMEOUT_MS",
                defaults.tuning.read_timeout,
            ),
            fetch_max_wait: parse_duration_millis(
                &lookup,
                "ORDER_BRIDGE_FETCH_MAX_WAIT_MS",
                defaults.tuning.fetch_max_wait,
            ),
            session_timeout: parse_duration_secs(
                &lookup,
                "ORDER_BRIDGE_SESSION_TIMEOUT_SECS",
                defaults.tuning.session_timeout,
            ),
            heartbeat_interval: parse_duration_secs(
                &lookup,
                "ORDER_BRIDGE_HEARTBEAT_INTERVAL_SECS",
                defaults.tuning.heartbeat_interval,
            ),
            metadata_timeout: parse_duration_secs(
                &lookup,
                "ORDER_BRIDGE_METADATA_TIMEOUT_SECS",
                defaults.tuning.metadata_timeout,
            ),
            publish_timeout: parse_duration_millis(
                &lookup,
                "ORDER_BRIDGE_PUBLISH_TIMEOUT_MS",
                defaults.tuning.publish_timeout,
            ),
        };

        let monitor = MonitorSettings {
            check_interval: parse_duration_secs(
                &lookup,
                "ORDER_BRIDGE_HEALTH_CHECK_INTERVAL_SECS",
                defaults.monitor.check_interval,
            ),
            fallback_enabled: parse_bool(
                &lookup,
                "ORDER_BRIDGE_FALLBACK_ENABLED",
                defaults.monitor.fallback_enabled,
            ),
            benign_retry_delay: parse_duration_millis(
                &lookup,
                "ORDER_BRIDGE_BENIGN_RETRY_MS",
                defaults.monitor.benign_retry_delay,
            ),
            error_retry_delay: parse_duration_millis(
                &lookup,
                "ORDER_BRIDGE_ERROR_RETRY_MS",
                defaults.monitor.error_retry_delay,
            ),
        };

        let relay = RelaySettings {
            queue_capacity: parse_usize(
                &lookup,
                "ORDER_BRIDGE_RELAY_QUEUE_CAPACITY",
                defaults.relay.queue_capacity,
            ),
            max_in_flight: parse_usize(
                &lookup,
                "ORDER_BRIDGE_RELAY_MAX_IN_FLIGHT",
                defaults.relay.max_in_flight,
            ),
            shutdown_timeout: parse_duration_secs(
                &lookup,
                "ORDER_BRIDGE_SHUTDOWN_TIMEOUT_SECS",
                defaults.relay.shutdown_timeout,
            ),
        };

        let session = SessionSettings {
            identity_file: lookup("ORDER_BRIDGE_IDENTITY_FILE")
                .filter(|v| !v.is_empty())
                .map_or(defaults.session.identity_file, PathBuf::from),
            session_id: non_empty(
                &lookup,
                "ORDER_BRIDGE_SESSION_ID",
                defaults.session.session_id,
            )?,
        };

        let server = ServerSettings {
            health_port: parse_u16(
                &lookup,
                "ORDER_BRIDGE_HEALTH_PORT",
                defaults.server.health_port,
            ),
        };

        Ok(Self {
            kafka,
            tuning,
            monitor,
            relay,
            session,
            server,
        })
    }

    /// Settings for the consumption monitor.
    #[must_use]
    pub fn monitor_config(&self) -> MonitorConfig {
        MonitorConfig {
            orders_topic: self.kafka.orders_topic.clone(),
            check_interval: self.monitor.check_interval,
            fallback_enabled: self.monitor.fallback_enabled,
            read_loop: ReadLoopConfig {
                benign_retry_delay: self.monitor.benign_retry_delay,
                error_retry_delay: self.monitor.error_retry_delay,
            },
        }
    }

    /// Settings for the execution relay.
    #[must_use]
    pub fn relay_config(&self) -> RelayConfig {
        RelayConfig {
            topic: self.kafka.exec_reports_topic.clone(),
            queue_capacity: self.relay.queue_capacity,
            max_in_flight: self.relay.max_in_flight,
            drain_timeout: self.relay.shutdown_timeout,
        }
    }
}

/// Configuration error.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Environment variable has empty value.
    #[error("environment variable {0} cannot be empty")]
    EmptyValue(String),
}

fn non_empty<F>(lookup: &F, key: &str, default: String) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(value) if value.trim().is_empty() => Err(ConfigError::EmptyValue(key.to_string())),
        Some(value) => Ok(value.trim().to_string()),
        None => Ok(default),
    }
}

fn parse_u16<F>(lookup: &F, key: &str, default: u16) -> u16
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_usize<F>(lookup: &F, key: &str, default: usize) -> usize
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn parse_bool<F>(lookup: &F, key: &str, default: bool) -> bool
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| match v.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Some(true),
            "0" | "false" | "no" | "off" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

fn parse_duration_secs<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_secs)
}

fn parse_duration_millis<F>(lookup: &F, key: &str, default: Duration) -> Duration
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .and_then(|v| v.parse::<u64>().ok())
        .map_or(default, Duration::from_millis)
}

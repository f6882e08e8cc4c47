//! Configuration Module
//!
//! Configuration loading and dependency injection for the bridge.

mod settings;

pub use settings::{
    BridgeConfig, ConfigError, KafkaSettings, KafkaTuning, MonitorSettings, RelaySettings,
    ServerSettings, SessionSettings,
};

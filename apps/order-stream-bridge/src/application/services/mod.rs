//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `order_decoder` / `order_dispatcher` / `order_pipeline`: per-record work
//! - `read_loop` / `partition_workers`: long-lived read loops
//! - `consumption_monitor`: group health checks and direct-reader fallback
//! - `execution_relay`: execution callbacks to the outbound topic
//! - `stats`: shared runtime counters

pub mod consumption_monitor;
pub mod execution_relay;
pub mod order_decoder;
pub mod order_dispatcher;
pub mod order_pipeline;
pub mod partition_workers;
pub mod read_loop;
pub mod stats;

pub use consumption_monitor::{
    ConsumptionMonitor, FallbackError, MonitorConfig, log_topic_layout, spawn_topic_layout,
};
pub use execution_relay::{ExecutionCallback, ExecutionRelay, RelayConfig, execution_relay};
pub use order_decoder::{DecodeError, PAYLOAD_PREVIEW_BYTES, decode, payload_preview};
pub use order_dispatcher::{DispatchError, OrderDispatcher};
pub use order_pipeline::{OrderPipeline, PipelineError, ReaderKind};
pub use partition_workers::PartitionWorkers;
pub use read_loop::{ReadLoopConfig, ReadLoopSummary, run_read_loop};
pub use stats::{BridgeStats, BridgeStatsSnapshot};

//! Consumption State
//!
//! Types describing how the orders topic is being consumed and the policy that
//! decides when consumer-group consumption is abandoned for direct
//! per-partition readers.
//!
//! # States
//!
//! ```text
//! GROUP ──(no assignment && nothing consumed)──► DIRECT
//! ```
//!
//! The transition is one-way for the lifetime of the process.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Which strategy is feeding the order pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsumptionMode {
    /// Group-coordinated reader.
    #[default]
    Group,
    /// One reader per partition, no group coordination.
    Direct,
}

impl ConsumptionMode {
    /// Mode name for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Group => "group",
            Self::Direct => "direct",
        }
    }
}

impl fmt::Display for ConsumptionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Point-in-time statistics of the group reader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupStats {
    /// Partitions currently assigned to this member. Empty means unassigned.
    pub assigned_partitions: Vec<i32>,
    /// Records delivered by the group reader since it was opened.
    pub messages: u64,
}

impl GroupStats {
    /// Whether the group has not assigned any partition to this member.
    #[must_use]
    pub fn is_unassigned(&self) -> bool {
        self.assigned_partitions.is_empty()
    }
}

/// Detects a consumer group that never received a partition assignment.
///
/// Fires only while nothing has ever been consumed; once a record has been
/// seen it stays quiet for good, even if the assignment later reads empty.
#[derive(Debug, Clone)]
pub struct FallbackDetector {
    enabled: bool,
    consumed_any: bool,
}

impl FallbackDetector {
    /// Create a detector.
    #[must_use]
    pub const fn new(enabled: bool) -> Self {
        Self {
            enabled,
            consumed_any: false,
        }
    }

    /// Evaluate the latest statistics. Returns `true` when direct consumption
    /// should take over.
    pub fn should_fall_back(&mut self, stats: &GroupStats) -> bool {
        if stats.messages > 0 {
            self.consumed_any = true;
        }
        self.enabled && !self.consumed_any && stats.is_unassigned()
    }

    /// Whether a record has ever been observed.
    #[must_use]
    pub const fn has_consumed(&self) -> bool {
        self.consumed_any
    }
}

/// Layout of one partition as reported by broker metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PartitionMetadata {
    /// Partition id.
    pub id: i32,
    /// Leader broker as `host:port` (or broker id when unresolved).
    pub leader: String,
    /// Replica broker ids.
    pub replicas: Vec<i32>,
    /// In-sync replica broker ids.
    pub isr: Vec<i32>,
}

/// Topic layout as reported by broker metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TopicMetadata {
    /// Topic name.
    pub topic: String,
    /// Partitions of the topic.
    pub partitions: Vec<PartitionMetadata>,
}

impl TopicMetadata {
    /// Partition ids in ascending order.
    #[must_use]
    pub fn partition_ids(&self) -> Vec<i32> {
        let mut ids: Vec<i32> = self.partitions.iter().map(|p| p.id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Read-only view of consumption published by the monitor.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ConsumptionSnapshot {
    /// Current mode.
    pub mode: ConsumptionMode,
    /// Last observed group statistics (group mode only).
    pub group: GroupStats,
    /// Partitions served by direct readers (direct mode only).
    pub direct_partitions: Vec<i32>,
    /// Time of the last health evaluation.
    pub last_check: Option<DateTime<Utc>>,
}

impl ConsumptionSnapshot {
    /// Whether some reader is bound to at least one partition.
    #[must_use]
    pub fn is_consuming(&self) -> bool {
        match self.mode {
            ConsumptionMode::Group => !self.group.is_unassigned(),
            ConsumptionMode::Direct => !self.direct_partitions.is_empty(),
        }
    }
}

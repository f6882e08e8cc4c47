//! In-memory fakes of the bridge ports shared by the integration tests.

#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::Notify;

use order_stream_bridge::application::ports::{
    ConsumerTransport, ExecutionEventHandler, GroupReader, InboundRecord, OrderTrackerPort,
    OutboundRecord, RecordPublisher, RecordReader, SessionError, SessionId, TradingSessionPort,
    TransportError,
};
use order_stream_bridge::domain::consumption::{GroupStats, PartitionMetadata, TopicMetadata};
use order_stream_bridge::domain::identity::{IdentityDirectory, IdentityRecord};
use order_stream_bridge::domain::order::{ClientOrderId, OutboundOrder};
use order_stream_bridge::{BridgeStats, OrderDispatcher, OrderPipeline};

pub const VALID_ORDER: &str = r#"{
    "submitterToken": "tok1",
    "instrument": {"symbol": "ABC", "securityExchange": "XYZ"},
    "order": {"side": "1", "orderType": "2", "quantity": 100, "price": 150, "timeInForce": "0"}
}"#;

pub const ORDER_WITH_EXTRA_FIELD: &str = r#"{
    "submitterToken": "tok1",
    "instrument": {"symbol": "ABC", "securityExchange": "XYZ"},
    "order": {"side": "1", "orderType": "2", "quantity": 100, "price": 150, "timeInForce": "0"},
    "extra": true
}"#;

pub fn identities() -> Arc<IdentityDirectory> {
    Arc::new(IdentityDirectory::new([(
        "tok1".to_string(),
        IdentityRecord::new("alice", "s3cret"),
    )]))
}

pub fn order_record(partition: i32, offset: i64) -> InboundRecord {
    InboundRecord::with_payload(partition, offset, VALID_ORDER)
}

/// Poll `condition` every few milliseconds until it holds or `within` passes.
pub async fn eventually(within: Duration, condition: impl Fn() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + within;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}

// =============================================================================
// Trading session
// =============================================================================

/// Session that records every submission and tracker append.
#[derive(Default)]
pub struct RecordingSession {
    orders: Mutex<Vec<OutboundOrder>>,
    tracked: Mutex<Vec<(String, ClientOrderId)>>,
}

impl RecordingSession {
    pub fn orders(&self) -> Vec<OutboundOrder> {
        self.orders.lock().clone()
    }

    pub fn submissions(&self) -> usize {
        self.orders.lock().len()
    }

    pub fn tracked(&self) -> Vec<(String, ClientOrderId)> {
        self.tracked.lock().clone()
    }
}

#[async_trait]
impl TradingSessionPort for RecordingSession {
    fn active_session(&self) -> Result<SessionId, SessionError> {
        Ok(SessionId::new("TEST"))
    }

    async fn submit(&self, order: OutboundOrder, _session: &SessionId) -> Result<(), SessionError> {
        self.orders.lock().push(order);
        Ok(())
    }

    fn register_execution_handler(&self, _handler: Arc<dyn ExecutionEventHandler>) {}
}

impl OrderTrackerPort for RecordingSession {
    fn record(&self, identity_name: &str, client_order_id: &ClientOrderId) {
        self.tracked
            .lock()
            .push((identity_name.to_string(), client_order_id.clone()));
    }
}

pub fn pipeline_with(session: &Arc<RecordingSession>) -> Arc<OrderPipeline> {
    let dispatcher = OrderDispatcher::new(
        identities(),
        Arc::clone(session) as Arc<dyn TradingSessionPort>,
        Arc::clone(session) as Arc<dyn OrderTrackerPort>,
    );
    Arc::new(OrderPipeline::new(dispatcher, Arc::new(BridgeStats::new())))
}

// =============================================================================
// Readers
// =============================================================================

/// Reader that replays scripted results and then waits for more.
#[derive(Default)]
pub struct ScriptedReader {
    script: Mutex<VecDeque<Result<InboundRecord, TransportError>>>,
    ready: Notify,
    reads: AtomicUsize,
    closes: AtomicUsize,
}

impl ScriptedReader {
    pub fn push(&self, result: Result<InboundRecord, TransportError>) {
        self.script.lock().push_back(result);
        self.ready.notify_one();
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    pub fn pending(&self) -> usize {
        self.script.lock().len()
    }
}

#[async_trait]
impl RecordReader for ScriptedReader {
    async fn next_record(&self) -> Result<InboundRecord, TransportError> {
        loop {
            let next = self.script.lock().pop_front();
            if let Some(result) = next {
                self.reads.fetch_add(1, Ordering::SeqCst);
                return result;
            }
            self.ready.notified().await;
        }
    }

    fn close(&self) -> Result<(), TransportError> {
        self.closes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Group reader with settable statistics.
#[derive(Default)]
pub struct FakeGroupReader {
    pub records: ScriptedReader,
    stats: Mutex<GroupStats>,
}

impl FakeGroupReader {
    pub fn with_stats(assigned_partitions: Vec<i32>, messages: u64) -> Self {
        Self {
            records: ScriptedReader::default(),
            stats: Mutex::new(GroupStats {
                assigned_partitions,
                messages,
            }),
        }
    }

    pub fn set_stats(&self, assigned_partitions: Vec<i32>, messages: u64) {
        *self.stats.lock() = GroupStats {
            assigned_partitions,
            messages,
        };
    }
}

#[async_trait]
impl RecordReader for FakeGroupReader {
    async fn next_record(&self) -> Result<InboundRecord, TransportError> {
        self.records.next_record().await
    }

    fn close(&self) -> Result<(), TransportError> {
        self.records.close()
    }
}

impl GroupReader for FakeGroupReader {
    fn stats(&self) -> GroupStats {
        self.stats.lock().clone()
    }
}

// =============================================================================
// Transport
// =============================================================================

/// Transport over in-memory readers.
pub struct FakeTransport {
    pub group: Arc<FakeGroupReader>,
    group_open: Mutex<bool>,
    probes: Mutex<VecDeque<Result<TopicMetadata, TransportError>>>,
    fallback_probe: Result<TopicMetadata, TransportError>,
    direct: Mutex<BTreeMap<i32, Arc<ScriptedReader>>>,
    stats_after_probe: Mutex<Option<GroupStats>>,
    stalled: AtomicBool,
    probe_calls: AtomicUsize,
    open_calls: AtomicUsize,
    group_closes: AtomicUsize,
}

impl FakeTransport {
    /// Transport whose topic reports `partitions`.
    pub fn new(group: FakeGroupReader, topic: &str, partitions: &[i32]) -> Self {
        Self {
            group: Arc::new(group),
            group_open: Mutex::new(true),
            probes: Mutex::new(VecDeque::new()),
            fallback_probe: Ok(topic_metadata(topic, partitions)),
            direct: Mutex::new(BTreeMap::new()),
            stats_after_probe: Mutex::new(None),
            stalled: AtomicBool::new(false),
            probe_calls: AtomicUsize::new(0),
            open_calls: AtomicUsize::new(0),
            group_closes: AtomicUsize::new(0),
        }
    }

    /// Queue a probe result returned before the default one.
    pub fn queue_probe(&self, result: Result<TopicMetadata, TransportError>) {
        self.probes.lock().push_back(result);
    }

    /// Change the group statistics while the next probe is running.
    pub fn consume_during_probe(&self, assigned_partitions: Vec<i32>, messages: u64) {
        *self.stats_after_probe.lock() = Some(GroupStats {
            assigned_partitions,
            messages,
        });
    }

    /// Make every later probe wait forever.
    pub fn stall_probes(&self) {
        self.stalled.store(true, Ordering::SeqCst);
    }

    pub fn probe_calls(&self) -> usize {
        self.probe_calls.load(Ordering::SeqCst)
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn group_closes(&self) -> usize {
        self.group_closes.load(Ordering::SeqCst)
    }

    pub fn direct_reader(&self, partition: i32) -> Option<Arc<ScriptedReader>> {
        self.direct.lock().get(&partition).cloned()
    }

    pub fn direct_partitions(&self) -> Vec<i32> {
        self.direct.lock().keys().copied().collect()
    }
}

pub fn topic_metadata(topic: &str, partitions: &[i32]) -> TopicMetadata {
    TopicMetadata {
        topic: topic.to_string(),
        partitions: partitions
            .iter()
            .map(|&id| PartitionMetadata {
                id,
                leader: "kafka-1:9092".to_string(),
                replicas: vec![1],
                isr: vec![1],
            })
            .collect(),
    }
}

#[async_trait]
impl ConsumerTransport for FakeTransport {
    fn group_reader(&self) -> Option<Arc<dyn GroupReader>> {
        if *self.group_open.lock() {
            Some(Arc::clone(&self.group) as Arc<dyn GroupReader>)
        } else {
            None
        }
    }

    async fn probe_topic(&self, _topic: &str) -> Result<TopicMetadata, TransportError> {
        self.probe_calls.fetch_add(1, Ordering::SeqCst);
        if self.stalled.load(Ordering::SeqCst) {
            std::future::pending::<()>().await;
        }
        if let Some(stats) = self.stats_after_probe.lock().take() {
            self.group.set_stats(stats.assigned_partitions, stats.messages);
        }
        let queued = self.probes.lock().pop_front();
        queued.unwrap_or_else(|| self.fallback_probe.clone())
    }

    fn open_direct_readers(
        &self,
        partitions: &[i32],
    ) -> Result<Vec<(i32, Arc<dyn RecordReader>)>, TransportError> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        let mut direct = self.direct.lock();
        Ok(partitions
            .iter()
            .map(|&partition| {
                let reader = Arc::new(ScriptedReader::default());
                direct.insert(partition, Arc::clone(&reader));
                (partition, reader as Arc<dyn RecordReader>)
            })
            .collect())
    }

    fn close_group_reader(&self) -> Result<bool, TransportError> {
        let mut open = self.group_open.lock();
        if !*open {
            return Ok(false);
        }
        *open = false;
        self.group_closes.fetch_add(1, Ordering::SeqCst);
        self.group.close()?;
        Ok(true)
    }
}

// =============================================================================
// Publisher
// =============================================================================

/// Publisher that keeps every record it is handed.
#[derive(Default)]
pub struct CollectingPublisher {
    records: Mutex<Vec<OutboundRecord>>,
}

impl CollectingPublisher {
    pub fn records(&self) -> Vec<OutboundRecord> {
        self.records.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.records.lock().len()
    }
}

#[async_trait]
impl RecordPublisher for CollectingPublisher {
    async fn publish(&self, record: OutboundRecord) -> Result<(), TransportError> {
        self.records.lock().push(record);
        Ok(())
    }
}

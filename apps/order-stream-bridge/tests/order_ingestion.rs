//! Order Ingestion Integration Tests
//!
//! Drives decode, dispatch, read loops and the execution relay with in-memory
//! ports.

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod support;

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use tokio_util::sync::CancellationToken;

use order_stream_bridge::application::ports::{
    ExecutionEventHandler, InboundRecord, OrderTrackerPort, RecordPublisher, TradingSessionPort,
    TransportError,
};
use order_stream_bridge::application::services::{
    DecodeError, DispatchError, PipelineError, ReadLoopConfig, ReaderKind, RelayConfig,
    run_read_loop,
};
use order_stream_bridge::{
    BridgeStats, ExecutionEvent, OrderDispatcher, OrderPipeline, PaperTradingSession,
    execution_relay,
};

use support::{
    CollectingPublisher, ORDER_WITH_EXTRA_FIELD, RecordingSession, ScriptedReader, eventually,
    identities, order_record, pipeline_with,
};

const FAST_RETRY: ReadLoopConfig = ReadLoopConfig {
    benign_retry_delay: Duration::from_millis(1),
    error_retry_delay: Duration::from_millis(1),
};

#[tokio::test]
async fn valid_order_is_submitted_once() {
    let session = Arc::new(RecordingSession::default());
    let pipeline = pipeline_with(&session);

    let id = pipeline
        .process(ReaderKind::Group, &order_record(0, 7))
        .await
        .unwrap();

    let orders = session.orders();
    assert_eq!(orders.len(), 1);
    assert_eq!(orders[0].quantity, Decimal::new(100, 0));
    assert_eq!(orders[0].price, Decimal::new(150, 0));
    assert_eq!(orders[0].symbol, "ABC");
    assert_eq!(orders[0].security_exchange, "XYZ");
    assert!(id.as_str().starts_with("alice:"));
    assert_eq!(orders[0].client_order_id, id);

    assert_eq!(session.tracked(), vec![("alice".to_string(), id)]);
    assert_eq!(pipeline.stats().snapshot().orders_dispatched, 1);
}

#[tokio::test]
async fn unexpected_field_is_rejected_before_submission() {
    let session = Arc::new(RecordingSession::default());
    let pipeline = pipeline_with(&session);

    let record = InboundRecord::with_payload(0, 8, ORDER_WITH_EXTRA_FIELD);
    let result = pipeline.process(ReaderKind::Group, &record).await;

    assert!(matches!(
        result,
        Err(PipelineError::Decode(DecodeError::Malformed(_)))
    ));
    assert_eq!(session.submissions(), 0);
    assert_eq!(pipeline.stats().snapshot().decode_failures, 1);
}

#[tokio::test]
async fn tombstone_is_a_decode_error() {
    let session = Arc::new(RecordingSession::default());
    let pipeline = pipeline_with(&session);

    let record = InboundRecord {
        partition: 2,
        offset: 9,
        ..InboundRecord::default()
    };
    let result = pipeline.process(ReaderKind::Direct(2), &record).await;

    assert!(matches!(
        result,
        Err(PipelineError::Decode(DecodeError::MissingPayload))
    ));
    assert_eq!(session.submissions(), 0);
}

#[tokio::test]
async fn unknown_submitter_never_reaches_session() {
    let session = Arc::new(RecordingSession::default());
    let pipeline = pipeline_with(&session);

    let payload = support::VALID_ORDER.replace("tok1", "tok-unknown-123");
    let record = InboundRecord::with_payload(0, 10, payload);
    let result = pipeline.process(ReaderKind::Group, &record).await;

    let Err(PipelineError::Dispatch(DispatchError::UnknownIdentity { token_preview })) = result
    else {
        panic!("expected unknown identity, got {result:?}");
    };
    assert_eq!(token_preview, "tok-...(len=15)");
    assert_eq!(session.submissions(), 0);
    assert!(session.tracked().is_empty());
    assert_eq!(pipeline.stats().snapshot().dispatch_failures, 1);
}

#[tokio::test]
async fn execution_event_is_published_keyed_by_execution_id() {
    let publisher = Arc::new(CollectingPublisher::default());
    let stats = Arc::new(BridgeStats::new());
    let config = RelayConfig {
        topic: "execution_report".to_string(),
        ..RelayConfig::default()
    };
    let (callback, relay) = execution_relay(
        Arc::clone(&publisher) as Arc<dyn RecordPublisher>,
        config,
        Arc::clone(&stats),
    );

    let cancel = CancellationToken::new();
    let relay_task = tokio::spawn(relay.run(cancel.clone()));

    callback.on_execution_event(
        ExecutionEvent::new("E1", "O1")
            .with_field("execType", "F")
            .with_field("lastQty", 100),
    );

    assert!(eventually(Duration::from_secs(2), || publisher.count() == 1).await);
    cancel.cancel();
    relay_task.await.unwrap();

    let records = publisher.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].topic, "execution_report");
    assert_eq!(records[0].key, "E1");

    let payload: serde_json::Value = serde_json::from_slice(&records[0].payload).unwrap();
    assert_eq!(payload["executionId"], "E1");
    assert_eq!(payload["orderId"], "O1");
    assert_eq!(payload["execType"], "F");
    assert_eq!(payload["lastQty"], 100);
    assert_eq!(stats.snapshot().executions_published, 1);
}

#[tokio::test]
async fn read_loop_survives_transient_errors() {
    let session = Arc::new(RecordingSession::default());
    let pipeline = pipeline_with(&session);
    let reader = Arc::new(ScriptedReader::default());
    for _ in 0..5 {
        reader.push(Err(TransportError::Cancelled));
    }

    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_read_loop(
        ReaderKind::Group,
        Arc::clone(&reader),
        pipeline,
        FAST_RETRY,
        cancel.clone(),
    ));

    assert!(eventually(Duration::from_secs(2), || reader.reads() == 5).await);
    assert!(!task.is_finished());

    reader.push(Ok(order_record(0, 1)));
    assert!(eventually(Duration::from_secs(2), || session.submissions() == 1).await);
    assert!(!task.is_finished());

    cancel.cancel();
    let summary = task.await.unwrap();
    assert_eq!(summary.read_errors, 5);
    assert_eq!(summary.records, 1);
}

#[tokio::test]
async fn read_loop_keeps_going_after_broker_errors_and_bad_records() {
    let session = Arc::new(RecordingSession::default());
    let pipeline = pipeline_with(&session);
    let reader = Arc::new(ScriptedReader::default());
    reader.push(Err(TransportError::Broker("leader not available".to_string())));
    reader.push(Ok(InboundRecord::with_payload(0, 1, "not json")));
    reader.push(Ok(order_record(0, 2)));
    reader.push(Ok(order_record(0, 3)));

    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_read_loop(
        ReaderKind::Direct(0),
        Arc::clone(&reader),
        pipeline,
        FAST_RETRY,
        cancel.clone(),
    ));

    assert!(eventually(Duration::from_secs(2), || session.submissions() == 2).await);
    cancel.cancel();
    let summary = task.await.unwrap();
    assert_eq!(summary.read_errors, 1);
    assert_eq!(summary.records, 3);
}

#[tokio::test]
async fn read_loop_stops_promptly_on_cancel_while_waiting() {
    let session = Arc::new(RecordingSession::default());
    let pipeline = pipeline_with(&session);
    let reader = Arc::new(ScriptedReader::default());

    let cancel = CancellationToken::new();
    let task = tokio::spawn(run_read_loop(
        ReaderKind::Group,
        reader,
        pipeline,
        ReadLoopConfig::default(),
        cancel.clone(),
    ));

    tokio::time::sleep(Duration::from_millis(20)).await;
    cancel.cancel();
    let summary = tokio::time::timeout(Duration::from_secs(1), task)
        .await
        .expect("read loop did not observe cancellation")
        .unwrap();
    assert_eq!(summary.records, 0);
}

#[tokio::test]
async fn paper_session_round_trip_publishes_acknowledgment() {
    let session = Arc::new(PaperTradingSession::new("FIX.4.4:BRIDGE->PAPER"));
    let publisher = Arc::new(CollectingPublisher::default());
    let stats = Arc::new(BridgeStats::new());

    let (callback, relay) = execution_relay(
        Arc::clone(&publisher) as Arc<dyn RecordPublisher>,
        RelayConfig::default(),
        Arc::clone(&stats),
    );
    session.register_execution_handler(Arc::new(callback));

    let dispatcher = OrderDispatcher::new(
        identities(),
        Arc::clone(&session) as Arc<dyn TradingSessionPort>,
        Arc::clone(&session) as Arc<dyn OrderTrackerPort>,
    );
    let pipeline = OrderPipeline::new(dispatcher, Arc::clone(&stats));

    let cancel = CancellationToken::new();
    let relay_task = tokio::spawn(relay.run(cancel.clone()));

    let id = pipeline
        .process(ReaderKind::Group, &order_record(0, 1))
        .await
        .unwrap();

    assert!(eventually(Duration::from_secs(2), || publisher.count() == 1).await);
    cancel.cancel();
    relay_task.await.unwrap();

    let records = publisher.records();
    assert_eq!(records[0].key, format!("paper:exec:{id}:1"));
    assert_eq!(session.orders_for("alice"), vec![id]);

    let totals = stats.snapshot();
    assert_eq!(totals.records_received, 1);
    assert_eq!(totals.orders_dispatched, 1);
    assert_eq!(totals.executions_published, 1);
}

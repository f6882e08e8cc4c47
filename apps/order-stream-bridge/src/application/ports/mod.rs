//! Port Interfaces
//!
//! Contracts between the order pipeline and the outside world, following the
//! Hexagonal Architecture pattern.
//!
//! ## Driven Ports (Outbound)
//!
//! - `RecordReader` / `GroupReader`: sequential record sources
//! - `ConsumerTransport`: metadata probe and consumption strategy swap
//! - `RecordPublisher`: execution event publishing
//! - `TradingSessionPort`: order submission and execution callbacks
//! - `OrderTrackerPort`: order-tracking table appends

mod broker_port;
mod trading_session_port;

pub use broker_port::{
    CloseError, CloseFailure, ConsumerTransport, GroupReader, InboundRecord, OutboundRecord,
    RecordHeader, RecordPublisher, RecordReader, TransportError,
};
pub use trading_session_port::{
    ExecutionEventHandler, OrderTrackerPort, SessionError, SessionId, TradingSessionPort,
};

#[cfg(test)]
pub use trading_session_port::{MockOrderTrackerPort, MockTradingSessionPort};

//! Domain Layer - Order, identity, execution and consumption types.
//!
//! Pure types and policies with no I/O. Serialization support only.

/// Consumption mode, group statistics and the fallback detection policy.
pub mod consumption;

/// Execution events relayed back to the stream.
pub mod execution;

/// Submitter identity directory.
pub mod identity;

/// Inbound order requests, client order ids and outbound orders.
pub mod order;

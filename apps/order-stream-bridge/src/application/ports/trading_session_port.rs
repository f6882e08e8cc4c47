//! Trading Session Port (Driven Port)
//!
//! The trading-session capability: an established session that accepts
//! outbound orders and reports executions through a registered handler. The
//! session also owns the order-tracking table used for later status lookups.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::execution::ExecutionEvent;
use crate::domain::order::{ClientOrderId, OutboundOrder};

/// Identifier of an established trading session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Trading session error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    /// No session is currently logged on.
    #[error("no active trading session")]
    NotLoggedOn,

    /// The session refused the order.
    #[error("order rejected by session: {reason}")]
    Rejected {
        /// Rejection reason.
        reason: String,
    },

    /// Sending failed.
    #[error("send to target failed: {0}")]
    SendFailed(String),
}

/// Receives execution events from the trading session.
///
/// Implementations must return quickly; the session may call this from its
/// own I/O thread.
pub trait ExecutionEventHandler: Send + Sync {
    /// Handle one execution event.
    fn on_execution_event(&self, event: ExecutionEvent);
}

/// Port for the trading-session capability.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TradingSessionPort: Send + Sync {
    /// The session orders should currently be sent to.
    fn active_session(&self) -> Result<SessionId, SessionError>;

    /// Submit an order on `session`.
    async fn submit(&self, order: OutboundOrder, session: &SessionId) -> Result<(), SessionError>;

    /// Register the handler invoked for every execution event.
    fn register_execution_handler(&self, handler: Arc<dyn ExecutionEventHandler>);
}

/// Append-only access to the session's order-tracking table.
#[cfg_attr(test, mockall::automock)]
pub trait OrderTrackerPort: Send + Sync {
    /// Record that `identity_name` submitted `client_order_id`.
    fn record(&self, identity_name: &str, client_order_id: &ClientOrderId);
}

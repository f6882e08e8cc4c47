//! Deterministic in-memory trading session.
//!
//! - Logged on from construction under a fixed session id.
//! - Every accepted order is acknowledged with a `New` execution event:
//!     - execution id: `paper:exec:{clOrdId}:{seq}`
//!     - order id:     `paper:order:{clOrdId}`
//! - `seq` counts acknowledgments from 1 for the life of the session.
//! - Orders with a non-positive quantity are rejected.
//!
//! The tracking table maps identity name to the client order ids it
//! submitted, in submission order.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::application::ports::{
    ExecutionEventHandler, OrderTrackerPort, SessionError, SessionId, TradingSessionPort,
};
use crate::domain::execution::ExecutionEvent;
use crate::domain::order::{ClientOrderId, OutboundOrder};

const EXEC_TYPE_NEW: &str = "0";
const ORD_STATUS_NEW: &str = "0";

/// Paper trading session.
pub struct PaperTradingSession {
    session_id: SessionId,
    logged_on: AtomicBool,
    sequence: AtomicU64,
    handler: RwLock<Option<Arc<dyn ExecutionEventHandler>>>,
    orders: RwLock<BTreeMap<String, Vec<ClientOrderId>>>,
}

impl PaperTradingSession {
    /// Create a logged-on session.
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: SessionId::new(session_id),
            logged_on: AtomicBool::new(true),
            sequence: AtomicU64::new(0),
            handler: RwLock::new(None),
            orders: RwLock::new(BTreeMap::new()),
        }
    }

    /// Simulate a logout; submissions fail until `logon`.
    pub fn logout(&self) {
        self.logged_on.store(false, Ordering::Release);
        tracing::info!(session = %self.session_id, "Paper session logged out");
    }

    /// Simulate a logon.
    pub fn logon(&self) {
        self.logged_on.store(true, Ordering::Release);
        tracing::info!(session = %self.session_id, "Paper session logged on");
    }

    /// Client order ids recorded for `identity_name`.
    #[must_use]
    pub fn orders_for(&self, identity_name: &str) -> Vec<ClientOrderId> {
        self.orders
            .read()
            .get(identity_name)
            .cloned()
            .unwrap_or_default()
    }

    fn acknowledge(&self, order: &OutboundOrder) -> ExecutionEvent {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed) + 1;
        let cl_ord_id = order.client_order_id.as_str();

        ExecutionEvent::new(
            format!("paper:exec:{cl_ord_id}:{seq}"),
            format!("paper:order:{cl_ord_id}"),
        )
        .with_field("clOrdId", cl_ord_id)
        .with_field("execType", EXEC_TYPE_NEW)
        .with_field("ordStatus", ORD_STATUS_NEW)
        .with_field("side", order.side.as_str())
        .with_field("symbol", order.symbol.as_str())
        .with_field("securityExchange", order.security_exchange.as_str())
        .with_field("ordType", order.order_type.as_str())
        .with_field("timeInForce", order.time_in_force.as_str())
        .with_field("orderQty", order.quantity.to_string())
        .with_field("price", order.price.to_string())
        .with_field("leavesQty", order.quantity.to_string())
        .with_field("cumQty", "0")
        .with_field("transactTime", order.transact_time.to_rfc3339())
    }
}

impl std::fmt::Debug for PaperTradingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaperTradingSession")
            .field("session_id", &self.session_id)
            .field("logged_on", &self.logged_on.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TradingSessionPort for PaperTradingSession {
    fn active_session(&self) -> Result<SessionId, SessionError> {
        if self.logged_on.load(Ordering::Acquire) {
            Ok(self.session_id.clone())
        } else {
            Err(SessionError::NotLoggedOn)
        }
    }

    async fn submit(&self, order: OutboundOrder, session: &SessionId) -> Result<(), SessionError> {
        if *session != self.session_id {
            return Err(SessionError::SendFailed(format!("unknown session {session}")));
        }
        if !self.logged_on.load(Ordering::Acquire) {
            return Err(SessionError::NotLoggedOn);
        }
        if order.quantity <= Decimal::ZERO {
            return Err(SessionError::Rejected {
                reason: format!("quantity must be positive, got {}", order.quantity),
            });
        }

        tracing::debug!(
            session = %session,
            client_order_id = %order.client_order_id,
            "Paper session accepted order"
        );

        let event = self.acknowledge(&order);
        let handler = self.handler.read().clone();
        match handler {
            Some(handler) => handler.on_execution_event(event),
            None => tracing::debug!(
                execution_id = %event.execution_id,
                "No execution handler registered"
            ),
        }
        Ok(())
    }

    fn register_execution_handler(&self, handler: Arc<dyn ExecutionEventHandler>) {
        *self.handler.write() = Some(handler);
    }
}

impl OrderTrackerPort for PaperTradingSession {
    fn record(&self, identity_name: &str, client_order_id: &ClientOrderId) {
        self.orders
            .write()
            .entry(identity_name.to_string())
            .or_default()
            .push(client_order_id.clone());
    }
}

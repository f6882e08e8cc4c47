//! Order Dispatcher
//!
//! Resolves the submitting identity, assigns a client order id, translates the
//! request into a protocol-native order and submits it on the active trading
//! session. Accepted orders are appended to the session's tracking table.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::application::ports::{OrderTrackerPort, SessionError, TradingSessionPort};
use crate::domain::identity::{IdentityDirectory, token_preview};
use crate::domain::order::{ClientOrderId, OrderRequest, OutboundOrder};
use crate::infrastructure::metrics;

/// Reasons an order is dropped by the dispatcher.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    /// The submitter token is not in the identity directory.
    #[error("unknown submitter identity (token {token_preview})")]
    UnknownIdentity {
        /// Log-safe token rendering.
        token_preview: String,
    },

    /// The trading session did not accept the order.
    #[error("order submission failed: {0}")]
    Submission(#[from] SessionError),
}

impl DispatchError {
    /// Short label for metrics.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::UnknownIdentity { .. } => "unknown_identity",
            Self::Submission(_) => "submission",
        }
    }
}

/// Translates decoded order requests into trading-session submissions.
pub struct OrderDispatcher {
    identities: Arc<IdentityDirectory>,
    session: Arc<dyn TradingSessionPort>,
    tracker: Arc<dyn OrderTrackerPort>,
}

impl OrderDispatcher {
    /// Create a dispatcher over a loaded identity directory.
    #[must_use]
    pub fn new(
        identities: Arc<IdentityDirectory>,
        session: Arc<dyn TradingSessionPort>,
        tracker: Arc<dyn OrderTrackerPort>,
    ) -> Self {
        Self {
            identities,
            session,
            tracker,
        }
    }

    /// Submit one order request.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::UnknownIdentity` without contacting the session
    /// when the token is not known, and `DispatchError::Submission` when no
    /// session is active or the session refuses the order.
    pub async fn handle(&self, request: &OrderRequest) -> Result<ClientOrderId, DispatchError> {
        let Some(identity) = self.identities.resolve(&request.submitter_token) else {
            return Err(DispatchError::UnknownIdentity {
                token_preview: token_preview(&request.submitter_token),
            });
        };

        let started = Instant::now();
        let now = Utc::now();
        let client_order_id = ClientOrderId::generate(identity.name(), now);
        let order = OutboundOrder::from_request(request, client_order_id.clone(), now);

        let session = self.session.active_session()?;
        self.session.submit(order, &session).await?;
        self.tracker.record(identity.name(), &client_order_id);

        metrics::record_dispatch_duration(started.elapsed());
        tracing::info!(
            identity = identity.name(),
            client_order_id = %client_order_id,
            session = %session,
            symbol = %request.instrument.symbol,
            side = %request.order.side,
            quantity = request.order.quantity,
            price = request.order.price,
            "Order submitted"
        );

        Ok(client_order_id)
    }
}

impl std::fmt::Debug for OrderDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderDispatcher")
            .field("identities", &self.identities)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;
    use crate::application::ports::{MockOrderTrackerPort, MockTradingSessionPort, SessionId};
    use crate::domain::identity::IdentityRecord;
    use crate::domain::order::{Instrument, OrderDetails};

    fn directory() -> Arc<IdentityDirectory> {
        Arc::new(IdentityDirectory::new([(
            "tok1".to_string(),
            IdentityRecord::new("alice", "s3cret"),
        )]))
    }

    fn request(token: &str) -> OrderRequest {
        OrderRequest {
            submitter_token: token.to_string(),
            instrument: Instrument {
                symbol: "ABC".to_string(),
                security_exchange: "XYZ".to_string(),
            },
            order: OrderDetails {
                side: "1".to_string(),
                order_type: "2".to_string(),
                quantity: 100,
                price: 150,
                time_in_force: "0".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn submits_and_tracks_known_identity() {
        let mut session = MockTradingSessionPort::new();
        session
            .expect_active_session()
            .times(1)
            .returning(|| Ok(SessionId::new("FIX.4.4:A->B")));
        session
            .expect_submit()
            .withf(|order: &OutboundOrder, session: &SessionId| {
                order.client_order_id.as_str().starts_with("alice:")
                    && order.quantity == Decimal::new(100, 0)
                    && order.price == Decimal::new(150, 0)
                    && order.symbol == "ABC"
                    && order.security_exchange == "XYZ"
                    && session.as_str() == "FIX.4.4:A->B"
            })
            .times(1)
            .returning(|_, _| Ok(()));

        let mut tracker = MockOrderTrackerPort::new();
        tracker
            .expect_record()
            .withf(|name: &str, id: &ClientOrderId| name == "alice" && id.as_str().starts_with("alice:"))
            .times(1)
            .return_const(());

        let dispatcher = OrderDispatcher::new(directory(), Arc::new(session), Arc::new(tracker));
        let id = dispatcher.handle(&request("tok1")).await.unwrap();
        assert!(id.as_str().starts_with("alice:"));
    }

    #[tokio::test]
    async fn unknown_identity_never_reaches_session() {
        let mut session = MockTradingSessionPort::new();
        session.expect_active_session().never();
        session.expect_submit().never();
        let mut tracker = MockOrderTrackerPort::new();
        tracker.expect_record().never();

        let dispatcher = OrderDispatcher::new(directory(), Arc::new(session), Arc::new(tracker));
        let token = "unknown-token-with-secret-material";
        let err = dispatcher.handle(&request(token)).await.unwrap_err();

        match &err {
            DispatchError::UnknownIdentity { token_preview } => {
                assert!(token_preview.starts_with("unkn"));
                assert!(!token_preview.contains("secret"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(err.reason(), "unknown_identity");
    }

    #[tokio::test]
    async fn rejected_submission_is_not_tracked() {
        let mut session = MockTradingSessionPort::new();
        session
            .expect_active_session()
            .returning(|| Ok(SessionId::new("S")));
        session.expect_submit().times(1).returning(|_, _| {
            Err(SessionError::Rejected {
                reason: "closed market".to_string(),
            })
        });
        let mut tracker = MockOrderTrackerPort::new();
        tracker.expect_record().never();

        let dispatcher = OrderDispatcher::new(directory(), Arc::new(session), Arc::new(tracker));
        let err = dispatcher.handle(&request("tok1")).await.unwrap_err();
        assert!(matches!(err, DispatchError::Submission(SessionError::Rejected { .. })));
    }

    #[tokio::test]
    async fn missing_session_is_a_submission_error() {
        let mut session = MockTradingSessionPort::new();
        session
            .expect_active_session()
            .returning(|| Err(SessionError::NotLoggedOn));
        session.expect_submit().never();
        let mut tracker = MockOrderTrackerPort::new();
        tracker.expect_record().never();

        let dispatcher = OrderDispatcher::new(directory(), Arc::new(session), Arc::new(tracker));
        let err = dispatcher.handle(&request("tok1")).await.unwrap_err();
        assert_eq!(err.reason(), "submission");
    }
}

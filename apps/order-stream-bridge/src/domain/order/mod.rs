//! Order Domain
//!
//! Inbound order requests as published upstream, the client order id scheme,
//! and the protocol-native outbound order handed to the trading session.
//!
//! # Wire Format
//!
//! ```json
//! {
//!   "submitterToken": "tok1",
//!   "instrument": { "symbol": "ABC", "securityExchange": "XYZ" },
//!   "order": {
//!     "side": "1", "orderType": "2", "quantity": 100,
//!     "price": 150, "timeInForce": "0"
//!   }
//! }
//! ```
//!
//! Every struct denies unknown fields. The snake_case names used by older
//! publishers (`user_token`, `new_order_single`, `order_qty`, ...) are
//! accepted as aliases.

use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// =============================================================================
// Inbound Order Request
// =============================================================================

/// A new-order request consumed from the orders topic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderRequest {
    /// Opaque token identifying the submitting identity.
    #[serde(alias = "user_token")]
    pub submitter_token: String,
    /// Instrument being traded.
    pub instrument: Instrument,
    /// Order parameters.
    #[serde(alias = "new_order_single")]
    pub order: OrderDetails,
}

/// Instrument identification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Instrument {
    /// Ticker symbol.
    pub symbol: String,
    /// Exchange the instrument is listed on.
    #[serde(alias = "security_exchange")]
    pub security_exchange: String,
}

/// Order parameters. Enumerations carry the trading protocol's own codes
/// (e.g. side `"1"` = buy, order type `"2"` = limit, time in force `"0"` = day).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct OrderDetails {
    /// Side code.
    pub side: String,
    /// Order type code.
    #[serde(alias = "order_type")]
    pub order_type: String,
    /// Whole-unit quantity.
    #[serde(alias = "order_qty")]
    pub quantity: i64,
    /// Price in ticks.
    pub price: i64,
    /// Time-in-force code.
    #[serde(alias = "time_in_force")]
    pub time_in_force: String,
}

// =============================================================================
// Client Order Id
// =============================================================================

/// Caller-assigned order identifier: `{identityName}:{unixNanos}`.
///
/// Uniqueness rests on nanosecond clock resolution. Two submissions for the
/// same identity within one clock tick produce the same id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientOrderId(String);

impl ClientOrderId {
    /// Build an id for `identity_name` at the given instant.
    #[must_use]
    pub fn generate(identity_name: &str, at: DateTime<Utc>) -> Self {
        let nanos = at.timestamp_nanos_opt().unwrap_or(i64::MAX);
        Self(format!("{identity_name}:{nanos}"))
    }

    /// Get the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientOrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// =============================================================================
// Outbound Order
// =============================================================================

/// Protocol-native new order single submitted through the trading session.
///
/// Price and quantity are exact decimals with scale zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OutboundOrder {
    /// Client order id.
    pub client_order_id: ClientOrderId,
    /// Side code.
    pub side: String,
    /// Transaction time.
    pub transact_time: DateTime<Utc>,
    /// Order type code.
    pub order_type: String,
    /// Symbol.
    pub symbol: String,
    /// Security exchange.
    pub security_exchange: String,
    /// Limit price.
    pub price: Decimal,
    /// Order quantity.
    pub quantity: Decimal,
    /// Time-in-force code.
    pub time_in_force: String,
}

impl OutboundOrder {
    /// Translate a decoded request into an outbound order.
    #[must_use]
    pub fn from_request(
        request: &OrderRequest,
        client_order_id: ClientOrderId,
        transact_time: DateTime<Utc>,
    ) -> Self {
        Self {
            client_order_id,
            side: request.order.side.clone(),
            transact_time,
            order_type: request.order.order_type.clone(),
            symbol: request.instrument.symbol.clone(),
            security_exchange: request.instrument.security_exchange.clone(),
            price: Decimal::new(request.order.price, 0),
            quantity: Decimal::new(request.order.quantity, 0),
            time_in_force: request.order.time_in_force.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use proptest::prelude::*;
    use rust_decimal::prelude::ToPrimitive;

    use super::*;

    fn request(quantity: i64, price: i64) -> OrderRequest {
        OrderRequest {
            submitter_token: "tok1".to_string(),
            instrument: Instrument {
                symbol: "ABC".to_string(),
                security_exchange: "XYZ".to_string(),
            },
            order: OrderDetails {
                side: "1".to_string(),
                order_type: "2".to_string(),
                quantity,
                price,
                time_in_force: "0".to_string(),
            },
        }
    }

    #[test]
    fn client_order_id_format() {
        let at = Utc.timestamp_opt(1_700_000_000, 123).unwrap();
        let id = ClientOrderId::generate("alice", at);
        assert_eq!(id.as_str(), "alice:1700000000000000123");
        assert_eq!(id.to_string(), id.as_str());
    }

    #[test]
    fn outbound_order_copies_request_fields() {
        let at = Utc::now();
        let id = ClientOrderId::generate("alice", at);
        let order = OutboundOrder::from_request(&request(100, 150), id.clone(), at);

        assert_eq!(order.client_order_id, id);
        assert_eq!(order.side, "1");
        assert_eq!(order.order_type, "2");
        assert_eq!(order.symbol, "ABC");
        assert_eq!(order.security_exchange, "XYZ");
        assert_eq!(order.time_in_force, "0");
        assert_eq!(order.transact_time, at);
        assert_eq!(order.quantity, Decimal::new(100, 0));
        assert_eq!(order.price, Decimal::new(150, 0));
    }

    proptest! {
        #[test]
        fn price_and_quantity_are_exact(quantity in any::<i64>(), price in any::<i64>()) {
            let order = OutboundOrder::from_request(
                &request(quantity, price),
                ClientOrderId::generate("p", Utc::now()),
                Utc::now(),
            );
            prop_assert_eq!(order.quantity.scale(), 0);
            prop_assert_eq!(order.price.scale(), 0);
            prop_assert_eq!(order.quantity.to_i64(), Some(quantity));
            prop_assert_eq!(order.price.to_i64(), Some(price));
        }

        #[test]
        fn distinct_instants_give_distinct_ids(a in 0_i64..4_000_000_000_000_000_000, b in 0_i64..4_000_000_000_000_000_000) {
            prop_assume!(a != b);
            let id_a = ClientOrderId::generate("alice", Utc.timestamp_nanos(a));
            let id_b = ClientOrderId::generate("alice", Utc.timestamp_nanos(b));
            prop_assert_ne!(id_a, id_b);
        }
    }
}

//! Execution Events
//!
//! Execution reports emitted by the trading session. The bridge only needs the
//! execution id (record key) and order id (logging); every other field is
//! carried through untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Keys serialized from the struct itself.
const RESERVED_KEYS: [&str; 2] = ["executionId", "orderId"];

/// An execution event as produced by the trading session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionEvent {
    /// Execution identifier; used as the outbound record key.
    pub execution_id: String,
    /// Venue order identifier.
    pub order_id: String,
    /// Remaining protocol-defined fields.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl ExecutionEvent {
    /// Create an event with no extra fields.
    #[must_use]
    pub fn new(execution_id: impl Into<String>, order_id: impl Into<String>) -> Self {
        Self {
            execution_id: execution_id.into(),
            order_id: order_id.into(),
            fields: Map::new(),
        }
    }

    /// Attach a protocol field.
    ///
    /// `executionId` and `orderId` are struct fields; passing either name
    /// here is ignored so the payload never carries a key twice.
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        let name = name.into();
        if !RESERVED_KEYS.contains(&name.as_str()) {
            self.fields.insert(name, value.into());
        }
        self
    }

    /// Serialize to the outbound JSON payload.
    ///
    /// # Errors
    ///
    /// Returns an error if a carried field cannot be serialized.
    pub fn to_payload(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

//! Order Decoder
//!
//! Strict JSON decoding of inbound order records plus the log-safe payload
//! preview used when a record is rejected.

use crate::domain::order::OrderRequest;

/// Maximum number of payload bytes rendered into logs.
pub const PAYLOAD_PREVIEW_BYTES: usize = 2048;

const TRUNCATED_SUFFIX: &str = "...(truncated)";

/// Reasons an inbound record cannot become an [`OrderRequest`].
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The record carried no value (tombstone).
    #[error("record has no payload")]
    MissingPayload,

    /// The record value was zero bytes long.
    #[error("payload is empty")]
    EmptyPayload,

    /// The payload is not an order request, has unknown fields, or is missing
    /// required ones.
    #[error("payload does not match the order schema: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Decode a record value into an order request.
///
/// # Errors
///
/// Returns `DecodeError` for absent or empty payloads, invalid JSON, trailing
/// data, unknown fields and missing fields.
pub fn decode(payload: Option<&[u8]>) -> Result<OrderRequest, DecodeError> {
    let bytes = payload.ok_or(DecodeError::MissingPayload)?;
    if bytes.is_empty() {
        return Err(DecodeError::EmptyPayload);
    }
    Ok(serde_json::from_slice(bytes)?)
}

/// Render at most `limit` bytes of `payload` as text, never splitting a
/// character.
#[must_use]
pub fn payload_preview(payload: &[u8], limit: usize) -> String {
    let text = String::from_utf8_lossy(payload);
    if text.len() <= limit {
        return text.into_owned();
    }
    let mut end = limit;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}{TRUNCATED_SUFFIX}", &text[..end])
}

//! Opaque pagination cursors.
//!
//! A cursor encodes the tuple of sort-clause values for one result, in the
//! same order as the active sort clauses. A reserved singleton marker stands
//! in for the one bucket of an ungrouped aggregation, which has no sort
//! values of its own. The encoding is JSON wrapped in URL-safe unpadded
//! base64, so cursors survive URL-bearing transports unchanged.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;

use crate::error::Error;

/// JSON payload used for the singleton marker.
const SINGLETON_PAYLOAD: &str = "\"*\"";

/// A decoded pagination cursor.
///
/// Cursors compare structurally: a cursor decoded from a client string is
/// equal to one built from a result's sort values whenever the values match.
#[derive(Debug, Clone, PartialEq)]
pub enum Cursor {
    /// Marker for the single bucket of an ungrouped aggregation.
    Singleton,
    /// Sort values of one result, ordered like the active sort clauses.
    SortValues(Vec<Value>),
}

impl Cursor {
    /// Build a cursor from a result's sort values.
    pub fn from_sort_values(values: Vec<Value>) -> Self {
        Cursor::SortValues(values)
    }

    /// Encode to the opaque string form.
    pub fn encode(&self) -> String {
        let payload = match self {
            Cursor::Singleton => SINGLETON_PAYLOAD.to_string(),
            Cursor::SortValues(values) => {
                Value::Array(values.clone()).to_string()
            }
        };
        URL_SAFE_NO_PAD.encode(payload)
    }

    /// Decode a client-supplied cursor string.
    ///
    /// Malformed input is a client-visible validation error, never a panic.
    pub fn decode(encoded: &str) -> Result<Self, Error> {
        let bytes = URL_SAFE_NO_PAD
            .decode(encoded)
            .map_err(|e| Error::InvalidCursor(format!("not valid base64: {e}")))?;
        let payload: Value = serde_json::from_slice(&bytes)
            .map_err(|e| Error::InvalidCursor(format!("not valid cursor JSON: {e}")))?;
        match payload {
            Value::String(marker) if marker == "*" => Ok(Cursor::Singleton),
            Value::Array(values) => Ok(Cursor::SortValues(values)),
            other => Err(Error::InvalidCursor(format!(
                "unexpected cursor payload: {other}"
            ))),
        }
    }

    /// The sort values carried by this cursor, if any.
    pub fn sort_values(&self) -> Option<&[Value]> {
        match self {
            Cursor::SortValues(values) => Some(values),
            Cursor::Singleton => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sort_values_roundtrip() {
        let cursor = Cursor::from_sort_values(vec![json!(2003), json!("w1")]);
        let encoded = cursor.encode();
        let decoded = Cursor::decode(&encoded).unwrap();
        assert_eq!(decoded, cursor);
        // Round-trip law: re-encoding a decoded cursor is stable.
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn test_singleton_roundtrip() {
        let encoded = Cursor::Singleton.encode();
        let decoded = Cursor::decode(&encoded).unwrap();
        assert_eq!(decoded, Cursor::Singleton);
        assert_eq!(decoded.encode(), encoded);
    }

    #[test]
    fn test_structural_equality() {
        let from_result = Cursor::from_sort_values(vec![json!("a"), json!(1)]);
        let from_client = Cursor::decode(&from_result.encode()).unwrap();
        assert_eq!(from_result, from_client);
    }

    #[test]
    fn test_malformed_base64_is_client_error() {
        let err = Cursor::decode("!!!not-base64!!!").unwrap_err();
        assert!(err.is_client_visible());
    }

    #[test]
    fn test_malformed_json_is_client_error() {
        let encoded = URL_SAFE_NO_PAD.encode("{not json");
        let err = Cursor::decode(&encoded).unwrap_err();
        assert!(err.is_client_visible());
    }

    #[test]
    fn test_unexpected_payload_rejected() {
        let encoded = URL_SAFE_NO_PAD.encode("{\"k\":1}");
        assert!(Cursor::decode(&encoded).is_err());
    }

    #[test]
    fn test_url_safety() {
        // Values that would produce '+' or '/' in standard base64.
        let cursor = Cursor::from_sort_values(vec![json!("??\u{7f}~~>>"), json!(i64::MAX)]);
        let encoded = cursor.encode();
        assert!(!encoded.contains('+'));
        assert!(!encoded.contains('/'));
        assert!(!encoded.contains('='));
    }
}

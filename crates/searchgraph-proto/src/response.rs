//! Search response decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A decoded search response for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Time the backend spent, in milliseconds.
    #[serde(default)]
    pub took: u64,
    /// Whether the backend gave up before completing.
    #[serde(default)]
    pub timed_out: bool,
    /// Matching documents.
    pub hits: HitsBlock,
    /// Raw aggregation results, shaped by the request's `aggs`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregations: Option<Value>,
}

impl SearchResponse {
    /// An empty response with no hits and no aggregations.
    pub fn empty() -> Self {
        Self {
            took: 0,
            timed_out: false,
            hits: HitsBlock {
                total: None,
                hits: vec![],
            },
            aggregations: None,
        }
    }
}

/// The hits section of a search response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HitsBlock {
    /// Total matching document count, present when tracking was requested.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalHits>,
    /// The returned window of documents.
    #[serde(default)]
    pub hits: Vec<Hit>,
}

/// Total hit count with its accuracy relation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TotalHits {
    /// The count.
    pub value: u64,
    /// `"eq"` for exact counts, `"gte"` for lower bounds.
    #[serde(default = "default_relation")]
    pub relation: String,
}

fn default_relation() -> String {
    "eq".to_string()
}

/// One matching document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hit {
    /// Document id.
    #[serde(rename = "_id")]
    pub id: String,
    /// Concrete index the document came from.
    #[serde(rename = "_index", default)]
    pub index: String,
    /// The document source, possibly filtered to requested fields.
    #[serde(rename = "_source", default)]
    pub source: Value,
    /// The document's values for the request's sort clauses, in order.
    #[serde(default)]
    pub sort: Vec<Value>,
}

/// A per-request error inside a multiplexed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemError {
    /// Backend error type.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// Human-readable reason.
    #[serde(default)]
    pub reason: String,
}

/// One entry of a multiplexed search response.
///
/// The backend reports per-request failures inline, so each entry is either
/// a full response or an error object. Decoding tries the error shape first
/// because a response always carries `hits`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MultiSearchItem {
    /// This request failed; the others in the batch are unaffected.
    Error {
        /// The error detail.
        error: ItemError,
        /// HTTP-style status code.
        #[serde(default)]
        status: u16,
    },
    /// This request succeeded.
    Response(SearchResponse),
}

impl MultiSearchItem {
    /// Convert into a `Result`, losing no information.
    pub fn into_result(self) -> Result<SearchResponse, ItemError> {
        match self {
            MultiSearchItem::Response(response) => Ok(response),
            MultiSearchItem::Error { error, .. } => Err(error),
        }
    }
}

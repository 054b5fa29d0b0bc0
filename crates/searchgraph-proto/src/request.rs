//! Search request bodies.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::sort::SortClause;

/// One search request destined for the backend.
///
/// A multiplexed (`_msearch`-style) call submits many of these in a single
/// round trip; [`SearchRequest::to_header`] and [`SearchRequest::to_body`]
/// produce the header/body line pair for one entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Target index name or pattern.
    pub index: String,
    /// Boolean filter clause tree, already lowered to engine syntax.
    pub query: Value,
    /// Sort clauses, applied in order.
    pub sort: Vec<SortClause>,
    /// Number of hits to return.
    pub size: u32,
    /// Resume-point sort values for deep pagination.
    pub search_after: Option<Vec<Value>>,
    /// Whether to compute the exact total hit count.
    pub track_total_hits: bool,
    /// Aggregation definitions, if any.
    pub aggs: Option<Value>,
    /// Source fields to fetch; `None` fetches the full document.
    pub source_includes: Option<Vec<String>>,
    /// Per-request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl SearchRequest {
    /// Create a match-all request against an index.
    pub fn new(index: impl Into<String>) -> Self {
        Self {
            index: index.into(),
            query: json!({ "match_all": {} }),
            sort: vec![],
            size: 0,
            search_after: None,
            track_total_hits: false,
            aggs: None,
            source_includes: None,
            timeout_ms: None,
        }
    }

    /// Set the filter clause tree.
    pub fn with_query(mut self, query: Value) -> Self {
        self.query = query;
        self
    }

    /// Set the sort clauses.
    pub fn with_sort(mut self, sort: Vec<SortClause>) -> Self {
        self.sort = sort;
        self
    }

    /// Set the requested hit count.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Set the aggregation definitions.
    pub fn with_aggs(mut self, aggs: Value) -> Self {
        self.aggs = Some(aggs);
        self
    }

    /// The multiplexed-call header line for this request.
    pub fn to_header(&self) -> Value {
        json!({ "index": self.index })
    }

    /// The request body as engine JSON.
    pub fn to_body(&self) -> Value {
        let mut body = json!({
            "query": self.query,
            "size": self.size,
            "track_total_hits": self.track_total_hits,
        });
        if !self.sort.is_empty() {
            let entries: Vec<Value> = self.sort.iter().map(SortClause::to_body).collect();
            body["sort"] = Value::Array(entries);
        }
        if let Some(after) = &self.search_after {
            body["search_after"] = Value::Array(after.clone());
        }
        if let Some(aggs) = &self.aggs {
            body["aggs"] = aggs.clone();
        }
        if let Some(includes) = &self.source_includes {
            body["_source"] = json!({ "includes": includes });
        }
        if let Some(timeout) = self.timeout_ms {
            body["timeout"] = json!(format!("{timeout}ms"));
        }
        body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_match_all_body() {
        let request = SearchRequest::new("widgets").with_size(10);
        let body = request.to_body();
        assert_eq!(body["query"], json!({ "match_all": {} }));
        assert_eq!(body["size"], json!(10));
        assert_eq!(body["track_total_hits"], json!(false));
        assert!(body.get("sort").is_none());
    }

    #[test]
    fn test_header_names_index() {
        let request = SearchRequest::new("widgets_rollover_*");
        assert_eq!(request.to_header(), json!({ "index": "widgets_rollover_*" }));
    }

    #[test]
    fn test_full_body() {
        let request = SearchRequest::new("widgets")
            .with_query(json!({ "bool": { "filter": [{ "terms": { "id": ["a"] } }] } }))
            .with_sort(vec![SortClause::asc("id")])
            .with_size(3)
            .with_aggs(json!({ "by_size": { "terms": { "field": "size" } } }));
        let mut request = request;
        request.search_after = Some(vec![json!("abc")]);
        request.source_includes = Some(vec!["id".into(), "name".into()]);
        request.timeout_ms = Some(2500);

        let body = request.to_body();
        assert_eq!(body["search_after"], json!(["abc"]));
        assert_eq!(body["_source"], json!({ "includes": ["id", "name"] }));
        assert_eq!(body["timeout"], json!("2500ms"));
        assert_eq!(body["sort"], json!([{ "id": { "order": "asc" } }]));
        assert!(body["aggs"]["by_size"].is_object());
    }
}

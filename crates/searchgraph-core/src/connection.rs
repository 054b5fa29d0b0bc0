//! Relay-style connection assembly.
//!
//! Turns a truncated result window into the edges/pageInfo shape clients
//! consume. Every edge carries a cursor derived from its document's sort
//! values, so any edge can serve as a resume point.

use serde_json::Value;

use searchgraph_proto::Hit;

use crate::aggregation::{AggregationQuery, Bucket, BucketPage};
use crate::query::{Cursor, PageWindow};

/// One fetched document, with the sort values that position it.
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    /// Document id.
    pub id: String,
    /// Index the hit came from.
    pub index: String,
    /// The fetched source fields.
    pub payload: Value,
    /// Sort values under the active sort clauses, cursor material.
    pub sort_values: Vec<Value>,
}

impl Document {
    /// Build from a raw search hit.
    pub fn from_hit(hit: Hit) -> Self {
        Self {
            id: hit.id,
            index: hit.index,
            payload: hit.source,
            sort_values: hit.sort,
        }
    }

    /// The cursor that resumes traversal at this document.
    pub fn cursor(&self) -> Cursor {
        Cursor::from_sort_values(self.sort_values.clone())
    }

    /// A field value from the payload, by dotted path.
    pub fn field(&self, path: &str) -> Option<&Value> {
        path.split('.')
            .try_fold(&self.payload, |value, segment| value.get(segment))
    }
}

/// A node plus its pagination cursor.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge<T> {
    /// The page item.
    pub node: T,
    /// Opaque resume cursor for this item.
    pub cursor: String,
}

/// Window boundary information for a connection.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PageInfo {
    /// Whether a page exists after this window.
    pub has_next_page: bool,
    /// Whether a page exists before this window.
    pub has_previous_page: bool,
    /// Cursor of the first edge, if any.
    pub start_cursor: Option<String>,
    /// Cursor of the last edge, if any.
    pub end_cursor: Option<String>,
}

/// A paginated result window with boundary info and an optional total.
#[derive(Debug, Clone, PartialEq)]
pub struct Connection<T> {
    /// The page edges, in forward order.
    pub edges: Vec<Edge<T>>,
    /// Window boundary information.
    pub page_info: PageInfo,
    /// Exact total match count, when the query requested it.
    pub total_count: Option<u64>,
}

impl<T> Connection<T> {
    /// A connection with no edges and no adjacent pages.
    pub fn empty() -> Self {
        Self {
            edges: vec![],
            page_info: PageInfo::default(),
            total_count: None,
        }
    }

    /// Assemble a connection from a truncated window.
    pub fn from_window(
        window: PageWindow<T>,
        cursor_of: impl Fn(&T) -> Cursor,
        total_count: Option<u64>,
    ) -> Self {
        let edges: Vec<Edge<T>> = window
            .items
            .into_iter()
            .map(|node| {
                let cursor = cursor_of(&node).encode();
                Edge { node, cursor }
            })
            .collect();
        let page_info = PageInfo {
            has_next_page: window.has_next_page,
            has_previous_page: window.has_previous_page,
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: edges.last().map(|e| e.cursor.clone()),
        };
        Self {
            edges,
            page_info,
            total_count,
        }
    }

    /// The page items without their cursors.
    pub fn nodes(&self) -> Vec<&T> {
        self.edges.iter().map(|edge| &edge.node).collect()
    }
}

impl Connection<Document> {
    /// Assemble a document connection; cursors come from sort values.
    pub fn from_documents(window: PageWindow<Document>, total_count: Option<u64>) -> Self {
        Self::from_window(window, Document::cursor, total_count)
    }
}

impl Connection<Bucket> {
    /// Assemble an aggregation connection from a decoded bucket page.
    ///
    /// Grouped buckets get cursors from their group key values; the one
    /// bucket of an ungrouped aggregation gets the singleton marker. A
    /// composite resume key reported by the backend becomes the end cursor
    /// and signals a further page of groups.
    pub fn from_buckets(page: BucketPage, query: &AggregationQuery) -> Self {
        let grouping_names = query.grouping_names();
        let after_cursor = page.after_cursor(query).map(|cursor| cursor.encode());
        let edges: Vec<Edge<Bucket>> = page
            .buckets
            .into_iter()
            .map(|node| {
                let cursor = node.cursor(&grouping_names).encode();
                Edge { node, cursor }
            })
            .collect();
        let page_info = PageInfo {
            has_next_page: after_cursor.is_some(),
            has_previous_page: query.after.is_some(),
            start_cursor: edges.first().map(|e| e.cursor.clone()),
            end_cursor: after_cursor.or_else(|| edges.last().map(|e| e.cursor.clone())),
        };
        Self {
            edges,
            page_info,
            total_count: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn document(id: &str, year: i64) -> Document {
        Document {
            id: id.to_string(),
            index: "widgets".to_string(),
            payload: json!({ "id": id, "yearFormed": year }),
            sort_values: vec![json!(year), json!(id)],
        }
    }

    #[test]
    fn test_edges_carry_decodable_cursors() {
        let window = PageWindow {
            items: vec![document("w1", 2001), document("w2", 2002)],
            has_previous_page: false,
            has_next_page: true,
        };
        let connection = Connection::from_documents(window, None);
        assert_eq!(connection.edges.len(), 2);
        let decoded = Cursor::decode(&connection.edges[0].cursor).unwrap();
        assert_eq!(decoded, Cursor::from_sort_values(vec![json!(2001), json!("w1")]));
    }

    #[test]
    fn test_page_info_reflects_window() {
        let window = PageWindow {
            items: vec![document("w1", 2001), document("w2", 2002)],
            has_previous_page: true,
            has_next_page: false,
        };
        let connection = Connection::from_documents(window, Some(7));
        assert!(connection.page_info.has_previous_page);
        assert!(!connection.page_info.has_next_page);
        assert_eq!(
            connection.page_info.start_cursor,
            Some(connection.edges[0].cursor.clone())
        );
        assert_eq!(
            connection.page_info.end_cursor,
            Some(connection.edges[1].cursor.clone())
        );
        assert_eq!(connection.total_count, Some(7));
    }

    #[test]
    fn test_empty_window_has_no_boundary_cursors() {
        let window: PageWindow<Document> = PageWindow {
            items: vec![],
            has_previous_page: false,
            has_next_page: false,
        };
        let connection = Connection::from_documents(window, None);
        assert!(connection.edges.is_empty());
        assert_eq!(connection.page_info.start_cursor, None);
        assert_eq!(connection.page_info.end_cursor, None);
    }

    #[test]
    fn test_grouped_bucket_edges_carry_key_cursors() {
        use crate::aggregation::Grouping;
        use std::collections::BTreeMap;

        let query = AggregationQuery::new("by_country")
            .with_grouping(Grouping::new("country", "country"))
            .with_group_pagination();
        let page = BucketPage {
            buckets: vec![Bucket {
                key: BTreeMap::from([("country".to_string(), json!("FR"))]),
                doc_count: 2,
                doc_count_error_upper_bound: 0,
                computed: BTreeMap::new(),
                raw: Value::Null,
            }],
            after_key: Some(BTreeMap::from([("country".to_string(), json!("FR"))])),
        };
        let connection = Connection::from_buckets(page, &query);

        assert_eq!(connection.edges.len(), 1);
        let decoded = Cursor::decode(&connection.edges[0].cursor).unwrap();
        assert_eq!(decoded, Cursor::from_sort_values(vec![json!("FR")]));
        assert!(connection.page_info.has_next_page);
        assert!(!connection.page_info.has_previous_page);

        // The end cursor is the composite resume key and feeds the next
        // page's `with_after`.
        let end = Cursor::decode(connection.page_info.end_cursor.as_ref().unwrap()).unwrap();
        assert_eq!(end, Cursor::from_sort_values(vec![json!("FR")]));
    }

    #[test]
    fn test_ungrouped_bucket_edge_carries_singleton_cursor() {
        use std::collections::BTreeMap;

        let query = AggregationQuery::new("stats");
        let page = BucketPage {
            buckets: vec![Bucket {
                key: BTreeMap::new(),
                doc_count: 7,
                doc_count_error_upper_bound: 0,
                computed: BTreeMap::new(),
                raw: Value::Null,
            }],
            after_key: None,
        };
        let connection = Connection::from_buckets(page, &query);

        let decoded = Cursor::decode(&connection.edges[0].cursor).unwrap();
        assert_eq!(decoded, Cursor::Singleton);
        assert!(!connection.page_info.has_next_page);
        assert_eq!(
            connection.page_info.end_cursor,
            Some(connection.edges[0].cursor.clone())
        );
    }

    #[test]
    fn test_resumed_bucket_page_reports_previous_page() {
        use crate::aggregation::Grouping;

        let query = AggregationQuery::new("by_country")
            .with_grouping(Grouping::new("country", "country"))
            .with_after(Cursor::from_sort_values(vec![json!("FR")]));
        let page = BucketPage {
            buckets: vec![],
            after_key: None,
        };
        let connection = Connection::from_buckets(page, &query);
        assert!(connection.page_info.has_previous_page);
        assert!(!connection.page_info.has_next_page);
    }

    #[test]
    fn test_document_field_lookup() {
        let doc = Document {
            id: "w1".into(),
            index: "widgets".into(),
            payload: json!({ "cost": { "amount_cents": 1500 } }),
            sort_values: vec![],
        };
        assert_eq!(doc.field("cost.amount_cents"), Some(&json!(1500)));
        assert_eq!(doc.field("cost.currency"), None);
    }
}

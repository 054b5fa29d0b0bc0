//! Query representation and lowering.
//!
//! This module implements the immutable [`DatastoreQuery`] value object, the
//! adapter pipeline that builds one from a requested field, the filter
//! interpreter, the cursor codec, and the paginator.

pub mod cursor;
pub mod filters;
pub mod paginator;
pub mod pipeline;

pub use cursor::Cursor;
pub use filters::{excludes_incomplete_docs, null_inclusion, FilterInterpreter, NullInclusion};
pub use paginator::{compare_sort_values, PageWindow, Paginator};
pub use pipeline::{build_query, FieldArgs, QueryAdapter, RequestedFields, ADAPTER_PIPELINE};

use std::time::Instant;

use serde_json::{Map, Value};

use searchgraph_proto::{FilterNode, SearchRequest, SortClause};

use crate::aggregation::AggregationQuery;
use crate::error::Error;
use crate::metadata::{Metadata, SELF_SOURCE, SOURCES_FIELD};

/// One logical request to the search backend.
///
/// Immutable: every transformation returns a new value. Two queries are
/// equal iff all fields are equal, which is what batch deduplication and
/// the per-request build cache rely on.
#[derive(Debug, Clone, PartialEq)]
pub struct DatastoreQuery {
    /// Target index definition name.
    pub index: String,
    /// Client filters, combined with AND.
    pub filters: Vec<FilterNode>,
    /// Sort clauses; empty means the index default applies.
    pub sort: Vec<SortClause>,
    /// Pagination state.
    pub paginator: Paginator,
    /// Index field paths to fetch; empty fetches the full document.
    pub requested_fields: Vec<String>,
    /// Whether document hits are wanted at all (false for pure
    /// aggregation queries, which request a zero-size window).
    pub documents_requested: bool,
    /// Whether the exact total hit count is wanted.
    pub total_hits_requested: bool,
    /// Aggregation sub-queries.
    pub aggregations: Vec<AggregationQuery>,
    /// Monotonic execution deadline, threaded from the request context.
    pub deadline: Option<Instant>,
}

impl DatastoreQuery {
    /// Create an empty query scoped to an index.
    pub fn new(index: impl Into<String>, paginator: Paginator) -> Self {
        Self {
            index: index.into(),
            filters: vec![],
            sort: vec![],
            paginator,
            requested_fields: vec![],
            documents_requested: true,
            total_hits_requested: false,
            aggregations: vec![],
            deadline: None,
        }
    }

    /// Add a filter (AND-combined with existing filters).
    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filters.push(filter);
        self
    }

    /// Replace the sort clauses.
    pub fn with_sort(mut self, sort: Vec<SortClause>) -> Self {
        self.sort = sort;
        self
    }

    /// Replace the paginator.
    pub fn with_paginator(mut self, paginator: Paginator) -> Self {
        self.paginator = paginator;
        self
    }

    /// Replace the requested field paths.
    pub fn with_requested_fields(mut self, fields: Vec<String>) -> Self {
        self.requested_fields = fields;
        self
    }

    /// Request the exact total hit count.
    pub fn with_total_hits(mut self) -> Self {
        self.total_hits_requested = true;
        self
    }

    /// Add an aggregation sub-query.
    pub fn with_aggregation(mut self, aggregation: AggregationQuery) -> Self {
        self.aggregations.push(aggregation);
        self
    }

    /// Drop the document window, keeping only aggregations.
    pub fn without_documents(mut self) -> Self {
        self.documents_requested = false;
        self
    }

    /// Set the execution deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// The sort clauses in effect, falling back to the index default.
    pub fn effective_sort(&self, metadata: &Metadata) -> Result<Vec<SortClause>, Error> {
        if !self.sort.is_empty() {
            return Ok(self.sort.clone());
        }
        Ok(metadata.index_definition(&self.index)?.default_sort.clone())
    }

    /// Lower to a search request body.
    pub fn to_search_request(&self, metadata: &Metadata) -> Result<SearchRequest, Error> {
        let definition = metadata.index_definition(&self.index)?;
        let interpreter = FilterInterpreter::new(definition);

        let mut clauses = interpreter.to_clauses(&self.filters)?;
        if definition.multi_sourced() && !excludes_incomplete_docs(&self.filters) {
            // A record that is missing its self-sourced fields is only
            // partially indexed; exclude it unless the filters already
            // guarantee such a record can never match.
            clauses.push(serde_json::json!({
                "terms": { SOURCES_FIELD: [SELF_SOURCE] }
            }));
        }

        let forward_sort = self.effective_sort(metadata)?;
        let sort: Vec<SortClause> = if self.paginator.search_in_reverse() {
            forward_sort.iter().map(SortClause::reversed).collect()
        } else {
            forward_sort.clone()
        };

        let search_after = match self.paginator.resume_cursor() {
            Some(Cursor::SortValues(values)) => {
                if values.len() != sort.len() {
                    return Err(Error::InvalidCursor(format!(
                        "cursor carries {} sort values but the query sorts by {} clauses",
                        values.len(),
                        sort.len()
                    )));
                }
                Some(values.clone())
            }
            Some(Cursor::Singleton) | None => None,
        };

        let aggs = if self.aggregations.is_empty() {
            None
        } else {
            let mut bodies = Map::new();
            for aggregation in &self.aggregations {
                let (name, body) = aggregation.to_agg_body(&interpreter)?;
                bodies.insert(name, body);
            }
            Some(Value::Object(bodies))
        };

        let source_includes = if self.requested_fields.is_empty() {
            None
        } else {
            Some(self.requested_fields.clone())
        };

        let timeout_ms = self.deadline.map(|deadline| {
            deadline
                .saturating_duration_since(Instant::now())
                .as_millis()
                .max(1) as u64
        });

        Ok(SearchRequest {
            index: definition.name.clone(),
            query: filters::bool_filter_query(clauses),
            sort,
            size: if self.documents_requested {
                self.paginator.fetch_size()
            } else {
                0
            },
            search_after,
            track_total_hits: self.total_hits_requested,
            aggs,
            source_includes,
            timeout_ms,
        })
    }
}

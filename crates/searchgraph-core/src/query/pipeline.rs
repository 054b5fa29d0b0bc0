//! The adapter pipeline that builds a [`DatastoreQuery`] from field
//! arguments.
//!
//! Each adapter owns one query concern and applies the corresponding field
//! arguments as a pure transformation. The pipeline is a closed set folded
//! in a fixed order, so a built query is fully determined by the field
//! arguments and the engine configuration, never by resolver call order.

use searchgraph_proto::{FilterNode, SortClause, SortDirection};

use crate::aggregation::AggregationQuery;
use crate::config::EngineConfig;
use crate::error::Error;
use crate::metadata::Metadata;

use super::cursor::Cursor;
use super::paginator::Paginator;
use super::DatastoreQuery;

/// Which document fields a request needs fetched.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RequestedFields {
    /// Fetch the full document source.
    #[default]
    All,
    /// Fetch only the named logical field paths.
    Only(Vec<String>),
}

/// Client-supplied arguments for one queried field.
///
/// This is the engine's neutral view of the arguments a query-language
/// frontend parsed: filters, ordering, pagination bounds (cursors still in
/// their opaque string form), the sub-fields the request selects, and any
/// aggregation sub-queries.
#[derive(Debug, Clone, Default)]
pub struct FieldArgs {
    /// Filters, AND-combined.
    pub filters: Vec<FilterNode>,
    /// Requested ordering as (logical field path, descending) pairs.
    pub order_by: Vec<(String, bool)>,
    /// Forward page size.
    pub first: Option<u32>,
    /// Opaque forward resume cursor.
    pub after: Option<String>,
    /// Backward page size.
    pub last: Option<u32>,
    /// Opaque backward bound cursor.
    pub before: Option<String>,
    /// Which document fields the request selects.
    pub requested_fields: RequestedFields,
    /// Whether the request selects the exact total count.
    pub total_count: bool,
    /// Aggregation sub-queries.
    pub aggregations: Vec<AggregationQuery>,
}

impl FieldArgs {
    /// Arguments carrying nothing but defaults.
    pub fn new() -> Self {
        Self::default()
    }
}

/// One query-building concern.
///
/// The set is closed: adding a concern means adding a variant, and the
/// compiler then points at every place that must handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryAdapter {
    /// Applies client filters.
    Filters,
    /// Applies the requested ordering.
    Sort,
    /// Decodes cursors and applies pagination bounds.
    Pagination,
    /// Narrows the fetched document source to the selected fields.
    RequestedFields,
    /// Attaches aggregation sub-queries and the total-count flag.
    Aggregations,
}

/// The fixed adapter application order.
pub const ADAPTER_PIPELINE: &[QueryAdapter] = &[
    QueryAdapter::Filters,
    QueryAdapter::Sort,
    QueryAdapter::Pagination,
    QueryAdapter::RequestedFields,
    QueryAdapter::Aggregations,
];

impl QueryAdapter {
    /// Apply this adapter's arguments to a query.
    pub fn apply(
        self,
        query: DatastoreQuery,
        args: &FieldArgs,
        metadata: &Metadata,
        config: &EngineConfig,
    ) -> Result<DatastoreQuery, Error> {
        match self {
            QueryAdapter::Filters => Ok(args
                .filters
                .iter()
                .cloned()
                .fold(query, DatastoreQuery::with_filter)),
            QueryAdapter::Sort => {
                if args.order_by.is_empty() {
                    return Ok(query);
                }
                let definition = metadata.index_definition(&query.index)?;
                let sort = args
                    .order_by
                    .iter()
                    .map(|(field, descending)| SortClause {
                        field: definition.field_path(field),
                        direction: if *descending {
                            SortDirection::Desc
                        } else {
                            SortDirection::Asc
                        },
                        missing: None,
                    })
                    .collect();
                Ok(query.with_sort(sort))
            }
            QueryAdapter::Pagination => {
                let mut paginator =
                    Paginator::new(config.default_page_size, config.max_page_size);
                if let Some(first) = args.first {
                    paginator = paginator.with_first(first);
                }
                if let Some(last) = args.last {
                    paginator = paginator.with_last(last);
                }
                if let Some(after) = &args.after {
                    paginator = paginator.with_after(Cursor::decode(after)?);
                }
                if let Some(before) = &args.before {
                    paginator = paginator.with_before(Cursor::decode(before)?);
                }
                Ok(query.with_paginator(paginator))
            }
            QueryAdapter::RequestedFields => match &args.requested_fields {
                RequestedFields::All => Ok(query),
                RequestedFields::Only(fields) => {
                    let definition = metadata.index_definition(&query.index)?;
                    let paths = fields
                        .iter()
                        .map(|field| definition.field_path(field))
                        .collect();
                    Ok(query.with_requested_fields(paths))
                }
            },
            QueryAdapter::Aggregations => {
                let mut query = args
                    .aggregations
                    .iter()
                    .cloned()
                    .fold(query, DatastoreQuery::with_aggregation);
                if args.total_count {
                    query = query.with_total_hits();
                }
                Ok(query)
            }
        }
    }
}

/// Build a query for an index from field arguments by folding the full
/// adapter pipeline.
pub fn build_query(
    index: &str,
    args: &FieldArgs,
    metadata: &Metadata,
    config: &EngineConfig,
) -> Result<DatastoreQuery, Error> {
    let definition = metadata.index_definition(index)?;
    if let Some(cluster) = &config.cluster {
        definition.validate_cluster(cluster)?;
    }
    let seed = DatastoreQuery::new(
        index,
        Paginator::new(config.default_page_size, config.max_page_size),
    );
    ADAPTER_PIPELINE.iter().try_fold(seed, |query, adapter| {
        adapter.apply(query, args, metadata, config)
    })
}

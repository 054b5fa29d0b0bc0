//! Searchgraph Core - Query building, batched execution, and resolution.
//!
//! This crate is the serving layer between a graph query language and an
//! Elasticsearch/OpenSearch-compatible backend: it builds backend queries
//! from field arguments, executes them batched and deduplicated, and decodes
//! the responses into paginated connections and aggregation buckets.

pub mod aggregation;
pub mod config;
pub mod connection;
pub mod context;
pub mod engine;
pub mod error;
pub mod execute;
pub mod metadata;
pub mod query;

pub use aggregation::{
    AggregationQuery, Bucket, BucketPage, BucketStrategy, Computation, ComputationFn, Grouping,
};
pub use config::EngineConfig;
pub use connection::{Connection, Document, Edge, PageInfo};
pub use context::{QuerySignature, RequestContext};
pub use engine::{QueryEngine, Resolved, ResolverKind};
pub use error::Error;
pub use execute::{BatchedSearchSource, DatastoreClient, SearchFuture};
pub use metadata::{IndexDefinition, Metadata, Relationship, SELF_SOURCE, SOURCES_FIELD};
pub use query::{
    build_query, Cursor, DatastoreQuery, FieldArgs, FilterInterpreter, PageWindow, Paginator,
    RequestedFields,
};

/// Re-export protocol types.
pub use searchgraph_proto as proto;

//! Searchgraph protocol types.
//!
//! This crate defines the query IR and wire types shared between the
//! searchgraph resolution engine and an Elasticsearch/OpenSearch-compatible
//! search backend.
//!
//! # Modules
//!
//! - [`filter`] - Client-facing filter expression trees
//! - [`sort`] - Sort clauses and directions
//! - [`request`] - Search request bodies submitted to the backend
//! - [`response`] - Search and multi-search response decoding
//! - [`error`] - Protocol error types
//!
//! # Serialization
//!
//! The search backend speaks a JSON protocol, so all wire types serialize
//! through serde/serde_json. Request bodies are lowered to `serde_json::Value`
//! via [`request::SearchRequest::to_body`] and responses are decoded from the
//! backend's JSON with serde.

pub mod error;
pub mod filter;
pub mod request;
pub mod response;
pub mod sort;

pub use error::Error;

// Re-export commonly used types at crate root
pub use filter::{DistanceUnit, FilterNode, FilterOp};
pub use request::SearchRequest;
pub use response::{Hit, HitsBlock, ItemError, MultiSearchItem, SearchResponse, TotalHits};
pub use sort::{MissingValuePlacement, SortClause, SortDirection};

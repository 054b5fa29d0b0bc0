//! Query execution: the datastore client seam and per-request batching.

mod batch;
mod client;

pub use batch::{BatchedSearchSource, SearchFuture};
pub use client::DatastoreClient;

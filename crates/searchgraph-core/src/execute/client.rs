//! The datastore client seam.

use async_trait::async_trait;

use searchgraph_proto::{MultiSearchItem, SearchRequest};

use crate::error::Error;

/// Transport to a search backend.
///
/// The engine speaks to the backend exclusively through multiplexed search
/// calls, so this is the whole seam: production code puts an HTTP transport
/// behind it, tests put an in-memory interpreter.
#[async_trait]
pub trait DatastoreClient: Send + Sync {
    /// Execute a batch of search requests in one round trip.
    ///
    /// Returns one item per request, in request order. Per-request failures
    /// are carried inline as [`MultiSearchItem::Error`]; an `Err` from this
    /// method means the whole round trip failed.
    async fn multi_search(
        &self,
        requests: Vec<SearchRequest>,
    ) -> Result<Vec<MultiSearchItem>, Error>;
}

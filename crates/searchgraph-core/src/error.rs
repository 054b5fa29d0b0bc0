//! Core error types.

use thiserror::Error;

/// Query resolution errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Protocol error.
    #[error("protocol error: {0}")]
    Proto(#[from] searchgraph_proto::Error),

    /// A client-supplied cursor failed to decode. Client-visible.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// A client-supplied argument was rejected. Client-visible.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The request deadline elapsed before the datastore call completed.
    #[error("datastore request timed out")]
    Timeout,

    /// The datastore reported a failure for this query.
    #[error("datastore error: {0}")]
    Datastore(String),

    /// Metadata referenced an index that does not exist.
    #[error("unknown index '{name}'; known indices: {known:?}")]
    UnknownIndex {
        /// The requested index name.
        name: String,
        /// Valid alternatives.
        known: Vec<String>,
    },

    /// Metadata referenced a cluster that does not exist.
    #[error("unknown cluster '{name}' for index '{index}'; accessible clusters: {known:?}")]
    UnknownCluster {
        /// The requested cluster name.
        name: String,
        /// The index being queried.
        index: String,
        /// Valid alternatives.
        known: Vec<String>,
    },

    /// An aggregation response was missing its bucket-path metadata.
    ///
    /// This indicates a mismatch between the request builder and the
    /// response decoder, not a client mistake.
    #[error("aggregation '{aggregation}' response is missing bucket path metadata")]
    MissingBucketPath {
        /// The aggregation whose response could not be decoded.
        aggregation: String,
    },

    /// A response could not be decoded into the expected shape.
    #[error("malformed datastore response: {0}")]
    MalformedResponse(String),
}

impl Error {
    /// Whether this error should be shown to the requesting client as a
    /// validation problem rather than an internal failure.
    pub fn is_client_visible(&self) -> bool {
        matches!(self, Error::InvalidCursor(_) | Error::InvalidArgument(_))
    }
}

//! Aggregation queries and bucket resolution.
//!
//! This module owns both directions of the aggregation protocol: lowering
//! grouping/computation requests into backend aggregation bodies (tagged
//! with bucket-path metadata), and decoding the response bucket trees back
//! out by following that metadata.

mod buckets;
mod query;

pub use buckets::{extract_buckets, Bucket, BucketPage};
pub use query::{
    AggregationQuery, BucketStrategy, Computation, ComputationFn, Grouping,
};

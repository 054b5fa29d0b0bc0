//! Aggregation response decoding.
//!
//! The decoder never assumes a fixed response shape: it reads the `meta`
//! the request builder attached to each aggregation and follows the
//! recorded bucket path. A missing path is a programmer error (the builder
//! and decoder disagree) and fails loudly.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::error::Error;
use crate::query::Cursor;

use super::query::AggregationQuery;

/// One grouping result of an aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Bucket {
    /// Group key values, keyed by grouping name. Empty for the singleton
    /// bucket of an ungrouped aggregation.
    pub key: BTreeMap<String, Value>,
    /// Number of documents in the bucket, possibly inflated by the
    /// multi-shard error margin.
    pub doc_count: u64,
    /// Upper bound on the count error margin.
    pub doc_count_error_upper_bound: u64,
    /// Computed values, keyed by computation name.
    pub computed: BTreeMap<String, Value>,
    /// Raw response node, for resolving nested sub-aggregations.
    pub raw: Value,
}

impl Bucket {
    /// The count as reported, which may exceed the true count.
    pub fn approximate_count(&self) -> u64 {
        self.doc_count
    }

    /// The largest the true count could be.
    pub fn upper_bound(&self) -> u64 {
        self.doc_count + self.doc_count_error_upper_bound
    }

    /// The exact count, known only when the error margin is zero.
    pub fn exact_count(&self) -> Option<u64> {
        if self.doc_count_error_upper_bound == 0 {
            Some(self.doc_count)
        } else {
            None
        }
    }

    /// A computed value by name.
    pub fn computed(&self, name: &str) -> Option<&Value> {
        self.computed.get(name)
    }

    /// Resolve a nested sub-aggregation's buckets within this bucket.
    pub fn sub_buckets(&self, sub: &AggregationQuery) -> Result<BucketPage, Error> {
        extract_buckets(sub, &self.raw)
    }

    /// The group key values in grouping order, for cursor construction.
    pub fn key_values(&self, grouping_names: &[&str]) -> Vec<Value> {
        grouping_names
            .iter()
            .map(|name| self.key.get(*name).cloned().unwrap_or(Value::Null))
            .collect()
    }

    /// The cursor identifying this bucket within its page.
    ///
    /// The one bucket of an ungrouped aggregation has no key values and
    /// gets the reserved singleton marker.
    pub fn cursor(&self, grouping_names: &[&str]) -> Cursor {
        if grouping_names.is_empty() {
            Cursor::Singleton
        } else {
            Cursor::from_sort_values(self.key_values(grouping_names))
        }
    }
}

/// A decoded page of buckets, with the composite resume token if present.
#[derive(Debug, Clone, PartialEq)]
pub struct BucketPage {
    /// The buckets, in response order.
    pub buckets: Vec<Bucket>,
    /// Composite after-key for resuming group iteration.
    pub after_key: Option<BTreeMap<String, Value>>,
}

impl BucketPage {
    /// The resume cursor for the next page of groups, if the backend
    /// reported one.
    ///
    /// The key values are ordered by the query's groupings, so the cursor
    /// round-trips back into [`AggregationQuery::with_after`].
    pub fn after_cursor(&self, query: &AggregationQuery) -> Option<Cursor> {
        self.after_key.as_ref().map(|key| {
            Cursor::from_sort_values(
                query
                    .grouping_names()
                    .iter()
                    .map(|name| key.get(*name).cloned().unwrap_or(Value::Null))
                    .collect(),
            )
        })
    }
}

/// Decode the buckets for one aggregation from a response's aggregations
/// object (or from an enclosing bucket's raw node).
pub fn extract_buckets(query: &AggregationQuery, aggregations: &Value) -> Result<BucketPage, Error> {
    let node = aggregations.get(&query.name).ok_or_else(|| {
        Error::MalformedResponse(format!(
            "response has no aggregation named '{}'",
            query.name
        ))
    })?;

    let meta = node.get("meta").and_then(Value::as_object);
    let (path, grouped) = match meta {
        Some(meta) => {
            if let Some(path) = meta.get("bucket_path").and_then(Value::as_array) {
                (path, false)
            } else if let Some(path) = meta.get("buckets_path").and_then(Value::as_array) {
                (path, true)
            } else {
                return Err(Error::MissingBucketPath {
                    aggregation: query.name.clone(),
                });
            }
        }
        None => {
            return Err(Error::MissingBucketPath {
                aggregation: query.name.clone(),
            })
        }
    };

    let mut current = node;
    for segment in path {
        let segment = segment.as_str().ok_or_else(|| {
            Error::MalformedResponse(format!(
                "aggregation '{}' has a non-string bucket path segment",
                query.name
            ))
        })?;
        current = current.get(segment).ok_or_else(|| {
            Error::MalformedResponse(format!(
                "aggregation '{}' response is missing bucket path segment '{segment}'",
                query.name
            ))
        })?;
    }

    if grouped {
        let bucket_list = current.as_array().ok_or_else(|| {
            Error::MalformedResponse(format!(
                "aggregation '{}' bucket path does not end at a bucket list",
                query.name
            ))
        })?;
        // The after key lives beside the bucket list on the composite node.
        let after_key = path
            .split_last()
            .map(|(_, parents)| {
                let mut owner = node;
                for segment in parents {
                    if let Some(segment) = segment.as_str() {
                        owner = owner.get(segment).unwrap_or(owner);
                    }
                }
                owner
            })
            .unwrap_or(node)
            .get("after_key")
            .and_then(Value::as_object)
            .map(object_to_map);

        let grouping_names: Vec<String> = query
            .grouping_names()
            .iter()
            .map(|n| n.to_string())
            .collect();
        let mut buckets = Vec::new();
        for raw in bucket_list {
            collect_grouped(query, raw, &grouping_names, BTreeMap::new(), &mut buckets)?;
        }
        Ok(BucketPage { buckets, after_key })
    } else {
        // Ungrouped: the node at the path is itself the one bucket.
        Ok(BucketPage {
            buckets: vec![decode_bucket(query, current, BTreeMap::new())?],
            after_key: None,
        })
    }
}

/// Decode one grouped bucket, descending nested terms levels if the bucket
/// key is a scalar.
fn collect_grouped(
    query: &AggregationQuery,
    raw: &Value,
    grouping_names: &[String],
    mut key: BTreeMap<String, Value>,
    out: &mut Vec<Bucket>,
) -> Result<(), Error> {
    let bucket_key = raw.get("key").cloned().unwrap_or(Value::Null);
    match bucket_key {
        // Composite buckets carry the full key object directly.
        Value::Object(map) => {
            for (name, value) in map {
                key.insert(name, value);
            }
            out.push(decode_bucket(query, raw, key)?);
            Ok(())
        }
        // Terms buckets carry one scalar key per nesting level.
        scalar => {
            let (name, rest) = grouping_names.split_first().ok_or_else(|| {
                Error::MalformedResponse(format!(
                    "aggregation '{}' has more bucket levels than groupings",
                    query.name
                ))
            })?;
            key.insert(name.clone(), scalar);
            if rest.is_empty() {
                out.push(decode_bucket(query, raw, key)?);
                return Ok(());
            }
            let nested = raw
                .get(&rest[0])
                .and_then(|n| n.get("buckets"))
                .and_then(Value::as_array)
                .ok_or_else(|| {
                    Error::MalformedResponse(format!(
                        "aggregation '{}' is missing nested grouping '{}'",
                        query.name, rest[0]
                    ))
                })?;
            for sub in nested {
                collect_grouped(query, sub, rest, key.clone(), out)?;
            }
            Ok(())
        }
    }
}

fn decode_bucket(
    query: &AggregationQuery,
    raw: &Value,
    key: BTreeMap<String, Value>,
) -> Result<Bucket, Error> {
    let doc_count = raw.get("doc_count").and_then(Value::as_u64).unwrap_or(0);
    let error = raw
        .get("doc_count_error_upper_bound")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let mut computed = BTreeMap::new();
    for computation in &query.computations {
        let value = raw
            .get(&computation.name)
            .and_then(|node| node.get("value"))
            .cloned()
            .unwrap_or(Value::Null);
        computed.insert(computation.name.clone(), value);
    }

    Ok(Bucket {
        key,
        doc_count,
        doc_count_error_upper_bound: error,
        computed,
        raw: raw.clone(),
    })
}

fn object_to_map(object: &Map<String, Value>) -> BTreeMap<String, Value> {
    object
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}

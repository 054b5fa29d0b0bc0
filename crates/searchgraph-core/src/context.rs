//! Per-request resolution context.
//!
//! Everything a resolution walk needs travels in one explicit context value:
//! the metadata handle, the deadline (computed once, monotonic), the built
//! query cache, and the batch source. Nothing request-scoped lives in global
//! state.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;

use crate::config::EngineConfig;
use crate::error::Error;
use crate::execute::{BatchedSearchSource, DatastoreClient};
use crate::metadata::Metadata;
use crate::query::{build_query, DatastoreQuery, FieldArgs, RequestedFields};

/// Fingerprint of one (index, field arguments) pair.
///
/// Filters and aggregations carry arbitrary JSON values, which have no
/// `Hash`; they contribute through their serialized form instead. The
/// fingerprint covers values as well as structure, because the cached
/// artifact is the fully built query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct QuerySignature {
    hash: u64,
}

impl QuerySignature {
    /// Compute the signature for an index and its field arguments.
    pub fn new(index: &str, args: &FieldArgs) -> Self {
        let mut hasher = DefaultHasher::new();
        index.hash(&mut hasher);
        for filter in &args.filters {
            // Serialization of a filter tree is deterministic; enum variant
            // tags make distinct operators hash apart.
            serde_json::to_string(filter)
                .unwrap_or_default()
                .hash(&mut hasher);
        }
        args.order_by.hash(&mut hasher);
        args.first.hash(&mut hasher);
        args.after.hash(&mut hasher);
        args.last.hash(&mut hasher);
        args.before.hash(&mut hasher);
        match &args.requested_fields {
            RequestedFields::All => 0u8.hash(&mut hasher),
            RequestedFields::Only(fields) => {
                1u8.hash(&mut hasher);
                fields.hash(&mut hasher);
            }
        }
        args.total_count.hash(&mut hasher);
        for aggregation in &args.aggregations {
            format!("{aggregation:?}").hash(&mut hasher);
        }
        Self {
            hash: hasher.finish(),
        }
    }
}

/// State for one resolution walk.
pub struct RequestContext {
    /// Schema metadata, shared with the engine.
    pub metadata: Arc<Metadata>,
    /// Engine configuration snapshot.
    pub config: EngineConfig,
    /// Deadline for the whole walk, fixed at context creation.
    pub deadline: Instant,
    /// Batch source collecting this walk's queries.
    pub batch: BatchedSearchSource,
    built: Mutex<HashMap<QuerySignature, DatastoreQuery>>,
}

impl RequestContext {
    /// Start a context; the deadline clock starts now.
    pub fn new(
        metadata: Arc<Metadata>,
        client: Arc<dyn DatastoreClient>,
        config: EngineConfig,
    ) -> Self {
        let deadline = Instant::now() + config.request_timeout;
        let batch = BatchedSearchSource::new(client, metadata.clone());
        Self {
            metadata,
            config,
            deadline,
            batch,
            built: Mutex::new(HashMap::new()),
        }
    }

    /// Build the query for an index and field arguments, memoized for the
    /// lifetime of this context.
    ///
    /// Repeated resolver calls with identical arguments (common when many
    /// parents fan out to the same child query) reuse the built value, and
    /// equal built queries then collapse in the batch as well.
    pub fn build_query(&self, index: &str, args: &FieldArgs) -> Result<DatastoreQuery, Error> {
        let signature = QuerySignature::new(index, args);
        if let Some(query) = self.built.lock().get(&signature) {
            return Ok(query.clone());
        }
        let query = build_query(index, args, &self.metadata, &self.config)?
            .with_deadline(self.deadline);
        self.built.lock().insert(signature, query.clone());
        Ok(query)
    }

    /// Time left before the deadline, if any.
    pub fn remaining(&self) -> Option<std::time::Duration> {
        let now = Instant::now();
        (now < self.deadline).then(|| self.deadline - now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execute::DatastoreClient;
    use crate::metadata::IndexDefinition;
    use async_trait::async_trait;
    use searchgraph_proto::{FilterNode, MultiSearchItem, SearchRequest, SortClause};

    struct NullClient;

    #[async_trait]
    impl DatastoreClient for NullClient {
        async fn multi_search(
            &self,
            requests: Vec<SearchRequest>,
        ) -> Result<Vec<MultiSearchItem>, Error> {
            Ok(requests
                .iter()
                .map(|_| MultiSearchItem::Response(searchgraph_proto::SearchResponse::empty()))
                .collect())
        }
    }

    fn context() -> RequestContext {
        let metadata = Arc::new(
            Metadata::new().with_index(
                IndexDefinition::new("widgets")
                    .with_default_sort(vec![SortClause::asc("id")]),
            ),
        );
        RequestContext::new(metadata, Arc::new(NullClient), EngineConfig::default())
    }

    #[test]
    fn test_signature_distinguishes_filter_values() {
        let a = FieldArgs {
            filters: vec![FilterNode::eq("name", "alpha")],
            ..FieldArgs::new()
        };
        let b = FieldArgs {
            filters: vec![FilterNode::eq("name", "beta")],
            ..FieldArgs::new()
        };
        assert_ne!(
            QuerySignature::new("widgets", &a),
            QuerySignature::new("widgets", &b)
        );
    }

    #[test]
    fn test_signature_distinguishes_indices() {
        let args = FieldArgs::new();
        assert_ne!(
            QuerySignature::new("widgets", &args),
            QuerySignature::new("components", &args)
        );
    }

    #[test]
    fn test_signature_stable_for_equal_args() {
        let args = FieldArgs {
            filters: vec![FilterNode::gt("yearFormed", 2000)],
            first: Some(3),
            total_count: true,
            ..FieldArgs::new()
        };
        assert_eq!(
            QuerySignature::new("widgets", &args),
            QuerySignature::new("widgets", &args)
        );
    }

    #[test]
    fn test_built_queries_are_memoized_and_carry_the_deadline() {
        let ctx = context();
        let args = FieldArgs {
            first: Some(2),
            ..FieldArgs::new()
        };
        let a = ctx.build_query("widgets", &args).unwrap();
        let b = ctx.build_query("widgets", &args).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.deadline, Some(ctx.deadline));
    }

    #[test]
    fn test_remaining_counts_down_from_timeout() {
        let ctx = context();
        let remaining = ctx.remaining().unwrap();
        assert!(remaining <= ctx.config.request_timeout);
    }
}

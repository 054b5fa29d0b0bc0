//! The query engine and its resolution walk.
//!
//! The engine is the long-lived object: metadata, client, configuration.
//! Each incoming request gets a fresh [`RequestContext`], and resolution
//! proceeds as a cooperative walk that registers queries with the context's
//! batch source and flushes them in as few backend round trips as possible.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use searchgraph_proto::{FilterNode, SearchResponse};

use crate::aggregation::Bucket;
use crate::config::EngineConfig;
use crate::connection::{Connection, Document};
use crate::context::RequestContext;
use crate::error::Error;
use crate::execute::DatastoreClient;
use crate::metadata::Metadata;
use crate::query::{DatastoreQuery, FieldArgs};

/// What a resolver call is asking for.
///
/// The set is closed on purpose: dispatch is a `match`, and a new resolution
/// shape means a new variant the compiler tracks through every handler.
#[derive(Debug, Clone, Copy)]
pub enum ResolverKind<'a> {
    /// A document connection over an index.
    Documents {
        /// The queried index.
        index: &'a str,
    },
    /// An aggregation connection over an index.
    Aggregations {
        /// The queried index.
        index: &'a str,
    },
    /// Documents related to a parent through a named relationship.
    Relationship {
        /// The parent document.
        parent: &'a Document,
        /// Relationship name.
        name: &'a str,
    },
}

/// The result of one resolver dispatch.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    /// A page of documents.
    Documents(Connection<Document>),
    /// Assembled bucket connections, by aggregation name.
    Aggregations(HashMap<String, Connection<Bucket>>),
}

/// The long-lived query-serving engine.
pub struct QueryEngine {
    metadata: Arc<Metadata>,
    client: Arc<dyn DatastoreClient>,
    config: EngineConfig,
}

impl QueryEngine {
    /// Create an engine with default configuration.
    pub fn new(metadata: Arc<Metadata>, client: Arc<dyn DatastoreClient>) -> Self {
        Self::with_config(metadata, client, EngineConfig::default())
    }

    /// Create an engine with explicit configuration.
    pub fn with_config(
        metadata: Arc<Metadata>,
        client: Arc<dyn DatastoreClient>,
        config: EngineConfig,
    ) -> Self {
        Self {
            metadata,
            client,
            config,
        }
    }

    /// The engine's metadata handle.
    pub fn metadata(&self) -> &Arc<Metadata> {
        &self.metadata
    }

    /// Start a context for one incoming request.
    pub fn request_context(&self) -> RequestContext {
        RequestContext::new(
            self.metadata.clone(),
            self.client.clone(),
            self.config.clone(),
        )
    }

    /// Dispatch one resolver call.
    pub async fn resolve(
        &self,
        ctx: &RequestContext,
        kind: ResolverKind<'_>,
        args: &FieldArgs,
    ) -> Result<Resolved, Error> {
        match kind {
            ResolverKind::Documents { index } => self
                .resolve_documents(ctx, index, args)
                .await
                .map(Resolved::Documents),
            ResolverKind::Aggregations { index } => self
                .resolve_aggregations(ctx, index, args)
                .await
                .map(Resolved::Aggregations),
            ResolverKind::Relationship { parent, name } => self
                .resolve_relationship(ctx, parent, name, args)
                .await
                .map(Resolved::Documents),
        }
    }

    /// Resolve a document connection over an index.
    pub async fn resolve_documents(
        &self,
        ctx: &RequestContext,
        index: &str,
        args: &FieldArgs,
    ) -> Result<Connection<Document>, Error> {
        let query = ctx.build_query(index, args)?;
        let response = self.execute(ctx, query.clone()).await?;

        let total_count = match &response.hits.total {
            Some(total) if query.total_hits_requested && total.relation == "eq" => {
                Some(total.value)
            }
            _ => None,
        };
        let documents: Vec<Document> = response
            .hits
            .hits
            .into_iter()
            .map(Document::from_hit)
            .collect();
        debug!(index, fetched = documents.len(), "resolved document window");

        let sort = query.effective_sort(&ctx.metadata)?;
        let window = query
            .paginator
            .paginate(documents, &sort, |doc| doc.sort_values.as_slice());
        Ok(Connection::from_documents(window, total_count))
    }

    /// Resolve aggregations over an index, returning bucket connections
    /// keyed by aggregation name.
    pub async fn resolve_aggregations(
        &self,
        ctx: &RequestContext,
        index: &str,
        args: &FieldArgs,
    ) -> Result<HashMap<String, Connection<Bucket>>, Error> {
        if args.aggregations.is_empty() {
            return Err(Error::InvalidArgument(
                "aggregation resolution requires at least one aggregation".to_string(),
            ));
        }
        let query = ctx.build_query(index, args)?.without_documents();
        let response = self.execute(ctx, query.clone()).await?;

        let aggregations = response.aggregations.ok_or_else(|| {
            Error::MalformedResponse("response carried no aggregations section".to_string())
        })?;
        let mut connections = HashMap::with_capacity(query.aggregations.len());
        for aggregation in &query.aggregations {
            let page = crate::aggregation::extract_buckets(aggregation, &aggregations)?;
            connections.insert(
                aggregation.name.clone(),
                Connection::from_buckets(page, aggregation),
            );
        }
        Ok(connections)
    }

    /// Resolve documents related to a parent through a named relationship.
    ///
    /// Builds a child query filtered by the parent's id on the relationship's
    /// foreign key. Sibling parents that produce identical child queries
    /// collapse in the batch source.
    pub async fn resolve_relationship(
        &self,
        ctx: &RequestContext,
        parent: &Document,
        name: &str,
        args: &FieldArgs,
    ) -> Result<Connection<Document>, Error> {
        let relationship = ctx.metadata.relationship(name)?;
        let mut child_args = args.clone();
        child_args.filters.push(FilterNode::eq(
            relationship.foreign_key.clone(),
            parent.id.clone(),
        ));
        let target_index = relationship.target_index.clone();
        self.resolve_documents(ctx, &target_index, &child_args).await
    }

    /// Submit one query and drive the batch to completion.
    ///
    /// A resolver that needs several queries can submit them all against
    /// `ctx.batch` itself and flush once; this is the single-query path.
    async fn execute(
        &self,
        ctx: &RequestContext,
        query: DatastoreQuery,
    ) -> Result<SearchResponse, Error> {
        if ctx.remaining().is_none() {
            return Err(Error::Timeout);
        }
        let future = ctx.batch.submit(query);
        if let Err(error) = ctx.batch.flush().await {
            // The same error already reached this query's waiter; the
            // resolved future below carries it to the caller.
            warn!(%error, "search batch failed");
        }
        future.resolve().await
    }
}

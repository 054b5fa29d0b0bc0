//! Runtime metadata supplied by the schema artifacts.
//!
//! The engine consumes this metadata read-only: index definitions (field
//! name mappings, default sorts, accessible clusters) and relationship
//! descriptors. It is produced by an external schema compiler and loaded
//! once at startup.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use searchgraph_proto::SortClause;

use crate::error::Error;

/// The reserved source name a document's own index writer uses.
///
/// Multi-source indices tag each document with the sources that have
/// written to it; a document missing the self source is incomplete.
pub const SELF_SOURCE: &str = "__self";

/// The reserved index field listing which sources populated a document.
pub const SOURCES_FIELD: &str = "__sources";

/// Read-only runtime metadata for all queryable indices.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    indices: HashMap<String, IndexDefinition>,
    relationships: HashMap<String, Relationship>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an index definition.
    pub fn with_index(mut self, definition: IndexDefinition) -> Self {
        self.indices.insert(definition.name.clone(), definition);
        self
    }

    /// Register a relationship descriptor.
    pub fn with_relationship(mut self, relationship: Relationship) -> Self {
        self.relationships
            .insert(relationship.name.clone(), relationship);
        self
    }

    /// Look up an index definition by name.
    ///
    /// Unknown names are rejected with an error listing the valid
    /// alternatives, so schema/runtime mismatches surface at query-build
    /// time rather than as a failed datastore call.
    pub fn index_definition(&self, name: &str) -> Result<&IndexDefinition, Error> {
        self.indices.get(name).ok_or_else(|| {
            let mut known: Vec<String> = self.indices.keys().cloned().collect();
            known.sort();
            Error::UnknownIndex {
                name: name.to_string(),
                known,
            }
        })
    }

    /// Look up a relationship descriptor by name.
    pub fn relationship(&self, name: &str) -> Result<&Relationship, Error> {
        self.relationships
            .get(name)
            .ok_or_else(|| Error::InvalidArgument(format!("unknown relationship '{name}'")))
    }

    /// Names of all registered indices.
    pub fn index_names(&self) -> Vec<&str> {
        self.indices.keys().map(String::as_str).collect()
    }
}

/// Definition of one queryable index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDefinition {
    /// Index name (also the name or pattern submitted to the backend).
    pub name: String,
    /// Clusters this index is accessible on.
    pub clusters: Vec<String>,
    /// Sort applied when the client supplies no `orderBy`.
    pub default_sort: Vec<SortClause>,
    /// Logical field path to index field path mapping.
    ///
    /// Paths absent from the map pass through unchanged.
    pub fields: HashMap<String, String>,
    /// Sources that write into this index. More than one means documents
    /// can exist in a partially-written state.
    pub sources: Vec<String>,
}

impl IndexDefinition {
    /// Create a single-source index definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            clusters: vec!["main".to_string()],
            default_sort: vec![],
            fields: HashMap::new(),
            sources: vec![SELF_SOURCE.to_string()],
        }
    }

    /// Set the accessible clusters.
    pub fn with_clusters(mut self, clusters: Vec<String>) -> Self {
        self.clusters = clusters;
        self
    }

    /// Set the default sort clauses.
    pub fn with_default_sort(mut self, sort: Vec<SortClause>) -> Self {
        self.default_sort = sort;
        self
    }

    /// Map a logical field path to a different index field path.
    pub fn with_field(mut self, logical: impl Into<String>, indexed: impl Into<String>) -> Self {
        self.fields.insert(logical.into(), indexed.into());
        self
    }

    /// Set the populating sources.
    pub fn with_sources(mut self, sources: Vec<String>) -> Self {
        self.sources = sources;
        self
    }

    /// Whether documents in this index are assembled from multiple sources.
    pub fn multi_sourced(&self) -> bool {
        self.sources.len() > 1
    }

    /// Resolve a logical field path to the index field path.
    pub fn field_path(&self, logical: &str) -> String {
        self.fields
            .get(logical)
            .cloned()
            .unwrap_or_else(|| logical.to_string())
    }

    /// Verify a cluster name is accessible for this index.
    pub fn validate_cluster(&self, cluster: &str) -> Result<(), Error> {
        if self.clusters.iter().any(|c| c == cluster) {
            Ok(())
        } else {
            Err(Error::UnknownCluster {
                name: cluster.to_string(),
                index: self.name.clone(),
                known: self.clusters.clone(),
            })
        }
    }
}

/// A relationship between a parent document and documents in another index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Relationship {
    /// Relationship name as exposed to clients.
    pub name: String,
    /// Index holding the related documents.
    pub target_index: String,
    /// Logical field on the target documents holding the parent's id.
    pub foreign_key: String,
}

impl Relationship {
    /// Create a relationship descriptor.
    pub fn new(
        name: impl Into<String>,
        target_index: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            target_index: target_index.into(),
            foreign_key: foreign_key.into(),
        }
    }
}

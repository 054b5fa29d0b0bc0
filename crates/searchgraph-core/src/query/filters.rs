//! Filter interpretation.
//!
//! Translates client filter trees into backend boolean clauses, and computes
//! the null-inclusion classification used to decide whether the automatic
//! incomplete-record exclusion clause can be skipped.

use serde_json::{json, Value};

use searchgraph_proto::{FilterNode, FilterOp};

use crate::error::Error;
use crate::metadata::IndexDefinition;

/// Whether a filter's accepted-value set includes the null value.
///
/// A tiny closed algebra: `union` for OR branches, `intersect` for AND
/// branches, `negate` for NOT.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NullInclusion {
    /// Null (or an absent field) can satisfy the filter.
    IncludesNull,
    /// Null can never satisfy the filter.
    ExcludesNull,
}

impl NullInclusion {
    /// OR of two branches: null is accepted if either branch accepts it.
    pub fn union(self, other: Self) -> Self {
        if self == Self::IncludesNull || other == Self::IncludesNull {
            Self::IncludesNull
        } else {
            Self::ExcludesNull
        }
    }

    /// AND of two branches: null is accepted only if both branches accept it.
    pub fn intersect(self, other: Self) -> Self {
        if self == Self::IncludesNull && other == Self::IncludesNull {
            Self::IncludesNull
        } else {
            Self::ExcludesNull
        }
    }

    /// Complement: what the filter rejects, it now accepts.
    pub fn negate(self) -> Self {
        match self {
            Self::IncludesNull => Self::ExcludesNull,
            Self::ExcludesNull => Self::IncludesNull,
        }
    }
}

/// Translates filter trees against one index's field mappings.
pub struct FilterInterpreter<'a> {
    index: &'a IndexDefinition,
}

impl<'a> FilterInterpreter<'a> {
    /// Create an interpreter for an index.
    pub fn new(index: &'a IndexDefinition) -> Self {
        Self { index }
    }

    /// Resolve a logical field path to the index field path.
    pub fn index_field_path(&self, logical: &str) -> String {
        self.index.field_path(logical)
    }

    /// Translate each filter to a backend clause.
    ///
    /// Filters that constrain nothing (for example an empty `allOf`) are
    /// omitted rather than erroring, favoring a broader match.
    pub fn to_clauses(&self, filters: &[FilterNode]) -> Result<Vec<Value>, Error> {
        let mut clauses = Vec::with_capacity(filters.len());
        for filter in filters {
            if let Some(clause) = self.translate(filter, &[])? {
                clauses.push(clause);
            }
        }
        Ok(clauses)
    }

    /// Translate one node at a field path. `None` means unconstrained.
    fn translate(&self, node: &FilterNode, path: &[&str]) -> Result<Option<Value>, Error> {
        match node {
            FilterNode::AllOf(subs) => {
                let mut clauses = Vec::with_capacity(subs.len());
                for sub in subs {
                    if let Some(clause) = self.translate(sub, path)? {
                        clauses.push(clause);
                    }
                }
                Ok(match clauses.len() {
                    0 => None,
                    // A one-element conjunction is a no-op wrapper; the outer
                    // protocol's list coercion produces these routinely.
                    1 => clauses.pop(),
                    _ => Some(json!({ "bool": { "filter": clauses } })),
                })
            }
            FilterNode::AnyOf(subs) => {
                if subs.is_empty() {
                    // An empty disjunction matches no documents.
                    return Ok(Some(json!({ "match_none": {} })));
                }
                let mut clauses = Vec::with_capacity(subs.len());
                for sub in subs {
                    match self.translate(sub, path)? {
                        Some(clause) => clauses.push(clause),
                        // One unconstrained branch makes the whole OR
                        // unconstrained.
                        None => return Ok(None),
                    }
                }
                Ok(match clauses.len() {
                    1 => clauses.pop(),
                    _ => Some(json!({
                        "bool": { "should": clauses, "minimum_should_match": 1 }
                    })),
                })
            }
            FilterNode::Not(sub) => Ok(match self.translate(sub, path)? {
                Some(clause) => Some(json!({ "bool": { "must_not": [clause] } })),
                // NOT of an unconstrained filter matches nothing.
                None => Some(json!({ "match_none": {} })),
            }),
            FilterNode::Field { name, filter } => {
                let mut extended = path.to_vec();
                extended.push(name.as_str());
                self.translate(filter, &extended)
            }
            FilterNode::Op(op) => self.translate_op(op, path),
        }
    }

    fn translate_op(&self, op: &FilterOp, path: &[&str]) -> Result<Option<Value>, Error> {
        if path.is_empty() {
            // An operator with no field to apply to constrains nothing.
            tracing::warn!(?op, "filter operator without a field path; ignoring");
            return Ok(None);
        }
        let field = self.index.field_path(&path.join("."));
        let clause = match op {
            FilterOp::EqualToAnyOf(values) => {
                let non_null: Vec<&Value> = values.iter().filter(|v| !v.is_null()).collect();
                let has_null = non_null.len() < values.len();
                let terms = json!({ "terms": { field.clone(): non_null } });
                let missing = json!({
                    "bool": { "must_not": [{ "exists": { "field": field.clone() } }] }
                });
                match (non_null.is_empty(), has_null) {
                    (true, true) => missing,
                    (false, true) => json!({
                        "bool": { "should": [terms, missing], "minimum_should_match": 1 }
                    }),
                    _ => terms,
                }
            }
            FilterOp::Gt(value) => json!({ "range": { field: { "gt": value } } }),
            FilterOp::Gte(value) => json!({ "range": { field: { "gte": value } } }),
            FilterOp::Lt(value) => json!({ "range": { field: { "lt": value } } }),
            FilterOp::Lte(value) => json!({ "range": { field: { "lte": value } } }),
            // List elements live at the same field path in the index, so the
            // element filter translates in place.
            FilterOp::AnySatisfy(inner) => return self.translate(inner, path),
            FilterOp::Matches {
                query,
                allowed_edits_per_term,
            } => {
                let mut options = json!({ "query": query });
                if let Some(edits) = allowed_edits_per_term {
                    options["fuzziness"] = json!(edits);
                }
                json!({ "match": { field: options } })
            }
            FilterOp::Near {
                latitude,
                longitude,
                max_distance,
                unit,
            } => json!({
                "geo_distance": {
                    "distance": format!("{max_distance}{}", unit.wire_suffix()),
                    field: { "lat": latitude, "lon": longitude }
                }
            }),
            FilterOp::TimeOfDay {
                gte,
                lte,
                equal_to_any_of,
                time_zone,
            } => {
                if gte.is_none() && lte.is_none() && equal_to_any_of.is_empty() {
                    return Ok(None);
                }
                json!({
                    "script": {
                        "script": {
                            "id": "filter_time_of_day",
                            "params": {
                                "field": field,
                                "gte": gte,
                                "lte": lte,
                                "equal_to_any_of": equal_to_any_of,
                                "time_zone": time_zone
                            }
                        }
                    }
                })
            }
        };
        Ok(Some(clause))
    }
}

/// Combine translated clauses into one backend query.
pub fn bool_filter_query(clauses: Vec<Value>) -> Value {
    if clauses.is_empty() {
        json!({ "match_all": {} })
    } else {
        json!({ "bool": { "filter": clauses } })
    }
}

/// Null inclusion of a whole filter tree.
pub fn null_inclusion(node: &FilterNode) -> NullInclusion {
    match node {
        // An empty conjunction constrains nothing, so null records pass.
        FilterNode::AllOf(subs) => subs
            .iter()
            .map(null_inclusion)
            .fold(NullInclusion::IncludesNull, NullInclusion::intersect),
        // An empty disjunction matches nothing, null included.
        FilterNode::AnyOf(subs) => subs
            .iter()
            .map(null_inclusion)
            .fold(NullInclusion::ExcludesNull, NullInclusion::union),
        FilterNode::Not(sub) => null_inclusion(sub).negate(),
        FilterNode::Field { filter, .. } => null_inclusion(filter),
        FilterNode::Op(op) => op_null_inclusion(op),
    }
}

fn op_null_inclusion(op: &FilterOp) -> NullInclusion {
    match op {
        FilterOp::EqualToAnyOf(values) => {
            if values.iter().any(Value::is_null) {
                NullInclusion::IncludesNull
            } else {
                NullInclusion::ExcludesNull
            }
        }
        // A null or absent field can never satisfy a comparison, list,
        // full-text, geo, or time-of-day operator.
        FilterOp::Gt(_)
        | FilterOp::Gte(_)
        | FilterOp::Lt(_)
        | FilterOp::Lte(_)
        | FilterOp::AnySatisfy(_)
        | FilterOp::Matches { .. }
        | FilterOp::Near { .. }
        | FilterOp::TimeOfDay { .. } => NullInclusion::ExcludesNull,
    }
}

/// Whether a set of filters (combined with AND) guarantees that incomplete
/// multi-source records are already excluded.
///
/// True when the combined accepted-value set excludes null: a record missing
/// a filtered field can never match, so the automatic exclusion clause is
/// redundant.
pub fn excludes_incomplete_docs(filters: &[FilterNode]) -> bool {
    if filters.is_empty() {
        return false;
    }
    filters
        .iter()
        .map(null_inclusion)
        .fold(NullInclusion::IncludesNull, NullInclusion::intersect)
        == NullInclusion::ExcludesNull
}

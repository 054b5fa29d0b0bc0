//! Aggregation sub-queries and their request bodies.
//!
//! An aggregation query describes groupings, computed values, and nested
//! sub-aggregations. Lowering chooses one of two bucket-collection
//! strategies from the query shape and tags the request's `meta` with the
//! path at which the response's real bucket data will be found; the
//! response decoder follows that indirection rather than assuming a shape.

use serde_json::{json, Map, Value};

use searchgraph_proto::FilterNode;

use crate::error::Error;
use crate::query::filters::{bool_filter_query, FilterInterpreter};
use crate::query::Cursor;

/// How bucket data is collected for an aggregation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BucketStrategy {
    /// No groupings: a single bucket covering every matching document.
    Ungrouped,
    /// Grouped with resumable iteration via an after-token.
    Composite,
    /// Grouped with a fixed, non-paginated bucket set (nested terms).
    NonComposite,
}

/// A computed value over the documents of a bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputationFn {
    /// Minimum field value.
    Min,
    /// Maximum field value.
    Max,
    /// Arithmetic mean.
    Avg,
    /// Sum of field values.
    Sum,
}

impl ComputationFn {
    fn wire_name(self) -> &'static str {
        match self {
            ComputationFn::Min => "min",
            ComputationFn::Max => "max",
            ComputationFn::Avg => "avg",
            ComputationFn::Sum => "sum",
        }
    }
}

/// One requested computed value.
#[derive(Debug, Clone, PartialEq)]
pub struct Computation {
    /// Name the value is exposed under.
    pub name: String,
    /// Logical field to compute over.
    pub field: String,
    /// The function to apply.
    pub function: ComputationFn,
}

impl Computation {
    /// Create a computation.
    pub fn new(
        name: impl Into<String>,
        field: impl Into<String>,
        function: ComputationFn,
    ) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
            function,
        }
    }
}

/// One grouping dimension.
#[derive(Debug, Clone, PartialEq)]
pub struct Grouping {
    /// Name the group key is exposed under.
    pub name: String,
    /// Logical field to group by.
    pub field: String,
}

impl Grouping {
    /// Create a grouping.
    pub fn new(name: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field: field.into(),
        }
    }
}

/// An aggregation sub-query attached to a datastore query.
#[derive(Debug, Clone, PartialEq)]
pub struct AggregationQuery {
    /// Name of this aggregation in the request and response.
    pub name: String,
    /// Grouping dimensions, outermost first.
    pub groupings: Vec<Grouping>,
    /// Computed values per bucket.
    pub computations: Vec<Computation>,
    /// Nested sub-aggregations, resolved per bucket.
    pub sub_aggregations: Vec<AggregationQuery>,
    /// Optional re-filter restricting which documents aggregate.
    pub filter: Option<FilterNode>,
    /// Number of group buckets to collect.
    pub size: u32,
    /// Resume cursor from a previous page of groups, carrying one value per
    /// grouping in grouping order.
    pub after: Option<Cursor>,
    /// Whether group pagination was requested, forcing the composite
    /// strategy.
    pub paginate_groups: bool,
    /// Whether the per-bucket count error bound should be reported.
    pub needs_doc_count_error: bool,
}

impl AggregationQuery {
    /// Create an ungrouped aggregation.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            groupings: vec![],
            computations: vec![],
            sub_aggregations: vec![],
            filter: None,
            size: 50,
            after: None,
            paginate_groups: false,
            needs_doc_count_error: false,
        }
    }

    /// Add a grouping dimension.
    pub fn with_grouping(mut self, grouping: Grouping) -> Self {
        self.groupings.push(grouping);
        self
    }

    /// Add a computed value.
    pub fn with_computation(mut self, computation: Computation) -> Self {
        self.computations.push(computation);
        self
    }

    /// Add a nested sub-aggregation.
    pub fn with_sub_aggregation(mut self, sub: AggregationQuery) -> Self {
        self.sub_aggregations.push(sub);
        self
    }

    /// Set a re-filter on the aggregated documents.
    pub fn with_filter(mut self, filter: FilterNode) -> Self {
        self.filter = Some(filter);
        self
    }

    /// Set the group bucket count.
    pub fn with_size(mut self, size: u32) -> Self {
        self.size = size;
        self
    }

    /// Resume group iteration after a cursor from a previous page.
    pub fn with_after(mut self, after: Cursor) -> Self {
        self.after = Some(after);
        self.paginate_groups = true;
        self
    }

    /// Request resumable group pagination.
    pub fn with_group_pagination(mut self) -> Self {
        self.paginate_groups = true;
        self
    }

    /// Request per-bucket count error bounds.
    pub fn with_doc_count_error(mut self) -> Self {
        self.needs_doc_count_error = true;
        self
    }

    /// The bucket-collection strategy this query shape requires.
    pub fn strategy(&self) -> BucketStrategy {
        if self.groupings.is_empty() {
            BucketStrategy::Ungrouped
        } else if self.paginate_groups || self.after.is_some() {
            BucketStrategy::Composite
        } else {
            BucketStrategy::NonComposite
        }
    }

    /// Names of the grouping dimensions, outermost first.
    pub fn grouping_names(&self) -> Vec<&str> {
        self.groupings.iter().map(|g| g.name.as_str()).collect()
    }

    /// The name of the wrapper level introduced by a re-filter.
    pub fn filtered_name(&self) -> String {
        format!("{}:filtered", self.name)
    }

    /// The name of the grouping level when it sits under a filter wrapper.
    fn grouped_name(&self) -> String {
        format!("{}:grouped", self.name)
    }

    /// Lower this aggregation to its request body entry.
    ///
    /// Returns the `(name, body)` pair to place in the parent's `aggs` map.
    pub fn to_agg_body(&self, interpreter: &FilterInterpreter<'_>) -> Result<(String, Value), Error> {
        let inner = self.inner_aggs(interpreter)?;
        let filter_clauses = match &self.filter {
            Some(filter) => Some(interpreter.to_clauses(std::slice::from_ref(filter))?),
            None => None,
        };

        let body = match self.strategy() {
            BucketStrategy::Ungrouped => self.ungrouped_body(inner, filter_clauses, interpreter)?,
            BucketStrategy::Composite => self.composite_body(inner, filter_clauses, interpreter)?,
            BucketStrategy::NonComposite => {
                self.non_composite_body(inner, filter_clauses, interpreter)?
            }
        };
        Ok((self.name.clone(), body))
    }

    /// Computed values and sub-aggregations shared by all strategies.
    fn inner_aggs(&self, interpreter: &FilterInterpreter<'_>) -> Result<Map<String, Value>, Error> {
        let mut aggs = Map::new();
        for computation in &self.computations {
            let field = interpreter.index_field_path(&computation.field);
            aggs.insert(
                computation.name.clone(),
                json!({ computation.function.wire_name(): { "field": field } }),
            );
        }
        for sub in &self.sub_aggregations {
            let (name, body) = sub.to_agg_body(interpreter)?;
            aggs.insert(name, body);
        }
        Ok(aggs)
    }

    fn ungrouped_body(
        &self,
        inner: Map<String, Value>,
        filter_clauses: Option<Vec<Value>>,
        _interpreter: &FilterInterpreter<'_>,
    ) -> Result<Value, Error> {
        // The outer node always exists (an unfiltered match-all filter agg)
        // so the meta has a stable place to live. A re-filter introduces an
        // inner level holding the real, re-filtered bucket; the meta's
        // bucket_path records that extra hop.
        match filter_clauses {
            Some(clauses) => {
                let filtered = self.filtered_name();
                let mut inner_node = json!({ "filter": bool_filter_query(clauses) });
                if !inner.is_empty() {
                    inner_node["aggs"] = Value::Object(inner);
                }
                Ok(json!({
                    "filter": { "match_all": {} },
                    "meta": { "bucket_path": [filtered.clone()] },
                    "aggs": { filtered: inner_node }
                }))
            }
            None => {
                let mut node = json!({
                    "filter": { "match_all": {} },
                    "meta": { "bucket_path": [] }
                });
                if !inner.is_empty() {
                    node["aggs"] = Value::Object(inner);
                }
                Ok(node)
            }
        }
    }

    fn composite_body(
        &self,
        inner: Map<String, Value>,
        filter_clauses: Option<Vec<Value>>,
        interpreter: &FilterInterpreter<'_>,
    ) -> Result<Value, Error> {
        let sources: Vec<Value> = self
            .groupings
            .iter()
            .map(|grouping| {
                let field = interpreter.index_field_path(&grouping.field);
                json!({ grouping.name.clone(): { "terms": { "field": field } } })
            })
            .collect();

        let mut composite = json!({ "size": self.size, "sources": sources });
        if let Some(after) = &self.after {
            composite["after"] = Value::Object(self.after_object(after)?);
        }
        let mut grouped = json!({ "composite": composite });
        if !inner.is_empty() {
            grouped["aggs"] = Value::Object(inner);
        }

        match filter_clauses {
            Some(clauses) => {
                let grouped_name = self.grouped_name();
                Ok(json!({
                    "filter": bool_filter_query(clauses),
                    "meta": {
                        "buckets_path": [grouped_name.clone(), "buckets"],
                        "grouping_names": self.grouping_names(),
                    },
                    "aggs": { grouped_name: grouped }
                }))
            }
            None => {
                grouped["meta"] = json!({
                    "buckets_path": ["buckets"],
                    "grouping_names": self.grouping_names(),
                });
                Ok(grouped)
            }
        }
    }

    /// Rebuild the composite `after` object from a resume cursor.
    ///
    /// The cursor must carry exactly one value per grouping; the singleton
    /// marker and wrong arities are client errors.
    fn after_object(&self, cursor: &Cursor) -> Result<Map<String, Value>, Error> {
        let values = cursor.sort_values().ok_or_else(|| {
            Error::InvalidCursor(
                "a grouped aggregation cannot resume from the singleton cursor".to_string(),
            )
        })?;
        if values.len() != self.groupings.len() {
            return Err(Error::InvalidCursor(format!(
                "cursor carries {} values but the aggregation has {} groupings",
                values.len(),
                self.groupings.len()
            )));
        }
        Ok(self
            .groupings
            .iter()
            .zip(values)
            .map(|(grouping, value)| (grouping.name.clone(), value.clone()))
            .collect())
    }

    fn non_composite_body(
        &self,
        inner: Map<String, Value>,
        filter_clauses: Option<Vec<Value>>,
        interpreter: &FilterInterpreter<'_>,
    ) -> Result<Value, Error> {
        // Nested terms aggregations, innermost grouping carrying the
        // computed values; the decoder flattens the nesting back out.
        let mut node: Option<Value> = if inner.is_empty() {
            None
        } else {
            Some(Value::Object(inner))
        };
        for (depth, grouping) in self.groupings.iter().enumerate().rev() {
            let field = interpreter.index_field_path(&grouping.field);
            let mut terms = json!({
                "terms": {
                    "field": field,
                    "size": self.size,
                    "show_term_doc_count_error": self.needs_doc_count_error,
                }
            });
            if let Some(aggs) = node.take() {
                terms["aggs"] = aggs;
            }
            if depth > 0 {
                let mut wrapper = Map::new();
                wrapper.insert(grouping.name.clone(), terms);
                node = Some(Value::Object(wrapper));
            } else {
                node = Some(terms);
            }
        }
        // There is at least one grouping in this strategy.
        let mut grouped = node.ok_or_else(|| {
            Error::MalformedResponse("non-composite aggregation without groupings".into())
        })?;

        match filter_clauses {
            Some(clauses) => {
                let grouped_name = self.grouped_name();
                Ok(json!({
                    "filter": bool_filter_query(clauses),
                    "meta": {
                        "buckets_path": [grouped_name.clone(), "buckets"],
                        "grouping_names": self.grouping_names(),
                    },
                    "aggs": { grouped_name: grouped }
                }))
            }
            None => {
                grouped["meta"] = json!({
                    "buckets_path": ["buckets"],
                    "grouping_names": self.grouping_names(),
                });
                Ok(grouped)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::IndexDefinition;
    use searchgraph_proto::FilterNode;

    fn interpreter_index() -> IndexDefinition {
        IndexDefinition::new("widgets").with_field("cost.amount", "cost.amount_cents")
    }

    fn body_for(query: &AggregationQuery) -> Value {
        let index = interpreter_index();
        let interpreter = FilterInterpreter::new(&index);
        let (name, body) = query.to_agg_body(&interpreter).unwrap();
        assert_eq!(name, query.name);
        body
    }

    #[test]
    fn test_strategy_selection() {
        let ungrouped = AggregationQuery::new("a");
        assert_eq!(ungrouped.strategy(), BucketStrategy::Ungrouped);

        let grouped = AggregationQuery::new("a").with_grouping(Grouping::new("country", "country"));
        assert_eq!(grouped.strategy(), BucketStrategy::NonComposite);

        let paginated = grouped.clone().with_group_pagination();
        assert_eq!(paginated.strategy(), BucketStrategy::Composite);

        let resumed = grouped.with_after(Cursor::from_sort_values(vec![json!("US")]));
        assert_eq!(resumed.strategy(), BucketStrategy::Composite);
    }

    #[test]
    fn test_ungrouped_meta_points_at_self() {
        let query = AggregationQuery::new("widget_stats")
            .with_computation(Computation::new("size:avg", "size", ComputationFn::Avg));
        let body = body_for(&query);
        assert_eq!(body["meta"]["bucket_path"], json!([]));
        assert_eq!(body["aggs"]["size:avg"], json!({ "avg": { "field": "size" } }));
    }

    #[test]
    fn test_ungrouped_filter_adds_nesting_level() {
        let query = AggregationQuery::new("widget_stats")
            .with_filter(FilterNode::gt("size", 10))
            .with_computation(Computation::new("size:max", "size", ComputationFn::Max));
        let body = body_for(&query);
        assert_eq!(body["meta"]["bucket_path"], json!(["widget_stats:filtered"]));
        let inner = &body["aggs"]["widget_stats:filtered"];
        assert_eq!(
            inner["filter"],
            json!({ "bool": { "filter": [{ "range": { "size": { "gt": 10 } } }] } })
        );
        assert!(inner["aggs"]["size:max"].is_object());
    }

    #[test]
    fn test_composite_sources_and_meta() {
        let query = AggregationQuery::new("by_country")
            .with_grouping(Grouping::new("country", "country"))
            .with_grouping(Grouping::new("size", "size"))
            .with_group_pagination()
            .with_size(25);
        let body = body_for(&query);
        assert_eq!(body["meta"]["buckets_path"], json!(["buckets"]));
        assert_eq!(body["meta"]["grouping_names"], json!(["country", "size"]));
        assert_eq!(body["composite"]["size"], json!(25));
        assert_eq!(
            body["composite"]["sources"],
            json!([
                { "country": { "terms": { "field": "country" } } },
                { "size": { "terms": { "field": "size" } } },
            ])
        );
    }

    #[test]
    fn test_composite_after_cursor_becomes_named_key() {
        let query = AggregationQuery::new("by_country")
            .with_grouping(Grouping::new("country", "country"))
            .with_after(Cursor::from_sort_values(vec![json!("FR")]));
        let body = body_for(&query);
        assert_eq!(body["composite"]["after"], json!({ "country": "FR" }));
    }

    #[test]
    fn test_singleton_after_cursor_rejected_for_grouped_query() {
        let query = AggregationQuery::new("by_country")
            .with_grouping(Grouping::new("country", "country"))
            .with_after(Cursor::Singleton);
        let index = interpreter_index();
        let interpreter = FilterInterpreter::new(&index);
        let err = query.to_agg_body(&interpreter).unwrap_err();
        assert!(matches!(err, Error::InvalidCursor(_)));
    }

    #[test]
    fn test_after_cursor_arity_must_match_groupings() {
        let query = AggregationQuery::new("by_country")
            .with_grouping(Grouping::new("country", "country"))
            .with_grouping(Grouping::new("size", "size"))
            .with_after(Cursor::from_sort_values(vec![json!("FR")]));
        let index = interpreter_index();
        let interpreter = FilterInterpreter::new(&index);
        let err = query.to_agg_body(&interpreter).unwrap_err();
        assert!(matches!(err, Error::InvalidCursor(_)));
    }

    #[test]
    fn test_non_composite_nested_terms() {
        let query = AggregationQuery::new("by_country")
            .with_grouping(Grouping::new("country", "country"))
            .with_grouping(Grouping::new("size", "size"))
            .with_doc_count_error();
        let body = body_for(&query);
        assert_eq!(body["terms"]["field"], json!("country"));
        assert_eq!(body["terms"]["show_term_doc_count_error"], json!(true));
        assert_eq!(body["aggs"]["size"]["terms"]["field"], json!("size"));
        assert_eq!(body["meta"]["grouping_names"], json!(["country", "size"]));
    }

    #[test]
    fn test_grouped_filter_wraps_and_extends_path() {
        let query = AggregationQuery::new("by_country")
            .with_grouping(Grouping::new("country", "country"))
            .with_filter(FilterNode::gt("size", 10));
        let body = body_for(&query);
        assert_eq!(
            body["meta"]["buckets_path"],
            json!(["by_country:grouped", "buckets"])
        );
        assert!(body["filter"].is_object());
        assert!(body["aggs"]["by_country:grouped"]["terms"].is_object());
    }

    #[test]
    fn test_sub_aggregation_nested_in_parent() {
        let sub = AggregationQuery::new("component_stats")
            .with_computation(Computation::new("weight:sum", "weight", ComputationFn::Sum));
        let query = AggregationQuery::new("by_country")
            .with_grouping(Grouping::new("country", "country"))
            .with_sub_aggregation(sub);
        let body = body_for(&query);
        let nested = &body["aggs"]["component_stats"];
        assert_eq!(nested["meta"]["bucket_path"], json!([]));
        assert!(nested["aggs"]["weight:sum"].is_object());
    }

    #[test]
    fn test_field_mapping_in_computations() {
        let query = AggregationQuery::new("stats").with_computation(Computation::new(
            "cost:min",
            "cost.amount",
            ComputationFn::Min,
        ));
        let body = body_for(&query);
        assert_eq!(
            body["aggs"]["cost:min"],
            json!({ "min": { "field": "cost.amount_cents" } })
        );
    }
}

//! Filter expression trees for graph queries.
//!
//! A filter is a nested predicate tree. Interior nodes are conjunctions
//! (`allOf`/`anyOf`), negations (`not`), or sub-field descents; leaves are
//! one of a fixed set of operators. The tree mirrors the shape of the outer
//! protocol's `filter` argument, so the engine can interpret it without any
//! knowledge of that protocol.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node in a filter expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterNode {
    /// All sub-expressions must match (logical AND).
    AllOf(Vec<FilterNode>),
    /// At least one sub-expression must match (logical OR).
    AnyOf(Vec<FilterNode>),
    /// The sub-expression must not match.
    Not(Box<FilterNode>),
    /// Descend into a named sub-field.
    Field {
        /// Field name (a single path segment).
        name: String,
        /// Filter applied beneath that field.
        filter: Box<FilterNode>,
    },
    /// A leaf operator applied at the current field path.
    Op(FilterOp),
}

/// Leaf filter operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterOp {
    /// Field value equals any of the given values. `Value::Null` entries
    /// match documents where the field is absent or null.
    EqualToAnyOf(Vec<Value>),
    /// Field value is strictly greater than the given value.
    Gt(Value),
    /// Field value is greater than or equal to the given value.
    Gte(Value),
    /// Field value is strictly less than the given value.
    Lt(Value),
    /// Field value is less than or equal to the given value.
    Lte(Value),
    /// At least one element of a list field satisfies the sub-filter.
    AnySatisfy(Box<FilterNode>),
    /// Full-text match against an analyzed field.
    Matches {
        /// The query text.
        query: String,
        /// Optional per-term edit distance for fuzzy matching.
        allowed_edits_per_term: Option<u32>,
    },
    /// Geo-distance match around a point.
    Near {
        /// Latitude of the center point.
        latitude: f64,
        /// Longitude of the center point.
        longitude: f64,
        /// Maximum distance from the center point.
        max_distance: f64,
        /// Unit `max_distance` is expressed in.
        unit: DistanceUnit,
    },
    /// Match on the local time-of-day component of a timestamp field.
    TimeOfDay {
        /// Inclusive lower bound, `HH:mm:ss`.
        gte: Option<String>,
        /// Inclusive upper bound, `HH:mm:ss`.
        lte: Option<String>,
        /// Exact times of day to match.
        equal_to_any_of: Vec<String>,
        /// IANA time zone the bounds are evaluated in.
        time_zone: String,
    },
}

/// Units for geo-distance filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DistanceUnit {
    /// Meters.
    Meter,
    /// Kilometers.
    Kilometer,
    /// Miles.
    Mile,
    /// Feet.
    Foot,
}

impl DistanceUnit {
    /// The suffix the search engine expects on distance strings.
    pub fn wire_suffix(self) -> &'static str {
        match self {
            DistanceUnit::Meter => "m",
            DistanceUnit::Kilometer => "km",
            DistanceUnit::Mile => "mi",
            DistanceUnit::Foot => "ft",
        }
    }
}

impl FilterNode {
    /// Create a filter that descends into a named field.
    pub fn field(name: impl Into<String>, filter: FilterNode) -> Self {
        FilterNode::Field {
            name: name.into(),
            filter: Box::new(filter),
        }
    }

    /// Create an `equalToAnyOf` filter on a field.
    pub fn equal_to_any_of(field: impl Into<String>, values: Vec<Value>) -> Self {
        Self::field(field, FilterNode::Op(FilterOp::EqualToAnyOf(values)))
    }

    /// Create an equality filter on a field (single-value `equalToAnyOf`).
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::equal_to_any_of(field, vec![value.into()])
    }

    /// Create a greater-than filter on a field.
    pub fn gt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, FilterNode::Op(FilterOp::Gt(value.into())))
    }

    /// Create a greater-than-or-equal filter on a field.
    pub fn gte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, FilterNode::Op(FilterOp::Gte(value.into())))
    }

    /// Create a less-than filter on a field.
    pub fn lt(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, FilterNode::Op(FilterOp::Lt(value.into())))
    }

    /// Create a less-than-or-equal filter on a field.
    pub fn lte(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::field(field, FilterNode::Op(FilterOp::Lte(value.into())))
    }

    /// Create a full-text match filter on a field.
    pub fn matches(field: impl Into<String>, query: impl Into<String>) -> Self {
        Self::field(
            field,
            FilterNode::Op(FilterOp::Matches {
                query: query.into(),
                allowed_edits_per_term: None,
            }),
        )
    }

    /// Create an AND of multiple sub-filters.
    pub fn all_of(filters: Vec<FilterNode>) -> Self {
        FilterNode::AllOf(filters)
    }

    /// Create an OR of multiple sub-filters.
    pub fn any_of(filters: Vec<FilterNode>) -> Self {
        FilterNode::AnyOf(filters)
    }

    /// Negate a sub-filter.
    pub fn not(filter: FilterNode) -> Self {
        FilterNode::Not(Box::new(filter))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_builder_nests() {
        let filter = FilterNode::eq("name", "Alice");
        match filter {
            FilterNode::Field { name, filter } => {
                assert_eq!(name, "name");
                assert_eq!(
                    *filter,
                    FilterNode::Op(FilterOp::EqualToAnyOf(vec![json!("Alice")]))
                );
            }
            other => panic!("expected Field node, got {other:?}"),
        }
    }

    #[test]
    fn test_all_of_builder() {
        let filter = FilterNode::all_of(vec![
            FilterNode::gt("yearFormed", 2000),
            FilterNode::eq("country", "US"),
        ]);
        match filter {
            FilterNode::AllOf(subs) => assert_eq!(subs.len(), 2),
            other => panic!("expected AllOf, got {other:?}"),
        }
    }

    #[test]
    fn test_distance_unit_suffixes() {
        assert_eq!(DistanceUnit::Meter.wire_suffix(), "m");
        assert_eq!(DistanceUnit::Kilometer.wire_suffix(), "km");
        assert_eq!(DistanceUnit::Mile.wire_suffix(), "mi");
        assert_eq!(DistanceUnit::Foot.wire_suffix(), "ft");
    }

    #[test]
    fn test_serde_roundtrip() {
        let filter = FilterNode::any_of(vec![
            FilterNode::equal_to_any_of("status", vec![json!("active"), Value::Null]),
            FilterNode::not(FilterNode::lt("age", 18)),
        ]);
        let text = serde_json::to_string(&filter).unwrap();
        let back: FilterNode = serde_json::from_str(&text).unwrap();
        assert_eq!(filter, back);
    }
}

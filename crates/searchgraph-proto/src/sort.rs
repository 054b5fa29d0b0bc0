//! Sort clauses for search requests.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// The opposite direction.
    pub fn reversed(self) -> Self {
        match self {
            SortDirection::Asc => SortDirection::Desc,
            SortDirection::Desc => SortDirection::Asc,
        }
    }

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

/// Where documents missing the sort field are placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MissingValuePlacement {
    /// Missing values sort before all present values.
    First,
    /// Missing values sort after all present values.
    Last,
}

impl MissingValuePlacement {
    /// The opposite placement.
    pub fn reversed(self) -> Self {
        match self {
            MissingValuePlacement::First => MissingValuePlacement::Last,
            MissingValuePlacement::Last => MissingValuePlacement::First,
        }
    }

    /// Wire representation.
    pub fn as_str(self) -> &'static str {
        match self {
            MissingValuePlacement::First => "_first",
            MissingValuePlacement::Last => "_last",
        }
    }
}

/// One sort clause of a search request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SortClause {
    /// Index field to sort by.
    pub field: String,
    /// Sort direction.
    pub direction: SortDirection,
    /// Optional placement for documents missing the field.
    pub missing: Option<MissingValuePlacement>,
}

impl SortClause {
    /// Create an ascending sort clause.
    pub fn asc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Asc,
            missing: None,
        }
    }

    /// Create a descending sort clause.
    pub fn desc(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            direction: SortDirection::Desc,
            missing: None,
        }
    }

    /// Set the missing-value placement.
    pub fn with_missing(mut self, missing: MissingValuePlacement) -> Self {
        self.missing = Some(missing);
        self
    }

    /// Flip the direction and missing-value placement.
    ///
    /// Used for reverse traversal: a reversed clause visits the same total
    /// order backwards, including documents missing the field.
    pub fn reversed(&self) -> Self {
        Self {
            field: self.field.clone(),
            direction: self.direction.reversed(),
            missing: self.missing.map(MissingValuePlacement::reversed),
        }
    }

    /// Lower to the search engine's sort entry.
    pub fn to_body(&self) -> Value {
        let mut options = json!({ "order": self.direction.as_str() });
        if let Some(missing) = self.missing {
            options["missing"] = json!(missing.as_str());
        }
        json!({ self.field.clone(): options })
    }
}

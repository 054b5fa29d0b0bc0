//! Relay-style cursor pagination.
//!
//! The paginator always over-fetches by one item in the traversal direction:
//! if the fetched window is longer than the requested size, the boundary item
//! is dropped and the corresponding "there is more" flag is raised. `last`
//! pagination fetches in reverse sort order; the window is restored to
//! forward order before truncation runs, so the page flags always refer to
//! the client's requested forward order.

use std::cmp::Ordering;

use serde_json::Value;

use searchgraph_proto::{MissingValuePlacement, SortClause, SortDirection};

use super::cursor::Cursor;

/// Pagination request state for one query.
#[derive(Debug, Clone, PartialEq)]
pub struct Paginator {
    /// Forward window size.
    pub first: Option<u32>,
    /// Resume after this cursor (forward traversal).
    pub after: Option<Cursor>,
    /// Backward window size.
    pub last: Option<u32>,
    /// Stop before this cursor (backward traversal resume point).
    pub before: Option<Cursor>,
    /// Page size when neither `first` nor `last` is given.
    pub default_page_size: u32,
    /// Hard cap on the page size.
    pub max_page_size: u32,
}

impl Paginator {
    /// Create a paginator with no client bounds.
    pub fn new(default_page_size: u32, max_page_size: u32) -> Self {
        Self {
            first: None,
            after: None,
            last: None,
            before: None,
            default_page_size,
            max_page_size,
        }
    }

    /// Set the `first` bound.
    pub fn with_first(mut self, first: u32) -> Self {
        self.first = Some(first);
        self
    }

    /// Set the `after` cursor.
    pub fn with_after(mut self, after: Cursor) -> Self {
        self.after = Some(after);
        self
    }

    /// Set the `last` bound.
    pub fn with_last(mut self, last: u32) -> Self {
        self.last = Some(last);
        self
    }

    /// Set the `before` cursor.
    pub fn with_before(mut self, before: Cursor) -> Self {
        self.before = Some(before);
        self
    }

    /// The page size the client asked for, capped.
    ///
    /// When both bounds are given, `first` shapes the forward traversal;
    /// `last` then keeps only the tail of that window in [`Self::paginate`].
    pub fn desired_page_size(&self) -> usize {
        self.first
            .or(self.last)
            .unwrap_or(self.default_page_size)
            .min(self.max_page_size) as usize
    }

    /// Number of items to request from the backend: one more than desired,
    /// so the presence of an adjacent page is observable.
    pub fn fetch_size(&self) -> u32 {
        self.desired_page_size() as u32 + 1
    }

    /// Whether the backend traversal runs in reverse sort order.
    ///
    /// `last` without `first` walks backward from `before` (or from the end).
    pub fn search_in_reverse(&self) -> bool {
        self.last.is_some() && self.first.is_none()
    }

    /// The cursor the backend resumes from, in the traversal direction.
    pub fn resume_cursor(&self) -> Option<&Cursor> {
        if self.search_in_reverse() {
            self.before.as_ref()
        } else {
            self.after.as_ref()
        }
    }

    /// Equal `before` and `after` cursors pin the window to a single point,
    /// which has no adjacent page in either direction.
    fn pinned_to_empty_window(&self) -> bool {
        matches!((&self.before, &self.after), (Some(b), Some(a)) if b == a)
    }

    /// Restore forward order, drop the over-fetched boundary item, trim
    /// against the opposite bound cursor, and compute page flags.
    pub fn paginate<T>(
        &self,
        fetched: Vec<T>,
        sort: &[SortClause],
        sort_values: impl Fn(&T) -> &[Value],
    ) -> PageWindow<T> {
        if self.pinned_to_empty_window() {
            return PageWindow {
                items: vec![],
                has_previous_page: false,
                has_next_page: false,
            };
        }

        let desired = self.desired_page_size();
        let reverse = self.search_in_reverse();
        let mut items = fetched;
        if reverse {
            items.reverse();
        }

        let mut leading_dropped = false;
        let mut trailing_dropped = false;
        if items.len() > desired {
            if reverse {
                // The extra item sits at the front once order is restored.
                items.remove(0);
                leading_dropped = true;
            } else {
                items.truncate(desired);
                trailing_dropped = true;
            }
        }

        // The cursor opposite the traversal direction cannot be pushed down
        // to the backend window, so it trims here.
        if reverse {
            if let Some(Cursor::SortValues(bound)) = &self.after {
                let len_before = items.len();
                items.retain(|item| {
                    compare_sort_values(sort_values(item), bound, sort) == Ordering::Greater
                });
                leading_dropped |= items.len() < len_before;
            }
        } else if let Some(Cursor::SortValues(bound)) = &self.before {
            let len_before = items.len();
            items.retain(|item| {
                compare_sort_values(sort_values(item), bound, sort) == Ordering::Less
            });
            trailing_dropped |= items.len() < len_before;
        }

        // Both bounds given: the forward window shaped by `first` is further
        // trimmed to its last `last` items.
        if let (Some(_), Some(last)) = (self.first, self.last) {
            let keep = (last as usize).min(self.max_page_size as usize);
            if items.len() > keep {
                let excess = items.len() - keep;
                items.drain(..excess);
                leading_dropped = true;
            }
        }

        let no_bounds = self.first.is_none() && self.last.is_none();
        PageWindow {
            items,
            has_previous_page: leading_dropped || (no_bounds && self.after.is_some()),
            has_next_page: trailing_dropped || (no_bounds && self.before.is_some()),
        }
    }
}

/// A truncated result window in forward order, with page flags.
#[derive(Debug, Clone, PartialEq)]
pub struct PageWindow<T> {
    /// The page items, always in the client's requested forward order.
    pub items: Vec<T>,
    /// Whether a page exists before this window.
    pub has_previous_page: bool,
    /// Whether a page exists after this window.
    pub has_next_page: bool,
}

/// Compare two sort-value tuples under the active sort clauses.
///
/// Returns the relative position in forward order. Ties on every clause
/// compare equal.
pub fn compare_sort_values(a: &[Value], b: &[Value], sort: &[SortClause]) -> Ordering {
    for (index, clause) in sort.iter().enumerate() {
        let (va, vb) = match (a.get(index), b.get(index)) {
            (Some(va), Some(vb)) => (va, vb),
            _ => return Ordering::Equal,
        };
        let ordering = compare_values(va, vb, clause);
        let ordering = match clause.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

/// Compare two single sort values, honoring missing-value placement.
fn compare_values(a: &Value, b: &Value, clause: &SortClause) -> Ordering {
    // Null/absent values sort where the clause places them; the engine
    // defaults to last, matching the backend.
    let placement = clause.missing.unwrap_or(MissingValuePlacement::Last);
    let null_rank = match placement {
        MissingValuePlacement::First => Ordering::Less,
        MissingValuePlacement::Last => Ordering::Greater,
    };
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => null_rank,
        (_, Value::Null) => null_rank.reverse(),
        (Value::Number(x), Value::Number(y)) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        // Incomparable types hold their relative position.
        _ => Ordering::Equal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: &[i64]) -> Vec<Vec<Value>> {
        values.iter().map(|v| vec![json!(v)]).collect()
    }

    fn id_sort() -> Vec<SortClause> {
        vec![SortClause::asc("id")]
    }

    fn first(n: u32) -> Paginator {
        Paginator::new(50, 500).with_first(n)
    }

    #[test]
    fn test_forward_overfetch_drops_trailing_item() {
        let paginator = first(2);
        assert_eq!(paginator.fetch_size(), 3);
        let window = paginator.paginate(rows(&[1, 2, 3]), &id_sort(), |r| r);
        assert_eq!(window.items, rows(&[1, 2]));
        assert!(window.has_next_page);
        assert!(!window.has_previous_page);
    }

    #[test]
    fn test_forward_exact_fit_has_no_next_page() {
        let window = first(2).paginate(rows(&[1, 2]), &id_sort(), |r| r);
        assert_eq!(window.items.len(), 2);
        assert!(!window.has_next_page);
        assert!(!window.has_previous_page);
    }

    #[test]
    fn test_reverse_restores_forward_order_and_drops_leading_item() {
        // Backend returned 3 items in reverse order for `last: 2`.
        let paginator = Paginator::new(50, 500).with_last(2);
        assert!(paginator.search_in_reverse());
        let window = paginator.paginate(rows(&[5, 4, 3]), &id_sort(), |r| r);
        assert_eq!(window.items, rows(&[4, 5]));
        assert!(window.has_previous_page);
        assert!(!window.has_next_page);
    }

    #[test]
    fn test_reverse_exact_fit() {
        let paginator = Paginator::new(50, 500).with_last(3);
        let window = paginator.paginate(rows(&[3, 2, 1]), &id_sort(), |r| r);
        assert_eq!(window.items, rows(&[1, 2, 3]));
        assert!(!window.has_previous_page);
        assert!(!window.has_next_page);
    }

    #[test]
    fn test_before_equals_after_yields_empty_window() {
        let cursor = Cursor::from_sort_values(vec![json!(2)]);
        let paginator = Paginator::new(50, 500)
            .with_after(cursor.clone())
            .with_before(cursor);
        let window = paginator.paginate(rows(&[1, 2, 3]), &id_sort(), |r| r);
        assert!(window.items.is_empty());
        assert!(!window.has_previous_page);
        assert!(!window.has_next_page);
    }

    #[test]
    fn test_unbounded_with_after_reports_previous_page() {
        let paginator = Paginator::new(50, 500).with_after(Cursor::from_sort_values(vec![json!(0)]));
        let window = paginator.paginate(rows(&[1, 2]), &id_sort(), |r| r);
        assert!(window.has_previous_page);
        assert!(!window.has_next_page);
    }

    #[test]
    fn test_unbounded_with_before_reports_next_page() {
        let paginator =
            Paginator::new(50, 500).with_before(Cursor::from_sort_values(vec![json!(9)]));
        let window = paginator.paginate(rows(&[1, 2]), &id_sort(), |r| r);
        assert!(!window.has_previous_page);
        assert!(window.has_next_page);
    }

    #[test]
    fn test_forward_before_bound_trims_and_raises_next_flag() {
        let paginator = first(5).with_before(Cursor::from_sort_values(vec![json!(3)]));
        let window = paginator.paginate(rows(&[1, 2, 3, 4]), &id_sort(), |r| r);
        assert_eq!(window.items, rows(&[1, 2]));
        assert!(window.has_next_page);
    }

    #[test]
    fn test_reverse_after_bound_trims_and_raises_previous_flag() {
        let paginator = Paginator::new(50, 500)
            .with_last(5)
            .with_after(Cursor::from_sort_values(vec![json!(2)]));
        let window = paginator.paginate(rows(&[4, 3, 2, 1]), &id_sort(), |r| r);
        assert_eq!(window.items, rows(&[3, 4]));
        assert!(window.has_previous_page);
    }

    #[test]
    fn test_first_then_last_keeps_the_tail_of_the_forward_window() {
        // `first: 3` shapes the window to [1, 2, 3]; `last: 2` then keeps
        // its tail, and both adjacent pages are reported.
        let paginator = first(3).with_last(2);
        assert!(!paginator.search_in_reverse());
        let window = paginator.paginate(rows(&[1, 2, 3, 4]), &id_sort(), |r| r);
        assert_eq!(window.items, rows(&[2, 3]));
        assert!(window.has_previous_page);
        assert!(window.has_next_page);
    }

    #[test]
    fn test_first_then_last_larger_than_window_is_a_no_op() {
        let paginator = first(2).with_last(5);
        let window = paginator.paginate(rows(&[1, 2]), &id_sort(), |r| r);
        assert_eq!(window.items, rows(&[1, 2]));
        assert!(!window.has_previous_page);
        assert!(!window.has_next_page);
    }

    #[test]
    fn test_max_page_size_caps_desired() {
        let paginator = Paginator::new(50, 10).with_first(1000);
        assert_eq!(paginator.desired_page_size(), 10);
        assert_eq!(paginator.fetch_size(), 11);
    }

    #[test]
    fn test_first_zero_returns_no_items_but_sets_flag() {
        let window = first(0).paginate(rows(&[1]), &id_sort(), |r| r);
        assert!(window.items.is_empty());
        assert!(window.has_next_page);
    }

    #[test]
    fn test_compare_sort_values_desc() {
        let sort = vec![SortClause::desc("n")];
        assert_eq!(
            compare_sort_values(&[json!(5)], &[json!(3)], &sort),
            Ordering::Less
        );
    }

    #[test]
    fn test_compare_sort_values_tiebreak() {
        let sort = vec![SortClause::asc("a"), SortClause::asc("b")];
        assert_eq!(
            compare_sort_values(&[json!(1), json!("x")], &[json!(1), json!("y")], &sort),
            Ordering::Less
        );
    }

    #[test]
    fn test_null_sorts_last_by_default() {
        let sort = vec![SortClause::asc("a")];
        assert_eq!(
            compare_sort_values(&[Value::Null], &[json!(100)], &sort),
            Ordering::Greater
        );
    }
}

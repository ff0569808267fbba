/*!
 * Query Primitives
 * Composable field filters and pagination shared by the trace and log
 * stores
 */

use crate::core::types::InlineString;
use serde::Serialize;
use std::borrow::Cow;

/// Comparison applied by a [`FieldFilter`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FilterCondition {
    Equals,
    NotEqual,
    Contains,
    NotContains,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
}

/// One predicate over a record field. Filters in a set are chained:
/// every filter must pass for the record (or, for traces, for at least
/// one span of the trace).
///
/// Known field names resolve to record intrinsics (see the store's
/// `field_value`); any other name resolves to an attribute lookup.
#[derive(Debug, Clone, Serialize)]
pub struct FieldFilter {
    pub field: InlineString,
    pub condition: FilterCondition,
    pub value: String,
}

impl FieldFilter {
    pub fn new(
        field: impl Into<InlineString>,
        condition: FilterCondition,
        value: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            condition,
            value: value.into(),
        }
    }

    /// Apply the condition to a resolved field value. A missing field
    /// fails every positive condition and vacuously satisfies the
    /// negated ones.
    pub fn matches(&self, actual: Option<&str>) -> bool {
        let actual = match actual {
            Some(actual) => actual,
            None => {
                return matches!(
                    self.condition,
                    FilterCondition::NotEqual | FilterCondition::NotContains
                )
            }
        };

        match self.condition {
            FilterCondition::Equals => actual.eq_ignore_ascii_case(&self.value),
            FilterCondition::NotEqual => !actual.eq_ignore_ascii_case(&self.value),
            FilterCondition::Contains => contains_ignore_case(actual, &self.value),
            FilterCondition::NotContains => !contains_ignore_case(actual, &self.value),
            FilterCondition::GreaterThan => compare(actual, &self.value).is_gt(),
            FilterCondition::LessThan => compare(actual, &self.value).is_lt(),
            FilterCondition::GreaterOrEqual => compare(actual, &self.value).is_ge(),
            FilterCondition::LessOrEqual => compare(actual, &self.value).is_le(),
        }
    }
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_ascii_lowercase().contains(&needle.to_ascii_lowercase())
}

/// Ordering comparisons are numeric when both sides parse as f64,
/// otherwise lexicographic on the lowercased text.
fn compare(actual: &str, expected: &str) -> std::cmp::Ordering {
    if let (Ok(a), Ok(b)) = (actual.parse::<f64>(), expected.parse::<f64>()) {
        return a.partial_cmp(&b).unwrap_or(std::cmp::Ordering::Equal);
    }
    actual.to_ascii_lowercase().cmp(&expected.to_ascii_lowercase())
}

/// One page of query results plus the information a caller needs to
/// render pagination honestly
#[derive(Debug, Clone, Serialize)]
pub struct PagedResult<T> {
    pub items: Vec<T>,
    /// Total records matching the filters, before slicing
    pub total_count: usize,
    /// True when the underlying buffer has ever evicted, i.e. the
    /// window might be missing older data
    pub is_full: bool,
}

impl<T> PagedResult<T> {
    pub fn empty() -> Self {
        Self {
            items: Vec::new(),
            total_count: 0,
            is_full: false,
        }
    }
}

/// Slice `[start_index, start_index + count)` out of the filtered
/// sequence, cloning only the page that is returned.
pub fn paginate<'a, T: Clone + 'a>(
    matched: impl Iterator<Item = &'a T>,
    start_index: usize,
    count: usize,
    is_full: bool,
) -> PagedResult<T> {
    let mut total = 0usize;
    let mut items = Vec::new();
    for item in matched {
        if total >= start_index && items.len() < count {
            items.push(item.clone());
        }
        total += 1;
    }
    PagedResult {
        items,
        total_count: total,
        is_full,
    }
}

/// Resolved field value used by filters and histograms
pub type FieldValue<'a> = Option<Cow<'a, str>>;

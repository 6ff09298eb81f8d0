//! Store-neutral filter, sort and content-query primitives.
//!
//! Both store clients render these into their own query languages; the
//! in-memory stores evaluate them directly against record accessors.

use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{ContentRecord, OperationalRecord};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    Text(String),
    Int(i64),
    Bool(bool),
    Time(DateTime<Utc>),
    Date(NaiveDate),
    List(Vec<String>),
}

impl FilterValue {
    pub fn text(value: impl Into<String>) -> Self {
        FilterValue::Text(value.into())
    }

    pub fn opt_text(value: Option<&str>) -> Option<Self> {
        value.map(Self::text)
    }

    /// Ordering between two values of the same kind; mixed kinds do not compare.
    pub fn compare(&self, other: &FilterValue) -> Option<Ordering> {
        match (self, other) {
            (FilterValue::Text(a), FilterValue::Text(b)) => Some(a.cmp(b)),
            (FilterValue::Int(a), FilterValue::Int(b)) => Some(a.cmp(b)),
            (FilterValue::Bool(a), FilterValue::Bool(b)) => Some(a.cmp(b)),
            (FilterValue::Time(a), FilterValue::Time(b)) => Some(a.cmp(b)),
            (FilterValue::Date(a), FilterValue::Date(b)) => Some(a.cmp(b)),
            (FilterValue::Time(a), FilterValue::Date(b)) => Some(a.date_naive().cmp(b)),
            (FilterValue::Date(a), FilterValue::Time(b)) => Some(a.cmp(&b.date_naive())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Eq,
    Ne,
    Gte,
    Lte,
    In,
    IsNull,
    NotNull,
}

/// One operational-store predicate. `column` is always a static identifier
/// chosen by this codebase, never caller input.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub column: &'static str,
    pub op: CompareOp,
    pub value: Option<FilterValue>,
}

impl Condition {
    pub fn eq(column: &'static str, value: FilterValue) -> Self {
        Self {
            column,
            op: CompareOp::Eq,
            value: Some(value),
        }
    }

    pub fn ne(column: &'static str, value: FilterValue) -> Self {
        Self {
            column,
            op: CompareOp::Ne,
            value: Some(value),
        }
    }

    pub fn gte(column: &'static str, value: FilterValue) -> Self {
        Self {
            column,
            op: CompareOp::Gte,
            value: Some(value),
        }
    }

    pub fn lte(column: &'static str, value: FilterValue) -> Self {
        Self {
            column,
            op: CompareOp::Lte,
            value: Some(value),
        }
    }

    pub fn in_list(column: &'static str, values: Vec<String>) -> Self {
        Self {
            column,
            op: CompareOp::In,
            value: Some(FilterValue::List(values)),
        }
    }

    pub fn is_null(column: &'static str) -> Self {
        Self {
            column,
            op: CompareOp::IsNull,
            value: None,
        }
    }

    pub fn not_null(column: &'static str) -> Self {
        Self {
            column,
            op: CompareOp::NotNull,
            value: None,
        }
    }

    pub fn evaluate(&self, actual: Option<&FilterValue>) -> bool {
        match self.op {
            CompareOp::IsNull => actual.is_none(),
            CompareOp::NotNull => actual.is_some(),
            CompareOp::Eq => matches!((actual, &self.value), (Some(a), Some(b)) if a == b),
            CompareOp::Ne => matches!((actual, &self.value), (Some(a), Some(b)) if a != b),
            CompareOp::Gte => compare_is(actual, self.value.as_ref(), |o| o != Ordering::Less),
            CompareOp::Lte => compare_is(actual, self.value.as_ref(), |o| o != Ordering::Greater),
            CompareOp::In => match (actual, &self.value) {
                (Some(FilterValue::Text(a)), Some(FilterValue::List(items))) => items.contains(a),
                _ => false,
            },
        }
    }
}

fn compare_is(
    actual: Option<&FilterValue>,
    expected: Option<&FilterValue>,
    accept: impl Fn(Ordering) -> bool,
) -> bool {
    match (actual, expected) {
        (Some(a), Some(b)) => a.compare(b).map(accept).unwrap_or(false),
        _ => false,
    }
}

/// Conjunction of operational predicates.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OpFilter {
    pub conditions: Vec<Condition>,
}

impl OpFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn and(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn push(&mut self, condition: Condition) {
        self.conditions.push(condition);
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn matches<R: OperationalRecord>(&self, record: &R) -> bool {
        self.conditions
            .iter()
            .all(|c| c.evaluate(record.field(c.column).as_ref()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Ordering requested from a store. Stores break ties on the record id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sort {
    pub column: &'static str,
    pub direction: SortDirection,
}

impl Sort {
    pub const fn asc(column: &'static str) -> Self {
        Self {
            column,
            direction: SortDirection::Asc,
        }
    }

    pub const fn desc(column: &'static str) -> Self {
        Self {
            column,
            direction: SortDirection::Desc,
        }
    }

    /// Compare two optional values the way the stores do: missing values sort last
    /// regardless of direction.
    pub fn compare_values(&self, a: Option<&FilterValue>, b: Option<&FilterValue>) -> Ordering {
        match (a, b) {
            (None, None) => Ordering::Equal,
            (None, Some(_)) => Ordering::Greater,
            (Some(_), None) => Ordering::Less,
            (Some(a), Some(b)) => {
                let ord = a.compare(b).unwrap_or(Ordering::Equal);
                match self.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentOp {
    Eq,
    Gte,
    Lte,
    /// Case-insensitive text match.
    Match,
    /// List-valued field contains the value.
    Contains,
    /// Field value is one of the listed values.
    In,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentCondition {
    pub field: &'static str,
    pub op: ContentOp,
    pub value: FilterValue,
}

impl ContentCondition {
    pub fn new(field: &'static str, op: ContentOp, value: FilterValue) -> Self {
        Self { field, op, value }
    }

    pub fn evaluate(&self, actual: Option<&FilterValue>) -> bool {
        let Some(actual) = actual else {
            return false;
        };
        match self.op {
            ContentOp::Eq => actual == &self.value,
            ContentOp::Gte => actual
                .compare(&self.value)
                .map(|o| o != Ordering::Less)
                .unwrap_or(false),
            ContentOp::Lte => actual
                .compare(&self.value)
                .map(|o| o != Ordering::Greater)
                .unwrap_or(false),
            ContentOp::Match => match (actual, &self.value) {
                (FilterValue::Text(haystack), FilterValue::Text(needle)) => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                _ => false,
            },
            ContentOp::Contains => match (actual, &self.value) {
                (FilterValue::List(items), FilterValue::Text(needle)) => items.contains(needle),
                _ => false,
            },
            ContentOp::In => match (actual, &self.value) {
                (FilterValue::Text(value), FilterValue::List(items)) => items.contains(value),
                _ => false,
            },
        }
    }
}

/// Content-store query: conjunction of conditions plus an ordering.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ContentQuery {
    pub conditions: Vec<ContentCondition>,
    pub order: Option<Sort>,
}

impl ContentQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ordered_by(mut self, order: Sort) -> Self {
        self.order = Some(order);
        self
    }

    pub fn and(mut self, condition: ContentCondition) -> Self {
        self.conditions.push(condition);
        self
    }

    pub fn push(&mut self, condition: ContentCondition) {
        self.conditions.push(condition);
    }

    pub fn matches<D: ContentRecord>(&self, doc: &D) -> bool {
        self.conditions
            .iter()
            .all(|c| c.evaluate(doc.field(c.field).as_ref()))
    }
}

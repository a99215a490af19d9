use std::cmp::Ordering;

use serde_json::Value;

use super::types::{Comparison, Filter, FilterOp, SortDirection, SortKey};
use crate::types::{Document, ID_FIELD};

/// In-memory evaluation of filters and sort keys, with the same semantics as
/// the SQL generated by `FilterWhere`/`FilterOrder`.
pub struct FilterEval;

impl FilterEval {
    /// AND of every comparison in the filter
    pub fn matches(doc: &Document, filter: &Filter) -> bool {
        filter
            .iter()
            .all(|(field, comparisons)| comparisons.iter().all(|c| Self::compare(doc.get(field), c)))
    }

    fn compare(actual: Option<&Value>, condition: &Comparison) -> bool {
        match &condition.op {
            FilterOp::Eq => match &condition.value {
                Value::Null => matches!(actual, None | Some(Value::Null)),
                Value::Array(options) => options.iter().any(|option| Self::equals(actual, option)),
                expected => Self::equals(actual, expected),
            },
            FilterOp::Ne => !matches!(actual, Some(v) if Self::same(v, &condition.value)),
            FilterOp::Gt => Self::ordered(actual, &condition.value).is_some_and(Ordering::is_gt),
            FilterOp::Gte => Self::ordered(actual, &condition.value).is_some_and(Ordering::is_ge),
            FilterOp::Lt => Self::ordered(actual, &condition.value).is_some_and(Ordering::is_lt),
            FilterOp::Lte => Self::ordered(actual, &condition.value).is_some_and(Ordering::is_le),
            FilterOp::Other(_) => false,
        }
    }

    // A scalar matches an array field when any element equals it
    fn equals(actual: Option<&Value>, expected: &Value) -> bool {
        match (actual, expected) {
            (None, _) => false,
            (Some(Value::Array(items)), e) if !e.is_array() && !e.is_object() => {
                items.iter().any(|item| Self::same(item, e))
            }
            (Some(a), e) => Self::same(a, e),
        }
    }

    // Numbers compare by value, so 5 == 5.0
    fn same(a: &Value, b: &Value) -> bool {
        match (a, b) {
            (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
            _ => a == b,
        }
    }

    /// Ordering between two values of the same JSON type; `None` otherwise
    fn ordered(actual: Option<&Value>, expected: &Value) -> Option<Ordering> {
        match (actual?, expected) {
            (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Total order over optional JSON values used for sorting, following
    /// Postgres' jsonb ordering with missing fields first:
    /// missing < null < strings < numbers < booleans < arrays < objects
    pub fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
        fn rank(v: Option<&Value>) -> u8 {
            match v {
                None => 0,
                Some(Value::Null) => 1,
                Some(Value::String(_)) => 2,
                Some(Value::Number(_)) => 3,
                Some(Value::Bool(_)) => 4,
                Some(Value::Array(_)) => 5,
                Some(Value::Object(_)) => 6,
            }
        }

        match (a, b) {
            (Some(Value::Number(x)), Some(Value::Number(y))) => x
                .as_f64()
                .zip(y.as_f64())
                .and_then(|(x, y)| x.partial_cmp(&y))
                .unwrap_or(Ordering::Equal),
            (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
            (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
            (Some(x @ Value::Object(_)), Some(y @ Value::Object(_)))
            | (Some(x @ Value::Array(_)), Some(y @ Value::Array(_))) => x.to_string().cmp(&y.to_string()),
            _ => rank(a).cmp(&rank(b)),
        }
    }

    /// Compare two documents by the given keys, then by id
    pub fn compare_documents(a: &Document, b: &Document, keys: &[SortKey]) -> Ordering {
        keys.iter()
            .map(|key| {
                let ord = Self::sort_cmp(a.get(&key.field), b.get(&key.field));
                match key.direction {
                    SortDirection::Asc => ord,
                    SortDirection::Desc => ord.reverse(),
                }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| Self::sort_cmp(a.get(ID_FIELD), b.get(ID_FIELD)))
    }
}

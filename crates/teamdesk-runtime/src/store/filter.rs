//! Query filters over JSON documents.
//!
//! Paths are dot separated (`team.user`). A path step that lands on an array
//! fans out over its elements, and a comparison against an array matches when
//! any element matches.

use std::cmp::Ordering;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// A predicate over one document.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document.
    All,
    Eq(String, Value),
    In(String, Vec<Value>),
    Gte(String, Value),
    Lte(String, Value),
    /// Case-insensitive substring match on string values.
    Contains(String, String),
    /// The path is missing or only resolves to `null`.
    IsNull(String),
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
}

fn to_json<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

impl Filter {
    pub fn eq(path: impl Into<String>, value: impl Serialize) -> Self {
        Self::Eq(path.into(), to_json(value))
    }

    pub fn is_in<T: Serialize>(path: impl Into<String>, values: impl IntoIterator<Item = T>) -> Self {
        Self::In(path.into(), values.into_iter().map(to_json).collect())
    }

    pub fn gte(path: impl Into<String>, value: impl Serialize) -> Self {
        Self::Gte(path.into(), to_json(value))
    }

    pub fn lte(path: impl Into<String>, value: impl Serialize) -> Self {
        Self::Lte(path.into(), to_json(value))
    }

    pub fn contains(path: impl Into<String>, needle: impl Into<String>) -> Self {
        Self::Contains(path.into(), needle.into())
    }

    pub fn is_null(path: impl Into<String>) -> Self {
        Self::IsNull(path.into())
    }

    /// Conjunction, collapsing trivial cases.
    pub fn and(filters: impl IntoIterator<Item = Filter>) -> Self {
        let mut parts: Vec<Filter> = filters
            .into_iter()
            .filter(|f| *f != Filter::All)
            .collect();
        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    pub fn or(filters: impl IntoIterator<Item = Filter>) -> Self {
        Self::Or(filters.into_iter().collect())
    }

    pub fn negate(filter: Filter) -> Self {
        Self::Not(Box::new(filter))
    }

    /// Evaluate against a document.
    pub fn matches(&self, doc: &Value) -> bool {
        match self {
            Filter::All => true,
            Filter::Eq(path, expected) => resolve(doc, path).iter().any(|v| *v == expected),
            Filter::In(path, options) => resolve(doc, path)
                .iter()
                .any(|v| options.iter().any(|o| *v == o)),
            Filter::Gte(path, bound) => resolve(doc, path)
                .iter()
                .any(|v| compare(v, bound).is_some_and(|o| o != Ordering::Less)),
            Filter::Lte(path, bound) => resolve(doc, path)
                .iter()
                .any(|v| compare(v, bound).is_some_and(|o| o != Ordering::Greater)),
            Filter::Contains(path, needle) => {
                let needle = needle.to_lowercase();
                resolve(doc, path).iter().any(|v| {
                    v.as_str()
                        .is_some_and(|s| s.to_lowercase().contains(&needle))
                })
            }
            Filter::IsNull(path) => resolve(doc, path).iter().all(|v| v.is_null()),
            Filter::And(parts) => parts.iter().all(|f| f.matches(doc)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(doc)),
            Filter::Not(inner) => !inner.matches(doc),
        }
    }
}

/// Every value a dotted path resolves to, with arrays unwrapped.
pub(crate) fn resolve<'a>(doc: &'a Value, path: &str) -> Vec<&'a Value> {
    let mut current = vec![doc];
    for key in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value {
                Value::Object(map) => next.extend(map.get(key)),
                Value::Array(items) => {
                    next.extend(items.iter().filter_map(|item| item.get(key)));
                }
                _ => {}
            }
        }
        current = next;
    }

    let mut out = Vec::with_capacity(current.len());
    for value in current {
        match value {
            Value::Array(items) => out.extend(items.iter()),
            other => out.push(other),
        }
    }
    out
}

/// Order two scalars of the same kind. Strings that both parse as RFC 3339
/// timestamps compare chronologically.
pub(crate) fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => {
            match (
                x.parse::<DateTime<Utc>>(),
                y.parse::<DateTime<Utc>>(),
            ) {
                (Ok(x), Ok(y)) => Some(x.cmp(&y)),
                _ => Some(x.cmp(y)),
            }
        }
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

/// Sorting and windowing for `find`.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    pub sort: Vec<(String, SortOrder)>,
    pub skip: Option<u64>,
    pub limit: Option<u64>,
}

impl FindOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sort(mut self, path: impl Into<String>, order: SortOrder) -> Self {
        self.sort.push((path.into(), order));
        self
    }

    /// Newest first by `createdAt`.
    pub fn newest_first() -> Self {
        Self::new().sort("createdAt", SortOrder::Desc)
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = Some(skip);
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Compare two documents by the sort keys. Missing values sort first.
    pub(crate) fn cmp_docs(&self, a: &Value, b: &Value) -> Ordering {
        for (path, order) in &self.sort {
            let left = resolve(a, path).into_iter().find(|v| !v.is_null());
            let right = resolve(b, path).into_iter().find(|v| !v.is_null());
            let ord = match (left, right) {
                (None, None) => Ordering::Equal,
                (None, Some(_)) => Ordering::Less,
                (Some(_), None) => Ordering::Greater,
                (Some(l), Some(r)) => compare(l, r).unwrap_or(Ordering::Equal),
            };
            let ord = match order {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    }
}

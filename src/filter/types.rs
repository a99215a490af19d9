use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;

use crate::types::{Document, CREATED_AT_FIELD, ID_FIELD, VERSION_FIELD};

/// Comparison operators a filter condition can carry.
///
/// Only `gt`, `gte`, `lt` and `lte` have a bracketed query-string form;
/// `Ne` is reserved for model scopes built in code. Anything else a client
/// writes in brackets is kept verbatim as `Other` and matches nothing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOp {
    Eq,
    Ne,
    Gt,
    Gte,
    Lt,
    Lte,
    Other(String),
}

impl FilterOp {
    /// Map a bracketed query-string suffix (`price[gte]`) to an operator
    pub fn from_query_suffix(suffix: &str) -> Self {
        match suffix {
            "gt" => FilterOp::Gt,
            "gte" => FilterOp::Gte,
            "lt" => FilterOp::Lt,
            "lte" => FilterOp::Lte,
            other => FilterOp::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            FilterOp::Eq => "eq",
            FilterOp::Ne => "ne",
            FilterOp::Gt => "gt",
            FilterOp::Gte => "gte",
            FilterOp::Lt => "lt",
            FilterOp::Lte => "lte",
            FilterOp::Other(op) => op,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Comparison {
    pub op: FilterOp,
    pub value: Value,
}

/// AND-of-comparisons predicate keyed by field name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Filter {
    conditions: BTreeMap<String, Vec<Comparison>>,
}

impl Filter {
    pub fn new() -> Self {
        Self::default()
    }

    /// `{ field: value }`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new().with(field, FilterOp::Eq, value)
    }

    pub fn by_id(id: &str) -> Self {
        Self::eq(ID_FIELD, id)
    }

    pub fn with(mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) -> Self {
        self.push(field, op, value);
        self
    }

    pub fn push(&mut self, field: impl Into<String>, op: FilterOp, value: impl Into<Value>) {
        self.conditions
            .entry(field.into())
            .or_default()
            .push(Comparison { op, value: value.into() });
    }

    /// Conjunction of both filters
    pub fn and(mut self, other: Filter) -> Self {
        for (field, comparisons) in other.conditions {
            self.conditions.entry(field).or_default().extend(comparisons);
        }
        self
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<Comparison>)> {
        self.conditions.iter()
    }

    pub fn get(&self, field: &str) -> Option<&[Comparison]> {
        self.conditions.get(field).map(Vec::as_slice)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SortKey {
    pub field: String,
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Asc }
    }

    pub fn desc(field: impl Into<String>) -> Self {
        Self { field: field.into(), direction: SortDirection::Desc }
    }

    /// `createdAt` newest first
    pub fn default_order() -> Vec<SortKey> {
        vec![SortKey::desc(CREATED_AT_FIELD)]
    }
}

/// Which fields of a document are returned
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Projection {
    /// Everything except the internal version field
    #[default]
    All,
    /// Only these fields (plus `id`)
    Include(Vec<String>),
    /// Everything except these fields
    Exclude(Vec<String>),
}

impl Projection {
    pub fn apply(&self, mut doc: Document) -> Document {
        match self {
            Projection::All => {
                doc.remove(VERSION_FIELD);
                doc
            }
            Projection::Include(fields) => doc
                .into_iter()
                .filter(|(key, _)| key == ID_FIELD || fields.iter().any(|f| f == key))
                .collect(),
            Projection::Exclude(fields) => {
                for field in fields {
                    doc.remove(field);
                }
                doc
            }
        }
    }
}

/// Parsed representation of an incoming list request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySpec {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub fields: Projection,
    pub page: u64,
    pub limit: u64,
    /// Whether the client asked for a page explicitly
    pub page_requested: bool,
}

impl QuerySpec {
    pub const DEFAULT_PAGE: u64 = 1;
    pub const DEFAULT_LIMIT: u64 = 100;

    /// Documents before the requested page. Saturates, so a page too
    /// large to address lands past every collection.
    pub fn skip(&self) -> u64 {
        self.page.saturating_sub(1).saturating_mul(self.limit)
    }
}

impl Default for QuerySpec {
    fn default() -> Self {
        Self {
            filter: Filter::default(),
            sort: Vec::new(),
            fields: Projection::All,
            page: Self::DEFAULT_PAGE,
            limit: Self::DEFAULT_LIMIT,
            page_requested: false,
        }
    }
}

/// Store-facing query: the pipeline's output
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindQuery {
    pub filter: Filter,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub skip: u64,
    pub limit: Option<u64>,
}

impl FindQuery {
    /// Every document matching `filter`, newest first
    pub fn matching(filter: Filter) -> Self {
        Self {
            filter,
            sort: SortKey::default_order(),
            projection: Projection::All,
            skip: 0,
            limit: None,
        }
    }
}

/// Bind parameter for generated SQL
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    /// Plain text, used for JSONB keys
    Text(String),
    Json(Value),
    Uuid(uuid::Uuid),
    BigInt(i64),
    TextArray(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<SqlParam>,
}

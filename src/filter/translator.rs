use serde_json::{Number, Value};

use super::filter_order::FilterOrder;
use super::types::{Filter, FilterOp, Projection, QuerySpec};
use crate::config::QueryConfig;

/// Turns an HTTP query string into a [`QuerySpec`].
///
/// Permissive by construction: it never fails. Unknown fields and operators
/// are carried through untouched, unparseable paging values fall back to
/// the defaults.
#[derive(Debug, Clone)]
pub struct FilterTranslator {
    default_limit: u64,
    max_limit: u64,
}

impl Default for FilterTranslator {
    fn default() -> Self {
        Self::new(QuerySpec::DEFAULT_LIMIT, u64::MAX)
    }
}

impl FilterTranslator {
    /// Control keys that never become filter conditions
    pub const RESERVED_KEYS: [&'static str; 4] = ["page", "sort", "limit", "fields"];

    pub fn new(default_limit: u64, max_limit: u64) -> Self {
        Self {
            default_limit: default_limit.max(1),
            max_limit: max_limit.max(1),
        }
    }

    pub fn from_config(config: &QueryConfig) -> Self {
        Self::new(config.default_limit, config.max_limit)
    }

    /// Translate a raw (still percent-encoded) query string
    pub fn translate(&self, raw_query: &str) -> QuerySpec {
        self.translate_pairs(url::form_urlencoded::parse(raw_query.as_bytes()))
    }

    pub fn translate_pairs<I, K, V>(&self, pairs: I) -> QuerySpec
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut equalities: Vec<(String, Vec<Value>)> = Vec::new();
        let mut filter = Filter::new();
        let mut limit: Option<String> = None;
        let mut sort: Option<String> = None;
        let mut fields: Option<String> = None;
        let mut page_raw: Option<String> = None;

        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            match key {
                // Last occurrence wins for control keys
                "page" => page_raw = Some(value.to_string()),
                "limit" => limit = Some(value.to_string()),
                "sort" => sort = Some(value.to_string()),
                "fields" => fields = Some(value.to_string()),
                _ => match Self::split_key(key) {
                    (field, FilterOp::Eq) => {
                        let coerced = Self::coerce(value);
                        match equalities.iter_mut().find(|(f, _)| f == field) {
                            Some((_, values)) => values.push(coerced),
                            None => equalities.push((field.to_string(), vec![coerced])),
                        }
                    }
                    (field, op) => filter.push(field, op, Self::coerce(value)),
                },
            }
        }

        // A repeated bare key (`difficulty=easy&difficulty=medium`) matches any of its values
        for (field, mut values) in equalities {
            let value = if values.len() == 1 { values.remove(0) } else { Value::Array(values) };
            filter.push(field, FilterOp::Eq, value);
        }

        QuerySpec {
            filter,
            sort: sort.as_deref().map(FilterOrder::parse_sort_param).unwrap_or_default(),
            fields: fields.as_deref().map(Self::parse_fields).unwrap_or_default(),
            page: page_raw.as_deref().and_then(Self::positive).unwrap_or(QuerySpec::DEFAULT_PAGE),
            limit: limit
                .as_deref()
                .and_then(Self::positive)
                .map(|l| self.cap_limit(l))
                .unwrap_or(self.default_limit.min(self.max_limit)),
            page_requested: page_raw.is_some(),
        }
    }

    /// `price[gte]` -> (`price`, Gte); `price` -> (`price`, Eq).
    /// Anything not shaped like `name[op]` is a plain field name.
    fn split_key(key: &str) -> (&str, FilterOp) {
        if let Some(open) = key.find('[') {
            if open > 0 && key.ends_with(']') {
                let op = &key[open + 1..key.len() - 1];
                if !op.is_empty() && !op.contains(['[', ']']) {
                    return (&key[..open], FilterOp::from_query_suffix(op));
                }
            }
        }
        (key, FilterOp::Eq)
    }

    /// Numeric-looking values become JSON numbers, the rest stay strings
    pub fn coerce(value: &str) -> Value {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Value::String(value.to_string());
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Value::Number(i.into());
        }
        match trimmed.parse::<f64>() {
            Ok(f) if f.is_finite() && Self::looks_numeric(trimmed) => {
                Number::from_f64(f).map(Value::Number).unwrap_or_else(|| Value::String(value.to_string()))
            }
            _ => Value::String(value.to_string()),
        }
    }

    // Rust's f64 parser also accepts "inf", "NaN" and "infinity"
    fn looks_numeric(s: &str) -> bool {
        s.chars().all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'))
    }

    fn parse_fields(raw: &str) -> Projection {
        let names: Vec<&str> = raw
            .split([',', ' '])
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .collect();
        if names.is_empty() {
            return Projection::All;
        }
        if names.iter().all(|n| n.starts_with('-')) {
            return Projection::Exclude(names.iter().map(|n| n[1..].to_string()).collect());
        }
        Projection::Include(
            names
                .into_iter()
                .filter(|n| !n.starts_with('-'))
                .map(|n| n.trim_start_matches('+').to_string())
                .collect(),
        )
    }

    fn positive(raw: &str) -> Option<u64> {
        raw.trim().parse::<u64>().ok().filter(|n| *n >= 1)
    }

    fn cap_limit(&self, limit: u64) -> u64 {
        if limit > self.max_limit {
            tracing::debug!("Limit {} exceeds max {}, capping to max", limit, self.max_limit);
            self.max_limit
        } else {
            limit
        }
    }
}

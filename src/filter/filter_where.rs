use serde_json::Value;
use uuid::Uuid;

use super::types::{Comparison, Filter, FilterOp, SqlParam};
use crate::types::ID_FIELD;

/// Compiles a [`Filter`] into a parameterised `WHERE` clause over the
/// `doc` JSONB column. Values and field names are always bound, never
/// spliced into the statement.
pub struct FilterWhere<'a> {
    params: &'a mut Vec<SqlParam>,
}

impl<'a> FilterWhere<'a> {
    pub fn new(params: &'a mut Vec<SqlParam>) -> Self {
        Self { params }
    }

    /// Conditions joined with AND; `1=1` for an empty filter.
    /// Placeholders continue numbering after whatever `params` already holds.
    pub fn generate(filter: &Filter, params: &mut Vec<SqlParam>) -> String {
        let mut filter_where = FilterWhere::new(params);
        let conditions: Vec<String> = filter
            .iter()
            .flat_map(|(field, comparisons)| comparisons.iter().map(move |c| (field, c)))
            .map(|(field, comparison)| filter_where.build_sql_condition(field, comparison))
            .collect();

        if conditions.is_empty() {
            "1=1".to_string()
        } else {
            conditions.join(" AND ")
        }
    }

    fn build_sql_condition(&mut self, field: &str, condition: &Comparison) -> String {
        if field == ID_FIELD && condition.op == FilterOp::Eq {
            return self.id_equals(&condition.value);
        }

        match &condition.op {
            FilterOp::Eq => {
                let key = self.key(field);
                match &condition.value {
                    Value::Null => format!("coalesce({}, 'null'::jsonb) = 'null'::jsonb", key),
                    Value::Array(values) => {
                        if values.is_empty() {
                            return "1=0".to_string();
                        }
                        let parts: Vec<String> = values.iter().map(|v| self.equals(&key, v)).collect();
                        format!("({})", parts.join(" OR "))
                    }
                    value => self.equals(&key, value),
                }
            }
            FilterOp::Ne => {
                let key = self.key(field);
                format!("{} IS DISTINCT FROM {}", key, self.param(condition.value.clone()))
            }
            FilterOp::Gt => self.ordered(field, ">", &condition.value),
            FilterOp::Gte => self.ordered(field, ">=", &condition.value),
            FilterOp::Lt => self.ordered(field, "<", &condition.value),
            FilterOp::Lte => self.ordered(field, "<=", &condition.value),
            FilterOp::Other(op) => {
                tracing::debug!("Unrecognised filter operator '{}' on '{}' matches nothing", op, field);
                "1=0".to_string()
            }
        }
    }

    // Scalars use containment so that array fields match any element
    fn equals(&mut self, key: &str, value: &Value) -> String {
        match value {
            Value::Object(_) | Value::Array(_) => format!("{} = {}", key, self.param(value.clone())),
            _ => format!("{} @> {}", key, self.param(value.clone())),
        }
    }

    // Only values of the same JSON type are comparable
    fn ordered(&mut self, field: &str, op: &str, value: &Value) -> String {
        let key = self.key(field);
        let param = self.param(value.clone());
        format!("(jsonb_typeof({key}) = jsonb_typeof({param}) AND {key} {op} {param})")
    }

    fn id_equals(&mut self, value: &Value) -> String {
        match value.as_str().and_then(|s| Uuid::parse_str(s).ok()) {
            Some(id) => {
                self.params.push(SqlParam::Uuid(id));
                format!("\"id\" = ${}", self.params.len())
            }
            None => "1=0".to_string(),
        }
    }

    fn key(&mut self, field: &str) -> String {
        self.params.push(SqlParam::Text(field.to_string()));
        format!("(\"doc\" -> ${})", self.params.len())
    }

    fn param(&mut self, value: Value) -> String {
        self.params.push(SqlParam::Json(value));
        format!("${}", self.params.len())
    }
}

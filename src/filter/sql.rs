use serde_json::Value;

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::filter_where::FilterWhere;
use super::types::{Filter, FindQuery, SqlParam, SqlResult};
use crate::types::Document;

/// Statement builder for a single collection table `(id UUID, doc JSONB)`.
pub struct FilterSql {
    table_name: String,
}

impl FilterSql {
    pub fn new(table_name: impl Into<String>) -> Result<Self, FilterError> {
        let table_name = table_name.into();
        Self::validate_table_name(&table_name)?;
        Ok(Self { table_name })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Projection is applied to the fetched documents, not in SQL
    pub fn to_select_sql(&self, query: &FindQuery) -> SqlResult {
        let mut params = Vec::new();
        let where_clause = FilterWhere::generate(&query.filter, &mut params);
        let order_clause = FilterOrder::generate(&query.sort, &mut params);
        let limit_clause = Self::build_limit_clause(query.limit, query.skip, &mut params);

        let query = [
            "SELECT \"doc\"".to_string(),
            format!("FROM \"{}\"", self.table_name),
            format!("WHERE {}", where_clause),
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        SqlResult { query, params }
    }

    pub fn to_find_one_sql(&self, filter: &Filter) -> SqlResult {
        let mut params = Vec::new();
        let where_clause = FilterWhere::generate(filter, &mut params);
        SqlResult {
            query: format!(
                "SELECT \"doc\" FROM \"{}\" WHERE {} LIMIT 1",
                self.table_name, where_clause
            ),
            params,
        }
    }

    pub fn to_count_sql(&self, filter: &Filter) -> SqlResult {
        let mut params = Vec::new();
        let where_clause = FilterWhere::generate(filter, &mut params);
        SqlResult {
            query: format!(
                "SELECT COUNT(*) AS count FROM \"{}\" WHERE {}",
                self.table_name, where_clause
            ),
            params,
        }
    }

    pub fn to_insert_sql(&self, id: uuid::Uuid, doc: &Document) -> SqlResult {
        SqlResult {
            query: format!(
                "INSERT INTO \"{}\" (\"id\", \"doc\") VALUES ($1, $2) RETURNING \"doc\"",
                self.table_name
            ),
            params: vec![SqlParam::Uuid(id), SqlParam::Json(Value::Object(doc.clone()))],
        }
    }

    /// Merge `changes` into the first matching document. Null-valued
    /// changes remove the key instead of storing a JSON null.
    pub fn to_update_sql(&self, filter: &Filter, changes: &Document) -> SqlResult {
        let (removed, merged): (Vec<_>, Vec<_>) = changes.iter().partition(|(_, v)| v.is_null());
        let merged: Document = merged.into_iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let removed: Vec<String> = removed.into_iter().map(|(k, _)| k.clone()).collect();

        let mut params = vec![SqlParam::Json(Value::Object(merged)), SqlParam::TextArray(removed)];
        let where_clause = FilterWhere::generate(filter, &mut params);
        SqlResult {
            query: format!(
                "UPDATE \"{t}\" SET \"doc\" = (\"doc\" || $1) - $2::text[] \
                 WHERE \"id\" = (SELECT \"id\" FROM \"{t}\" WHERE {w} LIMIT 1) RETURNING \"doc\"",
                t = self.table_name,
                w = where_clause
            ),
            params,
        }
    }

    pub fn to_delete_sql(&self, filter: &Filter) -> SqlResult {
        let mut params = Vec::new();
        let where_clause = FilterWhere::generate(filter, &mut params);
        SqlResult {
            query: format!(
                "DELETE FROM \"{t}\" WHERE \"id\" = (SELECT \"id\" FROM \"{t}\" WHERE {w} LIMIT 1)",
                t = self.table_name,
                w = where_clause
            ),
            params,
        }
    }

    pub fn to_create_table_sql(&self) -> String {
        format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" (\"id\" UUID PRIMARY KEY, \"doc\" JSONB NOT NULL)",
            self.table_name
        )
    }

    /// Expression index enforcing uniqueness of a top-level document field
    pub fn to_unique_index_sql(&self, field: &str) -> Result<String, FilterError> {
        if !Self::is_identifier(field) {
            return Err(FilterError::InvalidColumn(field.to_string()));
        }
        Ok(format!(
            "CREATE UNIQUE INDEX IF NOT EXISTS \"{t}_{f}_key\" ON \"{t}\" ((\"doc\" ->> '{f}'))",
            t = self.table_name,
            f = field
        ))
    }

    fn build_limit_clause(limit: Option<u64>, skip: u64, params: &mut Vec<SqlParam>) -> String {
        let mut clause = Vec::new();
        if let Some(limit) = limit {
            params.push(SqlParam::BigInt(i64::try_from(limit).unwrap_or(i64::MAX)));
            clause.push(format!("LIMIT ${}", params.len()));
        }
        if skip > 0 {
            params.push(SqlParam::BigInt(i64::try_from(skip).unwrap_or(i64::MAX)));
            clause.push(format!("OFFSET ${}", params.len()));
        }
        clause.join(" ")
    }

    fn validate_table_name(name: &str) -> Result<(), FilterError> {
        if Self::is_identifier(name) {
            Ok(())
        } else {
            Err(FilterError::InvalidTableName(format!("Invalid table name format: {}", name)))
        }
    }

    fn is_identifier(name: &str) -> bool {
        let mut chars = name.chars();
        matches!(chars.next(), Some(first) if first.is_ascii_alphabetic() || first == '_')
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }
}

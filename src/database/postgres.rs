use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgDatabaseError, PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use super::{Store, StoreError};
use crate::config::DatabaseConfig;
use crate::filter::{Filter, FilterSql, FindQuery, SqlParam, SqlResult};
use crate::types::{document_id, Document};

// Postgres SQLSTATE for unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Postgres-backed store: one `(id UUID, doc JSONB)` table per collection
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub async fn connect(config: &DatabaseConfig) -> Result<Self, StoreError> {
        let url = config
            .url
            .as_deref()
            .ok_or_else(|| StoreError::Backend("DATABASE_URL is not set".to_string()))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url)
            .await?;

        info!("Connected to Postgres (max {} connections)", config.max_connections);
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn close(&self) {
        self.pool.close().await;
        info!("Closed database pool");
    }

    fn query(sql: &SqlResult) -> sqlx::query::Query<'_, sqlx::Postgres, PgArguments> {
        sql.params
            .iter()
            .fold(sqlx::query(&sql.query), |q, param| bind_param_query(q, param))
    }

    async fn fetch_docs(&self, sql: &SqlResult) -> Result<Vec<Document>, StoreError> {
        let rows = Self::query(sql).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_document).collect()
    }

    async fn fetch_doc(&self, sql: &SqlResult) -> Result<Option<Document>, StoreError> {
        let row = Self::query(sql).fetch_optional(&self.pool).await?;
        row.as_ref().map(row_to_document).transpose()
    }

    /// Writes that can hit a unique index
    async fn write_doc(&self, collection: &str, sql: &SqlResult) -> Result<Option<Document>, StoreError> {
        let row = Self::query(sql)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx(collection, e))?;
        row.as_ref().map(row_to_document).transpose()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn register(&self, collection: &str, unique_fields: &[&str]) -> Result<(), StoreError> {
        let sql = FilterSql::new(collection)?;
        sqlx::query(&sql.to_create_table_sql()).execute(&self.pool).await?;
        for field in unique_fields {
            sqlx::query(&sql.to_unique_index_sql(field)?).execute(&self.pool).await?;
        }
        info!("Registered collection '{}' (unique: {:?})", collection, unique_fields);
        Ok(())
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let sql = FilterSql::new(collection)?.to_select_sql(query);
        let docs = self.fetch_docs(&sql).await?;
        Ok(docs.into_iter().map(|doc| query.projection.apply(doc)).collect())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let sql = FilterSql::new(collection)?.to_find_one_sql(filter);
        self.fetch_doc(&sql).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let sql = FilterSql::new(collection)?.to_count_sql(filter);
        let row = Self::query(&sql).fetch_one(&self.pool).await?;
        let count: i64 = row.try_get("count")?;
        Ok(count.max(0) as u64)
    }

    async fn create(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        let id = document_id(&doc)
            .and_then(|id| Uuid::parse_str(id).ok())
            .ok_or(StoreError::MissingId)?;
        let sql = FilterSql::new(collection)?.to_insert_sql(id, &doc);
        self.write_doc(collection, &sql)
            .await?
            .ok_or_else(|| StoreError::Backend("insert returned no row".to_string()))
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        let sql = FilterSql::new(collection)?.to_update_sql(filter, &changes);
        self.write_doc(collection, &sql).await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        let sql = FilterSql::new(collection)?.to_delete_sql(filter);
        let result = Self::query(&sql).execute(&self.pool).await?;
        Ok(result.rows_affected() > 0)
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, StoreError> {
        let sql = FilterSql::new(collection)?;
        let result = sqlx::query(&format!("DELETE FROM \"{}\"", sql.table_name()))
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "postgres"
    }
}

fn row_to_document(row: &PgRow) -> Result<Document, StoreError> {
    match row.try_get::<Value, _>("doc")? {
        Value::Object(doc) => Ok(doc),
        other => Err(StoreError::Backend(format!("stored document is not an object: {}", other))),
    }
}

/// Unique violations become [`StoreError::Duplicate`]. Index names follow
/// `{table}_{field}_key`; anything else (the primary key) reports `id`.
fn map_sqlx(collection: &str, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) {
            let field = db_err
                .constraint()
                .and_then(|c| c.strip_prefix(collection))
                .and_then(|c| c.strip_prefix('_'))
                .and_then(|c| c.strip_suffix("_key"))
                .unwrap_or("id")
                .to_string();
            // Detail reads: Key ((doc ->> 'email'::text))=(a@b.io) already exists.
            let value = db_err
                .try_downcast_ref::<PgDatabaseError>()
                .and_then(|pg| pg.detail())
                .and_then(|detail| detail.split_once(")=("))
                .and_then(|(_, rest)| rest.rsplit_once(") already exists"))
                .map(|(value, _)| value.to_string())
                .unwrap_or_default();
            return StoreError::Duplicate { field, value };
        }
    }
    StoreError::Sqlx(err)
}

fn bind_param_query<'q>(
    q: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
    param: &'q SqlParam,
) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
    match param {
        SqlParam::Text(s) => q.bind(s.as_str()),
        SqlParam::Json(v) => q.bind(v),
        SqlParam::Uuid(id) => q.bind(*id),
        SqlParam::BigInt(n) => q.bind(*n),
        SqlParam::TextArray(items) => q.bind(items.as_slice()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binds_every_param_kind() {
        let sql = SqlResult {
            query: "SELECT $1, $2, $3, $4, $5".to_string(),
            params: vec![
                SqlParam::Text("price".into()),
                SqlParam::Json(serde_json::json!({"a": 1})),
                SqlParam::Uuid(Uuid::new_v4()),
                SqlParam::BigInt(5),
                SqlParam::TextArray(vec!["x".into()]),
            ],
        };
        let query = PgStore::query(&sql);
        assert_eq!(sqlx::Execute::sql(&query), "SELECT $1, $2, $3, $4, $5");
    }
}

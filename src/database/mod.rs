use async_trait::async_trait;
use thiserror::Error;

use crate::filter::{Filter, FilterError, FindQuery};
use crate::types::Document;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Errors from a document store
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Duplicate value for unique field '{field}': {value}")]
    Duplicate { field: String, value: String },

    #[error("Document is missing a valid id")]
    MissingId,

    #[error(transparent)]
    InvalidName(#[from] FilterError),

    #[error("Store error: {0}")]
    Backend(String),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Document persistence used by every handler.
///
/// Collections hold JSON documents keyed by their `id` field. Filters,
/// sort keys and projections have the same meaning in every
/// implementation.
#[async_trait]
pub trait Store: Send + Sync {
    /// Prepare a collection and declare its unique fields
    async fn register(&self, collection: &str, unique_fields: &[&str]) -> Result<(), StoreError>;

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError>;

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError>;

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError>;

    /// Insert a document that already carries its `id`
    async fn create(&self, collection: &str, doc: Document) -> Result<Document, StoreError>;

    /// Merge `changes` into the first document matching `filter`.
    /// Null-valued changes remove the field.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Document,
    ) -> Result<Option<Document>, StoreError>;

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError>;

    async fn delete_all(&self, collection: &str) -> Result<u64, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError>;

    fn backend(&self) -> &'static str;

    async fn find_by_id(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.find_one(collection, &Filter::by_id(id)).await
    }

    async fn update_by_id(
        &self,
        collection: &str,
        id: &str,
        changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        self.update_one(collection, &Filter::by_id(id), changes).await
    }

    async fn delete_by_id(&self, collection: &str, id: &str) -> Result<bool, StoreError> {
        self.delete_one(collection, &Filter::by_id(id)).await
    }
}

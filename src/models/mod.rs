use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::database::Store;
use crate::error::ApiError;
use crate::filter::Filter;
use crate::types::{document_id, timestamp, Document, CREATED_AT_FIELD, ID_FIELD, VERSION_FIELD};

pub mod review;
pub mod schema;
pub mod tour;
pub mod user;

pub use review::Review;
pub use schema::{Field, Schema, ValidationErrors};
pub use tour::Tour;
pub use user::User;

/// When and why a document is being written
#[derive(Debug, Clone, Copy)]
pub struct SaveContext {
    pub now: DateTime<Utc>,
    pub is_new: bool,
}

/// A stored resource: collection, schema and lifecycle steps
pub trait Model: Send + Sync + 'static {
    const COLLECTION: &'static str;

    /// Fields with a unique index
    const UNIQUE: &'static [&'static str] = &[];

    /// Fields that never leave the API
    const HIDDEN: &'static [&'static str] = &[];

    fn schema() -> &'static Schema;

    /// Base filter ANDed into every read
    fn scope() -> Filter {
        Filter::new()
    }

    /// Runs on validated input right before it is written. On updates
    /// `doc` holds only the changed fields.
    fn before_save(_doc: &mut Document, _ctx: &SaveContext) -> Result<(), ApiError> {
        Ok(())
    }

    /// Derived fields added to every document returned
    fn present(_doc: &mut Document) {}

    /// Client-facing view of a stored document
    fn to_output(mut doc: Document) -> Document {
        Self::present(&mut doc);
        for field in Self::HIDDEN {
            doc.remove(*field);
        }
        doc
    }
}

/// Related documents pulled into a response
#[derive(Debug, Clone, Copy)]
pub enum Expansion {
    /// Replace the id (or list of ids) in `field` with the referenced
    /// documents, keeping only `select` (plus `id`). Documents outside
    /// `scope` count as missing.
    Reference {
        field: &'static str,
        collection: &'static str,
        select: &'static [&'static str],
        scope: fn() -> Filter,
    },
    /// Add `as_field`: every document of `collection` inside `scope` whose
    /// `foreign_field` points at this one
    Virtual {
        as_field: &'static str,
        collection: &'static str,
        foreign_field: &'static str,
        scope: fn() -> Filter,
    },
}

/// Validate, stamp and store a new document
pub async fn insert<M: Model>(
    store: &dyn Store,
    input: Document,
    now: DateTime<Utc>,
    id: Option<Uuid>,
) -> Result<Document, ApiError> {
    let mut doc = M::schema().prepare_create(input)?;
    stamp_new(&mut doc, id.unwrap_or_else(Uuid::new_v4), now);
    M::before_save(&mut doc, &SaveContext { now, is_new: true })?;

    let created = store.create(M::COLLECTION, doc).await?;
    tracing::debug!("Created {} in '{}'", document_id(&created).unwrap_or("?"), M::COLLECTION);
    Ok(created)
}

/// Validate and apply client changes to the first in-scope document
/// matching `filter`. `None` when nothing matches.
pub async fn modify<M: Model>(
    store: &dyn Store,
    filter: Filter,
    input: Document,
    now: DateTime<Utc>,
) -> Result<Option<Document>, ApiError> {
    let Some(existing) = store.find_one(M::COLLECTION, &filter.and(M::scope())).await? else {
        return Ok(None);
    };
    let Some(id) = document_id(&existing).map(str::to_string) else {
        tracing::error!("Document without id in '{}'", M::COLLECTION);
        return Err(ApiError::generic());
    };

    let mut changes = M::schema().prepare_update(&existing, input)?;
    M::before_save(&mut changes, &SaveContext { now, is_new: false })?;

    let version = existing.get(VERSION_FIELD).and_then(Value::as_i64).unwrap_or(0);
    changes.insert(VERSION_FIELD.to_string(), Value::from(version + 1));

    Ok(store.update_by_id(M::COLLECTION, &id, changes).await?)
}

/// Remove the first in-scope document matching `filter`
pub async fn remove<M: Model>(store: &dyn Store, filter: Filter) -> Result<bool, ApiError> {
    Ok(store.delete_one(M::COLLECTION, &filter.and(M::scope())).await?)
}

fn stamp_new(doc: &mut Document, id: Uuid, now: DateTime<Utc>) {
    doc.insert(ID_FIELD.to_string(), Value::String(id.to_string()));
    doc.insert(CREATED_AT_FIELD.to_string(), timestamp(now));
    doc.insert(VERSION_FIELD.to_string(), Value::from(0));
}

/// Register every collection with its unique fields
pub async fn register_all(store: &dyn Store) -> Result<(), ApiError> {
    store.register(Tour::COLLECTION, Tour::UNIQUE).await?;
    store.register(User::COLLECTION, User::UNIQUE).await?;
    store.register(Review::COLLECTION, Review::UNIQUE).await?;
    Ok(())
}

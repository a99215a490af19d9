use anyhow::{anyhow, Context};
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use super::Collection;
use crate::database::Store;
use crate::models::{self, Model, Review, Tour, User};
use crate::types::{Document, ID_FIELD};

/// Namespace for ids derived from seed files that do not use UUIDs
const SEED_NAMESPACE: Uuid = Uuid::from_u128(0x6f1c_2b7e_94d3_4a51_b8e0_3c9d_5a27_e104);

/// Create every document through the same validation and lifecycle steps
/// as the API. The `id` (or `_id`) of each entry is kept when it is a UUID.
/// Any other id, such as a 24-hex ObjectId, maps to the same UUID v5 here
/// and in every reference field, so files imported one at a time still
/// point at each other. Stops at the first rejected document.
pub async fn import(
    store: &dyn Store,
    collection: Collection,
    docs: Vec<Value>,
    now: DateTime<Utc>,
) -> anyhow::Result<usize> {
    let mut created = 0;

    for (index, value) in docs.into_iter().enumerate() {
        let Value::Object(mut doc) = value else {
            return Err(anyhow!("Entry {} is not a JSON object", index));
        };
        let id = take_id(&mut doc);
        map_references(&mut doc, references(collection));

        match collection {
            Collection::Tours => insert::<Tour>(store, doc, now, id).await,
            Collection::Users => insert::<User>(store, with_confirmation(doc), now, id).await,
            Collection::Reviews => insert::<Review>(store, doc, now, id).await,
        }
        .with_context(|| format!("Entry {} of {:?} was rejected", index, collection))?;

        created += 1;
    }

    tracing::info!("Imported {} documents into {:?}", created, collection);
    Ok(created)
}

pub async fn delete(store: &dyn Store, collection: Collection) -> anyhow::Result<u64> {
    let deleted = store.delete_all(name(collection)).await?;
    tracing::info!("Deleted {} documents from {:?}", deleted, collection);
    Ok(deleted)
}

fn name(collection: Collection) -> &'static str {
    match collection {
        Collection::Tours => Tour::COLLECTION,
        Collection::Users => User::COLLECTION,
        Collection::Reviews => Review::COLLECTION,
    }
}

async fn insert<M: Model>(
    store: &dyn Store,
    doc: Document,
    now: DateTime<Utc>,
    id: Option<Uuid>,
) -> anyhow::Result<()> {
    models::insert::<M>(store, doc, now, id)
        .await
        .map_err(|e| anyhow!("{}", e.to_json()))?;
    Ok(())
}

fn references(collection: Collection) -> &'static [&'static str] {
    match collection {
        Collection::Tours => &["guides"],
        Collection::Users => &[],
        Collection::Reviews => &["tour", "user"],
    }
}

fn seed_id(raw: &str) -> Uuid {
    Uuid::parse_str(raw).unwrap_or_else(|_| Uuid::new_v5(&SEED_NAMESPACE, raw.as_bytes()))
}

fn take_id(doc: &mut Document) -> Option<Uuid> {
    let raw = doc.remove(ID_FIELD).or_else(|| doc.remove("_id"))?;
    raw.as_str().filter(|s| !s.is_empty()).map(seed_id)
}

fn map_references(doc: &mut Document, fields: &[&str]) {
    for field in fields {
        match doc.get_mut(*field) {
            Some(Value::String(id)) if !id.is_empty() => *id = seed_id(id).to_string(),
            Some(Value::Array(ids)) => {
                for id in ids.iter_mut() {
                    if let Value::String(raw) = id {
                        *raw = seed_id(raw).to_string();
                    }
                }
            }
            _ => {}
        }
    }
}

// Seed files carry plain passwords without a confirmation
fn with_confirmation(mut doc: Document) -> Document {
    if !doc.contains_key("passwordConfirm") {
        if let Some(password) = doc.get(User::PASSWORD).cloned() {
            doc.insert("passwordConfirm".to_string(), password);
        }
    }
    doc
}

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use super::{Store, StoreError};
use crate::filter::{Filter, FilterEval, FindQuery};
use crate::types::{document_id, Document};

#[derive(Debug, Default)]
struct Collection {
    /// Insertion order
    docs: Vec<Document>,
    unique_fields: Vec<String>,
}

impl Collection {
    fn position(&self, filter: &Filter) -> Option<usize> {
        self.docs.iter().position(|doc| FilterEval::matches(doc, filter))
    }

    fn check_unique(&self, candidate: &Document, skip: Option<usize>) -> Result<(), StoreError> {
        for field in &self.unique_fields {
            let value = match candidate.get(field) {
                None | Some(Value::Null) => continue,
                Some(value) => value,
            };
            let clash = self
                .docs
                .iter()
                .enumerate()
                .any(|(i, doc)| Some(i) != skip && doc.get(field) == Some(value));
            if clash {
                return Err(StoreError::Duplicate {
                    field: field.clone(),
                    value: value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string()),
                });
            }
        }
        Ok(())
    }
}

/// Process-local store used for development and tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: RwLock<HashMap<String, Collection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn register(&self, collection: &str, unique_fields: &[&str]) -> Result<(), StoreError> {
        let mut collections = self.collections.write().await;
        let entry = collections.entry(collection.to_string()).or_default();
        for field in unique_fields {
            if !entry.unique_fields.iter().any(|f| f == field) {
                entry.unique_fields.push(field.to_string());
            }
        }
        Ok(())
    }

    async fn find(&self, collection: &str, query: &FindQuery) -> Result<Vec<Document>, StoreError> {
        let collections = self.collections.read().await;
        let Some(coll) = collections.get(collection) else {
            return Ok(Vec::new());
        };

        let mut matched: Vec<&Document> = coll
            .docs
            .iter()
            .filter(|doc| FilterEval::matches(doc, &query.filter))
            .collect();
        matched.sort_by(|a, b| FilterEval::compare_documents(a, b, &query.sort));

        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);
        let limit = query
            .limit
            .map(|l| usize::try_from(l).unwrap_or(usize::MAX))
            .unwrap_or(usize::MAX);

        Ok(matched
            .into_iter()
            .skip(skip)
            .take(limit)
            .map(|doc| query.projection.apply(doc.clone()))
            .collect())
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>, StoreError> {
        let collections = self.collections.read().await;
        Ok(collections
            .get(collection)
            .and_then(|coll| coll.position(filter).map(|i| coll.docs[i].clone())))
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64, StoreError> {
        let collections = self.collections.read().await;
        let count = collections
            .get(collection)
            .map(|coll| coll.docs.iter().filter(|doc| FilterEval::matches(doc, filter)).count())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn create(&self, collection: &str, doc: Document) -> Result<Document, StoreError> {
        let id = document_id(&doc).ok_or(StoreError::MissingId)?.to_string();
        let mut collections = self.collections.write().await;
        let coll = collections.entry(collection.to_string()).or_default();

        if coll.docs.iter().any(|d| document_id(d) == Some(id.as_str())) {
            return Err(StoreError::Duplicate { field: "id".to_string(), value: id });
        }
        coll.check_unique(&doc, None)?;
        coll.docs.push(doc.clone());
        Ok(doc)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        changes: Document,
    ) -> Result<Option<Document>, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(None);
        };
        let Some(index) = coll.position(filter) else {
            return Ok(None);
        };

        let mut updated = coll.docs[index].clone();
        for (key, value) in changes {
            if value.is_null() {
                updated.remove(&key);
            } else {
                updated.insert(key, value);
            }
        }
        coll.check_unique(&updated, Some(index))?;
        coll.docs[index] = updated.clone();
        Ok(Some(updated))
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<bool, StoreError> {
        let mut collections = self.collections.write().await;
        let Some(coll) = collections.get_mut(collection) else {
            return Ok(false);
        };
        match coll.position(filter) {
            Some(index) => {
                coll.docs.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn delete_all(&self, collection: &str) -> Result<u64, StoreError> {
        let mut collections = self.collections.write().await;
        Ok(collections
            .get_mut(collection)
            .map(|coll| std::mem::take(&mut coll.docs).len() as u64)
            .unwrap_or(0))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}

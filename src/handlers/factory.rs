use std::marker::PhantomData;

use futures::future::try_join_all;
use serde_json::{json, Value};

use crate::app::AppState;
use crate::database::Store;
use crate::error::ApiError;
use crate::filter::{Filter, FindQuery, Projection, QueryPipeline};
use crate::middleware::{ApiResponse, ApiResult};
use crate::models::{self, Expansion, Model};
use crate::types::{document_id, Document};

/// Generic CRUD handlers over a [`Model`].
///
/// Every response uses the `{status, data: {data}}` envelope; lists add
/// `results`. Ids that do not resolve to an in-scope document fail with
/// [`ApiError::DOCUMENT_NOT_FOUND`].
pub struct HandlerFactory<M> {
    list_expansions: &'static [Expansion],
    get_expansions: &'static [Expansion],
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> HandlerFactory<M> {
    pub const fn new() -> Self {
        Self::expanding(&[], &[])
    }

    /// Related documents pulled into list and single-document responses
    pub const fn expanding(list: &'static [Expansion], get: &'static [Expansion]) -> Self {
        Self {
            list_expansions: list,
            get_expansions: get,
            _model: PhantomData,
        }
    }

    /// Run the client's query through the pipeline, ANDed with the model
    /// scope and `base` (nested-route constraints)
    pub async fn list(&self, state: &AppState, raw_query: Option<&str>, base: Filter) -> ApiResult<Value> {
        let spec = state.translator.translate(raw_query.unwrap_or_default());
        tracing::debug!("Listing '{}' with {:?}", M::COLLECTION, spec);

        let docs = QueryPipeline::new(spec)
            .with_base_filter(M::scope())
            .with_base_filter(base)
            .execute(state.store.as_ref(), M::COLLECTION)
            .await?;

        let docs = try_join_all(
            docs.into_iter()
                .map(|doc| render::<M>(state.store.as_ref(), doc, self.list_expansions)),
        )
        .await?;

        let results = docs.len();
        Ok(ApiResponse::list(json!({ "data": docs }), results))
    }

    pub async fn get(&self, state: &AppState, id: &str) -> ApiResult<Value> {
        let doc = state
            .store
            .find_one(M::COLLECTION, &Filter::by_id(id).and(M::scope()))
            .await?
            .ok_or_else(ApiError::document_not_found)?;

        let doc = render::<M>(state.store.as_ref(), Projection::All.apply(doc), self.get_expansions).await?;
        Ok(ApiResponse::success(json!({ "data": doc })))
    }

    pub async fn create(&self, state: &AppState, body: Document) -> ApiResult<Value> {
        let created = models::insert::<M>(state.store.as_ref(), body, state.clock.now(), None).await?;
        let created = M::to_output(Projection::All.apply(created));
        Ok(ApiResponse::created(json!({ "data": created })))
    }

    pub async fn update(&self, state: &AppState, id: &str, body: Document) -> ApiResult<Value> {
        let updated = models::modify::<M>(state.store.as_ref(), Filter::by_id(id), body, state.clock.now())
            .await?
            .ok_or_else(ApiError::document_not_found)?;

        let updated = M::to_output(Projection::All.apply(updated));
        Ok(ApiResponse::success(json!({ "data": updated })))
    }

    pub async fn delete(&self, state: &AppState, id: &str) -> ApiResult<()> {
        if !models::remove::<M>(state.store.as_ref(), Filter::by_id(id)).await? {
            return Err(ApiError::document_not_found());
        }
        tracing::info!("Deleted {} from '{}'", id, M::COLLECTION);
        Ok(ApiResponse::<()>::no_content())
    }
}

impl<M: Model> Default for HandlerFactory<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// Expand related documents, then apply the model's output view
async fn render<M: Model>(store: &dyn Store, doc: Document, expansions: &[Expansion]) -> Result<Document, ApiError> {
    let mut doc = doc;
    for expansion in expansions {
        expand(store, &mut doc, expansion).await?;
    }
    Ok(M::to_output(doc))
}

async fn expand(store: &dyn Store, doc: &mut Document, expansion: &Expansion) -> Result<(), ApiError> {
    match *expansion {
        Expansion::Reference { field, collection, select, scope } => {
            let projection = Projection::Include(select.iter().map(|f| f.to_string()).collect());
            let expanded = match doc.get(field) {
                Some(Value::String(id)) => lookup(store, collection, id, scope(), &projection)
                    .await?
                    .map(Value::Object)
                    .unwrap_or(Value::Null),
                Some(Value::Array(ids)) => {
                    let found = try_join_all(
                        ids.iter()
                            .filter_map(Value::as_str)
                            .map(|id| lookup(store, collection, id, scope(), &projection)),
                    )
                    .await?;
                    // Dangling references are dropped
                    Value::Array(found.into_iter().flatten().map(Value::Object).collect())
                }
                _ => return Ok(()),
            };
            doc.insert(field.to_string(), expanded);
        }
        Expansion::Virtual { as_field, collection, foreign_field, scope } => {
            let Some(id) = document_id(doc).map(str::to_string) else {
                return Ok(());
            };
            let related = store
                .find(collection, &FindQuery::matching(Filter::eq(foreign_field, id).and(scope())))
                .await?;
            doc.insert(
                as_field.to_string(),
                Value::Array(related.into_iter().map(Value::Object).collect()),
            );
        }
    }
    Ok(())
}

async fn lookup(
    store: &dyn Store,
    collection: &str,
    id: &str,
    scope: Filter,
    projection: &Projection,
) -> Result<Option<Document>, ApiError> {
    let found = store.find_one(collection, &Filter::by_id(id).and(scope)).await?;
    Ok(found.map(|doc| projection.apply(doc)))
}

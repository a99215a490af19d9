use super::error::QueryError;
use super::filter_order::FilterOrder;
use super::types::{Filter, FindQuery, QuerySpec};
use crate::database::Store;
use crate::types::Document;

/// Applies a [`QuerySpec`] to a collection.
///
/// The stages always run in the same order: filter, sort, field
/// selection, pagination. Callers can only add a base filter (model
/// scopes, nested-route constraints), which is ANDed with the client's.
#[derive(Debug, Clone)]
pub struct QueryPipeline {
    spec: QuerySpec,
    base: Filter,
}

impl QueryPipeline {
    pub fn new(spec: QuerySpec) -> Self {
        Self { spec, base: Filter::new() }
    }

    pub fn with_base_filter(mut self, base: Filter) -> Self {
        self.base = self.base.and(base);
        self
    }

    /// Store query produced by running every stage
    pub fn build(&self) -> FindQuery {
        let mut query = FindQuery::matching(Filter::new());
        self.filter(&mut query);
        self.sort(&mut query);
        self.select_fields(&mut query);
        self.paginate(&mut query);
        query
    }

    fn filter(&self, query: &mut FindQuery) {
        query.filter = self.spec.filter.clone().and(self.base.clone());
    }

    fn sort(&self, query: &mut FindQuery) {
        query.sort = FilterOrder::effective(&self.spec.sort);
    }

    fn select_fields(&self, query: &mut FindQuery) {
        query.projection = self.spec.fields.clone();
    }

    fn paginate(&self, query: &mut FindQuery) {
        query.skip = self.spec.skip();
        query.limit = Some(self.spec.limit);
    }

    /// Run the query. An explicitly requested page past the last matching
    /// document fails with [`QueryError::PageOutOfRange`].
    pub async fn execute(&self, store: &dyn Store, collection: &str) -> Result<Vec<Document>, QueryError> {
        let query = self.build();

        if self.spec.page_requested && self.spec.page > 1 {
            let total = store.count(collection, &query.filter).await?;
            if query.skip >= total {
                tracing::debug!(
                    "Page {} of '{}' out of range: skip {} >= {} matching",
                    self.spec.page,
                    collection,
                    query.skip,
                    total
                );
                return Err(QueryError::PageOutOfRange);
            }
        }

        Ok(store.find(collection, &query).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::filter::translator::FilterTranslator;
    use crate::filter::types::{FilterOp, Projection, SortKey};
    use serde_json::{json, Value};

    async fn priced_store(prices: &[i64]) -> MemoryStore {
        let store = MemoryStore::new();
        for (i, price) in prices.iter().enumerate() {
            let doc = json!({
                "id": uuid::Uuid::new_v4().to_string(),
                "name": format!("tour {}", i),
                "price": price,
                "createdAt": format!("2024-01-0{}T00:00:00.000Z", i + 1),
                "__v": 0,
            });
            store.create("tours", doc.as_object().cloned().unwrap()).await.unwrap();
        }
        store
    }

    fn prices(docs: &[Document]) -> Vec<Value> {
        docs.iter().map(|d| d["price"].clone()).collect()
    }

    #[test]
    fn stages_compose_in_order() {
        let spec = FilterTranslator::default().translate("price[gte]=500&page=3&limit=10&fields=name");
        let query = QueryPipeline::new(spec)
            .with_base_filter(Filter::new().with("secretTour", FilterOp::Ne, true))
            .build();
        assert_eq!(query.filter.get("price").unwrap()[0].op, FilterOp::Gte);
        assert!(query.filter.get("secretTour").is_some());
        assert_eq!(query.sort, SortKey::default_order());
        assert_eq!(query.projection, Projection::Include(vec!["name".into()]));
        assert_eq!((query.skip, query.limit), (20, Some(10)));
    }

    #[tokio::test]
    async fn second_page_of_filtered_sorted_prices() {
        let store = priced_store(&[100, 500, 600, 700, 900]).await;
        let spec = FilterTranslator::default().translate("price[gte]=500&sort=-price&page=2&limit=2");
        let docs = QueryPipeline::new(spec).execute(&store, "tours").await.unwrap();
        assert_eq!(prices(&docs), vec![json!(600), json!(500)]);
    }

    #[tokio::test]
    async fn default_order_is_newest_first_without_version() {
        let store = priced_store(&[1, 2, 3]).await;
        let docs = QueryPipeline::new(QuerySpec::default()).execute(&store, "tours").await.unwrap();
        assert_eq!(prices(&docs), vec![json!(3), json!(2), json!(1)]);
        assert!(docs.iter().all(|d| !d.contains_key("__v")));
    }

    #[tokio::test]
    async fn unaddressable_page_is_out_of_range() {
        let store = priced_store(&[1, 2, 3]).await;
        let spec = FilterTranslator::default().translate("page=9223372036854775809&limit=2");
        let err = QueryPipeline::new(spec).execute(&store, "tours").await.unwrap_err();
        assert!(matches!(err, QueryError::PageOutOfRange));
    }

    #[tokio::test]
    async fn page_past_the_end_is_an_error() {
        let store = priced_store(&[1, 2, 3]).await;
        let spec = FilterTranslator::default().translate("page=3&limit=2");
        let err = QueryPipeline::new(spec).execute(&store, "tours").await.unwrap_err();
        assert!(matches!(err, QueryError::PageOutOfRange));

        let spec = FilterTranslator::default().translate("page=2&limit=2");
        let docs = QueryPipeline::new(spec).execute(&store, "tours").await.unwrap();
        assert_eq!(docs.len(), 1);
    }

    #[tokio::test]
    async fn first_page_of_nothing_is_empty() {
        let store = MemoryStore::new();
        let spec = FilterTranslator::default().translate("page=1");
        let docs = QueryPipeline::new(spec).execute(&store, "tours").await.unwrap();
        assert!(docs.is_empty());
    }
}

mod common;

use axum::http::StatusCode;
use proptest::prelude::*;
use serde_json::{json, Value};

use common::{doc, TestApp};
use tours_api::database::{MemoryStore, Store};
use tours_api::filter::{FilterEval, FilterTranslator, QueryPipeline, SortKey};

fn prices(body: &Value) -> Vec<i64> {
    body["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["price"].as_i64().unwrap())
        .collect()
}

async fn priced_app(prices: &[i64]) -> TestApp {
    let app = TestApp::new().await;
    for (i, price) in prices.iter().enumerate() {
        let difficulty = ["easy", "medium", "difficult"][i % 3];
        app.tour(&format!("Tour number {:02}", i), *price, json!({"difficulty": difficulty}))
            .await;
    }
    app
}

#[tokio::test]
async fn second_page_of_descending_prices() {
    let app = priced_app(&[100, 500, 600, 700, 900]).await;

    let res = app.get("/api/v1/tours?price[gte]=500&sort=-price&page=2&limit=2", None).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["results"], 2);
    assert_eq!(prices(&res.body), vec![600, 500]);
}

#[tokio::test]
async fn default_order_is_newest_first() {
    let app = priced_app(&[300, 100, 200]).await;
    let res = app.get("/api/v1/tours", None).await;
    assert_eq!(prices(&res.body), vec![200, 100, 300]);
}

#[tokio::test]
async fn operators_and_equality() {
    let app = priced_app(&[100, 500, 600, 700, 900]).await;

    let res = app.get("/api/v1/tours?price[lt]=600&sort=price", None).await;
    assert_eq!(prices(&res.body), vec![100, 500]);

    let res = app.get("/api/v1/tours?price[gt]=500&price[lte]=700&sort=price", None).await;
    assert_eq!(prices(&res.body), vec![600, 700]);

    let res = app.get("/api/v1/tours?difficulty=easy&sort=price", None).await;
    assert_eq!(prices(&res.body), vec![100, 700]);

    let res = app.get("/api/v1/tours?difficulty=easy&difficulty=difficult&sort=price", None).await;
    assert_eq!(prices(&res.body), vec![100, 600, 700]);
}

#[tokio::test]
async fn unknown_fields_and_operators_never_error() {
    let app = priced_app(&[100, 500]).await;

    let res = app.get("/api/v1/tours?nonexistent=1", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 0);

    let res = app.get("/api/v1/tours?price[regex]=.*", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 0);
}

#[tokio::test]
async fn field_projection() {
    let app = priced_app(&[100]).await;

    let res = app.get("/api/v1/tours?fields=name,price", None).await;
    let tour = res.body["data"]["data"][0].as_object().unwrap();
    let mut keys: Vec<&str> = tour.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["id", "name", "price"]);

    let res = app.get("/api/v1/tours?fields=-summary,-imageCover", None).await;
    let tour = res.body["data"]["data"][0].as_object().unwrap();
    assert!(!tour.contains_key("summary") && !tour.contains_key("imageCover"));
    assert!(tour.contains_key("__v"), "excluding fields keeps everything else");
}

#[tokio::test]
async fn page_past_the_end_fails() {
    let app = priced_app(&[100, 500, 600]).await;

    let res = app.get("/api/v1/tours?page=3&limit=2", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, json!({"status": "fail", "message": "This page does not exist"}));

    let res = app.get("/api/v1/tours?page=2&limit=2", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 1);

    // Page 1 is always answered, even when nothing matches
    let res = app.get("/api/v1/tours?page=1&price[gt]=10000", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 0);
}

#[tokio::test]
async fn paging_near_numeric_limits() {
    let app = priced_app(&[100, 500, 600]).await;

    let res = app.get("/api/v1/tours?page=9223372036854775809&limit=2", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, json!({"status": "fail", "message": "This page does not exist"}));

    let res = app.get("/api/v1/tours?page=18446744073709551615&limit=18446744073709551615", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    // An oversized limit is capped and the first page still answers
    let res = app.get("/api/v1/tours?limit=18446744073709551615", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 3);
}

fn query_strategy() -> impl Strategy<Value = String> {
    let key = prop_oneof![
        Just("price".to_string()),
        Just("price[gte]".to_string()),
        Just("price[lt]".to_string()),
        Just("difficulty".to_string()),
        Just("rating[foo]".to_string()),
        Just("page".to_string()),
        Just("limit".to_string()),
        Just("sort".to_string()),
        Just("fields".to_string()),
        "[a-z]{1,6}",
    ];
    let value = prop_oneof![
        (0i64..2000).prop_map(|n| n.to_string()),
        "-?[0-9]{1,3}\\.[0-9]{1,2}",
        "[a-zA-Z,\\-]{0,12}",
    ];
    prop::collection::vec((key, value), 0..8).prop_map(|pairs| {
        pairs
            .into_iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&")
    })
}

proptest! {
    #[test]
    fn translation_is_idempotent(query in query_strategy()) {
        let translator = FilterTranslator::new(100, 1000);
        prop_assert_eq!(translator.translate(&query), translator.translate(&query));
    }

    #[test]
    fn pages_are_sorted_before_slicing(
        prices in prop::collection::vec(0i64..50, 1..30),
        limit in 1u64..6,
        descending in any::<bool>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        runtime.block_on(async {
            let store = MemoryStore::new();
            for (i, price) in prices.iter().enumerate() {
                let tour = doc(json!({
                    "id": format!("{:04}", i),
                    "price": price,
                    "createdAt": format!("2024-01-01T00:00:{:02}.000Z", i % 60),
                }));
                store.create("tours", tour).await.unwrap();
            }

            let sort = if descending { "-price" } else { "price" };
            let key = if descending { SortKey::desc("price") } else { SortKey::asc("price") };
            let translator = FilterTranslator::default();
            let pages = (prices.len() as u64).div_ceil(limit);

            let mut previous_last = None;
            for page in 1..=pages {
                let spec = translator.translate(&format!("sort={}&page={}&limit={}", sort, page, limit));
                let docs = QueryPipeline::new(spec).execute(&store, "tours").await.unwrap();
                prop_assert!(docs.len() as u64 <= limit);
                prop_assert!(!docs.is_empty());

                for pair in docs.windows(2) {
                    prop_assert!(FilterEval::compare_documents(&pair[0], &pair[1], &[key.clone()]).is_le());
                }
                if let Some(last) = previous_last.take() {
                    prop_assert!(FilterEval::compare_documents(&last, &docs[0], &[key.clone()]).is_le());
                }
                previous_last = docs.last().cloned();
            }

            let past = translator.translate(&format!("page={}&limit={}", pages + 1, limit));
            prop_assert!(QueryPipeline::new(past).execute(&store, "tours").await.is_err());
            Ok(())
        })?;
    }
}

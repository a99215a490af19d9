mod common;

use axum::http::StatusCode;
use serde_json::{json, Value};

use common::TestApp;

const NOT_FOUND: &str = "No Document Found With This Id";

fn new_tour(name: &str) -> Value {
    json!({
        "name": name,
        "duration": 14,
        "maxGroupSize": 12,
        "difficulty": "difficult",
        "price": 1497,
        "priceDiscount": 997,
        "summary": "  Exploring the jaw-dropping US east coast by foot and by boat  ",
        "imageCover": "tour-3-cover.jpg",
        "startDates": ["2024-06-19", "2024-07-20T09:00:00Z"],
        "__v": 42,
        "slug": "chosen-by-client"
    })
}

fn names(body: &Value) -> Vec<String> {
    body["data"]["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn managers_create_tours_through_the_lifecycle() {
    let app = TestApp::new().await;
    let (_, token) = app.user("Lead Guide", "lead-guide").await;

    let res = app.post("/api/v1/tours", Some(&token), new_tour("The Sea Explorer")).await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);
    assert_eq!(res.body["status"], "success");

    let tour = &res.body["data"]["data"];
    assert_eq!(tour["slug"], "the-sea-explorer");
    assert_eq!(tour["summary"], "Exploring the jaw-dropping US east coast by foot and by boat");
    assert_eq!(tour["ratingsAverage"], json!(4.5));
    assert_eq!(tour["durationWeeks"], json!(2));
    assert_eq!(tour["startDates"][0], "2024-06-19T00:00:00.000Z");
    assert!(tour.get("__v").is_none());

    let stored = app.stored("tours", tour["id"].as_str().unwrap()).await.unwrap();
    assert_eq!(stored["__v"], json!(0));
    assert_eq!(stored["createdAt"], "2024-05-01T09:00:00.000Z");
}

#[tokio::test]
async fn create_reports_every_violation() {
    let app = TestApp::new().await;
    let (_, token) = app.user("Admin", "admin").await;

    let res = app
        .post(
            "/api/v1/tours",
            Some(&token),
            json!({"name": "Short", "difficulty": "extreme", "ratingsAverage": 7, "price": 100, "priceDiscount": 150}),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["status"], "fail");
    assert!(res.body["message"].as_str().unwrap().starts_with("Invalid input data."));

    let errors = res.body["errors"].as_object().unwrap();
    for field in ["name", "difficulty", "ratingsAverage", "priceDiscount", "duration", "summary", "imageCover"] {
        assert!(errors.contains_key(field), "missing error for {}: {}", field, res.body);
    }
}

#[tokio::test]
async fn tour_names_are_unique() {
    let app = TestApp::new().await;
    let (_, token) = app.user("Admin", "admin").await;
    app.tour("The Forest Hiker", 397, json!({})).await;

    let res = app.post("/api/v1/tours", Some(&token), new_tour("The Forest Hiker")).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Duplicate field value: The Forest Hiker. Please use another value!");
}

#[tokio::test]
async fn writes_are_restricted_to_managers() {
    let app = TestApp::new().await;
    let (_, user) = app.user("Plain User", "user").await;
    let (_, guide) = app.user("Some Guide", "guide").await;
    let id = app.tour("The Snow Adventurer", 997, json!({})).await;

    let res = app.post("/api/v1/tours", None, new_tour("The Star Gazer Tour")).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    for token in [&user, &guide] {
        let res = app.post("/api/v1/tours", Some(token), new_tour("The Star Gazer Tour")).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
        let res = app.delete(&format!("/api/v1/tours/{}", id), Some(token)).await;
        assert_eq!(res.status, StatusCode::FORBIDDEN);
    }

    // Reads stay public
    assert_eq!(app.get(&format!("/api/v1/tours/{}", id), None).await.status, StatusCode::OK);
}

#[tokio::test]
async fn update_and_delete_by_id() {
    let app = TestApp::new().await;
    let (_, token) = app.user("Admin", "admin").await;
    let id = app.tour("The Park Camper Tour", 1497, json!({})).await;
    let path = format!("/api/v1/tours/{}", id);

    let res = app.patch(&path, Some(&token), json!({"name": "The Park Camper Deluxe", "price": 1597})).await;
    assert_eq!(res.status, StatusCode::OK, "{}", res.body);
    assert_eq!(res.body["data"]["data"]["slug"], "the-park-camper-deluxe");
    assert_eq!(res.body["data"]["data"]["price"], json!(1597));
    assert_eq!(app.stored("tours", &id).await.unwrap()["__v"], json!(1));

    let res = app.patch(&path, Some(&token), json!({"priceDiscount": 2000})).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let res = app.delete(&path, Some(&token)).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);
    assert!(app.stored("tours", &id).await.is_none());
}

#[tokio::test]
async fn missing_ids_fail_the_same_way() {
    let app = TestApp::new().await;
    let (_, token) = app.user("Admin", "admin").await;
    let missing = "/api/v1/tours/5c88fa8cf4afda39709c2955";
    let expected = json!({"status": "fail", "message": NOT_FOUND});

    let res = app.get(missing, None).await;
    assert_eq!((res.status, &res.body), (StatusCode::NOT_FOUND, &expected));

    let res = app.patch(missing, Some(&token), json!({"price": 10})).await;
    assert_eq!((res.status, &res.body), (StatusCode::NOT_FOUND, &expected));

    let res = app.delete(missing, Some(&token)).await;
    assert_eq!((res.status, &res.body), (StatusCode::NOT_FOUND, &expected));
}

#[tokio::test]
async fn secret_tours_are_hidden() {
    let app = TestApp::new().await;
    let (_, token) = app.user("Admin", "admin").await;
    app.tour("The Northern Lights", 1497, json!({})).await;
    let secret = app.tour("The Secret Valley Tour", 997, json!({"secretTour": true})).await;

    let res = app.get("/api/v1/tours", None).await;
    assert_eq!(names(&res.body), vec!["The Northern Lights"]);

    assert_eq!(app.get(&format!("/api/v1/tours/{}", secret), None).await.status, StatusCode::NOT_FOUND);
    let res = app.patch(&format!("/api/v1/tours/{}", secret), Some(&token), json!({"price": 1})).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_expands_guides_and_reviews() {
    let app = TestApp::new().await;
    let (guide, _) = app.user("Steven Miller", "lead-guide").await;
    let (_, reviewer) = app.user("Sophie Louise", "user").await;
    let id = app.tour("The City Wanderer", 1197, json!({"guides": [guide]})).await;

    let res = app
        .post(
            &format!("/api/v1/tours/{}/reviews", id),
            Some(&reviewer),
            json!({"review": "Amazing city tour, great guide!", "rating": 5}),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED, "{}", res.body);

    let res = app.get(&format!("/api/v1/tours/{}", id), None).await;
    let tour = &res.body["data"]["data"];
    assert_eq!(tour["guides"][0]["name"], "Steven Miller");
    assert_eq!(tour["guides"][0]["role"], "lead-guide");
    assert!(tour["guides"][0].get("password").is_none());
    assert_eq!(tour["reviews"].as_array().unwrap().len(), 1);
    assert_eq!(tour["reviews"][0]["rating"], json!(5));
}

#[tokio::test]
async fn deactivated_guides_leave_their_tours() {
    let app = TestApp::new().await;
    let (active, _) = app.user("Steven Miller", "lead-guide").await;
    let (leaving, leaving_token) = app.user("Lisa Brown", "guide").await;
    let id = app.tour("The City Wanderer", 1197, json!({"guides": [active, leaving]})).await;

    let res = app.delete("/api/v1/users/deleteMe", Some(&leaving_token)).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app.get(&format!("/api/v1/tours/{}", id), None).await;
    let guides = res.body["data"]["data"]["guides"].as_array().unwrap();
    assert_eq!(guides.len(), 1);
    assert_eq!(guides[0]["id"], json!(active));

    let res = app.get("/api/v1/tours", None).await;
    assert_eq!(res.body["data"]["data"][0]["guides"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn top_five_cheap_alias() {
    let app = TestApp::new().await;
    let tours = [
        ("The Forest Hiker", 397, 4.7),
        ("The Sea Explorer", 497, 4.8),
        ("The Snow Adventurer", 997, 4.5),
        ("The City Wanderer", 1197, 4.8),
        ("The Park Camper", 1497, 4.9),
        ("The Sports Lover", 2997, 4.2),
        ("The Wine Taster", 1997, 4.4),
    ];
    for (name, price, rating) in tours {
        app.tour(name, price, json!({"ratingsAverage": rating})).await;
    }

    let res = app.get("/api/v1/tours/top-5-cheap?limit=50", None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["results"], 5);
    assert_eq!(
        names(&res.body),
        vec!["The Park Camper", "The Sea Explorer", "The City Wanderer", "The Forest Hiker", "The Snow Adventurer"]
    );

    let first = res.body["data"]["data"][0].as_object().unwrap();
    let mut keys: Vec<&str> = first.keys().map(String::as_str).collect();
    keys.sort_unstable();
    assert_eq!(keys, vec!["difficulty", "id", "name", "price", "ratingsAverage", "summary"]);
}

#[tokio::test]
async fn malformed_bodies_use_the_fail_envelope() {
    let app = TestApp::new().await;
    let (_, token) = app.user("Admin", "admin").await;

    let res = app.post("/api/v1/tours", Some(&token), json!(["not", "an", "object"])).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.body["message"], "Request body must be a JSON object");
}

#[tokio::test]
async fn unknown_routes_are_not_found() {
    let app = TestApp::new().await;
    let res = app.get("/api/v1/bookings", None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
    assert_eq!(res.body, json!({"status": "fail", "message": "Can't find /api/v1/bookings on this server!"}));
}

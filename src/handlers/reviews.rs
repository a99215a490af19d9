use axum::{
    extract::{Path, RawQuery, State},
    routing::{delete, get, patch, post},
    Extension, Router,
};
use serde_json::Value;

use super::factory::HandlerFactory;
use super::JsonBody;
use crate::app::AppState;
use crate::auth::{Principal, Role};
use crate::filter::Filter;
use crate::middleware::{protect, restrict, ApiResult};
use crate::models::Review;

static REVIEWS: HandlerFactory<Review> =
    HandlerFactory::expanding(&[Review::TOUR, Review::USER], &[Review::TOUR, Review::USER]);

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/",
            protect(get(list_reviews), state).merge(restrict(post(create_review), state, &[Role::User])),
        )
        .route(
            "/:id",
            protect(get(get_review), state).merge(restrict(
                patch(update_review).merge(delete(delete_review)),
                state,
                &[Role::User, Role::Admin],
            )),
        )
}

/// GET /api/v1/reviews
pub async fn list_reviews(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    REVIEWS.list(&state, query.as_deref(), Filter::new()).await
}

/// GET /api/v1/tours/:id/reviews - reviews of one tour
pub async fn list_tour_reviews(
    State(state): State<AppState>,
    Path(tour_id): Path<String>,
    RawQuery(query): RawQuery,
) -> ApiResult<Value> {
    REVIEWS.list(&state, query.as_deref(), Filter::eq("tour", tour_id)).await
}

/// POST /api/v1/reviews and POST /api/v1/tours/:id/reviews
///
/// `tour` defaults to the tour in the path and `user` to the caller.
pub async fn create_review(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    tour_id: Option<Path<String>>,
    JsonBody(mut body): JsonBody,
) -> ApiResult<Value> {
    if let Some(Path(tour_id)) = tour_id {
        body.entry("tour").or_insert(Value::String(tour_id));
    }
    body.entry("user").or_insert(Value::String(principal.id));
    REVIEWS.create(&state, body).await
}

/// GET /api/v1/reviews/:id
pub async fn get_review(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    REVIEWS.get(&state, &id).await
}

/// PATCH /api/v1/reviews/:id
pub async fn update_review(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    REVIEWS.update(&state, &id, body).await
}

/// DELETE /api/v1/reviews/:id
pub async fn delete_review(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    REVIEWS.delete(&state, &id).await
}

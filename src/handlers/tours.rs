use axum::{
    extract::{Path, RawQuery, State},
    routing::{delete, get, patch, post},
    Router,
};
use serde_json::Value;

use super::factory::HandlerFactory;
use super::reviews;
use super::JsonBody;
use crate::app::AppState;
use crate::auth::Role;
use crate::filter::Filter;
use crate::middleware::{protect, restrict, ApiResult};
use crate::models::Tour;

static TOURS: HandlerFactory<Tour> = HandlerFactory::expanding(&[Tour::GUIDES], &[Tour::GUIDES, Tour::REVIEWS]);

/// Query appended to the client's for the cheapest well-rated tours
const TOP_FIVE_CHEAP: &str = "limit=5&sort=-ratingsAverage,price&fields=name,price,ratingsAverage,summary,difficulty";

const MANAGERS: &[Role] = &[Role::Admin, Role::LeadGuide];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(list_tours).merge(restrict(post(create_tour), state, MANAGERS)))
        .route("/top-5-cheap", get(top_five_cheap))
        .route(
            "/:id",
            get(get_tour).merge(restrict(patch(update_tour).merge(delete(delete_tour)), state, MANAGERS)),
        )
        .route(
            "/:id/reviews",
            protect(get(reviews::list_tour_reviews), state)
                .merge(restrict(post(reviews::create_review), state, &[Role::User])),
        )
}

/// GET /api/v1/tours - list tours
pub async fn list_tours(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    TOURS.list(&state, query.as_deref(), Filter::new()).await
}

/// GET /api/v1/tours/top-5-cheap - the five best rated, cheapest first
pub async fn top_five_cheap(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    // Control keys resolve to their last occurrence, so the alias wins
    let query = match query.as_deref() {
        Some(q) if !q.is_empty() => format!("{}&{}", q, TOP_FIVE_CHEAP),
        _ => TOP_FIVE_CHEAP.to_string(),
    };
    TOURS.list(&state, Some(&query), Filter::new()).await
}

/// GET /api/v1/tours/:id - one tour with its guides and reviews
pub async fn get_tour(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    TOURS.get(&state, &id).await
}

/// POST /api/v1/tours
pub async fn create_tour(State(state): State<AppState>, JsonBody(body): JsonBody) -> ApiResult<Value> {
    TOURS.create(&state, body).await
}

/// PATCH /api/v1/tours/:id
pub async fn update_tour(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    TOURS.update(&state, &id, body).await
}

/// DELETE /api/v1/tours/:id
pub async fn delete_tour(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    TOURS.delete(&state, &id).await
}

use axum::{
    extract::{Path, RawQuery, State},
    routing::{delete, get, patch, post},
    Extension, Router,
};
use serde_json::{json, Map, Value};

use super::auth;
use super::factory::HandlerFactory;
use super::JsonBody;
use crate::app::AppState;
use crate::auth::{Principal, Role};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::middleware::{protect, restrict, ApiResponse, ApiResult};
use crate::models::{self, Model, User};

static USERS: HandlerFactory<User> = HandlerFactory::new();

/// Fields a user may change about themselves through `updateMe`
const SELF_EDITABLE: &[&str] = &["name", "email"];

pub fn routes(state: &AppState) -> Router<AppState> {
    Router::new()
        // Public
        .route("/signup", post(auth::signup))
        .route("/login", post(auth::login))
        .route("/forgotPassword", post(auth::forgot_password))
        .route("/resetPassword/:token", patch(auth::reset_password))
        // Logged-in user
        .route("/updateMyPassword", protect(patch(auth::update_my_password), state))
        .route("/me", protect(get(get_me), state))
        .route("/updateMe", protect(patch(update_me), state))
        .route("/deleteMe", protect(delete(delete_me), state))
        // Administration
        .route("/", restrict(get(list_users), state, &[Role::Admin]))
        .route(
            "/:id",
            restrict(get(get_user).patch(update_user).delete(delete_user), state, &[Role::Admin]),
        )
}

/// GET /api/v1/users/me
pub async fn get_me(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<Value> {
    USERS.get(&state, &principal.id).await
}

/// PATCH /api/v1/users/updateMe - change name or email of the logged-in user
pub async fn update_me(
    State(state): State<AppState>,
    Extension(principal): Extension<Principal>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    if body.contains_key(User::PASSWORD) || body.contains_key("passwordConfirm") {
        return Err(ApiError::bad_request(
            "This route is not for password updates. Please use /updateMyPassword.",
        ));
    }

    let changes: Map<String, Value> = body
        .into_iter()
        .filter(|(key, _)| SELF_EDITABLE.contains(&key.as_str()))
        .collect();

    let user = models::modify::<User>(
        state.store.as_ref(),
        Filter::by_id(&principal.id),
        changes,
        state.clock.now(),
    )
    .await?
    .ok_or_else(ApiError::document_not_found)?;

    Ok(ApiResponse::success(json!({ "user": User::to_output(user) })))
}

/// DELETE /api/v1/users/deleteMe - deactivate the logged-in user
pub async fn delete_me(State(state): State<AppState>, Extension(principal): Extension<Principal>) -> ApiResult<()> {
    let mut changes = Map::new();
    changes.insert("active".to_string(), Value::Bool(false));
    state.store.update_by_id(User::COLLECTION, &principal.id, changes).await?;

    tracing::info!("User '{}' deactivated their account", principal.id);
    Ok(ApiResponse::<()>::no_content())
}

/// GET /api/v1/users
pub async fn list_users(State(state): State<AppState>, RawQuery(query): RawQuery) -> ApiResult<Value> {
    USERS.list(&state, query.as_deref(), Filter::new()).await
}

/// GET /api/v1/users/:id
pub async fn get_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Value> {
    USERS.get(&state, &id).await
}

/// PATCH /api/v1/users/:id
pub async fn update_user(
    State(state): State<AppState>,
    Path(id): Path<String>,
    JsonBody(body): JsonBody,
) -> ApiResult<Value> {
    USERS.update(&state, &id, body).await
}

/// DELETE /api/v1/users/:id
pub async fn delete_user(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<()> {
    USERS.delete(&state, &id).await
}

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    Extension,
};
use serde_json::{json, Map, Value};

use super::JsonBody;
use crate::app::AppState;
use crate::auth::{generate_reset_token, hash_reset_token, verify_password};
use crate::error::ApiError;
use crate::filter::{Filter, FilterOp};
use crate::middleware::{CurrentUser, TOKEN_COOKIE};
use crate::models::{self, Model, User};
use crate::services::Recipient;
use crate::types::{document_id, timestamp, Document};

const RESET_TOKEN: &str = "passwordResetToken";
const RESET_EXPIRES: &str = "passwordResetExpires";

/// POST /api/v1/users/signup - register a regular user and log them in
pub async fn signup(State(state): State<AppState>, JsonBody(mut body): JsonBody) -> Result<Response, ApiError> {
    // Roles are granted by admins only
    body.remove("role");

    let user = models::insert::<User>(state.store.as_ref(), body, state.clock.now(), None).await?;

    let url = format!("{}/me", state.config.server.public_url);
    if let Err(e) = state.mailer.send_welcome(&recipient(&user), &url).await {
        tracing::warn!("Welcome mail not sent: {}", e);
    }

    send_token(&state, user, StatusCode::CREATED)
}

/// POST /api/v1/users/login - exchange email and password for a token
pub async fn login(State(state): State<AppState>, JsonBody(body): JsonBody) -> Result<Response, ApiError> {
    let (Some(email), Some(password)) = (string_field(&body, "email"), string_field(&body, "password")) else {
        return Err(ApiError::bad_request("Please provide email and password"));
    };

    let user = find_by_email(&state, email)
        .await?
        .filter(|user| string_field(user, User::PASSWORD).is_some_and(|hash| verify_password(password, hash)));
    let Some(user) = user else {
        tracing::warn!("Failed login for '{}'", email);
        return Err(ApiError::unauthorized("Incorrect email or password"));
    };

    send_token(&state, user, StatusCode::OK)
}

/// POST /api/v1/users/forgotPassword - mail a single-use reset link
pub async fn forgot_password(State(state): State<AppState>, JsonBody(body): JsonBody) -> Result<Response, ApiError> {
    let email = string_field(&body, "email").unwrap_or_default();
    let user = find_by_email(&state, email)
        .await?
        .ok_or_else(|| ApiError::not_found("There is no user with that email address."))?;
    let id = user_id(&user)?;

    let (reset_token, digest) = generate_reset_token();
    let expires = state
        .clock
        .now()
        .checked_add_signed(state.config.security.password_reset_ttl())
        .ok_or_else(|| {
            tracing::error!("Password reset expiry out of range");
            ApiError::generic()
        })?;

    let mut changes = Map::new();
    changes.insert(RESET_TOKEN.to_string(), Value::String(digest));
    changes.insert(RESET_EXPIRES.to_string(), timestamp(expires));
    state.store.update_by_id(User::COLLECTION, &id, changes).await?;

    let url = format!(
        "{}/api/v1/users/resetPassword/{}",
        state.config.server.public_url, reset_token
    );
    if let Err(e) = state.mailer.send_password_reset(&recipient(&user), &url).await {
        tracing::error!("Password reset mail for '{}' failed: {}", id, e);

        let mut clear = Map::new();
        clear.insert(RESET_TOKEN.to_string(), Value::Null);
        clear.insert(RESET_EXPIRES.to_string(), Value::Null);
        state.store.update_by_id(User::COLLECTION, &id, clear).await?;

        return Err(ApiError::internal_server_error(
            "There was an error sending the email. Try again later!",
        ));
    }

    Ok(Json(json!({
        "status": "success",
        "message": "Token sent to email!",
    }))
    .into_response())
}

/// PATCH /api/v1/users/resetPassword/:token - set a new password with a
/// reset token that has not expired
pub async fn reset_password(
    State(state): State<AppState>,
    Path(token): Path<String>,
    JsonBody(body): JsonBody,
) -> Result<Response, ApiError> {
    let now = state.clock.now();
    let filter = Filter::eq(RESET_TOKEN, hash_reset_token(&token))
        .with(RESET_EXPIRES, FilterOp::Gt, timestamp(now))
        .and(User::scope());

    let user = state
        .store
        .find_one(User::COLLECTION, &filter)
        .await?
        .ok_or_else(|| ApiError::bad_request("Token is invalid or has expired"))?;

    let updated = change_password(&state, &user, body).await?;
    send_token(&state, updated, StatusCode::OK)
}

/// PATCH /api/v1/users/updateMyPassword - change the password of the
/// logged-in user after checking the current one
pub async fn update_my_password(
    State(state): State<AppState>,
    Extension(CurrentUser(user)): Extension<CurrentUser>,
    JsonBody(body): JsonBody,
) -> Result<Response, ApiError> {
    let current = string_field(&body, "passwordCurrent").unwrap_or_default();
    let matches = string_field(&user, User::PASSWORD).is_some_and(|hash| verify_password(current, hash));
    if !matches {
        return Err(ApiError::unauthorized("Your current password is wrong."));
    }

    let updated = change_password(&state, &user, body).await?;
    send_token(&state, updated, StatusCode::OK)
}

/// Apply `password` and `passwordConfirm` from `body` through the user
/// lifecycle (hashing, change stamp, reset token cleared)
async fn change_password(state: &AppState, user: &Document, body: Document) -> Result<Document, ApiError> {
    if string_field(&body, User::PASSWORD).is_none() {
        return Err(ApiError::bad_request("Please provide password and passwordConfirm"));
    }

    let input: Document = body
        .into_iter()
        .filter(|(key, _)| key == User::PASSWORD || key == "passwordConfirm")
        .collect();

    let id = user_id(user)?;
    models::modify::<User>(state.store.as_ref(), Filter::by_id(&id), input, state.clock.now())
        .await?
        .ok_or_else(|| ApiError::unauthorized(ApiError::DEFAULT_UNAUTHORIZED))
}

/// Issue a token for `user` and return it both as a cookie and in the body
fn send_token(state: &AppState, user: Document, status: StatusCode) -> Result<Response, ApiError> {
    let token = state.tokens.issue(&user_id(&user)?)?;

    let mut cookie = format!(
        "{}={}; Path=/; Max-Age={}; HttpOnly; SameSite=Lax",
        TOKEN_COOKIE,
        token,
        state.tokens.ttl().num_seconds()
    );
    if state.config.security.cookie_secure {
        cookie.push_str("; Secure");
    }

    let body = json!({
        "status": "success",
        "token": token,
        "data": { "user": User::to_output(user) },
    });
    Ok((status, [(header::SET_COOKIE, cookie)], Json(body)).into_response())
}

async fn find_by_email(state: &AppState, email: &str) -> Result<Option<Document>, ApiError> {
    let filter = Filter::eq("email", email.trim().to_lowercase()).and(User::scope());
    Ok(state.store.find_one(User::COLLECTION, &filter).await?)
}

fn user_id(user: &Document) -> Result<String, ApiError> {
    document_id(user).map(str::to_string).ok_or_else(|| {
        tracing::error!("User document without id");
        ApiError::generic()
    })
}

fn string_field<'a>(doc: &'a Document, field: &str) -> Option<&'a str> {
    doc.get(field).and_then(Value::as_str).filter(|s| !s.is_empty())
}

fn recipient(user: &Document) -> Recipient {
    Recipient {
        email: string_field(user, "email").unwrap_or_default().to_string(),
        name: string_field(user, "name").unwrap_or_default().to_string(),
    }
}

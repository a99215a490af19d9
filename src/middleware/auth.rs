use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};

use crate::app::AppState;
use crate::auth::{Principal, RoleSet};
use crate::error::ApiError;
use crate::filter::Filter;
use crate::models::{Model, User};
use crate::types::{document_id, Document};

/// Name of the cookie carrying the session token
pub const TOKEN_COOKIE: &str = "jwt";

/// Live user record of the authenticated principal
#[derive(Clone, Debug)]
pub struct CurrentUser(pub Document);

/// Authenticates the request and injects [`Principal`] and [`CurrentUser`].
///
/// The token comes from a `Bearer` Authorization header, or the `jwt`
/// cookie when the header is absent. Every rejection carries the same
/// message; the reason is only logged.
pub async fn authenticate(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_jwt_from_headers(request.headers()).map_err(reject)?;
    let claims = state.tokens.verify(&token)?;

    let filter = Filter::by_id(&claims.sub).and(User::scope());
    let user = state
        .store
        .find_one(User::COLLECTION, &filter)
        .await?
        .ok_or_else(|| reject(format!("User '{}' no longer exists or is inactive", claims.sub)))?;

    if User::changed_password_after(&user, claims.iat) {
        return Err(reject(format!("User '{}' changed password after token was issued", claims.sub)));
    }

    let principal = Principal {
        id: document_id(&user).unwrap_or(&claims.sub).to_string(),
        role: User::role(&user),
    };
    request.extensions_mut().insert(principal);
    request.extensions_mut().insert(CurrentUser(user));

    Ok(next.run(request).await)
}

/// Lets the request through only when the authenticated role is in `roles`.
/// Must run after [`authenticate`].
pub async fn restrict_to(
    State(roles): State<RoleSet>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(principal) = request.extensions().get::<Principal>() else {
        return Err(reject("Role check without an authenticated principal".to_string()));
    };

    if !roles.contains(principal.role) {
        tracing::warn!("User '{}' with role '{}' denied", principal.id, principal.role);
        return Err(ApiError::forbidden());
    }

    Ok(next.run(request).await)
}

fn reject(reason: String) -> ApiError {
    tracing::warn!("Authentication failed: {}", reason);
    ApiError::unauthorized(ApiError::DEFAULT_UNAUTHORIZED)
}

/// Extract the JWT from the Authorization header or the session cookie
fn extract_jwt_from_headers(headers: &HeaderMap) -> Result<String, String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| "Invalid Authorization header format".to_string())?;

        let token = auth_str
            .strip_prefix("Bearer ")
            .ok_or_else(|| "Authorization header must use Bearer token format".to_string())?;
        if token.trim().is_empty() {
            return Err("Empty JWT token".to_string());
        }
        return Ok(token.trim().to_string());
    }

    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == TOKEN_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
        .ok_or_else(|| "Missing Authorization header".to_string())
}

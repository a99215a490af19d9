use axum::{
    async_trait,
    extract::{FromRequest, Request},
    Json,
};
use serde_json::Value;

use crate::error::ApiError;
use crate::types::Document;

/// JSON object request body. Malformed bodies are rejected with a `fail`
/// envelope instead of axum's plain-text rejection.
#[derive(Debug, Clone, Default)]
pub struct JsonBody(pub Document);

#[async_trait]
impl<S> FromRequest<S> for JsonBody
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state).await.map_err(|rejection| {
            tracing::debug!("Rejected request body: {}", rejection.body_text());
            ApiError::bad_request(format!("Invalid request body: {}", rejection.body_text()))
        })?;

        match value {
            Value::Object(doc) => Ok(JsonBody(doc)),
            _ => Err(ApiError::bad_request("Request body must be a JSON object")),
        }
    }
}

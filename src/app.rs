use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Json},
    routing::get,
    Router,
};
use serde_json::json;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::auth::{Clock, TokenService};
use crate::config::AppConfig;
use crate::database::Store;
use crate::error::ApiError;
use crate::filter::FilterTranslator;
use crate::handlers;
use crate::services::Mailer;

/// Everything a request handler needs, cloned into each request
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub clock: Arc<dyn Clock>,
    pub mailer: Arc<dyn Mailer>,
    pub translator: FilterTranslator,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        store: Arc<dyn Store>,
        clock: Arc<dyn Clock>,
        mailer: Arc<dyn Mailer>,
    ) -> Self {
        Self {
            tokens: TokenService::from_config(&config.security, clock.clone()),
            translator: FilterTranslator::from_config(&config.query),
            config: Arc::new(config),
            store,
            clock,
            mailer,
        }
    }
}

/// Full router with global middleware
pub fn build_app(state: AppState) -> Router {
    let cors = cors_layer(&state.config);

    Router::new()
        // Public
        .route("/", get(root))
        .route("/health", get(health))
        // Resources
        .nest("/api/v1/tours", handlers::tours::routes(&state))
        .nest("/api/v1/users", handlers::users::routes(&state))
        .nest("/api/v1/reviews", handlers::reviews::routes(&state))
        .fallback(not_found)
        .with_state(state)
        // Global middleware
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    if config.security.cors_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

async fn root(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "success",
        "data": {
            "name": "Tours API",
            "version": env!("CARGO_PKG_VERSION"),
            "environment": state.config.environment,
            "store": state.store.backend(),
            "endpoints": {
                "tours": "/api/v1/tours[/:id] (list and get public)",
                "reviews": "/api/v1/reviews[/:id], /api/v1/tours/:id/reviews (protected)",
                "users": "/api/v1/users/{signup,login,forgotPassword,resetPassword/:token}",
                "me": "/api/v1/users/{me,updateMe,deleteMe,updateMyPassword} (protected)",
                "health": "/health",
            }
        }
    }))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let now = state.clock.now();

    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "success",
                "data": {
                    "status": "ok",
                    "timestamp": now,
                    "store": state.store.backend(),
                }
            })),
        ),
        Err(e) => {
            tracing::error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "error",
                    "message": "Store unavailable",
                })),
            )
        }
    }
}

async fn not_found(uri: Uri) -> ApiError {
    ApiError::not_found(format!("Can't find {} on this server!", uri.path()))
}

use axum::{middleware::from_fn_with_state, routing::MethodRouter};

use crate::app::AppState;
use crate::auth::{Role, RoleSet};

pub mod auth;
pub mod response;

pub use auth::{authenticate, restrict_to, CurrentUser, TOKEN_COOKIE};
pub use response::{ApiResponse, ApiResult};

/// Require an authenticated user for every method in `route`
pub fn protect(route: MethodRouter<AppState>, state: &AppState) -> MethodRouter<AppState> {
    route.route_layer(from_fn_with_state(state.clone(), authenticate))
}

/// Require an authenticated user whose role is one of `roles`
pub fn restrict(route: MethodRouter<AppState>, state: &AppState, roles: &[Role]) -> MethodRouter<AppState> {
    // Layers added last run first: authenticate, then the role check
    protect(
        route.route_layer(from_fn_with_state(RoleSet::of(roles), restrict_to)),
        state,
    )
}

use axum::{
    middleware::{from_fn, from_fn_with_state},
    Router,
};

use crate::middleware::auth::{auth_middleware, require_admin};
use crate::state::AppState;

pub mod auth;
pub mod cart;
pub mod courses;
pub mod invoices;
pub mod learners;
pub mod payment;
pub mod report;
pub mod reviews;
pub mod tracks;

/// Requires a valid bearer token; handlers read `Extension<Claims>`.
pub fn authenticated(state: &AppState, router: Router<AppState>) -> Router<AppState> {
    router.route_layer(from_fn_with_state(state.clone(), auth_middleware))
}

/// Bearer token plus the admin role. Layers run bottom-up, so auth goes last.
pub fn admin_only(state: &AppState, router: Router<AppState>) -> Router<AppState> {
    router
        .route_layer(from_fn(require_admin))
        .route_layer(from_fn_with_state(state.clone(), auth_middleware))
}

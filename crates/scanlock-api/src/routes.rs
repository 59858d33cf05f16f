//! API route definitions.

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;

use crate::handlers::{health, licenses};
use crate::state::AppState;

/// Create the main API router.
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .nest("/api/v1", api_routes())
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state)
}

fn api_routes() -> Router<Arc<AppState>> {
    Router::new().nest("/licenses", license_routes())
}

fn license_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", post(licenses::create_license))
        .route("/verify", post(licenses::verify_license))
        .route("/{key}", get(licenses::get_license))
        .route("/{key}/revoke", post(licenses::revoke_license))
}

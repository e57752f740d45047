//! Route modules for the study artifacts server

pub mod artifacts;
pub mod health;
pub mod identity;

use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full application router
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .nest("/health", health::router())
        .nest("/api/v1/health", health::router())
        .nest("/api/v1/documents", artifacts::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

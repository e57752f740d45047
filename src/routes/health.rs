//! Health check endpoints

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub service: &'static str,
    pub provider: &'static str,
    pub database: &'static str,
    pub in_flight: usize,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let database = match sqlx::query("SELECT 1").execute(state.db()).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!("Database health check failed: {}", e);
            "unavailable"
        }
    };

    Json(HealthResponse {
        status: if database == "ok" { "healthy" } else { "degraded" },
        version: env!("CARGO_PKG_VERSION"),
        service: "study-artifacts-server",
        provider: state.artifacts().provider().as_str(),
        database,
        in_flight: state.artifacts().in_flight(),
    })
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health_check))
}

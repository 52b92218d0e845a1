use axum::{extract::State, response::IntoResponse, Json};
use chrono::Utc;
use serde_json::json;

use crate::state::AppState;

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let targets: Vec<String> = state
        .targets
        .iter()
        .map(|target| format!("{}@{}:{}{}", target.name, target.address, target.port, target.path))
        .collect();

    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "timestamp": Utc::now().to_rfc3339(),
        "targets": targets,
    }))
}

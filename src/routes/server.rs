use crate::AppState;
use crate::db::models::api::ApiResponse;
use axum::extract::State;
use axum::{Json, response::IntoResponse};
use serde_json::json;

/// `GET /server/health` — always 200 once the process is serving traffic;
/// boot-fatal failures never reach this far.
pub async fn health() -> impl IntoResponse {
    Json(ApiResponse::success(json!({"status": "up"}), "healthy"))
}

/// `GET /server/modules` — introspection over the manifest registry and instance supervisor: every known module
/// name and how many live instances it currently has.
pub async fn modules(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.module_plane.supervisor.modules_snapshot();
    let body: Vec<_> = snapshot
        .into_iter()
        .map(|(name, instances)| json!({"name": name, "instances": instances}))
        .collect();
    Json(ApiResponse::success(json!({"modules": body}), "ok"))
}

use crate::AppState;
use crate::db::models::Identity;
use crate::db::models::api::ApiResponse;
use crate::db::repositories::auth as auth_repo;
use axum::extract::{Extension, Path, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// `GET /users/me` — the caller's own sanitised identity. No auth means
/// no identity was attached upstream, which we report as 404 rather than
/// 401: forbidden and missing look identical here.
pub async fn me(Extension(identity): Extension<Option<Identity>>) -> impl IntoResponse {
    match identity {
        Some(identity) => (StatusCode::OK, Json(ApiResponse::success(identity, "ok"))),
        None => (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::not_found("user")),
        ),
    }
}

/// `GET /users/:id/permissions` — a user may only read their own
/// permission list; any mismatch (including anonymous) is reported as a
/// plain 404, never a 403, so a probing caller can't distinguish "not
/// yours" from "doesn't exist".
pub async fn permissions(
    State(state): State<AppState>,
    Extension(identity): Extension<Option<Identity>>,
    Path(user_id): Path<Uuid>,
) -> impl IntoResponse {
    match identity {
        Some(identity) if identity.user_id == user_id => {
            match auth_repo::list_permissions(&state.db, user_id) {
                Ok(perms) => (
                    StatusCode::OK,
                    Json(ApiResponse::success(
                        json!({"permissions": perms.into_iter().map(|p| p.permission).collect::<Vec<_>>()}),
                        "ok",
                    )),
                ),
                Err(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::internal_error("database error")),
                ),
            }
        }
        _ => (StatusCode::NOT_FOUND, Json(ApiResponse::not_found("user"))),
    }
}

#[derive(Deserialize)]
pub struct GrantPermissionRequest {
    pub permission: String,
    #[serde(default)]
    pub minrole: i32,
}

/// `POST /users/:id/permissions` — same ownership rule as the read side.
pub async fn grant_permission(
    State(state): State<AppState>,
    Extension(identity): Extension<Option<Identity>>,
    Path(user_id): Path<Uuid>,
    Json(body): Json<GrantPermissionRequest>,
) -> impl IntoResponse {
    match identity {
        Some(identity) if identity.user_id == user_id => {
            match auth_repo::grant_permission(&state.db, user_id, &body.permission, body.minrole) {
                Ok(()) => (StatusCode::OK, Json(ApiResponse::<()>::ok("granted"))),
                Err(_) => (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ApiResponse::internal_error("database error")),
                ),
            }
        }
        _ => (StatusCode::NOT_FOUND, Json(ApiResponse::not_found("user"))),
    }
}

use crate::AppState;
use crate::auth::password::hash_password;
use crate::db::models::api::ApiResponse;
use crate::db::models::NewUser;
use crate::db::repositories::auth as auth_repo;
use crate::oauth::{self, DevicePollOutcome, ProviderIdentity};
use axum::extract::State;
use axum::{Json, http::StatusCode, response::{IntoResponse, Redirect}};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

/// Finds the local user behind a provider identity, provisioning one on
/// first sign-in. OAuth flows never see or set a password, so we mint
/// an unusable random one so the `NOT NULL` storage contract still holds).
fn login_or_provision(state: &AppState, provider: &str, identity: &ProviderIdentity) -> Result<String, String> {
    let user = match auth_repo::find_by_oauth_identity(&state.db, provider, &identity.provider_id) {
        Ok(Some(user)) => user,
        Ok(None) => {
            let existing = auth_repo::find_by_email(&state.db, &identity.email).map_err(|e| e.to_string())?;
            let user = match existing {
                Some(user) => user,
                None => {
                    let placeholder = hash_password(&Uuid::new_v4().to_string());
                    let username = if identity.display_name.is_empty() {
                        format!("{}-{}", provider, &identity.provider_id[..identity.provider_id.len().min(8)])
                    } else {
                        identity.display_name.clone()
                    };
                    auth_repo::insert_user(
                        &state.db,
                        NewUser {
                            username,
                            email: identity.email.clone(),
                            password_hash: placeholder.hash_hex,
                            password_salt: placeholder.salt_b64,
                        },
                    )
                    .map_err(|e| e.to_string())?
                }
            };
            auth_repo::upsert_oauth_identity(&state.db, user.id, provider, &identity.provider_id)
                .map_err(|e| e.to_string())?;
            user
        }
        Err(e) => return Err(e.to_string()),
    };

    state.jwt.issue(&user.username, None).map_err(|e| e.to_string())
}

pub async fn google_device_start(State(state): State<AppState>) -> impl IntoResponse {
    match oauth::google::start_device(&state.config).await {
        Ok(start) => (StatusCode::OK, Json(ApiResponse::success(start, "device flow started"))).into_response(),
        Err(e) => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ApiResponse::<()>::service_unavailable(&e)),
        )
            .into_response(),
    }
}

#[derive(Deserialize)]
pub struct DevicePollRequest {
    pub device_code: String,
}

/// `POST /oauth/google/device/poll`: statuses per the wire contract —
/// `authorization_pending -> 428`, `slow_down -> 429`, `invalid_device_code -> 400`.
pub async fn google_device_poll(State(state): State<AppState>, Json(body): Json<DevicePollRequest>) -> impl IntoResponse {
    match oauth::google::poll_device(&state.config, &body.device_code).await {
        DevicePollOutcome::Granted(identity) => match login_or_provision(&state, "google", &identity) {
            Ok(token) => (StatusCode::OK, Json(ApiResponse::success(json!({"token": token}), "authenticated"))).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::<()>::internal_error(&e))).into_response(),
        },
        DevicePollOutcome::AuthorizationPending => (
            StatusCode::from_u16(428).expect("valid status"),
            Json(ApiResponse::<()>::bad_request_code("authorization pending", "authorizationPending")),
        )
            .into_response(),
        DevicePollOutcome::SlowDown => (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ApiResponse::<()>::bad_request_code("slow down", "slowDown")),
        )
            .into_response(),
        DevicePollOutcome::InvalidDeviceCode => (
            StatusCode::BAD_REQUEST,
            Json(ApiResponse::<()>::bad_request_code("invalid device code", "invalidDeviceCode")),
        )
            .into_response(),
    }
}

pub async fn google_web_start(State(state): State<AppState>) -> impl IntoResponse {
    Redirect::temporary(&oauth::google::authorize_url(&state.config, &Uuid::new_v4().to_string()))
}

#[derive(Deserialize)]
pub struct OAuthCallback {
    pub code: String,
}

pub async fn google_web_callback(State(state): State<AppState>, axum::extract::Query(q): axum::extract::Query<OAuthCallback>) -> impl IntoResponse {
    match oauth::google::exchange_code(&state.config, &q.code).await {
        Ok(identity) => match login_or_provision(&state, "google", &identity) {
            Ok(token) => (StatusCode::OK, Json(ApiResponse::success(json!({"token": token}), "authenticated"))).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::<()>::internal_error(&e))).into_response(),
        },
        Err(e) => (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::bad_request(&e))).into_response(),
    }
}

pub async fn discord_web_start(State(state): State<AppState>) -> impl IntoResponse {
    Redirect::temporary(&oauth::discord::authorize_url(&state.config, &Uuid::new_v4().to_string()))
}

pub async fn discord_web_callback(State(state): State<AppState>, axum::extract::Query(q): axum::extract::Query<OAuthCallback>) -> impl IntoResponse {
    match oauth::discord::exchange_code(&state.config, &q.code).await {
        Ok(identity) => match login_or_provision(&state, "discord", &identity) {
            Ok(token) => (StatusCode::OK, Json(ApiResponse::success(json!({"token": token}), "authenticated"))).into_response(),
            Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, Json(ApiResponse::<()>::internal_error(&e))).into_response(),
        },
        Err(e) => (StatusCode::BAD_REQUEST, Json(ApiResponse::<()>::bad_request(&e))).into_response(),
    }
}

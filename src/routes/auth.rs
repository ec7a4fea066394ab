use crate::AppState;
use crate::db::models::{
    Identity, LoginRequest, LoginResponseUser, NewUser, RegisterRequest, register_errors,
};
use crate::db::repositories::auth as auth_repo;
use crate::auth::password::{hash_password, verify_password};
use axum::extract::{ConnectInfo, Extension, State};
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;
use std::net::SocketAddr;

const USERNAME_MIN: usize = 3;
const USERNAME_MAX: usize = 20;

/// `POST /auth/login`, `/auth/register`, `/auth/verify` are a fixed wire
/// contract (spec.md §6.1): the body is `{ok, user}`/`{ok: false, error}`
/// at the top level, not wrapped in the teacher's generic `ApiResponse`
/// envelope — clients coded against that literal shape need `.ok`/`.user`
/// reachable directly.
fn auth_error(code: &'static str) -> Json<serde_json::Value> {
    Json(json!({"ok": false, "error": code}))
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !local.contains(char::is_whitespace) && domain.contains('.') && !domain.contains(char::is_whitespace)
        }
        None => false,
    }
}

/// `POST /auth/login`.
pub async fn login(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    Json(body): Json<LoginRequest>,
) -> impl IntoResponse {
    let (Some(username), Some(password)) = (body.username, body.password) else {
        return (StatusCode::BAD_REQUEST, auth_error("missingCredentials"));
    };

    let Ok(Some(user)) = auth_repo::find_by_username(&state.db, &username) else {
        return (StatusCode::UNAUTHORIZED, auth_error("invalidCredentials"));
    };

    if !verify_password(&password, &user.password_hash, &user.password_salt) {
        return (StatusCode::UNAUTHORIZED, auth_error("invalidCredentials"));
    }

    let token = match state.jwt.issue(&user.username, Some(addr.ip().to_string())) {
        Ok(t) => t,
        Err(_) => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"ok": false, "error": "internalError"})),
            );
        }
    };

    let _ = auth_repo::record_login(&state.db, user.id, Some(&addr.ip().to_string()), &token);

    (
        StatusCode::OK,
        Json(json!({"ok": true, "user": LoginResponseUser {
            id: user.id,
            username: user.username,
            email: user.email,
            token,
        }})),
    )
}

/// `POST /auth/register`: a fixed error-code set on 400.
pub async fn register(State(state): State<AppState>, Json(body): Json<RegisterRequest>) -> impl IntoResponse {
    macro_rules! bad_request {
        ($code:expr) => {
            return (StatusCode::BAD_REQUEST, auth_error($code))
        };
    }

    let Some(username) = body.username.filter(|s| !s.is_empty()) else {
        bad_request!(register_errors::USERNAME_MISSING);
    };
    let Some(password) = body.password.filter(|s| !s.is_empty()) else {
        bad_request!(register_errors::PASSWORD_MISSING);
    };
    let Some(repassword) = body.repassword.filter(|s| !s.is_empty()) else {
        bad_request!(register_errors::REPASSWORD_MISSING);
    };
    let Some(email) = body.email.filter(|s| !s.is_empty()) else {
        bad_request!(register_errors::EMAIL_MISSING);
    };

    if !is_valid_email(&email) {
        bad_request!(register_errors::INVALID_EMAIL);
    }
    if password != repassword {
        bad_request!(register_errors::PASSWORDS_DONT_MATCH);
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        bad_request!(register_errors::INVALID_USERNAME_FORMAT);
    }
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&username.len()) {
        bad_request!(register_errors::INVALID_USERNAME_LENGTH);
    }

    match auth_repo::exists_by_username(&state.db, &username) {
        Ok(true) => bad_request!(register_errors::USERNAME_TAKEN),
        Ok(false) => {}
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, auth_error("internalError"));
        }
    }
    match auth_repo::exists_by_email(&state.db, &email) {
        Ok(true) => bad_request!(register_errors::EMAIL_TAKEN),
        Ok(false) => {}
        Err(_) => {
            return (StatusCode::INTERNAL_SERVER_ERROR, auth_error("internalError"));
        }
    }

    let hashed = hash_password(&password);
    let new_user = NewUser {
        username,
        email,
        password_hash: hashed.hash_hex,
        password_salt: hashed.salt_b64,
    };

    match auth_repo::insert_user(&state.db, new_user) {
        Ok(user) => (
            StatusCode::OK,
            Json(json!({"ok": true, "user": {"id": user.id, "username": user.username, "email": user.email}})),
        ),
        Err(_) => (StatusCode::INTERNAL_SERVER_ERROR, auth_error("internalError")),
    }
}

/// `POST /auth/logout` — always 200; clears the stored last-issued token.
pub async fn logout(State(state): State<AppState>, Extension(identity): Extension<Option<Identity>>) -> impl IntoResponse {
    if let Some(identity) = identity {
        let _ = auth_repo::clear_token(&state.db, identity.user_id);
    }
    (StatusCode::OK, Json(json!({"ok": true})))
}

/// `POST /auth/verify` — the sole Auth Gate exception: 401 on failure
/// instead of an anonymous continuation.
pub async fn verify(Extension(identity): Extension<Option<Identity>>) -> impl IntoResponse {
    match identity {
        Some(identity) => (StatusCode::OK, Json(json!(identity))),
        None => (StatusCode::UNAUTHORIZED, auth_error("invalidToken")),
    }
}

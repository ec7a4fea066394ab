use crate::AppState;
use crate::auth::identity::identity_from_token;
use crate::db::models::Identity;
use axum::{
    extract::State,
    http::{Request, header::AUTHORIZATION},
    middleware::Next,
    response::Response,
};

/// HTTP entry point: reads `Authorization: Bearer <token>`,
/// verifies it, and attaches the sanitised identity envelope to the
/// request. On any failure (missing/invalid/not-found) the request
/// proceeds WITHOUT identity — handlers decide whether that means 401 or
/// 404. `/auth/verify` is the sole exception and checks for the
/// extension's absence itself.
pub async fn auth_gate(State(state): State<AppState>, mut request: Request<axum::body::Body>, next: Next<axum::body::Body>) -> Response {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);

    let identity: Option<Identity> = token.and_then(|t| identity_from_token(&state.db, &state.jwt, &t));

    request.extensions_mut().insert(identity);
    next.run(request).await
}

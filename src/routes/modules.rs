use crate::AppState;
use crate::db::models::Identity;
use crate::db::models::api::ApiResponse;
use crate::module_plane::ModulePlane;
use axum::body::Bytes;
use axum::extract::{Extension, OriginalUri, State};
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::IntoResponse;
use axum::{Json, response::Response};
use serde_json::{Map, Value};

/// Catch-all dispatcher for every module-registered HTTP route.
/// Axum's router is fixed at boot, but modules register routes at
/// runtime as they come up — so every method/path this core doesn't know
/// about statically falls through to here, and C4's registry does the
/// real lookup.
pub async fn dispatch(
    State(state): State<AppState>,
    Extension(identity): Extension<Option<Identity>>,
    method: Method,
    headers: HeaderMap,
    OriginalUri(uri): OriginalUri,
    body: Bytes,
) -> Response {
    let path = uri.path();

    let Some(entry) = state.module_plane.registry.lookup_route(method.as_str(), path) else {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::not_found("route")),
        )
            .into_response();
    };

    if entry.requires_auth && identity.is_none() {
        return (
            StatusCode::NOT_FOUND,
            Json(ApiResponse::<()>::not_found("route")),
        )
            .into_response();
    }

    let body_json: Value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::Null)
    };

    let is_multipart = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("multipart/form-data"));

    let query_map: Map<String, Value> = uri
        .query()
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
                .collect()
        })
        .unwrap_or_default();

    let headers_map: Map<String, Value> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), Value::String(v.to_string())))
        })
        .collect();

    let mut payload = Map::new();
    payload.insert("query".to_string(), Value::Object(query_map));
    payload.insert("params".to_string(), Value::Object(Map::new()));
    payload.insert("body".to_string(), body_json);
    payload.insert("headers".to_string(), Value::Object(headers_map));
    if let Some(ref identity) = identity {
        payload.insert("user".to_string(), serde_json::to_value(identity).unwrap_or(Value::Null));
    }

    // Shard key priority: authenticated user's id, then `x-shard-key` header, then none.
    let shard_key = ModulePlane::identity_shard_key(identity.as_ref()).or_else(|| {
        headers
            .get("x-shard-key")
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    });

    let timeout = if is_multipart {
        state.module_plane.multipart_timeout()
    } else {
        state.module_plane.request_timeout()
    };

    match state
        .module_plane
        .invoke_http(&entry.module_name, &entry.handler_id, shard_key.as_deref(), Value::Object(payload), timeout)
        .await
    {
        Ok(reply) => {
            let status = reply
                .status
                .and_then(|s| StatusCode::from_u16(s).ok())
                .unwrap_or(StatusCode::OK);
            (status, Json(reply.payload)).into_response()
        }
        Err(e) => e.into_response(),
    }
}

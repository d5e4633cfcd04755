use crate::auth::AuthService;
use axum::{
    extract::Extension, http::HeaderMap, response::Json, routing::get, Router,
};
use serde_json::{json, Value};
use std::sync::Arc;

use crate::AppState;

pub fn session_routes() -> Router<AppState> {
    Router::new().route("/session-check", get(session_check))
}

/// Reports whether the caller holds a valid session. Never fails: an absent
/// or invalid token yields `authenticated: false` rather than an error.
#[utoipa::path(
    get,
    path = "/api/v1/session-check",
    responses(
        (status = 200, description = "Session state returned")
    ),
    tag = "session"
)]
pub async fn session_check(
    Extension(auth_service): Extension<Arc<AuthService>>,
    headers: HeaderMap,
) -> Json<Value> {
    let timestamp = chrono::Utc::now().to_rfc3339();
    match auth_service.authenticate(&headers).await {
        Ok(user) => Json(json!({
            "authenticated": true,
            "user": user,
            "timestamp": timestamp,
        })),
        Err(_) => Json(json!({
            "authenticated": false,
            "user": null,
            "timestamp": timestamp,
        })),
    }
}

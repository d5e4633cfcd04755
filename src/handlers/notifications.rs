use crate::{
    auth::{AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::notifications::{MarkReadRequest, Notification},
    ApiResponse, AppState,
};
use axum::{extract::State, routing::get, Json, Router};
use serde_json::json;

pub fn notifications_router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_feed).patch(mark_read))
        .with_auth()
}

/// The caller's notification feed, synthesized from their order history.
#[utoipa::path(
    get,
    path = "/api/v1/notifications",
    responses(
        (status = 200, description = "Feed returned", body = ApiResponse<Vec<Notification>>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "notifications"
)]
pub async fn get_feed(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<Notification>>>, ServiceError> {
    let feed = state.services.notifications.feed(&user).await?;
    Ok(Json(ApiResponse::success(feed)))
}

/// Persist read marks for the given notification keys.
#[utoipa::path(
    patch,
    path = "/api/v1/notifications",
    request_body = MarkReadRequest,
    responses(
        (status = 200, description = "Read marks persisted")
    ),
    tag = "notifications"
)]
pub async fn mark_read(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<MarkReadRequest>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let marked = state
        .services
        .notifications
        .mark_read(&user, request.keys)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "marked": marked }))))
}

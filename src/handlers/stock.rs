use crate::{
    auth::{roles, AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::stock::{MovementOutcome, PostMovementRequest, StockOverview},
    ApiResponse, AppState, ListQuery,
};
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Management-only stock ledger routes, mounted under `/pdg/stock`.
pub fn stock_router() -> Router<AppState> {
    Router::new()
        .route("/", get(stock_overview))
        .route("/movements", get(list_movements).post(post_movement))
        .with_roles(roles::MANAGEMENT)
}

/// Stock overview: works with computed status, summary, per-discipline stats,
/// top works and recent movements.
#[utoipa::path(
    get,
    path = "/api/v1/pdg/stock",
    responses(
        (status = 200, description = "Stock overview returned", body = ApiResponse<StockOverview>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn stock_overview(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<StockOverview>>, ServiceError> {
    let overview = state.services.stock.stock_overview().await?;
    Ok(Json(ApiResponse::success(overview)))
}

/// Post a stock movement. Returns 201 with the movement and the updated work,
/// or 400/422 when the resulting stock would be negative.
#[utoipa::path(
    post,
    path = "/api/v1/pdg/stock/movements",
    request_body = PostMovementRequest,
    responses(
        (status = 201, description = "Movement posted", body = ApiResponse<MovementOutcome>),
        (status = 404, description = "Work not found", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent stock update", body = crate::errors::ErrorResponse),
        (status = 422, description = "Stock would go negative", body = crate::errors::ErrorResponse)
    ),
    tag = "stock"
)]
pub async fn post_movement(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<PostMovementRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let outcome = state
        .services
        .stock
        .post_movement(request, user.user_id)
        .await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(outcome))))
}

#[utoipa::path(
    get,
    path = "/api/v1/pdg/stock/movements",
    params(ListQuery),
    responses(
        (status = 200, description = "Movement history returned")
    ),
    tag = "stock"
)]
pub async fn list_movements(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ServiceError> {
    let (movements, total) = state
        .services
        .stock
        .list_movements(query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(json!({
        "movements": movements,
        "total": total,
        "page": query.page,
        "per_page": query.limit,
    }))))
}

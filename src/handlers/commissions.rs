use crate::{
    auth::{roles, AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::commissions::{CommissionBatchResult, CommissionsOverview, PayCommissionsRequest},
    ApiResponse, AppState,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

/// Representative commission page, mounted under `/representant/commissions`.
pub fn representant_commissions_router() -> Router<AppState> {
    Router::new()
        .route("/", get(commissions_overview))
        .with_roles(roles::REPRESENTANT)
}

/// Management commission payment routes, mounted under `/commissions`.
pub fn commissions_router() -> Router<AppState> {
    Router::new()
        .route("/pending", get(list_pending))
        .route("/pay", post(pay_batch))
        .with_roles(roles::MANAGEMENT)
}

/// Summary, full list, monthly chart and recents for the calling representative.
#[utoipa::path(
    get,
    path = "/api/v1/representant/commissions",
    responses(
        (status = 200, description = "Commissions overview returned", body = ApiResponse<CommissionsOverview>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "commissions"
)]
pub async fn commissions_overview(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<CommissionsOverview>>, ServiceError> {
    let overview = state
        .services
        .commissions
        .overview_for_representative(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(overview)))
}

#[utoipa::path(
    get,
    path = "/api/v1/commissions/pending",
    responses(
        (status = 200, description = "Pending commissions returned")
    ),
    tag = "commissions"
)]
pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let (commissions, summary) = state.services.commissions.list_pending().await?;
    Ok(Json(ApiResponse::success(json!({
        "commissions": commissions,
        "summary": summary,
    }))))
}

/// Pay a batch of commissions; all-or-nothing like royalty payment.
#[utoipa::path(
    post,
    path = "/api/v1/commissions/pay",
    request_body = PayCommissionsRequest,
    responses(
        (status = 200, description = "Batch paid", body = ApiResponse<CommissionBatchResult>),
        (status = 404, description = "Unknown commission id", body = crate::errors::ErrorResponse),
        (status = 409, description = "Commission already paid", body = crate::errors::ErrorResponse)
    ),
    tag = "commissions"
)]
pub async fn pay_batch(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<PayCommissionsRequest>,
) -> Result<Json<ApiResponse<CommissionBatchResult>>, ServiceError> {
    let result = state.services.commissions.pay_batch(request).await?;
    Ok(Json(ApiResponse::success(result)))
}

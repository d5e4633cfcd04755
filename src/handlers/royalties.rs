use crate::{
    auth::{roles, AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::royalties::{PayRoyaltiesRequest, PaymentBatchResult},
    ApiResponse, AppState,
};
use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;

pub fn royalties_router() -> Router<AppState> {
    let management = Router::new()
        .route("/pending", get(list_pending))
        .route("/pay", post(pay_batch))
        .with_roles(roles::MANAGEMENT);

    let listing = Router::new().route("/", get(list_royalties)).with_auth();

    management.merge(listing)
}

/// Pending royalties with the global summary, for the payment screen.
#[utoipa::path(
    get,
    path = "/api/v1/royalties/pending",
    responses(
        (status = 200, description = "Pending royalties returned"),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "royalties"
)]
pub async fn list_pending(
    State(state): State<AppState>,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    let (royalties, summary) = state.services.royalties.list_pending().await?;
    Ok(Json(ApiResponse::success(json!({
        "royalties": royalties,
        "summary": summary,
    }))))
}

/// Royalty listing: creators see their own rows, management sees everything.
#[utoipa::path(
    get,
    path = "/api/v1/royalties",
    responses(
        (status = 200, description = "Royalties returned"),
        (status = 403, description = "Role has no royalties", body = crate::errors::ErrorResponse)
    ),
    tag = "royalties"
)]
pub async fn list_royalties(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<impl axum::response::IntoResponse, ServiceError> {
    if user.is_management() {
        let (royalties, summary) = state.services.royalties.list_pending().await?;
        return Ok(Json(ApiResponse::success(json!({
            "royalties": royalties,
            "summary": summary,
        }))));
    }
    if !user.role.is_creator() {
        return Err(ServiceError::Forbidden(
            "Only creators and management may list royalties".to_string(),
        ));
    }
    let royalties = state
        .services
        .royalties
        .list_for_beneficiary(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(json!({ "royalties": royalties }))))
}

/// Pay a batch of royalties in one all-or-nothing call.
#[utoipa::path(
    post,
    path = "/api/v1/royalties/pay",
    request_body = PayRoyaltiesRequest,
    responses(
        (status = 200, description = "Batch paid", body = ApiResponse<PaymentBatchResult>),
        (status = 404, description = "Unknown royalty id", body = crate::errors::ErrorResponse),
        (status = 409, description = "Royalty already paid", body = crate::errors::ErrorResponse)
    ),
    tag = "royalties"
)]
pub async fn pay_batch(
    State(state): State<AppState>,
    _user: AuthUser,
    Json(request): Json<PayRoyaltiesRequest>,
) -> Result<Json<ApiResponse<PaymentBatchResult>>, ServiceError> {
    let result = state.services.royalties.pay_batch(request).await?;
    Ok(Json(ApiResponse::success(result)))
}

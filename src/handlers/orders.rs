use crate::{
    auth::{roles, AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::orders::{CheckoutRequest, OrderListResponse, OrderResponse, TransitionRequest},
    ApiResponse, AppState, ListQuery,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

pub fn orders_router() -> Router<AppState> {
    let checkout = Router::new()
        .route("/checkout", post(checkout))
        .with_roles(roles::ORDER_PLACERS);

    let general = Router::new()
        .route("/", get(list_orders))
        .route("/:id", get(get_order))
        .route("/:id/status", post(update_status))
        .route("/:id/cancel", post(cancel_order))
        .with_auth();

    checkout.merge(general)
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CancelRequest {
    pub reason: Option<String>,
}

/// Create an order from a list of (work, quantity) pairs.
#[utoipa::path(
    post,
    path = "/api/v1/orders/checkout",
    request_body = CheckoutRequest,
    responses(
        (status = 201, description = "Order created"),
        (status = 400, description = "Empty or invalid item list", body = crate::errors::ErrorResponse),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown work", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn checkout(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CheckoutRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let order = state.services.orders.checkout(request, &user).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(order))))
}

/// List the caller's visible orders.
#[utoipa::path(
    get,
    path = "/api/v1/orders",
    params(ListQuery),
    responses(
        (status = 200, description = "Orders returned", body = ApiResponse<OrderListResponse>),
        (status = 401, description = "Unauthorized", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
) -> Result<Json<ApiResponse<OrderListResponse>>, ServiceError> {
    let orders = state
        .services
        .orders
        .list_orders(&user, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(orders)))
}

#[utoipa::path(
    get,
    path = "/api/v1/orders/:id",
    responses(
        (status = 200, description = "Order returned", body = ApiResponse<OrderResponse>),
        (status = 403, description = "Not the caller's order", body = crate::errors::ErrorResponse),
        (status = 404, description = "Order not found", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state.services.orders.get_order(id, &user).await?;
    Ok(Json(ApiResponse::success(order)))
}

/// Advance an order through the state machine.
#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/status",
    request_body = TransitionRequest,
    responses(
        (status = 200, description = "Order transitioned", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Transition not in the state machine", body = crate::errors::ErrorResponse),
        (status = 403, description = "Role may not drive this edge", body = crate::errors::ErrorResponse),
        (status = 409, description = "Concurrent modification", body = crate::errors::ErrorResponse),
        (status = 422, description = "Insufficient stock at shipment", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn update_status(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<TransitionRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .transition(id, request.status, request.notes, &user)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

#[utoipa::path(
    post,
    path = "/api/v1/orders/:id/cancel",
    request_body = CancelRequest,
    responses(
        (status = 200, description = "Order cancelled", body = ApiResponse<OrderResponse>),
        (status = 400, description = "Order already terminal", body = crate::errors::ErrorResponse)
    ),
    tag = "orders"
)]
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(request): Json<CancelRequest>,
) -> Result<Json<ApiResponse<OrderResponse>>, ServiceError> {
    let order = state
        .services
        .orders
        .cancel_order(id, request.reason, &user)
        .await?;
    Ok(Json(ApiResponse::success(order)))
}

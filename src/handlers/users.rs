use crate::{
    auth::{roles, AuthRouterExt},
    entities::{partner, user::UserRole},
    errors::ServiceError,
    services::users::{CreatePartnerRequest, CreateUserRequest, SetRoleRequest, UserListResponse},
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
use uuid::Uuid;

pub fn users_router() -> Router<AppState> {
    let management = Router::new()
        .route("/", get(list_users).post(create_user))
        .with_roles(roles::MANAGEMENT);
    let pdg = Router::new()
        .route("/:id/role", post(set_role))
        .with_roles(roles::PDG_ONLY);
    management.merge(pdg)
}

pub fn partners_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_partners).post(create_partner))
        .with_roles(roles::MANAGEMENT)
}

#[derive(Debug, Deserialize)]
pub struct UserFilters {
    pub role: Option<UserRole>,
}

#[utoipa::path(
    get,
    path = "/api/v1/users",
    params(ListQuery),
    responses(
        (status = 200, description = "Users returned", body = ApiResponse<UserListResponse>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn list_users(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(filters): Query<UserFilters>,
) -> Result<Json<ApiResponse<UserListResponse>>, ServiceError> {
    let users = state
        .services
        .users
        .list_users(filters.role, query.page, query.limit)
        .await?;
    Ok(Json(ApiResponse::success(users)))
}

/// Register a user record for an identity-provider account.
#[utoipa::path(
    post,
    path = "/api/v1/users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created"),
        (status = 409, description = "Email already registered", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn create_user(
    State(state): State<AppState>,
    Json(request): Json<CreateUserRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.users.create_user(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(user))))
}

/// Role reassignment, PDG only.
#[utoipa::path(
    post,
    path = "/api/v1/users/:id/role",
    request_body = SetRoleRequest,
    responses(
        (status = 200, description = "Role updated"),
        (status = 404, description = "User not found", body = crate::errors::ErrorResponse)
    ),
    tag = "users"
)]
pub async fn set_role(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(request): Json<SetRoleRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let user = state.services.users.set_role(id, request.role).await?;
    Ok(Json(ApiResponse::success(user)))
}

#[utoipa::path(
    get,
    path = "/api/v1/partners",
    responses(
        (status = 200, description = "Partners returned")
    ),
    tag = "partners"
)]
pub async fn list_partners(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<partner::Model>>>, ServiceError> {
    let partners = state.services.users.list_partners().await?;
    Ok(Json(ApiResponse::success(partners)))
}

#[utoipa::path(
    post,
    path = "/api/v1/partners",
    request_body = CreatePartnerRequest,
    responses(
        (status = 201, description = "Partner created"),
        (status = 400, description = "User lacks the PARTENAIRE role", body = crate::errors::ErrorResponse),
        (status = 409, description = "User already has a partner", body = crate::errors::ErrorResponse)
    ),
    tag = "partners"
)]
pub async fn create_partner(
    State(state): State<AppState>,
    Json(request): Json<CreatePartnerRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let partner = state.services.users.create_partner(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(partner))))
}

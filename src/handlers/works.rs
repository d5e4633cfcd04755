use crate::{
    auth::{roles, AuthRouterExt, AuthUser},
    entities::{discipline, work},
    errors::ServiceError,
    services::works::{CatalogFilters, CatalogPage, CreateDisciplineRequest, CreateWorkRequest},
    ApiResponse, AppState,
};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

/// Catalog browsing is open to any authenticated user; the submission
/// lifecycle is gated per edge inside the service.
pub fn works_router() -> Router<AppState> {
    let management = Router::new()
        .route("/:id/approve", post(approve_work))
        .route("/:id/reject", post(reject_work))
        .with_roles(roles::MANAGEMENT);

    let general = Router::new()
        .route("/", post(create_work).get(list_own_works))
        .route("/:id", get(get_work))
        .route("/:id/submit", post(submit_work))
        .with_auth();

    management.merge(general)
}

pub fn catalog_router() -> Router<AppState> {
    Router::new().route("/", get(list_catalog)).with_auth()
}

pub fn disciplines_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_disciplines).post(create_discipline))
        .with_auth()
}

/// ON_SALE works, filterable by discipline.
#[utoipa::path(
    get,
    path = "/api/v1/catalog",
    params(CatalogFilters),
    responses(
        (status = 200, description = "Catalog page returned", body = ApiResponse<CatalogPage>)
    ),
    tag = "works"
)]
pub async fn list_catalog(
    State(state): State<AppState>,
    Query(filters): Query<CatalogFilters>,
) -> Result<Json<ApiResponse<CatalogPage>>, ServiceError> {
    let page = state.services.works.list_catalog(filters).await?;
    Ok(Json(ApiResponse::success(page)))
}

#[utoipa::path(
    get,
    path = "/api/v1/works/:id",
    responses(
        (status = 200, description = "Work returned"),
        (status = 404, description = "Work not found", body = crate::errors::ErrorResponse)
    ),
    tag = "works"
)]
pub async fn get_work(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<work::Model>>, ServiceError> {
    let work = state.services.works.get_work(id).await?;
    Ok(Json(ApiResponse::success(work)))
}

/// A creator's own works, any status.
pub async fn list_own_works(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<Vec<work::Model>>>, ServiceError> {
    let works = state.services.works.list_for_creator(user.user_id).await?;
    Ok(Json(ApiResponse::success(works)))
}

/// Create a DRAFT work.
#[utoipa::path(
    post,
    path = "/api/v1/works",
    request_body = CreateWorkRequest,
    responses(
        (status = 201, description = "Work created"),
        (status = 403, description = "Role may not add works", body = crate::errors::ErrorResponse),
        (status = 404, description = "Unknown discipline", body = crate::errors::ErrorResponse)
    ),
    tag = "works"
)]
pub async fn create_work(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateWorkRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    let work = state.services.works.create_work(request, &user).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(work))))
}

#[utoipa::path(
    post,
    path = "/api/v1/works/:id/submit",
    responses(
        (status = 200, description = "Work submitted"),
        (status = 400, description = "Not a draft", body = crate::errors::ErrorResponse),
        (status = 403, description = "Not the owner", body = crate::errors::ErrorResponse)
    ),
    tag = "works"
)]
pub async fn submit_work(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<work::Model>>, ServiceError> {
    let work = state.services.works.submit(id, &user).await?;
    Ok(Json(ApiResponse::success(work)))
}

#[utoipa::path(
    post,
    path = "/api/v1/works/:id/approve",
    responses(
        (status = 200, description = "Work now on sale"),
        (status = 400, description = "Not submitted", body = crate::errors::ErrorResponse)
    ),
    tag = "works"
)]
pub async fn approve_work(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<work::Model>>, ServiceError> {
    let work = state.services.works.approve(id, &user).await?;
    Ok(Json(ApiResponse::success(work)))
}

#[utoipa::path(
    post,
    path = "/api/v1/works/:id/reject",
    responses(
        (status = 200, description = "Work sent back to draft")
    ),
    tag = "works"
)]
pub async fn reject_work(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ApiResponse<work::Model>>, ServiceError> {
    let work = state.services.works.reject(id, &user).await?;
    Ok(Json(ApiResponse::success(work)))
}

#[utoipa::path(
    get,
    path = "/api/v1/disciplines",
    responses(
        (status = 200, description = "Disciplines returned")
    ),
    tag = "works"
)]
pub async fn list_disciplines(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Vec<discipline::Model>>>, ServiceError> {
    let disciplines = state.services.works.list_disciplines().await?;
    Ok(Json(ApiResponse::success(disciplines)))
}

#[utoipa::path(
    post,
    path = "/api/v1/disciplines",
    request_body = CreateDisciplineRequest,
    responses(
        (status = 201, description = "Discipline created"),
        (status = 403, description = "Management only", body = crate::errors::ErrorResponse),
        (status = 409, description = "Duplicate name", body = crate::errors::ErrorResponse)
    ),
    tag = "works"
)]
pub async fn create_discipline(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<CreateDisciplineRequest>,
) -> Result<impl IntoResponse, ServiceError> {
    if !user.is_management() {
        return Err(ServiceError::Forbidden(
            "Only management may create disciplines".to_string(),
        ));
    }
    let discipline = state.services.works.create_discipline(request).await?;
    Ok((StatusCode::CREATED, Json(ApiResponse::success(discipline))))
}

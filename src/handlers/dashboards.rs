use crate::{
    auth::{roles, AuthRouterExt, AuthUser},
    errors::ServiceError,
    services::dashboards::{
        CreatorDashboard, PartenaireDashboard, PdgDashboard, RepresentantDashboard,
    },
    ApiResponse, AppState,
};
use axum::{extract::State, routing::get, Json, Router};

/// One role-gated router per dashboard, merged by the caller.
pub fn dashboards_router() -> Router<AppState> {
    let pdg = Router::new()
        .route("/pdg/dashboard", get(pdg_dashboard))
        .with_roles(roles::MANAGEMENT);
    let representant = Router::new()
        .route("/representant/dashboard", get(representant_dashboard))
        .with_roles(roles::REPRESENTANT);
    let partenaire = Router::new()
        .route("/partenaire/dashboard", get(partenaire_dashboard))
        .with_roles(roles::PARTENAIRE);
    let createur = Router::new()
        .route("/createur/dashboard", get(creator_dashboard))
        .with_roles(roles::CREATORS);

    pdg.merge(representant).merge(partenaire).merge(createur)
}

#[utoipa::path(
    get,
    path = "/api/v1/pdg/dashboard",
    responses(
        (status = 200, description = "Management dashboard returned", body = ApiResponse<PdgDashboard>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboards"
)]
pub async fn pdg_dashboard(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<PdgDashboard>>, ServiceError> {
    let dashboard = state.services.dashboards.pdg_dashboard().await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

#[utoipa::path(
    get,
    path = "/api/v1/representant/dashboard",
    responses(
        (status = 200, description = "Representative dashboard returned", body = ApiResponse<RepresentantDashboard>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboards"
)]
pub async fn representant_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<RepresentantDashboard>>, ServiceError> {
    let dashboard = state
        .services
        .dashboards
        .representant_dashboard(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

#[utoipa::path(
    get,
    path = "/api/v1/partenaire/dashboard",
    responses(
        (status = 200, description = "Partner dashboard returned", body = ApiResponse<PartenaireDashboard>),
        (status = 404, description = "No partner linked to this account", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboards"
)]
pub async fn partenaire_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<PartenaireDashboard>>, ServiceError> {
    let dashboard = state
        .services
        .dashboards
        .partenaire_dashboard(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

/// Shared by authors and designers.
#[utoipa::path(
    get,
    path = "/api/v1/createur/dashboard",
    responses(
        (status = 200, description = "Creator dashboard returned", body = ApiResponse<CreatorDashboard>),
        (status = 403, description = "Forbidden", body = crate::errors::ErrorResponse)
    ),
    tag = "dashboards"
)]
pub async fn creator_dashboard(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<CreatorDashboard>>, ServiceError> {
    let dashboard = state
        .services
        .dashboards
        .creator_dashboard(user.user_id)
        .await?;
    Ok(Json(ApiResponse::success(dashboard)))
}

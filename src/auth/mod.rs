/*!
 * # Authentication and Authorization Module
 *
 * Identity (registration, passwords, sessions) lives in an external identity
 * provider; this service only validates the HS256 bearer tokens that provider
 * issues. `auth_middleware` validates the token once per request, resolves the
 * user row (the role lives here, not in the token), and inserts an [`AuthUser`]
 * into the request extensions — the request-scoped context every handler reads
 * instead of ambient session state. Role gates are per-router middleware.
 */

use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{Duration as ChronoDuration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use sea_orm::EntityTrait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::db::DbPool;
use crate::entities::user::{self, UserRole};

/// Claim structure for JWT tokens issued by the identity provider
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,          // Subject (user ID)
    pub name: Option<String>, // User's name
    pub email: Option<String>,
    pub jti: String, // JWT ID
    pub iat: i64,    // Issued at time
    pub exp: i64,    // Expiration time
    pub iss: String, // Issuer
    pub aud: String, // Audience
}

/// Authenticated user resolved from a validated token plus the users table.
/// The role always comes from the database, never from token claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
}

impl AuthUser {
    pub fn has_role(&self, role: UserRole) -> bool {
        self.role == role
    }

    pub fn is_management(&self) -> bool {
        self.role.is_management()
    }
}

impl From<&user::Model> for AuthUser {
    fn from(model: &user::Model) -> Self {
        Self {
            user_id: model.id,
            name: model.name.clone(),
            email: model.email.clone(),
            role: model.role,
        }
    }
}

/// Authentication configuration
#[derive(Clone, Debug)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub jwt_audience: String,
    pub access_token_expiration: Duration,
}

impl AuthConfig {
    pub fn new(
        jwt_secret: String,
        jwt_issuer: String,
        jwt_audience: String,
        access_token_expiration: Duration,
    ) -> Self {
        Self {
            jwt_secret,
            jwt_issuer,
            jwt_audience,
            access_token_expiration,
        }
    }
}

/// Validates identity-provider tokens and resolves them to local users.
#[derive(Clone)]
pub struct AuthService {
    pub config: AuthConfig,
    db: Arc<DbPool>,
}

impl AuthService {
    pub fn new(config: AuthConfig, db: Arc<DbPool>) -> Self {
        Self { config, db }
    }

    /// Validate a JWT token and extract the claims
    pub fn validate_token(&self, token: &str) -> Result<Claims, AuthError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.config.jwt_issuer]);
        validation.set_audience(&[&self.config.jwt_audience]);

        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.config.jwt_secret.as_bytes()),
            &validation,
        )
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => AuthError::TokenExpired,
            _ => AuthError::InvalidToken,
        })?
        .claims;

        Ok(claims)
    }

    /// Mint a token the way the identity provider does. Used by integration
    /// tests and local development seeding.
    pub fn issue_token(&self, user: &user::Model) -> Result<String, AuthError> {
        let now = Utc::now();
        let exp = now
            + ChronoDuration::from_std(self.config.access_token_expiration)
                .map_err(|_| AuthError::InternalError("Invalid token duration".to_string()))?;

        let claims = Claims {
            sub: user.id.to_string(),
            name: Some(user.name.clone()),
            email: Some(user.email.clone()),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: self.config.jwt_issuer.clone(),
            aud: self.config.jwt_audience.clone(),
        };

        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.config.jwt_secret.as_bytes()),
        )
        .map_err(|e| AuthError::TokenCreation(e.to_string()))
    }

    /// Resolve validated claims to an active local user.
    pub async fn resolve_user(&self, claims: &Claims) -> Result<AuthUser, AuthError> {
        let user_id = Uuid::parse_str(&claims.sub).map_err(|_| AuthError::InvalidToken)?;

        let user = user::Entity::find_by_id(user_id)
            .one(&*self.db)
            .await
            .map_err(|e| AuthError::DatabaseError(e.to_string()))?
            .ok_or(AuthError::UserNotFound)?;

        if !user.active {
            return Err(AuthError::InactiveUser);
        }

        Ok(AuthUser::from(&user))
    }

    /// Full authentication path: bearer token from headers to [`AuthUser`].
    pub async fn authenticate(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let token = bearer_token(headers).ok_or(AuthError::MissingAuth)?;
        let claims = self.validate_token(token)?;
        let user = self.resolve_user(&claims).await?;
        debug!(user_id = %user.user_id, role = %user.role, "Authenticated request");
        Ok(user)
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing authentication")]
    MissingAuth,
    #[error("Invalid token")]
    InvalidToken,
    #[error("Token expired")]
    TokenExpired,
    #[error("Token creation failed: {0}")]
    TokenCreation(String),
    #[error("User not found")]
    UserNotFound,
    #[error("User account is inactive")]
    InactiveUser,
    #[error("Insufficient permissions")]
    InsufficientPermissions,
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let (status, error_code, error_message) = match &self {
            Self::MissingAuth => (
                StatusCode::UNAUTHORIZED,
                "AUTH_MISSING",
                self.to_string(),
            ),
            Self::InvalidToken | Self::TokenExpired | Self::UserNotFound => {
                (StatusCode::UNAUTHORIZED, "AUTH_INVALID", self.to_string())
            }
            Self::InactiveUser => (StatusCode::FORBIDDEN, "AUTH_INACTIVE", self.to_string()),
            Self::InsufficientPermissions => {
                (StatusCode::FORBIDDEN, "AUTH_FORBIDDEN", self.to_string())
            }
            Self::TokenCreation(_) | Self::DatabaseError(_) | Self::InternalError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "AUTH_INTERNAL_ERROR",
                "Internal error".to_string(),
            ),
        };

        let body = Json(serde_json::json!({
            "error": {
                "code": error_code,
                "message": error_message,
            }
        }));

        (status, body).into_response()
    }
}

/// Authentication middleware that validates the bearer token and makes the
/// resolved [`AuthUser`] available to downstream handlers.
pub async fn auth_middleware(mut request: Request, next: Next) -> Response {
    let auth_service = match request.extensions().get::<Arc<AuthService>>() {
        Some(service) => service.clone(),
        None => {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication service not available",
            )
                .into_response();
        }
    };

    match auth_service.authenticate(request.headers()).await {
        Ok(user) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Err(e) => e.into_response(),
    }
}

/// Role middleware to check the authenticated user against an allow-list
pub async fn role_middleware(
    State(allowed): State<&'static [UserRole]>,
    request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    let user = request
        .extensions()
        .get::<AuthUser>()
        .cloned()
        .ok_or(AuthError::MissingAuth)?;

    if !allowed.contains(&user.role) {
        return Err(AuthError::InsufficientPermissions);
    }

    Ok(next.run(request).await)
}

/// Extractor reading the [`AuthUser`] placed in extensions by `auth_middleware`.
#[async_trait::async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthUser>()
            .cloned()
            .ok_or(AuthError::MissingAuth)
    }
}

/// Extension methods for Router to add auth middleware
pub trait AuthRouterExt {
    fn with_auth(self) -> Self;
    fn with_roles(self, roles: &'static [UserRole]) -> Self;
}

impl<S> AuthRouterExt for axum::Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    fn with_auth(self) -> Self {
        self.layer(axum::middleware::from_fn(auth_middleware))
    }

    fn with_roles(self, roles: &'static [UserRole]) -> Self {
        self.layer(axum::middleware::from_fn_with_state(roles, role_middleware))
            .with_auth()
    }
}

/// Role allow-lists shared by routers and the order permission matrix.
pub mod roles {
    use super::UserRole;

    pub const MANAGEMENT: &[UserRole] = &[UserRole::Pdg, UserRole::Dga];
    pub const PDG_ONLY: &[UserRole] = &[UserRole::Pdg];
    pub const REPRESENTANT: &[UserRole] = &[UserRole::Representant];
    pub const CREATORS: &[UserRole] = &[UserRole::Auteur, UserRole::Concepteur];
    pub const PARTENAIRE: &[UserRole] = &[UserRole::Partenaire];
    pub const ORDER_PLACERS: &[UserRole] = &[
        UserRole::Client,
        UserRole::Partenaire,
        UserRole::Representant,
    ];
}

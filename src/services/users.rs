use crate::{
    db::DbPool,
    entities::partner::{self, Entity as PartnerEntity},
    entities::user::{self, Entity as UserEntity, UserRole},
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    pub role: UserRole,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePartnerRequest {
    pub user_id: Uuid,
    #[validate(length(min = 1, max = 150))]
    pub name: String,
    pub contact_email: Option<String>,
    pub phone: Option<String>,
    pub city: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct UserListResponse {
    pub users: Vec<user::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Management of user records (identities come from the external provider;
/// this side only holds the role metadata) and partner organizations.
#[derive(Clone)]
pub struct UserService {
    db: Arc<DbPool>,
}

impl UserService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Registers a user record for an identity-provider account.
    #[instrument(skip(self, request), fields(email = %request.email, role = %request.role))]
    pub async fn create_user(&self, request: CreateUserRequest) -> Result<user::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db;
        let existing = UserEntity::find()
            .filter(user::Column::Email.eq(request.email.clone()))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "A user with email {} already exists",
                request.email
            )));
        }

        let model = user::ActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(request.email),
            name: Set(request.name),
            role: Set(request.role),
            active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(None),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create user");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %model.id, "User created");
        Ok(model)
    }

    /// Paginated listing with an optional role filter.
    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        role: Option<UserRole>,
        page: u64,
        per_page: u64,
    ) -> Result<UserListResponse, ServiceError> {
        let db = &*self.db;

        let mut query = UserEntity::find().order_by_asc(user::Column::Name);
        if let Some(role) = role {
            query = query.filter(user::Column::Role.eq(role));
        }

        let paginator = query.paginate(db, per_page.max(1));
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let users = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(UserListResponse {
            users,
            total,
            page,
            per_page,
        })
    }

    /// Reassigns a user's role.
    #[instrument(skip(self), fields(user_id = %user_id, role = %role))]
    pub async fn set_role(&self, user_id: Uuid, role: UserRole) -> Result<user::Model, ServiceError> {
        let db = &*self.db;

        let current = UserEntity::find_by_id(user_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", user_id)))?;

        let mut active: user::ActiveModel = current.into();
        active.role = Set(role);
        active.updated_at = Set(Some(Utc::now()));

        let updated = active.update(db).await.map_err(|e| {
            error!(error = %e, user_id = %user_id, "Failed to update user role");
            ServiceError::DatabaseError(e)
        })?;

        info!(user_id = %user_id, role = %updated.role, "User role updated");
        Ok(updated)
    }

    pub async fn list_partners(&self) -> Result<Vec<partner::Model>, ServiceError> {
        PartnerEntity::find()
            .order_by_asc(partner::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Creates the partner organization linked 1:1 to a user account.
    #[instrument(skip(self, request), fields(user_id = %request.user_id))]
    pub async fn create_partner(
        &self,
        request: CreatePartnerRequest,
    ) -> Result<partner::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;

        let db = &*self.db;

        let user = UserEntity::find_by_id(request.user_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("User {} not found", request.user_id)))?;
        if user.role != UserRole::Partenaire {
            return Err(ServiceError::InvalidOperation(format!(
                "User {} does not have the PARTENAIRE role",
                user.email
            )));
        }

        let existing = PartnerEntity::find()
            .filter(partner::Column::UserId.eq(request.user_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(
                "This user already has a partner organization".to_string(),
            ));
        }

        let model = partner::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(request.user_id),
            name: Set(request.name),
            contact_email: Set(request.contact_email),
            phone: Set(request.phone),
            city: Set(request.city),
            created_at: Set(Utc::now()),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create partner");
            ServiceError::DatabaseError(e)
        })?;

        info!(partner_id = %model.id, "Partner created");
        Ok(model)
    }
}

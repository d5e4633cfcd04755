use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::discipline::{self, Entity as DisciplineEntity},
    entities::user::UserRole,
    entities::work::{self, Entity as WorkEntity, WorkStatus},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateWorkRequest {
    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,
    pub isbn: Option<String>,
    pub price: Decimal,
    pub discipline_id: Uuid,
    /// Only management may attribute a work to someone else.
    pub author_id: Option<Uuid>,
    pub designer_id: Option<Uuid>,
    #[validate(range(min = 0))]
    pub min_stock: Option<i32>,
    #[validate(range(min = 0))]
    pub max_stock: Option<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateDisciplineRequest {
    pub name: String,
}

#[derive(Debug, Deserialize, ToSchema, utoipa::IntoParams)]
pub struct CatalogFilters {
    pub discipline_id: Option<Uuid>,
    pub page: Option<u64>,
    pub per_page: Option<u64>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CatalogPage {
    pub works: Vec<work::Model>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
}

/// Service for catalog browsing and the work submission lifecycle.
#[derive(Clone)]
pub struct WorkService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl WorkService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Creates a DRAFT work. Creators own what they create: an author's new
    /// work carries their id, a designer's carries theirs.
    #[instrument(skip(self, request, actor), fields(actor = %actor.user_id))]
    pub async fn create_work(
        &self,
        request: CreateWorkRequest,
        actor: &AuthUser,
    ) -> Result<work::Model, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.price < Decimal::ZERO {
            return Err(ServiceError::ValidationError(
                "Price cannot be negative".to_string(),
            ));
        }

        let db = &*self.db;

        let discipline = DisciplineEntity::find_by_id(request.discipline_id)
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if discipline.is_none() {
            return Err(ServiceError::NotFound(format!(
                "Discipline {} not found",
                request.discipline_id
            )));
        }

        let (author_id, designer_id) = match actor.role {
            UserRole::Auteur => (Some(actor.user_id), request.designer_id),
            UserRole::Concepteur => (request.author_id, Some(actor.user_id)),
            UserRole::Pdg | UserRole::Dga => (request.author_id, request.designer_id),
            _ => {
                return Err(ServiceError::Forbidden(
                    "Only creators and management may add works".to_string(),
                ))
            }
        };

        let now = Utc::now();
        let model = work::ActiveModel {
            id: Set(Uuid::new_v4()),
            title: Set(request.title),
            isbn: Set(request.isbn),
            price: Set(request.price.round_dp(2)),
            stock: Set(0),
            min_stock: Set(request.min_stock.unwrap_or(5)),
            max_stock: Set(request.max_stock.unwrap_or(100)),
            status: Set(WorkStatus::Draft),
            discipline_id: Set(request.discipline_id),
            author_id: Set(author_id),
            designer_id: Set(designer_id),
            created_at: Set(now),
            updated_at: Set(Some(now)),
            version: Set(1),
        }
        .insert(db)
        .await
        .map_err(|e| {
            error!(error = %e, "Failed to create work");
            ServiceError::DatabaseError(e)
        })?;

        info!(work_id = %model.id, title = %model.title, "Work created");
        Ok(model)
    }

    /// Public catalog: ON_SALE works only, optionally filtered by discipline.
    #[instrument(skip(self))]
    pub async fn list_catalog(&self, filters: CatalogFilters) -> Result<CatalogPage, ServiceError> {
        let db = &*self.db;
        let page = filters.page.unwrap_or(1).max(1);
        let per_page = filters.per_page.unwrap_or(20).clamp(1, 100);

        let mut query = WorkEntity::find()
            .filter(work::Column::Status.eq(WorkStatus::OnSale))
            .order_by_asc(work::Column::Title);
        if let Some(discipline_id) = filters.discipline_id {
            query = query.filter(work::Column::DisciplineId.eq(discipline_id));
        }

        let paginator = query.paginate(db, per_page);
        let total = paginator
            .num_items()
            .await
            .map_err(ServiceError::DatabaseError)?;
        let works = paginator
            .fetch_page(page - 1)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(CatalogPage {
            works,
            total,
            page,
            per_page,
        })
    }

    pub async fn get_work(&self, work_id: Uuid) -> Result<work::Model, ServiceError> {
        WorkEntity::find_by_id(work_id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Work {} not found", work_id)))
    }

    /// Lists the works a creator owns, any status, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_creator(&self, creator_id: Uuid) -> Result<Vec<work::Model>, ServiceError> {
        WorkEntity::find()
            .filter(
                Condition::any()
                    .add(work::Column::AuthorId.eq(creator_id))
                    .add(work::Column::DesignerId.eq(creator_id)),
            )
            .order_by_desc(work::Column::CreatedAt)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// DRAFT → SUBMITTED by the owning creator (or management).
    pub async fn submit(&self, work_id: Uuid, actor: &AuthUser) -> Result<work::Model, ServiceError> {
        let updated = self
            .lifecycle_transition(work_id, WorkStatus::Submitted, |w, a| {
                a.is_management() || w.author_id == Some(a.user_id) || w.designer_id == Some(a.user_id)
            }, actor)
            .await?;
        let _ = self.event_sender.send(Event::WorkSubmitted(work_id)).await;
        Ok(updated)
    }

    /// SUBMITTED → ON_SALE by management.
    pub async fn approve(&self, work_id: Uuid, actor: &AuthUser) -> Result<work::Model, ServiceError> {
        let updated = self
            .lifecycle_transition(work_id, WorkStatus::OnSale, |_, a| a.is_management(), actor)
            .await?;
        let _ = self.event_sender.send(Event::WorkApproved(work_id)).await;
        Ok(updated)
    }

    /// SUBMITTED → DRAFT by management, sending the work back to its creator.
    pub async fn reject(&self, work_id: Uuid, actor: &AuthUser) -> Result<work::Model, ServiceError> {
        let updated = self
            .lifecycle_transition(work_id, WorkStatus::Draft, |_, a| a.is_management(), actor)
            .await?;
        let _ = self.event_sender.send(Event::WorkRejected(work_id)).await;
        Ok(updated)
    }

    async fn lifecycle_transition(
        &self,
        work_id: Uuid,
        target: WorkStatus,
        permitted: impl Fn(&work::Model, &AuthUser) -> bool,
        actor: &AuthUser,
    ) -> Result<work::Model, ServiceError> {
        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let current = WorkEntity::find_by_id(work_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| ServiceError::NotFound(format!("Work {} not found", work_id)))?;

        if !current.status.can_transition_to(target) {
            return Err(ServiceError::InvalidStatus(format!(
                "Cannot move work from '{}' to '{}'",
                current.status, target
            )));
        }
        if !permitted(&current, actor) {
            return Err(ServiceError::Forbidden(
                "You may not change this work's status".to_string(),
            ));
        }

        let version = current.version;
        let mut active: work::ActiveModel = current.into();
        active.status = Set(target);
        active.updated_at = Set(Some(Utc::now()));
        active.version = Set(version + 1);

        let updated = active.update(&txn).await.map_err(|e| {
            error!(error = %e, work_id = %work_id, "Failed to update work status");
            ServiceError::DatabaseError(e)
        })?;

        txn.commit().await.map_err(ServiceError::DatabaseError)?;

        info!(work_id = %work_id, status = %updated.status, "Work status updated");
        Ok(updated)
    }

    pub async fn list_disciplines(&self) -> Result<Vec<discipline::Model>, ServiceError> {
        DisciplineEntity::find()
            .order_by_asc(discipline::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    pub async fn create_discipline(
        &self,
        request: CreateDisciplineRequest,
    ) -> Result<discipline::Model, ServiceError> {
        let name = request.name.trim().to_string();
        if name.is_empty() {
            return Err(ServiceError::ValidationError(
                "Discipline name is required".to_string(),
            ));
        }

        let existing = DisciplineEntity::find()
            .filter(discipline::Column::Name.eq(name.clone()))
            .one(&*self.db)
            .await
            .map_err(ServiceError::DatabaseError)?;
        if existing.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Discipline '{}' already exists",
                name
            )));
        }

        discipline::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            created_at: Set(Utc::now()),
        }
        .insert(&*self.db)
        .await
        .map_err(|e| {
            warn!(error = %e, "Failed to create discipline");
            ServiceError::DatabaseError(e)
        })
    }
}

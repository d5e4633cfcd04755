use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, Set};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Enum representing the lifecycle of a work in the catalog.
#[derive(
    Clone,
    Copy,
    Debug,
    PartialEq,
    Eq,
    EnumIter,
    DeriveActiveEnum,
    Serialize,
    Deserialize,
    strum::Display,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkStatus {
    #[sea_orm(string_value = "DRAFT")]
    Draft,
    #[sea_orm(string_value = "SUBMITTED")]
    Submitted,
    #[sea_orm(string_value = "ON_SALE")]
    OnSale,
}

impl WorkStatus {
    /// Legal lifecycle edges: DRAFT→SUBMITTED (owner submits),
    /// SUBMITTED→ON_SALE (management approves), SUBMITTED→DRAFT (rejected).
    pub fn can_transition_to(&self, target: WorkStatus) -> bool {
        matches!(
            (self, target),
            (WorkStatus::Draft, WorkStatus::Submitted)
                | (WorkStatus::Submitted, WorkStatus::OnSale)
                | (WorkStatus::Submitted, WorkStatus::Draft)
        )
    }
}

/// A sellable title. Stock is mutated only through stock movement postings
/// and order fulfillment; `version` guards against lost updates.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, Validate, ToSchema)]
#[sea_orm(table_name = "works")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    #[validate(length(min = 1, max = 200, message = "Title must be between 1 and 200 characters"))]
    pub title: String,

    #[sea_orm(unique)]
    pub isbn: Option<String>,

    pub price: Decimal,
    pub stock: i32,
    pub min_stock: i32,
    pub max_stock: i32,
    pub status: WorkStatus,
    pub discipline_id: Uuid,
    pub author_id: Option<Uuid>,
    pub designer_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub version: i32,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::discipline::Entity",
        from = "Column::DisciplineId",
        to = "super::discipline::Column::Id"
    )]
    Discipline,
    #[sea_orm(has_many = "super::order_item::Entity")]
    OrderItems,
    #[sea_orm(has_many = "super::stock_movement::Entity")]
    StockMovements,
    #[sea_orm(has_many = "super::royalty::Entity")]
    Royalties,
}

impl Related<super::discipline::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Discipline.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItems.def()
    }
}

impl Related<super::stock_movement::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StockMovements.def()
    }
}

impl Related<super::royalty::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Royalties.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C: ConnectionTrait>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(now);
            }
        }

        if let ActiveValue::NotSet = active_model.updated_at {
            active_model.updated_at = Set(Some(now));
        }

        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_edges() {
        assert!(WorkStatus::Draft.can_transition_to(WorkStatus::Submitted));
        assert!(WorkStatus::Submitted.can_transition_to(WorkStatus::OnSale));
        assert!(WorkStatus::Submitted.can_transition_to(WorkStatus::Draft));
        assert!(!WorkStatus::Draft.can_transition_to(WorkStatus::OnSale));
        assert!(!WorkStatus::OnSale.can_transition_to(WorkStatus::Draft));
    }
}

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Amount owed to a work's author or designer for one sale.
///
/// The unique index on `order_item_id` enforces at-most-once accrual per
/// (work, sale) pair even when a validation transition is retried.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "royalties")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub work_id: Uuid,
    #[sea_orm(unique)]
    pub order_item_id: Uuid,
    pub beneficiary_id: Uuid,
    pub amount: Decimal,
    /// Rate applied at accrual time (0.15 by convention).
    pub rate: Decimal,
    pub paid: bool,
    pub paid_at: Option<DateTime<Utc>>,
    pub payment_method: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::work::Entity",
        from = "Column::WorkId",
        to = "super::work::Column::Id"
    )]
    Work,
    #[sea_orm(
        belongs_to = "super::order_item::Entity",
        from = "Column::OrderItemId",
        to = "super::order_item::Column::Id"
    )]
    OrderItem,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::BeneficiaryId",
        to = "super::user::Column::Id"
    )]
    Beneficiary,
}

impl Related<super::work::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Work.def()
    }
}

impl Related<super::order_item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderItem.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Beneficiary.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

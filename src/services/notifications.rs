use crate::{
    auth::AuthUser,
    db::DbPool,
    entities::notification_read::{self, Entity as NotificationReadEntity},
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    entities::partner::{self, Entity as PartnerEntity},
    entities::user::UserRole,
    errors::ServiceError,
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, QuerySelect, Set,
    TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

const FEED_TAKE: u64 = 20;

/// A notification synthesized on read from order history. Only the read
/// mark is persisted; the entries themselves are derived fresh every time.
#[derive(Debug, Serialize, ToSchema)]
pub struct Notification {
    /// Stable key: `order:<id>:<status>`; a status change yields a new key.
    pub key: String,
    pub order_id: Uuid,
    pub order_number: String,
    pub status: OrderStatus,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub read: bool,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct MarkReadRequest {
    pub keys: Vec<String>,
}

#[derive(Clone)]
pub struct NotificationService {
    db: Arc<DbPool>,
}

impl NotificationService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Builds the caller's feed from their visible recent orders, newest
    /// first, joined against the persisted read marks.
    #[instrument(skip(self, actor), fields(user_id = %actor.user_id))]
    pub async fn feed(&self, actor: &AuthUser) -> Result<Vec<Notification>, ServiceError> {
        let db = &*self.db;

        let mut query = OrderEntity::find().order_by_desc(order::Column::UpdatedAt);
        match actor.role {
            UserRole::Pdg | UserRole::Dga => {}
            UserRole::Representant => {
                query = query.filter(order::Column::RepresentativeId.eq(actor.user_id));
            }
            UserRole::Partenaire => {
                let partner = PartnerEntity::find()
                    .filter(partner::Column::UserId.eq(actor.user_id))
                    .one(db)
                    .await
                    .map_err(ServiceError::DatabaseError)?;
                match partner {
                    Some(p) => query = query.filter(order::Column::PartnerId.eq(p.id)),
                    None => return Ok(vec![]),
                }
            }
            UserRole::Client => {
                query = query.filter(order::Column::CustomerId.eq(actor.user_id));
            }
            // Creators have no order visibility; their dashboard carries royalties
            _ => return Ok(vec![]),
        }

        let orders = query
            .limit(FEED_TAKE)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let keys: Vec<String> = orders.iter().map(notification_key).collect();
        let read_keys: HashSet<String> = if keys.is_empty() {
            HashSet::new()
        } else {
            NotificationReadEntity::find()
                .filter(notification_read::Column::UserId.eq(actor.user_id))
                .filter(notification_read::Column::NotificationKey.is_in(keys))
                .all(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .into_iter()
                .map(|r| r.notification_key)
                .collect()
        };

        Ok(orders
            .iter()
            .map(|o| {
                let key = notification_key(o);
                Notification {
                    read: read_keys.contains(&key),
                    key,
                    order_id: o.id,
                    order_number: o.order_number.clone(),
                    status: o.status,
                    message: message_for(o),
                    created_at: o.updated_at.unwrap_or(o.created_at),
                }
            })
            .collect())
    }

    /// Persists read marks for the given keys. Already-read keys are left
    /// alone, so repeating the call is harmless.
    #[instrument(skip(self, actor, keys), fields(user_id = %actor.user_id, count = keys.len()))]
    pub async fn mark_read(&self, actor: &AuthUser, keys: Vec<String>) -> Result<u64, ServiceError> {
        if keys.is_empty() {
            return Ok(0);
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(ServiceError::DatabaseError)?;

        let existing: HashSet<String> = NotificationReadEntity::find()
            .filter(notification_read::Column::UserId.eq(actor.user_id))
            .filter(notification_read::Column::NotificationKey.is_in(keys.clone()))
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|r| r.notification_key)
            .collect();

        let now = Utc::now();
        let mut marked = 0u64;
        let unique: HashSet<String> = keys.into_iter().collect();
        for key in unique {
            if existing.contains(&key) {
                continue;
            }
            notification_read::ActiveModel {
                id: Set(Uuid::new_v4()),
                user_id: Set(actor.user_id),
                notification_key: Set(key),
                read_at: Set(now),
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;
            marked += 1;
        }

        txn.commit().await.map_err(ServiceError::DatabaseError)?;
        Ok(marked)
    }
}

fn notification_key(order: &order::Model) -> String {
    format!("order:{}:{}", order.id, order.status)
}

fn message_for(order: &order::Model) -> String {
    match order.status {
        OrderStatus::Pending => format!("Order {} is awaiting validation", order.order_number),
        OrderStatus::Validated => format!("Order {} has been validated", order.order_number),
        OrderStatus::Processing => format!("Order {} is being prepared", order.order_number),
        OrderStatus::Shipped => format!("Order {} has been shipped", order.order_number),
        OrderStatus::Delivered => format!("Order {} has been delivered", order.order_number),
        OrderStatus::Cancelled => format!("Order {} was cancelled", order.order_number),
    }
}

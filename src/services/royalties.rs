use crate::{
    db::DbPool,
    entities::order,
    entities::order_item,
    entities::royalty::{self, Entity as RoyaltyEntity},
    entities::work,
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PayRoyaltiesRequest {
    pub royalty_ids: Vec<Uuid>,
    pub payment_method: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoyaltySummary {
    pub pending_count: u64,
    pub pending_total: Decimal,
    pub paid_count: u64,
    pub paid_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PaymentBatchResult {
    pub paid_count: u64,
    pub paid_total: Decimal,
    pub summary: RoyaltySummary,
}

/// Accrues royalties for every item of an order inside the caller's
/// transaction. The beneficiary is the work's author when set, otherwise its
/// designer; works with neither accrue nothing. Amount = rate × line total,
/// rounded to 2 decimal places.
pub(crate) async fn accrue_for_order<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
    items: &[order_item::Model],
    works_by_id: &HashMap<Uuid, work::Model>,
    rate: Decimal,
) -> Result<Vec<royalty::Model>, ServiceError> {
    let now = Utc::now();
    let mut accrued = Vec::new();

    for item in items {
        let work = works_by_id.get(&item.work_id).ok_or_else(|| {
            ServiceError::InternalError(format!(
                "work {} missing while accruing royalties for order {}",
                item.work_id, order.id
            ))
        })?;

        let Some(beneficiary) = work.author_id.or(work.designer_id) else {
            continue;
        };

        let amount = (item.line_total * rate).round_dp(2);
        let royalty = royalty::ActiveModel {
            id: Set(Uuid::new_v4()),
            work_id: Set(work.id),
            order_item_id: Set(item.id),
            beneficiary_id: Set(beneficiary),
            amount: Set(amount),
            rate: Set(rate),
            paid: Set(false),
            paid_at: Set(None),
            payment_method: Set(None),
            created_at: Set(now),
        }
        .insert(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

        accrued.push(royalty);
    }

    Ok(accrued)
}

/// Removes unpaid royalties for an order being cancelled. Paid rows are left
/// untouched; cancellation never claws back settled money.
pub(crate) async fn void_unpaid_for_order<C: ConnectionTrait>(
    conn: &C,
    item_ids: &[Uuid],
) -> Result<u64, ServiceError> {
    if item_ids.is_empty() {
        return Ok(0);
    }
    let res = RoyaltyEntity::delete_many()
        .filter(royalty::Column::OrderItemId.is_in(item_ids.iter().copied()))
        .filter(royalty::Column::Paid.eq(false))
        .exec(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;
    Ok(res.rows_affected)
}

/// Service for royalty listing and batch payment.
#[derive(Clone)]
pub struct RoyaltyService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl RoyaltyService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Lists pending royalties, oldest first so payment runs clear backlog.
    #[instrument(skip(self))]
    pub async fn list_pending(&self) -> Result<(Vec<royalty::Model>, RoyaltySummary), ServiceError> {
        let db = &*self.db;

        let pending = RoyaltyEntity::find()
            .filter(royalty::Column::Paid.eq(false))
            .order_by_asc(royalty::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let summary = self.summary().await?;
        Ok((pending, summary))
    }

    /// Lists royalties belonging to one beneficiary, newest first.
    #[instrument(skip(self))]
    pub async fn list_for_beneficiary(
        &self,
        beneficiary_id: Uuid,
    ) -> Result<Vec<royalty::Model>, ServiceError> {
        let db = &*self.db;
        RoyaltyEntity::find()
            .filter(royalty::Column::BeneficiaryId.eq(beneficiary_id))
            .order_by_desc(royalty::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)
    }

    /// Global pending/paid totals.
    pub async fn summary(&self) -> Result<RoyaltySummary, ServiceError> {
        let db = &*self.db;
        let all = RoyaltyEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(summarize(&all))
    }

    /// Marks a batch of royalties paid in a single transaction. The batch is
    /// all-or-nothing: an unknown or already-paid id fails the whole call and
    /// leaves every row untouched.
    #[instrument(skip(self, request), fields(count = request.royalty_ids.len()))]
    pub async fn pay_batch(
        &self,
        request: PayRoyaltiesRequest,
    ) -> Result<PaymentBatchResult, ServiceError> {
        if request.royalty_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "No royalty ids supplied".to_string(),
            ));
        }
        if request.payment_method.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "Payment method is required".to_string(),
            ));
        }

        let db = &*self.db;
        let now = Utc::now();

        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for royalty payment");
            ServiceError::DatabaseError(e)
        })?;

        let rows = RoyaltyEntity::find()
            .filter(royalty::Column::Id.is_in(request.royalty_ids.iter().copied()))
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if rows.len() != request.royalty_ids.len() {
            return Err(ServiceError::NotFound(
                "One or more royalties do not exist".to_string(),
            ));
        }
        if let Some(already_paid) = rows.iter().find(|r| r.paid) {
            return Err(ServiceError::Conflict(format!(
                "Royalty {} is already paid",
                already_paid.id
            )));
        }

        let paid_total: Decimal = rows.iter().map(|r| r.amount).sum();

        let update = RoyaltyEntity::update_many()
            .col_expr(royalty::Column::Paid, Expr::value(true))
            .col_expr(royalty::Column::PaidAt, Expr::value(Some(now)))
            .col_expr(
                royalty::Column::PaymentMethod,
                Expr::value(Some(request.payment_method.clone())),
            )
            .filter(royalty::Column::Id.is_in(request.royalty_ids.iter().copied()))
            .filter(royalty::Column::Paid.eq(false))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if update.rows_affected != rows.len() as u64 {
            // A concurrent payment raced us between the read and the update.
            return Err(ServiceError::Conflict(
                "Royalty batch changed concurrently, retry".to_string(),
            ));
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit royalty payment transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            paid_count = rows.len(),
            paid_total = %paid_total,
            method = %request.payment_method,
            "Royalty batch paid"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::RoyaltiesPaid {
                count: rows.len(),
                total: paid_total,
            })
            .await
        {
            warn!(error = %e, "Failed to send royalties paid event");
        }

        let summary = self.summary().await?;
        Ok(PaymentBatchResult {
            paid_count: rows.len() as u64,
            paid_total,
            summary,
        })
    }
}

fn summarize(rows: &[royalty::Model]) -> RoyaltySummary {
    let (paid, pending): (Vec<_>, Vec<_>) = rows.iter().partition(|r| r.paid);
    RoyaltySummary {
        pending_count: pending.len() as u64,
        pending_total: pending.iter().map(|r| r.amount).sum(),
        paid_count: paid.len() as u64,
        paid_total: paid.iter().map(|r| r.amount).sum(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn royalty(amount: Decimal, paid: bool) -> royalty::Model {
        royalty::Model {
            id: Uuid::new_v4(),
            work_id: Uuid::new_v4(),
            order_item_id: Uuid::new_v4(),
            beneficiary_id: Uuid::new_v4(),
            amount,
            rate: dec!(0.15),
            paid,
            paid_at: None,
            payment_method: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn summarize_splits_pending_and_paid() {
        let rows = vec![
            royalty(dec!(3000), false),
            royalty(dec!(4500), false),
            royalty(dec!(1200), true),
        ];
        let summary = summarize(&rows);
        assert_eq!(summary.pending_count, 2);
        assert_eq!(summary.pending_total, dec!(7500));
        assert_eq!(summary.paid_count, 1);
        assert_eq!(summary.paid_total, dec!(1200));
    }

    #[test]
    fn royalty_amount_is_fifteen_percent_of_line_total() {
        let line_total = dec!(25000);
        assert_eq!((line_total * dec!(0.15)).round_dp(2), dec!(3750.00));
    }
}

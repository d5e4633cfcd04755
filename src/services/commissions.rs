use crate::{
    db::DbPool,
    entities::commission::{self, Entity as CommissionEntity},
    entities::order,
    errors::ServiceError,
    events::{Event, EventSender},
    services::month_key,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter,
    QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Deserialize, ToSchema)]
pub struct PayCommissionsRequest {
    pub commission_ids: Vec<Uuid>,
    pub payment_method: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommissionSummary {
    pub pending_count: u64,
    pub pending_total: Decimal,
    pub paid_count: u64,
    pub paid_total: Decimal,
}

/// Monthly bucket for the commissions chart.
#[derive(Debug, Serialize, ToSchema)]
pub struct MonthlyAmount {
    pub month: String,
    pub total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommissionsOverview {
    pub summary: CommissionSummary,
    pub commissions: Vec<commission::Model>,
    pub chart_data: Vec<MonthlyAmount>,
    pub recent_commissions: Vec<commission::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CommissionBatchResult {
    pub paid_count: u64,
    pub paid_total: Decimal,
    pub summary: CommissionSummary,
}

/// Accrues the representative's commission for a freshly validated order
/// inside the caller's transaction. Orders without an originating
/// representative accrue nothing. Amount = rate × order total, rounded to 2
/// decimal places; the unique index on `order_id` keeps this at-most-once.
pub(crate) async fn accrue_for_order<C: ConnectionTrait>(
    conn: &C,
    order: &order::Model,
    rate: Decimal,
) -> Result<Option<commission::Model>, ServiceError> {
    let Some(representative_id) = order.representative_id else {
        return Ok(None);
    };

    let amount = (order.total_amount * rate).round_dp(2);
    let model = commission::ActiveModel {
        id: Set(Uuid::new_v4()),
        order_id: Set(order.id),
        representative_id: Set(representative_id),
        amount: Set(amount),
        rate: Set(rate),
        paid: Set(false),
        paid_at: Set(None),
        payment_method: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(conn)
    .await
    .map_err(ServiceError::DatabaseError)?;

    Ok(Some(model))
}

/// Removes the unpaid commission of an order being cancelled.
pub(crate) async fn void_unpaid_for_order<C: ConnectionTrait>(
    conn: &C,
    order_id: Uuid,
) -> Result<u64, ServiceError> {
    let res = CommissionEntity::delete_many()
        .filter(commission::Column::OrderId.eq(order_id))
        .filter(commission::Column::Paid.eq(false))
        .exec(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;
    Ok(res.rows_affected)
}

#[derive(Clone)]
pub struct CommissionService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl CommissionService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Assembles the representative's commission page: summary, full list,
    /// monthly chart buckets and a short recents list.
    #[instrument(skip(self))]
    pub async fn overview_for_representative(
        &self,
        representative_id: Uuid,
    ) -> Result<CommissionsOverview, ServiceError> {
        let db = &*self.db;

        let commissions = CommissionEntity::find()
            .filter(commission::Column::RepresentativeId.eq(representative_id))
            .order_by_desc(commission::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let summary = summarize(&commissions);
        let chart_data = monthly_buckets(&commissions);
        let recent_commissions = commissions.iter().take(5).cloned().collect();

        Ok(CommissionsOverview {
            summary,
            commissions,
            chart_data,
            recent_commissions,
        })
    }

    /// Global pending list for the management payment screen.
    #[instrument(skip(self))]
    pub async fn list_pending(
        &self,
    ) -> Result<(Vec<commission::Model>, CommissionSummary), ServiceError> {
        let db = &*self.db;

        let pending = CommissionEntity::find()
            .filter(commission::Column::Paid.eq(false))
            .order_by_asc(commission::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let all = CommissionEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok((pending, summarize(&all)))
    }

    /// Marks a batch of commissions paid; all-or-nothing like royalty payment.
    #[instrument(skip(self, request), fields(count = request.commission_ids.len()))]
    pub async fn pay_batch(
        &self,
        request: PayCommissionsRequest,
    ) -> Result<CommissionBatchResult, ServiceError> {
        if request.commission_ids.is_empty() {
            return Err(ServiceError::ValidationError(
                "No commission ids supplied".to_string(),
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
            error!(error = %e, "Failed to start transaction for commission payment");
            ServiceError::DatabaseError(e)
        })?;

        let rows = CommissionEntity::find()
            .filter(commission::Column::Id.is_in(request.commission_ids.iter().copied()))
            .all(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if rows.len() != request.commission_ids.len() {
            return Err(ServiceError::NotFound(
                "One or more commissions do not exist".to_string(),
            ));
        }
        if let Some(already_paid) = rows.iter().find(|r| r.paid) {
            return Err(ServiceError::Conflict(format!(
                "Commission {} is already paid",
                already_paid.id
            )));
        }

        let paid_total: Decimal = rows.iter().map(|r| r.amount).sum();

        let update = CommissionEntity::update_many()
            .col_expr(commission::Column::Paid, Expr::value(true))
            .col_expr(commission::Column::PaidAt, Expr::value(Some(now)))
            .col_expr(
                commission::Column::PaymentMethod,
                Expr::value(Some(request.payment_method.clone())),
            )
            .filter(commission::Column::Id.is_in(request.commission_ids.iter().copied()))
            .filter(commission::Column::Paid.eq(false))
            .exec(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?;

        if update.rows_affected != rows.len() as u64 {
            return Err(ServiceError::Conflict(
                "Commission batch changed concurrently, retry".to_string(),
            ));
        }

        txn.commit().await.map_err(|e| {
            error!(error = %e, "Failed to commit commission payment transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            paid_count = rows.len(),
            paid_total = %paid_total,
            method = %request.payment_method,
            "Commission batch paid"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::CommissionsPaid {
                count: rows.len(),
                total: paid_total,
            })
            .await
        {
            warn!(error = %e, "Failed to send commissions paid event");
        }

        let all = CommissionEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(CommissionBatchResult {
            paid_count: rows.len() as u64,
            paid_total,
            summary: summarize(&all),
        })
    }
}

fn summarize(rows: &[commission::Model]) -> CommissionSummary {
    let (paid, pending): (Vec<_>, Vec<_>) = rows.iter().partition(|r| r.paid);
    CommissionSummary {
        pending_count: pending.len() as u64,
        pending_total: pending.iter().map(|r| r.amount).sum(),
        paid_count: paid.len() as u64,
        paid_total: paid.iter().map(|r| r.amount).sum(),
    }
}

fn monthly_buckets(rows: &[commission::Model]) -> Vec<MonthlyAmount> {
    let mut buckets: BTreeMap<String, Decimal> = BTreeMap::new();
    for row in rows {
        *buckets.entry(month_key(row.created_at)).or_default() += row.amount;
    }
    buckets
        .into_iter()
        .map(|(month, total)| MonthlyAmount { month, total })
        .collect()
}

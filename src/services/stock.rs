use crate::{
    db::DbPool,
    entities::discipline::{self, Entity as DisciplineEntity},
    entities::stock_movement::{self, Entity as StockMovementEntity, MovementType},
    entities::work::{self, Entity as WorkEntity},
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{error, info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Computed availability bucket for a work, derived from its thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum StockStatus {
    Out,
    Low,
    Available,
}

impl StockStatus {
    pub fn for_work(work: &work::Model) -> Self {
        if work.stock == 0 {
            StockStatus::Out
        } else if work.stock <= work.min_stock {
            StockStatus::Low
        } else {
            StockStatus::Available
        }
    }
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct PostMovementRequest {
    pub work_id: Uuid,
    pub movement_type: MovementType,
    /// Signed delta; OUT movements carry a negative quantity.
    #[validate(range(min = -100_000, max = 100_000))]
    pub quantity: i32,
    pub reason: Option<String>,
    pub reference: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MovementOutcome {
    pub movement: stock_movement::Model,
    pub work: work::Model,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct WorkStockRow {
    #[serde(flatten)]
    pub work: work::Model,
    pub stock_status: StockStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockSummary {
    pub total_works: u64,
    pub total_units: i64,
    pub out_of_stock: u64,
    pub low_stock: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DisciplineStockStat {
    pub discipline_id: Uuid,
    pub discipline: String,
    pub works: u64,
    pub units: i64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct StockOverview {
    pub works: Vec<WorkStockRow>,
    pub summary: StockSummary,
    pub discipline_stats: Vec<DisciplineStockStat>,
    pub top_works_by_stock: Vec<WorkStockRow>,
    pub recent_movements: Vec<stock_movement::Model>,
}

/// Applies a stock delta inside the caller's transaction: inserts the
/// movement row and updates the work with a version check so concurrent
/// postings cannot silently lose an update. Rejects any delta that would
/// leave the stock negative, without writing anything.
pub(crate) async fn apply_movement<C: ConnectionTrait>(
    conn: &C,
    current: &work::Model,
    movement_type: MovementType,
    quantity: i32,
    reason: Option<String>,
    reference: Option<String>,
    performed_by: Uuid,
) -> Result<(stock_movement::Model, i32), ServiceError> {
    let new_stock = current.stock + quantity;
    if new_stock < 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "movement of {} on work {} would leave stock at {}",
            quantity, current.id, new_stock
        )));
    }

    let now = Utc::now();
    let movement = stock_movement::ActiveModel {
        id: Set(Uuid::new_v4()),
        work_id: Set(current.id),
        movement_type: Set(movement_type),
        quantity: Set(quantity),
        reason: Set(reason),
        reference: Set(reference),
        performed_by: Set(performed_by),
        created_at: Set(now),
    }
    .insert(conn)
    .await
    .map_err(ServiceError::DatabaseError)?;

    let update = WorkEntity::update_many()
        .col_expr(work::Column::Stock, Expr::value(new_stock))
        .col_expr(work::Column::Version, Expr::value(current.version + 1))
        .col_expr(work::Column::UpdatedAt, Expr::value(Some(now)))
        .filter(work::Column::Id.eq(current.id))
        .filter(work::Column::Version.eq(current.version))
        .exec(conn)
        .await
        .map_err(ServiceError::DatabaseError)?;

    if update.rows_affected == 0 {
        warn!(work_id = %current.id, "Lost the version race while updating stock");
        return Err(ServiceError::ConcurrentModification(current.id));
    }

    Ok((movement, new_stock))
}

/// Service for the stock ledger: movement postings and the stock read model.
#[derive(Clone)]
pub struct StockService {
    db: Arc<DbPool>,
    event_sender: EventSender,
}

impl StockService {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender) -> Self {
        Self { db, event_sender }
    }

    /// Posts a manual stock movement as one transactional unit: the movement
    /// row and the work's stock are committed together or not at all.
    #[instrument(skip(self, request), fields(work_id = %request.work_id, quantity = request.quantity))]
    pub async fn post_movement(
        &self,
        request: PostMovementRequest,
        performed_by: Uuid,
    ) -> Result<MovementOutcome, ServiceError> {
        request
            .validate()
            .map_err(|e| ServiceError::ValidationError(e.to_string()))?;
        if request.quantity == 0 {
            return Err(ServiceError::ValidationError(
                "Movement quantity must be non-zero".to_string(),
            ));
        }

        let db = &*self.db;
        let txn = db.begin().await.map_err(|e| {
            error!(error = %e, "Failed to start transaction for stock movement");
            ServiceError::DatabaseError(e)
        })?;

        let work = WorkEntity::find_by_id(request.work_id)
            .one(&txn)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound(format!("Work {} not found", request.work_id))
            })?;

        let (movement, new_stock) = apply_movement(
            &txn,
            &work,
            request.movement_type,
            request.quantity,
            request.reason,
            request.reference,
            performed_by,
        )
        .await?;

        txn.commit().await.map_err(|e| {
            error!(error = %e, work_id = %work.id, "Failed to commit stock movement transaction");
            ServiceError::DatabaseError(e)
        })?;

        info!(
            work_id = %work.id,
            movement_id = %movement.id,
            old_stock = work.stock,
            new_stock,
            "Stock movement posted"
        );

        if let Err(e) = self
            .event_sender
            .send(Event::StockMovementPosted {
                work_id: work.id,
                movement_id: movement.id,
                quantity: movement.quantity,
                new_stock,
            })
            .await
        {
            warn!(error = %e, "Failed to send stock movement event");
        }
        if new_stock <= work.min_stock {
            let _ = self
                .event_sender
                .send(Event::LowStockDetected {
                    work_id: work.id,
                    stock: new_stock,
                    min_stock: work.min_stock,
                })
                .await;
        }

        let refreshed = work::Model {
            stock: new_stock,
            version: work.version + 1,
            ..work
        };

        Ok(MovementOutcome {
            movement,
            work: refreshed,
        })
    }

    /// Assembles the management stock overview read model.
    #[instrument(skip(self))]
    pub async fn stock_overview(&self) -> Result<StockOverview, ServiceError> {
        let db = &*self.db;

        let works = WorkEntity::find()
            .order_by_asc(work::Column::Title)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let disciplines: HashMap<Uuid, String> = DisciplineEntity::find()
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .into_iter()
            .map(|d| (d.id, d.name))
            .collect();

        let rows: Vec<WorkStockRow> = works
            .into_iter()
            .map(|w| WorkStockRow {
                stock_status: StockStatus::for_work(&w),
                work: w,
            })
            .collect();

        let summary = StockSummary {
            total_works: rows.len() as u64,
            total_units: rows.iter().map(|r| r.work.stock as i64).sum(),
            out_of_stock: rows
                .iter()
                .filter(|r| r.stock_status == StockStatus::Out)
                .count() as u64,
            low_stock: rows
                .iter()
                .filter(|r| r.stock_status == StockStatus::Low)
                .count() as u64,
        };

        let mut per_discipline: HashMap<Uuid, DisciplineStockStat> = HashMap::new();
        for row in &rows {
            let stat = per_discipline
                .entry(row.work.discipline_id)
                .or_insert_with(|| DisciplineStockStat {
                    discipline_id: row.work.discipline_id,
                    discipline: disciplines
                        .get(&row.work.discipline_id)
                        .cloned()
                        .unwrap_or_else(|| "Inconnue".to_string()),
                    works: 0,
                    units: 0,
                });
            stat.works += 1;
            stat.units += row.work.stock as i64;
        }
        let mut discipline_stats: Vec<DisciplineStockStat> = per_discipline.into_values().collect();
        discipline_stats.sort_by(|a, b| b.units.cmp(&a.units));

        let mut top_works: Vec<WorkStockRow> = rows
            .iter()
            .map(|r| WorkStockRow {
                work: r.work.clone(),
                stock_status: r.stock_status,
            })
            .collect();
        top_works.sort_by(|a, b| b.work.stock.cmp(&a.work.stock));
        top_works.truncate(5);

        let recent_movements = StockMovementEntity::find()
            .order_by_desc(stock_movement::Column::CreatedAt)
            .limit(10)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        Ok(StockOverview {
            works: rows,
            summary,
            discipline_stats,
            top_works_by_stock: top_works,
            recent_movements,
        })
    }

    /// Lists movement history with pagination, newest first.
    #[instrument(skip(self))]
    pub async fn list_movements(
        &self,
        page: u64,
        per_page: u64,
    ) -> Result<(Vec<stock_movement::Model>, u64), ServiceError> {
        let db = &*self.db;

        let paginator = StockMovementEntity::find()
            .order_by_desc(stock_movement::Column::CreatedAt)
            .paginate(db, per_page.max(1));

        let total = paginator.num_items().await.map_err(|e| {
            error!(error = %e, "Failed to count stock movements");
            ServiceError::DatabaseError(e)
        })?;

        let movements = paginator
            .fetch_page(page.saturating_sub(1))
            .await
            .map_err(|e| {
                error!(error = %e, page, per_page, "Failed to fetch stock movements page");
                ServiceError::DatabaseError(e)
            })?;

        Ok((movements, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::work::WorkStatus;
    use rust_decimal_macros::dec;
    use test_case::test_case;

    fn work_with_stock(stock: i32, min_stock: i32) -> work::Model {
        work::Model {
            id: Uuid::new_v4(),
            title: "Grammaire du wolof".into(),
            isbn: None,
            price: dec!(25000),
            stock,
            min_stock,
            max_stock: 100,
            status: WorkStatus::OnSale,
            discipline_id: Uuid::new_v4(),
            author_id: None,
            designer_id: None,
            created_at: Utc::now(),
            updated_at: None,
            version: 1,
        }
    }

    #[test_case(0, 5, StockStatus::Out ; "zero stock is out")]
    #[test_case(3, 5, StockStatus::Low ; "below min is low")]
    #[test_case(5, 5, StockStatus::Low ; "at min is still low")]
    #[test_case(6, 5, StockStatus::Available ; "above min is available")]
    fn stock_status_thresholds(stock: i32, min_stock: i32, expected: StockStatus) {
        assert_eq!(StockStatus::for_work(&work_with_stock(stock, min_stock)), expected);
    }
}

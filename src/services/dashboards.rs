use crate::{
    db::DbPool,
    entities::commission::{self, Entity as CommissionEntity},
    entities::order::{self, Entity as OrderEntity, OrderStatus},
    entities::order_item::{self, Entity as OrderItemEntity},
    entities::partner::{self, Entity as PartnerEntity},
    entities::royalty::{self, Entity as RoyaltyEntity},
    entities::user::{self, Entity as UserEntity, UserRole},
    entities::work::{self, Entity as WorkEntity, WorkStatus},
    errors::ServiceError,
    services::commissions::MonthlyAmount,
    services::month_key,
};
use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, Condition, EntityTrait, QueryFilter, QueryOrder};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tracing::instrument;
use utoipa::ToSchema;
use uuid::Uuid;

const TOP_TAKE: usize = 5;
const RECENT_TAKE: usize = 5;
const PENDING_WORKS_TAKE: usize = 10;

#[derive(Debug, Default, Serialize, ToSchema)]
pub struct OrderCounts {
    pub total: u64,
    pub pending: u64,
    pub validated: u64,
    pub processing: u64,
    pub shipped: u64,
    pub delivered: u64,
    pub cancelled: u64,
}

impl OrderCounts {
    fn from_orders(orders: &[order::Model]) -> Self {
        let mut counts = OrderCounts {
            total: orders.len() as u64,
            ..Default::default()
        };
        for o in orders {
            match o.status {
                OrderStatus::Pending => counts.pending += 1,
                OrderStatus::Validated => counts.validated += 1,
                OrderStatus::Processing => counts.processing += 1,
                OrderStatus::Shipped => counts.shipped += 1,
                OrderStatus::Delivered => counts.delivered += 1,
                OrderStatus::Cancelled => counts.cancelled += 1,
            }
        }
        counts
    }
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopWork {
    pub work_id: Uuid,
    pub title: String,
    pub units_sold: i64,
    pub revenue: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TopPartner {
    pub partner_id: Uuid,
    pub name: String,
    pub orders: u64,
    pub total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RoleHeadcount {
    pub role: UserRole,
    pub count: u64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PdgDashboard {
    pub orders: OrderCounts,
    pub revenue_total: Decimal,
    pub monthly_revenue: Vec<MonthlyAmount>,
    pub top_partners: Vec<TopPartner>,
    pub top_works: Vec<TopWork>,
    pub works_pending_validation: Vec<work::Model>,
    pub headcounts: Vec<RoleHeadcount>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RepresentantSummary {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub delivered_orders: u64,
    pub total_revenue: Decimal,
    pub pending_commissions: Decimal,
    pub paid_commissions: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct RepresentantDashboard {
    pub summary: RepresentantSummary,
    pub recent_orders: Vec<order::Model>,
    pub chart_data: Vec<MonthlyAmount>,
    pub top_works: Vec<TopWork>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PartenaireSummary {
    pub total_orders: u64,
    pub pending_orders: u64,
    pub delivered_orders: u64,
    pub total_spend: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct PartenaireDashboard {
    pub summary: PartenaireSummary,
    pub monthly_spend: Vec<MonthlyAmount>,
    pub recent_orders: Vec<order::Model>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatorWorkRow {
    #[serde(flatten)]
    pub work: work::Model,
    pub units_sold: i64,
    pub royalty_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatorRoyaltySummary {
    pub pending_count: u64,
    pub pending_total: Decimal,
    pub paid_count: u64,
    pub paid_total: Decimal,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CreatorDashboard {
    pub works: Vec<CreatorWorkRow>,
    pub royalties: CreatorRoyaltySummary,
    pub monthly_royalties: Vec<MonthlyAmount>,
}

/// Read-only dashboard assemblers. Everything here is side-effect-free and
/// safely retryable; rankings and recents carry fixed take caps.
#[derive(Clone)]
pub struct DashboardService {
    db: Arc<DbPool>,
}

impl DashboardService {
    pub fn new(db: Arc<DbPool>) -> Self {
        Self { db }
    }

    /// Global management dashboard.
    #[instrument(skip(self))]
    pub async fn pdg_dashboard(&self) -> Result<PdgDashboard, ServiceError> {
        let db = &*self.db;

        let (orders, partners, users, pending_works) = futures::try_join!(
            OrderEntity::find().all(db),
            PartnerEntity::find().all(db),
            UserEntity::find().all(db),
            WorkEntity::find()
                .filter(work::Column::Status.eq(WorkStatus::Submitted))
                .order_by_asc(work::Column::CreatedAt)
                .all(db),
        )
        .map_err(ServiceError::DatabaseError)?;

        let sold: Vec<&order::Model> = orders
            .iter()
            .filter(|o| o.status.is_validated_or_later())
            .collect();
        let revenue_total: Decimal = sold.iter().map(|o| o.total_amount).sum();
        let monthly_revenue = monthly_amounts(sold.iter().map(|o| (o.created_at, o.total_amount)));

        let partner_names: HashMap<Uuid, String> =
            partners.into_iter().map(|p| (p.id, p.name)).collect();
        let mut per_partner: HashMap<Uuid, TopPartner> = HashMap::new();
        for o in &sold {
            let Some(partner_id) = o.partner_id else {
                continue;
            };
            let entry = per_partner.entry(partner_id).or_insert_with(|| TopPartner {
                partner_id,
                name: partner_names
                    .get(&partner_id)
                    .cloned()
                    .unwrap_or_else(|| "Inconnu".to_string()),
                orders: 0,
                total: Decimal::ZERO,
            });
            entry.orders += 1;
            entry.total += o.total_amount;
        }
        let mut top_partners: Vec<TopPartner> = per_partner.into_values().collect();
        top_partners.sort_by(|a, b| b.total.cmp(&a.total));
        top_partners.truncate(TOP_TAKE);

        let sold_ids: Vec<Uuid> = sold.iter().map(|o| o.id).collect();
        let top_works = self.top_works_for_orders(&sold_ids).await?;

        let mut per_role: BTreeMap<String, (UserRole, u64)> = BTreeMap::new();
        for u in &users {
            per_role
                .entry(u.role.to_string())
                .or_insert((u.role, 0))
                .1 += 1;
        }
        let headcounts = per_role
            .into_values()
            .map(|(role, count)| RoleHeadcount { role, count })
            .collect();

        let mut works_pending_validation = pending_works;
        works_pending_validation.truncate(PENDING_WORKS_TAKE);

        Ok(PdgDashboard {
            orders: OrderCounts::from_orders(&orders),
            revenue_total,
            monthly_revenue,
            top_partners,
            top_works,
            works_pending_validation,
            headcounts,
        })
    }

    /// Per-representative dashboard: own orders plus commission totals.
    #[instrument(skip(self))]
    pub async fn representant_dashboard(
        &self,
        representative_id: Uuid,
    ) -> Result<RepresentantDashboard, ServiceError> {
        let db = &*self.db;

        let (orders, commissions) = futures::try_join!(
            OrderEntity::find()
                .filter(order::Column::RepresentativeId.eq(representative_id))
                .order_by_desc(order::Column::CreatedAt)
                .all(db),
            CommissionEntity::find()
                .filter(commission::Column::RepresentativeId.eq(representative_id))
                .all(db),
        )
        .map_err(ServiceError::DatabaseError)?;

        let counts = OrderCounts::from_orders(&orders);
        let sold: Vec<&order::Model> = orders
            .iter()
            .filter(|o| o.status.is_validated_or_later())
            .collect();
        let total_revenue: Decimal = sold.iter().map(|o| o.total_amount).sum();
        let chart_data = monthly_amounts(sold.iter().map(|o| (o.created_at, o.total_amount)));

        let (paid, pending): (Vec<_>, Vec<_>) = commissions.iter().partition(|c| c.paid);
        let summary = RepresentantSummary {
            total_orders: counts.total,
            pending_orders: counts.pending,
            delivered_orders: counts.delivered,
            total_revenue,
            pending_commissions: pending.iter().map(|c| c.amount).sum(),
            paid_commissions: paid.iter().map(|c| c.amount).sum(),
        };

        let sold_ids: Vec<Uuid> = sold.iter().map(|o| o.id).collect();
        let top_works = self.top_works_for_orders(&sold_ids).await?;
        let recent_orders = orders.into_iter().take(RECENT_TAKE).collect();

        Ok(RepresentantDashboard {
            summary,
            recent_orders,
            chart_data,
            top_works,
        })
    }

    /// Partner dashboard, scoped by the partner row linked to the caller.
    #[instrument(skip(self))]
    pub async fn partenaire_dashboard(
        &self,
        user_id: Uuid,
    ) -> Result<PartenaireDashboard, ServiceError> {
        let db = &*self.db;

        let partner = PartnerEntity::find()
            .filter(partner::Column::UserId.eq(user_id))
            .one(db)
            .await
            .map_err(ServiceError::DatabaseError)?
            .ok_or_else(|| {
                ServiceError::NotFound("No partner organization linked to this account".to_string())
            })?;

        let orders = OrderEntity::find()
            .filter(order::Column::PartnerId.eq(partner.id))
            .order_by_desc(order::Column::CreatedAt)
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let counts = OrderCounts::from_orders(&orders);
        let sold: Vec<&order::Model> = orders
            .iter()
            .filter(|o| o.status.is_validated_or_later())
            .collect();

        let summary = PartenaireSummary {
            total_orders: counts.total,
            pending_orders: counts.pending,
            delivered_orders: counts.delivered,
            total_spend: sold.iter().map(|o| o.total_amount).sum(),
        };
        let monthly_spend = monthly_amounts(sold.iter().map(|o| (o.created_at, o.total_amount)));
        let recent_orders = orders.into_iter().take(RECENT_TAKE).collect();

        Ok(PartenaireDashboard {
            summary,
            monthly_spend,
            recent_orders,
        })
    }

    /// Creator (author/designer) dashboard: own works, sales and royalties.
    #[instrument(skip(self))]
    pub async fn creator_dashboard(&self, creator_id: Uuid) -> Result<CreatorDashboard, ServiceError> {
        let db = &*self.db;

        let (works, royalties) = futures::try_join!(
            WorkEntity::find()
                .filter(
                    Condition::any()
                        .add(work::Column::AuthorId.eq(creator_id))
                        .add(work::Column::DesignerId.eq(creator_id)),
                )
                .order_by_desc(work::Column::CreatedAt)
                .all(db),
            RoyaltyEntity::find()
                .filter(royalty::Column::BeneficiaryId.eq(creator_id))
                .all(db),
        )
        .map_err(ServiceError::DatabaseError)?;

        let work_ids: Vec<Uuid> = works.iter().map(|w| w.id).collect();
        let mut units_by_work: HashMap<Uuid, i64> = HashMap::new();
        if !work_ids.is_empty() {
            let items = OrderItemEntity::find()
                .filter(order_item::Column::WorkId.is_in(work_ids.clone()))
                .all(db)
                .await
                .map_err(ServiceError::DatabaseError)?;
            let order_ids: Vec<Uuid> = items.iter().map(|i| i.order_id).collect();
            let sold_orders: HashMap<Uuid, OrderStatus> = OrderEntity::find()
                .filter(order::Column::Id.is_in(order_ids))
                .all(db)
                .await
                .map_err(ServiceError::DatabaseError)?
                .into_iter()
                .map(|o| (o.id, o.status))
                .collect();
            for item in items {
                let counted = sold_orders
                    .get(&item.order_id)
                    .map(|s| s.is_validated_or_later())
                    .unwrap_or(false);
                if counted {
                    *units_by_work.entry(item.work_id).or_default() += item.quantity as i64;
                }
            }
        }

        let mut royalty_by_work: HashMap<Uuid, Decimal> = HashMap::new();
        for r in &royalties {
            *royalty_by_work.entry(r.work_id).or_default() += r.amount;
        }

        let work_rows = works
            .into_iter()
            .map(|w| CreatorWorkRow {
                units_sold: units_by_work.get(&w.id).copied().unwrap_or(0),
                royalty_total: royalty_by_work.get(&w.id).copied().unwrap_or(Decimal::ZERO),
                work: w,
            })
            .collect();

        let (paid, pending): (Vec<_>, Vec<_>) = royalties.iter().partition(|r| r.paid);
        let summary = CreatorRoyaltySummary {
            pending_count: pending.len() as u64,
            pending_total: pending.iter().map(|r| r.amount).sum(),
            paid_count: paid.len() as u64,
            paid_total: paid.iter().map(|r| r.amount).sum(),
        };
        let monthly_royalties = monthly_amounts(royalties.iter().map(|r| (r.created_at, r.amount)));

        Ok(CreatorDashboard {
            works: work_rows,
            royalties: summary,
            monthly_royalties,
        })
    }

    /// Units and revenue per work over the given orders, ranked, capped.
    /// Titles come from the line snapshots so deleted works still rank.
    async fn top_works_for_orders(
        &self,
        order_ids: &[Uuid],
    ) -> Result<Vec<TopWork>, ServiceError> {
        if order_ids.is_empty() {
            return Ok(vec![]);
        }
        let db = &*self.db;
        let items = OrderItemEntity::find()
            .filter(order_item::Column::OrderId.is_in(order_ids.iter().copied()))
            .all(db)
            .await
            .map_err(ServiceError::DatabaseError)?;

        let mut per_work: HashMap<Uuid, TopWork> = HashMap::new();
        for item in items {
            let entry = per_work.entry(item.work_id).or_insert_with(|| TopWork {
                work_id: item.work_id,
                title: item.title.clone(),
                units_sold: 0,
                revenue: Decimal::ZERO,
            });
            entry.units_sold += item.quantity as i64;
            entry.revenue += item.line_total;
        }

        let mut ranked: Vec<TopWork> = per_work.into_values().collect();
        ranked.sort_by(|a, b| b.units_sold.cmp(&a.units_sold));
        ranked.truncate(TOP_TAKE);
        Ok(ranked)
    }
}

fn monthly_amounts(
    rows: impl Iterator<Item = (chrono::DateTime<chrono::Utc>, Decimal)>,
) -> Vec<MonthlyAmount> {
    let mut buckets: BTreeMap<String, Decimal> = BTreeMap::new();
    for (ts, amount) in rows {
        *buckets.entry(month_key(ts)).or_default() += amount;
    }
    buckets
        .into_iter()
        .map(|(month, total)| MonthlyAmount { month, total })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use rust_decimal_macros::dec;

    fn order_with(status: OrderStatus, total: Decimal) -> order::Model {
        order::Model {
            id: Uuid::new_v4(),
            order_number: format!("CMD-TEST-{}", Uuid::new_v4().simple()),
            customer_id: Uuid::new_v4(),
            partner_id: None,
            representative_id: None,
            status,
            total_amount: total,
            currency: "XOF".into(),
            notes: None,
            created_at: Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap(),
            updated_at: None,
            version: 1,
        }
    }

    #[test]
    fn order_counts_bucket_by_status() {
        let orders = vec![
            order_with(OrderStatus::Pending, dec!(1000)),
            order_with(OrderStatus::Pending, dec!(2000)),
            order_with(OrderStatus::Delivered, dec!(3000)),
            order_with(OrderStatus::Cancelled, dec!(500)),
        ];
        let counts = OrderCounts::from_orders(&orders);
        assert_eq!(counts.total, 4);
        assert_eq!(counts.pending, 2);
        assert_eq!(counts.delivered, 1);
        assert_eq!(counts.cancelled, 1);
        assert_eq!(counts.shipped, 0);
    }

    #[test]
    fn monthly_amounts_accumulate_per_month() {
        let jan = Utc.with_ymd_and_hms(2025, 1, 5, 0, 0, 0).unwrap();
        let feb = Utc.with_ymd_and_hms(2025, 2, 5, 0, 0, 0).unwrap();
        let buckets = monthly_amounts(
            vec![(jan, dec!(100)), (feb, dec!(50)), (jan, dec!(25))].into_iter(),
        );
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].month, "2025-01");
        assert_eq!(buckets[0].total, dec!(125));
    }
}

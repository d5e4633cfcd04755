pub mod commissions;
pub mod dashboards;
pub mod notifications;
pub mod orders;
pub mod royalties;
pub mod session;
pub mod stock;
pub mod users;
pub mod works;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub orders: Arc<crate::services::orders::OrderService>,
    pub stock: Arc<crate::services::stock::StockService>,
    pub royalties: Arc<crate::services::royalties::RoyaltyService>,
    pub commissions: Arc<crate::services::commissions::CommissionService>,
    pub dashboards: Arc<crate::services::dashboards::DashboardService>,
    pub works: Arc<crate::services::works::WorkService>,
    pub notifications: Arc<crate::services::notifications::NotificationService>,
    pub users: Arc<crate::services::users::UserService>,
}

impl AppServices {
    pub fn new(db: Arc<DbPool>, event_sender: EventSender, config: &AppConfig) -> Self {
        let orders = Arc::new(crate::services::orders::OrderService::new(
            db.clone(),
            event_sender.clone(),
            config.royalty_rate_decimal(),
            config.commission_rate_decimal(),
            config.currency.clone(),
        ));
        let stock = Arc::new(crate::services::stock::StockService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let royalties = Arc::new(crate::services::royalties::RoyaltyService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let commissions = Arc::new(crate::services::commissions::CommissionService::new(
            db.clone(),
            event_sender.clone(),
        ));
        let dashboards = Arc::new(crate::services::dashboards::DashboardService::new(db.clone()));
        let works = Arc::new(crate::services::works::WorkService::new(
            db.clone(),
            event_sender,
        ));
        let notifications = Arc::new(crate::services::notifications::NotificationService::new(
            db.clone(),
        ));
        let users = Arc::new(crate::services::users::UserService::new(db));

        Self {
            orders,
            stock,
            royalties,
            commissions,
            dashboards,
            works,
            notifications,
            users,
        }
    }
}

#![allow(dead_code)]

use chrono::Utc;
use editions_api::{
    auth::AuthUser,
    db::{establish_connection_with_config, run_migrations, DbConfig, DbPool},
    entities::{
        discipline,
        user::{self, UserRole},
        work::{self, WorkStatus},
    },
    events::EventSender,
};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, Set};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Fresh in-memory database with the full schema applied. Each call gets its
/// own named shared-cache database so concurrent tests stay isolated.
pub async fn test_db() -> Arc<DbPool> {
    let config = DbConfig {
        url: format!(
            "sqlite:file:testdb-{}?mode=memory&cache=shared",
            Uuid::new_v4().simple()
        ),
        max_connections: 5,
        ..Default::default()
    };
    let pool = establish_connection_with_config(&config)
        .await
        .expect("Failed to create test DB pool");
    run_migrations(&pool).await.expect("Failed to run migrations");
    Arc::new(pool)
}

/// Event sender whose receiver stays alive for the duration of the test.
pub fn test_event_sender() -> (EventSender, mpsc::Receiver<editions_api::events::Event>) {
    let (tx, rx) = mpsc::channel(64);
    (EventSender::new(tx), rx)
}

pub async fn create_user(db: &DbPool, role: UserRole, name: &str) -> user::Model {
    user::ActiveModel {
        id: Set(Uuid::new_v4()),
        email: Set(format!("{}-{}@editions.test", name, Uuid::new_v4().simple())),
        name: Set(name.to_string()),
        role: Set(role),
        active: Set(true),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
    }
    .insert(db)
    .await
    .expect("Failed to insert user")
}

pub async fn create_discipline(db: &DbPool, name: &str) -> discipline::Model {
    discipline::ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(format!("{}-{}", name, Uuid::new_v4().simple())),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("Failed to insert discipline")
}

pub struct WorkSeed {
    pub price: Decimal,
    pub stock: i32,
    pub min_stock: i32,
    pub author_id: Option<Uuid>,
    pub designer_id: Option<Uuid>,
}

impl Default for WorkSeed {
    fn default() -> Self {
        Self {
            price: Decimal::new(25_000, 0),
            stock: 10,
            min_stock: 2,
            author_id: None,
            designer_id: None,
        }
    }
}

pub async fn create_work(
    db: &DbPool,
    discipline_id: Uuid,
    title: &str,
    seed: WorkSeed,
) -> work::Model {
    work::ActiveModel {
        id: Set(Uuid::new_v4()),
        title: Set(title.to_string()),
        isbn: Set(None),
        price: Set(seed.price),
        stock: Set(seed.stock),
        min_stock: Set(seed.min_stock),
        max_stock: Set(100),
        status: Set(WorkStatus::OnSale),
        discipline_id: Set(discipline_id),
        author_id: Set(seed.author_id),
        designer_id: Set(seed.designer_id),
        created_at: Set(Utc::now()),
        updated_at: Set(None),
        version: Set(1),
    }
    .insert(db)
    .await
    .expect("Failed to insert work")
}

pub fn actor(user: &user::Model) -> AuthUser {
    AuthUser::from(user)
}

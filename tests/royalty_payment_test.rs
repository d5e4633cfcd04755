mod common;

use assert_matches::assert_matches;
use chrono::Utc;
use common::{create_discipline, create_user, create_work, test_db, test_event_sender, WorkSeed};
use editions_api::{
    db::DbPool,
    entities::commission,
    entities::royalty::{self, Entity as RoyaltyEntity},
    entities::user::UserRole,
    errors::ServiceError,
    services::commissions::{CommissionService, PayCommissionsRequest},
    services::royalties::{PayRoyaltiesRequest, RoyaltyService},
};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};
use std::sync::Arc;
use uuid::Uuid;

fn royalty_service(db: Arc<DbPool>) -> RoyaltyService {
    let (events, _rx) = test_event_sender();
    RoyaltyService::new(db, events)
}

async fn seed_royalty(db: &DbPool, beneficiary: Uuid, work: Uuid, amount: Decimal) -> royalty::Model {
    royalty::ActiveModel {
        id: Set(Uuid::new_v4()),
        work_id: Set(work),
        order_item_id: Set(Uuid::new_v4()),
        beneficiary_id: Set(beneficiary),
        amount: Set(amount),
        rate: Set(dec!(0.15)),
        paid: Set(false),
        paid_at: Set(None),
        payment_method: Set(None),
        created_at: Set(Utc::now()),
    }
    .insert(db)
    .await
    .expect("royalty insert should succeed")
}

#[tokio::test]
async fn paying_a_batch_flips_both_rows_and_moves_the_totals() {
    let db = test_db().await;
    let service = royalty_service(db.clone());

    let author = create_user(&db, UserRole::Auteur, "auteur").await;
    let discipline = create_discipline(&db, "Lettres").await;
    let work = create_work(&db, discipline.id, "Romans", WorkSeed::default()).await;

    let r1 = seed_royalty(&db, author.id, work.id, dec!(3000)).await;
    let r2 = seed_royalty(&db, author.id, work.id, dec!(4500)).await;

    let before = service.summary().await.expect("summary");
    assert_eq!(before.pending_total, dec!(7500));
    assert_eq!(before.paid_total, dec!(0));

    let result = service
        .pay_batch(PayRoyaltiesRequest {
            royalty_ids: vec![r1.id, r2.id],
            payment_method: "Virement".to_string(),
        })
        .await
        .expect("batch should pay");

    assert_eq!(result.paid_count, 2);
    assert_eq!(result.paid_total, dec!(7500));
    assert_eq!(result.summary.pending_total, dec!(0));
    assert_eq!(result.summary.paid_total, dec!(7500));

    for row in RoyaltyEntity::find().all(&*db).await.expect("query") {
        assert!(row.paid);
        assert!(row.paid_at.is_some());
        assert_eq!(row.payment_method.as_deref(), Some("Virement"));
    }
}

#[tokio::test]
async fn batches_with_an_already_paid_row_fail_atomically() {
    let db = test_db().await;
    let service = royalty_service(db.clone());

    let author = create_user(&db, UserRole::Auteur, "auteur").await;
    let discipline = create_discipline(&db, "Lettres").await;
    let work = create_work(&db, discipline.id, "Essais", WorkSeed::default()).await;

    let r1 = seed_royalty(&db, author.id, work.id, dec!(2000)).await;
    let r2 = seed_royalty(&db, author.id, work.id, dec!(1000)).await;

    service
        .pay_batch(PayRoyaltiesRequest {
            royalty_ids: vec![r1.id],
            payment_method: "Espèces".to_string(),
        })
        .await
        .expect("first batch should pay");

    let result = service
        .pay_batch(PayRoyaltiesRequest {
            royalty_ids: vec![r1.id, r2.id],
            payment_method: "Espèces".to_string(),
        })
        .await;
    assert_matches!(result, Err(ServiceError::Conflict(_)));

    // The unpaid row stayed unpaid: the failing batch changed nothing
    let summary = service.summary().await.expect("summary");
    assert_eq!(summary.pending_total, dec!(1000));
    assert_eq!(summary.paid_total, dec!(2000));
}

#[tokio::test]
async fn unknown_ids_fail_the_batch() {
    let db = test_db().await;
    let service = royalty_service(db.clone());

    let author = create_user(&db, UserRole::Auteur, "auteur").await;
    let discipline = create_discipline(&db, "Lettres").await;
    let work = create_work(&db, discipline.id, "Contes", WorkSeed::default()).await;
    let r1 = seed_royalty(&db, author.id, work.id, dec!(900)).await;

    let result = service
        .pay_batch(PayRoyaltiesRequest {
            royalty_ids: vec![r1.id, Uuid::new_v4()],
            payment_method: "Chèque".to_string(),
        })
        .await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));

    let summary = service.summary().await.expect("summary");
    assert_eq!(summary.pending_total, dec!(900));
}

#[tokio::test]
async fn empty_batches_and_blank_methods_are_rejected() {
    let db = test_db().await;
    let service = royalty_service(db.clone());

    let result = service
        .pay_batch(PayRoyaltiesRequest {
            royalty_ids: vec![],
            payment_method: "Virement".to_string(),
        })
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));

    let author = create_user(&db, UserRole::Auteur, "auteur").await;
    let discipline = create_discipline(&db, "Lettres").await;
    let work = create_work(&db, discipline.id, "Fables", WorkSeed::default()).await;
    let r1 = seed_royalty(&db, author.id, work.id, dec!(100)).await;

    let result = service
        .pay_batch(PayRoyaltiesRequest {
            royalty_ids: vec![r1.id],
            payment_method: "  ".to_string(),
        })
        .await;
    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn commission_batches_follow_the_same_contract() {
    let db = test_db().await;
    let (events, _rx) = test_event_sender();
    let service = CommissionService::new(db.clone(), events);

    let rep = create_user(&db, UserRole::Representant, "rep").await;

    let seed = |amount: Decimal| {
        let db = db.clone();
        let rep_id = rep.id;
        async move {
            commission::ActiveModel {
                id: Set(Uuid::new_v4()),
                order_id: Set(Uuid::new_v4()),
                representative_id: Set(rep_id),
                amount: Set(amount),
                rate: Set(dec!(0.10)),
                paid: Set(false),
                paid_at: Set(None),
                payment_method: Set(None),
                created_at: Set(Utc::now()),
            }
            .insert(&*db)
            .await
            .expect("commission insert should succeed")
        }
    };

    let c1 = seed(dec!(5000)).await;
    let c2 = seed(dec!(2500)).await;

    let result = service
        .pay_batch(PayCommissionsRequest {
            commission_ids: vec![c1.id, c2.id],
            payment_method: "Virement".to_string(),
        })
        .await
        .expect("batch should pay");

    assert_eq!(result.paid_count, 2);
    assert_eq!(result.paid_total, dec!(7500));
    assert_eq!(result.summary.pending_total, dec!(0));

    let overview = service
        .overview_for_representative(rep.id)
        .await
        .expect("overview");
    assert_eq!(overview.summary.paid_total, dec!(7500));
    assert_eq!(overview.commissions.len(), 2);
    assert_eq!(overview.chart_data.len(), 1);
}

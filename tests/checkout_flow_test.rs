mod common;

use common::{actor, create_discipline, create_user, create_work, test_db, test_event_sender, WorkSeed};
use editions_api::{
    entities::order::OrderStatus,
    entities::user::UserRole,
    entities::work::{self, WorkStatus},
    errors::ServiceError,
    services::orders::{CheckoutItem, CheckoutRequest, OrderService},
    services::users::{CreatePartnerRequest, UserService},
};
use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use sea_orm::{ActiveModelTrait, Set};

fn order_service(db: std::sync::Arc<editions_api::db::DbPool>) -> OrderService {
    let (events, _rx) = test_event_sender();
    // The receiver is dropped here on purpose; send failures are non-fatal
    OrderService::new(db, events, dec!(0.15), dec!(0.10), "XOF".to_string())
}

#[tokio::test]
async fn checkout_snapshots_prices_and_totals() {
    let db = test_db().await;
    let service = order_service(db.clone());

    let client = create_user(&db, UserRole::Client, "client").await;
    let discipline = create_discipline(&db, "Mathematiques").await;
    let w1 = create_work(
        &db,
        discipline.id,
        "Algebre 3e",
        WorkSeed {
            price: dec!(25000),
            ..Default::default()
        },
    )
    .await;

    let response = service
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: w1.id,
                    quantity: 2,
                }],
                partner_id: None,
                notes: None,
            },
            &actor(&client),
        )
        .await
        .expect("checkout should succeed");

    assert_eq!(response.items.len(), 1);
    assert_eq!(response.items[0].quantity, 2);
    assert_eq!(response.items[0].unit_price, dec!(25000));
    assert_eq!(response.items[0].line_total, dec!(50000));
    assert_eq!(response.order.total_amount, dec!(50000));
    assert_eq!(response.order.status, OrderStatus::Pending);
    assert_eq!(response.order.customer_id, client.id);
    assert!(response.order.order_number.starts_with("CMD-"));
    // Title snapshot survives later catalog edits
    assert_eq!(response.items[0].title, "Algebre 3e");
}

#[tokio::test]
async fn checkout_total_spans_multiple_lines() {
    let db = test_db().await;
    let service = order_service(db.clone());

    let client = create_user(&db, UserRole::Client, "client").await;
    let discipline = create_discipline(&db, "Lettres").await;
    let w1 = create_work(&db, discipline.id, "Grammaire", WorkSeed { price: dec!(12000), ..Default::default() }).await;
    let w2 = create_work(&db, discipline.id, "Conjugaison", WorkSeed { price: dec!(8500), ..Default::default() }).await;

    let response = service
        .checkout(
            CheckoutRequest {
                items: vec![
                    CheckoutItem { work_id: w1.id, quantity: 3 },
                    CheckoutItem { work_id: w2.id, quantity: 2 },
                ],
                partner_id: None,
                notes: Some("Rentrée scolaire".to_string()),
            },
            &actor(&client),
        )
        .await
        .expect("checkout should succeed");

    let items_total: rust_decimal::Decimal =
        response.items.iter().map(|i| i.line_total).sum();
    assert_eq!(response.order.total_amount, items_total);
    assert_eq!(response.order.total_amount, dec!(53000));
}

#[tokio::test]
async fn empty_item_list_is_rejected() {
    let db = test_db().await;
    let service = order_service(db.clone());
    let client = create_user(&db, UserRole::Client, "client").await;

    let result = service
        .checkout(
            CheckoutRequest {
                items: vec![],
                partner_id: None,
                notes: None,
            },
            &actor(&client),
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn zero_quantity_is_rejected() {
    let db = test_db().await;
    let service = order_service(db.clone());
    let client = create_user(&db, UserRole::Client, "client").await;
    let discipline = create_discipline(&db, "Sciences").await;
    let w1 = create_work(&db, discipline.id, "Physique", WorkSeed::default()).await;

    let result = service
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: w1.id,
                    quantity: 0,
                }],
                partner_id: None,
                notes: None,
            },
            &actor(&client),
        )
        .await;

    assert_matches!(result, Err(ServiceError::ValidationError(_)));
}

#[tokio::test]
async fn works_not_on_sale_cannot_be_ordered() {
    let db = test_db().await;
    let service = order_service(db.clone());
    let client = create_user(&db, UserRole::Client, "client").await;
    let discipline = create_discipline(&db, "Histoire").await;
    let w1 = create_work(&db, discipline.id, "Brouillon", WorkSeed::default()).await;

    let draft_id = w1.id;
    let mut draft: work::ActiveModel = w1.into();
    draft.status = Set(WorkStatus::Draft);
    draft.update(&*db).await.expect("should update work");

    let result = service
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: draft_id,
                    quantity: 1,
                }],
                partner_id: None,
                notes: None,
            },
            &actor(&client),
        )
        .await;

    assert_matches!(result, Err(ServiceError::InvalidOperation(_)));
}

#[tokio::test]
async fn partner_checkout_carries_partner_context() {
    let db = test_db().await;
    let service = order_service(db.clone());
    let user_service = UserService::new(db.clone());

    let partner_user = create_user(&db, UserRole::Partenaire, "librairie").await;
    let partner = user_service
        .create_partner(CreatePartnerRequest {
            user_id: partner_user.id,
            name: "Librairie du Centre".to_string(),
            contact_email: None,
            phone: None,
            city: Some("Dakar".to_string()),
        })
        .await
        .expect("partner creation should succeed");

    let discipline = create_discipline(&db, "Philosophie").await;
    let w1 = create_work(&db, discipline.id, "Logique", WorkSeed::default()).await;

    let response = service
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: w1.id,
                    quantity: 5,
                }],
                partner_id: None,
                notes: None,
            },
            &actor(&partner_user),
        )
        .await
        .expect("partner checkout should succeed");

    assert_eq!(response.order.partner_id, Some(partner.id));
    assert_eq!(response.order.representative_id, None);
}

#[tokio::test]
async fn representative_checkout_records_originator() {
    let db = test_db().await;
    let service = order_service(db.clone());

    let rep = create_user(&db, UserRole::Representant, "rep").await;
    let discipline = create_discipline(&db, "Geographie").await;
    let w1 = create_work(&db, discipline.id, "Atlas", WorkSeed::default()).await;

    let response = service
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: w1.id,
                    quantity: 1,
                }],
                partner_id: None,
                notes: None,
            },
            &actor(&rep),
        )
        .await
        .expect("representative checkout should succeed");

    assert_eq!(response.order.representative_id, Some(rep.id));
}

#[tokio::test]
async fn clients_cannot_order_for_a_partner() {
    let db = test_db().await;
    let service = order_service(db.clone());
    let client = create_user(&db, UserRole::Client, "client").await;
    let discipline = create_discipline(&db, "Economie").await;
    let w1 = create_work(&db, discipline.id, "Comptabilite", WorkSeed::default()).await;

    let result = service
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: w1.id,
                    quantity: 1,
                }],
                partner_id: Some(uuid::Uuid::new_v4()),
                notes: None,
            },
            &actor(&client),
        )
        .await;

    assert_matches!(result, Err(ServiceError::Forbidden(_)));
}

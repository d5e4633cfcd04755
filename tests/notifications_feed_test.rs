mod common;

use common::{actor, create_discipline, create_user, create_work, test_db, test_event_sender, WorkSeed};
use editions_api::{
    db::DbPool,
    entities::order::OrderStatus,
    entities::user::UserRole,
    services::notifications::NotificationService,
    services::orders::{CheckoutItem, CheckoutRequest, OrderService},
};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn order_service(db: Arc<DbPool>) -> OrderService {
    let (events, _rx) = test_event_sender();
    OrderService::new(db, events, dec!(0.15), dec!(0.10), "XOF".to_string())
}

#[tokio::test]
async fn feed_follows_order_history_and_read_marks_persist() {
    let db = test_db().await;
    let orders = order_service(db.clone());
    let notifications = NotificationService::new(db.clone());

    let client = create_user(&db, UserRole::Client, "client").await;
    let pdg = create_user(&db, UserRole::Pdg, "pdg").await;
    let discipline = create_discipline(&db, "Lettres").await;
    let work = create_work(&db, discipline.id, "Nouvelles", WorkSeed::default()).await;

    let client_actor = actor(&client);
    let order = orders
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: work.id,
                    quantity: 1,
                }],
                partner_id: None,
                notes: None,
            },
            &client_actor,
        )
        .await
        .expect("checkout");

    // Pending notification, unread
    let feed = notifications.feed(&client_actor).await.expect("feed");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].status, OrderStatus::Pending);
    assert!(!feed[0].read);
    let pending_key = feed[0].key.clone();

    // Mark read; repeating the call is harmless
    let marked = notifications
        .mark_read(&client_actor, vec![pending_key.clone()])
        .await
        .expect("mark read");
    assert_eq!(marked, 1);
    let marked_again = notifications
        .mark_read(&client_actor, vec![pending_key])
        .await
        .expect("mark read again");
    assert_eq!(marked_again, 0);

    let feed = notifications.feed(&client_actor).await.expect("feed");
    assert!(feed[0].read);

    // A status change produces a fresh, unread entry under a new key
    orders
        .transition(order.order.id, OrderStatus::Validated, None, &actor(&pdg))
        .await
        .expect("validate");

    let feed = notifications.feed(&client_actor).await.expect("feed");
    assert_eq!(feed.len(), 1);
    assert_eq!(feed[0].status, OrderStatus::Validated);
    assert!(!feed[0].read);
    assert!(feed[0].message.contains(&order.order.order_number));
}

#[tokio::test]
async fn feeds_are_scoped_by_role() {
    let db = test_db().await;
    let orders = order_service(db.clone());
    let notifications = NotificationService::new(db.clone());

    let client = create_user(&db, UserRole::Client, "client").await;
    let other_client = create_user(&db, UserRole::Client, "other").await;
    let rep = create_user(&db, UserRole::Representant, "rep").await;
    let pdg = create_user(&db, UserRole::Pdg, "pdg").await;
    let author = create_user(&db, UserRole::Auteur, "auteur").await;
    let discipline = create_discipline(&db, "Sciences").await;
    let work = create_work(&db, discipline.id, "Astronomie", WorkSeed::default()).await;

    orders
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: work.id,
                    quantity: 1,
                }],
                partner_id: None,
                notes: None,
            },
            &actor(&client),
        )
        .await
        .expect("client checkout");
    orders
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: work.id,
                    quantity: 2,
                }],
                partner_id: None,
                notes: None,
            },
            &actor(&rep),
        )
        .await
        .expect("rep checkout");

    // Management sees everything, scoped roles see their own slice
    assert_eq!(notifications.feed(&actor(&pdg)).await.expect("feed").len(), 2);
    assert_eq!(notifications.feed(&actor(&client)).await.expect("feed").len(), 1);
    assert_eq!(notifications.feed(&actor(&rep)).await.expect("feed").len(), 1);
    assert!(notifications
        .feed(&actor(&other_client))
        .await
        .expect("feed")
        .is_empty());
    // Creators have no order visibility at all
    assert!(notifications
        .feed(&actor(&author))
        .await
        .expect("feed")
        .is_empty());
}

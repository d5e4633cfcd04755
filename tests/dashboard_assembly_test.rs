mod common;

use common::{actor, create_discipline, create_user, create_work, test_db, test_event_sender, WorkSeed};
use editions_api::{
    db::DbPool,
    entities::order::OrderStatus,
    entities::user::UserRole,
    errors::ServiceError,
    services::dashboards::DashboardService,
    services::orders::{CheckoutItem, CheckoutRequest, OrderService},
    services::users::{CreatePartnerRequest, UserService},
};
use assert_matches::assert_matches;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn order_service(db: Arc<DbPool>) -> OrderService {
    let (events, _rx) = test_event_sender();
    OrderService::new(db, events, dec!(0.15), dec!(0.10), "XOF".to_string())
}

#[tokio::test]
async fn dashboards_aggregate_the_ledger_consistently() {
    let db = test_db().await;
    let orders = order_service(db.clone());
    let dashboards = DashboardService::new(db.clone());
    let users = UserService::new(db.clone());

    let pdg = create_user(&db, UserRole::Pdg, "pdg").await;
    let rep = create_user(&db, UserRole::Representant, "rep").await;
    let author = create_user(&db, UserRole::Auteur, "auteur").await;
    let partner_user = create_user(&db, UserRole::Partenaire, "librairie").await;
    let partner = users
        .create_partner(CreatePartnerRequest {
            user_id: partner_user.id,
            name: "Librairie de l'Université".to_string(),
            contact_email: None,
            phone: None,
            city: None,
        })
        .await
        .expect("partner");

    let discipline = create_discipline(&db, "Mathematiques").await;
    let work = create_work(
        &db,
        discipline.id,
        "Analyse 1",
        WorkSeed {
            price: dec!(10000),
            stock: 50,
            author_id: Some(author.id),
            ..Default::default()
        },
    )
    .await;

    let rep_actor = actor(&rep);
    let pdg_actor = actor(&pdg);

    // Order 1: representative for the partner, validated (accrues ledger rows)
    let o1 = orders
        .checkout(
            CheckoutRequest {
                items: vec![CheckoutItem {
                    work_id: work.id,
                    quantity: 3,
                }],
                partner_id: Some(partner.id),
                notes: None,
            },
            &rep_actor,
        )
        .await
        .expect("checkout 1");
    orders
        .transition(o1.order.id, OrderStatus::Validated, None, &rep_actor)
        .await
        .expect("validate 1");

    // Order 2: representative, left pending (no revenue yet)
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
            &rep_actor,
        )
        .await
        .expect("checkout 2");

    // Management view
    let pdg_dash = dashboards.pdg_dashboard().await.expect("pdg dashboard");
    assert_eq!(pdg_dash.orders.total, 2);
    assert_eq!(pdg_dash.orders.pending, 1);
    assert_eq!(pdg_dash.orders.validated, 1);
    assert_eq!(pdg_dash.revenue_total, dec!(30000));
    assert_eq!(pdg_dash.monthly_revenue.len(), 1);
    assert_eq!(pdg_dash.top_partners.len(), 1);
    assert_eq!(pdg_dash.top_partners[0].partner_id, partner.id);
    assert_eq!(pdg_dash.top_partners[0].total, dec!(30000));
    assert_eq!(pdg_dash.top_works.len(), 1);
    assert_eq!(pdg_dash.top_works[0].units_sold, 3);
    assert!(pdg_dash
        .headcounts
        .iter()
        .any(|h| h.role == UserRole::Representant && h.count == 1));

    // Representative view
    let rep_dash = dashboards
        .representant_dashboard(rep.id)
        .await
        .expect("rep dashboard");
    assert_eq!(rep_dash.summary.total_orders, 2);
    assert_eq!(rep_dash.summary.pending_orders, 1);
    assert_eq!(rep_dash.summary.total_revenue, dec!(30000));
    // 10% of the validated order
    assert_eq!(rep_dash.summary.pending_commissions, dec!(3000.00));
    assert_eq!(rep_dash.summary.paid_commissions, dec!(0));
    assert_eq!(rep_dash.recent_orders.len(), 2);
    assert_eq!(rep_dash.top_works[0].title, "Analyse 1");

    // Partner view
    let partner_dash = dashboards
        .partenaire_dashboard(partner_user.id)
        .await
        .expect("partner dashboard");
    assert_eq!(partner_dash.summary.total_orders, 1);
    assert_eq!(partner_dash.summary.total_spend, dec!(30000));
    assert_eq!(partner_dash.recent_orders.len(), 1);

    // Creator view: 15% of the validated 30000 line
    let creator_dash = dashboards
        .creator_dashboard(author.id)
        .await
        .expect("creator dashboard");
    assert_eq!(creator_dash.works.len(), 1);
    assert_eq!(creator_dash.works[0].units_sold, 3);
    assert_eq!(creator_dash.royalties.pending_total, dec!(4500.00));
    assert_eq!(creator_dash.royalties.paid_total, dec!(0));
    assert_eq!(creator_dash.monthly_royalties.len(), 1);
}

#[tokio::test]
async fn partner_dashboard_requires_a_partner_link() {
    let db = test_db().await;
    let dashboards = DashboardService::new(db.clone());
    let loose_user = create_user(&db, UserRole::Partenaire, "sans-org").await;

    let result = dashboards.partenaire_dashboard(loose_user.id).await;
    assert_matches!(result, Err(ServiceError::NotFound(_)));
}

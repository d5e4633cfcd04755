use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Éditions API",
        version = "0.1.0",
        description = r#"
# Éditions Publishing & Distribution API

Backend for a book publishing house: catalog and work lifecycle, orders with
an explicit status state machine, a transactional stock ledger, royalty and
commission tracking, and role-scoped dashboards.

## Authentication

All endpoints except `/session-check` require a bearer token issued by the
identity provider:

```
Authorization: Bearer <token>
```

Role access (PDG, DGA, REPRESENTANT, CONCEPTEUR, AUTEUR, PARTENAIRE, CLIENT)
is enforced per route.

## Idempotency

Mutating endpoints honor an `Idempotency-Key` header: resubmitting the same
key within the deduplication window replays the first response instead of
executing again. Send one per checkout attempt.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development")
    ),
    paths(
        crate::handlers::session::session_check,
        crate::handlers::orders::checkout,
        crate::handlers::orders::list_orders,
        crate::handlers::orders::get_order,
        crate::handlers::orders::update_status,
        crate::handlers::orders::cancel_order,
        crate::handlers::stock::stock_overview,
        crate::handlers::stock::post_movement,
        crate::handlers::stock::list_movements,
        crate::handlers::royalties::list_pending,
        crate::handlers::royalties::list_royalties,
        crate::handlers::royalties::pay_batch,
        crate::handlers::commissions::commissions_overview,
        crate::handlers::commissions::list_pending,
        crate::handlers::commissions::pay_batch,
        crate::handlers::dashboards::pdg_dashboard,
        crate::handlers::dashboards::representant_dashboard,
        crate::handlers::dashboards::partenaire_dashboard,
        crate::handlers::dashboards::creator_dashboard,
        crate::handlers::works::list_catalog,
        crate::handlers::works::get_work,
        crate::handlers::works::create_work,
        crate::handlers::works::submit_work,
        crate::handlers::works::approve_work,
        crate::handlers::works::reject_work,
        crate::handlers::works::list_disciplines,
        crate::handlers::works::create_discipline,
        crate::handlers::notifications::get_feed,
        crate::handlers::notifications::mark_read,
        crate::handlers::users::list_users,
        crate::handlers::users::create_user,
        crate::handlers::users::set_role,
        crate::handlers::users::list_partners,
        crate::handlers::users::create_partner,
    ),
    tags(
        (name = "session", description = "Session introspection"),
        (name = "orders", description = "Checkout and the order state machine"),
        (name = "stock", description = "Stock ledger and overview"),
        (name = "royalties", description = "Royalty accrual listing and payment"),
        (name = "commissions", description = "Representative commissions"),
        (name = "dashboards", description = "Role-scoped read models"),
        (name = "works", description = "Catalog and work lifecycle"),
        (name = "notifications", description = "Order-history notification feeds"),
        (name = "users", description = "User and role administration"),
        (name = "partners", description = "Partner organizations")
    )
)]
pub struct ApiDoc;

/// Swagger UI router mounted by the binary.
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/docs").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spec_contains_core_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();
        assert!(paths.iter().any(|p| p.contains("session-check")));
        assert!(paths.iter().any(|p| p.contains("orders/checkout")));
        assert!(paths.iter().any(|p| p.contains("pdg/stock")));
        assert!(paths.iter().any(|p| p.contains("royalties/pay")));
    }
}

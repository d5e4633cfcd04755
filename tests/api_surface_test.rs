mod common;

use axum::{body::Body, http::Request, Extension, Router};
use common::{create_user, test_db, test_event_sender};
use editions_api::{
    auth::{AuthConfig, AuthService},
    config::AppConfig,
    entities::user::UserRole,
    handlers::AppServices,
    AppState,
};
use http::StatusCode;
use serde_json::Value;
use std::{sync::Arc, time::Duration};
use tower::ServiceExt;

const TEST_SECRET: &str =
    "an_integration_test_secret_that_is_definitely_longer_than_sixty_four_characters";

fn test_config() -> AppConfig {
    AppConfig {
        database_url: "sqlite::memory:".into(),
        jwt_secret: TEST_SECRET.into(),
        auth_issuer: "editions-auth".into(),
        auth_audience: "editions-api".into(),
        host: "127.0.0.1".into(),
        port: 0,
        environment: "development".into(),
        log_level: "info".into(),
        log_json: false,
        auto_migrate: false,
        cors_allowed_origins: None,
        cors_allow_any_origin: false,
        db_max_connections: 5,
        db_min_connections: 1,
        db_connect_timeout_secs: 30,
        db_idle_timeout_secs: 600,
        db_acquire_timeout_secs: 8,
        royalty_rate: 0.15,
        commission_rate: 0.10,
        currency: "XOF".into(),
        event_channel_capacity: 64,
    }
}

async fn test_app() -> (Router, Arc<AuthService>, Arc<editions_api::db::DbPool>) {
    let db = test_db().await;
    let cfg = test_config();
    let (event_sender, _rx) = test_event_sender();

    let auth_service = Arc::new(AuthService::new(
        AuthConfig::new(
            cfg.jwt_secret.clone(),
            cfg.auth_issuer.clone(),
            cfg.auth_audience.clone(),
            Duration::from_secs(3600),
        ),
        db.clone(),
    ));

    let services = AppServices::new(db.clone(), event_sender.clone(), &cfg);
    let state = AppState {
        db: db.clone(),
        config: cfg,
        event_sender,
        services,
    };

    let app = Router::new()
        .nest("/api/v1", editions_api::api_v1_routes())
        .layer(Extension(auth_service.clone()))
        .layer(axum::middleware::from_fn(
            editions_api::middleware_helpers::request_id::request_id_middleware,
        ))
        .with_state(state);

    (app, auth_service, db)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("body should collect");
    serde_json::from_slice(&bytes).expect("body should be JSON")
}

#[tokio::test]
async fn session_check_reports_anonymous_callers() {
    let (app, _auth, _db) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/session-check")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["authenticated"], Value::Bool(false));
    assert!(json["user"].is_null());
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn session_check_resolves_a_valid_token() {
    let (app, auth, db) = test_app().await;
    let user = create_user(&db, UserRole::Representant, "rep").await;
    let token = auth.issue_token(&user).expect("token");

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/session-check")
                .header("authorization", format!("Bearer {}", token))
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["authenticated"], Value::Bool(true));
    assert_eq!(json["user"]["role"], "REPRESENTANT");
    assert_eq!(json["user"]["user_id"], user.id.to_string());
}

#[tokio::test]
async fn protected_routes_reject_anonymous_callers() {
    let (app, _auth, _db) = test_app().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/catalog")
                .body(Body::empty())
                .expect("request"),
        )
        .await
        .expect("response");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn role_gates_reject_the_wrong_role() {
    let (app, auth, db) = test_app().await;

    async fn get_with_token(app: &Router, uri: &str, token: &str) -> StatusCode {
        app.clone()
            .oneshot(
                Request::builder()
                    .uri(uri)
                    .header("authorization", format!("Bearer {}", token))
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response")
            .status()
    }

    let client = create_user(&db, UserRole::Client, "client").await;
    let pdg = create_user(&db, UserRole::Pdg, "pdg").await;
    let client_token = auth.issue_token(&client).expect("token");
    let pdg_token = auth.issue_token(&pdg).expect("token");

    // Stock ledger is management-only
    assert_eq!(
        get_with_token(&app, "/api/v1/pdg/stock", &client_token).await,
        StatusCode::FORBIDDEN
    );
    assert_eq!(
        get_with_token(&app, "/api/v1/pdg/stock", &pdg_token).await,
        StatusCode::OK
    );

    // Catalog is open to any authenticated role
    assert_eq!(
        get_with_token(&app, "/api/v1/catalog", &client_token).await,
        StatusCode::OK
    );
}

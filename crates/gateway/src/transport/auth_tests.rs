// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use axum::body::Body;
use axum::http::Request;
use axum::routing::get;
use axum::Router;
use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use crate::config::GatewayConfig;
use crate::state::GatewayState;
use crate::transport::auth::admin_auth_layer;

fn test_config(admin_token: Option<&str>) -> GatewayConfig {
    GatewayConfig {
        host: "127.0.0.1".into(),
        port: 0,
        database_url: "sqlite::memory:".into(),
        reservation_ttl_seconds: 90,
        offline_threshold_seconds: 60,
        heartbeat_interval_ms: 10_000,
        poll_interval_ms: 2_000,
        command_max_retries: 3,
        command_retry_delay_base_ms: 1_000,
        command_retry_delay_max_ms: 30_000,
        stale_threshold_seconds: 3600,
        rate_limit_ip_per_min: 30,
        rate_limit_card_per_min: 60,
        rate_limit_locker_per_min: 6,
        rate_limit_device_per_20s: 1,
        admin_token: admin_token.map(str::to_owned),
    }
}

async fn test_router(admin_token: Option<&str>) -> Router {
    let pool = SqlitePool::connect("sqlite::memory:").await.expect("in-memory sqlite");
    sqlx::migrate!("./migrations").run(&pool).await.expect("run migrations");
    let state = Arc::new(GatewayState::new(test_config(admin_token), pool, CancellationToken::new()));

    Router::new()
        .route("/admin/ping", get(|| async { "pong" }))
        .route("/heartbeat", get(|| async { "ok" }))
        .layer(axum::middleware::from_fn_with_state(state.clone(), admin_auth_layer))
        .with_state(state)
}

#[tokio::test]
async fn admin_route_without_token_configured_is_open() {
    let router = test_router(None).await;
    let response = router
        .oneshot(Request::builder().uri("/admin/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn admin_route_rejects_missing_bearer_when_token_configured() {
    let router = test_router(Some("secret")).await;
    let response = router
        .oneshot(Request::builder().uri("/admin/ping").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn admin_route_accepts_matching_bearer() {
    let router = test_router(Some("secret")).await;
    let response = router
        .oneshot(
            Request::builder()
                .uri("/admin/ping")
                .header("authorization", "Bearer secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

#[tokio::test]
async fn kiosk_facing_routes_are_exempt_from_admin_auth() {
    let router = test_router(Some("secret")).await;
    let response = router
        .oneshot(Request::builder().uri("/heartbeat").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), axum::http::StatusCode::OK);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP transport for the gateway coordination core (spec §6, §4.7).

pub mod admin_http;
pub mod auth;
pub mod kiosk_http;

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Json;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::GatewayState;

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Build the axum `Router` with the full kiosk-facing and admin surfaces.
pub fn build_router(state: Arc<GatewayState>) -> Router {
    Router::new()
        .route("/health", get(health))
        // Kiosk-facing (§6.1)
        .route("/provisioning/register", post(kiosk_http::register))
        .route("/heartbeat", post(kiosk_http::heartbeat))
        .route("/commands", get(kiosk_http::poll_commands))
        .route("/commands/complete", post(kiosk_http::complete_command))
        .route("/commands/clear-stale", post(kiosk_http::clear_stale))
        .route("/lockers", get(kiosk_http::lockers_snapshot))
        // Locker-facing RPC surface (SPEC_FULL.md §3)
        .route("/lockers/find-owner", post(kiosk_http::find_owner))
        .route("/lockers/list-available", post(kiosk_http::list_available))
        .route("/lockers/assign", post(kiosk_http::assign))
        .route("/lockers/confirm", post(kiosk_http::confirm))
        .route("/lockers/release", post(kiosk_http::release))
        .route("/lockers/recent-release", post(kiosk_http::recent_release))
        .route("/lockers/oldest-available", post(kiosk_http::oldest_available))
        // Staff/admin-facing (§6.2, plus SPEC_FULL.md §2 additions)
        .route("/admin/lockers/{id}/open", post(admin_http::open_locker))
        .route("/admin/lockers/bulk-open", post(admin_http::bulk_open))
        .route("/admin/lockers/{id}/status", get(admin_http::locker_status))
        .route("/admin/lockers/{id}/release", post(admin_http::emergency_release))
        .route("/admin/lockers/{id}/block", post(admin_http::block_locker))
        .route("/admin/lockers/{id}/unblock", post(admin_http::unblock_locker))
        .route("/admin/lockers/{id}/force-transition", post(admin_http::force_transition))
        .route("/admin/events", get(admin_http::list_events))
        .route("/admin/rate-limits/reset", post(admin_http::reset_rate_limit))
        .layer(middleware::from_fn_with_state(state.clone(), auth::admin_auth_layer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

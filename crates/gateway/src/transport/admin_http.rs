// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Staff/admin-facing HTTP surface (spec §6.2, plus the release/events/
//! rate-limit routes added in `SPEC_FULL.md` §2).
//!
//! `:id`-style routes carry a `kiosk_id` query parameter alongside the path's
//! locker id: spec §6.2 names the path literally as `/admin/lockers/:id/...`,
//! but the store's key is `(kiosk_id, locker_id)`, so the path alone can't
//! address a row. Documented in DESIGN.md as an extension of an underspecified
//! route, not a deviation from it.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::response::Response;
use axum::Json;
use serde::{Deserialize, Serialize};

use locker_core::command::CommandPayload;
use locker_core::event::Event;
use locker_core::event::EventType;
use locker_core::locker::{Locker, LockerStatus};
use locker_core::ratelimit::LimitKind;

use crate::error::GatewayError;
use crate::state::GatewayState;
use crate::store::event_log::EventFilter;
use crate::store::locker_store::ReleaseReason;

#[derive(Debug, Deserialize)]
pub struct KioskScope {
    pub kiosk_id: String,
}

#[derive(Debug, Deserialize)]
pub struct OpenLockerRequest {
    pub staff_user: String,
    pub reason: String,
}

/// `POST /admin/lockers/{id}/open?kiosk_id=K`.
pub async fn open_locker(
    State(state): State<Arc<GatewayState>>,
    Path(locker_id): Path<i64>,
    Query(scope): Query<KioskScope>,
    Json(req): Json<OpenLockerRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    if req.staff_user.trim().is_empty() {
        return Err(GatewayError::BadRequest.to_http_response("staff_user must not be empty").into_response());
    }

    let payload = CommandPayload::OpenLocker {
        locker_id,
        staff_user: Some(req.staff_user),
        reason: Some(req.reason),
    };
    let command = state
        .commands
        .enqueue(&scope.kiosk_id, payload)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to enqueue open_locker").into_response())?;

    Ok(Json(serde_json::json!({ "command_id": command.command_id })))
}

#[derive(Debug, Deserialize)]
pub struct BulkOpenRequest {
    pub kiosk_id: String,
    #[serde(default)]
    pub locker_ids: Vec<i64>,
    pub staff_user: String,
    pub reason: String,
    #[serde(default)]
    pub exclude_vip: bool,
}

/// `POST /admin/lockers/bulk-open`. Validates locker IDs and staff_user
/// (spec §6.2) before enqueueing one `bulk_open` command.
pub async fn bulk_open(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<BulkOpenRequest>,
) -> Result<Json<serde_json::Value>, Response> {
    let kiosk = state
        .kiosks
        .get(&req.kiosk_id)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to look up kiosk").into_response())?
        .ok_or_else(|| GatewayError::KioskNotFound.to_http_response("unknown kiosk_id").into_response())?;

    let payload = CommandPayload::BulkOpen {
        locker_ids: req.locker_ids,
        exclude_vip: req.exclude_vip,
        staff_user: req.staff_user,
        interval_ms: None,
    };
    payload
        .validate(kiosk.kiosk_size)
        .map_err(|e| GatewayError::BadRequest.to_http_response(e).into_response())?;

    let command = state
        .commands
        .enqueue(&req.kiosk_id, payload)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to enqueue bulk_open").into_response())?;

    Ok(Json(serde_json::json!({ "command_id": command.command_id })))
}

/// `GET /admin/lockers/{id}/status?kiosk_id=K`.
pub async fn locker_status(
    State(state): State<Arc<GatewayState>>,
    Path(locker_id): Path<i64>,
    Query(scope): Query<KioskScope>,
) -> Result<Json<Locker>, Response> {
    let locker = state
        .lockers
        .get_locker(&scope.kiosk_id, locker_id)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to load locker").into_response())?
        .ok_or_else(|| GatewayError::LockerNotFound.to_http_response("unknown locker").into_response())?;
    Ok(Json(locker))
}

#[derive(Debug, Deserialize)]
pub struct EmergencyReleaseRequest {
    pub staff_user: String,
    #[serde(default)]
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct EmergencyReleaseResponse {
    pub released: bool,
}

/// `POST /admin/lockers/{id}/release?kiosk_id=K` (§4.4 "Emergency release").
pub async fn emergency_release(
    State(state): State<Arc<GatewayState>>,
    Path(locker_id): Path<i64>,
    Query(scope): Query<KioskScope>,
    Json(req): Json<EmergencyReleaseRequest>,
) -> Result<Json<EmergencyReleaseResponse>, Response> {
    if req.staff_user.trim().is_empty() {
        return Err(GatewayError::BadRequest.to_http_response("staff_user must not be empty").into_response());
    }

    let released = state
        .lockers
        .release(&scope.kiosk_id, locker_id, None, ReleaseReason::StaffEmergency)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to release locker").into_response())?;

    Ok(Json(EmergencyReleaseResponse { released }))
}

#[derive(Debug, Deserialize)]
pub struct BlockLockerRequest {
    pub staff_user: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BlockLockerResponse {
    pub blocked: bool,
}

/// `POST /admin/lockers/{id}/block?kiosk_id=K` (§3 `{Free|Reserved|Owned} ──
/// (block, staff)──▶ Blocked`). Updates the authoritative store directly, the
/// way `emergency_release` does, and enqueues a `block_locker` command so the
/// kiosk is notified per §4.5's `command_type` list.
pub async fn block_locker(
    State(state): State<Arc<GatewayState>>,
    Path(locker_id): Path<i64>,
    Query(scope): Query<KioskScope>,
    Json(req): Json<BlockLockerRequest>,
) -> Result<Json<BlockLockerResponse>, Response> {
    if req.staff_user.trim().is_empty() {
        return Err(GatewayError::BadRequest.to_http_response("staff_user must not be empty").into_response());
    }

    let blocked = state
        .lockers
        .block(&scope.kiosk_id, locker_id, &req.staff_user, &req.reason)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to block locker").into_response())?;

    if blocked {
        let payload = CommandPayload::BlockLocker {
            locker_id,
            staff_user: req.staff_user.clone(),
            reason: req.reason.clone(),
        };
        state
            .commands
            .enqueue(&scope.kiosk_id, payload)
            .await
            .map_err(|_| GatewayError::Internal.to_http_response("failed to enqueue block_locker").into_response())?;
    }

    Ok(Json(BlockLockerResponse { blocked }))
}

#[derive(Debug, Deserialize)]
pub struct UnblockLockerRequest {
    pub staff_user: String,
}

#[derive(Debug, Serialize)]
pub struct UnblockLockerResponse {
    pub unblocked: bool,
}

/// `POST /admin/lockers/{id}/unblock?kiosk_id=K` (§3 `Blocked ──(unblock,
/// staff)──▶ Free`).
pub async fn unblock_locker(
    State(state): State<Arc<GatewayState>>,
    Path(locker_id): Path<i64>,
    Query(scope): Query<KioskScope>,
    Json(req): Json<UnblockLockerRequest>,
) -> Result<Json<UnblockLockerResponse>, Response> {
    if req.staff_user.trim().is_empty() {
        return Err(GatewayError::BadRequest.to_http_response("staff_user must not be empty").into_response());
    }

    let unblocked = state
        .lockers
        .unblock(&scope.kiosk_id, locker_id, &req.staff_user)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to unblock locker").into_response())?;

    if unblocked {
        let payload = CommandPayload::UnblockLocker { locker_id, staff_user: req.staff_user.clone() };
        state
            .commands
            .enqueue(&scope.kiosk_id, payload)
            .await
            .map_err(|_| GatewayError::Internal.to_http_response("failed to enqueue unblock_locker").into_response())?;
    }

    Ok(Json(UnblockLockerResponse { unblocked }))
}

#[derive(Debug, Deserialize)]
pub struct ForceTransitionRequest {
    pub new_status: LockerStatus,
    pub staff_user: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct ForceTransitionResponse {
    pub transitioned: bool,
}

/// `POST /admin/lockers/{id}/force-transition?kiosk_id=K` — emergency
/// override (§4.3 `force_transition`), Free/Blocked targets only. No kiosk
/// command is enqueued: an override discards ownership state the gateway
/// already holds and has no physical action for the kiosk to perform beyond
/// what a later `open_locker`/`block_locker` command would separately cover.
pub async fn force_transition(
    State(state): State<Arc<GatewayState>>,
    Path(locker_id): Path<i64>,
    Query(scope): Query<KioskScope>,
    Json(req): Json<ForceTransitionRequest>,
) -> Result<Json<ForceTransitionResponse>, Response> {
    if req.staff_user.trim().is_empty() {
        return Err(GatewayError::BadRequest.to_http_response("staff_user must not be empty").into_response());
    }

    let transitioned = state
        .lockers
        .force_transition(&scope.kiosk_id, locker_id, req.new_status, &req.staff_user, &req.reason)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to force-transition locker").into_response())?;

    Ok(Json(ForceTransitionResponse { transitioned }))
}

#[derive(Debug, Deserialize)]
pub struct EventsQuery {
    pub kiosk_id: Option<String>,
    pub staff_user: Option<String>,
    pub event_type: Option<String>,
    pub since: Option<chrono::DateTime<chrono::Utc>>,
    pub until: Option<chrono::DateTime<chrono::Utc>>,
    pub limit: Option<i64>,
}

/// `GET /admin/events`: by kiosk, staff user, event type, and time range
/// (§4.8).
pub async fn list_events(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<EventsQuery>,
) -> Result<Json<Vec<Event>>, Response> {
    let event_type = match query.event_type {
        Some(ref s) => Some(
            parse_event_type(s)
                .ok_or_else(|| GatewayError::BadRequest.to_http_response(format!("unknown event_type {s}")).into_response())?,
        ),
        None => None,
    };

    let filter = EventFilter {
        kiosk_id: query.kiosk_id,
        staff_user: query.staff_user,
        event_type,
        since: query.since,
        until: query.until,
        limit: query.limit.unwrap_or(100),
    };

    let events = state
        .events
        .query(&filter)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to query events").into_response())?;
    Ok(Json(events))
}

fn parse_event_type(s: &str) -> Option<EventType> {
    Some(match s {
        "rfid_assign" => EventType::RfidAssign,
        "rfid_release" => EventType::RfidRelease,
        "staff_open" => EventType::StaffOpen,
        "bulk_open" => EventType::BulkOpen,
        "restarted" => EventType::Restarted,
        "command_enqueued" => EventType::CommandEnqueued,
        "command_completed" => EventType::CommandCompleted,
        "command_failed" => EventType::CommandFailed,
        "rate_limit_violation" => EventType::RateLimitViolation,
        "locker_blocked" => EventType::LockerBlocked,
        "locker_unblocked" => EventType::LockerUnblocked,
        "locker_force_transition" => EventType::LockerForceTransition,
        "kiosk_online" => EventType::KioskOnline,
        "kiosk_offline" => EventType::KioskOffline,
        _ => return None,
    })
}

#[derive(Debug, Deserialize)]
pub struct RateLimitResetRequest {
    pub kind: LimitKind,
    pub key: String,
    pub kiosk_id: String,
}

/// `POST /admin/rate-limits/reset` (§4.9: "Staff can reset a key's buckets").
pub async fn reset_rate_limit(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<RateLimitResetRequest>,
) -> Json<serde_json::Value> {
    state.rate_limiter.reset_key(&req.key, &req.kiosk_id);
    let _ = req.kind; // reset_key clears every kind for this key+kiosk at once.
    Json(serde_json::json!({ "ok": true }))
}

#[cfg(test)]
#[path = "admin_http_tests.rs"]
mod tests;

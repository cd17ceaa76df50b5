// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kiosk-facing HTTP surface (spec §6.1, plus the locker-facing RPC surface
//! added to resolve the store-over-HTTP design decision, see `SPEC_FULL.md` §3).

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

use locker_core::command::CommandResult;
use locker_core::event::{EventType, NewEvent};
use locker_core::kiosk::HeartbeatReport;
use locker_core::locker::{Locker, OwnerType, RecentRelease};
use locker_core::ratelimit::LimitKind;

use crate::error::GatewayError;
use crate::state::GatewayState;
use crate::store::locker_store::ReleaseReason;

/// Checks one rate-limit family, logging a `rate_limit_violation` Event and
/// returning the 429 response on denial (spec §4.9).
async fn check_rate_limit(
    state: &GatewayState,
    kind: LimitKind,
    key: &str,
    kiosk_id: &str,
) -> Result<(), Response> {
    let decision = state.rate_limiter.check(kind, key, kiosk_id, chrono::Utc::now());
    if decision.allowed {
        return Ok(());
    }

    let mut event = NewEvent::new(kiosk_id, EventType::RateLimitViolation)
        .with_details(serde_json::json!({ "kind": kind.as_str(), "key": key }));
    if kind == LimitKind::Card {
        event = event.with_rfid_card(key);
    }
    let _ = state.events.record_standalone(&event).await;

    let reason = decision.reason.unwrap_or_else(|| "rate limit exceeded".to_owned());
    Err(GatewayError::RateLimited.to_http_response(reason).into_response())
}

#[derive(Debug, Clone, Serialize)]
pub struct PollingConfig {
    pub heartbeat_interval_ms: u64,
    pub poll_interval_ms: u64,
}

impl PollingConfig {
    fn from(state: &GatewayState) -> Self {
        Self {
            heartbeat_interval_ms: state.config.heartbeat_interval_ms,
            poll_interval_ms: state.config.poll_interval_ms,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub kiosk_id: String,
    pub zone: String,
    pub version: String,
    pub hardware_id: String,
    #[serde(default = "default_kiosk_size")]
    pub kiosk_size: i64,
    #[serde(default)]
    pub config_hash: String,
}

fn default_kiosk_size() -> i64 {
    16
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
    pub polling_config: PollingConfig,
}

/// `POST /provisioning/register` (§4.6 "Bootstrap").
pub async fn register(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegisterResponse>, Response> {
    if req.kiosk_id.trim().is_empty() {
        return Err(GatewayError::BadRequest.to_http_response("kiosk_id must not be empty").into_response());
    }

    state
        .kiosks
        .provision(&req.kiosk_id, &req.zone, req.kiosk_size, &req.hardware_id, &req.config_hash)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to provision kiosk").into_response())?;

    state
        .lockers
        .init_kiosk_lockers(&req.kiosk_id, req.kiosk_size)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to initialize lockers").into_response())?;

    Ok(Json(RegisterResponse { polling_config: PollingConfig::from(&state) }))
}

#[derive(Debug, Serialize)]
pub struct HeartbeatResponse {
    pub polling_config: PollingConfig,
    pub config_drift: bool,
}

/// `POST /heartbeat` (§4.6).
pub async fn heartbeat(
    State(state): State<Arc<GatewayState>>,
    Json(report): Json<HeartbeatReport>,
) -> Result<Json<HeartbeatResponse>, Response> {
    let drifted = state
        .kiosks
        .apply_heartbeat(&report)
        .await
        .map_err(|_| GatewayError::KioskNotFound.to_http_response("unknown kiosk_id").into_response())?;

    Ok(Json(HeartbeatResponse { polling_config: PollingConfig::from(&state), config_drift: drifted }))
}

#[derive(Debug, Deserialize)]
pub struct PollQuery {
    pub kiosk_id: String,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    10
}

/// `GET /commands?kiosk_id=K&limit=N` (§4.5 polling).
pub async fn poll_commands(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<PollQuery>,
) -> Result<impl IntoResponse, Response> {
    let commands = state
        .commands
        .poll(&query.kiosk_id, query.limit)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to poll commands").into_response())?;
    Ok(Json(commands))
}

/// `POST /commands/complete` (§4.5 execution reporting).
pub async fn complete_command(
    State(state): State<Arc<GatewayState>>,
    Json(result): Json<CommandResult>,
) -> Result<impl IntoResponse, Response> {
    let found = state
        .commands
        .complete(&result)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to record command result").into_response())?;
    if !found {
        return Err(GatewayError::CommandNotFound.to_http_response("unknown command_id").into_response());
    }
    Ok(Json(serde_json::json!({ "ok": true })))
}

#[derive(Debug, Deserialize)]
pub struct ClearStaleRequest {
    pub kiosk_id: String,
}

#[derive(Debug, Serialize)]
pub struct ClearStaleResponse {
    pub cleared_count: u64,
}

/// `POST /commands/clear-stale` (§4.5 clear-on-reconnect).
pub async fn clear_stale(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<ClearStaleRequest>,
) -> Result<Json<ClearStaleResponse>, Response> {
    let cleared_count = state
        .commands
        .clear_stale(&req.kiosk_id, state.config.stale_threshold())
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to clear stale commands").into_response())?;
    Ok(Json(ClearStaleResponse { cleared_count }))
}

#[derive(Debug, Deserialize)]
pub struct SnapshotQuery {
    pub kiosk_id: String,
}

/// `GET /lockers?kiosk_id=K`: full per-kiosk snapshot.
pub async fn lockers_snapshot(
    State(state): State<Arc<GatewayState>>,
    Query(query): Query<SnapshotQuery>,
) -> Result<Json<Vec<Locker>>, Response> {
    let lockers = state
        .lockers
        .list_all(&query.kiosk_id)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to load locker snapshot").into_response())?;
    Ok(Json(lockers))
}

#[derive(Debug, Deserialize)]
pub struct FindOwnerRequest {
    pub owner_type: OwnerType,
    pub owner_key: String,
}

/// `POST /lockers/find-owner`.
pub async fn find_owner(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<FindOwnerRequest>,
) -> Result<Json<Option<Locker>>, Response> {
    let locker = state
        .lockers
        .find_owner(req.owner_type, &req.owner_key)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to look up owner").into_response())?;
    Ok(Json(locker))
}

#[derive(Debug, Deserialize)]
pub struct ListAvailableRequest {
    pub kiosk_id: String,
    #[serde(default)]
    pub zone: Option<String>,
}

/// `POST /lockers/list-available`.
pub async fn list_available(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<ListAvailableRequest>,
) -> Result<Json<Vec<Locker>>, Response> {
    let lockers = state
        .lockers
        .list_available(&req.kiosk_id, req.zone.as_deref())
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to list available lockers").into_response())?;
    Ok(Json(lockers))
}

#[derive(Debug, Deserialize)]
pub struct AssignRequest {
    pub kiosk_id: String,
    pub locker_id: i64,
    pub owner_type: OwnerType,
    pub owner_key: String,
}

#[derive(Debug, Serialize)]
pub struct AssignResponse {
    pub assigned: bool,
}

/// `POST /lockers/assign`. A `false` result is I1 contention or a
/// precondition failure, not a server error (spec §7: reported as a typed
/// outcome, never retried automatically).
pub async fn assign(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<AssignRequest>,
) -> Result<Json<AssignResponse>, Response> {
    if req.owner_type == OwnerType::Rfid {
        check_rate_limit(&state, LimitKind::Card, &req.owner_key, &req.kiosk_id).await?;
    }
    check_rate_limit(&state, LimitKind::Locker, &req.locker_id.to_string(), &req.kiosk_id).await?;

    let assigned = state
        .lockers
        .assign(&req.kiosk_id, req.locker_id, req.owner_type, &req.owner_key)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to assign locker").into_response())?;
    Ok(Json(AssignResponse { assigned }))
}

#[derive(Debug, Deserialize)]
pub struct ConfirmRequest {
    pub kiosk_id: String,
    pub locker_id: i64,
}

#[derive(Debug, Serialize)]
pub struct ConfirmResponse {
    pub confirmed: bool,
}

/// `POST /lockers/confirm`.
pub async fn confirm(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<ConfirmRequest>,
) -> Result<Json<ConfirmResponse>, Response> {
    let confirmed = state
        .lockers
        .confirm(&req.kiosk_id, req.locker_id)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to confirm locker").into_response())?;
    Ok(Json(ConfirmResponse { confirmed }))
}

#[derive(Debug, Deserialize)]
pub struct ReleaseRequest {
    pub kiosk_id: String,
    pub locker_id: i64,
    #[serde(default)]
    pub expected_owner: Option<String>,
    #[serde(default)]
    pub owner_type: Option<OwnerType>,
}

#[derive(Debug, Serialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

/// `POST /lockers/release`. `owner_type` is accepted for symmetry with
/// `assign` but does not further constrain the release — `expected_owner`
/// (the owner_key) is already the CAS guard against the wrong card releasing
/// someone else's locker.
pub async fn release(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<ReleaseRequest>,
) -> Result<Json<ReleaseResponse>, Response> {
    let released = state
        .lockers
        .release(&req.kiosk_id, req.locker_id, req.expected_owner.as_deref(), ReleaseReason::UserRelease)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to release locker").into_response())?;
    Ok(Json(ReleaseResponse { released }))
}

#[derive(Debug, Deserialize)]
pub struct RecentReleaseRequest {
    pub kiosk_id: String,
    pub card_id: String,
    #[serde(default = "default_lookback_hours")]
    pub lookback_hours: i64,
}

fn default_lookback_hours() -> i64 {
    24
}

/// `POST /lockers/recent-release` (§4.4 "recent holder" rule).
pub async fn recent_release(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<RecentReleaseRequest>,
) -> Result<Json<Option<RecentRelease>>, Response> {
    let recent = state
        .lockers
        .get_recent_release_for_card(&req.kiosk_id, &req.card_id, req.lookback_hours)
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to look up recent release").into_response())?;
    Ok(Json(recent))
}

#[derive(Debug, Deserialize)]
pub struct OldestAvailableRequest {
    pub kiosk_id: String,
    #[serde(default)]
    pub allowed_ids: Option<Vec<i64>>,
    #[serde(default)]
    pub zone: Option<String>,
}

/// `POST /lockers/oldest-available` (§4.4 automatic-assignment path).
pub async fn oldest_available(
    State(state): State<Arc<GatewayState>>,
    Json(req): Json<OldestAvailableRequest>,
) -> Result<Json<Option<Locker>>, Response> {
    let locker = state
        .lockers
        .get_oldest_available(&req.kiosk_id, req.allowed_ids.as_deref(), req.zone.as_deref())
        .await
        .map_err(|_| GatewayError::Internal.to_http_response("failed to find oldest available locker").into_response())?;
    Ok(Json(locker))
}

#[cfg(test)]
#[path = "kiosk_http_tests.rs"]
mod tests;

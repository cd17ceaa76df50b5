// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HTTP client for the Gateway Coordination Core's kiosk-facing surface
//! (spec §6.1, §6.4, plus the locker-facing RPC surface from `SPEC_FULL.md`
//! §3). One instance per kiosk process.

use reqwest::Client;
use serde::{Deserialize, Serialize};

use locker_core::command::{Command, CommandResult};
use locker_core::kiosk::HeartbeatReport;
use locker_core::locker::{Locker, OwnerType, RecentRelease};

use crate::error::GatewayClientError;

#[derive(Debug, Clone, Deserialize)]
pub struct PollingConfig {
    pub heartbeat_interval_ms: u64,
    pub poll_interval_ms: u64,
}

#[derive(Debug, Serialize)]
struct RegisterRequest<'a> {
    kiosk_id: &'a str,
    zone: &'a str,
    version: &'a str,
    hardware_id: &'a str,
    kiosk_size: i64,
    config_hash: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct RegisterResponse {
    pub polling_config: PollingConfig,
}

#[derive(Debug, Deserialize)]
pub struct HeartbeatResponse {
    pub polling_config: PollingConfig,
    pub config_drift: bool,
}

#[derive(Debug, Serialize)]
struct ClearStaleRequest<'a> {
    kiosk_id: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct ClearStaleResponse {
    pub cleared_count: u64,
}

#[derive(Debug, Serialize)]
struct FindOwnerRequest<'a> {
    owner_type: OwnerType,
    owner_key: &'a str,
}

#[derive(Debug, Serialize)]
struct ListAvailableRequest<'a> {
    kiosk_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct AssignRequest<'a> {
    kiosk_id: &'a str,
    locker_id: i64,
    owner_type: OwnerType,
    owner_key: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct AssignResponse {
    pub assigned: bool,
}

#[derive(Debug, Serialize)]
struct ConfirmRequest<'a> {
    kiosk_id: &'a str,
    locker_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmResponse {
    pub confirmed: bool,
}

#[derive(Debug, Serialize)]
struct ReleaseRequest<'a> {
    kiosk_id: &'a str,
    locker_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    expected_owner: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    owner_type: Option<OwnerType>,
}

#[derive(Debug, Deserialize)]
pub struct ReleaseResponse {
    pub released: bool,
}

#[derive(Debug, Serialize)]
struct RecentReleaseRequest<'a> {
    kiosk_id: &'a str,
    card_id: &'a str,
    lookback_hours: i64,
}

#[derive(Debug, Serialize)]
struct OldestAvailableRequest<'a> {
    kiosk_id: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_ids: Option<&'a [i64]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    zone: Option<&'a str>,
}

/// HTTP client wrapper for the gateway this kiosk reports to. Cheap to
/// clone: `reqwest::Client` holds its connection pool behind an `Arc`.
#[derive(Clone)]
pub struct GatewayClient {
    base_url: String,
    client: Client,
}

impl GatewayClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        Self { base_url: base_url.into(), client }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<Q: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<R, GatewayClientError> {
        let resp = self.client.get(self.url(path)).query(query).send().await?;
        Self::into_json(resp).await
    }

    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, GatewayClientError> {
        let resp = self.client.post(self.url(path)).json(body).send().await?;
        Self::into_json(resp).await
    }

    async fn into_json<R: for<'de> Deserialize<'de>>(resp: reqwest::Response) -> Result<R, GatewayClientError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayClientError::Status { status: status.as_u16(), body });
        }
        Ok(resp.json().await?)
    }

    /// `POST /provisioning/register` (§4.6 "Bootstrap").
    pub async fn register(
        &self,
        kiosk_id: &str,
        zone: &str,
        version: &str,
        hardware_id: &str,
        kiosk_size: i64,
        config_hash: &str,
    ) -> Result<RegisterResponse, GatewayClientError> {
        self.post(
            "/provisioning/register",
            &RegisterRequest { kiosk_id, zone, version, hardware_id, kiosk_size, config_hash },
        )
        .await
    }

    /// `POST /heartbeat` (§4.6).
    pub async fn heartbeat(&self, report: &HeartbeatReport) -> Result<HeartbeatResponse, GatewayClientError> {
        self.post("/heartbeat", report).await
    }

    /// `GET /commands?kiosk_id=K&limit=N` (§4.5 polling).
    pub async fn poll_commands(&self, kiosk_id: &str, limit: i64) -> Result<Vec<Command>, GatewayClientError> {
        self.get("/commands", &[("kiosk_id", kiosk_id.to_string()), ("limit", limit.to_string())]).await
    }

    /// `POST /commands/complete` (§4.5 execution reporting).
    pub async fn complete_command(&self, result: &CommandResult) -> Result<(), GatewayClientError> {
        let _: serde_json::Value = self.post("/commands/complete", result).await?;
        Ok(())
    }

    /// `POST /commands/clear-stale` (§4.5 clear-on-reconnect).
    pub async fn clear_stale(&self, kiosk_id: &str) -> Result<ClearStaleResponse, GatewayClientError> {
        self.post("/commands/clear-stale", &ClearStaleRequest { kiosk_id }).await
    }

    /// `GET /lockers?kiosk_id=K`: full per-kiosk snapshot.
    pub async fn lockers_snapshot(&self, kiosk_id: &str) -> Result<Vec<Locker>, GatewayClientError> {
        self.get("/lockers", &[("kiosk_id", kiosk_id)]).await
    }

    /// `POST /lockers/find-owner`.
    pub async fn find_owner(&self, owner_type: OwnerType, owner_key: &str) -> Result<Option<Locker>, GatewayClientError> {
        self.post("/lockers/find-owner", &FindOwnerRequest { owner_type, owner_key }).await
    }

    /// `POST /lockers/list-available`.
    pub async fn list_available(&self, kiosk_id: &str, zone: Option<&str>) -> Result<Vec<Locker>, GatewayClientError> {
        self.post("/lockers/list-available", &ListAvailableRequest { kiosk_id, zone }).await
    }

    /// `POST /lockers/assign`.
    pub async fn assign(
        &self,
        kiosk_id: &str,
        locker_id: i64,
        owner_type: OwnerType,
        owner_key: &str,
    ) -> Result<bool, GatewayClientError> {
        let resp: AssignResponse =
            self.post("/lockers/assign", &AssignRequest { kiosk_id, locker_id, owner_type, owner_key }).await?;
        Ok(resp.assigned)
    }

    /// `POST /lockers/confirm`.
    pub async fn confirm(&self, kiosk_id: &str, locker_id: i64) -> Result<bool, GatewayClientError> {
        let resp: ConfirmResponse = self.post("/lockers/confirm", &ConfirmRequest { kiosk_id, locker_id }).await?;
        Ok(resp.confirmed)
    }

    /// `POST /lockers/release`.
    pub async fn release(
        &self,
        kiosk_id: &str,
        locker_id: i64,
        expected_owner: Option<&str>,
        owner_type: Option<OwnerType>,
    ) -> Result<bool, GatewayClientError> {
        let resp: ReleaseResponse =
            self.post("/lockers/release", &ReleaseRequest { kiosk_id, locker_id, expected_owner, owner_type }).await?;
        Ok(resp.released)
    }

    /// `POST /lockers/recent-release` (§4.4 "recent holder" rule).
    pub async fn recent_release(
        &self,
        kiosk_id: &str,
        card_id: &str,
        lookback_hours: i64,
    ) -> Result<Option<RecentRelease>, GatewayClientError> {
        self.post("/lockers/recent-release", &RecentReleaseRequest { kiosk_id, card_id, lookback_hours }).await
    }

    /// `POST /lockers/oldest-available` (§4.4 automatic-assignment path).
    pub async fn oldest_available(
        &self,
        kiosk_id: &str,
        allowed_ids: Option<&[i64]>,
        zone: Option<&str>,
    ) -> Result<Option<Locker>, GatewayClientError> {
        self.post("/lockers/oldest-available", &OldestAvailableRequest { kiosk_id, allowed_ids, zone }).await
    }
}

#[cfg(test)]
#[path = "gateway_client_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Kiosk` entity (spec §3): an edge device's identity and health as seen
//! by the gateway.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A kiosk's connectivity state, derived by the gateway's offline sweeper
/// (§4.6) rather than reported directly by the kiosk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KioskStatus {
    Online,
    Offline,
    Maintenance,
}

impl KioskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Online => "online",
            Self::Offline => "offline",
            Self::Maintenance => "maintenance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            "maintenance" => Some(Self::Maintenance),
            _ => None,
        }
    }
}

/// An edge device controlling a set of lockers via RS-485 (spec §3, §6.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Kiosk {
    pub kiosk_id: String,
    pub zone: String,
    pub kiosk_size: i64,
    pub hardware_id: String,
    pub config_hash: String,
    pub status: KioskStatus,
    pub last_seen: Option<DateTime<Utc>>,
    pub version: String,
    pub voltage: Option<f64>,
    pub temperature: Option<f64>,
    pub uptime_seconds: Option<i64>,
    pub memory_usage: Option<f64>,
    pub disk_space: Option<f64>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Kiosk {
    pub fn newly_provisioned(
        kiosk_id: impl Into<String>,
        zone: impl Into<String>,
        kiosk_size: i64,
        hardware_id: impl Into<String>,
        config_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            kiosk_id: kiosk_id.into(),
            zone: zone.into(),
            kiosk_size,
            hardware_id: hardware_id.into(),
            config_hash: config_hash.into(),
            status: KioskStatus::Offline,
            last_seen: None,
            version: String::new(),
            voltage: None,
            temperature: None,
            uptime_seconds: None,
            memory_usage: None,
            disk_space: None,
            last_error: None,
            created_at: now,
        }
    }

    /// Whether `last_seen` has outlived `offline_threshold` as of `now` (§4.6).
    pub fn is_stale(&self, offline_threshold: chrono::Duration, now: DateTime<Utc>) -> bool {
        match self.last_seen {
            Some(seen) => seen + offline_threshold < now,
            None => true,
        }
    }
}

/// Telemetry posted on every kiosk heartbeat (§6.4 `/heartbeat`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HeartbeatReport {
    pub kiosk_id: String,
    pub version: String,
    pub config_hash: String,
    pub status: KioskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub voltage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    pub uptime_seconds: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_usage: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_space: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

/// SHA-256 hex digest of a kiosk's serialized effective configuration,
/// compared by the gateway against `Kiosk.config_hash` on every heartbeat.
pub fn config_hash(serialized_config: &str) -> String {
    let digest = Sha256::digest(serialized_config.as_bytes());
    hex_encode(&digest)
}

fn hex_encode(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        // fmt::Write for String is infallible; there is no error to propagate.
        #[allow(clippy::expect_used)]
        write!(out, "{b:02x}").expect("writing to a String never fails");
    }
    out
}

#[cfg(test)]
#[path = "kiosk_tests.rs"]
mod tests;

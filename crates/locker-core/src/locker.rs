// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Locker` entity and its lifecycle rules (spec §3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A locker's position in its lifecycle. Transitions are enumerated in §3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockerStatus {
    Free,
    Reserved,
    Owned,
    Blocked,
}

impl LockerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Reserved => "reserved",
            Self::Owned => "owned",
            Self::Blocked => "blocked",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "free" => Some(Self::Free),
            "reserved" => Some(Self::Reserved),
            "owned" => Some(Self::Owned),
            "blocked" => Some(Self::Blocked),
            _ => None,
        }
    }
}

/// Who (or what) is holding a `Reserved`/`Owned` locker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnerType {
    Rfid,
    Device,
    Vip,
    None,
}

impl OwnerType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Rfid => "rfid",
            Self::Device => "device",
            Self::Vip => "vip",
            Self::None => "none",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "rfid" => Some(Self::Rfid),
            "device" => Some(Self::Device),
            "vip" => Some(Self::Vip),
            "none" => Some(Self::None),
            _ => None,
        }
    }
}

/// The physical storage unit. Composite key `(kiosk_id, locker_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Locker {
    pub kiosk_id: String,
    pub locker_id: i64,
    pub status: LockerStatus,
    pub owner_type: Option<OwnerType>,
    pub owner_key: Option<String>,
    pub is_vip: bool,
    pub display_name: Option<String>,
    pub reserved_at: Option<DateTime<Utc>>,
    pub owned_at: Option<DateTime<Utc>>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Locker {
    /// A brand-new Free locker, as created in bulk at kiosk-initialization time.
    pub fn new_free(kiosk_id: impl Into<String>, locker_id: i64, now: DateTime<Utc>) -> Self {
        Self {
            kiosk_id: kiosk_id.into(),
            locker_id,
            status: LockerStatus::Free,
            owner_type: None,
            owner_key: None,
            is_vip: false,
            display_name: None,
            reserved_at: None,
            owned_at: None,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// I2-I5: check that this row's owner fields are consistent with its status.
    /// Used by the store after every mutation and by property tests (P1-P7).
    pub fn invariants_hold(&self) -> bool {
        match self.status {
            LockerStatus::Free => {
                self.owner_type.is_none()
                    && self.owner_key.is_none()
                    && self.reserved_at.is_none()
                    && self.owned_at.is_none()
            }
            LockerStatus::Reserved => {
                self.owner_type.is_some()
                    && self.owner_key.is_some()
                    && self.reserved_at.is_some()
                    && self.owned_at.is_none()
            }
            LockerStatus::Owned => {
                self.owner_type.is_some() && self.owner_key.is_some() && self.owned_at.is_some()
            }
            LockerStatus::Blocked => {
                self.owner_type.is_none() && self.owner_key.is_none()
            }
        }
    }

    /// I7: whether a Reserved row has outlived its reservation TTL.
    pub fn reservation_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.status == LockerStatus::Reserved
            && self.reserved_at.is_some_and(|at| at + ttl < now)
    }
}

/// Candidate locker/card pairing surfaced by the "recent holder" rule (§4.4).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecentRelease {
    pub locker_id: i64,
    pub released_at: DateTime<Utc>,
    pub held_duration_hours: f64,
}

#[cfg(test)]
#[path = "locker_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only audit `Event` record (spec §3, §4.8).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The set of event types emitted across the core (spec §3, §4.4, §4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    RfidAssign,
    RfidRelease,
    StaffOpen,
    BulkOpen,
    Restarted,
    CommandEnqueued,
    CommandCompleted,
    CommandFailed,
    RateLimitViolation,
    LockerBlocked,
    LockerUnblocked,
    LockerForceTransition,
    KioskOnline,
    KioskOffline,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RfidAssign => "rfid_assign",
            Self::RfidRelease => "rfid_release",
            Self::StaffOpen => "staff_open",
            Self::BulkOpen => "bulk_open",
            Self::Restarted => "restarted",
            Self::CommandEnqueued => "command_enqueued",
            Self::CommandCompleted => "command_completed",
            Self::CommandFailed => "command_failed",
            Self::RateLimitViolation => "rate_limit_violation",
            Self::LockerBlocked => "locker_blocked",
            Self::LockerUnblocked => "locker_unblocked",
            Self::LockerForceTransition => "locker_force_transition",
            Self::KioskOnline => "kiosk_online",
            Self::KioskOffline => "kiosk_offline",
        }
    }
}

/// Context attached to a locker-ownership event, per §6.3's `user_context`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserContext {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rfid_card: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub staff_user: Option<String>,
}

/// One append-only audit row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub id: i64,
    pub timestamp: DateTime<Utc>,
    pub kiosk_id: String,
    pub locker_id: Option<i64>,
    pub event_type: EventType,
    pub rfid_card: Option<String>,
    pub device_id: Option<String>,
    pub staff_user: Option<String>,
    pub details: serde_json::Value,
}

/// A not-yet-persisted event, built by the subsystem emitting it and handed
/// to the event log in the same transaction as the state change it records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewEvent {
    pub kiosk_id: String,
    pub locker_id: Option<i64>,
    pub event_type: EventType,
    pub rfid_card: Option<String>,
    pub device_id: Option<String>,
    pub staff_user: Option<String>,
    pub details: serde_json::Value,
}

impl NewEvent {
    pub fn new(kiosk_id: impl Into<String>, event_type: EventType) -> Self {
        Self {
            kiosk_id: kiosk_id.into(),
            locker_id: None,
            event_type,
            rfid_card: None,
            device_id: None,
            staff_user: None,
            details: serde_json::Value::Null,
        }
    }

    pub fn with_locker(mut self, locker_id: i64) -> Self {
        self.locker_id = Some(locker_id);
        self
    }

    pub fn with_rfid_card(mut self, card: impl Into<String>) -> Self {
        self.rfid_card = Some(card.into());
        self
    }

    pub fn with_staff_user(mut self, staff_user: impl Into<String>) -> Self {
        self.staff_user = Some(staff_user.into());
        self
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gateway-to-kiosk `Command` entity (spec §3, §4.5), modeled as a tagged
//! enum of payloads per the "dynamic dispatch → tagged variants" design note
//! (spec §9) rather than a trait-object `CommandHandler`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Command lifecycle state (spec §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandStatus {
    Pending,
    InFlight,
    Completed,
    Failed,
}

impl CommandStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InFlight => "in_flight",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(Self::Pending),
            "in_flight" => Some(Self::InFlight),
            "completed" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Tagged payload for every directive the gateway can send a kiosk (§4.5).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command_type", rename_all = "snake_case")]
pub enum CommandPayload {
    OpenLocker {
        locker_id: i64,
        #[serde(skip_serializing_if = "Option::is_none")]
        staff_user: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        reason: Option<String>,
    },
    BulkOpen {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        locker_ids: Vec<i64>,
        #[serde(default)]
        exclude_vip: bool,
        staff_user: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        interval_ms: Option<u64>,
    },
    BlockLocker {
        locker_id: i64,
        staff_user: String,
        reason: String,
    },
    UnblockLocker {
        locker_id: i64,
        staff_user: String,
    },
    Reset,
    RestartService {
        service_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        delay_seconds: Option<u64>,
    },
    Buzzer {
        pattern: String,
    },
    SyncState,
}

impl CommandPayload {
    pub fn command_type(&self) -> &'static str {
        match self {
            Self::OpenLocker { .. } => "open_locker",
            Self::BulkOpen { .. } => "bulk_open",
            Self::BlockLocker { .. } => "block_locker",
            Self::UnblockLocker { .. } => "unblock_locker",
            Self::Reset => "reset",
            Self::RestartService { .. } => "restart_service",
            Self::Buzzer { .. } => "buzzer",
            Self::SyncState => "sync_state",
        }
    }

    /// Structural payload validation at enqueue time (spec §7: "malformed
    /// commands ... 4xx at HTTP boundary").
    pub fn validate(&self, kiosk_size: i64) -> Result<(), String> {
        let in_range = |id: i64| (1..=kiosk_size).contains(&id);
        match self {
            Self::OpenLocker { locker_id, .. } => {
                if !in_range(*locker_id) {
                    return Err(format!("locker_id {locker_id} out of range 1..={kiosk_size}"));
                }
            }
            Self::BlockLocker { locker_id, staff_user, .. } => {
                if !in_range(*locker_id) {
                    return Err(format!("locker_id {locker_id} out of range 1..={kiosk_size}"));
                }
                if staff_user.trim().is_empty() {
                    return Err("staff_user must not be empty".into());
                }
            }
            Self::UnblockLocker { locker_id, staff_user } => {
                if !in_range(*locker_id) {
                    return Err(format!("locker_id {locker_id} out of range 1..={kiosk_size}"));
                }
                if staff_user.trim().is_empty() {
                    return Err("staff_user must not be empty".into());
                }
            }
            Self::BulkOpen { locker_ids, staff_user, .. } => {
                if staff_user.trim().is_empty() {
                    return Err("staff_user must not be empty".into());
                }
                for id in locker_ids {
                    if !in_range(*id) {
                        return Err(format!("locker_id {id} out of range 1..={kiosk_size}"));
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }
}

/// A durable, retried gateway-to-kiosk command row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
    pub command_id: Uuid,
    pub kiosk_id: String,
    #[serde(flatten)]
    pub payload: CommandPayload,
    pub status: CommandStatus,
    pub retry_count: u32,
    pub max_retries: u32,
    pub next_attempt_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl Command {
    pub fn new(kiosk_id: impl Into<String>, payload: CommandPayload, max_retries: u32) -> Self {
        let now = Utc::now();
        Self {
            command_id: Uuid::new_v4(),
            kiosk_id: kiosk_id.into(),
            payload,
            status: CommandStatus::Pending,
            retry_count: 0,
            max_retries,
            next_attempt_at: now,
            created_at: now,
            completed_at: None,
            last_error: None,
        }
    }
}

/// Outcome reported by the kiosk for one executed command (§4.5 execution
/// reporting, `POST /commands/complete`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResult {
    pub command_id: Uuid,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
#[path = "command_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::fmt;

use serde::{Deserialize, Serialize};

/// Stable, user-visible error codes for the user-flow state machine (spec §7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KioskError {
    NoAvailableLockers,
    AssignmentFailed,
    OpeningFailed,
    OwnershipValidationFailed,
    SystemError,
    LockerListError,
}

impl KioskError {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NoAvailableLockers => "NO_AVAILABLE_LOCKERS",
            Self::AssignmentFailed => "ASSIGNMENT_FAILED",
            Self::OpeningFailed => "OPENING_FAILED",
            Self::OwnershipValidationFailed => "OWNERSHIP_VALIDATION_FAILED",
            Self::SystemError => "SYSTEM_ERROR",
            Self::LockerListError => "LOCKER_LIST_ERROR",
        }
    }

    /// A localized (English-default) human message; the panel/kiosk UI owns
    /// actual localization, this is the fallback baked into the code.
    pub fn human_message(&self) -> &'static str {
        match self {
            Self::NoAvailableLockers => "No lockers are available right now.",
            Self::AssignmentFailed => "That locker was just taken. Please choose another.",
            Self::OpeningFailed => "The locker door did not open. Please call staff.",
            Self::OwnershipValidationFailed => "We could not verify your locker. Please call staff.",
            Self::SystemError => "Something went wrong. Please try again.",
            Self::LockerListError => "We could not load available lockers. Please try again.",
        }
    }

    pub fn to_outcome(&self) -> UserOutcome {
        UserOutcome { code: self.as_str().to_owned(), message: self.human_message().to_owned() }
    }
}

impl fmt::Display for KioskError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The stable-code + human-message pair every user-flow outcome carries on
/// failure (spec §7 "every UI outcome includes a human message ... and a
/// stable error code").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserOutcome {
    pub code: String,
    pub message: String,
}

/// Transport-level error talking to the gateway (spec §7 "transient I/O").
#[derive(Debug, thiserror::Error)]
pub enum GatewayClientError {
    #[error("gateway request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("gateway returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Modbus controller failure kinds (spec §4.1, §4.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ModbusError {
    #[error("frame transmission timed out")]
    Timeout,
    #[error("CRC mismatch on response frame")]
    CrcMismatch,
    #[error("no response from slave")]
    NoResponse,
    #[error("serial port is not open")]
    PortClosed,
    #[error("command queue is full")]
    QueueFull,
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;

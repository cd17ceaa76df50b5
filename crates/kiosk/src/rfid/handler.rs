// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Turns one reassembled raw UID string into a stable `card_id`, applying
//! debounce and the short-UID confirmation rule (spec §4.2). Frame
//! reassembly (`hid`/`keyboard`) and device I/O are handled upstream; this
//! module is the pure decision layer plus its structured logging.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use locker_core::uid::{ScanOutcome, ScanReason, UidPolicy, UidStandardizer};

use crate::config::RfidConfig;

/// A completed, privacy-hashed scan ready for the user-flow state machine
/// (spec §4.2 "emit `CardScanned(...)`").
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardScanned {
    pub card_id: String,
    pub scanned_at: DateTime<Utc>,
    pub reader_id: String,
    pub request_id: Uuid,
    pub raw_uid_hex: String,
    pub standardized_uid_hex: String,
}

/// What came out of processing one raw scan: an emitted card, a debounced
/// repeat (no log-worthy failure, just suppressed), or a rejection with a
/// stable reason code (spec "Logging" list).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanResult {
    Emitted(CardScanned),
    Debounced { request_id: Uuid },
    Rejected { request_id: Uuid, reason: ScanReason },
}

/// Per-reader scan processor: one instance per physical RFID reader.
pub struct RfidHandler {
    reader_id: String,
    standardizer: UidStandardizer,
    debounce: chrono::Duration,
    last_emitted: Option<(String, DateTime<Utc>)>,
}

impl RfidHandler {
    pub fn new(reader_id: impl Into<String>, policy: UidPolicy, debounce: chrono::Duration) -> Self {
        Self {
            reader_id: reader_id.into(),
            standardizer: UidStandardizer::new(policy),
            debounce,
            last_emitted: None,
        }
    }

    pub fn from_config(reader_id: impl Into<String>, config: &RfidConfig) -> Self {
        Self::new(reader_id, config.uid_policy(), config.debounce())
    }

    /// Process one finalized raw UID string reassembled by the `hid` or
    /// `keyboard` layer.
    pub fn process_raw_scan(&mut self, raw: &str, now: DateTime<Utc>) -> ScanResult {
        let request_id = Uuid::new_v4();
        match self.standardizer.scan(raw, now) {
            ScanOutcome::Rejected { reason } => {
                tracing::info!(
                    request_id = %request_id,
                    reader_id = %self.reader_id,
                    reason = reason.as_str(),
                    "rfid scan rejected"
                );
                ScanResult::Rejected { request_id, reason }
            }
            ScanOutcome::Emitted { card_id, standardized_uid_hex } => {
                if self.debounced(&card_id, now) {
                    tracing::debug!(request_id = %request_id, reader_id = %self.reader_id, "rfid scan debounced");
                    return ScanResult::Debounced { request_id };
                }
                self.last_emitted = Some((card_id.clone(), now));
                tracing::debug!(
                    request_id = %request_id,
                    reader_id = %self.reader_id,
                    raw_uid_hex = raw,
                    standardized_uid_hex = %standardized_uid_hex,
                    "rfid scan raw/standardized"
                );
                tracing::info!(request_id = %request_id, reader_id = %self.reader_id, card_id = %card_id, "rfid scan accepted");
                ScanResult::Emitted(CardScanned {
                    card_id,
                    scanned_at: now,
                    reader_id: self.reader_id.clone(),
                    request_id,
                    raw_uid_hex: raw.to_string(),
                    standardized_uid_hex,
                })
            }
        }
    }

    fn debounced(&self, card_id: &str, now: DateTime<Utc>) -> bool {
        matches!(&self.last_emitted, Some((last, at)) if last == card_id && *at + self.debounce > now)
    }

    /// Drop a short-UID confirmation window that has expired without a
    /// matching repeat scan (spec: "expiry discards pending state").
    pub fn sweep_expired_confirmation(&mut self, now: DateTime<Utc>) -> Option<ScanReason> {
        self.standardizer.sweep_expired(now)
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;

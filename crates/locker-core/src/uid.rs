// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RFID UID standardization, privacy hashing, and the short-UID confirmation
//! state machine (spec §4.2). Expressed as an explicit state machine with a
//! timer, per the "coroutine-like control flow" redesign note: the
//! confirmation window is a pending-state record checked by a caller-driven
//! sweep, not a blocked thread or callback chain.

use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};

/// Why a scan was rejected, or why a previously-pending one resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanReason {
    EmptyUid,
    InvalidUid,
    ShortUid,
    ShortUidLegacy,
    ConfirmationRequired,
    ConfirmationMismatch,
    KeyboardTimeout,
}

impl ScanReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EmptyUid => "EMPTY_UID",
            Self::InvalidUid => "INVALID_UID",
            Self::ShortUid => "SHORT_UID",
            Self::ShortUidLegacy => "SHORT_UID_LEGACY",
            Self::ConfirmationRequired => "CONFIRMATION_REQUIRED",
            Self::ConfirmationMismatch => "CONFIRMATION_MISMATCH",
            Self::KeyboardTimeout => "KEYBOARD_TIMEOUT",
        }
    }
}

/// Outcome of one scan attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    Emitted { card_id: String, standardized_uid_hex: String },
    Rejected { reason: ScanReason },
}

/// Tunables for UID standardization and the confirmation rule (spec §6.5).
#[derive(Debug, Clone, Copy)]
pub struct UidPolicy {
    /// Strict mode enforces `min_significant_length` via the confirmation
    /// window; legacy mode silently drops anything under `legacy_min_significant_length`.
    pub strict: bool,
    pub min_significant_length: usize,
    pub legacy_min_significant_length: usize,
    pub confirmation_window: chrono::Duration,
    pub confirmation_reads_required: u32,
}

impl Default for UidPolicy {
    fn default() -> Self {
        Self {
            strict: true,
            min_significant_length: 8,
            legacy_min_significant_length: 6,
            confirmation_window: chrono::Duration::milliseconds(4000),
            confirmation_reads_required: 1,
        }
    }
}

/// Strip non-hex characters, uppercase, left-pad odd nibble counts, truncate
/// to 64 hex characters (spec §4.2 steps 1-3).
fn standardize(raw: &str) -> Result<String, ScanReason> {
    if raw.trim().is_empty() {
        return Err(ScanReason::EmptyUid);
    }
    let mut hex: String = raw.chars().filter(|c| c.is_ascii_hexdigit()).collect();
    if hex.is_empty() {
        return Err(ScanReason::InvalidUid);
    }
    hex.make_ascii_uppercase();
    if hex.len() % 2 != 0 {
        hex.insert(0, '0');
    }
    hex.truncate(64);
    Ok(hex)
}

/// Length of a standardized UID after stripping leading zeros (step 4).
fn significant_length(standardized: &str) -> usize {
    standardized.trim_start_matches('0').len()
}

/// SHA-256(standardized_uid_hex) truncated to 16 hex characters — the opaque
/// `card_id` used everywhere else in the system.
pub fn privacy_hash(standardized_uid_hex: &str) -> String {
    let digest = Sha256::digest(standardized_uid_hex.as_bytes());
    let mut out = String::with_capacity(16);
    for byte in digest.iter().take(8) {
        out.push_str(&format!("{byte:02x}"));
    }
    out
}

struct PendingShortScan {
    standardized_uid: String,
    remaining_reads: u32,
    expires_at: DateTime<Utc>,
}

/// Per-reader scan processor. Holds at most one pending short-UID confirmation.
pub struct UidStandardizer {
    policy: UidPolicy,
    pending: Option<PendingShortScan>,
}

impl UidStandardizer {
    pub fn new(policy: UidPolicy) -> Self {
        Self { policy, pending: None }
    }

    /// Process one raw scan. `now` drives the confirmation window.
    pub fn scan(&mut self, raw: &str, now: DateTime<Utc>) -> ScanOutcome {
        let standardized = match standardize(raw) {
            Ok(s) => s,
            Err(reason) => return ScanOutcome::Rejected { reason },
        };
        let sig_len = significant_length(&standardized);

        if !self.policy.strict {
            if sig_len < self.policy.legacy_min_significant_length {
                return ScanOutcome::Rejected { reason: ScanReason::ShortUidLegacy };
            }
            return emit(&standardized);
        }

        if sig_len >= self.policy.min_significant_length {
            self.pending = None;
            return emit(&standardized);
        }

        match self.pending.as_mut() {
            Some(pending) if pending.standardized_uid == standardized => {
                pending.remaining_reads = pending.remaining_reads.saturating_sub(1);
                if pending.remaining_reads == 0 {
                    self.pending = None;
                    emit(&standardized)
                } else {
                    ScanOutcome::Rejected { reason: ScanReason::ConfirmationRequired }
                }
            }
            Some(_) => {
                self.pending = Some(PendingShortScan {
                    standardized_uid: standardized,
                    remaining_reads: self.policy.confirmation_reads_required,
                    expires_at: now + self.policy.confirmation_window,
                });
                ScanOutcome::Rejected { reason: ScanReason::ConfirmationMismatch }
            }
            None => {
                self.pending = Some(PendingShortScan {
                    standardized_uid: standardized,
                    remaining_reads: self.policy.confirmation_reads_required,
                    expires_at: now + self.policy.confirmation_window,
                });
                ScanOutcome::Rejected { reason: ScanReason::ConfirmationRequired }
            }
        }
    }

    /// Drop a pending confirmation whose window has elapsed. Call this from
    /// the kiosk's periodic tick; returns `ShortUid` when something was dropped.
    pub fn sweep_expired(&mut self, now: DateTime<Utc>) -> Option<ScanReason> {
        if self.pending.as_ref().is_some_and(|p| p.expires_at <= now) {
            self.pending = None;
            Some(ScanReason::ShortUid)
        } else {
            None
        }
    }

    #[cfg(test)]
    fn has_pending(&self) -> bool {
        self.pending.is_some()
    }
}

fn emit(standardized: &str) -> ScanOutcome {
    ScanOutcome::Emitted {
        card_id: privacy_hash(standardized),
        standardized_uid_hex: standardized.to_string(),
    }
}

#[cfg(test)]
#[path = "uid_tests.rs"]
mod tests;

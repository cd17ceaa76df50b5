// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RFID reader pipeline (spec §4.2): frame reassembly feeding the UID
//! standardization/debounce handler. `reader_type` selects which
//! reassembler sits in front of [`handler::RfidHandler`].

pub mod device;
pub mod handler;
pub mod hid;
pub mod keyboard;

use chrono::{DateTime, Utc};

use crate::config::RfidConfig;
pub use handler::{CardScanned, RfidHandler, ScanResult};
use hid::HidFrameAssembler;
use keyboard::KeyboardLineAssembler;
use locker_core::uid::ScanReason;

/// Which reassembler feeds the standardizer, chosen by `rfid.reader_type`.
enum Reassembler {
    Hid(HidFrameAssembler),
    Keyboard(KeyboardLineAssembler),
}

/// One physical reader: reassembly plus the UID standardizer/debounce rule,
/// wired together according to kiosk config.
pub struct RfidPipeline {
    reassembler: Reassembler,
    handler: RfidHandler,
}

impl RfidPipeline {
    pub fn new(reader_id: impl Into<String>, config: &RfidConfig) -> Self {
        let reassembler = match config.reader_type.as_str() {
            "keyboard" => Reassembler::Keyboard(KeyboardLineAssembler::new(config.keyboard_inactivity_timeout())),
            _ => Reassembler::Hid(HidFrameAssembler::new(config.hid_idle_finalization())),
        };
        Self { reassembler, handler: RfidHandler::from_config(reader_id, config) }
    }

    /// Feed one raw HID report. No-op (returns `None`) in keyboard mode.
    pub fn on_hid_report(&mut self, report: &[u8], now: DateTime<Utc>) -> Option<ScanResult> {
        match &mut self.reassembler {
            Reassembler::Hid(asm) => asm.push_report(report, now).map(|raw| self.handler.process_raw_scan(&raw, now)),
            Reassembler::Keyboard(_) => None,
        }
    }

    /// Feed one character from a keyboard-wedge stream. No-op in HID mode.
    pub fn on_char(&mut self, c: char, now: DateTime<Utc>) -> Option<ScanResult> {
        match &mut self.reassembler {
            Reassembler::Keyboard(asm) => asm.push_char(c, now).map(|raw| self.handler.process_raw_scan(&raw, now)),
            Reassembler::Hid(_) => None,
        }
    }

    /// Periodic tick: closes idle HID raw-byte buffers, flushes stale
    /// keyboard buffers (logging KEYBOARD_TIMEOUT), and drops expired
    /// short-UID confirmations. Call on a short, fixed interval.
    pub fn sweep_idle(&mut self, now: DateTime<Utc>) -> Option<ScanResult> {
        if let Some(reason) = self.handler.sweep_expired_confirmation(now) {
            tracing::info!(reason = reason.as_str(), "rfid pending confirmation expired");
        }

        match &mut self.reassembler {
            Reassembler::Hid(asm) => asm.sweep_idle(now).map(|raw| self.handler.process_raw_scan(&raw, now)),
            Reassembler::Keyboard(asm) => asm.sweep_idle(now).map(|_| {
                tracing::info!(reason = ScanReason::KeyboardTimeout.as_str(), "rfid scan rejected");
                ScanResult::Rejected { request_id: uuid::Uuid::new_v4(), reason: ScanReason::KeyboardTimeout }
            }),
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! HID report reassembly (spec §4.2 "HID frame reassembly (multi-packet)").
//! Pure logic, no device I/O: a USB HID reader is fed in report-by-report and
//! this module decides when a UID is complete.

use chrono::{DateTime, Utc};

const ENTER_KEYCODE: u8 = 0x28;

/// USB HID keyboard usage IDs for digits 1-9 then 0 (0x1E..=0x27).
fn keycode_to_digit(keycode: u8) -> Option<char> {
    match keycode {
        0x1E..=0x26 => Some((b'1' + (keycode - 0x1E)) as char),
        0x27 => Some('0'),
        _ => None,
    }
}

/// A standard 8-byte HID keyboard report: modifier, reserved, up to 6 keycodes.
fn as_keyboard_report(report: &[u8]) -> bool {
    report.len() == 8
}

enum Pending {
    /// Digits accumulated from keyboard-style HID reports, finalized on Enter.
    Keyboard { digits: String },
    /// Raw bytes from a non-keyboard-descriptor reader, finalized on idle.
    Raw { hex: String, last_report_at: DateTime<Utc> },
}

/// Reassembles a sequence of HID reports from one reader into a raw UID
/// string. One instance per physical reader.
pub struct HidFrameAssembler {
    idle_finalization: chrono::Duration,
    pending: Option<Pending>,
}

impl HidFrameAssembler {
    pub fn new(idle_finalization: chrono::Duration) -> Self {
        Self { idle_finalization, pending: None }
    }

    /// Feed one HID report. Returns `Some(raw_uid)` if this report completed
    /// a scan (keyboard-style Enter keycode); otherwise `None` — raw-byte
    /// accumulation finalizes only via [`Self::sweep_idle`].
    pub fn push_report(&mut self, report: &[u8], now: DateTime<Utc>) -> Option<String> {
        if as_keyboard_report(report) {
            return self.push_keyboard_report(report);
        }

        let hex: String = report.iter().map(|b| format!("{b:02X}")).collect();
        match self.pending.as_mut() {
            Some(Pending::Raw { hex: buf, last_report_at }) => {
                buf.push_str(&hex);
                *last_report_at = now;
            }
            _ => {
                self.pending = Some(Pending::Raw { hex, last_report_at: now });
            }
        }
        None
    }

    fn push_keyboard_report(&mut self, report: &[u8]) -> Option<String> {
        let keycodes = &report[2..8];
        if keycodes.contains(&ENTER_KEYCODE) {
            let digits = match self.pending.take() {
                Some(Pending::Keyboard { digits }) => digits,
                _ => String::new(),
            };
            return Some(digits);
        }
        for &keycode in keycodes {
            if let Some(digit) = keycode_to_digit(keycode) {
                match self.pending.as_mut() {
                    Some(Pending::Keyboard { digits }) => digits.push(digit),
                    _ => self.pending = Some(Pending::Keyboard { digits: digit.to_string() }),
                }
            }
        }
        None
    }

    /// Finalize a raw-byte buffer that has gone quiet for `idle_finalization`
    /// (spec: "if no further report arrives within `hid_idle_finalization_ms`").
    pub fn sweep_idle(&mut self, now: DateTime<Utc>) -> Option<String> {
        match &self.pending {
            Some(Pending::Raw { last_report_at, .. }) if *last_report_at + self.idle_finalization <= now => {
                match self.pending.take() {
                    Some(Pending::Raw { hex, .. }) => Some(hex),
                    _ => None,
                }
            }
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "hid_tests.rs"]
mod tests;

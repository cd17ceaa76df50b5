// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Utc;

use super::*;

fn config(reader_type: &str) -> RfidConfig {
    RfidConfig {
        reader_type: reader_type.to_string(),
        debounce_ms: 500,
        strict_min_length: true,
        min_significant_length: 8,
        legacy_min_significant_length: 6,
        confirmation_window_ms: 4000,
        confirmation_reads_required: 1,
        hid_idle_finalization_ms: 75,
        keyboard_inactivity_timeout_ms: 1000,
    }
}

#[test]
fn hid_mode_ignores_keyboard_chars_and_emits_on_idle_sweep() {
    let mut pipeline = RfidPipeline::new("reader-1", &config("hid"));
    let now = Utc::now();
    assert_eq!(pipeline.on_char('1', now), None);
    assert!(pipeline.on_hid_report(&[0xDE, 0xAD, 0xBE, 0xEF], now).is_none());

    let later = now + chrono::Duration::milliseconds(75);
    match pipeline.sweep_idle(later) {
        Some(ScanResult::Emitted(card)) => assert_eq!(card.raw_uid_hex, "DEADBEEF"),
        other => panic!("expected emitted scan, got {other:?}"),
    }
}

#[test]
fn keyboard_mode_ignores_hid_reports_and_emits_on_enter() {
    let mut pipeline = RfidPipeline::new("reader-1", &config("keyboard"));
    let now = Utc::now();
    assert!(pipeline.on_hid_report(&[0, 0, 0x1E, 0, 0, 0, 0, 0], now).is_none());
    assert_eq!(pipeline.on_char('1', now), None);
    assert_eq!(pipeline.on_char('2', now), None);
    match pipeline.on_char('\r', now) {
        Some(ScanResult::Emitted(card)) => assert_eq!(card.raw_uid_hex, "12"),
        other => panic!("expected emitted scan, got {other:?}"),
    }
}

#[test]
fn keyboard_mode_sweep_idle_reports_a_keyboard_timeout_rejection() {
    let mut pipeline = RfidPipeline::new("reader-1", &config("keyboard"));
    let now = Utc::now();
    pipeline.on_char('9', now);

    let later = now + chrono::Duration::milliseconds(1000);
    match pipeline.sweep_idle(later) {
        Some(ScanResult::Rejected { reason, .. }) => assert_eq!(reason, ScanReason::KeyboardTimeout),
        other => panic!("expected a keyboard timeout rejection, got {other:?}"),
    }
}

#[test]
fn sweep_idle_with_nothing_pending_is_a_no_op() {
    let mut pipeline = RfidPipeline::new("reader-1", &config("hid"));
    assert!(pipeline.sweep_idle(Utc::now()).is_none());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use chrono::Utc;

use locker_core::uid::UidPolicy;

use super::*;

fn strict_policy() -> UidPolicy {
    UidPolicy {
        strict: true,
        min_significant_length: 8,
        legacy_min_significant_length: 6,
        confirmation_window: chrono::Duration::milliseconds(4000),
        confirmation_reads_required: 1,
    }
}

fn debounce() -> chrono::Duration {
    chrono::Duration::milliseconds(500)
}

#[test]
fn a_valid_scan_emits_a_card_scanned_event() {
    let mut handler = RfidHandler::new("reader-1", strict_policy(), debounce());
    let now = Utc::now();
    match handler.process_raw_scan("DEADBEEF12345678", now) {
        ScanResult::Emitted(card) => {
            assert_eq!(card.reader_id, "reader-1");
            assert_eq!(card.raw_uid_hex, "DEADBEEF12345678");
            assert!(!card.card_id.is_empty());
        }
        other => panic!("expected emitted scan, got {other:?}"),
    }
}

#[test]
fn an_empty_scan_is_rejected_with_empty_uid() {
    let mut handler = RfidHandler::new("reader-1", strict_policy(), debounce());
    match handler.process_raw_scan("   ", Utc::now()) {
        ScanResult::Rejected { reason, .. } => assert_eq!(reason, ScanReason::EmptyUid),
        other => panic!("expected rejection, got {other:?}"),
    }
}

#[test]
fn a_repeat_scan_of_the_same_card_within_the_debounce_window_is_suppressed() {
    let mut handler = RfidHandler::new("reader-1", strict_policy(), debounce());
    let now = Utc::now();
    let first = handler.process_raw_scan("DEADBEEF12345678", now);
    assert!(matches!(first, ScanResult::Emitted(_)));

    let repeat = handler.process_raw_scan("DEADBEEF12345678", now + chrono::Duration::milliseconds(100));
    assert!(matches!(repeat, ScanResult::Debounced { .. }));
}

#[test]
fn a_repeat_scan_after_the_debounce_window_emits_again() {
    let mut handler = RfidHandler::new("reader-1", strict_policy(), debounce());
    let now = Utc::now();
    let first = handler.process_raw_scan("DEADBEEF12345678", now);
    assert!(matches!(first, ScanResult::Emitted(_)));

    let later = now + debounce() + chrono::Duration::milliseconds(1);
    let second = handler.process_raw_scan("DEADBEEF12345678", later);
    assert!(matches!(second, ScanResult::Emitted(_)));
}

#[test]
fn a_different_card_scanned_immediately_after_is_not_debounced() {
    let mut handler = RfidHandler::new("reader-1", strict_policy(), debounce());
    let now = Utc::now();
    let first = handler.process_raw_scan("DEADBEEF12345678", now);
    assert!(matches!(first, ScanResult::Emitted(_)));

    let second = handler.process_raw_scan("FEEDFACE87654321", now);
    assert!(matches!(second, ScanResult::Emitted(_)));
}

#[test]
fn a_short_uid_requires_confirmation_before_emitting() {
    let mut handler = RfidHandler::new("reader-1", strict_policy(), debounce());
    let now = Utc::now();
    let first = handler.process_raw_scan("1234", now);
    assert!(matches!(
        first,
        ScanResult::Rejected { reason: ScanReason::ConfirmationRequired, .. }
    ));

    let confirmed = handler.process_raw_scan("1234", now + chrono::Duration::milliseconds(200));
    assert!(matches!(confirmed, ScanResult::Emitted(_)));
}

#[test]
fn sweep_expired_confirmation_drops_a_stale_pending_short_scan() {
    let mut handler = RfidHandler::new("reader-1", strict_policy(), debounce());
    let now = Utc::now();
    handler.process_raw_scan("1234", now);
    assert_eq!(handler.sweep_expired_confirmation(now), None);

    let later = now + chrono::Duration::milliseconds(4001);
    assert_eq!(handler.sweep_expired_confirmation(later), Some(ScanReason::ShortUid));
}

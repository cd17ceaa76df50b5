// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use serde_json::json;

use crate::event::{EventType, NewEvent};

#[test]
fn builder_sets_only_the_fields_given() {
    let ev = NewEvent::new("gym-main", EventType::RfidAssign)
        .with_locker(3)
        .with_rfid_card("a1b2c3")
        .with_details(json!({"retries": 0}));

    assert_eq!(ev.locker_id, Some(3));
    assert_eq!(ev.rfid_card.as_deref(), Some("a1b2c3"));
    assert!(ev.staff_user.is_none());
    assert_eq!(ev.details, json!({"retries": 0}));
}

#[test]
fn event_type_as_str_is_snake_case() {
    assert_eq!(EventType::RateLimitViolation.as_str(), "rate_limit_violation");
    assert_eq!(EventType::KioskOffline.as_str(), "kiosk_offline");
}

#[test]
fn new_event_defaults_to_null_details() {
    let ev = NewEvent::new("gym-main", EventType::StaffOpen);
    assert_eq!(ev.details, serde_json::Value::Null);
    assert!(ev.locker_id.is_none());
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use wiremock::matchers::{body_json, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use locker_core::locker::{Locker, LockerStatus, OwnerType};

use super::*;

fn sample_locker() -> Locker {
    let now = chrono::Utc::now();
    Locker {
        kiosk_id: "kiosk-1".into(),
        locker_id: 3,
        status: LockerStatus::Free,
        owner_type: None,
        owner_key: None,
        is_vip: false,
        display_name: None,
        reserved_at: None,
        owned_at: None,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn register_posts_identity_and_returns_polling_config() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/provisioning/register"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "polling_config": { "heartbeat_interval_ms": 10_000, "poll_interval_ms": 2_000 }
        })))
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri());
    let resp = client.register("kiosk-1", "zone-a", "0.1.0", "hw-1", 16, "abc123").await.unwrap();
    assert_eq!(resp.polling_config.heartbeat_interval_ms, 10_000);
}

#[tokio::test]
async fn poll_commands_sends_kiosk_id_and_limit_as_query_params() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/commands"))
        .and(query_param("kiosk_id", "kiosk-1"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri());
    let commands = client.poll_commands("kiosk-1", 5).await.unwrap();
    assert!(commands.is_empty());
}

#[tokio::test]
async fn assign_posts_the_expected_body_and_unwraps_the_assigned_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/lockers/assign"))
        .and(body_json(serde_json::json!({
            "kiosk_id": "kiosk-1",
            "locker_id": 3,
            "owner_type": "rfid",
            "owner_key": "card-abc"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "assigned": true })))
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri());
    let assigned = client.assign("kiosk-1", 3, OwnerType::Rfid, "card-abc").await.unwrap();
    assert!(assigned);
}

#[tokio::test]
async fn lockers_snapshot_deserializes_the_full_locker_list() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/lockers"))
        .and(query_param("kiosk_id", "kiosk-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![sample_locker()]))
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri());
    let lockers = client.lockers_snapshot("kiosk-1").await.unwrap();
    assert_eq!(lockers.len(), 1);
    assert_eq!(lockers[0].locker_id, 3);
}

#[tokio::test]
async fn a_non_success_status_is_reported_as_a_status_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/heartbeat"))
        .respond_with(ResponseTemplate::new(404).set_body_string("unknown kiosk_id"))
        .mount(&server)
        .await;

    let client = GatewayClient::new(server.uri());
    let report = locker_core::kiosk::HeartbeatReport {
        kiosk_id: "kiosk-1".into(),
        version: "0.1.0".into(),
        config_hash: "abc".into(),
        status: locker_core::kiosk::KioskStatus::Online,
        voltage: None,
        temperature: None,
        uptime_seconds: 0,
        memory_usage: None,
        disk_space: None,
        last_error: None,
    };
    let err = client.heartbeat(&report).await.unwrap_err();
    match err {
        GatewayClientError::Status { status, .. } => assert_eq!(status, 404),
        other => panic!("expected a status error, got {other:?}"),
    }
}

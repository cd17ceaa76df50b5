// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::{Arc, Mutex as StdMutex};

use tokio_util::sync::CancellationToken;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use locker_core::command::{Command, CommandPayload, CommandStatus};
use locker_core::locker::{Locker, LockerStatus};

use crate::config::ModbusConfig;
use crate::modbus::controller::{ModbusController, TransportFactory};
use crate::modbus::transport::{MockSerialTransport, MockStep};

use super::*;

fn modbus_config() -> ModbusConfig {
    ModbusConfig {
        port: "/dev/null".into(),
        baudrate: 9600,
        timeout_ms: 50,
        pulse_duration_ms: 1,
        burst_duration_seconds: 0,
        burst_interval_ms: 1,
        command_interval_ms: 1,
        max_retries: 0,
        retry_delay_base_ms: 1,
        retry_delay_max_ms: 1,
        connection_retry_attempts: 1,
        health_check_interval_ms: 60_000,
        queue_capacity: 16,
    }
}

fn framed(body: Vec<u8>) -> Vec<u8> {
    locker_core::crc16::append_crc(body)
}

async fn modbus_handle(steps: Vec<MockStep>) -> ModbusController {
    let slot: Arc<StdMutex<Option<MockSerialTransport>>> = Arc::new(StdMutex::new(Some(MockSerialTransport::new(steps))));
    let factory: TransportFactory = Arc::new(move || {
        slot.lock().unwrap().take().map(|t| Box::new(t) as _).ok_or(crate::error::ModbusError::PortClosed)
    });
    ModbusController::spawn(factory, modbus_config(), CancellationToken::new()).await.unwrap()
}

fn command(payload: CommandPayload) -> Command {
    Command {
        command_id: Uuid::new_v4(),
        kiosk_id: "kiosk-1".into(),
        payload,
        status: CommandStatus::Pending,
        retry_count: 0,
        max_retries: 3,
        next_attempt_at: chrono::Utc::now(),
        created_at: chrono::Utc::now(),
        completed_at: None,
        last_error: None,
    }
}

fn sample_locker(locker_id: i64, is_vip: bool) -> Locker {
    let now = chrono::Utc::now();
    Locker {
        kiosk_id: "kiosk-1".into(),
        locker_id,
        status: LockerStatus::Free,
        owner_type: None,
        owner_key: None,
        is_vip,
        display_name: None,
        reserved_at: None,
        owned_at: None,
        version: 0,
        created_at: now,
        updated_at: now,
    }
}

#[tokio::test]
async fn open_locker_reports_success_when_the_relay_confirms() {
    let server = MockServer::start().await;
    let gateway = GatewayClient::new(server.uri());
    let modbus = modbus_handle(vec![
        MockStep::Ok(framed(vec![0x01, 0x05, 0x00, 0x00, 0xFF, 0x00])),
        MockStep::Ok(framed(vec![0x01, 0x05, 0x00, 0x00, 0x00, 0x00])),
    ])
    .await;
    let executor = CommandExecutor::new("kiosk-1", gateway, modbus);

    let cmd = command(CommandPayload::OpenLocker { locker_id: 4, staff_user: None, reason: None });
    let result = executor.execute(&cmd).await;
    assert!(result.success);
    assert_eq!(result.command_id, cmd.command_id);
}

#[tokio::test]
async fn open_locker_reports_failure_when_the_relay_never_confirms() {
    let server = MockServer::start().await;
    let gateway = GatewayClient::new(server.uri());
    let modbus = modbus_handle(vec![MockStep::Err(crate::error::ModbusError::NoResponse)]).await;
    let executor = CommandExecutor::new("kiosk-1", gateway, modbus);

    let cmd = command(CommandPayload::OpenLocker { locker_id: 4, staff_user: None, reason: None });
    let result = executor.execute(&cmd).await;
    assert!(!result.success);
    assert!(result.error.is_some());
}

#[tokio::test]
async fn bulk_open_excludes_vip_lockers_when_requested() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/lockers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![sample_locker(1, true), sample_locker(2, false)]))
        .mount(&server)
        .await;

    let gateway = GatewayClient::new(server.uri());
    let modbus = modbus_handle(vec![
        MockStep::Ok(framed(vec![0x01, 0x05, 0x00, 0x10, 0xFF, 0x00])),
        MockStep::Ok(framed(vec![0x01, 0x05, 0x00, 0x10, 0x00, 0x00])),
    ])
    .await;
    let executor = CommandExecutor::new("kiosk-1", gateway, modbus);

    let cmd = command(CommandPayload::BulkOpen {
        locker_ids: vec![1, 2],
        exclude_vip: true,
        staff_user: "staff-1".into(),
        interval_ms: Some(0),
    });
    let result = executor.execute(&cmd).await;
    assert!(result.success);
}

#[tokio::test]
async fn sync_state_fetches_the_locker_snapshot() {
    let server = MockServer::start().await;
    Mock::given(method("GET")).and(path("/lockers"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Locker>::new()))
        .mount(&server)
        .await;

    let gateway = GatewayClient::new(server.uri());
    let modbus = modbus_handle(vec![]).await;
    let executor = CommandExecutor::new("kiosk-1", gateway, modbus);

    let cmd = command(CommandPayload::SyncState);
    let result = executor.execute(&cmd).await;
    assert!(result.success);
}

#[tokio::test]
async fn buzzer_always_succeeds_locally() {
    let server = MockServer::start().await;
    let gateway = GatewayClient::new(server.uri());
    let modbus = modbus_handle(vec![]).await;
    let executor = CommandExecutor::new("kiosk-1", gateway, modbus);

    let cmd = command(CommandPayload::Buzzer { pattern: "double-beep".into() });
    let result = executor.execute(&cmd).await;
    assert!(result.success);
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::{Arc, Mutex as StdMutex};

use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use locker_core::command::{Command, CommandPayload, CommandStatus};

use crate::command_exec::CommandExecutor;
use crate::config::ModbusConfig;
use crate::heartbeat_loop::PollingCadence;
use crate::modbus::controller::{ModbusController, TransportFactory};
use crate::modbus::transport::MockSerialTransport;

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

async fn modbus_handle() -> ModbusController {
    let slot: Arc<StdMutex<Option<MockSerialTransport>>> = Arc::new(StdMutex::new(Some(MockSerialTransport::new(vec![]))));
    let factory: TransportFactory = Arc::new(move || {
        slot.lock().unwrap().take().map(|t| Box::new(t) as _).ok_or(crate::error::ModbusError::PortClosed)
    });
    ModbusController::spawn(factory, modbus_config(), CancellationToken::new()).await.unwrap()
}

fn pending_command() -> Command {
    Command {
        command_id: uuid::Uuid::new_v4(),
        kiosk_id: "kiosk-1".into(),
        payload: CommandPayload::Buzzer { pattern: "beep".into() },
        status: CommandStatus::Pending,
        retry_count: 0,
        max_retries: 3,
        next_attempt_at: chrono::Utc::now(),
        created_at: chrono::Utc::now(),
        completed_at: None,
        last_error: None,
    }
}

#[tokio::test]
async fn polled_commands_are_executed_and_reported_complete() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/commands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(vec![pending_command()]))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/commands"))
        .respond_with(ResponseTemplate::new(200).set_body_json(Vec::<Command>::new()))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/commands/complete"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "ok": true })))
        .mount(&server)
        .await;

    let gateway = Arc::new(GatewayClient::new(server.uri()));
    let executor = Arc::new(CommandExecutor::new("kiosk-1", GatewayClient::new(server.uri()), modbus_handle().await));
    let cadence = Arc::new(PollingCadence::new(10, 5));
    let shutdown = CancellationToken::new();

    spawn_poll_loop("kiosk-1".into(), Arc::clone(&gateway), executor, cadence, shutdown.clone());

    tokio::time::sleep(std::time::Duration::from_millis(80)).await;
    shutdown.cancel();

    let completions: Vec<_> = server
        .received_requests()
        .await
        .unwrap()
        .into_iter()
        .filter(|r| r.url.path() == "/commands/complete")
        .collect();
    assert!(!completions.is_empty());
}

#[tokio::test]
async fn clear_stale_on_startup_logs_and_does_not_panic_on_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/commands/clear-stale"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let gateway = GatewayClient::new(server.uri());
    clear_stale_on_startup("kiosk-1", &gateway).await;
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::{Arc, Mutex as StdMutex};

use tokio_util::sync::CancellationToken;

use locker_core::crc16::append_crc;

use crate::modbus::transport::{MockSerialTransport, MockStep};

use super::*;

fn test_config() -> ModbusConfig {
    ModbusConfig {
        port: "/dev/null".into(),
        baudrate: 9600,
        timeout_ms: 50,
        pulse_duration_ms: 1,
        burst_duration_seconds: 1,
        burst_interval_ms: 1,
        command_interval_ms: 1,
        max_retries: 0,
        retry_delay_base_ms: 1,
        retry_delay_max_ms: 2,
        connection_retry_attempts: 3,
        health_check_interval_ms: 60_000,
        queue_capacity: 16,
    }
}

fn framed(mut body: Vec<u8>) -> Vec<u8> {
    append_crc(&mut body);
    body
}

/// A factory that hands out a single pre-scripted mock transport once, then
/// fails (no reconnection is expected to occur within these tests).
fn one_shot_factory(steps: Vec<MockStep>) -> TransportFactory {
    let slot: Arc<StdMutex<Option<MockSerialTransport>>> =
        Arc::new(StdMutex::new(Some(MockSerialTransport::new(steps))));
    Arc::new(move || {
        slot.lock()
            .expect("lock")
            .take()
            .map(|t| Box::new(t) as Box<dyn SerialTransport>)
            .ok_or(ModbusError::PortClosed)
    })
}

#[tokio::test]
async fn open_locker_succeeds_on_the_first_pulse() {
    let factory = one_shot_factory(vec![
        MockStep::Ok(framed(vec![0x01, 0x05, 0x00, 0x00, 0xFF, 0x00])),
        MockStep::Ok(framed(vec![0x01, 0x05, 0x00, 0x00, 0x00, 0x00])),
    ]);
    let controller = ModbusController::spawn(factory, test_config(), CancellationToken::new())
        .await
        .expect("spawn");

    assert!(controller.open_locker(1).await);
    let health = controller.health().await;
    assert_eq!(health.total_commands, 2);
    assert_eq!(health.failed_commands, 0);
}

#[tokio::test]
async fn open_locker_falls_back_to_burst_and_succeeds_once_a_later_write_confirms() {
    // §8 scenario 4: fail the first two writes, succeed thereafter.
    let factory = one_shot_factory(vec![
        MockStep::Err(ModbusError::CrcMismatch), // pulse ON: fail #1
        MockStep::Err(ModbusError::CrcMismatch), // burst ON attempt #1: fail #2
        MockStep::Ok(framed(vec![0x01, 0x05, 0x00, 0x00, 0x00, 0x00])), // burst OFF after failed ON (ignored)
        MockStep::Ok(framed(vec![0x01, 0x05, 0x00, 0x00, 0xFF, 0x00])), // burst ON attempt #2: succeeds
        MockStep::Ok(framed(vec![0x01, 0x05, 0x00, 0x00, 0x00, 0x00])), // burst OFF after success
    ]);
    let controller = ModbusController::spawn(factory, test_config(), CancellationToken::new())
        .await
        .expect("spawn");

    assert!(controller.open_locker(1).await);
    let health = controller.health().await;
    assert_eq!(health.failed_commands, 2);
}

#[tokio::test]
async fn open_locker_reports_failure_when_the_whole_burst_window_fails() {
    let factory = one_shot_factory(vec![MockStep::Err(ModbusError::NoResponse); 64]);
    let mut config = test_config();
    config.burst_duration_seconds = 0;
    let controller = ModbusController::spawn(factory, config, CancellationToken::new())
        .await
        .expect("spawn");

    assert!(!controller.open_locker(1).await);
}

#[tokio::test]
async fn set_slave_address_sends_a_write_register_frame() {
    let factory = one_shot_factory(vec![MockStep::Ok(framed(vec![0x03, 0x06, 0x40, 0x00, 0x00, 0x07]))]);
    let controller = ModbusController::spawn(factory, test_config(), CancellationToken::new())
        .await
        .expect("spawn");

    assert!(controller.set_slave_address(3, 7).await);
}

#[tokio::test]
async fn broadcast_set_address_does_not_require_a_response_body() {
    let factory = one_shot_factory(vec![MockStep::Ok(Vec::new())]);
    let controller = ModbusController::spawn(factory, test_config(), CancellationToken::new())
        .await
        .expect("spawn");

    assert!(controller.broadcast_set_address(9).await);
}

#[tokio::test]
async fn read_register_parses_the_holding_register_value_from_the_response_body() {
    // byte_count=2, value=0x002A (42).
    let body = framed(vec![0x01, 0x03, 0x02, 0x00, 0x2A]);
    let factory = one_shot_factory(vec![MockStep::Ok(body)]);
    let controller = ModbusController::spawn(factory, test_config(), CancellationToken::new())
        .await
        .expect("spawn");

    let value = controller.read_register(1, 0x0000).await.expect("valid response");
    assert_eq!(value, 0x002A);
}

#[tokio::test]
async fn health_reports_zero_commands_before_any_operation() {
    let factory = one_shot_factory(vec![]);
    let controller = ModbusController::spawn(factory, test_config(), CancellationToken::new())
        .await
        .expect("spawn");

    let health = controller.health().await;
    assert_eq!(health.total_commands, 0);
    assert_eq!(health.status, HealthStatus::Ok);
}

#[tokio::test]
async fn spawn_fails_after_exhausting_connection_retry_attempts() {
    let always_fails: TransportFactory = Arc::new(|| Err(ModbusError::PortClosed));
    let mut config = test_config();
    config.connection_retry_attempts = 2;
    let result = ModbusController::spawn(always_fails, config, CancellationToken::new()).await;
    assert!(result.is_err());
}

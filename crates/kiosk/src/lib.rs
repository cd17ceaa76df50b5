// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The kiosk runtime: one process per physical locker bank. Owns the serial
//! relay bus, the RFID reader, and reports to the Gateway Coordination Core
//! over HTTP.

pub mod command_exec;
pub mod config;
pub mod error;
pub mod gateway_client;
pub mod heartbeat_loop;
pub mod modbus;
pub mod poll_loop;
pub mod rfid;
pub mod userflow;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::command_exec::CommandExecutor;
use crate::config::KioskConfig;
use crate::gateway_client::GatewayClient;
use crate::heartbeat_loop::{spawn_heartbeat_loop, PollingCadence, Telemetry};
use crate::modbus::controller::ModbusController;
use crate::modbus::transport::TokioSerialTransport;
use crate::poll_loop::{clear_stale_on_startup, spawn_poll_loop};
use crate::rfid::RfidPipeline;
use crate::userflow::{UiEvent, UserFlow};

const RFID_SWEEP_INTERVAL_MS: u64 = 50;

/// Run one kiosk process until `shutdown` is cancelled.
pub async fn run(config: KioskConfig, shutdown: CancellationToken) -> anyhow::Result<()> {
    let config_hash = config.config_hash();
    let gateway = GatewayClient::new(config.gateway_url.clone());

    let register = gateway
        .register(&config.kiosk_id, &config.zone, &config.version, &config.hardware_id, config.kiosk_size, &config_hash)
        .await?;
    tracing::info!(kiosk_id = %config.kiosk_id, "registered with gateway");

    clear_stale_on_startup(&config.kiosk_id, &gateway).await;

    let modbus_config = config.modbus.clone();
    let factory = Arc::new(move || -> Result<Box<dyn modbus::transport::SerialTransport>, error::ModbusError> {
        TokioSerialTransport::open(&modbus_config.port, modbus_config.baudrate).map(|t| Box::new(t) as _)
    });
    let modbus = ModbusController::spawn(factory, config.modbus.clone(), shutdown.clone()).await?;

    let cadence = Arc::new(PollingCadence::new(
        register.polling_config.heartbeat_interval_ms,
        register.polling_config.poll_interval_ms,
    ));

    spawn_heartbeat_loop(
        config.kiosk_id.clone(),
        config.version.clone(),
        config_hash,
        Arc::new(gateway.clone()),
        Arc::clone(&cadence),
        Arc::new(Telemetry::default),
        shutdown.clone(),
    );

    let executor = Arc::new(CommandExecutor::new(config.kiosk_id.clone(), gateway.clone(), modbus.clone()));
    spawn_poll_loop(config.kiosk_id.clone(), Arc::new(gateway.clone()), executor, cadence, shutdown.clone());

    let userflow = UserFlow::new(&config, gateway, modbus);
    spawn_rfid_loop(config, userflow, shutdown).await;

    Ok(())
}

/// Drives raw reader input through [`RfidPipeline`] and every completed scan
/// through [`UserFlow::on_card_scanned`] until shutdown (spec §4.2, §4.4).
async fn spawn_rfid_loop(config: KioskConfig, userflow: UserFlow, shutdown: CancellationToken) {
    let mut pipeline = RfidPipeline::new(format!("{}-reader-1", config.kiosk_id), &config.rfid);
    let mut sweep = tokio::time::interval(std::time::Duration::from_millis(RFID_SWEEP_INTERVAL_MS));
    sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    match config.rfid.reader_type.as_str() {
        "keyboard" => {
            use tokio::io::{AsyncBufReadExt, BufReader};
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sweep.tick() => {
                        if let Some(result) = pipeline.sweep_idle(chrono::Utc::now()) {
                            handle_scan_result(&userflow, result).await;
                        }
                    }
                    line = lines.next_line() => {
                        match line {
                            Ok(Some(line)) => {
                                let now = chrono::Utc::now();
                                for c in line.chars().chain(std::iter::once('\n')) {
                                    if let Some(result) = pipeline.on_char(c, now) {
                                        handle_scan_result(&userflow, result).await;
                                    }
                                }
                            }
                            Ok(None) => break,
                            Err(e) => {
                                tracing::warn!(err = %e, "keyboard-wedge stream read failed");
                                break;
                            }
                        }
                    }
                }
            }
        }
        _ => {
            let mut reports = rfid::device::spawn_hid_reader(&config.rfid, shutdown.clone());
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = sweep.tick() => {
                        if let Some(result) = pipeline.sweep_idle(chrono::Utc::now()) {
                            handle_scan_result(&userflow, result).await;
                        }
                    }
                    report = reports.recv() => {
                        match report {
                            Some(report) => {
                                if let Some(result) = pipeline.on_hid_report(&report, chrono::Utc::now()) {
                                    handle_scan_result(&userflow, result).await;
                                }
                            }
                            None => break,
                        }
                    }
                }
            }
        }
    }
}

async fn handle_scan_result(userflow: &UserFlow, result: rfid::ScanResult) {
    match result {
        rfid::ScanResult::Emitted(scan) => {
            let mut events = Vec::new();
            let outcome = userflow.on_card_scanned(&scan, &mut events).await;
            for event in &events {
                log_ui_event(event);
            }
            tracing::info!(card_id = %scan.card_id, outcome = ?outcome, "user-flow outcome");
        }
        rfid::ScanResult::Debounced { request_id } => {
            tracing::debug!(%request_id, "scan debounced");
        }
        rfid::ScanResult::Rejected { request_id, reason } => {
            tracing::info!(%request_id, reason = reason.as_str(), "scan rejected");
        }
    }
}

fn log_ui_event(event: &UiEvent) {
    match event {
        UiEvent::ShowAvailableLockers { lockers } => {
            tracing::info!(count = lockers.len(), "show_available_lockers");
        }
        UiEvent::LockerAssigned { locker_id } => tracing::info!(locker_id, "locker_assigned"),
        UiEvent::LockerOpening { locker_id } => tracing::info!(locker_id, "locker_opening"),
        UiEvent::LockerOpenedAndReleased { locker_id } => tracing::info!(locker_id, "locker_opened_and_released"),
        UiEvent::LockerOpenedAndOwned { locker_id } => tracing::info!(locker_id, "locker_opened_and_owned"),
        UiEvent::LockerOpenedVip { locker_id } => tracing::info!(locker_id, "locker_opened_vip"),
        UiEvent::LockerAutoAssignSuccess { locker_id } => tracing::info!(locker_id, "locker_auto_assign_success"),
        UiEvent::LockerAutoAssignFallback { reason } => tracing::info!(reason, "locker_auto_assign_fallback"),
    }
}

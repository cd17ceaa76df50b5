// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The single-writer Modbus controller: one worker task owns the serial
//! port, every caller enqueues through a bounded channel and awaits a result
//! (spec §4.1, §5 "Single-writer regions").

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use locker_core::backoff::Backoff;

use crate::config::ModbusConfig;
use crate::error::ModbusError;
use crate::modbus::frame::{
    decode_response, encode_read_holding, encode_write_coil, encode_write_register, locker_to_relay,
    BROADCAST_ADDRESS, SOFTWARE_ADDRESS_REGISTER,
};
use crate::modbus::health::{HealthReport, HealthTracker};
use crate::modbus::transport::SerialTransport;

/// Builds (or rebuilds, on reconnect) the boxed transport. A plain function
/// pointer would do for the real `tokio-serial` path, but tests need to hand
/// in a closure that returns a fresh `MockSerialTransport` per call.
pub type TransportFactory = Arc<dyn Fn() -> Result<Box<dyn SerialTransport>, ModbusError> + Send + Sync>;

enum WorkerRequest {
    OpenLocker { locker_id: i64, reply: oneshot::Sender<bool> },
    SetSlaveAddress { current: u8, new: u8, reply: oneshot::Sender<bool> },
    BroadcastSetAddress { new: u8, reply: oneshot::Sender<bool> },
    ReadRegister { slave: u8, register: u16, reply: oneshot::Sender<Result<u16, ModbusError>> },
    Health { reply: oneshot::Sender<HealthReport> },
}

/// Handle callers use to drive the bus. Cloning is cheap; every clone shares
/// the same single-writer worker.
#[derive(Clone)]
pub struct ModbusController {
    tx: mpsc::Sender<WorkerRequest>,
}

impl ModbusController {
    /// Open the port (retrying up to `connection_retry_attempts` times with
    /// backoff) and spawn the worker that owns it for the rest of the
    /// process's life.
    pub async fn spawn(
        factory: TransportFactory,
        config: ModbusConfig,
        shutdown: CancellationToken,
    ) -> Result<Self, ModbusError> {
        let transport = connect_with_retries(&factory, &config).await?;
        let (tx, rx) = mpsc::channel(config.queue_capacity);
        tokio::spawn(run_worker(transport, factory, config, rx, shutdown));
        Ok(Self { tx })
    }

    async fn call<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> WorkerRequest,
    ) -> Result<T, ModbusError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .try_send(build(reply_tx))
            .map_err(|_| ModbusError::QueueFull)?;
        reply_rx.await.map_err(|_| ModbusError::PortClosed)
    }

    /// Pulse the relay for `locker_id`, falling back to a burst sequence on
    /// failure (spec §4.1 "Pulse protocol", "Burst fallback").
    pub async fn open_locker(&self, locker_id: i64) -> bool {
        self.call(|reply| WorkerRequest::OpenLocker { locker_id, reply }).await.unwrap_or(false)
    }

    pub async fn set_slave_address(&self, current: u8, new: u8) -> bool {
        self.call(|reply| WorkerRequest::SetSlaveAddress { current, new, reply }).await.unwrap_or(false)
    }

    pub async fn broadcast_set_address(&self, new: u8) -> bool {
        self.call(|reply| WorkerRequest::BroadcastSetAddress { new, reply }).await.unwrap_or(false)
    }

    pub async fn read_register(&self, slave: u8, register: u16) -> Result<u16, ModbusError> {
        self.call(|reply| WorkerRequest::ReadRegister { slave, register, reply })
            .await?
    }

    pub async fn health(&self) -> HealthReport {
        self.call(|reply| WorkerRequest::Health { reply })
            .await
            .unwrap_or_else(|_| HealthTracker::new().report())
    }
}

async fn connect_with_retries(
    factory: &TransportFactory,
    config: &ModbusConfig,
) -> Result<Box<dyn SerialTransport>, ModbusError> {
    let mut backoff = Backoff::new(config.retry_delay_base(), config.retry_delay_max());
    let mut last_err = ModbusError::PortClosed;
    for attempt in 0..config.connection_retry_attempts {
        match factory() {
            Ok(transport) => return Ok(transport),
            Err(e) => {
                last_err = e;
                if attempt + 1 < config.connection_retry_attempts {
                    tokio::time::sleep(backoff.next_delay()).await;
                }
            }
        }
    }
    Err(last_err)
}

async fn run_worker(
    mut transport: Box<dyn SerialTransport>,
    factory: TransportFactory,
    config: ModbusConfig,
    mut rx: mpsc::Receiver<WorkerRequest>,
    shutdown: CancellationToken,
) {
    let mut tracker = HealthTracker::new();
    let mut health_tick = tokio::time::interval(config.health_check_interval());
    health_tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            _ = health_tick.tick() => {
                if !transport.is_open() {
                    tracker.mark_disconnected();
                    if let Ok(fresh) = connect_with_retries(&factory, &config).await {
                        transport = fresh;
                        tracker.mark_reconnected();
                        tracing::info!("modbus reconnected");
                    } else {
                        tracing::warn!("modbus reconnection_failed");
                    }
                }
            }
            Some(req) = rx.recv() => {
                handle_request(req, transport.as_mut(), &config, &mut tracker).await;
            }
        }
    }
}

async fn handle_request(
    req: WorkerRequest,
    transport: &mut dyn SerialTransport,
    config: &ModbusConfig,
    tracker: &mut HealthTracker,
) {
    match req {
        WorkerRequest::OpenLocker { locker_id, reply } => {
            let ok = open_locker_sequence(transport, config, tracker, locker_id).await;
            let _ = reply.send(ok);
        }
        WorkerRequest::SetSlaveAddress { current, new, reply } => {
            let frame = encode_write_register(current, SOFTWARE_ADDRESS_REGISTER, new as u16);
            let ok = exchange_with_retry(transport, config, tracker, &frame, current, true).await.is_ok();
            let _ = reply.send(ok);
        }
        WorkerRequest::BroadcastSetAddress { new, reply } => {
            let frame = encode_write_register(BROADCAST_ADDRESS, SOFTWARE_ADDRESS_REGISTER, new as u16);
            let ok = exchange_with_retry(transport, config, tracker, &frame, BROADCAST_ADDRESS, false)
                .await
                .is_ok();
            let _ = reply.send(ok);
        }
        WorkerRequest::ReadRegister { slave, register, reply } => {
            let frame = encode_read_holding(slave, register, 1);
            let result = exchange_with_retry(transport, config, tracker, &frame, slave, true).await.and_then(
                |resp| match decode_response(&resp) {
                    Ok(decoded) if decoded.body.len() >= 3 => {
                        Ok(u16::from_be_bytes([decoded.body[1], decoded.body[2]]))
                    }
                    Ok(_) => Err(ModbusError::NoResponse),
                    Err(e) => Err(e),
                },
            );
            let _ = reply.send(result);
        }
        WorkerRequest::Health { reply } => {
            let _ = reply.send(tracker.report());
        }
    }
}

/// One retried frame exchange (spec §4.1 "Retry & backoff"). `expect_response`
/// is `false` for broadcast writes, which draw no reply by design.
async fn exchange_with_retry(
    transport: &mut dyn SerialTransport,
    config: &ModbusConfig,
    tracker: &mut HealthTracker,
    frame: &[u8],
    channel_for_stats: u8,
    expect_response: bool,
) -> Result<Vec<u8>, ModbusError> {
    let mut backoff = Backoff::new(config.retry_delay_base(), config.retry_delay_max());
    let mut last_err = ModbusError::NoResponse;

    for attempt in 0..=config.max_retries {
        let outcome = if expect_response {
            transport.send_receive(frame, config.timeout()).await
        } else {
            transport.send_only(frame).await.map(|_| Vec::new())
        };

        match outcome {
            Ok(resp) => {
                tracker.record_command(channel_for_stats, true, None, Utc::now());
                tokio::time::sleep(config.command_interval()).await;
                return Ok(resp);
            }
            Err(e) => {
                tracker.record_command(channel_for_stats, false, Some(e.to_string()), Utc::now());
                if matches!(e, ModbusError::PortClosed) {
                    tracker.record_connection_error(e.to_string());
                }
                last_err = e;
                if attempt < config.max_retries {
                    tracker.record_retry();
                    tokio::time::sleep(backoff.next_delay()).await;
                }
            }
        }
    }
    tokio::time::sleep(config.command_interval()).await;
    Err(last_err)
}

/// Pulse ON, hold `pulse_duration_ms`, pulse OFF; on failure, fall back to a
/// burst of ON/OFF pairs for up to `burst_duration_seconds` (spec §4.1).
async fn open_locker_sequence(
    transport: &mut dyn SerialTransport,
    config: &ModbusConfig,
    tracker: &mut HealthTracker,
    locker_id: i64,
) -> bool {
    let (slave, channel) = locker_to_relay(locker_id);

    if pulse_once(transport, config, tracker, slave, channel).await {
        return true;
    }

    burst_fallback(transport, config, tracker, slave, channel).await
}

async fn pulse_once(
    transport: &mut dyn SerialTransport,
    config: &ModbusConfig,
    tracker: &mut HealthTracker,
    slave: u8,
    channel: u8,
) -> bool {
    let on_frame = encode_write_coil(slave, channel, true);
    if exchange_with_retry(transport, config, tracker, &on_frame, channel, true).await.is_err() {
        return false;
    }
    tokio::time::sleep(config.pulse_duration()).await;
    let off_frame = encode_write_coil(slave, channel, false);
    exchange_with_retry(transport, config, tracker, &off_frame, channel, true).await.is_ok()
}

async fn burst_fallback(
    transport: &mut dyn SerialTransport,
    config: &ModbusConfig,
    tracker: &mut HealthTracker,
    slave: u8,
    channel: u8,
) -> bool {
    let deadline = tokio::time::Instant::now() + config.burst_duration();
    let on_frame = encode_write_coil(slave, channel, true);
    let off_frame = encode_write_coil(slave, channel, false);

    while tokio::time::Instant::now() < deadline {
        if exchange_with_retry(transport, config, tracker, &on_frame, channel, true).await.is_ok() {
            let _ = exchange_with_retry(transport, config, tracker, &off_frame, channel, true).await;
            return true;
        }
        let _ = exchange_with_retry(transport, config, tracker, &off_frame, channel, true).await;
        tokio::time::sleep(config.burst_interval()).await;
    }
    false
}

#[cfg(test)]
#[path = "controller_tests.rs"]
mod tests;

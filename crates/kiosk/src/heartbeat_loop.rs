// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Heartbeat/telemetry loop (spec §4.6), modeled on the gateway's own
//! select-on-shutdown-or-tick sweepers. The cadence is re-tuned on every
//! response per the gateway's returned `polling_config`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use locker_core::kiosk::{HeartbeatReport, KioskStatus};

use crate::gateway_client::GatewayClient;

/// Shared, dynamically re-tuned poll cadences (spec §4.6 "honors returned
/// polling config for dynamic tuning").
pub struct PollingCadence {
    pub heartbeat_interval_ms: AtomicU64,
    pub poll_interval_ms: AtomicU64,
}

impl PollingCadence {
    pub fn new(heartbeat_interval_ms: u64, poll_interval_ms: u64) -> Self {
        Self {
            heartbeat_interval_ms: AtomicU64::new(heartbeat_interval_ms),
            poll_interval_ms: AtomicU64::new(poll_interval_ms),
        }
    }

    fn apply(&self, heartbeat_interval_ms: u64, poll_interval_ms: u64) {
        self.heartbeat_interval_ms.store(heartbeat_interval_ms, Ordering::Relaxed);
        self.poll_interval_ms.store(poll_interval_ms, Ordering::Relaxed);
    }
}

/// One telemetry sample (spec §4.6 heartbeat body). The caller supplies
/// whatever host/process telemetry it can read; all fields beyond identity
/// are best-effort and optional on the wire.
#[derive(Debug, Clone, Default)]
pub struct Telemetry {
    pub voltage: Option<f64>,
    pub temperature: Option<f64>,
    pub uptime_seconds: i64,
    pub memory_usage: Option<f64>,
    pub disk_space: Option<f64>,
    pub last_error: Option<String>,
}

pub fn spawn_heartbeat_loop(
    kiosk_id: String,
    version: String,
    config_hash: String,
    gateway: Arc<GatewayClient>,
    cadence: Arc<PollingCadence>,
    telemetry: Arc<dyn Fn() -> Telemetry + Send + Sync>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let interval = std::time::Duration::from_millis(cadence.heartbeat_interval_ms.load(Ordering::Relaxed));
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let sample = telemetry();
            let report = HeartbeatReport {
                kiosk_id: kiosk_id.clone(),
                version: version.clone(),
                config_hash: config_hash.clone(),
                status: KioskStatus::Online,
                voltage: sample.voltage,
                temperature: sample.temperature,
                uptime_seconds: sample.uptime_seconds,
                memory_usage: sample.memory_usage,
                disk_space: sample.disk_space,
                last_error: sample.last_error,
            };

            match gateway.heartbeat(&report).await {
                Ok(resp) => {
                    cadence.apply(resp.polling_config.heartbeat_interval_ms, resp.polling_config.poll_interval_ms);
                    if resp.config_drift {
                        tracing::warn!(kiosk_id = %kiosk_id, "gateway reports config drift");
                    }
                }
                Err(e) => tracing::warn!(kiosk_id = %kiosk_id, err = %e, "heartbeat failed"),
            }
        }
    });
}

#[cfg(test)]
#[path = "heartbeat_loop_tests.rs"]
mod tests;

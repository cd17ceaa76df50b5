// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Command poll loop (spec §4.5): fetch pending commands, execute each
//! in FIFO order, report the outcome back to the gateway.

use std::sync::atomic::Ordering;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::command_exec::CommandExecutor;
use crate::gateway_client::GatewayClient;
use crate::heartbeat_loop::PollingCadence;

const POLL_BATCH_LIMIT: i64 = 10;

pub fn spawn_poll_loop(
    kiosk_id: String,
    gateway: Arc<GatewayClient>,
    executor: Arc<CommandExecutor>,
    cadence: Arc<PollingCadence>,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        loop {
            let interval = std::time::Duration::from_millis(cadence.poll_interval_ms.load(Ordering::Relaxed));
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = tokio::time::sleep(interval) => {}
            }

            let commands = match gateway.poll_commands(&kiosk_id, POLL_BATCH_LIMIT).await {
                Ok(commands) => commands,
                Err(e) => {
                    tracing::debug!(kiosk_id = %kiosk_id, err = %e, "command poll failed");
                    continue;
                }
            };

            for command in &commands {
                tracing::info!(
                    kiosk_id = %kiosk_id,
                    command_id = %command.command_id,
                    command_type = command.payload.command_type(),
                    "executing command"
                );
                let result = executor.execute(command).await;
                if let Err(e) = gateway.complete_command(&result).await {
                    tracing::warn!(kiosk_id = %kiosk_id, command_id = %command.command_id, err = %e, "failed to report command completion");
                }
            }
        }
    });
}

/// `POST /commands/clear-stale` (spec §4.5 "Clear-on-reconnect"): called once
/// on kiosk first contact after startup.
pub async fn clear_stale_on_startup(kiosk_id: &str, gateway: &GatewayClient) {
    match gateway.clear_stale(kiosk_id).await {
        Ok(resp) if resp.cleared_count > 0 => {
            tracing::info!(kiosk_id, cleared = resp.cleared_count, "cleared stale commands from prior session");
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(kiosk_id, err = %e, "failed to clear stale commands"),
    }
}

#[cfg(test)]
#[path = "poll_loop_tests.rs"]
mod tests;

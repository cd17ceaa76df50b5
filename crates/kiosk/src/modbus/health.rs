// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Health accounting for the Modbus controller (spec §4.1 "Health status
//! rule", "Per-channel statistics").

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::Serialize;

const ERROR_RATE_WINDOW: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Ok,
    Degraded,
    Error,
    Disconnected,
}

/// Snapshot returned by `ModbusController::health()`.
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub total_commands: u64,
    pub failed_commands: u64,
    pub error_rate_percent: f64,
    pub connection_errors: u64,
    pub last_error: Option<String>,
    pub uptime_seconds: u64,
    pub retry_attempts: u64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ChannelStats {
    pub total_operations: u64,
    pub failure_count: u64,
    pub last_operation_at: Option<DateTime<Utc>>,
}

/// Rolling-window error accounting plus per-channel diagnostics. Owned
/// exclusively by the controller's single worker task.
pub struct HealthTracker {
    started_at: Instant,
    window: VecDeque<bool>,
    total_commands: u64,
    failed_commands: u64,
    connection_errors: u64,
    retry_attempts: u64,
    last_error: Option<String>,
    disconnected: bool,
    channels: HashMap<u8, ChannelStats>,
}

impl HealthTracker {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            window: VecDeque::with_capacity(ERROR_RATE_WINDOW),
            total_commands: 0,
            failed_commands: 0,
            connection_errors: 0,
            retry_attempts: 0,
            last_error: None,
            disconnected: false,
            channels: HashMap::new(),
        }
    }

    pub fn record_command(&mut self, channel: u8, success: bool, error: Option<String>, now: DateTime<Utc>) {
        self.total_commands += 1;
        if !success {
            self.failed_commands += 1;
            self.last_error = error;
        }
        if self.window.len() == ERROR_RATE_WINDOW {
            self.window.pop_front();
        }
        self.window.push_back(!success);

        let stats = self.channels.entry(channel).or_default();
        stats.total_operations += 1;
        if !success {
            stats.failure_count += 1;
        }
        stats.last_operation_at = Some(now);
    }

    pub fn record_retry(&mut self) {
        self.retry_attempts += 1;
    }

    pub fn record_connection_error(&mut self, error: impl Into<String>) {
        self.connection_errors += 1;
        self.last_error = Some(error.into());
    }

    pub fn mark_disconnected(&mut self) {
        self.disconnected = true;
    }

    pub fn mark_reconnected(&mut self) {
        self.disconnected = false;
    }

    fn error_rate_percent(&self) -> f64 {
        if self.window.is_empty() {
            return 0.0;
        }
        let failures = self.window.iter().filter(|f| **f).count();
        (failures as f64 / self.window.len() as f64) * 100.0
    }

    pub fn channel_stats(&self) -> &HashMap<u8, ChannelStats> {
        &self.channels
    }

    pub fn report(&self) -> HealthReport {
        let error_rate_percent = self.error_rate_percent();
        let status = if self.disconnected {
            HealthStatus::Disconnected
        } else if error_rate_percent >= 50.0 {
            HealthStatus::Error
        } else if error_rate_percent >= 10.0 {
            HealthStatus::Degraded
        } else {
            HealthStatus::Ok
        };

        HealthReport {
            status,
            total_commands: self.total_commands,
            failed_commands: self.failed_commands,
            error_rate_percent,
            connection_errors: self.connection_errors,
            last_error: self.last_error.clone(),
            uptime_seconds: self.started_at.elapsed().as_secs(),
            retry_attempts: self.retry_attempts,
        }
    }
}

impl Default for HealthTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[path = "health_tests.rs"]
mod tests;

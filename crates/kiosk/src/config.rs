// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use locker_core::uid::UidPolicy;

/// Modbus serial controller tunables (spec §4.1, §6.5).
#[derive(Debug, Clone, clap::Args)]
pub struct ModbusConfig {
    #[arg(long = "modbus-port", default_value = "/dev/ttyUSB0", env = "KIOSK_MODBUS_PORT")]
    pub port: String,

    #[arg(long = "modbus-baudrate", default_value_t = 9600, env = "KIOSK_MODBUS_BAUDRATE")]
    pub baudrate: u32,

    #[arg(long = "modbus-timeout-ms", default_value_t = 1000, env = "KIOSK_MODBUS_TIMEOUT_MS")]
    pub timeout_ms: u64,

    #[arg(long = "modbus-pulse-duration-ms", default_value_t = 400, env = "KIOSK_MODBUS_PULSE_DURATION_MS")]
    pub pulse_duration_ms: u64,

    #[arg(long = "modbus-burst-duration-seconds", default_value_t = 10, env = "KIOSK_MODBUS_BURST_DURATION_SECONDS")]
    pub burst_duration_seconds: u64,

    #[arg(long = "modbus-burst-interval-ms", default_value_t = 2000, env = "KIOSK_MODBUS_BURST_INTERVAL_MS")]
    pub burst_interval_ms: u64,

    #[arg(long = "modbus-command-interval-ms", default_value_t = 300, env = "KIOSK_MODBUS_COMMAND_INTERVAL_MS")]
    pub command_interval_ms: u64,

    #[arg(long = "modbus-max-retries", default_value_t = 3, env = "KIOSK_MODBUS_MAX_RETRIES")]
    pub max_retries: u32,

    #[arg(long = "modbus-retry-delay-base-ms", default_value_t = 100, env = "KIOSK_MODBUS_RETRY_DELAY_BASE_MS")]
    pub retry_delay_base_ms: u64,

    #[arg(long = "modbus-retry-delay-max-ms", default_value_t = 2000, env = "KIOSK_MODBUS_RETRY_DELAY_MAX_MS")]
    pub retry_delay_max_ms: u64,

    #[arg(long = "modbus-connection-retry-attempts", default_value_t = 5, env = "KIOSK_MODBUS_CONNECTION_RETRY_ATTEMPTS")]
    pub connection_retry_attempts: u32,

    #[arg(long = "modbus-health-check-interval-ms", default_value_t = 30_000, env = "KIOSK_MODBUS_HEALTH_CHECK_INTERVAL_MS")]
    pub health_check_interval_ms: u64,

    /// Depth of the bounded single-writer command queue (spec §5 "Queue bounds").
    #[arg(long = "modbus-queue-capacity", default_value_t = 256, env = "KIOSK_MODBUS_QUEUE_CAPACITY")]
    pub queue_capacity: usize,
}

impl ModbusConfig {
    pub fn timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.timeout_ms)
    }

    pub fn pulse_duration(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.pulse_duration_ms)
    }

    pub fn burst_duration(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.burst_duration_seconds)
    }

    pub fn burst_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.burst_interval_ms)
    }

    pub fn command_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.command_interval_ms)
    }

    pub fn retry_delay_base(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_delay_base_ms)
    }

    pub fn retry_delay_max(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.retry_delay_max_ms)
    }

    pub fn health_check_interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.health_check_interval_ms)
    }
}

/// RFID handler tunables (spec §4.2, §6.5).
#[derive(Debug, Clone, clap::Args)]
pub struct RfidConfig {
    /// `hid` reads raw USB HID reports; `keyboard` reads a line-oriented wedge stream.
    #[arg(long = "rfid-reader-type", default_value = "hid", env = "KIOSK_RFID_READER_TYPE")]
    pub reader_type: String,

    #[arg(long = "rfid-debounce-ms", default_value_t = 500, env = "KIOSK_RFID_DEBOUNCE_MS")]
    pub debounce_ms: u64,

    /// Enforces the 8-digit confirmation-window minimum; disabling falls back
    /// to the legacy 6-digit silent-drop rule (see `SPEC_FULL.md` §4 Open
    /// Questions: pinned `true` as the shipped default).
    #[arg(long = "rfid-strict-min-length", default_value_t = true, env = "KIOSK_RFID_STRICT_MIN_LENGTH")]
    pub strict_min_length: bool,

    #[arg(long = "rfid-min-significant-length", default_value_t = 8, env = "KIOSK_RFID_MIN_SIGNIFICANT_LENGTH")]
    pub min_significant_length: usize,

    #[arg(long = "rfid-legacy-min-significant-length", default_value_t = 6, env = "KIOSK_RFID_LEGACY_MIN_SIGNIFICANT_LENGTH")]
    pub legacy_min_significant_length: usize,

    #[arg(long = "rfid-confirmation-window-ms", default_value_t = 4000, env = "KIOSK_RFID_CONFIRMATION_WINDOW_MS")]
    pub confirmation_window_ms: u64,

    #[arg(long = "rfid-confirmation-reads-required", default_value_t = 1, env = "KIOSK_RFID_CONFIRMATION_READS_REQUIRED")]
    pub confirmation_reads_required: u32,

    #[arg(long = "rfid-hid-idle-finalization-ms", default_value_t = 75, env = "KIOSK_RFID_HID_IDLE_FINALIZATION_MS")]
    pub hid_idle_finalization_ms: u64,

    #[arg(long = "rfid-keyboard-inactivity-timeout-ms", default_value_t = 1000, env = "KIOSK_RFID_KEYBOARD_INACTIVITY_TIMEOUT_MS")]
    pub keyboard_inactivity_timeout_ms: u64,

    /// USB vendor ID of the HID reader, hex without a `0x` prefix (e.g. `ffff`). Ignored in keyboard mode.
    #[arg(long = "rfid-hid-vendor-id", default_value = "0000", env = "KIOSK_RFID_HID_VENDOR_ID")]
    pub hid_vendor_id: String,

    /// USB product ID of the HID reader, hex without a `0x` prefix.
    #[arg(long = "rfid-hid-product-id", default_value = "0000", env = "KIOSK_RFID_HID_PRODUCT_ID")]
    pub hid_product_id: String,
}

impl RfidConfig {
    pub fn uid_policy(&self) -> UidPolicy {
        UidPolicy {
            strict: self.strict_min_length,
            min_significant_length: self.min_significant_length,
            legacy_min_significant_length: self.legacy_min_significant_length,
            confirmation_window: chrono::Duration::milliseconds(self.confirmation_window_ms as i64),
            confirmation_reads_required: self.confirmation_reads_required,
        }
    }

    pub fn debounce(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.debounce_ms)
    }

    pub fn hid_idle_finalization(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.hid_idle_finalization_ms)
    }

    pub fn keyboard_inactivity_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.keyboard_inactivity_timeout_ms)
    }

    /// Parses `hid_vendor_id`/`hid_product_id`; falls back to `0x0000` (hidapi's
    /// "match any" wildcard) on malformed input rather than failing startup.
    pub fn hid_ids(&self) -> (u16, u16) {
        let vid = u16::from_str_radix(&self.hid_vendor_id, 16).unwrap_or(0);
        let pid = u16::from_str_radix(&self.hid_product_id, 16).unwrap_or(0);
        (vid, pid)
    }
}

/// Top-level configuration for one kiosk runtime process (spec §6.5).
#[derive(Debug, Clone, clap::Parser)]
pub struct KioskConfig {
    /// This kiosk's fleet-unique identity.
    #[arg(long, env = "KIOSK_ID")]
    pub kiosk_id: String,

    #[arg(long, default_value = "default", env = "KIOSK_ZONE")]
    pub zone: String,

    #[arg(long, default_value = env!("CARGO_PKG_VERSION"), env = "KIOSK_VERSION")]
    pub version: String,

    #[arg(long, env = "KIOSK_HARDWARE_ID")]
    pub hardware_id: String,

    /// Number of lockers this kiosk's relay bank controls.
    #[arg(long, default_value_t = 16, env = "KIOSK_SIZE")]
    pub kiosk_size: i64,

    /// `manual` presents a choice set; `automatic` assigns via the
    /// recent-holder/oldest-available rule (spec §4.4).
    #[arg(long = "kiosk-assignment-mode", default_value = "manual", env = "KIOSK_ASSIGNMENT_MODE")]
    pub assignment_mode: String,

    #[arg(long = "kiosk-recent-holder-min-hours", default_value_t = 4, env = "KIOSK_RECENT_HOLDER_MIN_HOURS")]
    pub recent_holder_min_hours: i64,

    #[arg(long = "kiosk-max-available-lockers-display", default_value_t = 12, env = "KIOSK_MAX_AVAILABLE_LOCKERS_DISPLAY")]
    pub max_available_lockers_display: usize,

    /// Base URL of the Gateway Coordination Core (e.g. `http://localhost:8900`).
    #[arg(long = "gateway-url", env = "KIOSK_GATEWAY_URL")]
    pub gateway_url: String,

    /// Bearer token sent on any route the gateway treats as `/admin/*`; unused
    /// on the kiosk-facing surface this runtime actually calls.
    #[arg(long = "gateway-admin-token", env = "KIOSK_GATEWAY_ADMIN_TOKEN")]
    pub gateway_admin_token: Option<String>,

    /// Initial heartbeat cadence; overridden by the gateway's `polling_config`
    /// on every register/heartbeat response (spec §4.6).
    #[arg(long, default_value_t = 10_000, env = "KIOSK_HEARTBEAT_INTERVAL_MS")]
    pub heartbeat_interval_ms: u64,

    #[arg(long, default_value_t = 2_000, env = "KIOSK_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    #[command(flatten)]
    pub modbus: ModbusConfig,

    #[command(flatten)]
    pub rfid: RfidConfig,
}

impl KioskConfig {
    pub fn assignment_mode(&self) -> AssignmentMode {
        match self.assignment_mode.as_str() {
            "automatic" => AssignmentMode::Automatic,
            _ => AssignmentMode::Manual,
        }
    }

    /// SHA-256 of the serialized effective config, compared by the gateway
    /// against the last-known `Kiosk.config_hash` to detect drift.
    pub fn config_hash(&self) -> String {
        let serialized = serde_json::json!({
            "kiosk_id": self.kiosk_id,
            "zone": self.zone,
            "version": self.version,
            "kiosk_size": self.kiosk_size,
            "assignment_mode": self.assignment_mode,
            "recent_holder_min_hours": self.recent_holder_min_hours,
            "max_available_lockers_display": self.max_available_lockers_display,
            "modbus_port": self.modbus.port,
            "modbus_baudrate": self.modbus.baudrate,
            "rfid_reader_type": self.rfid.reader_type,
            "rfid_strict_min_length": self.rfid.strict_min_length,
        })
        .to_string();
        locker_core::kiosk::config_hash(&serialized)
    }
}

/// User-flow choice policy (spec §4.4, §6.5 `kiosk.assignment_mode`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssignmentMode {
    Manual,
    Automatic,
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;

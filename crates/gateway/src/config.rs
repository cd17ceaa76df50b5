// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

/// Configuration for the locker gateway coordination core.
#[derive(Debug, Clone, clap::Parser)]
pub struct GatewayConfig {
    /// Host to bind on.
    #[arg(long, default_value = "127.0.0.1", env = "GATEWAY_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(long, default_value_t = 8900, env = "GATEWAY_PORT")]
    pub port: u16,

    /// SQLite database URL (e.g. `sqlite://gateway.db`).
    #[arg(long, default_value = "sqlite://gateway.db", env = "GATEWAY_DATABASE_URL")]
    pub database_url: String,

    /// Reservation time-to-live before the reaper frees a Reserved locker (§4.3).
    #[arg(long, default_value_t = 90, env = "GATEWAY_RESERVATION_TTL_SECONDS")]
    pub reservation_ttl_seconds: u64,

    /// Kiosk heartbeat staleness threshold before it is marked offline (§4.6).
    #[arg(long, default_value_t = 60, env = "GATEWAY_OFFLINE_THRESHOLD_SECONDS")]
    pub offline_threshold_seconds: u64,

    /// Heartbeat cadence communicated to kiosks via `polling_config`.
    #[arg(long, default_value_t = 10_000, env = "GATEWAY_HEARTBEAT_INTERVAL_MS")]
    pub heartbeat_interval_ms: u64,

    /// Command-poll cadence communicated to kiosks via `polling_config`.
    #[arg(long, default_value_t = 2_000, env = "GATEWAY_POLL_INTERVAL_MS")]
    pub poll_interval_ms: u64,

    /// Default max_retries assigned to newly enqueued commands.
    #[arg(long, default_value_t = 3, env = "GATEWAY_COMMAND_MAX_RETRIES")]
    pub command_max_retries: u32,

    /// Base delay for command-retry backoff (same family as the Modbus retry policy).
    #[arg(long, default_value_t = 1_000, env = "GATEWAY_COMMAND_RETRY_DELAY_BASE_MS")]
    pub command_retry_delay_base_ms: u64,

    /// Cap for command-retry backoff.
    #[arg(long, default_value_t = 30_000, env = "GATEWAY_COMMAND_RETRY_DELAY_MAX_MS")]
    pub command_retry_delay_max_ms: u64,

    /// Commands older than this, still pending, are failed on `/commands/clear-stale`.
    #[arg(long, default_value_t = 3600, env = "GATEWAY_STALE_THRESHOLD_SECONDS")]
    pub stale_threshold_seconds: u64,

    /// IP rate-limit bucket capacity, tokens per minute.
    #[arg(long, default_value_t = 30, env = "GATEWAY_RATE_LIMIT_IP_PER_MIN")]
    pub rate_limit_ip_per_min: u32,

    /// Card rate-limit bucket capacity, tokens per minute.
    #[arg(long, default_value_t = 60, env = "GATEWAY_RATE_LIMIT_CARD_PER_MIN")]
    pub rate_limit_card_per_min: u32,

    /// Locker rate-limit bucket capacity, tokens per minute.
    #[arg(long, default_value_t = 6, env = "GATEWAY_RATE_LIMIT_LOCKER_PER_MIN")]
    pub rate_limit_locker_per_min: u32,

    /// Device rate-limit bucket capacity, tokens per 20 seconds.
    #[arg(long, default_value_t = 1, env = "GATEWAY_RATE_LIMIT_DEVICE_PER_20S")]
    pub rate_limit_device_per_20s: u32,

    /// Bearer token admin callers must present. If unset, admin auth is disabled.
    #[arg(long, env = "GATEWAY_ADMIN_TOKEN")]
    pub admin_token: Option<String>,
}

impl GatewayConfig {
    pub fn reservation_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.reservation_ttl_seconds as i64)
    }

    pub fn offline_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.offline_threshold_seconds as i64)
    }

    pub fn stale_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.stale_threshold_seconds as i64)
    }

    pub fn rate_limit_settings(&self) -> locker_core::ratelimit::RateLimitSettings {
        locker_core::ratelimit::RateLimitSettings {
            ip_per_min: self.rate_limit_ip_per_min,
            card_per_min: self.rate_limit_card_per_min,
            locker_per_min: self.rate_limit_locker_per_min,
            device_per_20s: self.rate_limit_device_per_20s,
        }
    }
}

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use sqlx::SqlitePool;
use tokio_util::sync::CancellationToken;

use locker_core::ratelimit::RateLimiter;

use crate::config::GatewayConfig;
use crate::queue::dispatcher::CommandDispatcher;
use crate::store::event_log::EventLog;
use crate::store::kiosk_store::KioskStore;
use crate::store::locker_store::LockerStore;

/// Shared gateway state, constructed once at boot and handed to the router.
pub struct GatewayState {
    pub config: GatewayConfig,
    pub pool: SqlitePool,
    pub lockers: LockerStore,
    pub kiosks: KioskStore,
    pub events: EventLog,
    pub commands: CommandDispatcher,
    pub rate_limiter: RateLimiter,
    pub shutdown: CancellationToken,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, pool: SqlitePool, shutdown: CancellationToken) -> Self {
        let rate_limiter = RateLimiter::new(config.rate_limit_settings());
        Self {
            lockers: LockerStore::new(pool.clone()),
            kiosks: KioskStore::new(pool.clone()),
            events: EventLog::new(pool.clone()),
            commands: CommandDispatcher::new(pool.clone(), config.command_max_retries)
                .with_backoff(config.command_retry_delay_base_ms, config.command_retry_delay_max_ms),
            rate_limiter,
            pool,
            config,
            shutdown,
        }
    }
}

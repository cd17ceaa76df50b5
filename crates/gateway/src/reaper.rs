// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background sweepers: reservation-expiry and offline-kiosk detection
//! (spec §4.3, §4.6), modeled on the upstream health-checker's
//! select-on-shutdown-or-tick loop.

use std::sync::Arc;

use locker_core::event::{EventType, NewEvent};
use locker_core::kiosk::KioskStatus;

use crate::state::GatewayState;

/// Frees any Reserved locker whose TTL has elapsed, every tick.
pub fn spawn_reservation_reaper(state: Arc<GatewayState>) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(10));
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            match state.lockers.reap_expired_reservations(state.config.reservation_ttl()).await {
                Ok(0) => {}
                Ok(count) => tracing::info!(count, "reaped expired reservations"),
                Err(e) => tracing::warn!(err = %e, "reservation reaper failed"),
            }
        }
    });
}

/// Marks kiosks offline once their heartbeat has outlived the offline
/// threshold, emitting a `kiosk_offline` audit event per kiosk.
pub fn spawn_offline_sweeper(state: Arc<GatewayState>) {
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(std::time::Duration::from_secs(30));
        timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = state.shutdown.cancelled() => break,
                _ = timer.tick() => {}
            }

            let stale = match state
                .kiosks
                .find_newly_stale(state.config.offline_threshold(), chrono::Utc::now())
                .await
            {
                Ok(stale) => stale,
                Err(e) => {
                    tracing::warn!(err = %e, "offline sweep query failed");
                    continue;
                }
            };

            for kiosk in stale {
                if let Err(e) = state.kiosks.mark_status(&kiosk.kiosk_id, KioskStatus::Offline).await {
                    tracing::warn!(kiosk_id = %kiosk.kiosk_id, err = %e, "failed to mark kiosk offline");
                    continue;
                }
                tracing::warn!(kiosk_id = %kiosk.kiosk_id, "kiosk marked offline");

                let mut tx = match state.pool.begin().await {
                    Ok(tx) => tx,
                    Err(e) => {
                        tracing::warn!(err = %e, "failed to open transaction for kiosk_offline event");
                        continue;
                    }
                };
                let event = NewEvent::new(&kiosk.kiosk_id, EventType::KioskOffline);
                if crate::store::event_log::insert_event_tx(&mut tx, &event).await.is_ok() {
                    tx.commit().await.ok();
                }
            }
        }
    });
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;

// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The authoritative, transactional locker state store (spec §4.3). Every
//! mutation runs inside one `sqlx` transaction: a single-row `UPDATE ...
//! WHERE kiosk_id = ? AND locker_id = ? AND status = '<expected>'`, checked
//! via `rows_affected()`, write the paired Event, commit. No mutation holds
//! the transaction open across external I/O.
//!
//! This guards every precondition the state machine actually has (§3's
//! transitions are all expressed as `status -> status`) with test-and-set
//! semantics keyed on `status` rather than on `version`: a concurrent writer
//! that changed the row's status between this caller's read and its write
//! makes the predicate match zero rows, exactly as a `version`-keyed CAS
//! would. `version` itself is still stored and monotonically incremented on
//! every mutation for audit/debugging, but no caller threads an
//! `expected_version` through the public API, so it does not catch a
//! "quiet" round-trip through the same status between a read and a write
//! (e.g. block then unblock back to Free). No §3/§8 invariant depends on
//! detecting that case; see DESIGN.md's Open Questions for the record of
//! this deliberate substitution.

use chrono::{DateTime, Utc};
use serde_json::json;
use sqlx::{Row, SqlitePool};

use locker_core::event::{EventType, NewEvent};
use locker_core::locker::{Locker, LockerStatus, OwnerType, RecentRelease};

use crate::store::event_log::insert_event_tx;

pub struct LockerStore {
    pool: SqlitePool,
}

impl LockerStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Bulk-create Free lockers `1..=count` for a kiosk at provisioning time.
    /// Idempotent: existing rows are left untouched.
    pub async fn init_kiosk_lockers(&self, kiosk_id: &str, count: i64) -> anyhow::Result<()> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;
        for locker_id in 1..=count {
            sqlx::query(
                "INSERT OR IGNORE INTO lockers
                 (kiosk_id, locker_id, status, is_vip, version, created_at, updated_at)
                 VALUES (?, ?, 'free', 0, 0, ?, ?)",
            )
            .bind(kiosk_id)
            .bind(locker_id)
            .bind(&now)
            .bind(&now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    pub async fn get_locker(&self, kiosk_id: &str, locker_id: i64) -> anyhow::Result<Option<Locker>> {
        let row = sqlx::query(
            "SELECT kiosk_id, locker_id, status, owner_type, owner_key, is_vip, display_name,
                    reserved_at, owned_at, version, created_at, updated_at
             FROM lockers WHERE kiosk_id = ? AND locker_id = ?",
        )
        .bind(kiosk_id)
        .bind(locker_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_locker(&r)).transpose()
    }

    /// `zone`, when given, narrows this kiosk's own Free lockers down to
    /// that zone; it never broadens the search to other kiosks.
    pub async fn list_available(
        &self,
        kiosk_id: &str,
        zone: Option<&str>,
    ) -> anyhow::Result<Vec<Locker>> {
        let rows = if let Some(zone) = zone {
            sqlx::query(
                "SELECT l.kiosk_id, l.locker_id, l.status, l.owner_type, l.owner_key, l.is_vip,
                        l.display_name, l.reserved_at, l.owned_at, l.version, l.created_at, l.updated_at
                 FROM lockers l
                 JOIN kiosk_heartbeat k ON k.kiosk_id = l.kiosk_id
                 WHERE l.status = 'free' AND l.kiosk_id = ? AND k.zone = ?
                 ORDER BY l.updated_at ASC, l.locker_id ASC",
            )
            .bind(kiosk_id)
            .bind(zone)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT kiosk_id, locker_id, status, owner_type, owner_key, is_vip, display_name,
                        reserved_at, owned_at, version, created_at, updated_at
                 FROM lockers WHERE kiosk_id = ? AND status = 'free'
                 ORDER BY updated_at ASC, locker_id ASC",
            )
            .bind(kiosk_id)
            .fetch_all(&self.pool)
            .await?
        };
        rows.iter().map(row_to_locker).collect()
    }

    /// Full per-kiosk snapshot (`GET /lockers?kiosk_id=K`), every status.
    pub async fn list_all(&self, kiosk_id: &str) -> anyhow::Result<Vec<Locker>> {
        let rows = sqlx::query(
            "SELECT kiosk_id, locker_id, status, owner_type, owner_key, is_vip, display_name,
                    reserved_at, owned_at, version, created_at, updated_at
             FROM lockers WHERE kiosk_id = ? ORDER BY locker_id ASC",
        )
        .bind(kiosk_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_locker).collect()
    }

    /// I1 enforcement at read time: the unique partial index guarantees at
    /// most one row matches.
    pub async fn find_owner(
        &self,
        owner_type: OwnerType,
        owner_key: &str,
    ) -> anyhow::Result<Option<Locker>> {
        let row = sqlx::query(
            "SELECT kiosk_id, locker_id, status, owner_type, owner_key, is_vip, display_name,
                    reserved_at, owned_at, version, created_at, updated_at
             FROM lockers
             WHERE owner_type = ? AND owner_key = ? AND status IN ('reserved', 'owned')
             LIMIT 1",
        )
        .bind(owner_type.as_str())
        .bind(owner_key)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_locker(&r)).transpose()
    }

    /// Free -> Reserved. Returns `false` on precondition failure or on I1
    /// contention (the unique partial index rejects a second concurrent owner).
    pub async fn assign(
        &self,
        kiosk_id: &str,
        locker_id: i64,
        owner_type: OwnerType,
        owner_key: &str,
    ) -> anyhow::Result<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE lockers SET status = 'reserved', owner_type = ?, owner_key = ?,
                    reserved_at = ?, version = version + 1, updated_at = ?
             WHERE kiosk_id = ? AND locker_id = ? AND status = 'free'",
        )
        .bind(owner_type.as_str())
        .bind(owner_key)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(kiosk_id)
        .bind(locker_id)
        .execute(&mut *tx)
        .await;

        let affected = match result {
            Ok(r) => r.rows_affected(),
            Err(sqlx::Error::Database(ref e)) if e.is_unique_violation() => {
                tx.rollback().await.ok();
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };

        if affected != 1 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        let event = NewEvent::new(kiosk_id, EventType::RfidAssign)
            .with_locker(locker_id)
            .with_details(json!({ "owner_type": owner_type.as_str(), "owner_key": owner_key }));
        let event = stamp_owner(event, owner_type, owner_key);
        insert_event_tx(&mut tx, &event).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Reserved -> Owned.
    pub async fn confirm(&self, kiosk_id: &str, locker_id: i64) -> anyhow::Result<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE lockers SET status = 'owned', owned_at = ?, version = version + 1, updated_at = ?
             WHERE kiosk_id = ? AND locker_id = ? AND status = 'reserved'",
        )
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .bind(kiosk_id)
        .bind(locker_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        tx.commit().await?;
        Ok(true)
    }

    /// {Reserved|Owned} -> Free. If `expected_owner` is given it must match
    /// the current `owner_key`, or the release is rejected.
    pub async fn release(
        &self,
        kiosk_id: &str,
        locker_id: i64,
        expected_owner: Option<&str>,
        reason: ReleaseReason,
    ) -> anyhow::Result<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(
            "SELECT owner_type, owner_key, owned_at FROM lockers
             WHERE kiosk_id = ? AND locker_id = ? AND status IN ('reserved', 'owned')",
        )
        .bind(kiosk_id)
        .bind(locker_id)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(existing) = existing else {
            tx.rollback().await.ok();
            return Ok(false);
        };
        let owner_key: Option<String> = existing.try_get("owner_key")?;
        let owner_type: Option<String> = existing.try_get("owner_type")?;
        let owned_at: Option<String> = existing.try_get("owned_at")?;

        if let (Some(expected), Some(ref actual)) = (expected_owner, &owner_key) {
            if expected != actual {
                tx.rollback().await.ok();
                return Ok(false);
            }
        }

        let result = sqlx::query(
            "UPDATE lockers SET status = 'free', owner_type = NULL, owner_key = NULL,
                    reserved_at = NULL, owned_at = NULL, version = version + 1, updated_at = ?
             WHERE kiosk_id = ? AND locker_id = ? AND status IN ('reserved', 'owned')",
        )
        .bind(now.to_rfc3339())
        .bind(kiosk_id)
        .bind(locker_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        let held_duration_hours = owned_at
            .as_deref()
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|owned_at| (now - owned_at.with_timezone(&Utc)).num_seconds() as f64 / 3600.0);

        let mut details = json!({ "reason": reason.as_str() });
        if let Some(hours) = held_duration_hours {
            details["held_duration_hours"] = json!(hours);
        }

        let mut event = NewEvent::new(kiosk_id, EventType::RfidRelease)
            .with_locker(locker_id)
            .with_details(details);
        if let Some(OwnerType::Rfid) = owner_type.as_deref().and_then(OwnerType::parse) {
            if let Some(ref key) = owner_key {
                event = event.with_rfid_card(key.clone());
            }
        }
        insert_event_tx(&mut tx, &event).await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn block(
        &self,
        kiosk_id: &str,
        locker_id: i64,
        staff_user: &str,
        reason: &str,
    ) -> anyhow::Result<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE lockers SET status = 'blocked', owner_type = NULL, owner_key = NULL,
                    reserved_at = NULL, owned_at = NULL, version = version + 1, updated_at = ?
             WHERE kiosk_id = ? AND locker_id = ? AND status != 'blocked'",
        )
        .bind(now.to_rfc3339())
        .bind(kiosk_id)
        .bind(locker_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        let event = NewEvent::new(kiosk_id, EventType::LockerBlocked)
            .with_locker(locker_id)
            .with_staff_user(staff_user)
            .with_details(json!({ "reason": reason }));
        insert_event_tx(&mut tx, &event).await?;

        tx.commit().await?;
        Ok(true)
    }

    pub async fn unblock(&self, kiosk_id: &str, locker_id: i64, staff_user: &str) -> anyhow::Result<bool> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE lockers SET status = 'free', version = version + 1, updated_at = ?
             WHERE kiosk_id = ? AND locker_id = ? AND status = 'blocked'",
        )
        .bind(now.to_rfc3339())
        .bind(kiosk_id)
        .bind(locker_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        let event = NewEvent::new(kiosk_id, EventType::LockerUnblocked)
            .with_locker(locker_id)
            .with_staff_user(staff_user);
        insert_event_tx(&mut tx, &event).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Emergency override (§9: "block supersedes all non-Blocked states,
    /// discarding ownership"). Only Free and Blocked are valid override
    /// targets — overriding directly into Reserved/Owned would require an
    /// owner this call doesn't carry, so it is rejected.
    pub async fn force_transition(
        &self,
        kiosk_id: &str,
        locker_id: i64,
        new_status: LockerStatus,
        staff_user: &str,
        reason: &str,
    ) -> anyhow::Result<bool> {
        if !matches!(new_status, LockerStatus::Free | LockerStatus::Blocked) {
            return Ok(false);
        }

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            "UPDATE lockers SET status = ?, owner_type = NULL, owner_key = NULL,
                    reserved_at = NULL, owned_at = NULL, version = version + 1, updated_at = ?
             WHERE kiosk_id = ? AND locker_id = ?",
        )
        .bind(new_status.as_str())
        .bind(now.to_rfc3339())
        .bind(kiosk_id)
        .bind(locker_id)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() != 1 {
            tx.rollback().await.ok();
            return Ok(false);
        }

        let event = NewEvent::new(kiosk_id, EventType::LockerForceTransition)
            .with_locker(locker_id)
            .with_staff_user(staff_user)
            .with_details(json!({ "new_status": new_status.as_str(), "reason": reason, "override": true }));
        insert_event_tx(&mut tx, &event).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// P7: sweep Reserved rows whose TTL has elapsed. Runs every 10s per §4.3.
    pub async fn reap_expired_reservations(&self, ttl: chrono::Duration) -> anyhow::Result<u64> {
        let now = Utc::now();
        let cutoff = now - ttl;

        let candidates = sqlx::query(
            "SELECT kiosk_id, locker_id FROM lockers WHERE status = 'reserved' AND reserved_at <= ?",
        )
        .bind(cutoff.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        let mut reaped = 0u64;
        for row in candidates {
            let kiosk_id: String = row.try_get("kiosk_id")?;
            let locker_id: i64 = row.try_get("locker_id")?;
            if self.release(&kiosk_id, locker_id, None, ReleaseReason::ReservationTimeout).await? {
                reaped += 1;
            }
        }
        Ok(reaped)
    }

    /// Oldest-`updated_at`-first Free locker from the candidate set
    /// (`get_oldest_available`, §4.4 automatic-assignment path).
    pub async fn get_oldest_available(
        &self,
        kiosk_id: &str,
        allowed_ids: Option<&[i64]>,
        zone: Option<&str>,
    ) -> anyhow::Result<Option<Locker>> {
        let candidates = self.list_available(kiosk_id, zone).await?;
        let winner = candidates
            .into_iter()
            .filter(|l| match allowed_ids {
                Some(ids) => ids.contains(&l.locker_id),
                None => true,
            })
            .min_by(|a, b| a.updated_at.cmp(&b.updated_at).then(a.locker_id.cmp(&b.locker_id)));
        Ok(winner)
    }

    /// The "recent holder" rule (§4.4): most recent non-VIP release for this
    /// card within `lookback_hours`, read back from the release Event's details.
    pub async fn get_recent_release_for_card(
        &self,
        kiosk_id: &str,
        card_id: &str,
        lookback_hours: i64,
    ) -> anyhow::Result<Option<RecentRelease>> {
        let cutoff = Utc::now() - chrono::Duration::hours(lookback_hours);
        let row = sqlx::query(
            "SELECT locker_id, timestamp, details_json FROM events
             WHERE kiosk_id = ? AND event_type = 'rfid_release' AND rfid_card = ? AND timestamp >= ?
             ORDER BY timestamp DESC LIMIT 1",
        )
        .bind(kiosk_id)
        .bind(card_id)
        .bind(cutoff.to_rfc3339())
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else { return Ok(None) };
        let locker_id: Option<i64> = row.try_get("locker_id")?;
        let Some(locker_id) = locker_id else { return Ok(None) };
        let timestamp_str: String = row.try_get("timestamp")?;
        let details_str: String = row.try_get("details_json")?;
        let released_at = DateTime::parse_from_rfc3339(&timestamp_str)?.with_timezone(&Utc);
        let details: serde_json::Value = serde_json::from_str(&details_str).unwrap_or_default();
        let held_duration_hours = details.get("held_duration_hours").and_then(|v| v.as_f64()).unwrap_or(0.0);

        Ok(Some(RecentRelease { locker_id, released_at, held_duration_hours }))
    }
}

/// Why a release happened, recorded in the Event's `details_json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReleaseReason {
    UserRelease,
    ReservationTimeout,
    StaffEmergency,
}

impl ReleaseReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::UserRelease => "user_release",
            Self::ReservationTimeout => "timeout",
            Self::StaffEmergency => "staff_emergency",
        }
    }
}

fn stamp_owner(event: NewEvent, owner_type: OwnerType, owner_key: &str) -> NewEvent {
    if owner_type == OwnerType::Rfid {
        event.with_rfid_card(owner_key)
    } else {
        event
    }
}

fn row_to_locker(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Locker> {
    let status_str: String = row.try_get("status")?;
    let owner_type_str: Option<String> = row.try_get("owner_type")?;
    let reserved_at_str: Option<String> = row.try_get("reserved_at")?;
    let owned_at_str: Option<String> = row.try_get("owned_at")?;
    let created_at_str: String = row.try_get("created_at")?;
    let updated_at_str: String = row.try_get("updated_at")?;
    let is_vip: i64 = row.try_get("is_vip")?;

    Ok(Locker {
        kiosk_id: row.try_get("kiosk_id")?,
        locker_id: row.try_get("locker_id")?,
        status: LockerStatus::parse(&status_str)
            .ok_or_else(|| anyhow::anyhow!("unknown locker status {status_str}"))?,
        owner_type: owner_type_str.as_deref().and_then(OwnerType::parse),
        owner_key: row.try_get("owner_key")?,
        is_vip: is_vip != 0,
        display_name: row.try_get("display_name")?,
        reserved_at: parse_rfc3339(reserved_at_str)?,
        owned_at: parse_rfc3339(owned_at_str)?,
        version: row.try_get("version")?,
        created_at: DateTime::parse_from_rfc3339(&created_at_str)?.with_timezone(&Utc),
        updated_at: DateTime::parse_from_rfc3339(&updated_at_str)?.with_timezone(&Utc),
    })
}

fn parse_rfc3339(value: Option<String>) -> anyhow::Result<Option<DateTime<Utc>>> {
    value.map(|s| Ok(DateTime::parse_from_rfc3339(&s)?.with_timezone(&Utc))).transpose()
}

#[cfg(test)]
#[path = "locker_store_tests.rs"]
mod tests;

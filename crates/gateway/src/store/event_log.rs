// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only event journal (spec §4.8). Writes happen inline, inside the
//! same transaction as the state change they record (§4.3); this module's
//! `EventLog` is the read-only query surface used by `/admin/events`.

use chrono::{DateTime, Utc};
use sqlx::{Row, Sqlite, SqlitePool, Transaction};

use locker_core::event::{Event, EventType, NewEvent};

/// Insert one event row inside an already-open transaction. Called by the
/// locker store and command dispatcher as the last step of every mutation.
pub async fn insert_event_tx(
    tx: &mut Transaction<'_, Sqlite>,
    event: &NewEvent,
) -> anyhow::Result<()> {
    let now = Utc::now();
    sqlx::query(
        "INSERT INTO events (timestamp, kiosk_id, locker_id, event_type, rfid_card, device_id, staff_user, details_json)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(now.to_rfc3339())
    .bind(&event.kiosk_id)
    .bind(event.locker_id)
    .bind(event.event_type.as_str())
    .bind(&event.rfid_card)
    .bind(&event.device_id)
    .bind(&event.staff_user)
    .bind(event.details.to_string())
    .execute(&mut **tx)
    .await?;
    Ok(())
}

/// Filters for the admin event-query surface (§4.8: "by kiosk, by staff user,
/// by event type, by time range").
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub kiosk_id: Option<String>,
    pub staff_user: Option<String>,
    pub event_type: Option<EventType>,
    pub since: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub limit: i64,
}

impl EventFilter {
    pub fn new() -> Self {
        Self { limit: 100, ..Default::default() }
    }
}

pub struct EventLog {
    pool: SqlitePool,
}

impl EventLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record one event outside of a state-changing mutation's own
    /// transaction (spec §4.9: `rate_limit_violation` has no accompanying
    /// locker/command state change to ride along with).
    pub async fn record_standalone(&self, event: &NewEvent) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        insert_event_tx(&mut tx, event).await?;
        tx.commit().await?;
        Ok(())
    }

    pub async fn query(&self, filter: &EventFilter) -> anyhow::Result<Vec<Event>> {
        let mut sql = String::from(
            "SELECT id, timestamp, kiosk_id, locker_id, event_type, rfid_card, device_id, staff_user, details_json FROM events WHERE 1=1",
        );
        if filter.kiosk_id.is_some() {
            sql.push_str(" AND kiosk_id = ?");
        }
        if filter.staff_user.is_some() {
            sql.push_str(" AND staff_user = ?");
        }
        if filter.event_type.is_some() {
            sql.push_str(" AND event_type = ?");
        }
        if filter.since.is_some() {
            sql.push_str(" AND timestamp >= ?");
        }
        if filter.until.is_some() {
            sql.push_str(" AND timestamp <= ?");
        }
        sql.push_str(" ORDER BY timestamp DESC, id DESC LIMIT ?");

        let mut query = sqlx::query(&sql);
        if let Some(ref kiosk_id) = filter.kiosk_id {
            query = query.bind(kiosk_id);
        }
        if let Some(ref staff_user) = filter.staff_user {
            query = query.bind(staff_user);
        }
        if let Some(event_type) = filter.event_type {
            query = query.bind(event_type.as_str());
        }
        if let Some(since) = filter.since {
            query = query.bind(since.to_rfc3339());
        }
        if let Some(until) = filter.until {
            query = query.bind(until.to_rfc3339());
        }
        query = query.bind(filter.limit);

        let rows = query.fetch_all(&self.pool).await?;
        rows.iter().map(row_to_event).collect()
    }
}

fn row_to_event(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Event> {
    let event_type_str: String = row.try_get("event_type")?;
    let timestamp_str: String = row.try_get("timestamp")?;
    let details_str: String = row.try_get("details_json")?;

    Ok(Event {
        id: row.try_get("id")?,
        timestamp: DateTime::parse_from_rfc3339(&timestamp_str)?.with_timezone(&Utc),
        kiosk_id: row.try_get("kiosk_id")?,
        locker_id: row.try_get("locker_id")?,
        event_type: parse_event_type(&event_type_str)
            .ok_or_else(|| anyhow::anyhow!("unknown event_type {event_type_str}"))?,
        rfid_card: row.try_get("rfid_card")?,
        device_id: row.try_get("device_id")?,
        staff_user: row.try_get("staff_user")?,
        details: serde_json::from_str(&details_str).unwrap_or(serde_json::Value::Null),
    })
}

fn parse_event_type(s: &str) -> Option<EventType> {
    Some(match s {
        "rfid_assign" => EventType::RfidAssign,
        "rfid_release" => EventType::RfidRelease,
        "staff_open" => EventType::StaffOpen,
        "bulk_open" => EventType::BulkOpen,
        "restarted" => EventType::Restarted,
        "command_enqueued" => EventType::CommandEnqueued,
        "command_completed" => EventType::CommandCompleted,
        "command_failed" => EventType::CommandFailed,
        "rate_limit_violation" => EventType::RateLimitViolation,
        "locker_blocked" => EventType::LockerBlocked,
        "locker_unblocked" => EventType::LockerUnblocked,
        "locker_force_transition" => EventType::LockerForceTransition,
        "kiosk_online" => EventType::KioskOnline,
        "kiosk_offline" => EventType::KioskOffline,
        _ => return None,
    })
}

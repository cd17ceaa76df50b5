// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence for the `kiosk_heartbeat` table (spec §4.6, §6.4).

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use locker_core::kiosk::{HeartbeatReport, Kiosk, KioskStatus};

pub struct KioskStore {
    pool: SqlitePool,
}

impl KioskStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Registers a kiosk on first contact, or is a no-op if it already
    /// exists. Returns the row as it now stands.
    pub async fn provision(
        &self,
        kiosk_id: &str,
        zone: &str,
        kiosk_size: i64,
        hardware_id: &str,
        config_hash: &str,
    ) -> anyhow::Result<Kiosk> {
        let now = Utc::now();
        sqlx::query(
            "INSERT INTO kiosk_heartbeat
             (kiosk_id, zone, kiosk_size, hardware_id, config_hash, version, status, created_at)
             VALUES (?, ?, ?, ?, ?, '', 'offline', ?)
             ON CONFLICT(kiosk_id) DO NOTHING",
        )
        .bind(kiosk_id)
        .bind(zone)
        .bind(kiosk_size)
        .bind(hardware_id)
        .bind(config_hash)
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await?;

        self.get(kiosk_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("kiosk {kiosk_id} missing immediately after provisioning"))
    }

    pub async fn get(&self, kiosk_id: &str) -> anyhow::Result<Option<Kiosk>> {
        let row = sqlx::query(
            "SELECT kiosk_id, zone, kiosk_size, hardware_id, config_hash, version, status, last_seen,
                    voltage, temperature, uptime_seconds, memory_usage, disk_space, last_error, created_at
             FROM kiosk_heartbeat WHERE kiosk_id = ?",
        )
        .bind(kiosk_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| row_to_kiosk(&r)).transpose()
    }

    pub async fn list(&self) -> anyhow::Result<Vec<Kiosk>> {
        let rows = sqlx::query(
            "SELECT kiosk_id, zone, kiosk_size, hardware_id, config_hash, version, status, last_seen,
                    voltage, temperature, uptime_seconds, memory_usage, disk_space, last_error, created_at
             FROM kiosk_heartbeat ORDER BY kiosk_id ASC",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(row_to_kiosk).collect()
    }

    /// Applies a heartbeat report, marking the kiosk online and stamping
    /// `last_seen`. Returns whether the reported `config_hash` differs from
    /// what the gateway has on file for it (drift, spec §4.6).
    pub async fn apply_heartbeat(&self, report: &HeartbeatReport) -> anyhow::Result<bool> {
        let previous = self.get(&report.kiosk_id).await?;
        let drifted = previous.as_ref().is_some_and(|k| k.config_hash != report.config_hash);
        let now = Utc::now();

        sqlx::query(
            "UPDATE kiosk_heartbeat SET
                version = ?, config_hash = ?, status = ?, last_seen = ?,
                voltage = ?, temperature = ?, uptime_seconds = ?, memory_usage = ?,
                disk_space = ?, last_error = ?
             WHERE kiosk_id = ?",
        )
        .bind(&report.version)
        .bind(&report.config_hash)
        .bind(report.status.as_str())
        .bind(now.to_rfc3339())
        .bind(report.voltage)
        .bind(report.temperature)
        .bind(report.uptime_seconds)
        .bind(report.memory_usage)
        .bind(report.disk_space)
        .bind(&report.last_error)
        .bind(&report.kiosk_id)
        .execute(&self.pool)
        .await?;

        Ok(drifted)
    }

    pub async fn mark_status(&self, kiosk_id: &str, status: KioskStatus) -> anyhow::Result<bool> {
        let result = sqlx::query("UPDATE kiosk_heartbeat SET status = ? WHERE kiosk_id = ?")
            .bind(status.as_str())
            .bind(kiosk_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Kiosks currently marked online whose `last_seen` has outlived
    /// `offline_threshold` (spec §4.6's offline sweep).
    pub async fn find_newly_stale(
        &self,
        offline_threshold: chrono::Duration,
        now: DateTime<Utc>,
    ) -> anyhow::Result<Vec<Kiosk>> {
        let all = self.list().await?;
        Ok(all
            .into_iter()
            .filter(|k| k.status == KioskStatus::Online && k.is_stale(offline_threshold, now))
            .collect())
    }
}

fn row_to_kiosk(row: &sqlx::sqlite::SqliteRow) -> anyhow::Result<Kiosk> {
    let last_seen: Option<String> = row.try_get("last_seen")?;
    let created_at: String = row.try_get("created_at")?;
    let status: String = row.try_get("status")?;

    Ok(Kiosk {
        kiosk_id: row.try_get("kiosk_id")?,
        zone: row.try_get("zone")?,
        kiosk_size: row.try_get("kiosk_size")?,
        hardware_id: row.try_get("hardware_id")?,
        config_hash: row.try_get("config_hash")?,
        status: KioskStatus::parse(&status)
            .ok_or_else(|| anyhow::anyhow!("unknown kiosk status {status}"))?,
        last_seen: last_seen
            .map(|s| DateTime::parse_from_rfc3339(&s).map(|d| d.with_timezone(&Utc)))
            .transpose()?,
        version: row.try_get("version")?,
        voltage: row.try_get("voltage")?,
        temperature: row.try_get("temperature")?,
        uptime_seconds: row.try_get("uptime_seconds")?,
        memory_usage: row.try_get("memory_usage")?,
        disk_space: row.try_get("disk_space")?,
        last_error: row.try_get("last_error")?,
        created_at: DateTime::parse_from_rfc3339(&created_at)?.with_timezone(&Utc),
    })
}

#[cfg(test)]
#[path = "kiosk_store_tests.rs"]
mod tests;

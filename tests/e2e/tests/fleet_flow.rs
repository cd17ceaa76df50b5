// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scenarios that spawn the real `locker-gateway` binary and
//! drive it over HTTP through the same RPC surface a kiosk process uses.

use std::time::Duration;

use locker_core::locker::OwnerType;

use locker_e2e::{register_kiosk, GatewayProcess};

const TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::test]
async fn registering_a_kiosk_provisions_its_lockers_free() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start().await?;
    let kiosk = register_kiosk(&gateway, "gym-main", "gym", 12).await?;

    let lockers = kiosk.client.lockers_snapshot(&kiosk.kiosk_id).await?;
    assert_eq!(lockers.len(), 12);
    assert!(lockers.iter().all(|l| matches!(l.status, locker_core::locker::LockerStatus::Free)));

    Ok(())
}

#[tokio::test]
async fn a_card_assigns_confirms_and_releases_a_locker() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start().await?;
    let kiosk = register_kiosk(&gateway, "gym-main", "gym", 10).await?;

    let assigned = kiosk.client.assign(&kiosk.kiosk_id, 3, OwnerType::Rfid, "card-a").await?;
    assert!(assigned);

    let owned = kiosk.client.find_owner(OwnerType::Rfid, "card-a").await?.expect("owner found");
    assert_eq!(owned.locker_id, 3);
    assert!(matches!(owned.status, locker_core::locker::LockerStatus::Reserved));

    let confirmed = kiosk.client.confirm(&kiosk.kiosk_id, 3).await?;
    assert!(confirmed);

    let owned = kiosk.client.find_owner(OwnerType::Rfid, "card-a").await?.expect("owner found");
    assert!(matches!(owned.status, locker_core::locker::LockerStatus::Owned));

    let released = kiosk.client.release(&kiosk.kiosk_id, 3, Some("card-a"), Some(OwnerType::Rfid)).await?;
    assert!(released);

    let gone = kiosk.client.find_owner(OwnerType::Rfid, "card-a").await?;
    assert!(gone.is_none());

    Ok(())
}

#[tokio::test]
async fn assigning_an_already_held_locker_is_reported_as_contention_not_an_error() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start().await?;
    let kiosk = register_kiosk(&gateway, "gym-main", "gym", 5).await?;

    assert!(kiosk.client.assign(&kiosk.kiosk_id, 1, OwnerType::Rfid, "card-a").await?);
    let second = kiosk.client.assign(&kiosk.kiosk_id, 1, OwnerType::Rfid, "card-b").await?;
    assert!(!second);

    Ok(())
}

#[tokio::test]
async fn a_release_then_recent_holder_lookup_finds_the_prior_card() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start().await?;
    let kiosk = register_kiosk(&gateway, "gym-main", "gym", 5).await?;

    assert!(kiosk.client.assign(&kiosk.kiosk_id, 2, OwnerType::Rfid, "card-a").await?);
    assert!(kiosk.client.confirm(&kiosk.kiosk_id, 2).await?);
    assert!(kiosk.client.release(&kiosk.kiosk_id, 2, Some("card-a"), Some(OwnerType::Rfid)).await?);

    let recent = kiosk.client.recent_release(&kiosk.kiosk_id, "card-a", 24).await?;
    let recent = recent.expect("recent release recorded");
    assert_eq!(recent.locker_id, 2);

    Ok(())
}

#[tokio::test]
async fn oldest_available_falls_back_when_no_recent_holder_exists() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start().await?;
    let kiosk = register_kiosk(&gateway, "gym-main", "gym", 5).await?;

    let recent = kiosk.client.recent_release(&kiosk.kiosk_id, "card-never-seen", 24).await?;
    assert!(recent.is_none());

    let oldest = kiosk.client.oldest_available(&kiosk.kiosk_id, None, None).await?;
    assert!(oldest.is_some());

    Ok(())
}

#[tokio::test]
async fn an_admin_bulk_open_command_is_polled_and_reported_complete() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start().await?;
    let kiosk = register_kiosk(&gateway, "gym-main", "gym", 5).await?;

    let http = reqwest::Client::new();
    let resp = http
        .post(format!("{}/admin/lockers/bulk-open", gateway.base_url()))
        .json(&serde_json::json!({
            "kiosk_id": kiosk.kiosk_id,
            "locker_ids": [1, 2, 3],
            "staff_user": "staff-1",
            "reason": "drill",
            "exclude_vip": false,
        }))
        .send()
        .await?;
    assert!(resp.status().is_success());

    let commands = kiosk.client.poll_commands(&kiosk.kiosk_id, 10).await?;
    assert_eq!(commands.len(), 1);
    let command = &commands[0];
    assert_eq!(command.payload.command_type(), "bulk_open");

    let result = locker_core::command::CommandResult { command_id: command.command_id, success: true, error: None };
    kiosk.client.complete_command(&result).await?;

    let remaining = kiosk.client.poll_commands(&kiosk.kiosk_id, 10).await?;
    assert!(remaining.is_empty());

    Ok(())
}

#[tokio::test]
async fn clear_stale_on_reconnect_fails_long_pending_commands() -> anyhow::Result<()> {
    let gateway = GatewayProcess::start().await?;
    let kiosk = register_kiosk(&gateway, "gym-main", "gym", 5).await?;

    let http = reqwest::Client::new();
    http.post(format!("{}/admin/lockers/{}/open", gateway.base_url(), 1))
        .query(&[("kiosk_id", kiosk.kiosk_id.as_str())])
        .json(&serde_json::json!({ "staff_user": "staff-1", "reason": "test" }))
        .send()
        .await?
        .error_for_status()?;

    // The command is freshly enqueued, well under the stale threshold: a
    // reconnect right now must not touch it.
    let cleared = kiosk.client.clear_stale(&kiosk.kiosk_id).await?;
    assert_eq!(cleared.cleared_count, 0);

    let pending = kiosk.client.poll_commands(&kiosk.kiosk_id, 10).await?;
    assert_eq!(pending.len(), 1);

    Ok(())
}

#[tokio::test]
async fn locker_level_rate_limiting_rejects_a_burst_of_assign_attempts() -> anyhow::Result<()> {
    let gateway = GatewayProcess::build().rate_limit_locker_per_min(2).spawn().await?;
    let kiosk = register_kiosk(&gateway, "gym-main", "gym", 5).await?;

    assert!(kiosk.client.assign(&kiosk.kiosk_id, 1, OwnerType::Rfid, "card-a").await?);
    // Locker 1 is already taken, so this second call would fail assignment
    // anyway, but it still consumes the locker bucket's second token.
    let _ = kiosk.client.assign(&kiosk.kiosk_id, 1, OwnerType::Rfid, "card-b").await;

    // Third attempt within the same minute: the per-locker bucket (capacity
    // 2) is exhausted, so the gateway rejects before even touching the store.
    let err = kiosk.client.assign(&kiosk.kiosk_id, 1, OwnerType::Rfid, "card-c").await.unwrap_err();
    match err {
        kiosk::error::GatewayClientError::Status { status, .. } => assert_eq!(status, 429),
        other => panic!("expected a 429 status error, got {other:?}"),
    }

    Ok(())
}

#[tokio::test]
async fn a_reservation_left_unconfirmed_past_its_ttl_is_freed_by_the_reaper() -> anyhow::Result<()> {
    let gateway = GatewayProcess::build().reservation_ttl_seconds(1).spawn().await?;
    let kiosk = register_kiosk(&gateway, "gym-main", "gym", 5).await?;

    assert!(kiosk.client.assign(&kiosk.kiosk_id, 4, OwnerType::Rfid, "card-a").await?);

    let deadline = tokio::time::Instant::now() + TIMEOUT;
    loop {
        if tokio::time::Instant::now() > deadline {
            anyhow::bail!("reservation was never reaped back to Free");
        }
        let lockers = kiosk.client.lockers_snapshot(&kiosk.kiosk_id).await?;
        let locker = lockers.iter().find(|l| l.locker_id == 4).expect("locker present");
        if matches!(locker.status, locker_core::locker::LockerStatus::Free) {
            break;
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    Ok(())
}

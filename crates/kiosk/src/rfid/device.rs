// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Real HID reader I/O (spec §4.2 "HID mode"), backed by `hidapi`. Pure
//! device plumbing: report bytes are handed to [`crate::rfid::RfidPipeline`]
//! unchanged, which owns all reassembly/debounce logic.
//!
//! `hidapi`'s device handle is blocking, so the read loop runs on a dedicated
//! OS thread (mirroring how [`crate::modbus::transport::TokioSerialTransport`]
//! keeps the real transport off the async executor) and forwards raw reports
//! to the caller over a channel.

use std::time::Duration;

use hidapi::HidApi;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use locker_core::backoff::Backoff;

use crate::config::RfidConfig;

const READ_TIMEOUT_MS: i32 = 200;
const REPORT_BUF_LEN: usize = 64;

/// Spawns the blocking HID read thread; returns a channel of raw reports for
/// the caller to feed into `RfidPipeline::on_hid_report`. Reconnects with
/// backoff on open/read failure for as long as `shutdown` is not cancelled.
pub fn spawn_hid_reader(config: &RfidConfig, shutdown: CancellationToken) -> mpsc::UnboundedReceiver<Vec<u8>> {
    let (tx, rx) = mpsc::unbounded_channel();
    let (vendor_id, product_id) = config.hid_ids();

    std::thread::spawn(move || run_blocking(vendor_id, product_id, tx, shutdown));

    rx
}

fn run_blocking(vendor_id: u16, product_id: u16, tx: mpsc::UnboundedSender<Vec<u8>>, shutdown: CancellationToken) {
    'reconnect: loop {
        if shutdown.is_cancelled() {
            return;
        }

        let mut backoff = Backoff::new(Duration::from_millis(200), Duration::from_secs(5));

        let api = match HidApi::new() {
            Ok(api) => api,
            Err(e) => {
                tracing::warn!(err = %e, "hidapi init failed");
                std::thread::sleep(backoff.next_delay());
                continue;
            }
        };

        let device = match api.open(vendor_id, product_id) {
            Ok(device) => device,
            Err(e) => {
                tracing::warn!(err = %e, vendor_id, product_id, "hid reader open failed");
                std::thread::sleep(backoff.next_delay());
                continue;
            }
        };

        tracing::info!(vendor_id, product_id, "hid reader connected");

        let mut buf = [0u8; REPORT_BUF_LEN];
        loop {
            if shutdown.is_cancelled() {
                return;
            }
            match device.read_timeout(&mut buf, READ_TIMEOUT_MS) {
                Ok(0) => continue,
                Ok(n) => {
                    if tx.send(buf[..n].to_vec()).is_err() {
                        return;
                    }
                }
                Err(e) => {
                    tracing::warn!(err = %e, "hid reader read failed, reconnecting");
                    continue 'reconnect;
                }
            }
        }
    }
}

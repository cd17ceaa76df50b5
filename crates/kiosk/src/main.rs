// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::error;

use kiosk::config::KioskConfig;

#[tokio::main]
async fn main() {
    let config = KioskConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let shutdown = CancellationToken::new();
    let run_shutdown = shutdown.clone();
    let mut running = tokio::spawn(async move { kiosk::run(config, run_shutdown).await });

    let result = tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
            shutdown.cancel();
            (&mut running).await
        }
        result = &mut running => result,
    };

    match result {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            error!("fatal: {e:#}");
            std::process::exit(1);
        }
        Err(e) => {
            error!("kiosk task panicked: {e}");
            std::process::exit(1);
        }
    }
}

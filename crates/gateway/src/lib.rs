// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The Gateway Coordination Core: the authoritative, fleet-wide locker state
//! store, command queue, heartbeat supervisor, and staff/admin HTTP surface.

pub mod config;
pub mod db;
pub mod error;
pub mod queue;
pub mod reaper;
pub mod state;
pub mod store;
pub mod transport;

use std::sync::Arc;

use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::config::GatewayConfig;
use crate::reaper::{spawn_offline_sweeper, spawn_reservation_reaper};
use crate::state::GatewayState;
use crate::transport::build_router;

/// Run the gateway until shutdown.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.host, config.port);
    let shutdown = CancellationToken::new();

    let pool = db::connect(&config.database_url).await?;
    let state = Arc::new(GatewayState::new(config, pool, shutdown.clone()));

    spawn_reservation_reaper(Arc::clone(&state));
    spawn_offline_sweeper(Arc::clone(&state));

    tracing::info!("locker gateway listening on {addr}");
    let router = build_router(Arc::clone(&state));
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, router).with_graceful_shutdown(shutdown.cancelled_owned()).await?;

    Ok(())
}

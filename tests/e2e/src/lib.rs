// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Harness for end-to-end tests that spawn the real `locker-gateway` binary
//! and exercise it over HTTP, the way a real kiosk fleet would.

use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::time::Duration;

/// Resolve the path to the compiled `locker-gateway` binary.
pub fn gateway_binary() -> PathBuf {
    let manifest = Path::new(env!("CARGO_MANIFEST_DIR"));
    // tests/e2e -> tests -> workspace root
    let workspace = manifest.parent().and_then(|p| p.parent()).unwrap_or(manifest);
    workspace.join("target").join("debug").join("locker-gateway")
}

/// Find a free TCP port by binding to :0 then releasing.
pub fn free_port() -> anyhow::Result<u16> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}

/// A running `locker-gateway` process, killed on drop. Each instance gets
/// its own temp SQLite file so tests don't interfere with each other.
pub struct GatewayProcess {
    child: Child,
    port: u16,
    admin_token: Option<String>,
    _db_dir: tempfile::TempDir,
}

impl GatewayProcess {
    /// Start the gateway with no admin token (admin auth disabled) and tight
    /// reservation/offline thresholds so reaper behavior is test-observable.
    pub async fn start() -> anyhow::Result<Self> {
        Self::build().spawn().await
    }

    pub fn build() -> GatewayBuilder {
        GatewayBuilder::default()
    }

    pub fn base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn admin_token(&self) -> Option<&str> {
        self.admin_token.as_deref()
    }

    /// Poll `/health` until the gateway responds or `timeout` elapses.
    pub async fn wait_healthy(&self, timeout: Duration) -> anyhow::Result<()> {
        let client = reqwest::Client::new();
        let url = format!("{}/health", self.base_url());
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if tokio::time::Instant::now() > deadline {
                anyhow::bail!("gateway did not become healthy within {timeout:?}");
            }
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status().is_success() {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    }
}

impl Drop for GatewayProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

/// Builder for the handful of gateway tunables the e2e scenarios exercise.
pub struct GatewayBuilder {
    reservation_ttl_seconds: u64,
    offline_threshold_seconds: u64,
    admin_token: Option<String>,
    rate_limit_card_per_min: u32,
    rate_limit_locker_per_min: u32,
}

impl Default for GatewayBuilder {
    fn default() -> Self {
        Self {
            reservation_ttl_seconds: 90,
            offline_threshold_seconds: 60,
            admin_token: None,
            rate_limit_card_per_min: 60,
            rate_limit_locker_per_min: 6,
        }
    }
}

impl GatewayBuilder {
    pub fn reservation_ttl_seconds(mut self, v: u64) -> Self {
        self.reservation_ttl_seconds = v;
        self
    }

    pub fn offline_threshold_seconds(mut self, v: u64) -> Self {
        self.offline_threshold_seconds = v;
        self
    }

    pub fn admin_token(mut self, token: &str) -> Self {
        self.admin_token = Some(token.to_owned());
        self
    }

    pub fn rate_limit_card_per_min(mut self, v: u32) -> Self {
        self.rate_limit_card_per_min = v;
        self
    }

    pub fn rate_limit_locker_per_min(mut self, v: u32) -> Self {
        self.rate_limit_locker_per_min = v;
        self
    }

    pub async fn spawn(self) -> anyhow::Result<GatewayProcess> {
        let binary = gateway_binary();
        anyhow::ensure!(binary.exists(), "locker-gateway binary not found at {}", binary.display());

        let port = free_port()?;
        let db_dir = tempfile::tempdir()?;
        let db_path = db_dir.path().join("gateway.db");
        let database_url = format!("sqlite://{}", db_path.display());

        let mut args: Vec<String> = vec![
            "--host".into(),
            "127.0.0.1".into(),
            "--port".into(),
            port.to_string(),
            "--database-url".into(),
            database_url,
            "--reservation-ttl-seconds".into(),
            self.reservation_ttl_seconds.to_string(),
            "--offline-threshold-seconds".into(),
            self.offline_threshold_seconds.to_string(),
            "--rate-limit-card-per-min".into(),
            self.rate_limit_card_per_min.to_string(),
            "--rate-limit-locker-per-min".into(),
            self.rate_limit_locker_per_min.to_string(),
        ];
        if let Some(ref token) = self.admin_token {
            args.extend(["--admin-token".into(), token.clone()]);
        }

        let child = Command::new(&binary)
            .args(&args)
            .env("RUST_LOG", "warn")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()?;

        let process = GatewayProcess { child, port, admin_token: self.admin_token, _db_dir: db_dir };
        process.wait_healthy(Duration::from_secs(10)).await?;
        Ok(process)
    }
}

/// A fresh, registered kiosk identity against a running gateway, with a
/// [`kiosk::gateway_client::GatewayClient`] pre-pointed at it (reuses the
/// kiosk binary's real HTTP client rather than a second hand-rolled one).
pub struct RegisteredKiosk {
    pub kiosk_id: String,
    pub zone: String,
    pub client: kiosk::gateway_client::GatewayClient,
}

pub async fn register_kiosk(
    gateway: &GatewayProcess,
    kiosk_id: &str,
    zone: &str,
    kiosk_size: i64,
) -> anyhow::Result<RegisteredKiosk> {
    let client = kiosk::gateway_client::GatewayClient::new(gateway.base_url());
    client
        .register(kiosk_id, zone, "0.1.0", "hw-test", kiosk_size, "testhash")
        .await?;
    Ok(RegisteredKiosk { kiosk_id: kiosk_id.to_owned(), zone: zone.to_owned(), client })
}

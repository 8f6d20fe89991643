//! tapfarm controller entry point.
//!
//! Wires together the infrastructure services and starts the Tokio async
//! runtime.
//!
//! # Architecture
//!
//! ```text
//! main()
//!  └─ AppConfig::load()      -- TOML config, defaults when absent
//!  └─ AdbCli                 -- subprocess bridge to the adb tool
//!  └─ start services
//!       ├─ TouchServer       -- minitouch sessions, one per device
//!       ├─ ScreenServer      -- minicap sessions + Node relay child
//!       └─ event pump        -- logs crashed on-device servers
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use tapfarm_core::Orientation;
use tapfarm_master::infrastructure::adb::AdbCli;
use tapfarm_master::infrastructure::provision;
use tapfarm_master::infrastructure::session::screen::ScreenServer;
use tapfarm_master::infrastructure::session::touch::TouchServer;
use tapfarm_master::infrastructure::session::SessionEvent;
use tapfarm_master::infrastructure::storage::config::AppConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("tapfarm.toml"), PathBuf::from);
    let config = AppConfig::load(&config_path)?;

    // Structured logging; the config level is overridden by `RUST_LOG`.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config.log_level.clone())),
        )
        .init();

    info!(config = %config_path.display(), "tapfarm master starting");

    let bridge = Arc::new(AdbCli::new(config.adb.executable.clone()));
    let (events_tx, mut events_rx) = mpsc::unbounded_channel::<SessionEvent>();

    let mut touch = TouchServer::new(bridge.clone(), config.touch.clone(), events_tx.clone());
    let mut screen = ScreenServer::new(bridge.clone(), config.screen.clone(), events_tx);

    // ── Crash event pump ──────────────────────────────────────────────────────
    tokio::spawn(async move {
        while let Some(event) = events_rx.recv().await {
            match event {
                SessionEvent::ServerCrashed { device, message } => {
                    error!(device = %device, "on-device server crashed: {message}");
                }
            }
        }
    });

    // ── Provision and start the configured devices ────────────────────────────
    for device in &config.devices {
        let device = device.as_str();
        if let Err(e) = provision::ensure_touch_binary(bridge.as_ref(), device, &config.shared_assets).await
        {
            error!(device, "minitouch provisioning failed: {e}");
            continue;
        }
        if let Err(e) = provision::ensure_cap_binary(bridge.as_ref(), device, &config.shared_assets).await
        {
            error!(device, "minicap provisioning failed: {e}");
            continue;
        }

        match touch.start_device_server(device).await {
            Ok(port) => info!(device, port, "touch session up"),
            Err(e) => {
                error!(device, "touch session failed: {e}");
                continue;
            }
        }
        match screen
            .start_device_server(device, None, None, Orientation::Deg0, config.screen.quality)
            .await
        {
            Ok(info) => info!(
                device,
                port = info.port,
                size = %info.geometry.real_size,
                "screen session up"
            ),
            Err(e) => error!(device, "screen session failed: {e}"),
        }
    }

    if let Err(e) = screen.start_relay() {
        warn!("relay not started: {e}");
    }

    info!("tapfarm master ready. Press Ctrl-C to exit.");
    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received");

    // ── Orderly shutdown ──────────────────────────────────────────────────────
    for device in &config.devices {
        let device = device.as_str();
        if touch.has_session(device) {
            if let Err(e) = touch.remove_device(device).await {
                warn!(device, "touch shutdown failed: {e}");
            }
        }
        if screen.has_session(device) {
            if let Err(e) = screen.remove_device(device).await {
                warn!(device, "screen shutdown failed: {e}");
            }
        }
    }
    if screen.relay_running() {
        let _ = screen.stop_relay().await;
    }

    info!("tapfarm master stopped");
    Ok(())
}

//! minicap screen-stream session management.
//!
//! [`ScreenServer`] mirrors the touch server's lifecycle — port pool,
//! forward, background `adb shell` task, rollback on failed start — but
//! holds no socket itself: frames are consumed by the companion Node relay
//! process, which connects to the forwarded port and re-serves them to
//! browsers. This side only computes the geometry, launches the on-device
//! binary, and manages the relay child.
//!
//! Geometry: the device's real size comes from `wm size`; requested show
//! and canvas sizes are fitted under the configured aspect lock before
//! being baked into the minicap projection argument.

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tapfarm_core::domain::screen::{fit_size, projection, Orientation, Size};
use tokio::net::TcpStream;
use tokio::process::Command;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{error, info, warn};

use crate::infrastructure::adb::{query, AdbBridge, DeviceSerial};
use crate::infrastructure::ports::PortPool;
use crate::infrastructure::provision::{BinaryVariant, REMOTE_DIR};
use crate::infrastructure::session::{spawn_server, SessionError, SessionEvent, SessionState};
use crate::infrastructure::storage::config::ScreenConfig;

const LOOPBACK: &str = "127.0.0.1";
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Resolved display geometry for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScreenGeometry {
    /// Physical panel size reported by `wm size`.
    pub real_size: Size,
    /// Size the stream is displayed at.
    pub show_size: Size,
    /// Size minicap renders into.
    pub canvas_size: Size,
    pub orientation: Orientation,
    /// JPEG quality, 0–100.
    pub quality: u8,
}

/// Everything a relay consumer needs to attach to a stream.
#[derive(Debug, Clone)]
pub struct ScreenSessionInfo {
    pub device: DeviceSerial,
    pub port: u16,
    pub geometry: ScreenGeometry,
}

struct ScreenSession {
    port: u16,
    variant: BinaryVariant,
    stop: Arc<AtomicBool>,
    server_task: Option<JoinHandle<()>>,
    geometry: ScreenGeometry,
    state: SessionState,
}

/// Handle on the running relay web server child.
struct RelayHandle {
    stop: Arc<AtomicBool>,
    task: JoinHandle<()>,
}

/// Manages minicap sessions across many devices, plus the shared relay.
pub struct ScreenServer {
    bridge: Arc<dyn AdbBridge>,
    config: ScreenConfig,
    ports: PortPool,
    sessions: HashMap<DeviceSerial, ScreenSession>,
    events: mpsc::UnboundedSender<SessionEvent>,
    relay: Option<RelayHandle>,
}

impl ScreenServer {
    pub fn new(
        bridge: Arc<dyn AdbBridge>,
        config: ScreenConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let ports = PortPool::new(config.port_start, config.port_end);
        Self {
            bridge,
            config,
            ports,
            sessions: HashMap::new(),
            events,
            relay: None,
        }
    }

    /// Starts the minicap server for `device`.
    ///
    /// `show_size`/`canvas_size` default to the real panel size; when
    /// given, they are fitted under the configured aspect lock. The device
    /// must have been provisioned first.
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyRunning`] when the device's session is still
    /// live, [`SessionError::Ports`] when the pool is empty, or
    /// [`SessionError::StartFailed`] after a rolled-back setup failure.
    pub async fn start_device_server(
        &mut self,
        device: &str,
        show_size: Option<Size>,
        canvas_size: Option<Size>,
        orientation: Orientation,
        quality: u8,
    ) -> Result<ScreenSessionInfo, SessionError> {
        // Replacing a live session would orphan its server task.
        if self
            .sessions
            .get(device)
            .is_some_and(|s| s.state == SessionState::ServerRunning)
        {
            return Err(SessionError::AlreadyRunning {
                device: device.to_string(),
            });
        }

        let port = match self.sessions.get(device) {
            Some(session) => session.port,
            None => self.ports.allocate()?,
        };

        let real_size = match query::screen_size(self.bridge.as_ref(), device).await {
            Ok(size) => size,
            Err(e) => {
                // No session entry exists yet; only the port needs undoing.
                if !self.sessions.contains_key(device) {
                    self.ports.release(port);
                }
                return Err(SessionError::StartFailed {
                    device: device.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let lock = self.config.aspect_lock();
        let geometry = ScreenGeometry {
            real_size,
            show_size: show_size.map_or(real_size, |s| fit_size(real_size, s, lock)),
            canvas_size: canvas_size.map_or(real_size, |s| fit_size(real_size, s, lock)),
            orientation,
            quality,
        };

        self.sessions.insert(
            device.to_string(),
            ScreenSession {
                port,
                variant: BinaryVariant::Pie,
                stop: Arc::new(AtomicBool::new(false)),
                server_task: None,
                geometry: geometry.clone(),
                state: SessionState::PortAllocated,
            },
        );

        match self.try_start(device, port, &geometry).await {
            Ok(()) => {
                info!(device, port, "minicap session running");
                Ok(ScreenSessionInfo {
                    device: device.to_string(),
                    port,
                    geometry,
                })
            }
            Err(reason) => {
                warn!(device, port, "minicap start failed, rolling back: {reason}");
                self.shutdown_session(device).await;
                self.sessions.remove(device);
                self.ports.release(port);
                Err(SessionError::StartFailed {
                    device: device.to_string(),
                    reason,
                })
            }
        }
    }

    async fn try_start(
        &mut self,
        device: &str,
        port: u16,
        geometry: &ScreenGeometry,
    ) -> Result<(), String> {
        let sdk = query::sdk_version(self.bridge.as_ref(), device)
            .await
            .map_err(|e| e.to_string())?;
        let variant = BinaryVariant::for_sdk(sdk);
        if let Some(session) = self.sessions.get_mut(device) {
            session.variant = variant;
            session.state = SessionState::BinaryResolved;
        }

        query::remove_forward(self.bridge.as_ref(), device, port)
            .await
            .map_err(|e| e.to_string())?;
        query::forward(self.bridge.as_ref(), device, port, "minicap")
            .await
            .map_err(|e| e.to_string())?;

        let shell_cmd = format!(
            "LD_LIBRARY_PATH={REMOTE_DIR} {REMOTE_DIR}/{} -P {} -S -Q {}",
            variant.cap_binary(),
            projection(geometry.real_size, geometry.canvas_size, geometry.orientation),
            geometry.quality
        );
        let stop = self
            .sessions
            .get(device)
            .map(|s| Arc::clone(&s.stop))
            .expect("session inserted above");
        let task = spawn_server(
            Arc::clone(&self.bridge),
            device.to_string(),
            shell_cmd,
            stop,
            self.events.clone(),
        );
        if let Some(session) = self.sessions.get_mut(device) {
            session.server_task = Some(task);
            session.state = SessionState::ServerStarting;
        }

        self.wait_until_connectable(device, port).await?;
        if let Some(session) = self.sessions.get_mut(device) {
            session.state = SessionState::ServerRunning;
        }
        Ok(())
    }

    /// Probes the forwarded port until minicap accepts a connection. The
    /// probe stream is dropped immediately — the relay is the consumer.
    async fn wait_until_connectable(&self, device: &str, port: u16) -> Result<(), String> {
        let timeout = Duration::from_millis(self.config.start_timeout_ms);
        let deadline = Instant::now() + timeout;

        loop {
            let server_gone = self
                .sessions
                .get(device)
                .and_then(|s| s.server_task.as_ref())
                .is_some_and(|task| task.is_finished());
            if server_gone {
                return Err("on-device server exited during startup".into());
            }

            match TcpStream::connect((LOOPBACK, port)).await {
                Ok(_probe) => return Ok(()),
                Err(e) => {
                    if Instant::now() >= deadline {
                        return Err(format!(
                            "server not connectable within {}ms: {e}",
                            self.config.start_timeout_ms
                        ));
                    }
                    tokio::time::sleep(READY_POLL_INTERVAL).await;
                }
            }
        }
    }

    /// Stops the device's server without reclaiming its port.
    pub async fn stop_device_server(&mut self, device: &str) -> Result<(), SessionError> {
        if !self.sessions.contains_key(device) {
            return Err(SessionError::NotStarted {
                device: device.to_string(),
            });
        }
        self.shutdown_session(device).await;
        info!(device, "minicap session stopped");
        Ok(())
    }

    /// Stops, removes the registry entry, and returns the port to the pool.
    pub async fn remove_device(&mut self, device: &str) -> Result<(), SessionError> {
        self.stop_device_server(device).await?;
        if let Some(session) = self.sessions.remove(device) {
            self.ports.release(session.port);
        }
        Ok(())
    }

    async fn shutdown_session(&mut self, device: &str) {
        let binary = match self.sessions.get_mut(device) {
            Some(session) => {
                session.state = SessionState::Stopping;
                session.stop.store(true, Ordering::SeqCst);
                session.variant.cap_binary()
            }
            None => return,
        };

        // minicap holds no handshake, so the PID always comes from ps.
        if let Some(pid) = query::find_pid(self.bridge.as_ref(), device, binary).await {
            let _ = query::kill_process(self.bridge.as_ref(), device, pid).await;
        }

        let task = self
            .sessions
            .get_mut(device)
            .and_then(|s| s.server_task.take());
        if let Some(task) = task {
            let _ = task.await;
        }
    }

    // ── Relay web server ─────────────────────────────────────────────────────

    /// Launches the companion Node relay as a child process.
    ///
    /// # Errors
    ///
    /// [`SessionError::RelayState`] if it is already running.
    pub fn start_relay(&mut self) -> Result<(), SessionError> {
        if self.relay.is_some() {
            return Err(SessionError::RelayState {
                state: "already running",
            });
        }

        let stop = Arc::new(AtomicBool::new(false));
        let command = self.config.relay_command.clone();
        let script = self.config.relay_script.clone();
        let port = self.config.relay_port;
        let task_stop = Arc::clone(&stop);

        let task = tokio::spawn(async move {
            info!(%command, %script, port, "starting relay web server");
            match run_local_process(&command, &[&script, "-p", &port.to_string()], task_stop).await
            {
                Ok(code) if code != 0 => error!(code, "relay web server exited abnormally"),
                Ok(_) => info!("relay web server stopped"),
                Err(e) => error!("failed to run relay web server: {e}"),
            }
        });

        self.relay = Some(RelayHandle { stop, task });
        Ok(())
    }

    /// Stops the relay child and joins its task.
    ///
    /// # Errors
    ///
    /// [`SessionError::RelayState`] if it is not running.
    pub async fn stop_relay(&mut self) -> Result<(), SessionError> {
        let relay = self.relay.take().ok_or(SessionError::RelayState {
            state: "not running",
        })?;
        relay.stop.store(true, Ordering::SeqCst);
        let _ = relay.task.await;
        Ok(())
    }

    // ── Accessors ────────────────────────────────────────────────────────────

    /// Session info for an attached consumer.
    pub fn session_info(&self, device: &str) -> Option<ScreenSessionInfo> {
        self.sessions.get(device).map(|s| ScreenSessionInfo {
            device: device.to_string(),
            port: s.port,
            geometry: s.geometry.clone(),
        })
    }

    pub fn has_session(&self, device: &str) -> bool {
        self.sessions.contains_key(device)
    }

    pub fn ports(&self) -> &PortPool {
        &self.ports
    }

    pub fn relay_running(&self) -> bool {
        self.relay.is_some()
    }
}

/// Runs a host-side child process until it exits or `stop` is raised.
async fn run_local_process(
    program: &str,
    args: &[&str],
    stop: Arc<AtomicBool>,
) -> std::io::Result<i32> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(true)
        .spawn()?;

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            _ = tokio::time::sleep(STOP_POLL_INTERVAL) => {
                if stop.load(Ordering::SeqCst) {
                    let _ = child.start_kill();
                }
            }
        }
    };

    Ok(status.code().unwrap_or(-1))
}

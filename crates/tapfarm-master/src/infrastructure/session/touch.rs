//! minitouch session management.
//!
//! [`TouchServer`] owns the touch port pool and the registry of live
//! sessions. Starting a device forwards a host port to the on-device
//! abstract socket, launches the minitouch binary through ADB as a
//! background task, waits for the socket to become connectable, and
//! performs the handshake. The connection is then shared (behind an async
//! mutex) with the gesture layer and any continuity-tap workers.
//!
//! Readiness is probed, not guessed: rather than sleeping a fixed interval
//! and hoping a slow device made it, the start path retries the TCP
//! connect in a bounded loop and fails fast if the server task has already
//! exited. Either way a failed start rolls back fully — registry entry
//! removed, port returned to the pool — before the error is returned.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tapfarm_core::Handshake;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{info, warn};

use crate::infrastructure::adb::{query, AdbBridge, DeviceSerial};
use crate::infrastructure::ports::PortPool;
use crate::infrastructure::provision::{BinaryVariant, REMOTE_DIR};
use crate::infrastructure::session::connection::{ConnectionError, TouchConnection};
use crate::infrastructure::session::{spawn_server, SessionError, SessionEvent, SessionState};
use crate::infrastructure::storage::config::TouchConfig;

const LOOPBACK: &str = "127.0.0.1";
const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// One device's live minitouch session.
struct TouchSession {
    port: u16,
    variant: BinaryVariant,
    stop: Arc<AtomicBool>,
    server_task: Option<JoinHandle<()>>,
    connection: Option<Arc<Mutex<TouchConnection>>>,
    caps: Option<Handshake>,
    state: SessionState,
}

/// Manages minitouch sessions across many devices.
pub struct TouchServer {
    bridge: Arc<dyn AdbBridge>,
    config: TouchConfig,
    ports: PortPool,
    sessions: HashMap<DeviceSerial, TouchSession>,
    events: mpsc::UnboundedSender<SessionEvent>,
}

impl TouchServer {
    pub fn new(
        bridge: Arc<dyn AdbBridge>,
        config: TouchConfig,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Self {
        let ports = PortPool::new(config.port_start, config.port_end);
        Self {
            bridge,
            config,
            ports,
            sessions: HashMap::new(),
            events,
        }
    }

    /// Starts the minitouch server for `device` and connects to it.
    ///
    /// Returns the forwarded host port. The device must have been
    /// provisioned first (see [`crate::infrastructure::provision`]).
    ///
    /// # Errors
    ///
    /// [`SessionError::AlreadyRunning`] when the device's session is still
    /// live, [`SessionError::Ports`] when the pool is empty (no session is
    /// created), or [`SessionError::StartFailed`] after a rolled-back
    /// setup failure.
    pub async fn start_device_server(&mut self, device: &str) -> Result<u16, SessionError> {
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

        // A device that was stopped but not removed keeps its port.
        let port = match self.sessions.get(device) {
            Some(session) => session.port,
            None => self.ports.allocate()?,
        };

        self.sessions.insert(
            device.to_string(),
            TouchSession {
                port,
                variant: BinaryVariant::Pie,
                stop: Arc::new(AtomicBool::new(false)),
                server_task: None,
                connection: None,
                caps: None,
                state: SessionState::PortAllocated,
            },
        );

        match self.try_start(device, port).await {
            Ok(()) => {
                info!(device, port, "minitouch session running");
                Ok(port)
            }
            Err(reason) => {
                warn!(device, port, "minitouch start failed, rolling back: {reason}");
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

    async fn try_start(&mut self, device: &str, port: u16) -> Result<(), String> {
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
        query::forward(self.bridge.as_ref(), device, port, "minitouch")
            .await
            .map_err(|e| e.to_string())?;

        let shell_cmd = format!(
            "LD_LIBRARY_PATH={REMOTE_DIR} {REMOTE_DIR}/{}",
            variant.touch_binary()
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

        let connection = self.wait_for_connection(device, port).await?;
        let caps = connection.handshake().clone();
        if let Some(session) = self.sessions.get_mut(device) {
            session.connection = Some(Arc::new(Mutex::new(connection)));
            session.caps = Some(caps);
            session.state = SessionState::ServerRunning;
        }
        Ok(())
    }

    /// Bounded connect-retry loop replacing a fixed startup sleep.
    async fn wait_for_connection(
        &self,
        device: &str,
        port: u16,
    ) -> Result<TouchConnection, String> {
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

            match TouchConnection::connect(LOOPBACK, port, self.config.recv_buffer).await {
                Ok(connection) => return Ok(connection),
                // A malformed handshake will not fix itself on retry.
                Err(ConnectionError::Protocol(e)) => return Err(e.to_string()),
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
    ///
    /// Raises the stop flag, disconnects the socket, kills the remote
    /// process by the PID learned in the handshake (falling back to a `ps`
    /// scan), and joins the background task.
    pub async fn stop_device_server(&mut self, device: &str) -> Result<(), SessionError> {
        if !self.sessions.contains_key(device) {
            return Err(SessionError::NotStarted {
                device: device.to_string(),
            });
        }
        self.shutdown_session(device).await;
        info!(device, "minitouch session stopped");
        Ok(())
    }

    /// Stops the device's server, removes it from the registry, and
    /// returns its port to the pool.
    pub async fn remove_device(&mut self, device: &str) -> Result<(), SessionError> {
        self.stop_device_server(device).await?;
        if let Some(session) = self.sessions.remove(device) {
            self.ports.release(session.port);
        }
        Ok(())
    }

    async fn shutdown_session(&mut self, device: &str) {
        let (connection, handshake_pid, binary) = match self.sessions.get_mut(device) {
            Some(session) => {
                session.state = SessionState::Stopping;
                session.stop.store(true, Ordering::SeqCst);
                (
                    session.connection.take(),
                    session.caps.as_ref().map(|c| c.pid),
                    session.variant.touch_binary(),
                )
            }
            None => return,
        };

        if let Some(connection) = connection {
            connection.lock().await.disconnect().await;
        }

        let pid = match handshake_pid {
            Some(pid) => Some(pid),
            None => query::find_pid(self.bridge.as_ref(), device, binary).await,
        };
        if let Some(pid) = pid {
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

    // ── Accessors for the gesture layer and tests ────────────────────────────

    /// The shared connection handle for a running session.
    pub fn connection(&self, device: &str) -> Option<Arc<Mutex<TouchConnection>>> {
        self.sessions
            .get(device)
            .and_then(|s| s.connection.clone())
    }

    /// The handshake capabilities of a running session.
    pub fn capabilities(&self, device: &str) -> Option<Handshake> {
        self.sessions.get(device).and_then(|s| s.caps.clone())
    }

    /// Whether the device has a session in the running state.
    pub fn is_running(&self, device: &str) -> bool {
        self.sessions
            .get(device)
            .is_some_and(|s| s.state == SessionState::ServerRunning)
    }

    /// Whether the registry holds any entry for the device.
    pub fn has_session(&self, device: &str) -> bool {
        self.sessions.contains_key(device)
    }

    /// The forwarded port of the device's session, if any.
    pub fn port(&self, device: &str) -> Option<u16> {
        self.sessions.get(device).map(|s| s.port)
    }

    /// The port pool, for inspection.
    pub fn ports(&self) -> &PortPool {
        &self.ports
    }

    /// The settle delay applied after publishing a script.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.config.settle_delay_ms)
    }
}

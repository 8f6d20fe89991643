//! Per-device server sessions.
//!
//! A session owns one forwarded port and one background task that keeps the
//! on-device server (`minitouch` or `minicap`) alive for the session's
//! lifetime. The session registries are plain maps owned by their server
//! structs: only the controller mutates them, while background tasks
//! communicate exclusively through the stop flag they were given and the
//! event channel.
//!
//! # Failure routing
//!
//! Setup-time failures (push, forward, connect) are synchronous and come
//! back as [`SessionError`]; a failed start rolls back completely, so it
//! never leaks a port or a registry entry. Steady-state failures — the
//! remote process dying while the session is believed running — arrive
//! asynchronously as [`SessionEvent`]s, because whoever started the
//! session has long since returned. An operator-initiated stop emits no
//! event at all.

pub mod connection;
pub mod screen;
pub mod touch;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use super::adb::{AdbBridge, DeviceSerial};
use super::ports::PortError;

/// Events emitted by session background tasks to the application layer.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// The on-device server exited with a non-zero code while its stop flag
    /// was clear — an abnormal termination, not an operator stop.
    ServerCrashed {
        device: DeviceSerial,
        message: String,
    },
}

/// Lifecycle of a device session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    PortAllocated,
    BinaryResolved,
    ServerStarting,
    ServerRunning,
    Stopping,
}

/// Error type for session management.
#[derive(Debug, Error)]
pub enum SessionError {
    /// No forwarding port left for a new session.
    #[error(transparent)]
    Ports(#[from] PortError),

    /// The device has no running session.
    #[error("device {device} has no running session")]
    NotStarted { device: DeviceSerial },

    /// The device's session is still running; it must be stopped or
    /// removed before another start. Silently replacing a live session
    /// would orphan its server task along with the stop flag that
    /// controls it.
    #[error("device {device} already has a running session")]
    AlreadyRunning { device: DeviceSerial },

    /// Starting the on-device server failed; the session was rolled back
    /// (registry entry removed, port returned to the pool).
    #[error("failed to start server for {device}: {reason}")]
    StartFailed {
        device: DeviceSerial,
        reason: String,
    },

    /// The relay web server was asked to start while already running, or
    /// to stop while not running.
    #[error("relay server is {state}")]
    RelayState { state: &'static str },
}

/// Spawns the background task that runs one on-device server to completion.
///
/// The task blocks inside [`AdbBridge::run_server`] for the lifetime of the
/// remote process. On exit it classifies the termination: a non-zero exit
/// with the stop flag clear is abnormal and is reported on `events`; a
/// clean exit, or any exit after the stop flag was raised, is suppressed.
pub fn spawn_server(
    bridge: Arc<dyn AdbBridge>,
    device: DeviceSerial,
    shell_cmd: String,
    stop: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        debug!(device, cmd = %shell_cmd, "on-device server starting");
        match bridge.run_server(&device, &shell_cmd, Arc::clone(&stop)).await {
            Ok(exit) => {
                if exit.code != 0 && !stop.load(Ordering::SeqCst) {
                    let message = exit.output.join("\n");
                    error!(device, code = exit.code, "on-device server crashed: {message}");
                    let _ = events.send(SessionEvent::ServerCrashed { device, message });
                } else {
                    debug!(device, code = exit.code, "on-device server stopped");
                }
            }
            Err(e) => {
                if !stop.load(Ordering::SeqCst) {
                    error!(device, "on-device server invocation failed: {e}");
                    let _ = events.send(SessionEvent::ServerCrashed {
                        device,
                        message: e.to_string(),
                    });
                }
            }
        }
    })
}

//! The ADB command bridge.
//!
//! Everything the controller does on a device goes through `adb`: pushing
//! binaries, forwarding TCP ports to the on-device abstract sockets, and
//! running the minitouch/minicap servers themselves as long-lived
//! `adb shell` children.
//!
//! The [`AdbBridge`] trait is the seam between the session managers and the
//! real tool. Production code uses [`AdbCli`], which shells out to the adb
//! executable via `tokio::process`; tests use the scripted mock in
//! [`mock`] or a `mockall` automock.

pub mod mock;
pub mod query;

use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

/// Devices are addressed by their ADB serial string.
pub type DeviceSerial = String;

/// How often a running server child is checked against its stop flag.
const STOP_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Error type for ADB invocations.
#[derive(Debug, Error)]
pub enum AdbError {
    /// The adb executable could not be launched or waited on.
    #[error("failed to run adb: {0}")]
    Spawn(#[source] std::io::Error),

    /// adb exited non-zero and the caller did not ask to ignore it.
    #[error("adb {command:?} failed with exit code {code}: {output}")]
    CommandFailed {
        command: String,
        code: i32,
        output: String,
    },

    /// adb succeeded but printed something we cannot parse.
    #[error("unexpected adb output for {command:?}: {output}")]
    UnexpectedOutput { command: String, output: String },
}

/// Exit report of a long-running on-device server.
#[derive(Debug, Clone)]
pub struct ServerExit {
    /// Process exit code; `-1` when the process died to a signal.
    pub code: i32,
    /// Combined stdout + stderr lines, kept for the crash report.
    pub output: Vec<String>,
}

/// Executes adb commands against a named device.
///
/// `run` treats a non-zero exit as an error; `run_unchecked` hands the exit
/// code back to the caller (used for commands whose failure is expected,
/// like removing a stale forward). `run_server` blocks for the lifetime of
/// the remote process and kills it when `stop` is raised.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdbBridge: Send + Sync {
    /// Runs `adb [-s device] <args>` and returns its output lines.
    ///
    /// # Errors
    ///
    /// [`AdbError::CommandFailed`] on a non-zero exit.
    async fn run(&self, device: &str, args: &[String]) -> Result<Vec<String>, AdbError>;

    /// Like [`run`](AdbBridge::run) but never fails on a non-zero exit;
    /// returns `(exit_code, output_lines)` instead.
    async fn run_unchecked(
        &self,
        device: &str,
        args: &[String],
    ) -> Result<(i32, Vec<String>), AdbError>;

    /// `adb [-s device] push <local> <remote>`.
    async fn push(&self, device: &str, local: &Path, remote: &str) -> Result<(), AdbError>;

    /// Runs `adb [-s device] shell <shell_cmd>` until the remote process
    /// exits, polling `stop` and killing the child when it is raised.
    async fn run_server(
        &self,
        device: &str,
        shell_cmd: &str,
        stop: Arc<AtomicBool>,
    ) -> Result<ServerExit, AdbError>;
}

// ── AdbCli ────────────────────────────────────────────────────────────────────

/// The production bridge: shells out to a configurable adb executable.
#[derive(Debug, Clone)]
pub struct AdbCli {
    executable: String,
}

impl AdbCli {
    pub fn new(executable: impl Into<String>) -> Self {
        Self {
            executable: executable.into(),
        }
    }

    /// Builds `adb [-s device] <args>`. An empty serial targets the single
    /// connected device, matching adb's own behaviour.
    fn command(&self, device: &str, args: &[String]) -> Command {
        let mut cmd = Command::new(&self.executable);
        if !device.is_empty() {
            cmd.arg("-s").arg(device);
        }
        cmd.args(args);
        cmd
    }

    fn describe(&self, device: &str, args: &[String]) -> String {
        let mut parts = vec![self.executable.clone()];
        if !device.is_empty() {
            parts.push("-s".into());
            parts.push(device.into());
        }
        parts.extend(args.iter().cloned());
        parts.join(" ")
    }
}

#[async_trait]
impl AdbBridge for AdbCli {
    async fn run(&self, device: &str, args: &[String]) -> Result<Vec<String>, AdbError> {
        let (code, output) = self.run_unchecked(device, args).await?;
        if code != 0 {
            return Err(AdbError::CommandFailed {
                command: self.describe(device, args),
                code,
                output: output.join("\n"),
            });
        }
        Ok(output)
    }

    async fn run_unchecked(
        &self,
        device: &str,
        args: &[String],
    ) -> Result<(i32, Vec<String>), AdbError> {
        let command = self.describe(device, args);
        debug!(%command, "exec adb");

        let out = self
            .command(device, args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(AdbError::Spawn)?;

        let mut lines: Vec<String> = String::from_utf8_lossy(&out.stdout)
            .lines()
            .map(str::to_string)
            .collect();
        lines.extend(
            String::from_utf8_lossy(&out.stderr)
                .lines()
                .map(str::to_string),
        );

        Ok((out.status.code().unwrap_or(-1), lines))
    }

    async fn push(&self, device: &str, local: &Path, remote: &str) -> Result<(), AdbError> {
        let args = vec![
            "push".to_string(),
            local.display().to_string(),
            remote.to_string(),
        ];
        self.run(device, &args).await?;
        Ok(())
    }

    async fn run_server(
        &self,
        device: &str,
        shell_cmd: &str,
        stop: Arc<AtomicBool>,
    ) -> Result<ServerExit, AdbError> {
        let args = vec!["shell".to_string(), shell_cmd.to_string()];
        debug!(command = %self.describe(device, &args), "exec adb server");

        let mut child = self
            .command(device, &args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(AdbError::Spawn)?;

        // Drain both pipes concurrently so a chatty child never blocks on a
        // full pipe buffer.
        let stdout_task = tokio::spawn(collect_lines(child.stdout.take()));
        let stderr_task = tokio::spawn(collect_lines(child.stderr.take()));

        let status = loop {
            tokio::select! {
                status = child.wait() => break status.map_err(AdbError::Spawn)?,
                _ = tokio::time::sleep(STOP_POLL_INTERVAL) => {
                    if stop.load(Ordering::SeqCst) {
                        if let Err(e) = child.start_kill() {
                            warn!(device, "failed to kill adb server child: {e}");
                        }
                    }
                }
            }
        };

        let mut output = stdout_task.await.unwrap_or_default();
        output.extend(stderr_task.await.unwrap_or_default());

        Ok(ServerExit {
            code: status.code().unwrap_or(-1),
            output,
        })
    }
}

/// Reads a pipe to EOF, line by line.
async fn collect_lines<R>(reader: Option<R>) -> Vec<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = Vec::new();
    if let Some(reader) = reader {
        let mut reader = BufReader::new(reader).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            lines.push(line);
        }
    }
    lines
}

//! Scripted ADB bridge for integration tests.
//!
//! Lets tests declare canned responses and failures per command without a
//! device attached, and records every invocation for assertions. Unlike
//! the `mockall` automock (used for narrow unit tests), this mock is
//! compiled unconditionally so the `tests/` integration suites can drive
//! whole session lifecycles through it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use super::{AdbBridge, AdbError, ServerExit};

/// How a scripted `run_server` call behaves.
#[derive(Debug, Clone)]
pub enum ServerBehavior {
    /// Block until the stop flag is raised, then exit with `code`.
    RunUntilStopped { code: i32 },
    /// Exit immediately with `code` and `output`, as a crashing server does.
    ExitImmediately { code: i32, output: Vec<String> },
}

/// A hand-scripted [`AdbBridge`] implementation.
#[derive(Debug)]
pub struct ScriptedAdb {
    responses: Mutex<Vec<(String, Vec<String>)>>,
    failures: Mutex<Vec<String>>,
    calls: Mutex<Vec<String>>,
    pushes: Mutex<Vec<(PathBuf, String)>>,
    server: Mutex<ServerBehavior>,
}

impl Default for ScriptedAdb {
    fn default() -> Self {
        Self {
            responses: Mutex::new(Vec::new()),
            failures: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
            pushes: Mutex::new(Vec::new()),
            server: Mutex::new(ServerBehavior::RunUntilStopped { code: 0 }),
        }
    }
}

impl ScriptedAdb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers canned output for any command whose joined argument string
    /// contains `pattern`. First match wins.
    pub fn respond(&self, pattern: &str, lines: &[&str]) {
        self.responses
            .lock()
            .expect("lock poisoned")
            .push((pattern.to_string(), lines.iter().map(|s| s.to_string()).collect()));
    }

    /// Makes any command whose joined argument string contains `pattern`
    /// fail with a non-zero exit.
    pub fn fail_on(&self, pattern: &str) {
        self.failures
            .lock()
            .expect("lock poisoned")
            .push(pattern.to_string());
    }

    /// Configures the behaviour of subsequent `run_server` calls.
    pub fn set_server_behavior(&self, behavior: ServerBehavior) {
        *self.server.lock().expect("lock poisoned") = behavior;
    }

    /// Every command issued so far, as joined argument strings.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("lock poisoned").clone()
    }

    /// Every `push` issued so far.
    pub fn pushed(&self) -> Vec<(PathBuf, String)> {
        self.pushes.lock().expect("lock poisoned").clone()
    }

    fn record(&self, device: &str, joined: &str) {
        self.calls
            .lock()
            .expect("lock poisoned")
            .push(format!("[{device}] {joined}"));
    }

    fn is_failure(&self, joined: &str) -> bool {
        self.failures
            .lock()
            .expect("lock poisoned")
            .iter()
            .any(|p| joined.contains(p))
    }

    fn response_for(&self, joined: &str) -> Vec<String> {
        self.responses
            .lock()
            .expect("lock poisoned")
            .iter()
            .find(|(p, _)| joined.contains(p))
            .map(|(_, lines)| lines.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl AdbBridge for ScriptedAdb {
    async fn run(&self, device: &str, args: &[String]) -> Result<Vec<String>, AdbError> {
        let joined = args.join(" ");
        self.record(device, &joined);
        if self.is_failure(&joined) {
            return Err(AdbError::CommandFailed {
                command: joined,
                code: 1,
                output: "scripted failure".into(),
            });
        }
        Ok(self.response_for(&joined))
    }

    async fn run_unchecked(
        &self,
        device: &str,
        args: &[String],
    ) -> Result<(i32, Vec<String>), AdbError> {
        let joined = args.join(" ");
        self.record(device, &joined);
        if self.is_failure(&joined) {
            return Ok((1, vec!["scripted failure".into()]));
        }
        Ok((0, self.response_for(&joined)))
    }

    async fn push(&self, device: &str, local: &Path, remote: &str) -> Result<(), AdbError> {
        let joined = format!("push {} {remote}", local.display());
        self.record(device, &joined);
        if self.is_failure(&joined) {
            return Err(AdbError::CommandFailed {
                command: joined,
                code: 1,
                output: "scripted failure".into(),
            });
        }
        self.pushes
            .lock()
            .expect("lock poisoned")
            .push((local.to_path_buf(), remote.to_string()));
        Ok(())
    }

    async fn run_server(
        &self,
        device: &str,
        shell_cmd: &str,
        stop: Arc<AtomicBool>,
    ) -> Result<ServerExit, AdbError> {
        self.record(device, &format!("shell {shell_cmd}"));
        let behavior = self.server.lock().expect("lock poisoned").clone();
        match behavior {
            ServerBehavior::ExitImmediately { code, output } => Ok(ServerExit { code, output }),
            ServerBehavior::RunUntilStopped { code } => {
                while !stop.load(Ordering::SeqCst) {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
                Ok(ServerExit {
                    code,
                    output: Vec::new(),
                })
            }
        }
    }
}

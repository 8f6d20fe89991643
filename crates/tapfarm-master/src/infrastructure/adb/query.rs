//! Typed helpers over the raw [`AdbBridge`] trait.
//!
//! Each function wraps one well-known adb invocation and parses its output:
//! property queries, the `wm size` screen probe, port forwarding, and the
//! existence/kill helpers the session managers need. Keeping the parsing
//! here (rather than in the sessions) keeps it unit-testable against a
//! mocked bridge.

use tapfarm_core::Size;
use tracing::warn;

use super::{AdbBridge, AdbError};

fn shell_args(parts: &[&str]) -> Vec<String> {
    let mut args = vec!["shell".to_string()];
    args.extend(parts.iter().map(|p| p.to_string()));
    args
}

/// `getprop ro.product.cpu.abi` — the CPU ABI, e.g. `arm64-v8a`.
pub async fn cpu_abi(bridge: &dyn AdbBridge, device: &str) -> Result<String, AdbError> {
    let out = bridge
        .run(device, &shell_args(&["getprop", "ro.product.cpu.abi"]))
        .await?;
    first_line(out, "getprop ro.product.cpu.abi")
}

/// `getprop ro.build.version.sdk` — the Android SDK level.
pub async fn sdk_version(bridge: &dyn AdbBridge, device: &str) -> Result<u32, AdbError> {
    let command = "getprop ro.build.version.sdk";
    let line = first_line(
        bridge
            .run(device, &shell_args(&["getprop", "ro.build.version.sdk"]))
            .await?,
        command,
    )?;
    line.trim().parse().map_err(|_| AdbError::UnexpectedOutput {
        command: command.into(),
        output: line,
    })
}

/// `wm size` — the physical screen size, parsed from
/// `Physical size: <width>x<height>`.
pub async fn screen_size(bridge: &dyn AdbBridge, device: &str) -> Result<Size, AdbError> {
    let command = "wm size";
    let line = first_line(bridge.run(device, &shell_args(&["wm", "size"])).await?, command)?;

    let parsed = line
        .split(':')
        .nth(1)
        .map(str::trim)
        .and_then(|wh| wh.split_once('x'))
        .and_then(|(w, h)| Some(Size::new(w.parse().ok()?, h.parse().ok()?)));

    parsed.ok_or_else(|| AdbError::UnexpectedOutput {
        command: command.into(),
        output: line,
    })
}

/// Remote file existence via `ls`: adb prints a `No such` diagnostic when
/// the path is absent, and the exit code is ignored because old devices
/// return 0 either way.
pub async fn file_exists(
    bridge: &dyn AdbBridge,
    device: &str,
    path: &str,
) -> Result<bool, AdbError> {
    let (_, output) = bridge
        .run_unchecked(device, &shell_args(&["ls", path]))
        .await?;
    Ok(!output.iter().any(|line| line.contains("No such")))
}

/// `forward tcp:<port> localabstract:<socket_name>`.
pub async fn forward(
    bridge: &dyn AdbBridge,
    device: &str,
    port: u16,
    socket_name: &str,
) -> Result<(), AdbError> {
    bridge
        .run(
            device,
            &[
                "forward".to_string(),
                format!("tcp:{port}"),
                format!("localabstract:{socket_name}"),
            ],
        )
        .await?;
    Ok(())
}

/// `forward --remove tcp:<port>`, ignoring errors: forwarding twice on the
/// same port without a removal is a known failure mode of the tool, so
/// every forward is preceded by a best-effort remove that may legitimately
/// find nothing to remove.
pub async fn remove_forward(bridge: &dyn AdbBridge, device: &str, port: u16) -> Result<(), AdbError> {
    let _ = bridge
        .run_unchecked(
            device,
            &[
                "forward".to_string(),
                "--remove".to_string(),
                format!("tcp:{port}"),
            ],
        )
        .await?;
    Ok(())
}

/// `shell kill <pid>`, ignoring errors (the process may already be gone).
pub async fn kill_process(bridge: &dyn AdbBridge, device: &str, pid: u32) -> Result<(), AdbError> {
    let pid = pid.to_string();
    let _ = bridge
        .run_unchecked(device, &shell_args(&["kill", &pid]))
        .await?;
    Ok(())
}

/// Finds the PID of an on-device process by scanning `ps` output for the
/// binary name. Best effort: returns `None` (with a warning) when the
/// listing cannot be obtained or parsed.
pub async fn find_pid(bridge: &dyn AdbBridge, device: &str, binary: &str) -> Option<u32> {
    let listing = match bridge.run(device, &shell_args(&["ps"])).await {
        Ok(lines) => lines,
        Err(e) => {
            warn!(device, binary, "ps listing failed: {e}");
            return None;
        }
    };

    // ps format: USER PID PPID VSZ RSS WCHAN ADDR S NAME — the PID is the
    // second column.
    listing
        .iter()
        .find(|line| line.contains(binary))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|pid| pid.parse().ok())
}

fn first_line(output: Vec<String>, command: &str) -> Result<String, AdbError> {
    output
        .into_iter()
        .find(|l| !l.trim().is_empty())
        .ok_or_else(|| AdbError::UnexpectedOutput {
            command: command.into(),
            output: String::new(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::adb::MockAdbBridge;
    use mockall::predicate::{always, eq};

    fn lines(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_sdk_version_parses_property_output() {
        let mut bridge = MockAdbBridge::new();
        bridge
            .expect_run()
            .with(eq("serial-1"), always())
            .returning(|_, _| Ok(lines(&["30"])));

        let sdk = sdk_version(&bridge, "serial-1").await.expect("sdk");
        assert_eq!(sdk, 30);
    }

    #[tokio::test]
    async fn test_sdk_version_rejects_garbage() {
        let mut bridge = MockAdbBridge::new();
        bridge
            .expect_run()
            .returning(|_, _| Ok(lines(&["not-a-number"])));

        let err = sdk_version(&bridge, "d").await.unwrap_err();
        assert!(matches!(err, AdbError::UnexpectedOutput { .. }));
    }

    #[tokio::test]
    async fn test_screen_size_parses_wm_size() {
        let mut bridge = MockAdbBridge::new();
        bridge
            .expect_run()
            .returning(|_, _| Ok(lines(&["Physical size: 1080x1920"])));

        let size = screen_size(&bridge, "d").await.expect("size");
        assert_eq!(size, Size::new(1080, 1920));
    }

    #[tokio::test]
    async fn test_file_exists_detects_no_such_diagnostic() {
        let mut bridge = MockAdbBridge::new();
        bridge.expect_run_unchecked().returning(|_, _| {
            Ok((
                0,
                lines(&["ls: /data/local/tmp/minitouch: No such file or directory"]),
            ))
        });

        assert!(!file_exists(&bridge, "d", "/data/local/tmp/minitouch")
            .await
            .expect("exists"));
    }

    #[tokio::test]
    async fn test_file_exists_true_on_listing() {
        let mut bridge = MockAdbBridge::new();
        bridge
            .expect_run_unchecked()
            .returning(|_, _| Ok((0, lines(&["/data/local/tmp/minitouch"]))));

        assert!(file_exists(&bridge, "d", "/data/local/tmp/minitouch")
            .await
            .expect("exists"));
    }

    #[tokio::test]
    async fn test_find_pid_parses_second_column() {
        let mut bridge = MockAdbBridge::new();
        bridge.expect_run().returning(|_, _| {
            Ok(lines(&[
                "USER   PID  PPID VSZ    RSS  WCHAN ADDR S NAME",
                "shell  31976 31974 2169772 6832 0    0    S minicap",
            ]))
        });

        assert_eq!(find_pid(&bridge, "d", "minicap").await, Some(31976));
    }

    #[tokio::test]
    async fn test_forward_issues_expected_arguments() {
        let mut bridge = MockAdbBridge::new();
        bridge
            .expect_run()
            .withf(|device, args| {
                device == "serial-1"
                    && args == ["forward", "tcp:1601", "localabstract:minitouch"]
            })
            .returning(|_, _| Ok(Vec::new()));

        forward(&bridge, "serial-1", 1601, "minitouch")
            .await
            .expect("forward");
    }
}

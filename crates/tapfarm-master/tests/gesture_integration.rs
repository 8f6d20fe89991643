//! Integration tests for the gesture API over live touch sessions.
//!
//! These tests run the full publish path: `GestureDriver` builds a script,
//! fans it out through the `TouchServer` sessions, and a local
//! `TcpListener` standing in for minitouch records exactly what hit the
//! wire. Assertions are made on the recorded command text, which is what a
//! real device would replay.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::{mpsc, Mutex};

use tapfarm_core::{Point, TouchScript};
use tapfarm_master::application::continuity::{tap_continuity, ContinuityOptions};
use tapfarm_master::application::gestures::{GestureDriver, GestureError, PublishFailure};
use tapfarm_master::infrastructure::adb::mock::ScriptedAdb;
use tapfarm_master::infrastructure::session::touch::TouchServer;
use tapfarm_master::infrastructure::storage::config::TouchConfig;

const HANDSHAKE: &[u8] = b"v 1\n^ 2 1080 1920 50\n$ 4321\n";

async fn minitouch_fixture() -> (u16, Arc<Mutex<Vec<u8>>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind fixture");
    let port = listener.local_addr().expect("local addr").port();
    let received = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&received);
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let sink = Arc::clone(&sink);
            tokio::spawn(async move {
                if socket.write_all(HANDSHAKE).await.is_err() {
                    return;
                }
                let mut buf = [0u8; 1024];
                loop {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => sink.lock().await.extend_from_slice(&buf[..n]),
                    }
                }
            });
        }
    });

    (port, received)
}

/// Starts one touch session against the fixture and returns the server
/// plus the fixture's capture buffer.
async fn running_server(device: &str) -> (TouchServer, Arc<Mutex<Vec<u8>>>) {
    let (port, received) = minitouch_fixture().await;
    let adb = ScriptedAdb::new();
    adb.respond("ro.build.version.sdk", &["25"]);
    let (tx, _rx) = mpsc::unbounded_channel();
    let config = TouchConfig {
        port_start: port,
        port_end: port,
        start_timeout_ms: 2000,
        settle_delay_ms: 0,
        recv_buffer: 0,
    };
    let mut server = TouchServer::new(Arc::new(adb), config, tx);
    server.start_device_server(device).await.expect("session starts");
    (server, received)
}

async fn captured_text(received: &Arc<Mutex<Vec<u8>>>) -> String {
    String::from_utf8(received.lock().await.clone()).expect("utf-8 wire text")
}

// ── Publish semantics ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_publish_appends_trailing_commit_and_drains_script() {
    let (server, received) = running_server("serial-1").await;
    let driver = GestureDriver::new(&server);

    let mut script = TouchScript::new();
    script.down(0, 10, 20, 30);
    script.up(0);

    let report = driver
        .publish(&mut script, &["serial-1"])
        .await
        .expect("publish");

    assert!(report.all_ok());
    assert!(script.is_empty());
    assert_eq!(captured_text(&received).await, "d 0 10 20 30\nu 0\nc\n");
}

#[tokio::test]
async fn test_publish_with_no_targets_is_an_error() {
    let (server, _received) = running_server("serial-1").await;
    let driver = GestureDriver::new(&server);

    let mut script = TouchScript::new();
    script.down(0, 10, 20, 30);

    let err = driver.publish(&mut script, &[]).await.unwrap_err();
    assert!(matches!(err, GestureError::NoTargets));
    // Nothing was consumed; the caller can retry with targets.
    assert!(!script.is_empty());
}

#[tokio::test]
async fn test_publish_reports_per_device_failures() {
    let (server, received) = running_server("serial-1").await;
    let driver = GestureDriver::new(&server);

    let mut script = TouchScript::new();
    script.down(0, 10, 20, 30);

    // One live device, one that was never started: the live one still
    // receives the script and only the ghost is reported failed.
    let report = driver
        .publish(&mut script, &["serial-1", "ghost"])
        .await
        .expect("publish");

    assert!(!report.all_ok());
    assert_eq!(report.failed_devices(), vec!["ghost"]);
    assert!(captured_text(&received).await.starts_with("d 0 10 20 30"));
}

#[tokio::test]
async fn test_publish_to_disconnected_handle_reports_not_connected() {
    let (server, _received) = running_server("serial-1").await;

    // Another holder of the shared handle (a worker, a racing stop) may
    // disconnect it while the session entry is still in the registry.
    let handle = server.connection("serial-1").expect("shared handle");
    handle.lock().await.disconnect().await;

    let driver = GestureDriver::new(&server);
    let mut script = TouchScript::new();
    script.down(0, 1, 1, 1);

    let report = driver
        .publish(&mut script, &["serial-1"])
        .await
        .expect("publish");

    assert!(!report.all_ok());
    assert!(matches!(
        report.results[0].1,
        Err(PublishFailure::NotConnected)
    ));
}

// ── Gestures ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_tap_defaults_to_panel_center_and_clamps_pressure() {
    let (server, received) = running_server("serial-1").await;
    let driver = GestureDriver::new(&server);

    // Requested pressure 200 exceeds the handshake maximum of 50.
    let report = driver
        .tap(&["serial-1"], None, None, 1, 100, 200)
        .await
        .expect("tap");

    assert!(report.all_ok());
    let text = captured_text(&received).await;
    // Panel 1080x1920 → centre (540, 960); 100ms tap → 50ms per half.
    assert_eq!(text, "d 0 540 960 50\nw 50\nc\nu 0\nw 50\nc\nc\n");
}

#[tokio::test]
async fn test_long_press_holds_for_duration() {
    let (server, received) = running_server("serial-1").await;
    let driver = GestureDriver::new(&server);

    driver
        .long_press(&["serial-1"], Some(100), Some(200), 120, 40)
        .await
        .expect("long press");

    assert_eq!(
        captured_text(&received).await,
        "d 0 100 200 40\nw 120\nc\nu 0\nc\n"
    );
}

#[tokio::test]
async fn test_swipe_interpolates_and_spreads_duration() {
    let (server, received) = running_server("serial-1").await;
    let driver = GestureDriver::new(&server);

    let track = [Point::new(0, 0), Point::new(100, 0)];
    driver
        .swipe(&["serial-1"], &track, 100, 50, 25, true, true)
        .await
        .expect("swipe");

    let text = captured_text(&received).await;
    // 100px over step 25 → points every 25px, 25ms of wait per point.
    assert!(text.starts_with("d 0 0 0 50\nc\n"));
    for x in [0, 25, 50, 75, 100] {
        assert!(text.contains(&format!("m 0 {x} 0 50\nw 25\nc\n")), "missing move to {x}: {text}");
    }
    assert!(text.ends_with("u 0\nc\n"));
}

#[tokio::test]
async fn test_directional_swipe_uses_panel_defaults_and_forwards_pressure() {
    let (server, received) = running_server("serial-1").await;
    let driver = GestureDriver::new(&server);

    driver
        .swipe_up(&["serial-1"], None, None, None, 0, 40, 0)
        .await
        .expect("swipe up");

    let text = captured_text(&received).await;
    // Panel 1920 high: length 640, start centred at 960 + 320; the
    // caller's pressure of 40 rides along on every command.
    assert!(text.starts_with("d 0 540 1280 40\nc\n"), "wire text: {text}");
    assert!(text.contains("m 0 540 640 40\n"), "wire text: {text}");
}

#[tokio::test]
async fn test_directional_swipe_clamps_pressure_to_panel_maximum() {
    let (server, received) = running_server("serial-1").await;
    let driver = GestureDriver::new(&server);

    driver
        .swipe_right(&["serial-1"], None, None, None, 0, 200, 0)
        .await
        .expect("swipe right");

    let text = captured_text(&received).await;
    // Handshake maximum is 50.
    assert!(text.starts_with("d 0 360 960 50\nc\n"), "wire text: {text}");
}

#[tokio::test]
async fn test_gesture_against_unstarted_device_is_not_started() {
    let (server, _received) = running_server("serial-1").await;
    let driver = GestureDriver::new(&server);

    let err = driver
        .tap(&["ghost"], None, None, 1, 0, 50)
        .await
        .unwrap_err();
    assert!(matches!(err, GestureError::NotStarted { .. }));
}

// ── Continuity tapping ────────────────────────────────────────────────────────

#[tokio::test]
async fn test_continuity_taps_seed_points_until_deadline() {
    let (server, received) = running_server("serial-1").await;

    let seed = [Point::new(111, 222)];
    let options = ContinuityOptions {
        workers_per_device: 2,
        random_sleep: false,
        pressure: 200,
        ..ContinuityOptions::default()
    };
    tap_continuity(
        &server,
        &["serial-1"],
        &seed,
        Duration::from_millis(200),
        &options,
    )
    .await
    .expect("continuity run");

    let text = captured_text(&received).await;
    // Every tap targets a seed point with the clamped pressure.
    assert!(text.contains("d 0 111 222 50\n"), "wire text: {text}");
    assert!(text.contains("u 0\n"));

    // The run wound down cooperatively: the connection is still usable.
    let driver = GestureDriver::new(&server);
    let report = driver
        .tap(&["serial-1"], None, None, 1, 0, 50)
        .await
        .expect("tap after continuity");
    assert!(report.all_ok());
}

#[tokio::test]
async fn test_continuity_rejects_empty_seed() {
    let (server, _received) = running_server("serial-1").await;

    let err = tap_continuity(
        &server,
        &["serial-1"],
        &[],
        Duration::from_millis(50),
        &ContinuityOptions::default(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, GestureError::EmptySeed));
}

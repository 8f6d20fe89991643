//! The high-level gesture API.
//!
//! [`GestureDriver`] turns gestures (tap, long press, swipe) into touch
//! scripts and publishes them to one or more devices through the sessions
//! held by a [`TouchServer`]. A publish fans out one prepared script to
//! every target; each device succeeds or fails independently and the
//! caller receives a [`PublishReport`] with the per-device outcomes, so a
//! single unplugged phone does not abort a farm-wide gesture.
//!
//! Defaults (tap at the panel centre, swipe one third of a dimension) and
//! all coordinate math live in `tapfarm_core`; this module only wires them
//! to live connections.

use std::time::Duration;

use tapfarm_core::domain::gesture::{self, Point, SwipeDirection};
use tapfarm_core::{clamp_pressure, interpolate, per_point_wait, Handshake, Size, TouchScript};
use thiserror::Error;
use tracing::{debug, warn};

use crate::infrastructure::adb::DeviceSerial;
use crate::infrastructure::session::connection::ConnectionError;
use crate::infrastructure::session::touch::TouchServer;

/// Default pressure when the caller does not care.
pub const DEFAULT_PRESSURE: u32 = 50;

/// Error type for gesture publication.
#[derive(Debug, Error)]
pub enum GestureError {
    /// `publish` was called with no target devices. Silent no-ops here hide
    /// wiring bugs, so this is an error rather than an empty report.
    #[error("publish requires at least one target device")]
    NoTargets,

    /// A target device has no running touch session.
    #[error("device {device} has no running touch session")]
    NotStarted { device: String },

    /// Continuity tapping was asked to sample from an empty point seed.
    #[error("continuity tapping requires at least one seed point")]
    EmptySeed,
}

/// Why one device in a publish fan-out failed.
#[derive(Debug, Error)]
pub enum PublishFailure {
    /// The device's session holds no live connection.
    #[error("no live touch connection")]
    NotConnected,

    /// The socket write (or optional read) failed.
    #[error(transparent)]
    Connection(#[from] ConnectionError),
}

/// Per-device outcomes of one publish fan-out.
#[derive(Debug)]
pub struct PublishReport {
    pub results: Vec<(DeviceSerial, Result<(), PublishFailure>)>,
}

impl PublishReport {
    /// True when every target device accepted the script.
    pub fn all_ok(&self) -> bool {
        self.results.iter().all(|(_, r)| r.is_ok())
    }

    /// The serials that failed, for retry or eviction decisions.
    pub fn failed_devices(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter(|(_, r)| r.is_err())
            .map(|(d, _)| d.as_str())
            .collect()
    }
}

/// Builds and publishes touch scripts over the sessions of a
/// [`TouchServer`].
pub struct GestureDriver<'a> {
    server: &'a TouchServer,
}

impl<'a> GestureDriver<'a> {
    pub fn new(server: &'a TouchServer) -> Self {
        Self { server }
    }

    /// Sends a finished script to every device in `devices`.
    ///
    /// The script is finalized (implicit trailing commit) and drained; the
    /// same builder can be reused for the next gesture afterwards. After
    /// the fan-out the driver sleeps for the script's accumulated wait time
    /// plus the configured settle delay, so back-to-back gestures do not
    /// overlap on the devices.
    ///
    /// # Errors
    ///
    /// [`GestureError::NoTargets`] when `devices` is empty. Per-device
    /// failures are not errors: they are reported in the returned
    /// [`PublishReport`].
    pub async fn publish(
        &self,
        script: &mut TouchScript,
        devices: &[&str],
    ) -> Result<PublishReport, GestureError> {
        if devices.is_empty() {
            return Err(GestureError::NoTargets);
        }

        let (text, delay_ms) = script.finish();
        debug!(
            targets = devices.len(),
            lines = text.lines().count(),
            delay_ms,
            "publishing touch script"
        );

        let mut results = Vec::with_capacity(devices.len());
        for &device in devices {
            let result = match self.server.connection(device) {
                None => Err(PublishFailure::NotConnected),
                Some(connection) => {
                    let mut connection = connection.lock().await;
                    // A shared handle may have been disconnected by another
                    // holder (a crashed continuity worker, a racing stop).
                    if connection.is_connected() {
                        connection
                            .send(&text)
                            .await
                            .map(|_| ())
                            .map_err(PublishFailure::from)
                    } else {
                        Err(PublishFailure::NotConnected)
                    }
                }
            };
            if let Err(failure) = &result {
                warn!(device, "publish failed: {failure}");
            }
            results.push((device.to_string(), result));
        }

        tokio::time::sleep(Duration::from_millis(delay_ms) + self.server.settle_delay()).await;
        Ok(PublishReport { results })
    }

    /// Taps `count` times at `(x, y)`, defaulting to the panel centre.
    ///
    /// `duration_ms` is the total on-screen time of the whole burst; each
    /// press and each release waits half of an even share of it.
    pub async fn tap(
        &self,
        devices: &[&str],
        x: Option<i32>,
        y: Option<i32>,
        count: u32,
        duration_ms: u64,
        pressure: u32,
    ) -> Result<PublishReport, GestureError> {
        let caps = self.capabilities(devices)?;
        let panel = panel_of(&caps);
        let center = gesture::center(panel);

        let mut script = tap_script(
            x.unwrap_or(center.x),
            y.unwrap_or(center.y),
            clamp_pressure(pressure, caps.max_pressure),
            count.max(1),
            duration_ms,
        );
        self.publish(&mut script, devices).await
    }

    /// Presses at `(x, y)` (default: panel centre) and holds for
    /// `duration_ms` before lifting.
    pub async fn long_press(
        &self,
        devices: &[&str],
        x: Option<i32>,
        y: Option<i32>,
        duration_ms: u64,
        pressure: u32,
    ) -> Result<PublishReport, GestureError> {
        let caps = self.capabilities(devices)?;
        let panel = panel_of(&caps);
        let center = gesture::center(panel);

        let mut script = TouchScript::new();
        script.down(
            0,
            x.unwrap_or(center.x),
            y.unwrap_or(center.y),
            clamp_pressure(pressure, caps.max_pressure),
        );
        script.wait(duration_ms);
        script.commit();
        script.up(0);
        self.publish(&mut script, devices).await
    }

    /// Drags a contact along `points`, interpolating extra points whenever
    /// consecutive ones are further apart than `smooth_step`, and spreading
    /// `duration_ms` evenly across the resulting track.
    ///
    /// `with_down`/`with_up` control whether the contact is pressed before
    /// and lifted after the motion; disabling them lets callers chain
    /// several swipes into one continuous drag.
    #[allow(clippy::too_many_arguments)]
    pub async fn swipe(
        &self,
        devices: &[&str],
        points: &[Point],
        duration_ms: u64,
        pressure: u32,
        smooth_step: u32,
        with_down: bool,
        with_up: bool,
    ) -> Result<PublishReport, GestureError> {
        let caps = self.capabilities(devices)?;
        let pressure = clamp_pressure(pressure, caps.max_pressure);

        let track = interpolate(points, smooth_step);
        let wait = per_point_wait(duration_ms, track.len());

        let mut script = TouchScript::new();
        if with_down {
            if let Some(first) = track.first() {
                script.down(0, first.x, first.y, pressure);
                script.commit();
            }
        }
        for point in &track {
            script.move_to(0, point.x, point.y, pressure);
            if wait > 0 {
                script.wait(wait);
            }
            script.commit();
        }
        if with_up {
            script.up(0);
        }
        self.publish(&mut script, devices).await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn swipe_up(
        &self,
        devices: &[&str],
        x: Option<i32>,
        y: Option<i32>,
        swipe_len: Option<i32>,
        duration_ms: u64,
        pressure: u32,
        smooth_step: u32,
    ) -> Result<PublishReport, GestureError> {
        self.directional_swipe(
            SwipeDirection::Up,
            devices,
            x,
            y,
            swipe_len,
            duration_ms,
            pressure,
            smooth_step,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn swipe_down(
        &self,
        devices: &[&str],
        x: Option<i32>,
        y: Option<i32>,
        swipe_len: Option<i32>,
        duration_ms: u64,
        pressure: u32,
        smooth_step: u32,
    ) -> Result<PublishReport, GestureError> {
        self.directional_swipe(
            SwipeDirection::Down,
            devices,
            x,
            y,
            swipe_len,
            duration_ms,
            pressure,
            smooth_step,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn swipe_left(
        &self,
        devices: &[&str],
        x: Option<i32>,
        y: Option<i32>,
        swipe_len: Option<i32>,
        duration_ms: u64,
        pressure: u32,
        smooth_step: u32,
    ) -> Result<PublishReport, GestureError> {
        self.directional_swipe(
            SwipeDirection::Left,
            devices,
            x,
            y,
            swipe_len,
            duration_ms,
            pressure,
            smooth_step,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn swipe_right(
        &self,
        devices: &[&str],
        x: Option<i32>,
        y: Option<i32>,
        swipe_len: Option<i32>,
        duration_ms: u64,
        pressure: u32,
        smooth_step: u32,
    ) -> Result<PublishReport, GestureError> {
        self.directional_swipe(
            SwipeDirection::Right,
            devices,
            x,
            y,
            swipe_len,
            duration_ms,
            pressure,
            smooth_step,
        )
        .await
    }

    #[allow(clippy::too_many_arguments)]
    async fn directional_swipe(
        &self,
        direction: SwipeDirection,
        devices: &[&str],
        x: Option<i32>,
        y: Option<i32>,
        swipe_len: Option<i32>,
        duration_ms: u64,
        pressure: u32,
        smooth_step: u32,
    ) -> Result<PublishReport, GestureError> {
        let caps = self.capabilities(devices)?;
        let track = direction.track(panel_of(&caps), x, y, swipe_len);
        self.swipe(devices, &track, duration_ms, pressure, smooth_step, true, true)
            .await
    }

    /// Panel capabilities for default-coordinate math, taken from the first
    /// target device. Mixed-resolution farms should pass explicit
    /// coordinates instead.
    fn capabilities(&self, devices: &[&str]) -> Result<Handshake, GestureError> {
        let first = devices.first().ok_or(GestureError::NoTargets)?;
        self.server
            .capabilities(first)
            .ok_or_else(|| GestureError::NotStarted {
                device: first.to_string(),
            })
    }
}

fn panel_of(caps: &Handshake) -> Size {
    Size::new(caps.max_x, caps.max_y)
}

/// Builds the script for a burst of `count` taps at one point.
///
/// Each tap is down–wait–commit, up–wait–commit, with the wait set to half
/// of this tap's even share of `duration_ms`.
pub(crate) fn tap_script(x: i32, y: i32, pressure: u32, count: u32, duration_ms: u64) -> TouchScript {
    let wait = if duration_ms > 0 {
        ((duration_ms as f64 / f64::from(count)) / 2.0).ceil() as u64
    } else {
        0
    };

    let mut script = TouchScript::new();
    for _ in 0..count {
        script.down(0, x, y, pressure);
        if wait > 0 {
            script.wait(wait);
        }
        script.commit();
        script.up(0);
        if wait > 0 {
            script.wait(wait);
        }
        script.commit();
    }
    script
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tap_script_single_tap_layout() {
        let mut script = tap_script(100, 200, 50, 1, 100);
        let (text, delay) = script.finish();
        assert_eq!(text, "d 0 100 200 50\nw 50\nc\nu 0\nw 50\nc\nc\n");
        assert_eq!(delay, 100);
    }

    #[test]
    fn test_tap_script_burst_splits_duration_per_tap() {
        // 3 taps over 300ms: each tap gets 100ms, so 50ms per half.
        let script = tap_script(0, 0, 50, 3, 300);
        assert_eq!(script.delay_ms(), 300);
    }

    #[test]
    fn test_tap_script_zero_duration_emits_no_waits() {
        let mut script = tap_script(0, 0, 50, 2, 0);
        let (text, delay) = script.finish();
        assert!(!text.contains('w'));
        assert_eq!(delay, 0);
    }

    #[test]
    fn test_tap_script_wait_rounds_up() {
        // duration 10 over 3 taps: 10/3/2 = 1.67 → 2ms per half.
        let script = tap_script(0, 0, 50, 3, 10);
        assert_eq!(script.delay_ms(), 12);
    }
}

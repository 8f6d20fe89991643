//! Sustained random tapping across a device farm.
//!
//! [`tap_continuity`] spawns a small pool of workers per device that keep
//! tapping random points from a seed list until the requested duration
//! elapses. Shutdown is cooperative: every worker checks a shared stop
//! flag and the deadline between taps, so the whole run winds down within
//! one tap cycle of the deadline instead of being aborted mid-write.
//!
//! Workers sharing a device serialize on the connection's async mutex;
//! the extra workers per device keep the pipe busy while one of them
//! sleeps out its script delay.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tapfarm_core::{clamp_pressure, Point};
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::gestures::{tap_script, GestureError, DEFAULT_PRESSURE};
use crate::infrastructure::session::connection::TouchConnection;
use crate::infrastructure::session::touch::TouchServer;

/// Duration of each individual tap in a continuity run.
const TAP_DURATION_MS: u64 = 10;

/// Tuning knobs for a continuity run.
#[derive(Debug, Clone)]
pub struct ContinuityOptions {
    /// Concurrent workers tapping each device.
    pub workers_per_device: usize,
    /// Whether workers pause a random interval between taps.
    pub random_sleep: bool,
    /// Shortest random pause, milliseconds.
    pub sleep_min_ms: u64,
    /// Longest random pause, milliseconds.
    pub sleep_max_ms: u64,
    /// Requested tap pressure, clamped to each device's panel maximum.
    pub pressure: u32,
}

impl Default for ContinuityOptions {
    fn default() -> Self {
        Self {
            workers_per_device: 2,
            random_sleep: true,
            sleep_min_ms: 10,
            sleep_max_ms: 100,
            pressure: DEFAULT_PRESSURE,
        }
    }
}

/// Taps random points from `seed` on every device for `duration`.
///
/// Every target device must already have a running touch session; the run
/// fails up front otherwise, before any worker starts.
///
/// # Errors
///
/// [`GestureError::NoTargets`] / [`GestureError::EmptySeed`] on empty
/// inputs, [`GestureError::NotStarted`] when a device has no session.
pub async fn tap_continuity(
    server: &TouchServer,
    devices: &[&str],
    seed: &[Point],
    duration: Duration,
    options: &ContinuityOptions,
) -> Result<(), GestureError> {
    if devices.is_empty() {
        return Err(GestureError::NoTargets);
    }
    if seed.is_empty() {
        return Err(GestureError::EmptySeed);
    }

    // Validate every device before spawning anything.
    let mut targets = Vec::with_capacity(devices.len());
    for &device in devices {
        let connection = server
            .connection(device)
            .ok_or_else(|| GestureError::NotStarted {
                device: device.to_string(),
            })?;
        let caps = server
            .capabilities(device)
            .ok_or_else(|| GestureError::NotStarted {
                device: device.to_string(),
            })?;
        targets.push((device, connection, clamp_pressure(options.pressure, caps.max_pressure)));
    }

    let stop = Arc::new(AtomicBool::new(false));
    let deadline = Instant::now() + duration;
    let settle = server.settle_delay();
    let workers_per_device = options.workers_per_device.max(1);

    let mut workers = Vec::with_capacity(targets.len() * workers_per_device);
    for (device, connection, pressure) in targets {
        for worker in 0..workers_per_device {
            debug!(device, worker, "starting continuity tap worker");
            workers.push(tokio::spawn(tap_worker(
                Arc::clone(&connection),
                seed.to_vec(),
                pressure,
                Arc::clone(&stop),
                deadline,
                options.clone(),
                settle,
            )));
        }
    }

    info!(
        devices = devices.len(),
        workers = workers.len(),
        duration_ms = duration.as_millis() as u64,
        "continuity tapping started"
    );

    tokio::time::sleep_until(deadline).await;
    stop.store(true, Ordering::SeqCst);
    for worker in workers {
        let _ = worker.await;
    }
    info!("continuity tapping finished");
    Ok(())
}

async fn tap_worker(
    connection: Arc<Mutex<TouchConnection>>,
    seed: Vec<Point>,
    pressure: u32,
    stop: Arc<AtomicBool>,
    deadline: Instant,
    options: ContinuityOptions,
    settle: Duration,
) {
    while !stop.load(Ordering::SeqCst) && Instant::now() < deadline {
        // The rng is not Send, so sample before the awaits.
        let (point, pause_ms) = {
            let mut rng = rand::thread_rng();
            let point = seed[rng.gen_range(0..seed.len())];
            let pause_ms = if options.random_sleep && options.sleep_max_ms > options.sleep_min_ms {
                rng.gen_range(options.sleep_min_ms..=options.sleep_max_ms)
            } else if options.random_sleep {
                options.sleep_min_ms
            } else {
                0
            };
            (point, pause_ms)
        };

        let mut script = tap_script(point.x, point.y, pressure, 1, TAP_DURATION_MS);
        let (text, delay_ms) = script.finish();

        {
            let mut connection = connection.lock().await;
            if let Err(e) = connection.send(&text).await {
                warn!("continuity worker stopping, send failed: {e}");
                return;
            }
        }

        tokio::time::sleep(Duration::from_millis(delay_ms + pause_ms) + settle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ContinuityOptions::default();
        assert_eq!(options.workers_per_device, 2);
        assert!(options.random_sleep);
        assert!(options.sleep_min_ms <= options.sleep_max_ms);
    }
}

//! Application layer: use cases built on the session infrastructure.
//!
//! - [`gestures`] – the high-level touch API (tap, long press, swipes) and
//!   the script publisher with per-device results.
//! - [`continuity`] – sustained random tapping across devices with
//!   cooperative worker shutdown.

pub mod continuity;
pub mod gestures;

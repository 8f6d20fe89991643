//! Pure geometry with no OS or I/O dependencies.
//!
//! - [`gesture`] – touch-point interpolation, default tap/swipe coordinate
//!   computation, pressure clamping.
//! - [`screen`] – aspect-locked display sizing and the minicap projection
//!   string.

pub mod gesture;
pub mod screen;

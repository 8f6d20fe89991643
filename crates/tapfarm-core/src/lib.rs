//! # tapfarm-core
//!
//! Shared library for tapfarm containing the minitouch wire protocol
//! (handshake parsing and the touch command script builder) and the pure
//! geometry used by the controller: gesture interpolation, swipe defaults,
//! and minicap screen sizing.
//!
//! This crate is used by the master application and by its integration
//! tests. It has zero dependencies on OS APIs, subprocesses, or network
//! sockets — everything here operates on strings and numbers, which is what
//! makes the protocol and geometry independently testable.
//!
//! # Module map
//!
//! - **`protocol`** – The minitouch text protocol: the three-line handshake
//!   a freshly connected server sends (`v` / `^` / `$`), and
//!   [`TouchScript`], which accumulates `d`/`m`/`u`/`w`/`c` command lines
//!   into one batch that the device driver applies atomically per commit.
//!
//! - **`domain`** – Pure geometry. Linear interpolation that smooths drag
//!   gestures, default tap/swipe coordinate computation, pressure clamping,
//!   and the aspect-locked sizing rules for the minicap projection.

pub mod domain;
pub mod protocol;

// Re-export the most-used types at the crate root so callers can write
// `tapfarm_core::TouchScript` instead of the full path.
pub use domain::gesture::{clamp_pressure, interpolate, per_point_wait, Point};
pub use domain::screen::{fit_size, AspectLock, Orientation, Size};
pub use protocol::handshake::{Handshake, ProtocolError};
pub use protocol::script::TouchScript;

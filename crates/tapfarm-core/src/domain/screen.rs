//! Screen sizing for the minicap stream.
//!
//! minicap is told how to render via a projection argument
//! `-P <real_w>x<real_h>@<canvas_w>x<canvas_h>/<orientation>`. Callers
//! usually want a scaled-down canvas without distorting the image, so the
//! requested size goes through an aspect lock: one dimension is taken
//! verbatim from the request and the other is recomputed from the device's
//! real aspect ratio. Locking never changes the locking dimension.

use std::fmt;

/// A width × height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Size {
    pub width: u32,
    pub height: u32,
}

impl Size {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for Size {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Display rotation supported by minicap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Orientation {
    /// The rotation in degrees, as minicap expects it on the command line.
    pub fn degrees(self) -> u32 {
        match self {
            Orientation::Deg0 => 0,
            Orientation::Deg90 => 90,
            Orientation::Deg180 => 180,
            Orientation::Deg270 => 270,
        }
    }

    /// Parses a degree value; anything but 0/90/180/270 is rejected.
    pub fn from_degrees(deg: u32) -> Option<Self> {
        match deg {
            0 => Some(Orientation::Deg0),
            90 => Some(Orientation::Deg90),
            180 => Some(Orientation::Deg180),
            270 => Some(Orientation::Deg270),
            _ => None,
        }
    }
}

/// Which requested dimension is kept verbatim when scaling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AspectLock {
    /// No lock: the requested size is used as-is.
    None,
    /// Keep the requested width, recompute the height from the real ratio.
    #[default]
    Width,
    /// Keep the requested height, recompute the width from the real ratio.
    Height,
}

/// Applies the aspect lock to a requested size.
///
/// With [`AspectLock::Width`] the height becomes
/// `ceil(real_h * requested_w / real_w)`; [`AspectLock::Height`] is
/// symmetric. The locking dimension is returned unchanged.
pub fn fit_size(real: Size, requested: Size, lock: AspectLock) -> Size {
    match lock {
        AspectLock::None => requested,
        AspectLock::Width => Size::new(
            requested.width,
            scale(real.height, requested.width, real.width),
        ),
        AspectLock::Height => Size::new(
            scale(real.width, requested.height, real.height),
            requested.height,
        ),
    }
}

/// `ceil(base * num / den)` in f64, matching the original computation.
fn scale(base: u32, num: u32, den: u32) -> u32 {
    (f64::from(base) * (f64::from(num) / f64::from(den))).ceil() as u32
}

/// Renders the minicap `-P` projection argument.
pub fn projection(real: Size, canvas: Size, orientation: Orientation) -> String {
    format!("{real}@{canvas}/{}", orientation.degrees())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fit_size_lock_by_width_recomputes_height() {
        // The requested height is irrelevant once the width is locked.
        let real = Size::new(1080, 1920);
        let fitted = fit_size(real, Size::new(540, 999_999), AspectLock::Width);
        assert_eq!(fitted, Size::new(540, 960));
    }

    #[test]
    fn test_fit_size_lock_by_height_recomputes_width() {
        let real = Size::new(1080, 1920);
        let fitted = fit_size(real, Size::new(999_999, 960), AspectLock::Height);
        assert_eq!(fitted, Size::new(540, 960));
    }

    #[test]
    fn test_fit_size_no_lock_passes_through() {
        let real = Size::new(1080, 1920);
        let fitted = fit_size(real, Size::new(300, 700), AspectLock::None);
        assert_eq!(fitted, Size::new(300, 700));
    }

    #[test]
    fn test_fit_size_rounds_up() {
        // 1920 * (541 / 1080) = 961.77… → 962.
        let real = Size::new(1080, 1920);
        let fitted = fit_size(real, Size::new(541, 0), AspectLock::Width);
        assert_eq!(fitted.height, 962);
    }

    #[test]
    fn test_projection_format() {
        let arg = projection(
            Size::new(1080, 1920),
            Size::new(540, 960),
            Orientation::Deg90,
        );
        assert_eq!(arg, "1080x1920@540x960/90");
    }

    #[test]
    fn test_orientation_from_degrees() {
        assert_eq!(Orientation::from_degrees(270), Some(Orientation::Deg270));
        assert_eq!(Orientation::from_degrees(45), None);
    }
}

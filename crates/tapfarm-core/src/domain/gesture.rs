//! Gesture geometry: interpolation, defaults, and clamping.
//!
//! High-level gestures are described by a handful of screen points; the
//! touch panel replays them verbatim. Sending only the endpoints of a drag
//! makes the cursor jump visibly, so [`interpolate`] inserts synthetic
//! intermediate points whenever two consecutive points are further apart
//! than the caller's `smooth_step`, trading extra protocol lines for a
//! smooth on-screen motion.
//!
//! The swipe-direction helpers reproduce the conventional defaults: start
//! at the screen centre, travel one third of the relevant dimension, and
//! never leave the panel's coordinate range.

use crate::domain::screen::Size;

/// A touch coordinate on the device panel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Point {
    pub x: i32,
    pub y: i32,
}

impl Point {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    pub fn distance(&self, other: &Point) -> f64 {
        let dx = f64::from(other.x - self.x);
        let dy = f64::from(other.y - self.y);
        (dx * dx + dy * dy).sqrt()
    }
}

/// Clamps a requested pressure to what the device panel reports it accepts.
pub fn clamp_pressure(requested: u32, max_pressure: u32) -> u32 {
    requested.min(max_pressure)
}

/// Inserts linearly spaced intermediate points between consecutive input
/// points whose distance exceeds `smooth_step`.
///
/// Per segment of length `D`, the number of inserted points is
/// `ceil(D / smooth_step) - 1` when that split count exceeds one, otherwise
/// none. Endpoints are always preserved. `smooth_step == 0` disables
/// interpolation entirely.
pub fn interpolate(points: &[Point], smooth_step: u32) -> Vec<Point> {
    if smooth_step == 0 || points.len() < 2 {
        return points.to_vec();
    }

    let mut out = Vec::with_capacity(points.len());
    out.push(points[0]);

    for pair in points.windows(2) {
        let (cur, next) = (pair[0], pair[1]);
        let distance = cur.distance(&next);

        let split_count = (distance / f64::from(smooth_step)).ceil() as i64;
        if split_count > 1 {
            let x_step = f64::from(next.x - cur.x) / split_count as f64;
            let y_step = f64::from(next.y - cur.y) / split_count as f64;
            for j in 1..split_count {
                out.push(Point::new(
                    (f64::from(cur.x) + x_step * j as f64).ceil() as i32,
                    (f64::from(cur.y) + y_step * j as f64).ceil() as i32,
                ));
            }
        }

        out.push(next);
    }

    out
}

/// Per-point wait for a swipe spread over `duration_ms`.
///
/// Zero when no duration was requested or when there is only a single
/// point; otherwise `ceil(duration / (point_count - 1))`.
pub fn per_point_wait(duration_ms: u64, point_count: usize) -> u64 {
    if duration_ms == 0 || point_count < 2 {
        return 0;
    }
    duration_ms.div_ceil(point_count as u64 - 1)
}

/// The centre of the panel, the default target for taps and long presses.
pub fn center(panel: Size) -> Point {
    Point::new(half_ceil(panel.width), half_ceil(panel.height))
}

/// Directions for the convenience swipe wrappers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SwipeDirection {
    Up,
    Down,
    Left,
    Right,
}

impl SwipeDirection {
    /// Computes the two-point track for a directional swipe.
    ///
    /// Unset values fall back to the defaults: the cross-axis coordinate is
    /// the panel centre, the length is one third of the travelled
    /// dimension, and the start is offset from the centre by half the
    /// length so the motion is centred. Both endpoints are clamped to
    /// `[0, dimension]`.
    pub fn track(
        self,
        panel: Size,
        x: Option<i32>,
        y: Option<i32>,
        swipe_len: Option<i32>,
    ) -> [Point; 2] {
        let w = panel.width as i32;
        let h = panel.height as i32;

        match self {
            SwipeDirection::Up => {
                let len = swipe_len.unwrap_or_else(|| third_ceil(panel.height));
                let x = x.unwrap_or_else(|| half_ceil(panel.width));
                let y = y.unwrap_or_else(|| (half_ceil(panel.height) + half_len(len)).min(h));
                [Point::new(x, y), Point::new(x, (y - len).max(0))]
            }
            SwipeDirection::Down => {
                let len = swipe_len.unwrap_or_else(|| third_ceil(panel.height));
                let x = x.unwrap_or_else(|| half_ceil(panel.width));
                let y = y.unwrap_or_else(|| (half_ceil(panel.height) - half_len(len)).max(0));
                [Point::new(x, y), Point::new(x, (y + len).min(h))]
            }
            SwipeDirection::Left => {
                let len = swipe_len.unwrap_or_else(|| third_ceil(panel.width));
                let y = y.unwrap_or_else(|| half_ceil(panel.height));
                let x = x.unwrap_or_else(|| (half_ceil(panel.width) + half_len(len)).min(w));
                [Point::new(x, y), Point::new((x - len).max(0), y)]
            }
            SwipeDirection::Right => {
                let len = swipe_len.unwrap_or_else(|| third_ceil(panel.width));
                let y = y.unwrap_or_else(|| half_ceil(panel.height));
                let x = x.unwrap_or_else(|| (half_ceil(panel.width) - half_len(len)).max(0));
                [Point::new(x, y), Point::new((x + len).min(w), y)]
            }
        }
    }
}

fn half_ceil(v: u32) -> i32 {
    (v as i32 + 1) / 2
}

fn third_ceil(v: u32) -> i32 {
    (v as i32 + 2) / 3
}

fn half_len(len: i32) -> i32 {
    (len + 1) / 2
}

#[cfg(test)]
mod tests {
    use super::*;

    fn panel() -> Size {
        Size::new(1080, 1920)
    }

    // ── Interpolation ────────────────────────────────────────────────────────

    #[test]
    fn test_interpolate_inserts_ceil_ratio_minus_one_points() {
        // Distance 100, step 30: ceil(100/30) = 4 → 3 inserted points.
        let points = [Point::new(0, 0), Point::new(100, 0)];
        let out = interpolate(&points, 30);
        assert_eq!(out.len(), 2 + 3);
        assert_eq!(out.first(), Some(&Point::new(0, 0)));
        assert_eq!(out.last(), Some(&Point::new(100, 0)));
    }

    #[test]
    fn test_interpolate_points_are_linearly_spaced() {
        let points = [Point::new(0, 0), Point::new(100, 0)];
        let out = interpolate(&points, 25);
        assert_eq!(
            out,
            vec![
                Point::new(0, 0),
                Point::new(25, 0),
                Point::new(50, 0),
                Point::new(75, 0),
                Point::new(100, 0),
            ]
        );
    }

    #[test]
    fn test_interpolate_short_segment_keeps_endpoints_only() {
        // Distance below one step: no insertion.
        let points = [Point::new(0, 0), Point::new(10, 0)];
        assert_eq!(interpolate(&points, 30), points.to_vec());
    }

    #[test]
    fn test_interpolate_distance_exactly_one_step_keeps_endpoints_only() {
        let points = [Point::new(0, 0), Point::new(30, 0)];
        assert_eq!(interpolate(&points, 30), points.to_vec());
    }

    #[test]
    fn test_interpolate_zero_step_is_identity() {
        let points = [Point::new(0, 0), Point::new(500, 500)];
        assert_eq!(interpolate(&points, 0), points.to_vec());
    }

    #[test]
    fn test_interpolate_handles_multiple_segments() {
        let points = [Point::new(0, 0), Point::new(60, 0), Point::new(60, 60)];
        let out = interpolate(&points, 30);
        // Each 60-long segment gets ceil(60/30) - 1 = 1 inserted point.
        assert_eq!(out.len(), 3 + 2);
        assert_eq!(out[1], Point::new(30, 0));
        assert_eq!(out[3], Point::new(60, 30));
    }

    #[test]
    fn test_interpolate_diagonal_segment_rounds_up() {
        let points = [Point::new(0, 0), Point::new(10, 10)];
        // Distance ≈ 14.14, step 5 → ceil = 3 → 2 inserted points.
        let out = interpolate(&points, 5);
        assert_eq!(out.len(), 4);
    }

    // ── Waits and clamping ───────────────────────────────────────────────────

    #[test]
    fn test_per_point_wait_divides_duration_across_segments() {
        assert_eq!(per_point_wait(100, 5), 25);
        assert_eq!(per_point_wait(100, 3), 50);
    }

    #[test]
    fn test_per_point_wait_rounds_up() {
        assert_eq!(per_point_wait(100, 4), 34);
    }

    #[test]
    fn test_per_point_wait_zero_duration_or_single_point() {
        assert_eq!(per_point_wait(0, 5), 0);
        assert_eq!(per_point_wait(100, 1), 0);
    }

    #[test]
    fn test_clamp_pressure_takes_minimum() {
        assert_eq!(clamp_pressure(200, 50), 50);
        assert_eq!(clamp_pressure(30, 50), 30);
    }

    // ── Swipe defaults ───────────────────────────────────────────────────────

    #[test]
    fn test_center_rounds_up() {
        assert_eq!(center(Size::new(1081, 1921)), Point::new(541, 961));
    }

    #[test]
    fn test_swipe_up_defaults() {
        let [start, end] = SwipeDirection::Up.track(panel(), None, None, None);
        assert_eq!(start, Point::new(540, 960 + 320));
        assert_eq!(end, Point::new(540, 960 + 320 - 640));
    }

    #[test]
    fn test_swipe_down_defaults() {
        let [start, end] = SwipeDirection::Down.track(panel(), None, None, None);
        assert_eq!(start, Point::new(540, 960 - 320));
        assert_eq!(end, Point::new(540, 960 - 320 + 640));
    }

    #[test]
    fn test_swipe_left_defaults() {
        let [start, end] = SwipeDirection::Left.track(panel(), None, None, None);
        assert_eq!(start, Point::new(540 + 180, 960));
        assert_eq!(end, Point::new(540 + 180 - 360, 960));
    }

    #[test]
    fn test_swipe_right_defaults() {
        let [start, end] = SwipeDirection::Right.track(panel(), None, None, None);
        assert_eq!(start, Point::new(540 - 180, 960));
        assert_eq!(end, Point::new(540 - 180 + 360, 960));
    }

    #[test]
    fn test_swipe_endpoints_clamped_to_panel() {
        // A start near the top with a long length must not go negative.
        let [_, end] = SwipeDirection::Up.track(panel(), Some(540), Some(100), Some(900));
        assert_eq!(end, Point::new(540, 0));

        let [_, end] = SwipeDirection::Down.track(panel(), Some(540), Some(1800), Some(900));
        assert_eq!(end, Point::new(540, 1920));
    }
}

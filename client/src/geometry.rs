//! Heading math for live markers. Angles are in degrees, normalized to
//! `(-180, 180]`, counter-clockwise positive.

use gw2map_shared::Vector3;

/// Signed angle from `a` to `b` in the XY plane.
///
/// Returns `None` if either vector has no planar extent, since the angle is
/// undefined there.
pub fn angle_between(a: Vector3, b: Vector3) -> Option<f64> {
    if a.planar_magnitude() == 0.0 || b.planar_magnitude() == 0.0 {
        return None;
    }

    let dot = a.x * b.x + a.y * b.y;
    let cross = a.x * b.y - a.y * b.x;
    // atan2 on |cross| keeps the result exact for parallel vectors where
    // acos(dot / |a||b|) drifts off 0 by rounding.
    let theta = cross.abs().atan2(dot).to_degrees();
    let sign = if cross >= 0.0 { 1.0 } else { -1.0 };
    Some(sign * theta)
}

/// Heading of a character facing along `forward`, relative to +X.
pub fn heading_of(forward: Vector3) -> Option<f64> {
    angle_between(forward, Vector3::X_AXIS)
}

/// Map any finite angle into `(-180, 180]`.
pub fn normalize_degrees(angle: f64) -> f64 {
    180.0 - (180.0 - angle).rem_euclid(360.0)
}

/// Interpolate from `start` to `end` along the shorter rotation.
pub fn shortest_angular_lerp(start: f64, end: f64, t: f64) -> f64 {
    let start = normalize_degrees(start);
    let mut end = normalize_degrees(end);

    if end - start > 180.0 {
        end -= 360.0;
    } else if end - start < -180.0 {
        end += 360.0;
    }

    normalize_degrees(start + (end - start) * t)
}

/// Lazy sequence of `steps` headings from just past `start` up to and
/// including `end`.
#[derive(Debug, Clone)]
pub struct AnglePath {
    start: f64,
    end: f64,
    steps: u32,
    next: u32,
}

impl AnglePath {
    pub fn new(start: f64, end: f64, steps: u32) -> Self {
        Self {
            start,
            end,
            steps: steps.max(1),
            next: 1,
        }
    }
}

impl Iterator for AnglePath {
    type Item = f64;

    fn next(&mut self) -> Option<f64> {
        if self.next > self.steps {
            return None;
        }
        let t = f64::from(self.next) / f64::from(self.steps);
        self.next += 1;
        Some(shortest_angular_lerp(self.start, self.end, t))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.steps + 1).saturating_sub(self.next) as usize;
        (remaining, Some(remaining))
    }
}

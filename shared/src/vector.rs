use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// A position in continent (map) coordinates, as published by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector2 {
    #[serde(rename = "X", alias = "x")]
    pub x: f64,
    #[serde(rename = "Y", alias = "y")]
    pub y: f64,
}

/// A character's facing direction. Only the XY plane matters for headings.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector3 {
    #[serde(rename = "X", alias = "x")]
    pub x: f64,
    #[serde(rename = "Y", alias = "y")]
    pub y: f64,
    #[serde(rename = "Z", alias = "z", default)]
    pub z: f64,
}

impl Vector2 {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(self, other: Vector2) -> f64 {
        ((other.x - self.x).powi(2) + (other.y - self.y).powi(2)).sqrt()
    }

    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Vector3 {
    /// The reference heading: facing along +X is 0 degrees.
    pub const X_AXIS: Vector3 = Vector3::new(1.0, 0.0, 0.0);

    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Length of the XY projection.
    pub fn planar_magnitude(self) -> f64 {
        (self.x * self.x + self.y * self.y).sqrt()
    }
}

impl Add for Vector2 {
    type Output = Vector2;

    fn add(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector2 {
    type Output = Vector2;

    fn sub(self, rhs: Vector2) -> Vector2 {
        Vector2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vector2 {
    type Output = Vector2;

    fn mul(self, rhs: f64) -> Vector2 {
        Vector2::new(self.x * rhs, self.y * rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::{Vector2, Vector3};

    #[test]
    fn distance_is_euclidean() {
        assert_eq!(Vector2::new(0.0, 0.0).distance(Vector2::new(3.0, 4.0)), 5.0);
    }

    #[test]
    fn vectors_accept_relay_and_lowercase_field_names() {
        let upper: Vector3 = serde_json::from_str(r#"{"X":1.0,"Y":2.0,"Z":3.0}"#)
            .expect("pascal case vector should parse");
        let lower: Vector3 = serde_json::from_str(r#"{"x":1.0,"y":2.0,"z":3.0}"#)
            .expect("lower case vector should parse");
        assert_eq!(upper, lower);
    }

    #[test]
    fn planar_magnitude_ignores_z() {
        assert_eq!(Vector3::new(3.0, 4.0, 100.0).planar_magnitude(), 5.0);
    }
}

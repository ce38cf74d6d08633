//! Common types and traits for 3D geometry.
//!
//! Scene space follows the viewer convention: `x` runs along the container
//! length, `y` points up (height) and `z` runs across the width. The
//! container's local origin is its geometric centre.

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// Global numerical tolerance for floating-point comparisons.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// Cubic millimetres per cubic metre.
pub const MM3_PER_M3: f64 = 1_000_000_000.0;

/// Represents a 3D vector or point in space.
///
/// Serialized as a `[x, y, z]` array so frames stay compact on the wire.
///
/// # Examples
/// ```
/// use sea_freight_loader::types::Vec3;
///
/// let start = Vec3::new(0.0, 0.0, 0.0);
/// let target = Vec3::new(10.0, 0.0, 0.0);
/// assert_eq!(start.lerp(&target, 0.5), Vec3::new(5.0, 0.0, 0.0));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "(f64, f64, f64)", into = "(f64, f64, f64)")]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    /// Creates a new 3D vector.
    ///
    /// # Parameters
    /// * `x` - X component (length axis)
    /// * `y` - Y component (height axis)
    /// * `z` - Z component (width axis)
    #[inline]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// Creates a zero vector (origin).
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// Creates a vector with all three components set to `value`.
    #[inline]
    pub const fn splat(value: f64) -> Self {
        Self::new(value, value, value)
    }

    /// Converts to tuple format for API compatibility.
    #[inline]
    pub const fn as_tuple(&self) -> (f64, f64, f64) {
        (self.x, self.y, self.z)
    }

    /// Creates from tuple format.
    #[inline]
    pub const fn from_tuple(tuple: (f64, f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1, tuple.2)
    }

    /// Calculates the volume (product of all components).
    #[inline]
    pub fn volume(&self) -> f64 {
        self.x * self.y * self.z
    }

    /// Calculates the Euclidean distance to another point.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Moves `fraction` of the way from `self` towards `target`.
    ///
    /// `fraction` is not clamped; callers pass values in `(0, 1]`.
    #[inline]
    pub fn lerp(&self, target: &Self, fraction: f64) -> Self {
        *self + (*target - *self) * fraction
    }

    /// Checks if all components are positive and finite.
    #[inline]
    pub fn is_valid_dimension(&self) -> bool {
        self.x > 0.0
            && self.y > 0.0
            && self.z > 0.0
            && self.x.is_finite()
            && self.y.is_finite()
            && self.z.is_finite()
    }
}

impl Add for Vec3 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y, self.z - rhs.z)
    }
}

impl Mul<f64> for Vec3 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar, self.z * scalar)
    }
}

impl From<(f64, f64, f64)> for Vec3 {
    #[inline]
    fn from(tuple: (f64, f64, f64)) -> Self {
        Self::from_tuple(tuple)
    }
}

impl From<Vec3> for (f64, f64, f64) {
    #[inline]
    fn from(vec: Vec3) -> Self {
        vec.as_tuple()
    }
}

/// Trait for objects with 3D dimensions (in millimetres).
pub trait Dimensional {
    /// Returns the dimensions of the object as scene extents (length, height, width).
    fn dimensions(&self) -> Vec3;

    /// Calculates the volume in cubic millimetres.
    fn volume_mm3(&self) -> f64 {
        self.dimensions().volume()
    }
}

/// Trait for objects with weight.
pub trait Weighted {
    /// Returns the weight in kg.
    fn weight(&self) -> f64;
}

/// Represents an Axis-Aligned Bounding Box (AABB).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingBox {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl BoundingBox {
    /// Creates a new bounding box.
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Creates a bounding box around a centre point.
    #[inline]
    pub fn from_center_and_size(center: Vec3, size: Vec3) -> Self {
        let half = size * 0.5;
        Self {
            min: center - half,
            max: center + half,
        }
    }

    /// Checks if two bounding boxes intersect.
    ///
    /// Touching faces do not count as an intersection.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        !(self.max.x <= other.min.x
            || other.max.x <= self.min.x
            || self.max.y <= other.min.y
            || other.max.y <= self.min.y
            || self.max.z <= other.min.z
            || other.max.z <= self.min.z)
    }

    /// Checks if `other` lies completely inside this box (with tolerance).
    #[inline]
    pub fn contains_box(&self, other: &Self, tolerance: f64) -> bool {
        other.min.x >= self.min.x - tolerance
            && other.min.y >= self.min.y - tolerance
            && other.min.z >= self.min.z - tolerance
            && other.max.x <= self.max.x + tolerance
            && other.max.y <= self.max.y + tolerance
            && other.max.z <= self.max.z + tolerance
    }

    /// Returns the centre point.
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// Lenient numeric parsing for form-originated values.
///
/// Browser forms submit numbers as strings, empty strings or not at all.
/// None of that is an error here: anything that is not a usable positive
/// number collapses to zero.
pub mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    /// Normalises a raw measurement: non-finite and non-positive values become `0.0`.
    #[inline]
    pub fn sanitize(value: f64) -> f64 {
        if value.is_finite() && value > 0.0 {
            value
        } else {
            0.0
        }
    }

    fn value_to_f64(value: &Value) -> f64 {
        match value {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        }
    }

    /// Deserializes a measurement from a number, numeric string, or anything else (→ 0).
    pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        Ok(sanitize(value_to_f64(&raw)))
    }

    /// Deserializes a unit count, truncating fractions and flooring negatives at zero.
    pub fn count<'de, D>(deserializer: D) -> Result<u32, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = Value::deserialize(deserializer)?;
        let value = sanitize(value_to_f64(&raw)).trunc();
        Ok(value.min(f64::from(u32::MAX)) as u32)
    }
}

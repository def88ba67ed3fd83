//! Common types and traits for 2D deck geometry.
//!
//! Decks are modelled in a right-handed plane: `x` runs along the deck
//! length (bow to stern), `y` across the deck width (port to starboard).

use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Global numerical tolerance for floating-point comparisons.
///
/// Used for bounds checks, candidate deduplication and score tie-breaking.
pub const EPSILON_GENERAL: f64 = 1e-6;

/// A 2D vector or point on a deck.
///
/// # Examples
/// ```
/// use deck_loader::types::Vec2;
///
/// let corner = Vec2::new(1.0, 2.0);
/// let size = Vec2::new(6.0, 1.0);
/// let center = corner + size * 0.5;
/// assert_eq!(center, Vec2::new(4.0, 2.5));
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize, ToSchema)]
pub struct Vec2 {
    pub x: f64,
    pub y: f64,
}

impl Vec2 {
    #[inline]
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// The origin, also used as the empty-centroid sentinel.
    #[inline]
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Area of the rectangle spanned by this vector (x × y).
    #[inline]
    pub fn area(&self) -> f64 {
        self.x * self.y
    }

    /// Euclidean distance to another point.
    #[inline]
    pub fn distance_to(&self, other: &Self) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Checks if this extent fits inside `outer` component-wise.
    #[inline]
    pub fn fits_within(&self, outer: &Self, tolerance: f64) -> bool {
        self.x <= outer.x + tolerance && self.y <= outer.y + tolerance
    }

    /// Midpoint between the origin and this point.
    #[inline]
    pub fn center(&self) -> Self {
        Self::new(self.x / 2.0, self.y / 2.0)
    }
}

impl Add for Vec2 {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self::Output {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Self;

    #[inline]
    fn sub(self, rhs: Self) -> Self::Output {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f64> for Vec2 {
    type Output = Self;

    #[inline]
    fn mul(self, scalar: f64) -> Self::Output {
        Self::new(self.x * scalar, self.y * scalar)
    }
}

impl From<(f64, f64)> for Vec2 {
    #[inline]
    fn from(tuple: (f64, f64)) -> Self {
        Self::new(tuple.0, tuple.1)
    }
}

impl From<Vec2> for (f64, f64) {
    #[inline]
    fn from(vec: Vec2) -> Self {
        (vec.x, vec.y)
    }
}

/// Trait for anything with a rectangular footprint.
pub trait Dimensional {
    /// Footprint extent (length along x, width along y).
    fn dimensions(&self) -> Vec2;

    fn footprint_area(&self) -> f64 {
        self.dimensions().area()
    }
}

/// Trait for objects with a fixed position on a deck.
pub trait Positioned {
    /// Bottom/left corner.
    fn position(&self) -> Vec2;
}

/// Trait for objects that contribute to the deck's center of gravity.
pub trait Weighted {
    fn weight(&self) -> f64;
}

/// Axis-aligned rectangle on a deck.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Rect {
    /// Bottom/left corner.
    pub min: Vec2,
    /// Top/right corner (min + size).
    pub max: Vec2,
}

impl Rect {
    /// Creates a rectangle from its corner and extent.
    #[inline]
    pub fn from_position_and_dims(position: Vec2, dims: Vec2) -> Self {
        Self {
            min: position,
            max: position + dims,
        }
    }

    /// Separating-axis test for two rectangles.
    ///
    /// Rectangles sharing only an edge do not intersect.
    #[inline]
    pub fn intersects(&self, other: &Self) -> bool {
        !(self.max.x <= other.min.x
            || other.max.x <= self.min.x
            || self.max.y <= other.min.y
            || other.max.y <= self.min.y)
    }

    /// Like [`Rect::intersects`], but overlaps thinner than `tolerance` do not count.
    #[inline]
    pub fn intersects_within(&self, other: &Self, tolerance: f64) -> bool {
        !(self.max.x <= other.min.x + tolerance
            || other.max.x <= self.min.x + tolerance
            || self.max.y <= other.min.y + tolerance
            || other.max.y <= self.min.y + tolerance)
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(
            (self.min.x + self.max.x) / 2.0,
            (self.min.y + self.max.y) / 2.0,
        )
    }

    #[inline]
    pub fn dimensions(&self) -> Vec2 {
        self.max - self.min
    }

    #[inline]
    pub fn area(&self) -> f64 {
        self.dimensions().area()
    }

    /// Checks that the rectangle lies inside `[0, bounds.x] × [0, bounds.y]`.
    #[inline]
    pub fn within_bounds(&self, bounds: &Vec2, tolerance: f64) -> bool {
        self.min.x >= -tolerance
            && self.min.y >= -tolerance
            && self.max.x <= bounds.x + tolerance
            && self.max.y <= bounds.y + tolerance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vec2_operations() {
        let a = Vec2::new(1.0, 2.0);
        let b = Vec2::new(4.0, 6.0);

        assert_eq!(a + b, Vec2::new(5.0, 8.0));
        assert_eq!(b - a, Vec2::new(3.0, 4.0));
        assert_eq!(a * 2.0, Vec2::new(2.0, 4.0));
        assert!((a.distance_to(&b) - 5.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn test_vec2_fits_within() {
        let small = Vec2::new(6.0, 1.0);
        let deck = Vec2::new(30.0, 3.0);

        assert!(small.fits_within(&deck, EPSILON_GENERAL));
        assert!(!deck.fits_within(&small, EPSILON_GENERAL));
    }

    #[test]
    fn test_rect_touching_edges_do_not_intersect() {
        let a = Rect::from_position_and_dims(Vec2::zero(), Vec2::new(2.0, 1.0));
        let right = Rect::from_position_and_dims(Vec2::new(2.0, 0.0), Vec2::new(2.0, 1.0));
        let above = Rect::from_position_and_dims(Vec2::new(0.0, 1.0), Vec2::new(2.0, 1.0));
        let overlapping = Rect::from_position_and_dims(Vec2::new(1.5, 0.5), Vec2::new(2.0, 1.0));

        assert!(!a.intersects(&right));
        assert!(!a.intersects(&above));
        assert!(a.intersects(&overlapping));
        assert!(overlapping.intersects(&a));

        let rounding_noise =
            Rect::from_position_and_dims(Vec2::new(2.0 - 1e-9, 0.0), Vec2::new(2.0, 1.0));
        assert!(a.intersects(&rounding_noise));
        assert!(!a.intersects_within(&rounding_noise, EPSILON_GENERAL));
        assert!(a.intersects_within(&overlapping, EPSILON_GENERAL));
    }

    #[test]
    fn test_rect_bounds_and_center() {
        let deck = Vec2::new(10.0, 3.0);
        let inside = Rect::from_position_and_dims(Vec2::new(8.0, 2.0), Vec2::new(2.0, 1.0));
        let outside = Rect::from_position_and_dims(Vec2::new(9.0, 2.0), Vec2::new(2.0, 1.0));
        let negative = Rect::from_position_and_dims(Vec2::new(-0.5, 0.0), Vec2::new(2.0, 1.0));

        assert!(inside.within_bounds(&deck, EPSILON_GENERAL));
        assert!(!outside.within_bounds(&deck, EPSILON_GENERAL));
        assert!(!negative.within_bounds(&deck, EPSILON_GENERAL));
        assert_eq!(inside.center(), Vec2::new(9.0, 2.5));
        assert!((inside.area() - 2.0).abs() < EPSILON_GENERAL);
    }
}

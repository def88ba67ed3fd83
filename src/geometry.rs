//! Geometric helpers for deck collision detection.
//!
//! These are the primitive bounds and overlap queries the occupancy model and
//! the planner build on. All rectangles are axis-aligned; vehicles are never
//! rotated on deck.

use crate::model::Placement;
use crate::types::{Rect, Vec2};

/// Checks whether `rect` lies within `[0, deck.x] × [0, deck.y]`.
///
/// # Examples
/// ```
/// use deck_loader::geometry::fits;
/// use deck_loader::types::{Rect, Vec2};
///
/// let deck = Vec2::new(10.0, 3.0);
/// let rect = Rect::from_position_and_dims(Vec2::new(8.0, 0.0), Vec2::new(2.0, 1.0));
/// assert!(fits(&rect, &deck, 1e-6));
/// ```
pub fn fits(rect: &Rect, deck: &Vec2, epsilon: f64) -> bool {
    rect.within_bounds(deck, epsilon)
}

/// Checks whether two placed vehicles overlap.
///
/// Uses the separating-axis rule, so vehicles parked bumper to bumper are not
/// considered overlapping.
pub fn intersects(a: &Placement, b: &Placement) -> bool {
    a.footprint().intersects(&b.footprint())
}

/// Length of the overlap of two intervals, at least 0.0.
///
/// ```
/// use deck_loader::geometry::overlap_1d;
///
/// assert_eq!(overlap_1d(0.0, 5.0, 3.0, 8.0), 2.0);
/// assert_eq!(overlap_1d(0.0, 2.0, 2.0, 4.0), 0.0);
/// ```
pub fn overlap_1d(a1: f64, a2: f64, b1: f64, b2: f64) -> f64 {
    (a2.min(b2) - a1.max(b1)).max(0.0)
}

/// Depth of the overlap of two rectangles along each axis.
pub fn overlap_extent(a: &Rect, b: &Rect) -> Vec2 {
    Vec2::new(
        overlap_1d(a.min.x, a.max.x, b.min.x, b.max.x),
        overlap_1d(a.min.y, a.max.y, b.min.y, b.max.y),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Golongan, PlacementId};

    fn placed(id: u64, x: f64, y: f64, dims: (f64, f64)) -> Placement {
        Placement {
            id: PlacementId(id),
            class: Golongan::IV,
            deck: 0,
            position: Vec2::new(x, y),
            dims: dims.into(),
            weight: 1.0,
        }
    }

    #[test]
    fn intersects_is_symmetric() {
        let a = placed(1, 0.0, 0.0, (6.0, 1.0));
        let b = placed(2, 5.0, 0.0, (7.0, 1.0));
        let c = placed(3, 0.0, 1.0, (6.0, 1.0));

        assert!(intersects(&a, &b));
        assert!(intersects(&b, &a));
        assert!(!intersects(&a, &c));
    }

    #[test]
    fn fits_rejects_protruding_rects() {
        let deck = Vec2::new(4.0, 1.0);
        let too_long = Rect::from_position_and_dims(Vec2::zero(), Vec2::new(5.0, 1.0));
        let exact = Rect::from_position_and_dims(Vec2::zero(), Vec2::new(4.0, 1.0));

        assert!(!fits(&too_long, &deck, 1e-6));
        assert!(fits(&exact, &deck, 1e-6));
    }

    #[test]
    fn overlap_extent_of_partial_cover() {
        let a = Rect::from_position_and_dims(Vec2::zero(), Vec2::new(4.0, 2.0));
        let b = Rect::from_position_and_dims(Vec2::new(3.0, 0.5), Vec2::new(4.0, 2.0));
        let c = Rect::from_position_and_dims(Vec2::new(4.0, 0.0), Vec2::new(1.0, 1.0));

        assert_eq!(overlap_extent(&a, &b), Vec2::new(1.0, 1.5));
        assert_eq!(overlap_extent(&a, &c), Vec2::new(0.0, 1.0));
    }
}

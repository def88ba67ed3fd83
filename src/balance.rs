//! Balance evaluation.
//!
//! Pure functions over a snapshot of placements: total weight, the weighted
//! centroid of the footprints, and the distance of that centroid from a target
//! point. Nothing here mutates state, so the planner can score hypothetical
//! placements and throw them away.

use serde::Serialize;
use utoipa::ToSchema;

use crate::model::Placement;
use crate::types::{Dimensional, Positioned, Vec2, Weighted};

/// Accumulates weighted points for a center-of-mass calculation.
#[derive(Clone, Copy, Debug, Default)]
pub struct CenterOfMassCalculator {
    weighted_x: f64,
    weighted_y: f64,
    total_weight: f64,
}

impl CenterOfMassCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the calculator with every item in `items`.
    pub fn from_items<'a, T>(items: impl IntoIterator<Item = &'a T>) -> Self
    where
        T: Weighted + Dimensional + Positioned + 'a,
    {
        let mut calc = Self::new();
        for item in items {
            calc.add_item(item);
        }
        calc
    }

    pub fn add_point(&mut self, point: Vec2, weight: f64) {
        self.weighted_x += point.x * weight;
        self.weighted_y += point.y * weight;
        self.total_weight += weight;
    }

    /// Adds an item at the center of its footprint.
    pub fn add_item<T: Weighted + Dimensional + Positioned>(&mut self, item: &T) {
        let center = item.position() + item.dimensions() * 0.5;
        self.add_point(center, item.weight());
    }

    /// Copy of this calculator with one more point, for "what if" scoring.
    pub fn with_point(&self, point: Vec2, weight: f64) -> Self {
        let mut next = *self;
        next.add_point(point, weight);
        next
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }

    /// Center of mass, `None` when nothing with weight has been added.
    pub fn compute(&self) -> Option<Vec2> {
        if self.total_weight <= 0.0 {
            None
        } else {
            Some(Vec2::new(
                self.weighted_x / self.total_weight,
                self.weighted_y / self.total_weight,
            ))
        }
    }

    /// Distance of the center of mass to `reference`; 0.0 when empty.
    pub fn distance_to(&self, reference: Vec2) -> f64 {
        match self.compute() {
            Some(center) => center.distance_to(&reference),
            None => 0.0,
        }
    }
}

/// Weighted centroid of the footprint centers.
///
/// An empty set has no center of mass; the origin `(0, 0)` is returned as the
/// sentinel.
pub fn centroid<'a>(placements: impl IntoIterator<Item = &'a Placement>) -> Vec2 {
    CenterOfMassCalculator::from_items(placements)
        .compute()
        .unwrap_or_else(Vec2::zero)
}

/// Distance from the centroid to `target`. Lower is better, an empty set scores 0.0.
pub fn score<'a>(placements: impl IntoIterator<Item = &'a Placement>, target: Vec2) -> f64 {
    CenterOfMassCalculator::from_items(placements).distance_to(target)
}

pub fn total_weight<'a>(placements: impl IntoIterator<Item = &'a Placement>) -> f64 {
    placements.into_iter().map(Weighted::weight).sum()
}

/// Balance state of a deck or the whole ship.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct BalanceReport {
    pub centroid: Vec2,
    pub target: Vec2,
    pub distance: f64,
    pub total_weight: f64,
    pub vehicles: usize,
}

impl BalanceReport {
    pub fn evaluate<'a>(
        placements: impl IntoIterator<Item = &'a Placement>,
        target: Vec2,
    ) -> Self {
        let mut calc = CenterOfMassCalculator::new();
        let mut vehicles = 0;
        for placed in placements {
            calc.add_item(placed);
            vehicles += 1;
        }
        Self {
            centroid: calc.compute().unwrap_or_else(Vec2::zero),
            target,
            distance: calc.distance_to(target),
            total_weight: calc.total_weight(),
            vehicles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Golongan, PlacementId};
    use crate::types::EPSILON_GENERAL;

    fn placed(id: u64, center: (f64, f64), weight: f64) -> Placement {
        Placement {
            id: PlacementId(id),
            class: Golongan::IV,
            deck: 0,
            position: Vec2::new(center.0 - 1.0, center.1 - 0.5),
            dims: Vec2::new(2.0, 1.0),
            weight,
        }
    }

    #[test]
    fn centroid_is_weight_averaged() {
        let set = vec![placed(1, (1.0, 1.0), 1.0), placed(2, (3.0, 1.0), 3.0)];
        let c = centroid(&set);
        assert!((c.x - 2.5).abs() < EPSILON_GENERAL);
        assert!((c.y - 1.0).abs() < EPSILON_GENERAL);
        assert!((total_weight(&set) - 4.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn empty_set_uses_origin_sentinel() {
        let empty: Vec<Placement> = Vec::new();
        assert_eq!(centroid(&empty), Vec2::zero());
        assert_eq!(score(&empty, Vec2::new(5.0, 1.5)), 0.0);
        assert_eq!(total_weight(&empty), 0.0);

        let report = BalanceReport::evaluate(&empty, Vec2::new(5.0, 1.5));
        assert_eq!(report.vehicles, 0);
        assert_eq!(report.centroid, Vec2::zero());
    }

    #[test]
    fn score_is_euclidean_distance() {
        let set = vec![placed(1, (2.0, 1.0), 2.0)];
        let s = score(&set, Vec2::new(5.0, 5.0));
        assert!((s - 5.0).abs() < EPSILON_GENERAL);
    }

    #[test]
    fn with_point_does_not_touch_the_original() {
        let base = CenterOfMassCalculator::from_items(&[placed(1, (0.0, 0.0), 1.0)]);
        let what_if = base.with_point(Vec2::new(4.0, 0.0), 1.0);

        assert_eq!(base.compute(), Some(Vec2::new(0.0, 0.0)));
        assert_eq!(what_if.compute(), Some(Vec2::new(2.0, 0.0)));
        assert!((what_if.distance_to(Vec2::new(2.0, 0.0))).abs() < EPSILON_GENERAL);
    }

    struct Cargo {
        corner: Vec2,
        size: Vec2,
        tons: f64,
    }

    impl Positioned for Cargo {
        fn position(&self) -> Vec2 {
            self.corner
        }
    }

    impl Dimensional for Cargo {
        fn dimensions(&self) -> Vec2 {
            self.size
        }
    }

    impl Weighted for Cargo {
        fn weight(&self) -> f64 {
            self.tons
        }
    }

    #[test]
    fn calculator_takes_any_weighted_footprint() {
        let load = [
            Cargo {
                corner: Vec2::zero(),
                size: Vec2::new(2.0, 2.0),
                tons: 1.0,
            },
            Cargo {
                corner: Vec2::new(4.0, 0.0),
                size: Vec2::new(2.0, 2.0),
                tons: 1.0,
            },
        ];
        let calc = CenterOfMassCalculator::from_items(&load);
        assert_eq!(calc.compute(), Some(Vec2::new(3.0, 1.0)));
        assert_eq!(calc.total_weight(), 2.0);
    }

    #[test]
    fn report_collects_all_figures() {
        let set = vec![placed(1, (1.0, 1.0), 1.0), placed(2, (3.0, 1.0), 3.0)];
        let report = BalanceReport::evaluate(&set, Vec2::new(2.5, 2.0));
        assert_eq!(report.vehicles, 2);
        assert!((report.distance - 1.0).abs() < EPSILON_GENERAL);
        assert!((report.total_weight - 4.0).abs() < EPSILON_GENERAL);
    }
}

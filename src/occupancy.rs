//! Occupancy tracking for a single deck.
//!
//! Two representations are supported:
//! - `GridOccupancy`: the deck is cut into square cells, each cell records
//!   which vehicle (if any) covers it. Footprints are rounded outward to
//!   whole cells.
//! - `ContinuousOccupancy`: a list of placed rectangles with an O(n) overlap
//!   scan per query. That scan is the known scaling limit of this variant; it
//!   is fine for the few dozen vehicles a ferry deck carries.
//!
//! Both enforce the same invariant: occupied regions never overlap and always
//! lie inside the deck.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::model::{DeckSpec, OccupancyKind, PlacementId};
use crate::types::{Rect, Vec2};

#[derive(Debug, Clone, PartialEq, Error)]
pub enum OccupancyError {
    #[error("Footprint {rect:?} exceeds deck extent {deck:?}")]
    OutOfBounds { rect: Rect, deck: Vec2 },
    #[error("Footprint overlaps vehicle {0}")]
    Occupied(PlacementId),
    #[error("Vehicle {0} is not on this deck")]
    NotFound(PlacementId),
}

/// Spatial bookkeeping of a deck.
pub trait OccupancyMap {
    /// Deck extent.
    fn dims(&self) -> Vec2;

    /// True iff `rect` lies inside the deck.
    fn fits(&self, rect: &Rect) -> bool;

    /// True iff `rect` intersects any occupied region.
    fn overlaps(&self, rect: &Rect) -> bool;

    /// Marks `rect` as occupied by `occupant`.
    fn place(&mut self, rect: Rect, occupant: PlacementId) -> Result<(), OccupancyError>;

    /// Frees everything `occupant` covers.
    fn remove(&mut self, occupant: PlacementId) -> Result<(), OccupancyError>;

    /// Number of empty unit cells.
    fn free_capacity(&self) -> usize;

    /// Total unit cells of the deck.
    fn total_capacity(&self) -> usize;

    fn contains(&self, occupant: PlacementId) -> bool;

    fn clear(&mut self);

    /// Moves a candidate position onto the positions this map can represent.
    fn snap(&self, position: Vec2) -> Vec2 {
        position
    }
}

/// Cell grid, row-major with rows across the deck width.
#[derive(Clone, Debug)]
pub struct GridOccupancy {
    dims: Vec2,
    cell_size: f64,
    cols: usize,
    rows: usize,
    cells: Vec<Option<PlacementId>>,
    occupants: BTreeMap<PlacementId, Rect>,
    epsilon: f64,
}

impl GridOccupancy {
    pub fn new(dims: Vec2, cell_size: f64, epsilon: f64) -> Self {
        let cols = ((dims.x / cell_size) + epsilon).floor().max(0.0) as usize;
        let rows = ((dims.y / cell_size) + epsilon).floor().max(0.0) as usize;
        Self {
            dims,
            cell_size,
            cols,
            rows,
            cells: vec![None; cols * rows],
            occupants: BTreeMap::new(),
            epsilon,
        }
    }

    /// Half-open column and row ranges covered by `rect`, rounded outward.
    fn cell_span(&self, rect: &Rect) -> (usize, usize, usize, usize) {
        let to_lower = |v: f64| ((v / self.cell_size) + self.epsilon).floor().max(0.0) as usize;
        let to_upper = |v: f64| ((v / self.cell_size) - self.epsilon).ceil().max(0.0) as usize;
        (
            to_lower(rect.min.x),
            to_upper(rect.max.x),
            to_lower(rect.min.y),
            to_upper(rect.max.y),
        )
    }

    fn first_occupant(&self, rect: &Rect) -> Option<PlacementId> {
        let (c0, c1, r0, r1) = self.cell_span(rect);
        for row in r0..r1.min(self.rows) {
            for col in c0..c1.min(self.cols) {
                if let Some(id) = self.cells[row * self.cols + col] {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Occupant of the cell at (`col`, `row`).
    pub fn cell(&self, col: usize, row: usize) -> Option<PlacementId> {
        if col >= self.cols || row >= self.rows {
            return None;
        }
        self.cells[row * self.cols + col]
    }
}

impl OccupancyMap for GridOccupancy {
    fn dims(&self) -> Vec2 {
        self.dims
    }

    fn fits(&self, rect: &Rect) -> bool {
        if !rect.within_bounds(&self.dims, self.epsilon) {
            return false;
        }
        let (_, c1, _, r1) = self.cell_span(rect);
        c1 <= self.cols && r1 <= self.rows
    }

    fn overlaps(&self, rect: &Rect) -> bool {
        self.first_occupant(rect).is_some()
    }

    fn place(&mut self, rect: Rect, occupant: PlacementId) -> Result<(), OccupancyError> {
        if !self.fits(&rect) {
            return Err(OccupancyError::OutOfBounds {
                rect,
                deck: self.dims,
            });
        }
        if self.occupants.contains_key(&occupant) {
            return Err(OccupancyError::Occupied(occupant));
        }
        if let Some(other) = self.first_occupant(&rect) {
            return Err(OccupancyError::Occupied(other));
        }
        let (c0, c1, r0, r1) = self.cell_span(&rect);
        for row in r0..r1 {
            for col in c0..c1 {
                self.cells[row * self.cols + col] = Some(occupant);
            }
        }
        self.occupants.insert(occupant, rect);
        Ok(())
    }

    fn remove(&mut self, occupant: PlacementId) -> Result<(), OccupancyError> {
        let rect = self
            .occupants
            .remove(&occupant)
            .ok_or(OccupancyError::NotFound(occupant))?;
        let (c0, c1, r0, r1) = self.cell_span(&rect);
        for row in r0..r1.min(self.rows) {
            for col in c0..c1.min(self.cols) {
                let cell = &mut self.cells[row * self.cols + col];
                if *cell == Some(occupant) {
                    *cell = None;
                }
            }
        }
        Ok(())
    }

    fn free_capacity(&self) -> usize {
        self.cells.iter().filter(|cell| cell.is_none()).count()
    }

    fn total_capacity(&self) -> usize {
        self.cells.len()
    }

    fn contains(&self, occupant: PlacementId) -> bool {
        self.occupants.contains_key(&occupant)
    }

    fn clear(&mut self) {
        self.cells.iter_mut().for_each(|cell| *cell = None);
        self.occupants.clear();
    }

    fn snap(&self, position: Vec2) -> Vec2 {
        let snap_axis = |v: f64| ((v / self.cell_size) + self.epsilon).floor() * self.cell_size;
        Vec2::new(snap_axis(position.x), snap_axis(position.y))
    }
}

/// Rectangle list over real-valued deck space.
#[derive(Clone, Debug)]
pub struct ContinuousOccupancy {
    dims: Vec2,
    placed: Vec<(PlacementId, Rect)>,
    epsilon: f64,
}

impl ContinuousOccupancy {
    pub fn new(dims: Vec2, epsilon: f64) -> Self {
        Self {
            dims,
            placed: Vec::new(),
            epsilon,
        }
    }

    fn first_occupant(&self, rect: &Rect) -> Option<PlacementId> {
        self.placed
            .iter()
            .find(|(_, other)| other.intersects_within(rect, self.epsilon))
            .map(|(id, _)| *id)
    }

    /// Deck area not covered by any footprint.
    pub fn free_area(&self) -> f64 {
        let used: f64 = self.placed.iter().map(|(_, rect)| rect.area()).sum();
        (self.dims.area() - used).max(0.0)
    }
}

impl OccupancyMap for ContinuousOccupancy {
    fn dims(&self) -> Vec2 {
        self.dims
    }

    fn fits(&self, rect: &Rect) -> bool {
        rect.within_bounds(&self.dims, self.epsilon)
    }

    fn overlaps(&self, rect: &Rect) -> bool {
        self.first_occupant(rect).is_some()
    }

    fn place(&mut self, rect: Rect, occupant: PlacementId) -> Result<(), OccupancyError> {
        if !self.fits(&rect) {
            return Err(OccupancyError::OutOfBounds {
                rect,
                deck: self.dims,
            });
        }
        if self.contains(occupant) {
            return Err(OccupancyError::Occupied(occupant));
        }
        if let Some(other) = self.first_occupant(&rect) {
            return Err(OccupancyError::Occupied(other));
        }
        self.placed.push((occupant, rect));
        Ok(())
    }

    fn remove(&mut self, occupant: PlacementId) -> Result<(), OccupancyError> {
        let index = self
            .placed
            .iter()
            .position(|(id, _)| *id == occupant)
            .ok_or(OccupancyError::NotFound(occupant))?;
        self.placed.remove(index);
        Ok(())
    }

    fn free_capacity(&self) -> usize {
        (self.free_area() + self.epsilon).floor() as usize
    }

    fn total_capacity(&self) -> usize {
        (self.dims.area() + self.epsilon).floor() as usize
    }

    fn contains(&self, occupant: PlacementId) -> bool {
        self.placed.iter().any(|(id, _)| *id == occupant)
    }

    fn clear(&mut self) {
        self.placed.clear();
    }
}

/// Occupancy of one deck, in whichever representation the deck was configured with.
#[derive(Clone, Debug)]
pub enum Occupancy {
    Grid(GridOccupancy),
    Continuous(ContinuousOccupancy),
}

impl Occupancy {
    pub fn for_deck(spec: &DeckSpec, epsilon: f64) -> Self {
        match spec.kind {
            OccupancyKind::Grid { cell_size } => {
                Occupancy::Grid(GridOccupancy::new(spec.dims(), cell_size, epsilon))
            }
            OccupancyKind::Continuous => {
                Occupancy::Continuous(ContinuousOccupancy::new(spec.dims(), epsilon))
            }
        }
    }

    fn inner(&self) -> &dyn OccupancyMap {
        match self {
            Occupancy::Grid(grid) => grid,
            Occupancy::Continuous(continuous) => continuous,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn OccupancyMap {
        match self {
            Occupancy::Grid(grid) => grid,
            Occupancy::Continuous(continuous) => continuous,
        }
    }
}

impl OccupancyMap for Occupancy {
    fn dims(&self) -> Vec2 {
        self.inner().dims()
    }

    fn fits(&self, rect: &Rect) -> bool {
        self.inner().fits(rect)
    }

    fn overlaps(&self, rect: &Rect) -> bool {
        self.inner().overlaps(rect)
    }

    fn place(&mut self, rect: Rect, occupant: PlacementId) -> Result<(), OccupancyError> {
        self.inner_mut().place(rect, occupant)
    }

    fn remove(&mut self, occupant: PlacementId) -> Result<(), OccupancyError> {
        self.inner_mut().remove(occupant)
    }

    fn free_capacity(&self) -> usize {
        self.inner().free_capacity()
    }

    fn total_capacity(&self) -> usize {
        self.inner().total_capacity()
    }

    fn contains(&self, occupant: PlacementId) -> bool {
        self.inner().contains(occupant)
    }

    fn clear(&mut self) {
        self.inner_mut().clear()
    }

    fn snap(&self, position: Vec2) -> Vec2 {
        self.inner().snap(position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EPSILON_GENERAL;

    fn rect(x: f64, y: f64, l: f64, w: f64) -> Rect {
        Rect::from_position_and_dims(Vec2::new(x, y), Vec2::new(l, w))
    }

    fn grid(length: f64, width: f64) -> Occupancy {
        Occupancy::for_deck(&DeckSpec::grid(length, width).unwrap(), EPSILON_GENERAL)
    }

    fn continuous(length: f64, width: f64) -> Occupancy {
        Occupancy::for_deck(
            &DeckSpec::continuous(length, width).unwrap(),
            EPSILON_GENERAL,
        )
    }

    #[test]
    fn grid_place_marks_cells_and_remove_frees_them() {
        let mut map = grid(10.0, 3.0);
        assert_eq!(map.total_capacity(), 30);
        assert_eq!(map.free_capacity(), 30);

        map.place(rect(0.0, 0.0, 6.0, 1.0), PlacementId(1)).unwrap();
        assert_eq!(map.free_capacity(), 24);
        if let Occupancy::Grid(inner) = &map {
            assert_eq!(inner.cell(5, 0), Some(PlacementId(1)));
            assert_eq!(inner.cell(6, 0), None);
        }

        map.remove(PlacementId(1)).unwrap();
        assert_eq!(map.free_capacity(), 30);
        assert!(!map.contains(PlacementId(1)));
    }

    #[test]
    fn place_rejects_overlap_and_out_of_bounds() {
        for mut map in [grid(10.0, 3.0), continuous(10.0, 3.0)] {
            map.place(rect(0.0, 0.0, 6.0, 1.0), PlacementId(1)).unwrap();

            assert_eq!(
                map.place(rect(5.0, 0.0, 2.0, 1.0), PlacementId(2)),
                Err(OccupancyError::Occupied(PlacementId(1)))
            );
            assert!(matches!(
                map.place(rect(9.0, 0.0, 2.0, 1.0), PlacementId(3)),
                Err(OccupancyError::OutOfBounds { .. })
            ));
            // Touching edges are fine.
            map.place(rect(6.0, 0.0, 4.0, 1.0), PlacementId(4)).unwrap();
            map.place(rect(0.0, 1.0, 6.0, 1.0), PlacementId(5)).unwrap();
        }
    }

    #[test]
    fn place_rejects_duplicate_occupant() {
        let mut map = continuous(10.0, 3.0);
        map.place(rect(0.0, 0.0, 2.0, 1.0), PlacementId(1)).unwrap();
        assert_eq!(
            map.place(rect(4.0, 0.0, 2.0, 1.0), PlacementId(1)),
            Err(OccupancyError::Occupied(PlacementId(1)))
        );
    }

    #[test]
    fn remove_unknown_occupant_fails() {
        for mut map in [grid(4.0, 1.0), continuous(4.0, 1.0)] {
            assert_eq!(
                map.remove(PlacementId(9)),
                Err(OccupancyError::NotFound(PlacementId(9)))
            );
        }
    }

    #[test]
    fn grid_rounds_unaligned_footprints_outward() {
        let mut map = grid(10.0, 3.0);
        map.place(rect(0.5, 0.0, 2.0, 1.0), PlacementId(1)).unwrap();
        // Covers cells 0, 1 and 2 of the first row.
        assert_eq!(map.free_capacity(), 27);
        assert!(map.overlaps(&rect(2.5, 0.0, 1.0, 1.0)));
        assert_eq!(map.snap(Vec2::new(2.7, 1.2)), Vec2::new(2.0, 1.0));
    }

    #[test]
    fn continuous_capacity_counts_free_unit_area() {
        let mut map = continuous(10.0, 3.0);
        assert_eq!(map.free_capacity(), 30);
        map.place(rect(0.0, 0.0, 2.5, 1.0), PlacementId(1)).unwrap();
        assert_eq!(map.free_capacity(), 27);
        assert_eq!(map.snap(Vec2::new(2.7, 1.2)), Vec2::new(2.7, 1.2));
        map.clear();
        assert_eq!(map.free_capacity(), 30);
    }
}

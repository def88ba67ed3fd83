//! Loaded state of a ship: its decks, their occupancy and the placements.
//!
//! `Layout` keeps the placement list and the per-deck occupancy maps in step.
//! Every mutation goes through [`Layout::commit`] or [`Layout::release`], so the
//! no-overlap and in-bounds invariants hold for whatever a `Layout` contains.

use crate::balance::{BalanceReport, score};
use crate::geometry::{fits, intersects, overlap_extent};
use crate::model::{DeckSpec, Placement, PlacementId, ShipSpec};
use crate::occupancy::{Occupancy, OccupancyError, OccupancyMap};
use crate::types::Vec2;

/// One deck together with its occupancy and balance target.
#[derive(Clone, Debug)]
pub struct DeckState {
    pub spec: DeckSpec,
    pub occupancy: Occupancy,
    pub target: Vec2,
}

#[derive(Clone, Debug)]
pub struct Layout {
    decks: Vec<DeckState>,
    placements: Vec<Placement>,
}

impl Layout {
    /// Empty decks as described by `spec`.
    pub fn empty(spec: &ShipSpec, epsilon: f64) -> Self {
        let decks = spec
            .decks
            .iter()
            .enumerate()
            .map(|(index, deck)| DeckState {
                spec: *deck,
                occupancy: Occupancy::for_deck(deck, epsilon),
                target: spec.deck_target(index),
            })
            .collect();
        Self {
            decks,
            placements: Vec::new(),
        }
    }

    /// Same decks and targets, nothing loaded.
    pub fn cleared(&self) -> Self {
        let mut next = self.clone();
        next.placements.clear();
        for deck in &mut next.decks {
            deck.occupancy.clear();
        }
        next
    }

    pub fn decks(&self) -> &[DeckState] {
        &self.decks
    }

    pub fn deck(&self, index: usize) -> Option<&DeckState> {
        self.decks.get(index)
    }

    pub fn placements(&self) -> &[Placement] {
        &self.placements
    }

    pub fn get(&self, id: PlacementId) -> Option<&Placement> {
        self.placements.iter().find(|placed| placed.id == id)
    }

    /// Placements on one deck.
    pub fn on_deck(&self, deck: usize) -> impl Iterator<Item = &Placement> + '_ {
        self.placements
            .iter()
            .filter(move |placed| placed.deck == deck)
    }

    /// Places `placement` on its deck.
    ///
    /// Fails without side effects if the footprint leaves the deck, overlaps
    /// another vehicle, or the deck index does not exist.
    pub fn commit(&mut self, placement: Placement) -> Result<(), OccupancyError> {
        let deck = self
            .decks
            .get_mut(placement.deck)
            .ok_or(OccupancyError::OutOfBounds {
                rect: placement.footprint(),
                deck: Vec2::zero(),
            })?;
        deck.occupancy.place(placement.footprint(), placement.id)?;
        self.placements.push(placement);
        Ok(())
    }

    /// Removes a vehicle and frees its footprint.
    pub fn release(&mut self, id: PlacementId) -> Result<Placement, OccupancyError> {
        let index = self
            .placements
            .iter()
            .position(|placed| placed.id == id)
            .ok_or(OccupancyError::NotFound(id))?;
        let deck = self.placements[index].deck;
        if let Some(state) = self.decks.get_mut(deck) {
            state.occupancy.remove(id)?;
        }
        Ok(self.placements.remove(index))
    }

    /// Re-checks bounds and no-overlap from the placement list alone,
    /// independent of the occupancy maps.
    pub fn verify(&self, epsilon: f64) -> Result<(), OccupancyError> {
        for (index, placed) in self.placements.iter().enumerate() {
            let rect = placed.footprint();
            let deck = self
                .decks
                .get(placed.deck)
                .map(|state| state.spec.dims())
                .unwrap_or_default();
            if !fits(&rect, &deck, epsilon) {
                return Err(OccupancyError::OutOfBounds { rect, deck });
            }
            // Overlaps thinner than `epsilon` are rounding noise, as in the occupancy maps.
            let clash = self.placements[index + 1..].iter().find(|other| {
                other.deck == placed.deck && intersects(placed, other) && {
                    let depth = overlap_extent(&rect, &other.footprint());
                    depth.x > epsilon && depth.y > epsilon
                }
            });
            if let Some(other) = clash {
                return Err(OccupancyError::Occupied(other.id));
            }
        }
        Ok(())
    }

    /// Balance distance of one deck.
    pub fn deck_score(&self, deck: usize) -> f64 {
        match self.decks.get(deck) {
            Some(state) => score(self.on_deck(deck), state.target),
            None => 0.0,
        }
    }

    /// Objective minimized by the planner: sum of per-deck balance distances.
    pub fn objective(&self) -> f64 {
        (0..self.decks.len()).map(|deck| self.deck_score(deck)).sum()
    }

    pub fn deck_report(&self, deck: usize) -> Option<BalanceReport> {
        self.decks
            .get(deck)
            .map(|state| BalanceReport::evaluate(self.on_deck(deck), state.target))
    }

    /// Free unit cells per deck.
    pub fn free_capacity(&self) -> Vec<usize> {
        self.decks
            .iter()
            .map(|deck| deck.occupancy.free_capacity())
            .collect()
    }

    /// Upper bound on how many more vehicles could ever be loaded.
    pub fn total_free_capacity(&self) -> usize {
        self.free_capacity().into_iter().sum()
    }
}

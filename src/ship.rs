//! The loaded ship: configuration, vehicle catalog and the current layout.
//!
//! `Ship` is the procedural surface of the engine. Every operation either
//! succeeds completely or leaves the ship exactly as it was.
//!
//! The ship remembers every vehicle it accepted, in loading order. A partial
//! re-pack may leave some of them waiting on the quay; they stay in the
//! manifest and the next re-pack tries them again.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use utoipa::ToSchema;

use crate::balance::BalanceReport;
use crate::layout::Layout;
use crate::model::{
    Golongan, ManifestEntry, Placement, PlacementId, ShipSpec, ValidationError, VehicleCatalog,
    validate_weight,
};
use crate::planner::{
    self, ImprovementOutcome, NoSpacePolicy, NoSpaceReason, PlannerConfig, RepackEvent,
    RepackPlan,
};
use crate::types::Dimensional;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ShipError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Vehicle {0} is not loaded")]
    NotFound(PlacementId),
    #[error("Vehicle {0} is not waiting")]
    NotWaiting(PlacementId),
}

/// Result of trying to load one vehicle.
#[derive(Clone, Debug, PartialEq)]
pub enum PlacementOutcome {
    Placed(Placement),
    NoSpace {
        class: Golongan,
        reason: NoSpaceReason,
    },
}

impl PlacementOutcome {
    pub fn placement(&self) -> Option<&Placement> {
        match self {
            PlacementOutcome::Placed(placement) => Some(placement),
            PlacementOutcome::NoSpace { .. } => None,
        }
    }
}

/// What a re-pack commits to the ship.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RepackCommit {
    /// Keep what was placed and unload the rest.
    #[default]
    Partial,
    /// Keep the new layout only if every vehicle was placed.
    AllOrNothing,
}

/// Balance of every deck plus the ship as a whole.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ShipBalance {
    pub decks: Vec<BalanceReport>,
    pub overall: BalanceReport,
}

#[derive(Clone, Debug)]
pub struct Ship {
    spec: ShipSpec,
    catalog: VehicleCatalog,
    config: PlannerConfig,
    layout: Layout,
    manifest: Vec<ManifestEntry>,
    next_id: u64,
}

impl Ship {
    pub fn new(spec: ShipSpec, catalog: VehicleCatalog, config: PlannerConfig) -> Self {
        let layout = Layout::empty(&spec, config.general_epsilon);
        info!(
            decks = spec.decks.len(),
            routing = spec.routing.name(),
            "ship ready"
        );
        Self {
            spec,
            catalog,
            config,
            layout,
            manifest: Vec::new(),
            next_id: 1,
        }
    }

    pub fn spec(&self) -> &ShipSpec {
        &self.spec
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn placements(&self) -> &[Placement] {
        self.layout.placements()
    }

    /// Every accepted vehicle in loading order, placed or waiting.
    pub fn manifest(&self) -> &[ManifestEntry] {
        &self.manifest
    }

    /// Vehicles a partial re-pack left without a place.
    pub fn waiting(&self) -> Vec<ManifestEntry> {
        self.manifest
            .iter()
            .filter(|entry| self.layout.get(entry.id).is_none())
            .copied()
            .collect()
    }

    fn loaded_entries(&self) -> Vec<ManifestEntry> {
        self.layout
            .placements()
            .iter()
            .map(Placement::manifest_entry)
            .collect()
    }

    /// Loads one vehicle of `class`, optionally with a weight other than the
    /// catalog default.
    pub fn add_vehicle(
        &mut self,
        class: Golongan,
        weight_override: Option<f64>,
    ) -> Result<PlacementOutcome, ShipError> {
        let spec = self.catalog.get(class)?;
        let weight = match weight_override {
            Some(weight) => {
                validate_weight(weight)?;
                weight
            }
            None => spec.weight,
        };
        let entry = ManifestEntry {
            id: PlacementId(self.next_id),
            class,
            dims: spec.dimensions(),
            weight,
        };

        let outcome = match planner::plan_placement(&self.layout, &self.spec, &entry, &self.config)
        {
            Ok(planned) => {
                let placement = entry.at(planned.deck, planned.position);
                match self.layout.commit(placement.clone()) {
                    Ok(()) => PlacementOutcome::Placed(placement),
                    Err(err) => {
                        warn!(vehicle = %entry.id, error = %err, "planned position was rejected");
                        PlacementOutcome::NoSpace {
                            class,
                            reason: NoSpaceReason::NoFreePosition,
                        }
                    }
                }
            }
            Err(reason) => self.on_no_space(entry, reason),
        };

        let outcome = match outcome {
            PlacementOutcome::Placed(_) if self.config.improve_after_add => {
                self.improve_balance();
                match self.layout.get(entry.id) {
                    Some(placement) => PlacementOutcome::Placed(placement.clone()),
                    None => PlacementOutcome::NoSpace {
                        class,
                        reason: NoSpaceReason::NoFreePosition,
                    },
                }
            }
            other => other,
        };

        match &outcome {
            PlacementOutcome::Placed(placement) => {
                self.next_id += 1;
                self.manifest.push(entry);
                info!(
                    vehicle = %placement.id,
                    class = %class,
                    deck = placement.deck,
                    x = placement.position.x,
                    y = placement.position.y,
                    "vehicle loaded"
                );
            }
            PlacementOutcome::NoSpace { reason, .. } => {
                info!(class = %class, reason = reason.code(), "no space for vehicle");
            }
        }
        Ok(outcome)
    }

    /// Fallback when the incremental search fails.
    fn on_no_space(&mut self, entry: ManifestEntry, reason: NoSpaceReason) -> PlacementOutcome {
        let retry = self.config.on_no_space == NoSpacePolicy::RepackAndRetry
            && reason == NoSpaceReason::NoFreePosition;
        if !retry {
            return PlacementOutcome::NoSpace {
                class: entry.class,
                reason,
            };
        }

        let mut manifest = self.loaded_entries();
        manifest.push(entry);
        let plan = planner::repack(&self.layout, &self.spec, &manifest, &self.config);
        if !plan.is_complete() {
            debug!(
                vehicle = %entry.id,
                unplaced = plan.unplaced.len(),
                "re-pack could not make room"
            );
            return PlacementOutcome::NoSpace {
                class: entry.class,
                reason,
            };
        }

        match plan.layout.get(entry.id).cloned() {
            Some(placement) => {
                self.layout = plan.layout;
                PlacementOutcome::Placed(placement)
            }
            None => PlacementOutcome::NoSpace {
                class: entry.class,
                reason,
            },
        }
    }

    /// Unloads a vehicle, frees its footprint and drops it from the manifest.
    pub fn remove_vehicle(&mut self, id: PlacementId) -> Result<Placement, ShipError> {
        let removed = self
            .layout
            .release(id)
            .map_err(|_| ShipError::NotFound(id))?;
        self.manifest.retain(|entry| entry.id != id);
        info!(vehicle = %id, deck = removed.deck, "vehicle unloaded");
        Ok(removed)
    }

    /// Drops a waiting vehicle from the manifest.
    pub fn discard_waiting(&mut self, id: PlacementId) -> Result<ManifestEntry, ShipError> {
        if self.layout.get(id).is_some() {
            return Err(ShipError::NotWaiting(id));
        }
        let index = self
            .manifest
            .iter()
            .position(|entry| entry.id == id)
            .ok_or(ShipError::NotFound(id))?;
        let entry = self.manifest.remove(index);
        info!(vehicle = %id, "waiting vehicle discarded");
        Ok(entry)
    }

    /// Reloads every vehicle of the manifest from empty decks.
    pub fn repack_all(&mut self, commit: RepackCommit) -> RepackPlan {
        self.repack_all_with_progress(commit, |_| {})
    }

    pub fn repack_all_with_progress(
        &mut self,
        commit: RepackCommit,
        on_event: impl FnMut(&RepackEvent),
    ) -> RepackPlan {
        let mut plan = planner::repack_with_progress(
            &self.layout,
            &self.spec,
            &self.manifest,
            &self.config,
            on_event,
        );

        let accept = match commit {
            RepackCommit::Partial => true,
            RepackCommit::AllOrNothing => plan.is_complete(),
        };
        let accept = accept
            && match plan.layout.verify(self.config.general_epsilon) {
                Ok(()) => true,
                Err(err) => {
                    error!(error = %err, "re-pack produced an invalid layout; discarding it");
                    false
                }
            };
        if accept {
            plan.committed = true;
            self.layout = plan.layout.clone();
            for left in &plan.unplaced {
                warn!(vehicle = %left.entry.id, reason = left.reason.code(), "vehicle left waiting by re-pack");
            }
        } else {
            info!(
                unplaced = plan.unplaced.len(),
                "re-pack left vehicles behind; keeping current layout"
            );
        }
        plan
    }

    /// Runs the local improvement and keeps the result if it is better.
    pub fn improve_balance(&mut self) -> ImprovementOutcome {
        let outcome = planner::local_improve(&self.layout, &self.config);
        if outcome.improved() {
            self.layout = outcome.layout.clone();
        }
        info!(
            initial = outcome.initial_score,
            r#final = outcome.final_score,
            iterations = outcome.iterations,
            "balance improvement done"
        );
        outcome
    }

    /// How many more vehicles of each class would still fit.
    pub fn remaining_capacity(&self) -> BTreeMap<Golongan, usize> {
        planner::remaining_capacity(&self.layout, &self.spec, &self.catalog, &self.config)
    }

    pub fn current_balance(&self) -> ShipBalance {
        let decks = (0..self.layout.decks().len())
            .filter_map(|deck| self.layout.deck_report(deck))
            .collect();
        let overall = BalanceReport::evaluate(self.layout.placements(), self.spec.ship_target());
        ShipBalance { decks, overall }
    }

    /// Free cells per deck.
    pub fn deck_capacity(&self) -> Vec<usize> {
        self.layout.free_capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BalanceTarget, DeckSpec, VehicleSpec};
    use crate::planner::CandidateStrategy;
    use crate::routing::DeckRouting;
    use crate::types::EPSILON_GENERAL;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn single_deck_ship(length: f64, width: f64, config: PlannerConfig) -> Ship {
        let spec = ShipSpec::new(
            vec![DeckSpec::grid(length, width).unwrap()],
            BalanceTarget::DeckCenter,
            DeckRouting::AllDecks,
        )
        .unwrap();
        Ship::new(spec, VehicleCatalog::standard(), config)
    }

    fn small_catalog_ship(config: PlannerConfig) -> Ship {
        let spec = ShipSpec::new(
            vec![DeckSpec::grid(10.0, 3.0).unwrap()],
            BalanceTarget::DeckCenter,
            DeckRouting::AllDecks,
        )
        .unwrap();
        let catalog = VehicleCatalog::from_specs([(
            Golongan::IV,
            VehicleSpec::new(2.0, 1.0, 1.0).unwrap(),
        )])
        .unwrap();
        Ship::new(spec, catalog, config)
    }

    #[test]
    fn add_vehicle_places_and_assigns_ids() {
        let mut ship = single_deck_ship(30.0, 3.0, PlannerConfig::default());
        let first = ship.add_vehicle(Golongan::IV, None).unwrap();
        let second = ship.add_vehicle(Golongan::IX, Some(9.5)).unwrap();

        let first = first.placement().unwrap();
        let second = second.placement().unwrap();
        assert_eq!(first.id, PlacementId(1));
        assert_eq!(second.id, PlacementId(2));
        assert_eq!(second.weight, 9.5);
        assert_eq!(ship.placements().len(), 2);
        assert_eq!(ship.deck_capacity(), vec![90 - 6 - 15]);
    }

    #[test]
    fn add_vehicle_rejects_bad_input_without_side_effects() {
        let mut ship = small_catalog_ship(PlannerConfig::default());
        assert!(matches!(
            ship.add_vehicle(Golongan::V, None),
            Err(ShipError::Validation(ValidationError::UnknownVehicleClass(_)))
        ));
        assert!(matches!(
            ship.add_vehicle(Golongan::IV, Some(-1.0)),
            Err(ShipError::Validation(ValidationError::InvalidWeight(_)))
        ));
        assert!(ship.placements().is_empty());
    }

    #[test]
    fn overflow_reports_no_space_and_keeps_state() {
        // 15 cells of deck: one IX fills it.
        let mut ship = single_deck_ship(15.0, 1.0, PlannerConfig::default());
        assert!(matches!(
            ship.add_vehicle(Golongan::IX, None).unwrap(),
            PlacementOutcome::Placed(_)
        ));
        let before = ship.placements().to_vec();

        let outcome = ship.add_vehicle(Golongan::IV, None).unwrap();
        assert_eq!(
            outcome,
            PlacementOutcome::NoSpace {
                class: Golongan::IV,
                reason: NoSpaceReason::NoFreePosition,
            }
        );
        assert_eq!(ship.placements(), before.as_slice());
        assert_eq!(ship.deck_capacity(), vec![0]);
    }

    #[test]
    fn oversized_class_reports_exceeds_deck() {
        let mut ship = single_deck_ship(10.0, 1.0, PlannerConfig::default());
        let outcome = ship.add_vehicle(Golongan::IX, None).unwrap();
        assert_eq!(
            outcome,
            PlacementOutcome::NoSpace {
                class: Golongan::IX,
                reason: NoSpaceReason::ExceedsDeck,
            }
        );
    }

    #[test]
    fn remove_then_re_add_restores_capacity() {
        let mut ship = single_deck_ship(30.0, 3.0, PlannerConfig::default());
        ship.add_vehicle(Golongan::VII, None).unwrap();
        let free_before = ship.deck_capacity();

        let outcome = ship.add_vehicle(Golongan::V, None).unwrap();
        let id = outcome.placement().unwrap().id;
        let removed = ship.remove_vehicle(id).unwrap();
        assert_eq!(removed.class, Golongan::V);
        assert_eq!(ship.deck_capacity(), free_before);

        assert!(matches!(
            ship.add_vehicle(Golongan::V, None).unwrap(),
            PlacementOutcome::Placed(_)
        ));
        assert_eq!(
            ship.remove_vehicle(id),
            Err(ShipError::NotFound(id)),
            "ids are never reused"
        );
    }

    #[test]
    fn two_small_vehicles_balance_better_than_one() {
        // CenteredFirst would put the first vehicle on the target already.
        let config = PlannerConfig::builder()
            .strategy(CandidateStrategy::Corner)
            .build();
        let mut ship = small_catalog_ship(config);

        ship.add_vehicle(Golongan::IV, None).unwrap();
        let one = ship.current_balance().decks[0].distance;
        ship.add_vehicle(Golongan::IV, None).unwrap();
        let two = ship.current_balance().decks[0].distance;

        assert!((one - 17.0f64.sqrt()).abs() < 1e-9);
        assert!(two < one);
    }

    #[test]
    fn repack_all_is_idempotent_when_everything_fits() {
        let spec = ShipSpec::new(
            vec![
                DeckSpec::grid(30.0, 3.0).unwrap(),
                DeckSpec::grid(30.0, 3.0).unwrap(),
            ],
            BalanceTarget::DeckCenter,
            DeckRouting::default(),
        )
        .unwrap();
        let mut ship = Ship::new(spec, VehicleCatalog::standard(), PlannerConfig::default());
        for class in [Golongan::IX, Golongan::IV, Golongan::VI, Golongan::V, Golongan::IV] {
            ship.add_vehicle(class, None).unwrap();
        }

        let first = ship.repack_all(RepackCommit::Partial);
        assert!(first.is_complete());
        let after_first = ship.placements().to_vec();

        let second = ship.repack_all(RepackCommit::Partial);
        assert!(second.is_complete());
        assert_eq!(ship.placements(), after_first.as_slice());
    }

    /// Two 6-long decks; the heavy class may only use deck 0.
    fn lowest_first_ship(config: PlannerConfig) -> Ship {
        let spec = ShipSpec::new(
            vec![
                DeckSpec::grid(6.0, 1.0).unwrap(),
                DeckSpec::grid(6.0, 1.0).unwrap(),
            ],
            BalanceTarget::DeckCenter,
            DeckRouting::LowestFirst {
                heavy_from: Golongan::VI,
            },
        )
        .unwrap();
        let catalog = VehicleCatalog::from_specs([
            (Golongan::IV, VehicleSpec::new(6.0, 1.0, 2.0).unwrap()),
            (Golongan::VI, VehicleSpec::new(6.0, 1.0, 4.0).unwrap()),
        ])
        .unwrap();
        Ship::new(spec, catalog, config)
    }

    #[test]
    fn all_or_nothing_keeps_layout_when_repack_is_partial() {
        let mut ship = lowest_first_ship(PlannerConfig::default());
        ship.add_vehicle(Golongan::VI, None).unwrap();
        // Heavier than the VI, so a re-pack puts it on deck 0 first.
        ship.add_vehicle(Golongan::IV, Some(10.0)).unwrap();
        assert_eq!(ship.placements()[1].deck, 1);
        let before = ship.placements().to_vec();

        let plan = ship.repack_all(RepackCommit::AllOrNothing);
        assert!(!plan.is_complete());
        assert!(!plan.committed);
        assert_eq!(plan.unplaced[0].entry.class, Golongan::VI);
        assert_eq!(ship.placements(), before.as_slice());
    }

    #[test]
    fn partial_repack_unloads_leftovers() {
        let mut ship = lowest_first_ship(PlannerConfig::default());
        ship.add_vehicle(Golongan::VI, None).unwrap();
        ship.add_vehicle(Golongan::IV, Some(10.0)).unwrap();

        let plan = ship.repack_all(RepackCommit::Partial);
        assert!(plan.committed);
        assert_eq!(plan.placed_count(), 1);
        assert_eq!(plan.unplaced.len(), 1);
        assert_eq!(ship.placements(), plan.placed());
        assert_eq!(ship.placements()[0].class, Golongan::IV);
        assert_eq!(ship.deck_capacity(), vec![0, 6]);
        assert_eq!(ship.waiting().len(), 1);
    }

    fn partition(plan: &RepackPlan) -> (Vec<PlacementId>, Vec<PlacementId>) {
        (
            plan.placed().iter().map(|p| p.id).collect(),
            plan.unplaced.iter().map(|left| left.entry.id).collect(),
        )
    }

    #[test]
    fn partial_repack_keeps_leftovers_in_the_manifest() {
        let mut ship = lowest_first_ship(PlannerConfig::default());
        ship.add_vehicle(Golongan::VI, None).unwrap();
        ship.add_vehicle(Golongan::IV, Some(10.0)).unwrap();

        let first = ship.repack_all(RepackCommit::default());
        let after_first = ship.placements().to_vec();
        let second = ship.repack_all(RepackCommit::default());

        assert_eq!(
            partition(&first),
            (vec![PlacementId(2)], vec![PlacementId(1)])
        );
        assert_eq!(partition(&second), partition(&first));
        assert!(second.committed);
        assert_eq!(ship.placements(), after_first.as_slice());
        assert_eq!(ship.manifest().len(), 2);
        let waiting: Vec<PlacementId> = ship.waiting().iter().map(|e| e.id).collect();
        assert_eq!(waiting, vec![PlacementId(1)]);

        // Unloading the blocker lets the waiting vehicle back on.
        ship.remove_vehicle(PlacementId(2)).unwrap();
        let third = ship.repack_all(RepackCommit::AllOrNothing);
        assert!(third.is_complete());
        assert_eq!(ship.placements()[0].id, PlacementId(1));
        assert!(ship.waiting().is_empty());
    }

    #[test]
    fn discard_waiting_only_touches_waiting_vehicles() {
        let mut ship = lowest_first_ship(PlannerConfig::default());
        ship.add_vehicle(Golongan::VI, None).unwrap();
        ship.add_vehicle(Golongan::IV, Some(10.0)).unwrap();
        ship.repack_all(RepackCommit::Partial);

        assert_eq!(
            ship.discard_waiting(PlacementId(2)),
            Err(ShipError::NotWaiting(PlacementId(2)))
        );
        assert_eq!(
            ship.remove_vehicle(PlacementId(1)),
            Err(ShipError::NotFound(PlacementId(1)))
        );
        assert_eq!(ship.discard_waiting(PlacementId(1)).map(|e| e.class), Ok(Golongan::VI));
        assert_eq!(
            ship.discard_waiting(PlacementId(1)),
            Err(ShipError::NotFound(PlacementId(1)))
        );

        let plan = ship.repack_all(RepackCommit::AllOrNothing);
        assert!(plan.is_complete());
        assert_eq!(ship.placements().len(), 1);
    }

    #[test]
    fn repack_and_retry_makes_room() {
        let mut reject = lowest_first_ship(PlannerConfig::default());
        reject.add_vehicle(Golongan::IV, None).unwrap();
        assert_eq!(reject.placements()[0].deck, 0);
        assert_eq!(
            reject.add_vehicle(Golongan::VI, None).unwrap(),
            PlacementOutcome::NoSpace {
                class: Golongan::VI,
                reason: NoSpaceReason::NoFreePosition,
            }
        );

        let config = PlannerConfig::builder()
            .on_no_space(NoSpacePolicy::RepackAndRetry)
            .build();
        let mut retry = lowest_first_ship(config);
        retry.add_vehicle(Golongan::IV, None).unwrap();
        let outcome = retry.add_vehicle(Golongan::VI, None).unwrap();

        let placed = outcome.placement().unwrap();
        assert_eq!(placed.id, PlacementId(2));
        assert_eq!(placed.deck, 0);
        assert_eq!(retry.layout().get(PlacementId(1)).map(|p| p.deck), Some(1));
        assert_eq!(retry.deck_capacity(), vec![0, 0]);
    }

    /// Bounds, no-overlap and per-deck free capacity all follow from the placement list.
    fn assert_consistent(ship: &Ship) {
        ship.layout().verify(EPSILON_GENERAL).unwrap();

        let free = ship.deck_capacity();
        for (index, deck) in ship.spec().decks.iter().enumerate() {
            let used: f64 = ship
                .placements()
                .iter()
                .filter(|p| p.deck == index)
                .map(|p| p.dims.area())
                .sum();
            let expected = (deck.dims().area() - used + EPSILON_GENERAL).floor() as usize;
            assert_eq!(free[index], expected, "free capacity of deck {index}");
        }

        assert_eq!(
            ship.placements().len() + ship.waiting().len(),
            ship.manifest().len()
        );
        for placed in ship.placements() {
            assert!(ship.manifest().iter().any(|entry| entry.id == placed.id));
        }
    }

    fn run_mixed_sequence(ship: &mut Ship, seed: u64, steps: usize) {
        let classes: Vec<Golongan> = VehicleCatalog::standard().classes().collect();
        let mut rng = StdRng::seed_from_u64(seed);

        for step in 0..steps {
            let roll = if step == 0 { 0 } else { rng.gen_range(0..10) };
            match roll {
                0..=4 => {
                    let class = classes[rng.gen_range(0..classes.len())];
                    let weight = (rng.gen_range(0..3) == 0).then(|| rng.gen_range(1.0..12.0));
                    ship.add_vehicle(class, weight).unwrap();
                }
                5 | 6 if !ship.manifest().is_empty() => {
                    let id = ship.manifest()[rng.gen_range(0..ship.manifest().len())].id;
                    match ship.remove_vehicle(id) {
                        Ok(removed) => assert_eq!(removed.id, id),
                        Err(ShipError::NotFound(_)) => {
                            ship.discard_waiting(id).unwrap();
                        }
                        Err(err) => panic!("unexpected error: {err}"),
                    }
                }
                7 => {
                    let commit = if rng.gen_range(0..2) == 0 {
                        RepackCommit::Partial
                    } else {
                        RepackCommit::AllOrNothing
                    };
                    ship.repack_all(commit);
                }
                _ => {
                    let before = ship.layout().objective();
                    let outcome = ship.improve_balance();
                    assert!(outcome.final_score <= before + EPSILON_GENERAL);
                }
            }
            assert_consistent(ship);
        }
    }

    fn two_deck_ship(deck: DeckSpec, config: PlannerConfig) -> Ship {
        let spec =
            ShipSpec::new(vec![deck, deck], BalanceTarget::DeckCenter, DeckRouting::default())
                .unwrap();
        Ship::new(spec, VehicleCatalog::standard(), config)
    }

    #[test]
    fn mixed_operations_keep_grid_decks_consistent() {
        for policy in [NoSpacePolicy::Reject, NoSpacePolicy::RepackAndRetry] {
            let config = PlannerConfig::builder()
                .on_no_space(policy)
                .max_iterations(150)
                .build();
            let mut ship = two_deck_ship(DeckSpec::grid(30.0, 3.0).unwrap(), config);
            run_mixed_sequence(&mut ship, 7, 80);
        }
    }

    #[test]
    fn mixed_operations_keep_continuous_decks_consistent() {
        let config = PlannerConfig::builder().max_iterations(150).build();
        let mut ship = two_deck_ship(DeckSpec::continuous(30.0, 2.5).unwrap(), config);

        // Centered on a 2.5-wide deck, a one-lane vehicle starts at y = 0.75.
        let first = ship.add_vehicle(Golongan::V, None).unwrap();
        assert_eq!(first.placement().map(|p| p.position.y), Some(0.75));
        assert_consistent(&ship);

        run_mixed_sequence(&mut ship, 11, 80);
    }

    #[test]
    fn improve_balance_never_worsens() {
        let config = PlannerConfig::builder()
            .strategy(CandidateStrategy::Corner)
            .build();
        let mut ship = small_catalog_ship(config);
        ship.add_vehicle(Golongan::IV, None).unwrap();
        let before = ship.layout().objective();

        let outcome = ship.improve_balance();
        assert!(outcome.final_score <= before);
        assert!((ship.layout().objective() - outcome.final_score).abs() < 1e-9);
    }

    #[test]
    fn improve_after_add_settles_each_vehicle() {
        let config = PlannerConfig::builder()
            .strategy(CandidateStrategy::Corner)
            .improve_after_add(true)
            .build();
        let mut ship = small_catalog_ship(config);
        let outcome = ship.add_vehicle(Golongan::IV, None).unwrap();

        let placed = outcome.placement().unwrap();
        assert_eq!(ship.layout().get(placed.id), Some(placed));
        assert!(ship.current_balance().decks[0].distance < 17.0f64.sqrt());
    }

    #[test]
    fn balance_and_capacity_reports() {
        let mut ship = single_deck_ship(30.0, 3.0, PlannerConfig::default());
        let empty = ship.current_balance();
        assert_eq!(empty.overall.vehicles, 0);
        assert_eq!(empty.decks.len(), 1);

        ship.add_vehicle(Golongan::IX, None).unwrap();
        let capacity = ship.remaining_capacity();
        assert_eq!(capacity.len(), 6);
        assert!(capacity[&Golongan::IX] >= 4);
        assert_eq!(ship.placements().len(), 1);

        let balance = ship.current_balance();
        assert_eq!(balance.overall.vehicles, 1);
        assert_eq!(balance.overall.total_weight, 8.0);
    }
}

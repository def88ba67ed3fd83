//! Placement planning for vehicles on ship decks.
//!
//! The planner chooses where a vehicle goes so that the weighted centroid of
//! each deck stays close to its balance target. It works in three modes:
//! - incremental: one vehicle against the current layout (`plan_placement`)
//! - batch: every vehicle of the manifest from empty decks, heaviest first
//!   (`repack_with_progress`)
//! - refinement: bounded local search / annealing over a committed layout
//!   (`local_improve`)
//!
//! Candidate positions are generated deterministically and sorted by x, then
//! y. Among valid candidates the lowest balance distance wins; equal scores
//! go to the smaller x, then the smaller y.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use utoipa::ToSchema;

use crate::balance::CenterOfMassCalculator;
use crate::layout::{DeckState, Layout};
use crate::model::{Golongan, ManifestEntry, Placement, PlacementId, ShipSpec, VehicleCatalog};
use crate::occupancy::OccupancyMap;
use crate::types::{Dimensional, EPSILON_GENERAL, Rect, Vec2};

/// How candidate positions are generated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum CandidateStrategy {
    /// Every offset on a `grid_step` raster.
    GridScan,
    /// Deck corners plus the positions touching each placed vehicle.
    Corner,
    /// `Corner`, plus the position centering the vehicle on the target.
    CenteredFirst,
}

/// What to do when an incremental placement finds no space.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoSpacePolicy {
    /// Report `NoSpace` and leave the ship untouched.
    Reject,
    /// Re-pack the whole manifest plus the new vehicle; keep it only if
    /// everything fits.
    RepackAndRetry,
}

/// Budget and schedule of the local improvement pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ImprovementConfig {
    /// Hard cap on perturbation steps.
    pub max_iterations: usize,
    /// Largest offset applied to a vehicle in one move.
    pub step: f64,
    /// Starting temperature; 0.0 gives pure descent.
    pub initial_temperature: f64,
    /// Geometric cooling factor per iteration.
    pub cooling_rate: f64,
    pub seed: u64,
    /// Optional wall-clock cap.
    pub time_budget: Option<Duration>,
}

impl ImprovementConfig {
    pub const DEFAULT_MAX_ITERATIONS: usize = 2_000;
    pub const DEFAULT_STEP: f64 = 1.0;
    pub const DEFAULT_INITIAL_TEMPERATURE: f64 = 0.5;
    pub const DEFAULT_COOLING_RATE: f64 = 0.995;
    pub const DEFAULT_SEED: u64 = 42;
    /// Below this the schedule counts as frozen.
    const FROZEN_TEMPERATURE: f64 = 1e-3;
}

impl Default for ImprovementConfig {
    fn default() -> Self {
        Self {
            max_iterations: Self::DEFAULT_MAX_ITERATIONS,
            step: Self::DEFAULT_STEP,
            initial_temperature: Self::DEFAULT_INITIAL_TEMPERATURE,
            cooling_rate: Self::DEFAULT_COOLING_RATE,
            seed: Self::DEFAULT_SEED,
            time_budget: None,
        }
    }
}

/// Configuration of the placement planner.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct PlannerConfig {
    pub strategy: CandidateStrategy,
    /// Raster step for `GridScan`.
    pub grid_step: f64,
    /// General numerical tolerance.
    pub general_epsilon: f64,
    pub on_no_space: NoSpacePolicy,
    /// Run the local improvement after every successful add.
    pub improve_after_add: bool,
    pub improvement: ImprovementConfig,
}

impl PlannerConfig {
    pub const DEFAULT_GRID_STEP: f64 = 1.0;
    pub const DEFAULT_GENERAL_EPSILON: f64 = EPSILON_GENERAL;
    pub const DEFAULT_IMPROVE_AFTER_ADD: bool = false;

    pub fn builder() -> PlannerConfigBuilder {
        PlannerConfigBuilder::default()
    }
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            strategy: CandidateStrategy::CenteredFirst,
            grid_step: Self::DEFAULT_GRID_STEP,
            general_epsilon: Self::DEFAULT_GENERAL_EPSILON,
            on_no_space: NoSpacePolicy::Reject,
            improve_after_add: Self::DEFAULT_IMPROVE_AFTER_ADD,
            improvement: ImprovementConfig::default(),
        }
    }
}

/// Builder for [`PlannerConfig`].
#[derive(Clone, Debug, Default)]
pub struct PlannerConfigBuilder {
    config: PlannerConfig,
}

impl PlannerConfigBuilder {
    pub fn strategy(mut self, strategy: CandidateStrategy) -> Self {
        self.config.strategy = strategy;
        self
    }

    pub fn grid_step(mut self, step: f64) -> Self {
        self.config.grid_step = step;
        self
    }

    pub fn general_epsilon(mut self, epsilon: f64) -> Self {
        self.config.general_epsilon = epsilon;
        self
    }

    pub fn on_no_space(mut self, policy: NoSpacePolicy) -> Self {
        self.config.on_no_space = policy;
        self
    }

    pub fn improve_after_add(mut self, enabled: bool) -> Self {
        self.config.improve_after_add = enabled;
        self
    }

    pub fn max_iterations(mut self, iterations: usize) -> Self {
        self.config.improvement.max_iterations = iterations;
        self
    }

    pub fn improvement_step(mut self, step: f64) -> Self {
        self.config.improvement.step = step;
        self
    }

    pub fn initial_temperature(mut self, temperature: f64) -> Self {
        self.config.improvement.initial_temperature = temperature;
        self
    }

    pub fn cooling_rate(mut self, rate: f64) -> Self {
        self.config.improvement.cooling_rate = rate;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.improvement.seed = seed;
        self
    }

    pub fn time_budget(mut self, budget: Option<Duration>) -> Self {
        self.config.improvement.time_budget = budget;
        self
    }

    pub fn build(self) -> PlannerConfig {
        self.config
    }
}

/// Why a vehicle could not be placed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NoSpaceReason {
    /// The routing policy allows no deck for this class.
    NoAllowedDeck,
    /// The footprint is larger than every allowed deck.
    ExceedsDeck,
    /// Every candidate position is out of bounds or taken.
    NoFreePosition,
}

impl NoSpaceReason {
    pub fn code(&self) -> &'static str {
        match self {
            NoSpaceReason::NoAllowedDeck => "no_allowed_deck",
            NoSpaceReason::ExceedsDeck => "exceeds_deck",
            NoSpaceReason::NoFreePosition => "no_free_position",
        }
    }
}

impl std::fmt::Display for NoSpaceReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NoSpaceReason::NoAllowedDeck => {
                write!(f, "No deck is open to this vehicle class")
            }
            NoSpaceReason::ExceedsDeck => {
                write!(f, "Vehicle is larger than every deck it may use")
            }
            NoSpaceReason::NoFreePosition => {
                write!(f, "No free position left on the allowed decks")
            }
        }
    }
}

/// Chosen spot for a vehicle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PlannedPosition {
    pub deck: usize,
    pub position: Vec2,
    /// Deck balance distance after placing the vehicle.
    pub score: f64,
}

/// Score of a candidate position. Lower is better: balance first, then x, then y.
#[derive(Clone, Copy, Debug)]
struct PlacementScore {
    balance: f64,
    position: Vec2,
}

fn is_better_score(new: PlacementScore, current: PlacementScore, epsilon: f64) -> bool {
    match compare_with_epsilon(new.balance, current.balance, epsilon) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }

    match compare_with_epsilon(new.position.x, current.position.x, epsilon) {
        Ordering::Less => return true,
        Ordering::Greater => return false,
        Ordering::Equal => {}
    }

    compare_with_epsilon(new.position.y, current.position.y, epsilon) == Ordering::Less
}

fn compare_with_epsilon(a: f64, b: f64, eps: f64) -> Ordering {
    if (a - b).abs() <= eps {
        Ordering::Equal
    } else if a < b {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

/// Raster positions along one axis, always including both ends.
fn axis_positions(deck_len: f64, item_len: f64, step: f64, epsilon: f64) -> Vec<f64> {
    let max_pos = deck_len - item_len;
    if max_pos < -epsilon {
        return Vec::new();
    }
    let max_pos = max_pos.max(0.0);
    if max_pos <= epsilon || step <= epsilon {
        return vec![0.0, max_pos];
    }

    let mut positions = Vec::new();
    let mut index = 0u32;
    loop {
        let pos = f64::from(index) * step;
        if pos > max_pos + epsilon {
            break;
        }
        positions.push(pos.min(max_pos));
        index += 1;
    }
    positions.push(max_pos);
    positions
}

/// Candidate bottom/left corners for a `dims`-sized vehicle on `deck`.
///
/// The result is snapped to the deck's lattice, sorted by x then y and free of
/// duplicates. Candidates may still be invalid; callers check bounds and
/// overlap.
pub fn candidate_positions<'a>(
    dims: Vec2,
    deck: &DeckState,
    placed: impl IntoIterator<Item = &'a Rect>,
    config: &PlannerConfig,
) -> Vec<Vec2> {
    let eps = config.general_epsilon;
    let extent = deck.spec.dims();
    let mut candidates = Vec::new();

    match config.strategy {
        CandidateStrategy::GridScan => {
            let xs = axis_positions(extent.x, dims.x, config.grid_step, eps);
            let ys = axis_positions(extent.y, dims.y, config.grid_step, eps);
            for &x in &xs {
                for &y in &ys {
                    candidates.push(Vec2::new(x, y));
                }
            }
        }
        CandidateStrategy::Corner | CandidateStrategy::CenteredFirst => {
            let far = extent - dims;
            candidates.push(Vec2::zero());
            candidates.push(Vec2::new(far.x, 0.0));
            candidates.push(Vec2::new(0.0, far.y));
            candidates.push(far);

            for rect in placed {
                // right of, left of, above, below
                candidates.push(Vec2::new(rect.max.x, rect.min.y));
                candidates.push(Vec2::new(rect.min.x - dims.x, rect.min.y));
                candidates.push(Vec2::new(rect.min.x, rect.max.y));
                candidates.push(Vec2::new(rect.min.x, rect.min.y - dims.y));
            }

            if config.strategy == CandidateStrategy::CenteredFirst {
                let centered = deck.target - dims * 0.5;
                candidates.push(Vec2::new(
                    centered.x.clamp(0.0, far.x.max(0.0)),
                    centered.y.clamp(0.0, far.y.max(0.0)),
                ));
            }
        }
    }

    let mut candidates: Vec<Vec2> = candidates
        .into_iter()
        .filter(|c| c.x.is_finite() && c.y.is_finite())
        .map(|c| deck.occupancy.snap(c))
        .collect();
    candidates.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    candidates.dedup_by(|a, b| (a.x - b.x).abs() <= eps && (a.y - b.y).abs() <= eps);
    candidates
}

/// Best valid position for a vehicle on one deck, if any.
pub fn best_position_on_deck(
    layout: &Layout,
    deck_index: usize,
    dims: Vec2,
    weight: f64,
    config: &PlannerConfig,
) -> Option<PlannedPosition> {
    let deck = layout.deck(deck_index)?;
    if !dims.fits_within(&deck.spec.dims(), config.general_epsilon) {
        return None;
    }

    let base = CenterOfMassCalculator::from_items(layout.on_deck(deck_index));
    let footprints: Vec<Rect> = layout.on_deck(deck_index).map(|p| p.footprint()).collect();

    let mut best: Option<PlacementScore> = None;
    for position in candidate_positions(dims, deck, &footprints, config) {
        let rect = Rect::from_position_and_dims(position, dims);
        if !deck.occupancy.fits(&rect) || deck.occupancy.overlaps(&rect) {
            continue;
        }

        let score = PlacementScore {
            balance: base.with_point(rect.center(), weight).distance_to(deck.target),
            position,
        };
        match best {
            Some(current) if !is_better_score(score, current, config.general_epsilon) => {}
            _ => best = Some(score),
        }
    }

    best.map(|score| PlannedPosition {
        deck: deck_index,
        position: score.position,
        score: score.balance,
    })
}

/// Incremental mode: where should `entry` go on the current layout?
///
/// Decks are tried in routing order; the first deck with any valid position
/// wins. The layout is not modified.
pub fn plan_placement(
    layout: &Layout,
    ship: &ShipSpec,
    entry: &ManifestEntry,
    config: &PlannerConfig,
) -> Result<PlannedPosition, NoSpaceReason> {
    let decks = ship.routing.allowed_decks(entry.class, layout.decks().len());
    if decks.is_empty() {
        return Err(NoSpaceReason::NoAllowedDeck);
    }

    let fits_any = decks.iter().any(|&index| {
        layout.deck(index).is_some_and(|deck| {
            entry
                .dimensions()
                .fits_within(&deck.spec.dims(), config.general_epsilon)
        })
    });
    if !fits_any {
        return Err(NoSpaceReason::ExceedsDeck);
    }

    for index in decks {
        if let Some(planned) =
            best_position_on_deck(layout, index, entry.dims, entry.weight, config)
        {
            debug!(
                vehicle = %entry.id,
                class = %entry.class,
                deck = planned.deck,
                x = planned.position.x,
                y = planned.position.y,
                score = planned.score,
                "planned placement"
            );
            return Ok(planned);
        }
    }
    Err(NoSpaceReason::NoFreePosition)
}

/// Vehicle left out of a re-pack.
#[derive(Clone, Debug, PartialEq)]
pub struct UnplacedVehicle {
    pub entry: ManifestEntry,
    pub reason: NoSpaceReason,
}

/// Outcome of a full re-pack.
#[derive(Clone, Debug)]
pub struct RepackPlan {
    /// The new layout; only contains the placed vehicles.
    pub layout: Layout,
    pub unplaced: Vec<UnplacedVehicle>,
    /// Whether the ship adopted this layout.
    pub committed: bool,
}

impl RepackPlan {
    pub fn is_complete(&self) -> bool {
        self.unplaced.is_empty()
    }

    /// Vehicles the plan managed to load.
    pub fn placed(&self) -> &[Placement] {
        self.layout.placements()
    }

    pub fn placed_count(&self) -> usize {
        self.layout.placements().len()
    }
}

/// Events emitted during a re-pack, for live progress.
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type")]
pub enum RepackEvent {
    /// Re-pack begins with this many vehicles.
    Started { vehicles: usize, decks: usize },
    VehiclePlaced {
        id: PlacementId,
        class: Golongan,
        deck: usize,
        pos: (f64, f64),
        weight: f64,
        deck_distance: f64,
    },
    VehicleRejected {
        id: PlacementId,
        class: Golongan,
        reason_code: String,
        reason_text: String,
    },
    Finished {
        placed: usize,
        unplaced: usize,
        objective: f64,
    },
}

/// Heaviest first, then larger footprint, then lower id.
fn repack_order(a: &ManifestEntry, b: &ManifestEntry) -> Ordering {
    b.weight
        .partial_cmp(&a.weight)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            b.footprint_area()
                .partial_cmp(&a.footprint_area())
                .unwrap_or(Ordering::Equal)
        })
        .then_with(|| a.id.cmp(&b.id))
}

/// Batch mode: load the whole manifest onto emptied decks.
pub fn repack(
    template: &Layout,
    ship: &ShipSpec,
    manifest: &[ManifestEntry],
    config: &PlannerConfig,
) -> RepackPlan {
    repack_with_progress(template, ship, manifest, config, |_| {})
}

/// Like [`repack`], calling `on_event` for every step.
pub fn repack_with_progress(
    template: &Layout,
    ship: &ShipSpec,
    manifest: &[ManifestEntry],
    config: &PlannerConfig,
    mut on_event: impl FnMut(&RepackEvent),
) -> RepackPlan {
    let mut layout = template.cleared();
    let mut unplaced = Vec::new();

    let mut order: Vec<ManifestEntry> = manifest.to_vec();
    order.sort_by(repack_order);

    on_event(&RepackEvent::Started {
        vehicles: order.len(),
        decks: layout.decks().len(),
    });

    for entry in order {
        let planned = plan_placement(&layout, ship, &entry, config).and_then(|planned| {
            layout
                .commit(entry.at(planned.deck, planned.position))
                .map(|_| planned)
                .map_err(|_| NoSpaceReason::NoFreePosition)
        });

        match planned {
            Ok(planned) => on_event(&RepackEvent::VehiclePlaced {
                id: entry.id,
                class: entry.class,
                deck: planned.deck,
                pos: planned.position.into(),
                weight: entry.weight,
                deck_distance: planned.score,
            }),
            Err(reason) => {
                on_event(&RepackEvent::VehicleRejected {
                    id: entry.id,
                    class: entry.class,
                    reason_code: reason.code().to_string(),
                    reason_text: reason.to_string(),
                });
                unplaced.push(UnplacedVehicle { entry, reason });
            }
        }
    }

    let objective = layout.objective();
    on_event(&RepackEvent::Finished {
        placed: layout.placements().len(),
        unplaced: unplaced.len(),
        objective,
    });
    info!(
        placed = layout.placements().len(),
        unplaced = unplaced.len(),
        objective,
        "re-pack finished"
    );

    RepackPlan {
        layout,
        unplaced,
        committed: false,
    }
}

/// Result of a local improvement pass.
#[derive(Clone, Debug)]
pub struct ImprovementOutcome {
    /// Best layout seen; never worse than the input.
    pub layout: Layout,
    pub initial_score: f64,
    pub final_score: f64,
    pub iterations: usize,
    pub accepted_moves: usize,
}

impl ImprovementOutcome {
    pub fn improved(&self) -> bool {
        self.final_score < self.initial_score
    }
}

/// Tries to move vehicle `index` of `layout` to `position` on the same deck.
///
/// Returns the objective delta on success; on failure `layout` is unchanged.
fn try_move(layout: &mut Layout, index: usize, position: Vec2) -> Option<f64> {
    let original = layout.placements().get(index)?.clone();
    if position == original.position {
        return None;
    }
    let before = layout.deck_score(original.deck);

    layout.release(original.id).ok()?;
    let moved = original.moved_to(original.deck, position);
    if layout.commit(moved).is_err() {
        let id = original.id;
        let restored = layout.commit(original);
        if let Err(err) = &restored {
            error!(vehicle = %id, error = %err, "could not restore vehicle after a rejected move");
        }
        debug_assert!(restored.is_ok(), "freed footprint of {id} was rejected");
        return None;
    }
    Some(layout.deck_score(original.deck) - before)
}

/// Bounded refinement of a committed layout.
///
/// Vehicles are visited round-robin. Each visit tries the four axis moves of
/// `step` and one random offset in `[-step, step]²`, keeping the best valid
/// one if it improves the objective, or with probability `exp(-Δ/T)` if it
/// does not. Stops at `max_iterations`, at the time budget, or after a full
/// pass without any accepted move once the temperature is frozen.
pub fn local_improve(layout: &Layout, config: &PlannerConfig) -> ImprovementOutcome {
    let settings = config.improvement;
    let eps = config.general_epsilon;
    let initial_score = layout.objective();

    let mut best = layout.clone();
    let mut best_score = initial_score;
    let mut current = layout.clone();
    let mut current_score = initial_score;

    let count = layout.placements().len();
    let mut iterations = 0;
    let mut accepted_moves = 0;

    if count == 0 || settings.max_iterations == 0 || settings.step <= eps {
        return ImprovementOutcome {
            layout: best,
            initial_score,
            final_score: best_score,
            iterations,
            accepted_moves,
        };
    }

    let mut rng = StdRng::seed_from_u64(settings.seed);
    let mut temperature = settings.initial_temperature.max(0.0);
    let started = Instant::now();
    let mut quiet_iterations = 0;
    let step = settings.step;

    while iterations < settings.max_iterations {
        if settings
            .time_budget
            .is_some_and(|budget| started.elapsed() >= budget)
        {
            debug!(iterations, "local improvement hit its time budget");
            break;
        }

        let index = iterations % count;
        iterations += 1;

        let origin = current.placements()[index].position;
        let random_offset = Vec2::new(rng.gen_range(-step..=step), rng.gen_range(-step..=step));
        let moves = [
            Vec2::new(step, 0.0),
            Vec2::new(-step, 0.0),
            Vec2::new(0.0, step),
            Vec2::new(0.0, -step),
            random_offset,
        ];

        let mut best_move: Option<(Vec2, f64)> = None;
        for offset in moves {
            let deck = current.placements()[index].deck;
            let target = match current.deck(deck) {
                Some(state) => state.occupancy.snap(origin + offset),
                None => continue,
            };
            let mut trial = current.clone();
            if let Some(delta) = try_move(&mut trial, index, target) {
                if best_move.is_none_or(|(_, best_delta)| delta < best_delta - eps) {
                    best_move = Some((target, delta));
                }
            }
        }

        let accepted = match best_move {
            Some((_, delta)) if delta < -eps => true,
            Some((_, delta)) if temperature > ImprovementConfig::FROZEN_TEMPERATURE => {
                rng.gen_range(0.0..1.0) < (-delta.max(0.0) / temperature).exp()
            }
            _ => false,
        };

        if let (true, Some((target, delta))) = (accepted, best_move) {
            if try_move(&mut current, index, target).is_some() {
                current_score += delta;
                accepted_moves += 1;
                if current_score < best_score - eps {
                    // Recompute to avoid drift from accumulated deltas.
                    current_score = current.objective();
                    best_score = current_score;
                    best = current.clone();
                }
            }
        }

        if accepted && best_move.is_some_and(|(_, delta)| delta < -eps) {
            quiet_iterations = 0;
        } else {
            quiet_iterations += 1;
        }

        temperature *= settings.cooling_rate;
        if quiet_iterations >= count && temperature <= ImprovementConfig::FROZEN_TEMPERATURE {
            break;
        }
    }

    debug!(
        iterations,
        accepted_moves,
        initial_score,
        final_score = best_score,
        "local improvement finished"
    );

    ImprovementOutcome {
        layout: best,
        initial_score,
        final_score: best_score,
        iterations,
        accepted_moves,
    }
}

/// Sequential greedy capacity: how many more vehicles of each class fit if
/// only that class were loaded from now on.
pub fn remaining_capacity(
    layout: &Layout,
    ship: &ShipSpec,
    catalog: &VehicleCatalog,
    config: &PlannerConfig,
) -> BTreeMap<Golongan, usize> {
    let mut result = BTreeMap::new();
    let free_cells = layout.total_free_capacity();

    for class in catalog.classes() {
        let Ok(spec) = catalog.get(class) else {
            continue;
        };
        let mut simulation = layout.clone();
        let cap = free_cells / (spec.footprint_area().floor().max(1.0) as usize) + 1;
        let mut count = 0;

        while count < cap {
            let entry = ManifestEntry {
                id: PlacementId(u64::MAX - count as u64),
                class,
                dims: spec.dimensions(),
                weight: spec.weight,
            };
            let Ok(planned) = plan_placement(&simulation, ship, &entry, config) else {
                break;
            };
            if simulation
                .commit(entry.at(planned.deck, planned.position))
                .is_err()
            {
                break;
            }
            count += 1;
        }
        result.insert(class, count);
    }
    result
}

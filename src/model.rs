//! Data models for deck loading.
//!
//! This module defines the fundamental data structures of the engine:
//! - `Golongan`: the fixed vehicle classes IV..IX
//! - `VehicleSpec` / `VehicleCatalog`: footprint and weight per class
//! - `Placement`: a vehicle with its position on a deck
//! - `DeckSpec` / `ShipSpec`: immutable ship configuration

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::routing::DeckRouting;
use crate::types::{Dimensional, Positioned, Rect, Vec2, Weighted};

/// Validation error for configuration and vehicle data.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Invalid dimension: {0}")]
    InvalidDimension(String),
    #[error("Invalid weight: {0}")]
    InvalidWeight(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Unknown vehicle class: {0}")]
    UnknownVehicleClass(String),
}

fn validate_dimension(value: f64, name: &str) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidDimension(format!(
            "{} must be positive, got: {}",
            name, value
        )));
    }
    Ok(())
}

/// Rejects zero, negative and non-finite weights.
pub fn validate_weight(value: f64) -> Result<(), ValidationError> {
    if value <= 0.0 || value.is_nan() || value.is_infinite() {
        return Err(ValidationError::InvalidWeight(format!(
            "Weight must be positive, got: {}",
            value
        )));
    }
    Ok(())
}

/// Vehicle class ("golongan") as used by Indonesian ferry tariffs.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
pub enum Golongan {
    IV,
    V,
    VI,
    VII,
    VIII,
    IX,
}

impl Golongan {
    pub const ALL: [Golongan; 6] = [
        Golongan::IV,
        Golongan::V,
        Golongan::VI,
        Golongan::VII,
        Golongan::VIII,
        Golongan::IX,
    ];

    /// Roman numeral label.
    pub fn roman(self) -> &'static str {
        match self {
            Golongan::IV => "IV",
            Golongan::V => "V",
            Golongan::VI => "VI",
            Golongan::VII => "VII",
            Golongan::VIII => "VIII",
            Golongan::IX => "IX",
        }
    }

    /// Numeric class number (4..=9).
    pub fn number(self) -> u8 {
        match self {
            Golongan::IV => 4,
            Golongan::V => 5,
            Golongan::VI => 6,
            Golongan::VII => 7,
            Golongan::VIII => 8,
            Golongan::IX => 9,
        }
    }
}

impl fmt::Display for Golongan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.roman())
    }
}

impl FromStr for Golongan {
    type Err = ValidationError;

    /// Accepts the Roman form (`"VII"`, case-insensitive) or the number (`"7"`).
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        Golongan::ALL
            .into_iter()
            .find(|class| {
                class.roman().eq_ignore_ascii_case(trimmed)
                    || trimmed.parse::<u8>().ok() == Some(class.number())
            })
            .ok_or_else(|| ValidationError::UnknownVehicleClass(trimmed.to_string()))
    }
}

/// Footprint and default weight of a vehicle class.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct VehicleSpec {
    /// Extent along the deck length.
    pub length: f64,
    /// Extent across the deck width.
    pub width: f64,
    pub weight: f64,
}

impl VehicleSpec {
    /// Creates a validated vehicle spec.
    ///
    /// ```
    /// use deck_loader::model::VehicleSpec;
    ///
    /// assert!(VehicleSpec::new(6.0, 1.0, 2.0).is_ok());
    /// assert!(VehicleSpec::new(-6.0, 1.0, 2.0).is_err());
    /// ```
    pub fn new(length: f64, width: f64, weight: f64) -> Result<Self, ValidationError> {
        validate_dimension(length, "Vehicle length")?;
        validate_dimension(width, "Vehicle width")?;
        validate_weight(weight)?;
        Ok(Self {
            length,
            width,
            weight,
        })
    }
}

impl Dimensional for VehicleSpec {
    fn dimensions(&self) -> Vec2 {
        Vec2::new(self.length, self.width)
    }
}

/// Static table of vehicle classes, loaded once per ship.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct VehicleCatalog {
    specs: BTreeMap<Golongan, VehicleSpec>,
}

impl VehicleCatalog {
    /// The ferry tariff table: lengths in deck cells, one lane wide, weight in tons.
    pub fn standard() -> Self {
        let table = [
            (Golongan::IV, 6.0, 2.0),
            (Golongan::V, 7.0, 3.0),
            (Golongan::VI, 8.0, 4.0),
            (Golongan::VII, 10.0, 5.0),
            (Golongan::VIII, 12.0, 6.0),
            (Golongan::IX, 15.0, 8.0),
        ];
        Self {
            specs: table
                .into_iter()
                .map(|(class, length, weight)| {
                    (
                        class,
                        VehicleSpec {
                            length,
                            width: 1.0,
                            weight,
                        },
                    )
                })
                .collect(),
        }
    }

    /// Builds a catalog from explicit entries, validating each one.
    pub fn from_specs(
        entries: impl IntoIterator<Item = (Golongan, VehicleSpec)>,
    ) -> Result<Self, ValidationError> {
        let mut specs = BTreeMap::new();
        for (class, spec) in entries {
            let spec = VehicleSpec::new(spec.length, spec.width, spec.weight)?;
            specs.insert(class, spec);
        }
        if specs.is_empty() {
            return Err(ValidationError::InvalidConfiguration(
                "Vehicle catalog must contain at least one class".to_string(),
            ));
        }
        Ok(Self { specs })
    }

    /// Looks up a class, failing for classes this catalog does not carry.
    pub fn get(&self, class: Golongan) -> Result<&VehicleSpec, ValidationError> {
        self.specs
            .get(&class)
            .ok_or_else(|| ValidationError::UnknownVehicleClass(class.to_string()))
    }

    pub fn classes(&self) -> impl Iterator<Item = Golongan> + '_ {
        self.specs.keys().copied()
    }
}

impl Default for VehicleCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

/// Identifier handed out when a vehicle is loaded.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ToSchema,
)]
#[serde(transparent)]
pub struct PlacementId(pub u64);

impl fmt::Display for PlacementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A loaded vehicle and where it sits.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct Placement {
    pub id: PlacementId,
    pub class: Golongan,
    /// Deck index, 0 is the lowest deck.
    pub deck: usize,
    /// Bottom/left corner of the footprint.
    pub position: Vec2,
    pub dims: Vec2,
    pub weight: f64,
}

impl Placement {
    pub fn footprint(&self) -> Rect {
        Rect::from_position_and_dims(self.position, self.dims)
    }

    pub fn center(&self) -> Vec2 {
        self.position + self.dims * 0.5
    }

    /// Same vehicle at another spot.
    pub fn moved_to(&self, deck: usize, position: Vec2) -> Self {
        Self {
            deck,
            position,
            ..self.clone()
        }
    }

    pub fn manifest_entry(&self) -> ManifestEntry {
        ManifestEntry {
            id: self.id,
            class: self.class,
            dims: self.dims,
            weight: self.weight,
        }
    }
}

impl Positioned for Placement {
    fn position(&self) -> Vec2 {
        self.position
    }
}

impl Dimensional for Placement {
    fn dimensions(&self) -> Vec2 {
        self.dims
    }
}

impl Weighted for Placement {
    fn weight(&self) -> f64 {
        self.weight
    }
}

/// A vehicle that has to be loaded, independent of its position.
///
/// The manifest is what a full re-pack replays.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, ToSchema)]
pub struct ManifestEntry {
    pub id: PlacementId,
    pub class: Golongan,
    pub dims: Vec2,
    pub weight: f64,
}

impl ManifestEntry {
    /// The placed form of this entry.
    pub fn at(&self, deck: usize, position: Vec2) -> Placement {
        Placement {
            id: self.id,
            class: self.class,
            deck,
            position,
            dims: self.dims,
            weight: self.weight,
        }
    }
}

impl Dimensional for ManifestEntry {
    fn dimensions(&self) -> Vec2 {
        self.dims
    }
}

/// How a deck tracks occupied space.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OccupancyKind {
    /// Discrete cells of `cell_size × cell_size`.
    Grid { cell_size: f64 },
    /// Real-valued positions, tracked as a list of rectangles.
    Continuous,
}

impl Default for OccupancyKind {
    fn default() -> Self {
        OccupancyKind::Grid { cell_size: 1.0 }
    }
}

/// Dimensions and occupancy mode of one deck ("lantai").
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct DeckSpec {
    pub length: f64,
    pub width: f64,
    pub kind: OccupancyKind,
}

impl DeckSpec {
    pub fn new(length: f64, width: f64, kind: OccupancyKind) -> Result<Self, ValidationError> {
        validate_dimension(length, "Deck length")?;
        validate_dimension(width, "Deck width")?;
        if let OccupancyKind::Grid { cell_size } = kind {
            validate_dimension(cell_size, "Cell size")?;
            if cell_size > length.min(width) {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "Cell size {} exceeds deck extent {}x{}",
                    cell_size, length, width
                )));
            }
        }
        Ok(Self {
            length,
            width,
            kind,
        })
    }

    /// Unit-cell grid deck, one cell per deck unit.
    pub fn grid(length: f64, width: f64) -> Result<Self, ValidationError> {
        Self::new(length, width, OccupancyKind::Grid { cell_size: 1.0 })
    }

    pub fn continuous(length: f64, width: f64) -> Result<Self, ValidationError> {
        Self::new(length, width, OccupancyKind::Continuous)
    }

    pub fn dims(&self) -> Vec2 {
        Vec2::new(self.length, self.width)
    }

    /// Geometric center of the deck.
    pub fn center(&self) -> Vec2 {
        self.dims().center()
    }
}

/// Reference point the centroid is optimized toward.
#[derive(Clone, Copy, Debug, PartialEq, Default, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BalanceTarget {
    /// Geometric center of every deck.
    #[default]
    DeckCenter,
    /// One user-specified point, shared by every deck.
    Fixed { x: f64, y: f64 },
}

impl BalanceTarget {
    pub fn for_deck(&self, deck: &DeckSpec) -> Vec2 {
        match self {
            BalanceTarget::DeckCenter => deck.center(),
            BalanceTarget::Fixed { x, y } => Vec2::new(*x, *y),
        }
    }
}

/// Immutable ship configuration.
#[derive(Clone, Debug, PartialEq, Serialize, ToSchema)]
pub struct ShipSpec {
    /// Decks from the lowest (index 0) upward.
    pub decks: Vec<DeckSpec>,
    pub target: BalanceTarget,
    pub routing: DeckRouting,
}

impl ShipSpec {
    pub fn new(
        decks: Vec<DeckSpec>,
        target: BalanceTarget,
        routing: DeckRouting,
    ) -> Result<Self, ValidationError> {
        if decks.is_empty() {
            return Err(ValidationError::InvalidConfiguration(
                "A ship needs at least one deck".to_string(),
            ));
        }
        for deck in &decks {
            DeckSpec::new(deck.length, deck.width, deck.kind)?;
        }
        if let BalanceTarget::Fixed { x, y } = target {
            if !x.is_finite() || !y.is_finite() {
                return Err(ValidationError::InvalidConfiguration(format!(
                    "Balance target must be finite, got: ({}, {})",
                    x, y
                )));
            }
        }
        Ok(Self {
            decks,
            target,
            routing,
        })
    }

    /// Target point for one deck.
    pub fn deck_target(&self, deck: usize) -> Vec2 {
        self.decks
            .get(deck)
            .map(|spec| self.target.for_deck(spec))
            .unwrap_or_default()
    }

    /// Target for the ship as a whole: the fixed point, or the lowest deck's center.
    pub fn ship_target(&self) -> Vec2 {
        self.deck_target(0)
    }
}

use std::env;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use tracing::{info, warn};

use crate::model::{BalanceTarget, DeckSpec, Golongan, OccupancyKind, ShipSpec, VehicleCatalog};
use crate::planner::{CandidateStrategy, ImprovementConfig, NoSpacePolicy, PlannerConfig};
use crate::routing::DeckRouting;

/// Complete application configuration, loaded from environment variables or default values.
#[derive(Clone, Debug)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub ship: ShipConfig,
    pub planner: PlannerConfig,
}

impl AppConfig {
    /// Creates a configuration from the currently available environment variables.
    pub fn from_env() -> Self {
        Self {
            api: ApiConfig::from_env(),
            ship: ShipConfig::from_env(),
            planner: planner_config_from_env(),
        }
    }
}

/// Configuration for the API server.
#[derive(Clone, Debug)]
pub struct ApiConfig {
    bind_ip: IpAddr,
    display_host: String,
    port: u16,
}

impl ApiConfig {
    const DEFAULT_HOST: &'static str = "0.0.0.0";
    const DEFAULT_PORT: u16 = 8080;
    const HOST_VAR: &'static str = "DECK_LOADER_API_HOST";
    const PORT_VAR: &'static str = "DECK_LOADER_API_PORT";

    fn from_env() -> Self {
        let host_value =
            env_string(Self::HOST_VAR).unwrap_or_else(|| Self::DEFAULT_HOST.to_string());
        let (bind_ip, display_host) = match host_value.parse::<IpAddr>() {
            Ok(ip) => (ip, host_value),
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}'): {}. Using {}.",
                    Self::HOST_VAR,
                    host_value,
                    err,
                    Self::DEFAULT_HOST
                );
                (
                    IpAddr::V4(Ipv4Addr::UNSPECIFIED),
                    Self::DEFAULT_HOST.to_string(),
                )
            }
        };

        let port = match env_string(Self::PORT_VAR) {
            Some(raw) => match raw.parse::<u16>() {
                Ok(value) if value != 0 => value,
                Ok(_) => {
                    warn!(
                        "{} must not be 0. Using {}.",
                        Self::PORT_VAR,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
                Err(err) => {
                    warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::PORT_VAR,
                        raw,
                        err,
                        Self::DEFAULT_PORT
                    );
                    Self::DEFAULT_PORT
                }
            },
            None => Self::DEFAULT_PORT,
        };

        Self {
            bind_ip,
            display_host,
            port,
        }
    }

    /// Socket address to bind the server to.
    pub fn socket_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_ip, self.port)
    }

    /// Visible hostname for logging and hints.
    pub fn display_host(&self) -> &str {
        &self.display_host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Indicates whether binding to all interfaces.
    pub fn binds_to_all_interfaces(&self) -> bool {
        match self.bind_ip {
            IpAddr::V4(addr) => addr == Ipv4Addr::UNSPECIFIED,
            IpAddr::V6(addr) => addr == Ipv6Addr::UNSPECIFIED,
        }
    }

    pub fn uses_default_host(&self) -> bool {
        self.display_host == Self::DEFAULT_HOST
    }
}

/// Ship layout and vehicle table.
#[derive(Clone, Debug)]
pub struct ShipConfig {
    pub spec: ShipSpec,
    pub catalog: VehicleCatalog,
}

impl ShipConfig {
    /// Two 30 × 3 decks.
    const DEFAULT_DECKS: &'static str = "30x3,30x3";
    const DEFAULT_CELL_SIZE: f64 = 1.0;
    const DECKS_VAR: &'static str = "DECK_LOADER_DECKS";
    const MODE_VAR: &'static str = "DECK_LOADER_DECK_MODE";
    const CELL_SIZE_VAR: &'static str = "DECK_LOADER_CELL_SIZE";
    const TARGET_VAR: &'static str = "DECK_LOADER_TARGET";
    const ROUTING_VAR: &'static str = "DECK_LOADER_ROUTING";
    const HEAVY_FROM_VAR: &'static str = "DECK_LOADER_HEAVY_FROM";

    fn from_env() -> Self {
        let cell_size = load_f64_with_warning(
            Self::CELL_SIZE_VAR,
            Self::DEFAULT_CELL_SIZE,
            |value| value > 0.0,
            "must be greater than 0",
            "Cell size differs from the unit grid; vehicle footprints are rounded to it",
        );
        let kind = match env_string(Self::MODE_VAR) {
            Some(raw) => parse_deck_mode(&raw, cell_size).unwrap_or_else(|| {
                warn!(
                    "Unknown {} ('{}'). Using the grid mode.",
                    Self::MODE_VAR,
                    raw
                );
                OccupancyKind::Grid { cell_size }
            }),
            None => OccupancyKind::Grid { cell_size },
        };

        let decks = env_string(Self::DECKS_VAR)
            .and_then(|raw| match parse_decks(&raw, kind) {
                Ok(decks) => Some(decks),
                Err(err) => {
                    warn!(
                        "Could not parse {} ('{}'): {}. Using {}.",
                        Self::DECKS_VAR,
                        raw,
                        err,
                        Self::DEFAULT_DECKS
                    );
                    None
                }
            })
            .or_else(|| parse_decks(Self::DEFAULT_DECKS, kind).ok())
            .unwrap_or_default();

        let target = match env_string(Self::TARGET_VAR) {
            Some(raw) => parse_target(&raw).unwrap_or_else(|| {
                warn!(
                    "Could not parse {} ('{}') as 'x,y'. Using the deck centers.",
                    Self::TARGET_VAR,
                    raw
                );
                BalanceTarget::DeckCenter
            }),
            None => BalanceTarget::DeckCenter,
        };

        let heavy_from = match env_string(Self::HEAVY_FROM_VAR) {
            Some(raw) => raw.parse::<Golongan>().unwrap_or_else(|err| {
                warn!("{} ignored: {}. Using VI.", Self::HEAVY_FROM_VAR, err);
                Golongan::VI
            }),
            None => Golongan::VI,
        };
        let routing = match env_string(Self::ROUTING_VAR) {
            Some(raw) => parse_routing(&raw, heavy_from).unwrap_or_else(|| {
                warn!(
                    "Unknown {} ('{}'). Using upper_first.",
                    Self::ROUTING_VAR,
                    raw
                );
                DeckRouting::UpperFirst { heavy_from }
            }),
            None => DeckRouting::UpperFirst { heavy_from },
        };

        let spec = match ShipSpec::new(decks, target, routing) {
            Ok(spec) => spec,
            Err(err) => {
                warn!("Invalid ship configuration: {}. Using the default ship.", err);
                default_ship(routing)
            }
        };
        info!(
            decks = spec.decks.len(),
            routing = spec.routing.name(),
            "ship configuration loaded"
        );

        Self {
            spec,
            catalog: VehicleCatalog::standard(),
        }
    }
}

fn default_ship(routing: DeckRouting) -> ShipSpec {
    let deck = DeckSpec {
        length: 30.0,
        width: 3.0,
        kind: OccupancyKind::default(),
    };
    ShipSpec {
        decks: vec![deck, deck],
        target: BalanceTarget::DeckCenter,
        routing,
    }
}

const STRATEGY_VAR: &str = "DECK_LOADER_CANDIDATES";
const GRID_STEP_VAR: &str = "DECK_LOADER_GRID_STEP";
const ON_NO_SPACE_VAR: &str = "DECK_LOADER_ON_NO_SPACE";
const IMPROVE_AFTER_ADD_VAR: &str = "DECK_LOADER_IMPROVE_AFTER_ADD";
const ITERATIONS_VAR: &str = "DECK_LOADER_IMPROVE_ITERATIONS";
const STEP_VAR: &str = "DECK_LOADER_IMPROVE_STEP";
const TEMPERATURE_VAR: &str = "DECK_LOADER_IMPROVE_TEMPERATURE";
const COOLING_VAR: &str = "DECK_LOADER_IMPROVE_COOLING";
const SEED_VAR: &str = "DECK_LOADER_IMPROVE_SEED";
const TIME_BUDGET_VAR: &str = "DECK_LOADER_IMPROVE_TIME_BUDGET_MS";

fn planner_config_from_env() -> PlannerConfig {
    let strategy = env_string(STRATEGY_VAR)
        .and_then(|raw| {
            let parsed = parse_strategy(&raw);
            if parsed.is_none() {
                warn!("Unknown {} ('{}'). Using centered_first.", STRATEGY_VAR, raw);
            }
            parsed
        })
        .unwrap_or(CandidateStrategy::CenteredFirst);

    let on_no_space = env_string(ON_NO_SPACE_VAR)
        .and_then(|raw| {
            let parsed = parse_no_space_policy(&raw);
            if parsed.is_none() {
                warn!("Unknown {} ('{}'). Using reject.", ON_NO_SPACE_VAR, raw);
            }
            parsed
        })
        .unwrap_or(NoSpacePolicy::Reject);

    let grid_step = load_f64_with_warning(
        GRID_STEP_VAR,
        PlannerConfig::DEFAULT_GRID_STEP,
        |value| value > 0.0,
        "must be greater than 0",
        "Adjusted grid step changes how many positions a grid scan visits",
    );

    let improve_after_add = env_string(IMPROVE_AFTER_ADD_VAR)
        .and_then(|raw| parse_bool(&raw, IMPROVE_AFTER_ADD_VAR))
        .unwrap_or(PlannerConfig::DEFAULT_IMPROVE_AFTER_ADD);

    let max_iterations = load_u64_with_warning(
        ITERATIONS_VAR,
        ImprovementConfig::DEFAULT_MAX_ITERATIONS as u64,
    ) as usize;
    let step = load_f64_with_warning(
        STEP_VAR,
        ImprovementConfig::DEFAULT_STEP,
        |value| value > 0.0,
        "must be greater than 0",
        "Adjusted improvement step changes how far vehicles move per iteration",
    );
    let initial_temperature = load_f64_with_warning(
        TEMPERATURE_VAR,
        ImprovementConfig::DEFAULT_INITIAL_TEMPERATURE,
        |value| value >= 0.0,
        "must not be negative",
        "Adjusted temperature changes how often worse moves are accepted",
    );
    let cooling_rate = load_f64_with_warning(
        COOLING_VAR,
        ImprovementConfig::DEFAULT_COOLING_RATE,
        |value| value > 0.0 && value < 1.0,
        "must be between 0 and 1 (exclusive)",
        "Adjusted cooling rate changes how long the improvement keeps exploring",
    );
    let seed = load_u64_with_warning(SEED_VAR, ImprovementConfig::DEFAULT_SEED);
    let time_budget = env_string(TIME_BUDGET_VAR).and_then(|raw| match raw.parse::<u64>() {
        Ok(ms) => Some(Duration::from_millis(ms)),
        Err(err) => {
            warn!(
                "Could not parse {} ('{}'): {}. Running without a time budget.",
                TIME_BUDGET_VAR, raw, err
            );
            None
        }
    });

    PlannerConfig::builder()
        .strategy(strategy)
        .grid_step(grid_step)
        .on_no_space(on_no_space)
        .improve_after_add(improve_after_add)
        .max_iterations(max_iterations)
        .improvement_step(step)
        .initial_temperature(initial_temperature)
        .cooling_rate(cooling_rate)
        .seed(seed)
        .time_budget(time_budget)
        .build()
}

/// Parses `"30x3,20x3"` into one deck per comma-separated `LENGTHxWIDTH`.
fn parse_decks(raw: &str, kind: OccupancyKind) -> Result<Vec<DeckSpec>, String> {
    let mut decks = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let (length, width) = part
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("'{}' is not LENGTHxWIDTH", part))?;
        let length = length
            .trim()
            .parse::<f64>()
            .map_err(|err| format!("length of '{}': {}", part, err))?;
        let width = width
            .trim()
            .parse::<f64>()
            .map_err(|err| format!("width of '{}': {}", part, err))?;
        decks.push(DeckSpec::new(length, width, kind).map_err(|err| err.to_string())?);
    }
    if decks.is_empty() {
        return Err("no decks given".to_string());
    }
    Ok(decks)
}

fn parse_deck_mode(raw: &str, cell_size: f64) -> Option<OccupancyKind> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "grid" => Some(OccupancyKind::Grid { cell_size }),
        "continuous" => Some(OccupancyKind::Continuous),
        _ => None,
    }
}

/// Parses `"x,y"` into a fixed target.
fn parse_target(raw: &str) -> Option<BalanceTarget> {
    let (x, y) = raw.split_once(',')?;
    let x = x.trim().parse::<f64>().ok()?;
    let y = y.trim().parse::<f64>().ok()?;
    (x.is_finite() && y.is_finite()).then_some(BalanceTarget::Fixed { x, y })
}

fn parse_routing(raw: &str, heavy_from: Golongan) -> Option<DeckRouting> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "all_decks" | "all" => Some(DeckRouting::AllDecks),
        "lowest_first" => Some(DeckRouting::LowestFirst { heavy_from }),
        "upper_first" => Some(DeckRouting::UpperFirst { heavy_from }),
        _ => None,
    }
}

fn parse_strategy(raw: &str) -> Option<CandidateStrategy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "grid_scan" | "grid" => Some(CandidateStrategy::GridScan),
        "corner" => Some(CandidateStrategy::Corner),
        "centered_first" | "centered" => Some(CandidateStrategy::CenteredFirst),
        _ => None,
    }
}

fn parse_no_space_policy(raw: &str) -> Option<NoSpacePolicy> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "reject" => Some(NoSpacePolicy::Reject),
        "repack" | "repack_and_retry" => Some(NoSpacePolicy::RepackAndRetry),
        _ => None,
    }
}

fn env_string(name: &str) -> Option<String> {
    match env::var(name) {
        Ok(value) => {
            let trimmed = value.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_owned())
            }
        }
        Err(env::VarError::NotPresent) => None,
        Err(err) => {
            warn!("Access to {} failed: {}. Using default value.", name, err);
            None
        }
    }
}

fn parse_bool(raw: &str, var_name: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "no" | "n" | "off" => Some(false),
        other => {
            warn!(
                "Could not interpret {} ('{}') as boolean value. Using default value.",
                var_name, other
            );
            None
        }
    }
}

fn load_u64_with_warning(var_name: &str, default: u64) -> u64 {
    match env_string(var_name) {
        Some(raw) => raw.parse::<u64>().unwrap_or_else(|err| {
            warn!(
                "Could not parse {} ('{}') as integer: {}. Using {}.",
                var_name, raw, err, default
            );
            default
        }),
        None => default,
    }
}

fn load_f64_with_warning(
    var_name: &str,
    default: f64,
    validator: impl Fn(f64) -> bool,
    invalid_hint: &str,
    notice: &str,
) -> f64 {
    match env_string(var_name) {
        Some(raw) => match raw.parse::<f64>() {
            Ok(value) => {
                if !validator(value) {
                    warn!(
                        "{} contains invalid value '{}': {}. Using {}.",
                        var_name, raw, invalid_hint, default
                    );
                    default
                } else {
                    let tolerance = (default.abs().max(1.0)) * 1e-9;
                    if (value - default).abs() > tolerance {
                        info!("{} ({} = {}).", notice, var_name, value);
                    }
                    value
                }
            }
            Err(err) => {
                warn!(
                    "Could not parse {} ('{}') as number: {}. Using {}.",
                    var_name, raw, err, default
                );
                default
            }
        },
        None => default,
    }
}

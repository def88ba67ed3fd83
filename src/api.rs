//! REST API for the deck loader.
//!
//! Exposes the single loaded `Ship` over HTTP. Uses Axum as the web framework
//! and supports CORS. Everything that may run the planner (adding a vehicle,
//! re-pack, improvement, capacity simulation) runs on the blocking pool.

use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use std::time::Duration;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{delete, get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use utoipa::{OpenApi, ToSchema};

use crate::balance::BalanceReport;
use crate::config::ApiConfig;
use crate::model::{Golongan, ManifestEntry, OccupancyKind, Placement, PlacementId};
use crate::occupancy::OccupancyMap;
use crate::planner::{ImprovementOutcome, RepackPlan, UnplacedVehicle};
use crate::ship::{PlacementOutcome, RepackCommit, Ship, ShipBalance, ShipError};
use crate::types::Vec2;

#[derive(Clone)]
pub struct ApiState {
    ship: Arc<Mutex<Ship>>,
}

impl ApiState {
    pub fn new(ship: Ship) -> Self {
        Self {
            ship: Arc::new(Mutex::new(ship)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Ship> {
        lock_ship(&self.ship)
    }
}

/// A panicking handler must not take the ship down with it.
fn lock_ship(ship: &Mutex<Ship>) -> MutexGuard<'_, Ship> {
    ship.lock().unwrap_or_else(PoisonError::into_inner)
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>deck_loader API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Request to load one vehicle.
///
/// `class` accepts the Roman form (`"VII"`) or the class number (`"7"`).
#[derive(Deserialize, ToSchema)]
#[schema(example = json!({ "class": "VI", "weight": 4.5 }))]
pub struct AddVehicleRequest {
    pub class: String,
    /// Overrides the catalog weight of the class.
    #[serde(default)]
    #[schema(nullable = true)]
    pub weight: Option<f64>,
}

#[derive(Serialize, ToSchema)]
pub struct AddVehicleResponse {
    pub placed: bool,
    #[schema(nullable = true)]
    pub vehicle: Option<Placement>,
    #[schema(nullable = true)]
    pub reason_code: Option<String>,
    #[schema(nullable = true)]
    pub reason: Option<String>,
}

impl From<PlacementOutcome> for AddVehicleResponse {
    fn from(outcome: PlacementOutcome) -> Self {
        match outcome {
            PlacementOutcome::Placed(vehicle) => Self {
                placed: true,
                vehicle: Some(vehicle),
                reason_code: None,
                reason: None,
            },
            PlacementOutcome::NoSpace { reason, .. } => Self {
                placed: false,
                vehicle: None,
                reason_code: Some(reason.code().to_string()),
                reason: Some(reason.to_string()),
            },
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RemoveVehicleResponse {
    pub removed: bool,
    /// Last placement of the vehicle; `null` if it was waiting.
    #[schema(nullable = true)]
    pub vehicle: Option<Placement>,
}

#[derive(Deserialize, Default, ToSchema)]
#[schema(example = json!({ "commit": "all_or_nothing" }))]
pub struct RepackRequest {
    #[serde(default)]
    pub commit: RepackCommit,
}

#[derive(Serialize, ToSchema)]
pub struct UnplacedVehicleView {
    pub id: PlacementId,
    pub class: Golongan,
    pub weight: f64,
    pub reason_code: String,
    pub reason: String,
}

impl From<&UnplacedVehicle> for UnplacedVehicleView {
    fn from(left: &UnplacedVehicle) -> Self {
        Self {
            id: left.entry.id,
            class: left.entry.class,
            weight: left.entry.weight,
            reason_code: left.reason.code().to_string(),
            reason: left.reason.to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct RepackResponse {
    /// Whether the ship now carries the re-packed layout.
    pub committed: bool,
    pub is_complete: bool,
    pub placed: Vec<Placement>,
    pub unplaced: Vec<UnplacedVehicleView>,
    /// Sum of per-deck balance distances of the plan.
    pub objective: f64,
}

impl From<&RepackPlan> for RepackResponse {
    fn from(plan: &RepackPlan) -> Self {
        Self {
            committed: plan.committed,
            is_complete: plan.is_complete(),
            placed: plan.placed().to_vec(),
            unplaced: plan.unplaced.iter().map(UnplacedVehicleView::from).collect(),
            objective: plan.layout.objective(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ImproveResponse {
    pub improved: bool,
    pub initial_score: f64,
    pub final_score: f64,
    pub iterations: usize,
    pub accepted_moves: usize,
}

impl From<&ImprovementOutcome> for ImproveResponse {
    fn from(outcome: &ImprovementOutcome) -> Self {
        Self {
            improved: outcome.improved(),
            initial_score: outcome.initial_score,
            final_score: outcome.final_score,
            iterations: outcome.iterations,
            accepted_moves: outcome.accepted_moves,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct CapacityResponse {
    /// Additional vehicles that fit, per class, if only that class is loaded.
    pub per_class: BTreeMap<String, usize>,
    /// Free cells per deck.
    pub per_deck: Vec<usize>,
}

#[derive(Serialize, ToSchema)]
pub struct DeckView {
    pub index: usize,
    pub dims: Vec2,
    pub mode: OccupancyKind,
    pub target: Vec2,
    pub free_capacity: usize,
    pub total_capacity: usize,
    pub vehicles: usize,
}

#[derive(Serialize, ToSchema)]
pub struct ShipResponse {
    pub routing: String,
    pub decks: Vec<DeckView>,
    pub vehicles: usize,
    /// Accepted vehicles a partial re-pack left without a place.
    pub waiting: Vec<ManifestEntry>,
}

impl ShipResponse {
    fn from_ship(ship: &Ship) -> Self {
        let layout = ship.layout();
        let decks = layout
            .decks()
            .iter()
            .enumerate()
            .map(|(index, deck)| DeckView {
                index,
                dims: deck.spec.dims(),
                mode: deck.spec.kind,
                target: deck.target,
                free_capacity: deck.occupancy.free_capacity(),
                total_capacity: deck.occupancy.total_capacity(),
                vehicles: layout.on_deck(index).count(),
            })
            .collect();
        Self {
            routing: ship.spec().routing.name().to_string(),
            decks,
            vehicles: layout.placements().len(),
            waiting: ship.waiting(),
        }
    }
}

#[derive(Serialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid JSON data",
        err.to_string(),
    )
}

fn ship_error(err: ShipError) -> Response {
    match err {
        ShipError::Validation(err) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid input data",
            err.to_string(),
        ),
        ShipError::NotFound(id) => error_response(
            StatusCode::NOT_FOUND,
            "Vehicle not found",
            format!("No loaded vehicle has id {}", id.0),
        ),
        ShipError::NotWaiting(id) => error_response(
            StatusCode::CONFLICT,
            "Vehicle is loaded",
            format!("Vehicle {} is on a deck", id.0),
        ),
    }
}

/// Runs `job` against the ship on the blocking pool.
async fn with_ship_blocking<T: Send + 'static>(
    state: &ApiState,
    job: impl FnOnce(&mut Ship) -> T + Send + 'static,
) -> Result<T, Response> {
    let ship = Arc::clone(&state.ship);
    tokio::task::spawn_blocking(move || job(&mut lock_ship(&ship)))
        .await
        .map_err(|err| {
            error!(error = %err, "blocking ship task failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error",
                err.to_string(),
            )
        })
}

fn parse_repack_request(
    payload: Result<Json<RepackRequest>, JsonRejection>,
) -> Result<RepackCommit, Response> {
    match payload {
        Ok(Json(request)) => Ok(request.commit),
        Err(err) => Err(json_deserialize_error(err)),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_get_ship,
        handle_list_vehicles,
        handle_add_vehicle,
        handle_remove_vehicle,
        handle_repack,
        handle_repack_stream,
        handle_improve,
        handle_capacity,
        handle_balance
    ),
    components(
        schemas(
            AddVehicleRequest,
            AddVehicleResponse,
            RemoveVehicleResponse,
            RepackRequest,
            RepackResponse,
            RepackCommit,
            UnplacedVehicleView,
            ImproveResponse,
            CapacityResponse,
            ShipResponse,
            DeckView,
            ShipBalance,
            BalanceReport,
            Placement,
            ManifestEntry,
            PlacementId,
            Golongan,
            OccupancyKind,
            Vec2,
            ErrorResponse
        )
    ),
    tags(
        (name = "ship", description = "Ship state and balance"),
        (name = "vehicles", description = "Loading and unloading vehicles"),
        (name = "planning", description = "Re-pack and balance improvement")
    )
)]
struct ApiDoc;

/// Routes of the service, bound to `state`.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/ship", get(handle_get_ship))
        .route("/vehicles", get(handle_list_vehicles).post(handle_add_vehicle))
        .route("/vehicles/{id}", delete(handle_remove_vehicle))
        .route("/repack", post(handle_repack))
        .route("/repack_stream", post(handle_repack_stream))
        .route("/improve", post(handle_improve))
        .route("/capacity", get(handle_capacity))
        .route("/balance", get(handle_balance))
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and blocks until it terminates.
pub async fn start_api_server(config: ApiConfig, ship: Ship) -> std::io::Result<()> {
    let app = router(ApiState::new(ship));

    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await.map_err(|err| {
        error!(%addr, error = %err, "could not bind API server");
        err
    })?;

    info!(
        "Server running on http://{}:{}",
        config.display_host(),
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("Local access: http://localhost:{}", config.port());
    }
    info!("Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await
}

/// Handler for GET /ship.
#[utoipa::path(
    get,
    path = "/ship",
    responses((status = 200, description = "Decks and their occupancy", body = ShipResponse)),
    tag = "ship"
)]
async fn handle_get_ship(State(state): State<ApiState>) -> impl IntoResponse {
    let ship = state.lock();
    Json(ShipResponse::from_ship(&ship))
}

/// Handler for GET /vehicles.
#[utoipa::path(
    get,
    path = "/vehicles",
    responses((status = 200, description = "Every loaded vehicle", body = [Placement])),
    tag = "vehicles"
)]
async fn handle_list_vehicles(State(state): State<ApiState>) -> impl IntoResponse {
    let placements = state.lock().placements().to_vec();
    Json(placements)
}

/// Handler for POST /vehicles.
///
/// A vehicle that does not fit is not an error: the response carries
/// `placed: false` and the reason.
#[utoipa::path(
    post,
    path = "/vehicles",
    request_body = AddVehicleRequest,
    responses(
        (status = 200, description = "Placement outcome", body = AddVehicleResponse),
        (
            status = UNPROCESSABLE_ENTITY,
            description = "Unknown class or invalid weight",
            body = ErrorResponse
        )
    ),
    tag = "vehicles"
)]
async fn handle_add_vehicle(
    State(state): State<ApiState>,
    payload: Result<Json<AddVehicleRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(err) => return json_deserialize_error(err),
    };
    let class = match request.class.parse::<Golongan>() {
        Ok(class) => class,
        Err(err) => return ship_error(err.into()),
    };

    let weight = request.weight;
    let outcome = with_ship_blocking(&state, move |ship| ship.add_vehicle(class, weight)).await;
    match outcome {
        Ok(Ok(outcome)) => {
            (StatusCode::OK, Json(AddVehicleResponse::from(outcome))).into_response()
        }
        Ok(Err(err)) => ship_error(err),
        Err(response) => response,
    }
}

/// Handler for DELETE /vehicles/{id}.
///
/// Unloads a placed vehicle, or drops one that a re-pack left waiting.
#[utoipa::path(
    delete,
    path = "/vehicles/{id}",
    params(("id" = u64, Path, description = "Vehicle id handed out on loading")),
    responses(
        (status = 200, description = "Vehicle unloaded", body = RemoveVehicleResponse),
        (status = NOT_FOUND, description = "No such vehicle", body = ErrorResponse)
    ),
    tag = "vehicles"
)]
async fn handle_remove_vehicle(
    State(state): State<ApiState>,
    Path(id): Path<u64>,
) -> Response {
    let id = PlacementId(id);
    let removed = {
        let mut ship = state.lock();
        match ship.remove_vehicle(id) {
            Ok(vehicle) => Ok(Some(vehicle)),
            Err(ShipError::NotFound(_)) => ship.discard_waiting(id).map(|_| None),
            Err(err) => Err(err),
        }
    };
    match removed {
        Ok(vehicle) => (
            StatusCode::OK,
            Json(RemoveVehicleResponse {
                removed: true,
                vehicle,
            }),
        )
            .into_response(),
        Err(err) => ship_error(err),
    }
}

/// Handler for POST /repack.
#[utoipa::path(
    post,
    path = "/repack",
    request_body = RepackRequest,
    responses(
        (status = 200, description = "Re-pack plan and whether it was committed", body = RepackResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_repack(
    State(state): State<ApiState>,
    payload: Result<Json<RepackRequest>, JsonRejection>,
) -> Response {
    let commit = match parse_repack_request(payload) {
        Ok(commit) => commit,
        Err(response) => return response,
    };

    let result = with_ship_blocking(&state, move |ship| {
        RepackResponse::from(&ship.repack_all(commit))
    })
    .await;
    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(response) => response,
    }
}

/// Handler for POST /repack_stream (SSE).
///
/// Streams re-pack events as Server-Sent Events while the re-pack runs.
#[utoipa::path(
    post,
    path = "/repack_stream",
    request_body = RepackRequest,
    responses(
        (
            status = 200,
            description = "Streams re-pack events in real-time",
            content_type = "text/event-stream",
            body = String
        ),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "planning"
)]
async fn handle_repack_stream(
    State(state): State<ApiState>,
    payload: Result<Json<RepackRequest>, JsonRejection>,
) -> Response {
    let commit = match parse_repack_request(payload) {
        Ok(commit) => commit,
        Err(response) => return response,
    };

    let (tx, rx) = mpsc::channel::<String>(32);
    let ship = Arc::clone(&state.ship);

    tokio::task::spawn_blocking(move || {
        let mut ship = lock_ship(&ship);
        ship.repack_all_with_progress(commit, |evt| {
            if let Ok(json) = serde_json::to_string(evt) {
                // A closed receiver only means nobody listens anymore.
                let _ = tx.blocking_send(json);
            }
        });
    });

    let stream =
        ReceiverStream::new(rx).map(|msg| Ok::<_, Infallible>(Event::default().data(msg)));
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

/// Handler for POST /improve.
#[utoipa::path(
    post,
    path = "/improve",
    responses((status = 200, description = "Result of the local improvement", body = ImproveResponse)),
    tag = "planning"
)]
async fn handle_improve(State(state): State<ApiState>) -> Response {
    let result =
        with_ship_blocking(&state, |ship| ImproveResponse::from(&ship.improve_balance())).await;
    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(response) => response,
    }
}

/// Handler for GET /capacity.
#[utoipa::path(
    get,
    path = "/capacity",
    responses((status = 200, description = "Remaining capacity", body = CapacityResponse)),
    tag = "ship"
)]
async fn handle_capacity(State(state): State<ApiState>) -> Response {
    let result = with_ship_blocking(&state, |ship| CapacityResponse {
        per_class: ship
            .remaining_capacity()
            .into_iter()
            .map(|(class, count)| (class.to_string(), count))
            .collect(),
        per_deck: ship.deck_capacity(),
    })
    .await;
    match result {
        Ok(response) => (StatusCode::OK, Json(response)).into_response(),
        Err(response) => response,
    }
}

/// Handler for GET /balance.
#[utoipa::path(
    get,
    path = "/balance",
    responses((status = 200, description = "Balance per deck and overall", body = ShipBalance)),
    tag = "ship"
)]
async fn handle_balance(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.lock().current_balance())
}

async fn serve_openapi_json(State(_state): State<ApiState>) -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui(State(_state): State<ApiState>) -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

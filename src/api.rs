//! REST API for the load calculator.
//!
//! Provides HTTP endpoints for the browser frontend: totals and container
//! suggestion, the slot plan, the printable report and the live loading
//! visualization (Server-Sent Events plus session commands).
//! Uses Axum as the web framework and supports CORS.

use std::sync::OnceLock;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::{
    Router,
    http::{StatusCode, Uri, header},
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use rust_embed::RustEmbed;
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::aggregate::{AggregateResult, CategoryTotals, aggregate};
use crate::calculator::{
    CalculationBackend, CalculationError, CalculationSource, CalculationSummary,
};
use crate::config::AppConfig;
use crate::model::{
    CargoItem, CargoUnit, ContainerClass, ContainerSpec, ValidationError, expand_units,
    unit_count,
};
use crate::planner::{GridLayout, LayoutConfig, PlacementPlan, PlannedSlot, plan_for_container};
use crate::report::{ReportInput, render_report_today};
use crate::session::{SessionCommand, SessionError, SessionRegistry, spawn_session};

#[derive(Clone)]
struct ApiState {
    config: AppConfig,
    backend: CalculationBackend,
    sessions: SessionRegistry,
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

// SRI hashes verified against https://unpkg.com/swagger-ui-dist@5.17.14/ on 2025-10-29.
const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>Sea Freight Load Calculator API Docs</title>
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
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-standalone-preset.js"
            integrity="sha384-2YH8WDRaj7V2OqU/trsmzSagmk/E2SutiCsGkdgoQwC9pNUJV1u/141DHB6jgs8t"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                const ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                    presets: [SwaggerUIBundle.presets.apis, SwaggerUIStandalonePreset],
                    layout: "StandaloneLayout",
                });
                window.ui = ui;
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

/// Embedded Web Assets (HTML, CSS, JS)
#[derive(RustEmbed)]
#[folder = "web/"]
struct WebAssets;

/// Container chosen in the form: a preset name or custom dimensions.
#[derive(Deserialize, Clone, Debug, PartialEq, ToSchema)]
#[serde(untagged)]
pub enum ContainerSelection {
    Preset(ContainerClass),
    Custom(ContainerSpec),
}

impl Default for ContainerSelection {
    fn default() -> Self {
        Self::Preset(ContainerClass::Truck)
    }
}

impl ContainerSelection {
    fn into_spec(self) -> Result<ContainerSpec, ValidationError> {
        match self {
            Self::Preset(class) => Ok(class.spec()),
            Self::Custom(spec) => {
                spec.validate()?;
                Ok(spec)
            }
        }
    }
}

/// Request body shared by all cargo endpoints.
#[derive(Deserialize, Clone, Debug, ToSchema)]
#[serde(rename_all = "camelCase")]
#[schema(
    example = json!({
        "items": [
            { "name": "Bag", "length": 1000, "width": 1000, "height": 1000,
              "weight": 30, "quantity": 24, "isFragile": false, "category": "Sacks" }
        ],
        "container": "truck"
    })
)]
pub struct CargoRequest {
    #[serde(default)]
    pub items: Vec<CargoItem>,
    #[serde(default)]
    pub container: ContainerSelection,
    /// Overrides the configured slot size cap (mm)
    #[serde(default)]
    #[schema(nullable = true)]
    pub max_slot_size: Option<f64>,
    /// Overrides the configured slot spacing (mm)
    #[serde(default)]
    #[schema(nullable = true)]
    pub spacing: Option<f64>,
}

#[derive(Debug)]
struct ValidatedCargoRequest {
    items: Vec<CargoItem>,
    container: ContainerSpec,
    max_slot_size: Option<f64>,
    spacing: Option<f64>,
}

impl CargoRequest {
    fn into_validated(self) -> Result<ValidatedCargoRequest, ValidationError> {
        if let Some(size) = self.max_slot_size {
            if !size.is_finite() || size < LayoutConfig::MIN_SLOT_SIZE {
                return Err(ValidationError::InvalidLayout(format!(
                    "maxSlotSize must be at least {} mm, got: {}",
                    LayoutConfig::MIN_SLOT_SIZE,
                    size
                )));
            }
        }
        if let Some(spacing) = self.spacing {
            if !spacing.is_finite() || spacing < 0.0 {
                return Err(ValidationError::InvalidLayout(format!(
                    "spacing must not be negative, got: {}",
                    spacing
                )));
            }
        }

        Ok(ValidatedCargoRequest {
            container: self.container.into_spec()?,
            items: self.items,
            max_slot_size: self.max_slot_size,
            spacing: self.spacing,
        })
    }
}

impl ValidatedCargoRequest {
    /// Layout with per-request overrides applied on top of the configured one.
    fn layout(&self, base: LayoutConfig) -> LayoutConfig {
        let mut builder = LayoutConfig::builder()
            .max_slot_size(base.max_slot_size)
            .spacing(base.spacing)
            .max_slots(base.max_slots);
        if let Some(size) = self.max_slot_size {
            builder = builder.max_slot_size(size);
        }
        if let Some(spacing) = self.spacing {
            builder = builder.spacing(spacing);
        }
        builder.build()
    }

    fn plan(&self, base: LayoutConfig) -> PlacementPlan {
        plan_for_container(unit_count(&self.items), &self.container, &self.layout(base))
    }

    /// Units for the planned slots only; overflow units are never expanded.
    fn units_for(&self, plan: &PlacementPlan) -> Vec<CargoUnit> {
        expand_units(&self.items)
            .take(plan.placed_count())
            .collect()
    }
}

/// One selectable container preset.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct ContainerPreset {
    pub class: ContainerClass,
    pub spec: ContainerSpec,
    pub volume_m3: f64,
}

#[derive(Serialize, ToSchema)]
pub struct CalculateResponse {
    pub aggregate: AggregateResult,
    pub summary: CalculationSummary,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PlanResponse {
    pub container: ContainerSpec,
    pub total_units: u64,
    pub is_complete: bool,
    pub plan: PlacementPlan,
}

#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct CommandAccepted {
    pub session_id: u64,
    pub command: String,
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

fn container_config_error(details: impl Into<String>) -> Response {
    error_response(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Invalid container configuration",
        details,
    )
}

fn validation_error(err: ValidationError) -> Response {
    match err {
        ValidationError::InvalidLayout(_) => error_response(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid layout override",
            err.to_string(),
        ),
        _ => container_config_error(err.to_string()),
    }
}

fn calculation_error(err: CalculationError) -> Response {
    match err {
        CalculationError::RemoteCalculationFailure(_) => error_response(
            StatusCode::BAD_GATEWAY,
            "Error calculating freight. Please try again.",
            err.to_string(),
        ),
        CalculationError::Configuration(_) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Calculation backend unavailable",
            err.to_string(),
        ),
    }
}

fn session_error(err: SessionError) -> Response {
    match err {
        SessionError::UnknownSession(_) | SessionError::SessionEnded(_) => {
            error_response(StatusCode::NOT_FOUND, "Visualization not found", err.to_string())
        }
        SessionError::Busy(_) => error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            "Visualization busy",
            err.to_string(),
        ),
    }
}

fn parse_cargo_request(
    payload: Result<Json<CargoRequest>, JsonRejection>,
) -> Result<ValidatedCargoRequest, Response> {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(err) => return Err(json_deserialize_error(err)),
    };

    payload.into_validated().map_err(validation_error)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handle_containers,
        handle_calculate,
        handle_plan,
        handle_report,
        handle_visualize_stream,
        handle_restart,
        handle_toggle_view_mode
    ),
    components(
        schemas(
            CargoRequest,
            CargoItem,
            ContainerSelection,
            ContainerSpec,
            ContainerClass,
            ContainerPreset,
            CalculateResponse,
            AggregateResult,
            CategoryTotals,
            CalculationSummary,
            CalculationSource,
            PlanResponse,
            PlacementPlan,
            PlannedSlot,
            GridLayout,
            CommandAccepted,
            ErrorResponse,
            crate::session::VisualizationEvent
        )
    ),
    tags(
        (name = "calculation", description = "Totals, container suggestion and report"),
        (name = "visualization", description = "Slot plan and live loading animation")
    )
)]
struct ApiDoc;

fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        // API endpoints
        .route("/containers", get(handle_containers))
        .route("/calculate", post(handle_calculate))
        .route("/plan", post(handle_plan))
        .route("/report", post(handle_report))
        .route("/visualize_stream", post(handle_visualize_stream))
        .route("/visualize/{id}/restart", post(handle_restart))
        .route("/visualize/{id}/view_mode", post(handle_toggle_view_mode))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        // Web-UI (embedded)
        .route("/", get(serve_index))
        .route("/{*path}", get(serve_static))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and serves until it terminates.
///
/// # Errors
/// Fails when the calculation backend cannot be set up or the address cannot be bound.
pub async fn start_api_server(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let backend = CalculationBackend::from_config(&config.calculation)?;
    let api_config = config.api.clone();
    let state = ApiState {
        config,
        backend,
        sessions: SessionRegistry::new(),
    };
    let source = state.backend.source();
    let app = router(state);

    let addr = api_config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| format!("could not bind API server to {addr}: {err}"))?;

    let display_host = api_config.display_host();
    tracing::info!(
        "Server running on http://{}:{}",
        display_host,
        api_config.port()
    );
    if api_config.binds_to_all_interfaces() && api_config.uses_default_host() {
        tracing::info!("Local access: http://localhost:{}", api_config.port());
    }
    tracing::info!(?source, "Calculation backend selected");
    tracing::info!(
        "API endpoints: GET /containers, POST /calculate, POST /plan, POST /report, \
         POST /visualize_stream, POST /visualize/{{id}}/restart, POST /visualize/{{id}}/view_mode"
    );
    tracing::info!("Documentation: GET /docs, GET /docs/openapi.json");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Handler for GET /containers: the selectable presets.
#[utoipa::path(
    get,
    path = "/containers",
    responses((status = 200, description = "Container presets", body = [ContainerPreset])),
    tag = "calculation"
)]
async fn handle_containers() -> impl IntoResponse {
    let presets: Vec<ContainerPreset> = ContainerClass::ALL
        .iter()
        .map(|class| {
            let spec = class.spec();
            ContainerPreset {
                class: *class,
                volume_m3: spec.volume_m3(),
                spec,
            }
        })
        .collect();
    Json(presets)
}

/// Handler for POST /calculate.
///
/// Aggregates the cargo list locally and asks the configured backend for the
/// headline numbers.
#[utoipa::path(
    post,
    path = "/calculate",
    request_body = CargoRequest,
    responses(
        (status = 200, description = "Totals and suggested container", body = CalculateResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse),
        (status = BAD_GATEWAY, description = "Remote calculation failed", body = ErrorResponse)
    ),
    tag = "calculation"
)]
async fn handle_calculate(
    State(state): State<ApiState>,
    payload: Result<Json<CargoRequest>, JsonRejection>,
) -> Response {
    let request = match parse_cargo_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    tracing::info!(
        rows = request.items.len(),
        container = request.container.label.as_deref().unwrap_or("custom"),
        "New calculation request"
    );
    let aggregate = aggregate(&request.items, &request.container);
    let summary = match state
        .backend
        .calculate(&request.items, &request.container)
        .await
    {
        Ok(summary) => summary,
        Err(err) => return calculation_error(err),
    };
    tracing::info!(
        volume_m3 = summary.total_volume_m3,
        weight_kg = summary.total_weight_kg,
        suggested = %summary.suggested_container,
        "Calculation finished"
    );

    (StatusCode::OK, Json(CalculateResponse { aggregate, summary })).into_response()
}

/// Handler for POST /plan: slot grid for every physical unit.
#[utoipa::path(
    post,
    path = "/plan",
    request_body = CargoRequest,
    responses(
        (status = 200, description = "Planned slots", body = PlanResponse),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_plan(
    State(state): State<ApiState>,
    payload: Result<Json<CargoRequest>, JsonRejection>,
) -> Response {
    let request = match parse_cargo_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let plan = request.plan(state.config.layout.layout_config());
    let response = PlanResponse {
        total_units: unit_count(&request.items),
        is_complete: plan.is_complete(),
        container: request.container,
        plan,
    };
    (StatusCode::OK, Json(response)).into_response()
}

/// Handler for POST /report: the printable plain-text report.
#[utoipa::path(
    post,
    path = "/report",
    request_body = CargoRequest,
    responses(
        (status = 200, description = "Paginated report", content_type = "text/plain", body = String),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse),
        (status = BAD_GATEWAY, description = "Remote calculation failed", body = ErrorResponse)
    ),
    tag = "calculation"
)]
async fn handle_report(
    State(state): State<ApiState>,
    payload: Result<Json<CargoRequest>, JsonRejection>,
) -> Response {
    let request = match parse_cargo_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let aggregate = aggregate(&request.items, &request.container);
    let summary = match state
        .backend
        .calculate(&request.items, &request.container)
        .await
    {
        Ok(summary) => summary,
        Err(err) => return calculation_error(err),
    };

    let report = render_report_today(
        ReportInput {
            summary: &summary,
            aggregate: &aggregate,
            container: &request.container,
            items: &request.items,
        },
        state.config.report.report_options(),
    );
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        report,
    )
        .into_response()
}

/// Handler for POST /visualize_stream endpoint (SSE).
///
/// Starts a visualization session and streams its events: the session id,
/// the full scene, then one frame per tick until the animation completes.
/// Closing the stream ends the session.
#[utoipa::path(
    post,
    path = "/visualize_stream",
    request_body = CargoRequest,
    responses(
        (
            status = 200,
            description = "Streams visualization events in real-time",
            content_type = "text/event-stream",
            body = crate::session::VisualizationEvent
        ),
        (status = UNPROCESSABLE_ENTITY, description = "Invalid request", body = ErrorResponse),
        (status = SERVICE_UNAVAILABLE, description = "No render surface", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_visualize_stream(
    State(state): State<ApiState>,
    payload: Result<Json<CargoRequest>, JsonRejection>,
) -> Response {
    let request = match parse_cargo_request(payload) {
        Ok(request) => request,
        Err(response) => return response,
    };

    let plan = request.plan(state.config.layout.layout_config());
    let units = request.units_for(&plan);
    let handle = match spawn_session(
        &state.sessions,
        &request.container,
        &plan,
        &units,
        state.config.animation.timing(),
    ) {
        Ok(handle) => handle,
        Err(err) => {
            return error_response(
                StatusCode::SERVICE_UNAVAILABLE,
                "Visualization unavailable",
                err.to_string(),
            );
        }
    };

    let stream = ReceiverStream::new(handle.events).filter_map(|event| {
        match serde_json::to_string(&event) {
            Ok(json) => Some(Ok::<_, std::convert::Infallible>(Event::default().data(json))),
            Err(err) => {
                tracing::warn!(%err, "could not serialize visualization event");
                None
            }
        }
    });
    Sse::new(stream)
        .keep_alive(
            KeepAlive::new()
                .interval(std::time::Duration::from_secs(10))
                .text("keep-alive"),
        )
        .into_response()
}

fn command_response(state: &ApiState, id: u64, command: SessionCommand) -> Response {
    match state.sessions.send(id, command) {
        Ok(()) => (
            StatusCode::ACCEPTED,
            Json(CommandAccepted {
                session_id: id,
                command: format!("{command:?}"),
            }),
        )
            .into_response(),
        Err(err) => session_error(err),
    }
}

/// Handler for POST /visualize/{id}/restart.
#[utoipa::path(
    post,
    path = "/visualize/{id}/restart",
    params(("id" = u64, Path, description = "Session id from the SessionStarted event")),
    responses(
        (status = ACCEPTED, description = "Restart scheduled", body = CommandAccepted),
        (status = NOT_FOUND, description = "Unknown session", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_restart(State(state): State<ApiState>, Path(id): Path<u64>) -> Response {
    command_response(&state, id, SessionCommand::Restart)
}

/// Handler for POST /visualize/{id}/view_mode: toggles normal/wireframe.
#[utoipa::path(
    post,
    path = "/visualize/{id}/view_mode",
    params(("id" = u64, Path, description = "Session id from the SessionStarted event")),
    responses(
        (status = ACCEPTED, description = "View mode toggled", body = CommandAccepted),
        (status = NOT_FOUND, description = "Unknown session", body = ErrorResponse)
    ),
    tag = "visualization"
)]
async fn handle_toggle_view_mode(State(state): State<ApiState>, Path(id): Path<u64>) -> Response {
    command_response(&state, id, SessionCommand::ToggleViewMode)
}

/// Serves the index.html main page
async fn serve_index() -> Response {
    match WebAssets::get("index.html") {
        Some(content) => Html(content.data).into_response(),
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

/// Serves static assets (JS, CSS, etc.)
async fn serve_static(uri: Uri) -> Response {
    let path = uri.path().trim_start_matches('/');

    match WebAssets::get(path) {
        Some(content) => {
            let mime = mime_guess::from_path(path).first_or_octet_stream();
            ([(header::CONTENT_TYPE, mime.as_ref())], content.data).into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CalculationConfig;
    use serde_json::Value;

    fn test_state() -> ApiState {
        ApiState {
            config: AppConfig::default(),
            backend: CalculationBackend::Local,
            sessions: SessionRegistry::new(),
        }
    }

    async fn spawn_app(state: ApiState) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().unwrap();
        let app = router(state);
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{addr}")
    }

    fn truck_body() -> Value {
        json!({
            "items": [
                { "length": 1000, "width": 1000, "height": 1000, "weight": 30, "quantity": 24 }
            ],
            "container": "truck"
        })
    }

    #[test]
    fn openapi_doc_lists_expected_paths() {
        let doc = openapi_doc();
        let paths = &doc.paths.paths;
        for path in [
            "/containers",
            "/calculate",
            "/plan",
            "/report",
            "/visualize_stream",
            "/visualize/{id}/restart",
            "/visualize/{id}/view_mode",
        ] {
            assert!(
                paths.contains_key(path),
                "OpenAPI documentation is missing the {} path",
                path
            );
        }
    }

    #[test]
    fn openapi_doc_contains_key_schemas() {
        let doc = openapi_doc();
        let components = doc
            .components
            .as_ref()
            .expect("OpenAPI documentation contains no components");
        let schemas = &components.schemas;
        for name in [
            "CargoRequest",
            "CalculateResponse",
            "PlanResponse",
            "ErrorResponse",
        ] {
            assert!(
                schemas.contains_key(name),
                "Expected schema '{}' is missing from OpenAPI spec",
                name
            );
        }
    }

    #[test]
    fn cargo_request_accepts_preset_or_custom_container() {
        let preset: CargoRequest =
            serde_json::from_str(r#"{"items": [], "container": "40HC"}"#).unwrap();
        assert_eq!(
            preset.container,
            ContainerSelection::Preset(ContainerClass::FortyHighCube)
        );

        let custom: CargoRequest = serde_json::from_str(
            r#"{"container": {"length": 6000, "width": 2400, "height": 2400, "maxWeight": 20000}}"#,
        )
        .unwrap();
        let spec = custom.into_validated().unwrap().container;
        assert_eq!(spec.length, 6000.0);
        assert_eq!(spec.max_weight, 20000.0);
    }

    #[test]
    fn cargo_request_defaults_to_truck() {
        let request: CargoRequest = serde_json::from_str("{}").unwrap();
        let validated = request.into_validated().unwrap();
        assert!(validated.items.is_empty());
        assert_eq!(validated.container, ContainerClass::Truck.spec());
    }

    #[test]
    fn invalid_custom_container_is_rejected() {
        let request: CargoRequest = serde_json::from_str(
            r#"{"container": {"length": 0, "width": 2400, "height": 2400, "maxWeight": 20000}}"#,
        )
        .unwrap();
        assert!(matches!(
            request.into_validated(),
            Err(ValidationError::InvalidDimension(_))
        ));
    }

    #[test]
    fn request_overrides_layout() {
        let request: CargoRequest =
            serde_json::from_str(r#"{"maxSlotSize": 200, "spacing": 10}"#).unwrap();
        let validated = request.into_validated().unwrap();
        let layout = validated.layout(LayoutConfig::default());
        assert_eq!(layout.max_slot_size, 200.0);
        assert_eq!(layout.spacing, 10.0);

        let request: CargoRequest = serde_json::from_str("{}").unwrap();
        let layout = request
            .into_validated()
            .unwrap()
            .layout(LayoutConfig::default());
        assert_eq!(layout, LayoutConfig::default());
    }

    #[rstest::rstest]
    #[case(json!({ "maxSlotSize": 1 }))]
    #[case(json!({ "maxSlotSize": 0 }))]
    #[case(json!({ "maxSlotSize": -300 }))]
    #[case(json!({ "spacing": -5 }))]
    fn out_of_range_layout_overrides_are_rejected(#[case] body: Value) {
        let request: CargoRequest = serde_json::from_value(body).unwrap();
        assert!(matches!(
            request.into_validated(),
            Err(ValidationError::InvalidLayout(_))
        ));
    }

    #[test]
    fn fine_grid_override_stays_within_the_slot_limit() {
        let request: CargoRequest = serde_json::from_value(json!({
            "items": [{ "length": 1, "width": 1, "height": 1, "quantity": 3_000_000 }],
            "maxSlotSize": 10,
            "spacing": 0,
            "container": "truck"
        }))
        .unwrap();
        let plan = request
            .into_validated()
            .unwrap()
            .plan(LayoutConfig::default());
        assert!(plan.grid.capacity() > 3_000_000);
        assert_eq!(plan.placed_count(), LayoutConfig::DEFAULT_MAX_SLOTS);
        assert_eq!(
            plan.unplaced,
            3_000_000 - LayoutConfig::DEFAULT_MAX_SLOTS as u64
        );
    }

    #[tokio::test]
    async fn degenerate_slot_size_is_unprocessable() {
        let base = spawn_app(test_state()).await;
        let body = json!({
            "items": [{ "length": 1, "width": 1, "height": 1, "quantity": 3_000_000 }],
            "maxSlotSize": 1,
            "spacing": 0,
            "container": "truck"
        });
        for path in ["plan", "visualize_stream"] {
            let response = reqwest::Client::new()
                .post(format!("{base}/{path}"))
                .json(&body)
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
            let error: Value = response.json().await.unwrap();
            assert_eq!(error["error"], json!("Invalid layout override"));
        }
    }

    #[tokio::test]
    async fn calculate_endpoint_returns_totals() {
        let base = spawn_app(test_state()).await;
        let response = reqwest::Client::new()
            .post(format!("{base}/calculate"))
            .json(&truck_body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["aggregate"]["totalCount"], json!(24));
        assert_eq!(body["aggregate"]["totalVolumeM3"], json!(24.0));
        assert_eq!(body["aggregate"]["weightUtilizationPct"], json!(2.9));
        assert_eq!(body["aggregate"]["volumeOverflow"], json!(false));
        assert_eq!(body["aggregate"]["weightOverflow"], json!(false));
        assert_eq!(body["summary"]["suggestedContainer"], json!("20ft"));
        assert_eq!(body["summary"]["source"], json!("local"));
    }

    #[tokio::test]
    async fn calculate_endpoint_flags_overflow() {
        let base = spawn_app(test_state()).await;
        let body = json!({
            "items": [
                { "length": 2000, "width": 2000, "height": 2000, "weight": 5000, "quantity": 20 }
            ],
            "container": "truck"
        });
        let response = reqwest::Client::new()
            .post(format!("{base}/calculate"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["aggregate"]["volumeOverflow"], json!(true));
        assert_eq!(body["aggregate"]["weightOverflow"], json!(true));
        assert_eq!(body["summary"]["fits"], json!(false));
    }

    #[tokio::test]
    async fn invalid_json_is_unprocessable() {
        let base = spawn_app(test_state()).await;
        let response = reqwest::Client::new()
            .post(format!("{base}/calculate"))
            .header("content-type", "application/json")
            .body("{ not json")
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::UNPROCESSABLE_ENTITY);
        let body: Value = response.json().await.unwrap();
        assert_eq!(body["error"], json!("Invalid JSON data"));
    }

    #[tokio::test]
    async fn remote_failure_maps_to_bad_gateway() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead = listener.local_addr().unwrap();
        drop(listener);

        let mut state = test_state();
        state.backend = CalculationBackend::from_config(&CalculationConfig::remote(
            format!("http://{dead}/api/calculate"),
            std::time::Duration::from_secs(2),
        ))
        .unwrap();
        let base = spawn_app(state).await;

        let response = reqwest::Client::new()
            .post(format!("{base}/calculate"))
            .json(&truck_body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn plan_endpoint_reports_unplaced_units() {
        let base = spawn_app(test_state()).await;
        let body = json!({
            "items": [{ "length": 100, "width": 100, "height": 100, "quantity": 2000 }],
            "container": "truck"
        });
        let response = reqwest::Client::new()
            .post(format!("{base}/plan"))
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);

        let body: Value = response.json().await.unwrap();
        assert_eq!(body["totalUnits"], json!(2000));
        assert_eq!(body["isComplete"], json!(false));
        assert_eq!(body["plan"]["slots"].as_array().unwrap().len(), 1862);
        assert_eq!(body["plan"]["unplaced"], json!(138));
    }

    #[tokio::test]
    async fn report_endpoint_returns_text() {
        let base = spawn_app(test_state()).await;
        let response = reqwest::Client::new()
            .post(format!("{base}/report"))
            .json(&truck_body())
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let content_type = response.headers()[reqwest::header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .to_string();
        assert!(content_type.starts_with("text/plain"));
        let text = response.text().await.unwrap();
        assert!(text.starts_with("Sea Freight Load Calculation Report"));
        assert!(text.contains("Page 1 of 1"));
    }

    #[tokio::test]
    async fn containers_endpoint_lists_presets() {
        let base = spawn_app(test_state()).await;
        let body: Value = reqwest::get(format!("{base}/containers"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let classes: Vec<_> = body
            .as_array()
            .unwrap()
            .iter()
            .map(|preset| preset["class"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(classes, vec!["20ft", "40ft", "40HC", "truck"]);
    }

    #[tokio::test]
    async fn commands_for_unknown_sessions_are_not_found() {
        let base = spawn_app(test_state()).await;
        let client = reqwest::Client::new();
        for action in ["restart", "view_mode"] {
            let response = client
                .post(format!("{base}/visualize/999/{action}"))
                .send()
                .await
                .unwrap();
            assert_eq!(response.status(), reqwest::StatusCode::NOT_FOUND);
        }
    }

    #[tokio::test]
    async fn command_for_live_session_is_accepted() {
        let state = test_state();
        let container = ContainerClass::Truck.spec();
        let plan = plan_for_container(2, &container, &LayoutConfig::default());
        let handle = spawn_session(
            &state.sessions,
            &container,
            &plan,
            &[],
            state.config.animation.timing(),
        )
        .unwrap();

        let response = command_response(&state, handle.id, SessionCommand::Restart);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        drop(handle);
    }
}

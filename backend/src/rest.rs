//! HTTP boundary: JSON/form endpoints for the scoreboard and admin
//! actions, plus the SSE stream viewers hold open for reload signals.
//! Pure translation layer: validation and business rules live in the
//! domain services.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, State},
    http::{HeaderMap, Method, StatusCode},
    response::sse::{self, Sse},
    response::{IntoResponse, Response},
    routing::{get, post},
    Form, Json, Router,
};
use futures::stream::{self, Stream, StreamExt};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use shared::{
    AddEmployeeRequest, DeleteEmployeeRequest, Event, EventKind, IncrementResultRequest,
    RenameEmployeeRequest, RenameTeamRequest, SetEmployeeTeamRequest, StatusResponse,
    UpdateResultRequest,
};

use crate::domain::{EventHub, ScoreboardError, ScoreboardService, Subscription};

/// Idle time on a viewer stream before a keep-alive comment is sent.
const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(15);

/// Header carrying the shared admin capability.
const ADMIN_TOKEN_HEADER: &str = "x-admin-token";

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub service: ScoreboardService,
    pub hub: Arc<EventHub>,
    pub admin_token: String,
}

impl AppState {
    pub fn new(service: ScoreboardService, hub: Arc<EventHub>, admin_token: String) -> Self {
        Self {
            service,
            hub,
            admin_token,
        }
    }
}

/// Build the application router with CORS for browser viewers.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    Router::new()
        .route("/api/scoreboard", get(get_scoreboard))
        .route("/api/teams/:key", get(get_team))
        .route("/api/events", get(events))
        .route("/api/admin/overview", get(admin_overview))
        .route("/api/admin/team/rename", post(rename_team))
        .route("/api/admin/employee/add", post(add_employee))
        .route("/api/admin/employee/rename", post(rename_employee))
        .route("/api/admin/employee/delete", post(delete_employee))
        .route("/api/admin/employee/set_team", post(set_employee_team))
        .route("/api/admin/result/update", post(update_result))
        .route("/api/admin/result/increment", post(increment_result))
        .route("/api/admin/reset_all", post(reset_all))
        .layer(cors)
        .with_state(state)
}

/// Translate a domain failure into the uniform error envelope.
fn error_response(err: ScoreboardError) -> Response {
    let status = match &err {
        ScoreboardError::EmployeeNotFound(_) => StatusCode::NOT_FOUND,
        ScoreboardError::UnknownTeam(_)
        | ScoreboardError::UnknownDay(_)
        | ScoreboardError::EmptyName => StatusCode::BAD_REQUEST,
        ScoreboardError::Storage(inner) => {
            error!("Storage error: {:?}", inner);
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    (status, Json(StatusResponse::error(err.to_string()))).into_response()
}

/// Check the shared admin token; `Some(response)` is the rejection.
fn require_admin(state: &AppState, headers: &HeaderMap) -> Option<Response> {
    let presented = headers
        .get(ADMIN_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok());

    if presented == Some(state.admin_token.as_str()) {
        None
    } else {
        Some(
            (
                StatusCode::FORBIDDEN,
                Json(StatusResponse::error("Admin token required")),
            )
                .into_response(),
        )
    }
}

// --- public reads ---

async fn get_scoreboard(State(state): State<AppState>) -> impl IntoResponse {
    match state.service.scoreboard().await {
        Ok(scoreboard) => (StatusCode::OK, Json(scoreboard)).into_response(),
        Err(err) => error_response(err),
    }
}

async fn get_team(State(state): State<AppState>, Path(key): Path<String>) -> impl IntoResponse {
    match state.service.team_aggregate(&key).await {
        Ok(aggregate) => (StatusCode::OK, Json(aggregate)).into_response(),
        Err(err) => error_response(err),
    }
}

// --- event stream ---

/// Long-lived SSE stream. Emits `hello` on connect, then a two-branch
/// wait: the next broadcast event, or a keep-alive comment after 15 s of
/// idle. Client disconnect drops the stream and with it the subscription,
/// which unregisters from the hub.
async fn events(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<sse::Event, axum::Error>>> {
    let subscription = state.hub.subscribe();
    info!("Viewer {} connected to event stream", subscription.id());

    let hello = Event::new(EventKind::Hello);
    let stream = stream::once(async move { sse::Event::default().json_data(&hello) }).chain(
        stream::unfold(subscription, |mut subscription: Subscription| async move {
            match tokio::time::timeout(KEEP_ALIVE_INTERVAL, subscription.recv()).await {
                Ok(Some(event)) => {
                    Some((sse::Event::default().json_data(&event), subscription))
                }
                // Sender gone: the viewer was unsubscribed, end the stream
                Ok(None) => None,
                Err(_elapsed) => Some((
                    Ok(sse::Event::default().comment("keep-alive")),
                    subscription,
                )),
            }
        }),
    );

    Sse::new(stream)
}

// --- admin reads ---

async fn admin_overview(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(rejection) = require_admin(&state, &headers) {
        return rejection;
    }

    match state.service.admin_overview().await {
        Ok(overview) => (StatusCode::OK, Json(overview)).into_response(),
        Err(err) => error_response(err),
    }
}

// --- admin mutations ---

async fn rename_team(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<RenameTeamRequest>,
) -> Response {
    if let Some(rejection) = require_admin(&state, &headers) {
        return rejection;
    }
    info!("POST /api/admin/team/rename - key: {}", request.key);

    match state.service.rename_team(&request.key, &request.name).await {
        Ok(()) => ok_response("Team name saved"),
        Err(err) => error_response(err),
    }
}

async fn add_employee(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<AddEmployeeRequest>,
) -> Response {
    if let Some(rejection) = require_admin(&state, &headers) {
        return rejection;
    }
    info!("POST /api/admin/employee/add - name: {:?}", request.name);

    match state
        .service
        .add_employee(&request.name, request.team_key.as_deref())
        .await
    {
        Ok(_) => ok_response("Employee added"),
        Err(err) => error_response(err),
    }
}

async fn rename_employee(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<RenameEmployeeRequest>,
) -> Response {
    if let Some(rejection) = require_admin(&state, &headers) {
        return rejection;
    }
    info!(
        "POST /api/admin/employee/rename - id: {}",
        request.employee_id
    );

    match state
        .service
        .rename_employee(request.employee_id, &request.name)
        .await
    {
        Ok(()) => ok_response("Employee name updated"),
        Err(err) => error_response(err),
    }
}

async fn delete_employee(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<DeleteEmployeeRequest>,
) -> Response {
    if let Some(rejection) = require_admin(&state, &headers) {
        return rejection;
    }
    info!(
        "POST /api/admin/employee/delete - id: {}",
        request.employee_id
    );

    match state.service.delete_employee(request.employee_id).await {
        Ok(()) => ok_response("Employee removed"),
        Err(err) => error_response(err),
    }
}

async fn set_employee_team(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<SetEmployeeTeamRequest>,
) -> Response {
    if let Some(rejection) = require_admin(&state, &headers) {
        return rejection;
    }
    info!(
        "POST /api/admin/employee/set_team - id: {} -> {}",
        request.employee_id, request.team_key
    );

    match state
        .service
        .set_employee_team(request.employee_id, &request.team_key)
        .await
    {
        Ok(()) => ok_response("Team updated"),
        Err(err) => error_response(err),
    }
}

async fn update_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<UpdateResultRequest>,
) -> Response {
    if let Some(rejection) = require_admin(&state, &headers) {
        return rejection;
    }
    info!(
        "POST /api/admin/result/update - id: {} day: {}",
        request.employee_id, request.day
    );

    match state
        .service
        .update_result(request.employee_id, &request.day, &request.amount)
        .await
    {
        Ok(_) => ok_response("Amount updated"),
        Err(err) => error_response(err),
    }
}

async fn increment_result(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<IncrementResultRequest>,
) -> Response {
    if let Some(rejection) = require_admin(&state, &headers) {
        return rejection;
    }
    info!(
        "POST /api/admin/result/increment - id: {} day: {}",
        request.employee_id, request.day
    );

    match state
        .service
        .increment_result(request.employee_id, &request.day, &request.delta)
        .await
    {
        Ok(_) => ok_response("Amount adjusted"),
        Err(err) => error_response(err),
    }
}

async fn reset_all(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Some(rejection) = require_admin(&state, &headers) {
        return rejection;
    }
    info!("POST /api/admin/reset_all");

    match state.service.reset_all().await {
        Ok(()) => ok_response("All statistics reset"),
        Err(err) => error_response(err),
    }
}

fn ok_response(message: &str) -> Response {
    (StatusCode::OK, Json(StatusResponse::success(message))).into_response()
}

//! Sensor session handlers
//!
//! `:class` accepts `presence`/`a` and `light`/`b`.

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::api_ok;
use axum::{
    extract::{Path, State},
    Json,
};
use kiosk_core::api::{ApiResponse, PortsResponse, SessionInfo, SessionsResponse, StartRequest};
use kiosk_core::{OpenParams, SensorClass};
use tracing::{debug, info};

fn parse_class(class: &str) -> Result<SensorClass, ApiError> {
    Ok(class.parse::<SensorClass>()?)
}

async fn session_info(state: &AppState, class: SensorClass) -> Result<SessionInfo, ApiError> {
    state
        .session
        .sessions()
        .await?
        .into_iter()
        .find(|s| s.class == class)
        .ok_or_else(|| ApiError::internal_error(format!("No {} session", class)))
}

/// List the ports selectable for a class.
///
/// # Endpoint
///
/// `GET /api/v0/sensor/:class/ports`
pub async fn list_ports(
    State(state): State<AppState>,
    Path(class): Path<String>,
) -> Result<Json<ApiResponse<PortsResponse>>, ApiError> {
    debug!("Request: GET /api/v0/sensor/{}/ports", class);
    let class = parse_class(&class)?;

    let ports = state.session.list_ports(class).await?;
    api_ok!(PortsResponse { class, ports })
}

/// Rescan devices and broadcast the port list of a class.
///
/// # Endpoint
///
/// `POST /api/v0/sensor/:class/ports/refresh`
pub async fn refresh_ports(
    State(state): State<AppState>,
    Path(class): Path<String>,
) -> Result<Json<ApiResponse<PortsResponse>>, ApiError> {
    debug!("Request: POST /api/v0/sensor/{}/ports/refresh", class);
    let class = parse_class(&class)?;

    let ports = state.session.refresh_ports(class).await?;
    api_ok!(PortsResponse { class, ports })
}

/// Start a sensor session on a port.
///
/// Any running session of the class is closed first. If access to the device
/// has not been granted yet the session waits in `permission_pending` and
/// opens once the grant arrives.
///
/// # Endpoint
///
/// `POST /api/v0/sensor/:class/start`
///
/// # Body
///
/// `{"port": "/dev/ttyUSB0", "level": 1}`; `level` defaults to 1 and is
/// ignored for lights.
pub async fn start_session(
    State(state): State<AppState>,
    Path(class): Path<String>,
    Json(request): Json<StartRequest>,
) -> Result<Json<ApiResponse<SessionInfo>>, ApiError> {
    debug!("Request: POST /api/v0/sensor/{}/start", class);
    let class = parse_class(&class)?;

    if request.port.trim().is_empty() {
        return Err(ApiError::bad_request("Port name cannot be empty"));
    }

    let params = request
        .level
        .map(|level| OpenParams { level })
        .unwrap_or_default();

    let phase = state.session.start(class, &request.port, params).await?;
    info!("{} session on {}: {}", class, request.port, phase.as_str());

    api_ok!(session_info(&state, class).await?)
}

/// Close the session of a class. Closing a closed session is a no-op.
///
/// # Endpoint
///
/// `POST /api/v0/sensor/:class/stop`
pub async fn stop_session(
    State(state): State<AppState>,
    Path(class): Path<String>,
) -> Result<Json<ApiResponse<SessionInfo>>, ApiError> {
    debug!("Request: POST /api/v0/sensor/{}/stop", class);
    let class = parse_class(&class)?;

    state.session.stop(class).await?;
    api_ok!(session_info(&state, class).await?)
}

/// Snapshot of both sessions.
///
/// # Endpoint
///
/// `GET /api/v0/sessions`
pub async fn list_sessions(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<SessionsResponse>>, ApiError> {
    debug!("Request: GET /api/v0/sessions");

    let sessions = state.session.sessions().await?;
    api_ok!(SessionsResponse { sessions })
}

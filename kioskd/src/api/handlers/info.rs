//! Info handlers for daemon information and root endpoint

use crate::api::error::ApiError;
use crate::api::AppState;

use axum::{extract::State, Json};
use kiosk_core::api::{ApiResponse, InfoResponse};
use serde_json::{json, Value};
use tracing::debug;

/// Handle the root endpoint.
///
/// Basic service identification, useful as a health check.
///
/// # Endpoint
///
/// `GET /`
pub(crate) async fn root() -> Result<Json<ApiResponse<Value>>, ApiError> {
    debug!("Request: GET /");

    let data = json!({
        "service": "Kiosk Sensor Bridge",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "ok"
    });

    Ok(Json(ApiResponse::success(data)))
}

/// Retrieve daemon information.
///
/// # Endpoint
///
/// `GET /api/v0/info`
///
/// # Returns
///
/// - `version` - Daemon version
/// - `mock_mode` - Whether the simulated SDK is in use
/// - `uptime` - Uptime in seconds
/// - `device_count` - USB serial devices currently attached
/// - `sessions` - Phase of both sensor sessions
pub(crate) async fn get_info(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<InfoResponse>>, ApiError> {
    debug!("Request: GET /api/v0/info");

    let device_count = state.session.device_count().await?;
    let sessions = state.session.sessions().await?;

    let info_response = InfoResponse {
        version: env!("CARGO_PKG_VERSION").to_string(),
        mock_mode: state.mock_mode,
        uptime: state.start_time.elapsed().as_secs(),
        device_count,
        sessions,
    };

    Ok(Json(ApiResponse::success(info_response)))
}

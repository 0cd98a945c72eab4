//! Device access and adapter alias handlers

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::{api_fail, api_ok};
use axum::{extract::State, Json};
use kiosk_core::api::{ApiResponse, DetectResponse, PermissionResponse, PortRequest};
use tracing::{debug, info};

/// Ask for access to a device without opening it.
///
/// `requested` is `false` when access is already held. The answer arrives
/// later as a `permission_granted` or `permission_denied` event.
///
/// # Endpoint
///
/// `POST /api/v0/permission`
pub async fn request_permission(
    State(state): State<AppState>,
    Json(request): Json<PortRequest>,
) -> Result<Json<ApiResponse<PermissionResponse>>, ApiError> {
    debug!("Request: POST /api/v0/permission ({})", request.port);

    if request.port.trim().is_empty() {
        return api_fail!("Port name cannot be empty");
    }

    let requested = state.session.request_permission(&request.port).await?;
    if requested {
        info!("Access request issued for {}", request.port);
    }

    api_ok!(PermissionResponse {
        port: request.port,
        requested,
    })
}

/// Re-detect multi-port adapter ports and rebuild the alias table.
///
/// # Endpoint
///
/// `POST /api/v0/ports/detect`
pub async fn detect_ports(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<DetectResponse>>, ApiError> {
    debug!("Request: POST /api/v0/ports/detect");

    let alias_count = state.session.detect_ports().await?;
    api_ok!(DetectResponse { alias_count })
}

//! Light pass-through handlers
//!
//! These forward straight to the vendor SDK on a named port, outside the
//! session lifecycle. Legacy alias names (`SerialCOM1`, ...) resolve to the
//! matching adapter port. Commands answer with the vendor result code, 0 on
//! success.

use crate::api::error::ApiError;
use crate::api::AppState;
use crate::{api_fail, api_ok};
use axum::{
    extract::{Query, State},
    Json,
};
use kiosk_core::api::{
    ApiResponse, BreatheRequest, ComListResponse, FirmwareResponse, LedColorRequest,
    OpenPortRequest, PortOpenResponse, PortRequest, RawStatusResponse, VendorCodeResponse,
};
use kiosk_core::LightStatus;
use serde::Deserialize;
use tracing::{debug, warn};

/// Query parameters naming a port.
#[derive(Deserialize)]
pub struct PortQuery {
    pub port: String,
}

type CodeResult = Result<Json<ApiResponse<VendorCodeResponse>>, ApiError>;

fn check_port(port: &str) -> Result<(), ApiError> {
    if port.trim().is_empty() {
        return api_fail!("Port name cannot be empty");
    }
    Ok(())
}

fn code_response(command: &str, port: String, code: i32) -> CodeResult {
    if code != 0 {
        warn!("{} on {} returned vendor code {}", command, port, code);
    }
    api_ok!(VendorCodeResponse { port, code })
}

/// Serial ports the vendor SDK can see, open or not.
///
/// # Endpoint
///
/// `GET /api/v0/light/com-list`
pub async fn com_list(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<ComListResponse>>, ApiError> {
    debug!("Request: GET /api/v0/light/com-list");

    let ports = state.session.com_list().await?;
    api_ok!(ComListResponse { ports })
}

/// Whether a port is open.
///
/// # Endpoint
///
/// `GET /api/v0/light/port/open?port=/dev/ttyUSB1`
pub async fn is_open(
    State(state): State<AppState>,
    Query(query): Query<PortQuery>,
) -> Result<Json<ApiResponse<PortOpenResponse>>, ApiError> {
    debug!("Request: GET /api/v0/light/port/open?port={}", query.port);
    check_port(&query.port)?;

    let open = state.session.is_open_port(&query.port).await?;
    api_ok!(PortOpenResponse {
        port: query.port,
        open,
    })
}

/// Open a port. A zero baud rate selects the SDK default.
///
/// # Endpoint
///
/// `POST /api/v0/light/port/open`
pub async fn open_port(
    State(state): State<AppState>,
    Json(request): Json<OpenPortRequest>,
) -> CodeResult {
    debug!("Request: POST /api/v0/light/port/open ({})", request.port);
    check_port(&request.port)?;

    let code = state
        .session
        .open_port(&request.port, request.baud_rate)
        .await?;
    code_response("open", request.port, code)
}

/// Close a port.
///
/// # Endpoint
///
/// `POST /api/v0/light/port/close`
pub async fn close_port(
    State(state): State<AppState>,
    Json(request): Json<PortRequest>,
) -> CodeResult {
    debug!("Request: POST /api/v0/light/port/close ({})", request.port);
    check_port(&request.port)?;

    let code = state.session.close_port(&request.port).await?;
    code_response("close", request.port, code)
}

/// Set the colour on an open port.
///
/// # Endpoint
///
/// `POST /api/v0/light/color`
///
/// # Body
///
/// `{"port": "...", "red": 255, "green": 0, "blue": 0, "seconds": 5, "minutes": 0, "mode": 0}`
pub async fn set_color(
    State(state): State<AppState>,
    Json(request): Json<LedColorRequest>,
) -> CodeResult {
    debug!("Request: POST /api/v0/light/color ({})", request.port);
    check_port(&request.port)?;

    let code = state
        .session
        .set_led_color(&request.port, request.color)
        .await?;
    code_response("set_color", request.port, code)
}

/// Open the port, set the colour and close it again.
///
/// # Endpoint
///
/// `POST /api/v0/light/show-color`
pub async fn show_color(
    State(state): State<AppState>,
    Json(request): Json<LedColorRequest>,
) -> CodeResult {
    debug!("Request: POST /api/v0/light/show-color ({})", request.port);
    check_port(&request.port)?;

    let code = state.session.show_color(&request.port, request.color).await?;
    code_response("show_color", request.port, code)
}

/// # Endpoint
///
/// `POST /api/v0/light/flash`
pub async fn flash(State(state): State<AppState>, Json(request): Json<PortRequest>) -> CodeResult {
    check_port(&request.port)?;
    let code = state.session.set_flash(&request.port).await?;
    code_response("flash", request.port, code)
}

/// # Endpoint
///
/// `POST /api/v0/light/smooth`
pub async fn smooth(
    State(state): State<AppState>,
    Json(request): Json<PortRequest>,
) -> CodeResult {
    check_port(&request.port)?;
    let code = state.session.set_smooth(&request.port).await?;
    code_response("smooth", request.port, code)
}

/// # Endpoint
///
/// `POST /api/v0/light/stop`
pub async fn stop(State(state): State<AppState>, Json(request): Json<PortRequest>) -> CodeResult {
    check_port(&request.port)?;
    let code = state.session.set_stop(&request.port).await?;
    code_response("stop", request.port, code)
}

/// # Endpoint
///
/// `POST /api/v0/light/breathe`
pub async fn breathe(
    State(state): State<AppState>,
    Json(request): Json<BreatheRequest>,
) -> CodeResult {
    check_port(&request.port)?;
    let code = state
        .session
        .set_breathe(&request.port, request.pattern)
        .await?;
    code_response("breathe", request.port, code)
}

/// Raw 8-byte status buffer of a light.
///
/// # Endpoint
///
/// `GET /api/v0/light/status?port=/dev/ttyUSB1`
pub async fn raw_status(
    State(state): State<AppState>,
    Query(query): Query<PortQuery>,
) -> Result<Json<ApiResponse<RawStatusResponse>>, ApiError> {
    debug!("Request: GET /api/v0/light/status?port={}", query.port);
    check_port(&query.port)?;

    let bytes = state.session.get_status(&query.port).await?;
    api_ok!(RawStatusResponse {
        port: query.port,
        bytes,
    })
}

/// Decoded light status (colour channels and mode).
///
/// # Endpoint
///
/// `GET /api/v0/light/status/parsed?port=/dev/ttyUSB1`
pub async fn parsed_status(
    State(state): State<AppState>,
    Query(query): Query<PortQuery>,
) -> Result<Json<ApiResponse<LightStatus>>, ApiError> {
    debug!("Request: GET /api/v0/light/status/parsed?port={}", query.port);
    check_port(&query.port)?;

    let status = state.session.parsed_status(&query.port).await?;
    api_ok!(status)
}

/// Firmware version reported by the device.
///
/// # Endpoint
///
/// `GET /api/v0/light/firmware?port=/dev/ttyUSB1`
pub async fn firmware(
    State(state): State<AppState>,
    Query(query): Query<PortQuery>,
) -> Result<Json<ApiResponse<FirmwareResponse>>, ApiError> {
    debug!("Request: GET /api/v0/light/firmware?port={}", query.port);
    check_port(&query.port)?;

    let version = state.session.firmware_version(&query.port).await?;
    api_ok!(FirmwareResponse {
        port: query.port,
        version,
    })
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::*;
    use axum::http::StatusCode;
    use kiosk_hardware::{codes, MockCall, VendorSdk};
    use kiosk_core::LedColor;
    use serde_json::json;

    #[tokio::test]
    async fn test_open_color_close() {
        let app = create_test_app();

        let (status, json) = post(
            &app,
            "/api/v0/light/port/open",
            json!({"port": LIGHT, "baud_rate": 9600}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["code"], 0);

        let (_, json) = get(&app, &format!("/api/v0/light/port/open?port={}", LIGHT)).await;
        assert_eq!(json["data"]["open"], true);

        let (_, json) = post(
            &app,
            "/api/v0/light/color",
            json!({"port": LIGHT, "red": 255, "green": 128, "blue": 0, "seconds": 3}),
        )
        .await;
        assert_eq!(json["data"]["code"], 0);
        assert!(app.sdk.calls().contains(&MockCall::SetColor {
            port: LIGHT.to_string(),
            color: LedColor {
                red: 255,
                green: 128,
                blue: 0,
                seconds: 3,
                minutes: 0,
                mode: 0,
            },
        }));

        let (_, json) = get(&app, "/api/v0/light/com-list").await;
        assert_eq!(json["data"]["ports"], json!([LIGHT]));

        let (_, json) = post(&app, "/api/v0/light/port/close", json!({"port": LIGHT})).await;
        assert_eq!(json["data"]["code"], 0);
    }

    #[tokio::test]
    async fn test_command_on_closed_port_returns_code() {
        let app = create_test_app();

        for path in ["flash", "smooth", "stop"] {
            let (status, json) = post(
                &app,
                &format!("/api/v0/light/{}", path),
                json!({"port": LIGHT}),
            )
            .await;
            assert_eq!(status, StatusCode::OK);
            assert_eq!(json["data"]["code"], codes::NOT_OPEN);
        }
    }

    #[tokio::test]
    async fn test_alias_resolves_to_adapter() {
        let app = create_test_app();

        post(&app, "/api/v0/light/port/open", json!({"port": "SerialCOM1"})).await;
        let (_, json) = post(
            &app,
            "/api/v0/light/breathe",
            json!({"port": "SerialCOM1", "pattern": 3}),
        )
        .await;

        assert_eq!(json["data"]["port"], "SerialCOM1");
        assert_eq!(json["data"]["code"], 0);
        assert!(app.sdk.calls().contains(&MockCall::Breathe {
            port: ADAPTER.to_string(),
            pattern: 3,
        }));
    }

    #[tokio::test]
    async fn test_show_color_leaves_port_closed() {
        let app = create_test_app();

        let (status, json) = post(
            &app,
            "/api/v0/light/show-color",
            json!({"port": LIGHT, "red": 0, "green": 0, "blue": 255}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["code"], 0);
        assert!(!app.sdk.is_open_port(LIGHT));
    }

    #[tokio::test]
    async fn test_status_endpoints() {
        let app = create_test_app();
        post(&app, "/api/v0/light/port/open", json!({"port": LIGHT})).await;

        app.sdk
            .queue_status(LIGHT, vec![0, 200, 0, 100, 0, 50, 2, 0]);
        let (status, json) = get(&app, &format!("/api/v0/light/status?port={}", LIGHT)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["data"]["bytes"], json!([0, 200, 0, 100, 0, 50, 2, 0]));

        app.sdk
            .queue_status(LIGHT, vec![0, 200, 0, 100, 0, 50, 2, 0]);
        let (_, json) = get(
            &app,
            &format!("/api/v0/light/status/parsed?port={}", LIGHT),
        )
        .await;
        assert_eq!(json["data"], json!({"red": 200, "green": 100, "blue": 50, "mode": 2}));

        let (_, json) = get(&app, &format!("/api/v0/light/firmware?port={}", LIGHT)).await;
        assert_eq!(json["data"]["version"], "MOCK-1.0.0");
    }

    #[tokio::test]
    async fn test_status_on_closed_port_is_bad_gateway() {
        let app = create_test_app();
        let (status, json) = get(&app, &format!("/api/v0/light/status?port={}", LIGHT)).await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["code"], "STATUS_ERROR");
    }

    #[tokio::test]
    async fn test_missing_port_query() {
        let app = create_test_app();
        let (status, _) = get(&app, "/api/v0/light/status").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

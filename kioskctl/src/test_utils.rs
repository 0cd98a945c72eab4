//! Test utilities for CLI testing
//!
//! Provides a mock daemon implementation for client tests.

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use kiosk_core::api::{
    ApiResponse, ComListResponse, DetectResponse, FirmwareResponse, InfoResponse,
    PermissionResponse, PortOpenResponse, PortsResponse, RawStatusResponse, SessionInfo,
    SessionsResponse, StartRequest, VendorCodeResponse,
};
use kiosk_core::{LightStatus, SensorClass, SessionPhase};
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;

/// Canned event stream: a session start followed by one reading
const EVENT_STREAM: &str = concat!(
    ":\n\n",
    "event: sensor_started\n",
    "data: {\"event\":\"sensor_started\",\"class\":\"presence\",\"port\":\"/dev/ttyUSB0\"}\n\n",
    "event: sensor_update\n",
    "data: {\"event\":\"sensor_update\",\"class\":\"presence\",\"value\":16,\"status\":\"FAR\"}\n\n",
);

/// Mock server state
#[derive(Debug, Clone, Default)]
pub struct MockServerState {
    /// Open sessions: port and threshold level per class
    sessions: Arc<Mutex<HashMap<SensorClass, (String, Option<i32>)>>>,
}

impl MockServerState {
    /// Port the session of a class was started on
    pub fn started(&self, class: SensorClass) -> Option<String> {
        self.sessions
            .lock()
            .unwrap()
            .get(&class)
            .map(|(port, _)| port.clone())
    }

    fn snapshot(&self, class: SensorClass) -> SessionInfo {
        let sessions = self.sessions.lock().unwrap();
        match sessions.get(&class) {
            Some((port, level)) => SessionInfo {
                class,
                phase: SessionPhase::Open,
                port: Some(port.clone()),
                level: *level,
                poll_scheduled: true,
            },
            None => SessionInfo {
                class,
                phase: SessionPhase::Closed,
                port: None,
                level: None,
                poll_scheduled: false,
            },
        }
    }
}

fn ports_for(class: SensorClass) -> Vec<String> {
    let device = match class {
        SensorClass::Presence => "/dev/ttyUSB0",
        SensorClass::Light => "/dev/ttyUSB1",
    };
    vec![device.to_string(), "SerialCOM1".to_string()]
}

#[derive(Debug, Deserialize)]
pub struct PortQuery {
    port: String,
}

/// Mock server implementation
#[derive(Debug)]
pub struct MockServer {
    state: MockServerState,
    port: u16,
}

impl Default for MockServer {
    fn default() -> Self {
        Self::new()
    }
}

impl MockServer {
    /// Create a new mock server
    pub fn new() -> Self {
        Self {
            state: MockServerState::default(),
            port: 0,
        }
    }

    /// Start the mock server and return the address
    pub async fn start(mut self) -> Result<(Self, String)> {
        let app = self.create_router();

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        self.port = addr.port();

        let server_url = format!("http://127.0.0.1:{}", self.port);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                eprintln!("Mock server error: {}", e);
            }
        });

        // Give the server a moment to start and verify it's running
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(20)).await;
            if tokio::net::TcpStream::connect(("127.0.0.1", self.port))
                .await
                .is_ok()
            {
                break;
            }
        }

        Ok((self, server_url))
    }

    /// Get the server port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Get a reference to the server state
    pub fn state(&self) -> &MockServerState {
        &self.state
    }

    fn create_router(&self) -> Router {
        Router::new()
            .route("/", get(root_handler))
            .route("/api/v0/info", get(info_handler))
            .route("/api/v0/sensor/:class/ports", get(ports_handler))
            .route("/api/v0/sensor/:class/ports/refresh", post(ports_handler))
            .route("/api/v0/sensor/:class/start", post(start_handler))
            .route("/api/v0/sensor/:class/stop", post(stop_handler))
            .route("/api/v0/sessions", get(sessions_handler))
            .route("/api/v0/permission", post(permission_handler))
            .route("/api/v0/ports/detect", post(detect_handler))
            .route("/api/v0/light/com-list", get(com_list_handler))
            .route(
                "/api/v0/light/port/open",
                get(is_open_handler).post(code_handler),
            )
            .route("/api/v0/light/port/close", post(code_handler))
            .route("/api/v0/light/color", post(code_handler))
            .route("/api/v0/light/show-color", post(code_handler))
            .route("/api/v0/light/flash", post(code_handler))
            .route("/api/v0/light/smooth", post(code_handler))
            .route("/api/v0/light/stop", post(code_handler))
            .route("/api/v0/light/breathe", post(code_handler))
            .route("/api/v0/light/status", get(raw_status_handler))
            .route("/api/v0/light/status/parsed", get(parsed_status_handler))
            .route("/api/v0/light/firmware", get(firmware_handler))
            .route("/api/v0/events", get(events_handler))
            .with_state(self.state.clone())
    }
}

fn error_response(status: StatusCode, message: String, code: &str) -> Response {
    let body: ApiResponse<()> = ApiResponse::error_with_code(message, code);
    (status, Json(body)).into_response()
}

fn parse_class(class: &str) -> Result<SensorClass, Response> {
    class.parse().map_err(|_| {
        error_response(
            StatusCode::BAD_REQUEST,
            format!("Unknown sensor class '{}'", class),
            "INVALID_INPUT",
        )
    })
}

// Handler functions

async fn root_handler() -> Json<ApiResponse<serde_json::Value>> {
    Json(ApiResponse::success(serde_json::json!({
        "service": "Kiosk Sensor Bridge",
        "status": "ok",
        "version": "1.0.0-test"
    })))
}

async fn info_handler(State(state): State<MockServerState>) -> Json<ApiResponse<InfoResponse>> {
    Json(ApiResponse::success(InfoResponse {
        version: "1.0.0-test".to_string(),
        mock_mode: true,
        uptime: 3600,
        device_count: 3,
        sessions: SensorClass::ALL
            .iter()
            .map(|class| state.snapshot(*class))
            .collect(),
    }))
}

async fn ports_handler(Path(class): Path<String>) -> Response {
    match parse_class(&class) {
        Ok(class) => Json(ApiResponse::success(PortsResponse {
            class,
            ports: ports_for(class),
        }))
        .into_response(),
        Err(response) => response,
    }
}

async fn start_handler(
    State(state): State<MockServerState>,
    Path(class): Path<String>,
    Json(request): Json<StartRequest>,
) -> Response {
    let class = match parse_class(&class) {
        Ok(class) => class,
        Err(response) => return response,
    };

    if !ports_for(class).contains(&request.port) {
        return error_response(
            StatusCode::NOT_FOUND,
            format!("Device not found: {}", request.port),
            "DEVICE_NOT_FOUND",
        );
    }

    let level = match class {
        SensorClass::Presence => Some(request.level.unwrap_or(1)),
        SensorClass::Light => None,
    };
    state
        .sessions
        .lock()
        .unwrap()
        .insert(class, (request.port, level));

    Json(ApiResponse::success(state.snapshot(class))).into_response()
}

async fn stop_handler(State(state): State<MockServerState>, Path(class): Path<String>) -> Response {
    let class = match parse_class(&class) {
        Ok(class) => class,
        Err(response) => return response,
    };
    state.sessions.lock().unwrap().remove(&class);
    Json(ApiResponse::success(state.snapshot(class))).into_response()
}

async fn sessions_handler(
    State(state): State<MockServerState>,
) -> Json<ApiResponse<SessionsResponse>> {
    Json(ApiResponse::success(SessionsResponse {
        sessions: SensorClass::ALL
            .iter()
            .map(|class| state.snapshot(*class))
            .collect(),
    }))
}

async fn permission_handler(
    Json(request): Json<serde_json::Value>,
) -> Json<ApiResponse<PermissionResponse>> {
    let port = request["port"].as_str().unwrap_or_default().to_string();
    Json(ApiResponse::success(PermissionResponse {
        port,
        requested: false,
    }))
}

async fn detect_handler() -> Json<ApiResponse<DetectResponse>> {
    Json(ApiResponse::success(DetectResponse { alias_count: 1 }))
}

async fn com_list_handler() -> Json<ApiResponse<ComListResponse>> {
    Json(ApiResponse::success(ComListResponse {
        ports: vec!["/dev/ttyUSB1".to_string()],
    }))
}

async fn is_open_handler(Query(query): Query<PortQuery>) -> Json<ApiResponse<PortOpenResponse>> {
    Json(ApiResponse::success(PortOpenResponse {
        port: query.port,
        open: false,
    }))
}

async fn code_handler(
    Json(request): Json<serde_json::Value>,
) -> Json<ApiResponse<VendorCodeResponse>> {
    let port = request["port"].as_str().unwrap_or_default().to_string();
    Json(ApiResponse::success(VendorCodeResponse { port, code: 0 }))
}

async fn raw_status_handler(
    Query(query): Query<PortQuery>,
) -> Json<ApiResponse<RawStatusResponse>> {
    Json(ApiResponse::success(RawStatusResponse {
        port: query.port,
        bytes: vec![0, 200, 0, 100, 0, 50, 2, 0],
    }))
}

async fn parsed_status_handler() -> Json<ApiResponse<LightStatus>> {
    Json(ApiResponse::success(LightStatus {
        red: 200,
        green: 100,
        blue: 50,
        mode: 2,
    }))
}

async fn firmware_handler(Query(query): Query<PortQuery>) -> Json<ApiResponse<FirmwareResponse>> {
    Json(ApiResponse::success(FirmwareResponse {
        port: query.port,
        version: "MOCK-1.0.0".to_string(),
    }))
}

async fn events_handler() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "text/event-stream")], EVENT_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_server_startup() {
        let server = MockServer::new();
        let (server, url) = server.start().await.unwrap();

        assert!(server.port() > 0);
        assert!(url.contains(&server.port().to_string()));

        let response = reqwest::Client::new().get(&url).send().await.unwrap();
        assert!(response.status().is_success());
    }

    #[tokio::test]
    async fn test_unknown_class_rejected() {
        let (_, url) = MockServer::new().start().await.unwrap();

        let response = reqwest::Client::new()
            .get(format!("{}/api/v0/sensor/fan/ports", url))
            .send()
            .await
            .unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
    }
}

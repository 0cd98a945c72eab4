//! Integration tests for the kioskctl binary
//!
//! Each test starts an in-process mock daemon on an ephemeral port and runs
//! the compiled CLI against it.

use anyhow::Result;
use axum::{
    extract::Path,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use kiosk_core::api::{ApiResponse, InfoResponse, PortsResponse, SessionInfo, StartRequest};
use kiosk_core::{SensorClass, SessionPhase};
use serde_json::Value;
use std::process::Output;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio::time::timeout;

const COMMAND_TIMEOUT: Duration = Duration::from_secs(20);

fn closed_session(class: SensorClass) -> SessionInfo {
    SessionInfo {
        class,
        phase: SessionPhase::Closed,
        port: None,
        level: None,
        poll_scheduled: false,
    }
}

async fn info() -> Json<ApiResponse<InfoResponse>> {
    Json(ApiResponse::success(InfoResponse {
        version: "9.9.9-it".to_string(),
        mock_mode: true,
        uptime: 42,
        device_count: 1,
        sessions: SensorClass::ALL.iter().copied().map(closed_session).collect(),
    }))
}

async fn ports(Path(class): Path<String>) -> Response {
    match class.parse::<SensorClass>() {
        Ok(class) => Json(ApiResponse::success(PortsResponse {
            class,
            ports: vec!["/dev/ttyUSB0".to_string()],
        }))
        .into_response(),
        Err(e) => {
            let body: ApiResponse<()> = ApiResponse::error_with_code(e.to_string(), e.code());
            (StatusCode::BAD_REQUEST, Json(body)).into_response()
        }
    }
}

async fn start(Json(request): Json<StartRequest>) -> Response {
    let body: ApiResponse<()> = ApiResponse::error_with_code(
        format!("Device not found: {}", request.port),
        "DEVICE_NOT_FOUND",
    );
    (StatusCode::NOT_FOUND, Json(body)).into_response()
}

/// Start a mock daemon and return its base URL
async fn start_mock_daemon() -> Result<String> {
    let app = Router::new()
        .route("/api/v0/info", get(info))
        .route("/api/v0/sensor/:class/ports", get(ports))
        .route("/api/v0/sensor/:class/start", post(start));

    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            eprintln!("Mock daemon error: {}", e);
        }
    });

    Ok(format!("http://{}", addr))
}

/// Run the CLI with `--no-config` against a server URL
async fn run_cli(server_url: &str, args: &[&str]) -> Result<Output> {
    let output = timeout(
        COMMAND_TIMEOUT,
        Command::new(env!("CARGO_BIN_EXE_kioskctl"))
            .args(["--server", server_url, "--no-config"])
            .args(args)
            .env_remove("KIOSK_SERVER")
            .env_remove("KIOSK_FORMAT")
            .env_remove("KIOSK_VERBOSE")
            .env_remove("KIOSK_TIMEOUT")
            .output(),
    )
    .await??;
    Ok(output)
}

#[tokio::test]
async fn test_info_json_output() -> Result<()> {
    let url = start_mock_daemon().await?;

    let output = run_cli(&url, &["--format", "json", "info"]).await?;
    assert!(output.status.success(), "{:?}", output);

    let json: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["version"], "9.9.9-it");
    assert_eq!(json["sessions"][0]["phase"], "closed");
    Ok(())
}

#[tokio::test]
async fn test_ports_table_output() -> Result<()> {
    let url = start_mock_daemon().await?;

    let output = run_cli(&url, &["ports", "a"]).await?;
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8(output.stdout)?;
    assert!(stdout.contains("/dev/ttyUSB0"), "{}", stdout);
    assert!(stdout.contains("presence"), "{}", stdout);
    Ok(())
}

#[tokio::test]
async fn test_start_unknown_port_fails_with_code() -> Result<()> {
    let url = start_mock_daemon().await?;

    let output = run_cli(&url, &["start", "light", "/dev/ttyNOPE"]).await?;
    assert!(!output.status.success());

    let stderr = String::from_utf8(output.stderr)?;
    assert!(stderr.contains("DEVICE_NOT_FOUND"), "{}", stderr);
    Ok(())
}

#[tokio::test]
async fn test_invalid_class_rejected_locally() -> Result<()> {
    let output = run_cli("http://127.0.0.1:9", &["ports", "fan"]).await?;

    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("fan"));
    Ok(())
}

#[tokio::test]
async fn test_config_show_needs_no_server() -> Result<()> {
    let output = run_cli("http://127.0.0.1:9", &["--format", "json", "config", "show"]).await?;
    assert!(output.status.success(), "{:?}", output);

    let json: Value = serde_json::from_slice(&output.stdout)?;
    assert_eq!(json["server_url"], "http://127.0.0.1:9");
    assert_eq!(json["output_format"], "json");
    Ok(())
}

#[tokio::test]
async fn test_unreachable_server_fails() -> Result<()> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}", listener.local_addr()?);
    drop(listener);

    let output = run_cli(&url, &["sessions"]).await?;
    assert!(!output.status.success());
    assert!(String::from_utf8(output.stderr)?.contains("attempts"));
    Ok(())
}

#[tokio::test]
async fn test_completion_script() -> Result<()> {
    let output = run_cli("http://127.0.0.1:9", &["completion", "bash"]).await?;
    assert!(output.status.success());
    assert!(String::from_utf8(output.stdout)?.contains("kioskctl"));
    Ok(())
}

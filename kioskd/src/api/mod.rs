//! API module for the sensor bridge daemon
//!
//! Contains the REST API implementation with Axum router and handlers.

pub(crate) mod handlers;

use crate::session::SessionHandle;
use axum::{
    extract::DefaultBodyLimit,
    http::{HeaderValue, Method},
    routing::{get, post},
    Router,
};
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;

/// Application state shared across all handlers
#[derive(Clone)]
pub(crate) struct AppState {
    /// Client for the session manager task
    pub session: SessionHandle,
    /// Running against the simulated SDK and registry
    pub mock_mode: bool,
    /// Server start time for uptime calculation
    pub start_time: Instant,
}

impl AppState {
    pub fn new(session: SessionHandle, mock_mode: bool) -> Self {
        Self {
            session,
            mock_mode,
            start_time: Instant::now(),
        }
    }
}

/// Create the main API router with all endpoints
pub(crate) fn create_router(state: AppState) -> Router {
    info!("Setting up API router...");

    let cors = CorsLayer::new()
        .allow_origin(HeaderValue::from_static("*"))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(tower_http::cors::Any);

    let middleware_stack = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(DefaultBodyLimit::max(64 * 1024));

    Router::new()
        // Sensor session endpoints
        .route(
            "/api/v0/sensor/:class/ports",
            get(handlers::sensors::list_ports),
        )
        .route(
            "/api/v0/sensor/:class/ports/refresh",
            post(handlers::sensors::refresh_ports),
        )
        .route(
            "/api/v0/sensor/:class/start",
            post(handlers::sensors::start_session),
        )
        .route(
            "/api/v0/sensor/:class/stop",
            post(handlers::sensors::stop_session),
        )
        .route("/api/v0/sessions", get(handlers::sensors::list_sessions))
        // Device access and adapter aliases
        .route(
            "/api/v0/permission",
            post(handlers::devices::request_permission),
        )
        .route("/api/v0/ports/detect", post(handlers::devices::detect_ports))
        // Light pass-through
        .route("/api/v0/light/com-list", get(handlers::light::com_list))
        .route(
            "/api/v0/light/port/open",
            get(handlers::light::is_open).post(handlers::light::open_port),
        )
        .route("/api/v0/light/port/close", post(handlers::light::close_port))
        .route("/api/v0/light/color", post(handlers::light::set_color))
        .route("/api/v0/light/show-color", post(handlers::light::show_color))
        .route("/api/v0/light/flash", post(handlers::light::flash))
        .route("/api/v0/light/smooth", post(handlers::light::smooth))
        .route("/api/v0/light/stop", post(handlers::light::stop))
        .route("/api/v0/light/breathe", post(handlers::light::breathe))
        .route("/api/v0/light/status", get(handlers::light::raw_status))
        .route(
            "/api/v0/light/status/parsed",
            get(handlers::light::parsed_status),
        )
        .route("/api/v0/light/firmware", get(handlers::light::firmware))
        // Notification stream
        .route("/api/v0/events", get(handlers::events::stream))
        // System info endpoint
        .route("/api/v0/info", get(handlers::info::get_info))
        // Root endpoint
        .route("/", get(handlers::info::root))
        .layer(middleware_stack)
        .with_state(state)
}

/// Error handling utilities
pub(crate) mod error {
    use axum::{
        http::StatusCode,
        response::{IntoResponse, Response},
        Json,
    };
    use kiosk_core::api::ApiResponse;
    use kiosk_core::KioskError;

    use tracing::error;

    /// Custom error type for API responses
    #[derive(Debug)]
    pub struct ApiError {
        pub status_code: StatusCode,
        pub message: String,
        /// Machine-readable error code, see [`KioskError::code`]
        pub code: Option<&'static str>,
    }

    impl ApiError {
        /// Create a new API error
        pub fn new(status_code: StatusCode, message: impl Into<String>) -> Self {
            Self {
                status_code,
                message: message.into(),
                code: None,
            }
        }

        /// Create a bad request error
        pub fn bad_request(message: impl Into<String>) -> Self {
            Self::new(StatusCode::BAD_REQUEST, message)
        }

        /// Create an internal server error
        pub fn internal_error(message: impl Into<String>) -> Self {
            Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
        }

        /// Create a service unavailable error (for hardware issues)
        pub fn service_unavailable(message: impl Into<String>) -> Self {
            Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
        }

        fn with_code(mut self, code: &'static str) -> Self {
            self.code = Some(code);
            self
        }
    }

    impl IntoResponse for ApiError {
        fn into_response(self) -> Response {
            error!("API Error {}: {}", self.status_code, self.message);

            let response: ApiResponse<()> = match self.code {
                Some(code) => ApiResponse::error_with_code(self.message, code),
                None => ApiResponse::error(self.message),
            };

            (self.status_code, Json(response)).into_response()
        }
    }

    /// Convert KioskError to ApiError
    impl From<KioskError> for ApiError {
        fn from(err: KioskError) -> Self {
            let code = err.code();
            let message = err.to_string();
            let api_error = match err {
                KioskError::DeviceNotFound(_) => Self::new(StatusCode::NOT_FOUND, message),
                KioskError::PermissionDenied(_) => Self::new(StatusCode::FORBIDDEN, message),
                KioskError::VendorOpen { .. }
                | KioskError::StatusRead { .. }
                | KioskError::Vendor { .. } => Self::new(StatusCode::BAD_GATEWAY, message),
                KioskError::Serial(_) | KioskError::Timeout(_) | KioskError::SessionClosed => {
                    Self::service_unavailable(message)
                }
                KioskError::InvalidInput(_) | KioskError::Parse(_) => Self::bad_request(message),
                _ => Self::internal_error(message),
            };
            api_error.with_code(code)
        }
    }
}

/// Helper macros for common responses
#[macro_export]
macro_rules! api_ok {
    ($data:expr) => {
        Ok(axum::Json(kiosk_core::api::ApiResponse::success($data)))
    };
}

#[macro_export]
macro_rules! api_fail {
    ($message:expr) => {
        Err($crate::api::error::ApiError::bad_request($message))
    };
}


#[cfg(test)]
mod tests {
    use super::error::ApiError;
    use super::test_support::*;
    use axum::http::StatusCode;
    use kiosk_core::KioskError;
    use serde_json::json;

    #[test]
    fn test_error_status_mapping() {
        let cases = [
            (
                KioskError::DeviceNotFound("x".to_string()),
                StatusCode::NOT_FOUND,
            ),
            (
                KioskError::PermissionDenied("x".to_string()),
                StatusCode::FORBIDDEN,
            ),
            (
                KioskError::VendorOpen {
                    port: "x".to_string(),
                    code: -3,
                },
                StatusCode::BAD_GATEWAY,
            ),
            (KioskError::SessionClosed, StatusCode::SERVICE_UNAVAILABLE),
            (
                KioskError::InvalidInput("x".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                KioskError::Config("x".to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, status) in cases {
            let code = err.code();
            let api_error = ApiError::from(err);
            assert_eq!(api_error.status_code, status);
            assert_eq!(api_error.code, Some(code));
        }
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let app = create_test_app();
        let response = tower::ServiceExt::oneshot(
            app.router.clone(),
            axum::http::Request::builder()
                .uri("/api/v0/nope")
                .body(axum::body::Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_malformed_body_rejected() {
        let app = create_test_app();
        let (status, _) = post(&app, "/api/v0/sensor/presence/start", json!({"level": 2})).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

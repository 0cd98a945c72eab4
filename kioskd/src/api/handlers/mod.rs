//! API request handlers for the sensor bridge REST API.
//!
//! # Handler Modules
//!
//! - [`info`] - Daemon information and root endpoint
//! - [`sensors`] - Per-class port listing and session start/stop
//! - [`devices`] - Access requests and adapter alias detection
//! - [`light`] - Light pass-through commands
//! - [`events`] - Server-sent notification stream
//!
//! Handlers accept `State<AppState>`, forward to the session manager through
//! its handle and return `Result<Json<ApiResponse<T>>, ApiError>`.

pub mod devices;
pub mod events;
pub mod info;
pub mod light;
pub mod sensors;

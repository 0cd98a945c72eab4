//! HTTP client for communicating with the kiosk sensor bridge daemon.

use anyhow::{Context, Result};
use kiosk_core::api::{
    self, BreatheRequest, ComListResponse, DetectResponse, FirmwareResponse, InfoResponse,
    LedColorRequest, OpenPortRequest, PermissionResponse, PortOpenResponse, PortRequest,
    PortsResponse, RawStatusResponse, SessionInfo, SessionsResponse, StartRequest,
    VendorCodeResponse,
};
use kiosk_core::{LedColor, LightStatus, Notification, SensorClass};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::ops::ControlFlow;
use std::time::Duration;

/// Normalize a server URL by removing trailing slashes.
fn normalize_url(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}

/// HTTP client for the daemon's REST API.
///
/// This client handles all HTTP communication with the daemon, including:
/// - Automatic retries on connection failures
/// - Timeout handling
/// - Error response processing, including the daemon's error codes
///
/// # Retry Logic
///
/// Requests that fail to reach the server (connection refused, timeout) are
/// retried with a delay that grows linearly with each attempt. Responses
/// carrying an HTTP error status are not retried.
///
/// # Examples
///
/// ```no_run
/// use kioskctl::client::KioskClient;
/// use std::time::Duration;
///
/// # async fn example() -> anyhow::Result<()> {
/// let client = KioskClient::with_config(
///     "http://localhost:3080".to_string(),
///     10,  // timeout in seconds
///     3,   // max retries
///     Duration::from_millis(500),  // initial retry delay
/// )?;
///
/// let info = client.get_info().await?;
/// println!("Daemon version: {}", info.version);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct KioskClient {
    client: Client,
    /// Client without a total request timeout, for the event stream
    stream_client: Client,
    base_url: String,
    max_retries: u32,
    retry_delay: Duration,
}

impl KioskClient {
    /// Create a new client with custom configuration.
    ///
    /// # Arguments
    ///
    /// * `server_url` - Base URL of the daemon (e.g., "http://localhost:3080")
    /// * `timeout_secs` - Request timeout in seconds
    /// * `max_retries` - Maximum number of retry attempts for failed requests
    /// * `retry_delay` - Initial delay between retries
    pub fn with_config(
        server_url: String,
        timeout_secs: u64,
        max_retries: u32,
        retry_delay: Duration,
    ) -> Result<Self> {
        let user_agent = concat!("kioskctl/", env!("CARGO_PKG_VERSION"));

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        let stream_client = Client::builder()
            .connect_timeout(Duration::from_secs(timeout_secs))
            .user_agent(user_agent)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            stream_client,
            base_url: normalize_url(&server_url),
            max_retries,
            retry_delay,
        })
    }

    /// Base URL requests are sent to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/v0/{}", self.base_url, path)
    }

    /// Process an HTTP response and extract the API data.
    ///
    /// Error bodies produced by the daemon carry a message and a
    /// machine-readable code; both end up in the returned error.
    async fn handle_response<T: DeserializeOwned>(response: Response, endpoint: &str) -> Result<T> {
        let status = response.status();
        let text = response
            .text()
            .await
            .with_context(|| format!("Failed to read response body from {}", endpoint))?;

        if !status.is_success() {
            if let Ok(api::ApiResponse::<serde_json::Value>::Error { error, code }) =
                serde_json::from_str(&text)
            {
                return Err(server_error(endpoint, status, &error, code.as_deref()));
            }

            let error_msg = match status {
                StatusCode::NOT_FOUND => format!("Endpoint {} not found", endpoint),
                StatusCode::BAD_REQUEST => format!("Bad request to {}: {}", endpoint, text),
                StatusCode::UNPROCESSABLE_ENTITY => {
                    format!("Malformed request to {}: {}", endpoint, text)
                }
                StatusCode::INTERNAL_SERVER_ERROR => {
                    format!("Server error at {}: {}", endpoint, text)
                }
                StatusCode::SERVICE_UNAVAILABLE => format!("Service unavailable at {}", endpoint),
                _ => format!("HTTP {} error at {}: {}", status, endpoint, text),
            };
            return Err(anyhow::anyhow!(error_msg));
        }

        let api_response: api::ApiResponse<T> = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse JSON response from {}", endpoint))?;

        match api_response {
            api::ApiResponse::Success { data } => Ok(data),
            api::ApiResponse::Error { error, code } => {
                Err(server_error(endpoint, status, &error, code.as_deref()))
            }
        }
    }

    /// Execute an HTTP request with automatic retry logic.
    ///
    /// Only connection-level failures are retried. The delay before attempt
    /// `n` is `retry_delay * n`.
    async fn execute_with_retry<F, Fut, T>(&self, endpoint: &str, request_fn: F) -> Result<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<Response, reqwest::Error>>,
        T: DeserializeOwned,
    {
        let mut last_error = None;

        for attempt in 0..=self.max_retries {
            match request_fn().await {
                Ok(response) => {
                    return Self::handle_response(response, endpoint).await;
                }
                Err(e) => {
                    let should_retry = e.is_connect() || e.is_timeout() || e.is_request();
                    last_error = Some(e);

                    if attempt < self.max_retries && should_retry {
                        tokio::time::sleep(self.retry_delay * (attempt + 1)).await;
                        continue;
                    } else {
                        break;
                    }
                }
            }
        }

        let reason = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        Err(anyhow::anyhow!(
            "Failed to reach {} after {} attempts: {}",
            endpoint,
            self.max_retries + 1,
            reason
        ))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.url(path);
        self.execute_with_retry(path, || self.client.get(&url).send())
            .await
    }

    async fn get_for_port<T: DeserializeOwned>(&self, path: &str, port: &str) -> Result<T> {
        let url = self.url(path);
        self.execute_with_retry(path, || {
            self.client.get(&url).query(&[("port", port)]).send()
        })
        .await
    }

    async fn post<B, T>(&self, path: &str, body: &B) -> Result<T>
    where
        B: serde::Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.execute_with_retry(path, || self.client.post(&url).json(body).send())
            .await
    }

    /// Retrieve daemon information: version, mock mode, uptime and sessions.
    pub async fn get_info(&self) -> Result<InfoResponse> {
        self.get("info").await
    }

    /// Ports currently visible for a sensor class, adapter aliases included.
    pub async fn list_ports(&self, class: SensorClass) -> Result<PortsResponse> {
        self.get(&format!("sensor/{}/ports", class)).await
    }

    /// Rescan attached devices and return the fresh port list of a class.
    pub async fn refresh_ports(&self, class: SensorClass) -> Result<PortsResponse> {
        self.post(&format!("sensor/{}/ports/refresh", class), &serde_json::json!({}))
            .await
    }

    /// Start a session on a port.
    ///
    /// The returned snapshot is `permission_pending` when the daemon is still
    /// waiting for an access grant on the device.
    pub async fn start_session(
        &self,
        class: SensorClass,
        port: &str,
        level: Option<i32>,
    ) -> Result<SessionInfo> {
        let request = StartRequest {
            port: port.to_string(),
            level,
        };
        self.post(&format!("sensor/{}/start", class), &request)
            .await
    }

    /// Close the session of a class.
    pub async fn stop_session(&self, class: SensorClass) -> Result<SessionInfo> {
        self.post(&format!("sensor/{}/stop", class), &serde_json::json!({}))
            .await
    }

    /// Snapshot of both class sessions.
    pub async fn list_sessions(&self) -> Result<SessionsResponse> {
        self.get("sessions").await
    }

    /// Ask for access to the device behind a port.
    pub async fn request_permission(&self, port: &str) -> Result<PermissionResponse> {
        self.post("permission", &port_request(port)).await
    }

    /// Re-detect multi-port adapter aliases.
    pub async fn detect_ports(&self) -> Result<DetectResponse> {
        self.post("ports/detect", &serde_json::json!({})).await
    }

    /// Serial ports the vendor SDK can see, open or not.
    pub async fn com_list(&self) -> Result<ComListResponse> {
        self.get("light/com-list").await
    }

    pub async fn is_port_open(&self, port: &str) -> Result<PortOpenResponse> {
        self.get_for_port("light/port/open", port).await
    }

    /// Open a port directly. A zero baud rate lets the SDK choose.
    pub async fn open_port(&self, port: &str, baud_rate: u32) -> Result<VendorCodeResponse> {
        let request = OpenPortRequest {
            port: port.to_string(),
            baud_rate,
        };
        self.post("light/port/open", &request).await
    }

    pub async fn close_port(&self, port: &str) -> Result<VendorCodeResponse> {
        self.post("light/port/close", &port_request(port)).await
    }

    /// Set the colour of a light on an already open port.
    pub async fn set_color(&self, port: &str, color: LedColor) -> Result<VendorCodeResponse> {
        self.post("light/color", &color_request(port, color)).await
    }

    /// Open, set the colour and close in one call.
    pub async fn show_color(&self, port: &str, color: LedColor) -> Result<VendorCodeResponse> {
        self.post("light/show-color", &color_request(port, color))
            .await
    }

    pub async fn flash(&self, port: &str) -> Result<VendorCodeResponse> {
        self.post("light/flash", &port_request(port)).await
    }

    pub async fn smooth(&self, port: &str) -> Result<VendorCodeResponse> {
        self.post("light/smooth", &port_request(port)).await
    }

    pub async fn stop_light(&self, port: &str) -> Result<VendorCodeResponse> {
        self.post("light/stop", &port_request(port)).await
    }

    pub async fn breathe(&self, port: &str, pattern: u32) -> Result<VendorCodeResponse> {
        let request = BreatheRequest {
            port: port.to_string(),
            pattern,
        };
        self.post("light/breathe", &request).await
    }

    /// Raw status buffer of a light.
    pub async fn raw_status(&self, port: &str) -> Result<RawStatusResponse> {
        self.get_for_port("light/status", port).await
    }

    /// Decoded colour channels and mode of a light.
    pub async fn parsed_status(&self, port: &str) -> Result<LightStatus> {
        self.get_for_port("light/status/parsed", port).await
    }

    pub async fn firmware_version(&self, port: &str) -> Result<FirmwareResponse> {
        self.get_for_port("light/firmware", port).await
    }

    /// Follow the daemon's notification stream.
    ///
    /// `on_event` is called for every notification until it returns
    /// [`ControlFlow::Break`] or the server closes the stream. Events that do
    /// not decode as a notification are skipped.
    pub async fn stream_events<F>(&self, mut on_event: F) -> Result<()>
    where
        F: FnMut(Notification) -> ControlFlow<()>,
    {
        let endpoint = "events";
        let mut response = self
            .stream_client
            .get(self.url(endpoint))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .with_context(|| format!("Failed to connect to {}", endpoint))?;

        let status = response.status();
        if !status.is_success() {
            return Err(anyhow::anyhow!("HTTP {} error at {}", status, endpoint));
        }

        let mut decoder = SseDecoder::default();
        while let Some(chunk) = response
            .chunk()
            .await
            .with_context(|| format!("Event stream from {} interrupted", endpoint))?
        {
            for event in decoder.push(&chunk) {
                let Ok(notification) = serde_json::from_str::<Notification>(&event.data) else {
                    continue;
                };
                if on_event(notification).is_break() {
                    return Ok(());
                }
            }
        }

        Ok(())
    }
}

fn port_request(port: &str) -> PortRequest {
    PortRequest {
        port: port.to_string(),
    }
}

fn color_request(port: &str, color: LedColor) -> LedColorRequest {
    LedColorRequest {
        port: port.to_string(),
        color,
    }
}

fn server_error(endpoint: &str, status: StatusCode, message: &str, code: Option<&str>) -> anyhow::Error {
    match code {
        Some(code) => anyhow::anyhow!("{} failed ({}, {}): {}", endpoint, status, code, message),
        None => anyhow::anyhow!("{} failed ({}): {}", endpoint, status, message),
    }
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    /// Value of the `event:` field, if present
    pub event: Option<String>,
    /// `data:` lines joined with newlines
    pub data: String,
}

/// Incremental decoder for a `text/event-stream` body.
///
/// Chunks may split events (or UTF-8 sequences) at any byte; complete events
/// are returned as soon as their terminating blank line arrives.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buf: Vec<u8>,
}

impl SseDecoder {
    /// Feed a chunk and collect every event it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(pos) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buf.drain(..pos + 2).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block[..pos])) {
                events.push(event);
            }
        }
        events
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data = Vec::new();

    for line in block.lines() {
        // Comment lines carry keep-alives
        if line.is_empty() || line.starts_with(':') {
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event,
        data: data.join("\n"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::MockServer;
    use kiosk_core::{SensorStatus, SessionPhase};

    fn client_for(url: &str) -> KioskClient {
        KioskClient::with_config(url.to_string(), 5, 0, Duration::from_millis(10)).unwrap()
    }

    #[test]
    fn test_normalize_url() {
        assert_eq!(
            normalize_url("http://localhost:3080"),
            "http://localhost:3080"
        );
        assert_eq!(
            normalize_url("http://localhost:3080/"),
            "http://localhost:3080"
        );
        assert_eq!(
            normalize_url("http://localhost:3080///"),
            "http://localhost:3080"
        );
    }

    #[test]
    fn test_sse_decoder_split_chunks() {
        let mut decoder = SseDecoder::default();

        assert!(decoder.push(b"event: sensor_stopped\nda").is_empty());
        let events = decoder.push(b"ta: {\"event\":\"sensor_stopped\",\"class\":\"light\"}\n\n");

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].event.as_deref(), Some("sensor_stopped"));
        assert!(events[0].data.contains("light"));
    }

    #[test]
    fn test_sse_decoder_skips_keepalive_and_handles_crlf() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b":\n\nevent: device_attached\r\ndata: {}\r\n\r\n");

        assert_eq!(
            events,
            vec![SseEvent {
                event: Some("device_attached".to_string()),
                data: "{}".to_string(),
            }]
        );
    }

    #[test]
    fn test_sse_decoder_multiline_data() {
        let mut decoder = SseDecoder::default();
        let events = decoder.push(b"data: a\ndata: b\n\n");
        assert_eq!(events[0].data, "a\nb");
        assert!(events[0].event.is_none());
    }

    #[tokio::test]
    async fn test_get_info() {
        let (_server, url) = MockServer::new().start().await.unwrap();
        let info = client_for(&url).get_info().await.unwrap();

        assert_eq!(info.version, "1.0.0-test");
        assert!(info.mock_mode);
        assert_eq!(info.sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_start_and_stop_session() {
        let (server, url) = MockServer::new().start().await.unwrap();
        let client = client_for(&url);

        let ports = client.list_ports(SensorClass::Presence).await.unwrap();
        assert_eq!(ports.ports, vec!["/dev/ttyUSB0", "SerialCOM1"]);

        let session = client
            .start_session(SensorClass::Presence, "/dev/ttyUSB0", Some(3))
            .await
            .unwrap();
        assert_eq!(session.phase, SessionPhase::Open);
        assert_eq!(session.level, Some(3));
        assert_eq!(
            server.state().started(SensorClass::Presence).as_deref(),
            Some("/dev/ttyUSB0")
        );

        let session = client.stop_session(SensorClass::Presence).await.unwrap();
        assert_eq!(session.phase, SessionPhase::Closed);
    }

    #[tokio::test]
    async fn test_error_body_carries_code() {
        let (_server, url) = MockServer::new().start().await.unwrap();
        let err = client_for(&url)
            .start_session(SensorClass::Light, "/dev/ttyNOPE", None)
            .await
            .unwrap_err()
            .to_string();

        assert!(err.contains("DEVICE_NOT_FOUND"), "{}", err);
        assert!(err.contains("404"), "{}", err);
    }

    #[tokio::test]
    async fn test_light_commands() {
        let (_server, url) = MockServer::new().start().await.unwrap();
        let client = client_for(&url);

        let result = client
            .show_color("/dev/ttyUSB1", LedColor::default())
            .await
            .unwrap();
        assert_eq!(result.code, 0);

        let status = client.parsed_status("/dev/ttyUSB1").await.unwrap();
        assert_eq!(status.red, 200);

        let open = client.is_port_open("SerialCOM1").await.unwrap();
        assert_eq!(open.port, "SerialCOM1");
    }

    #[tokio::test]
    async fn test_stream_events_until_break() {
        let (_server, url) = MockServer::new().start().await.unwrap();
        let client = client_for(&url);

        let mut seen = Vec::new();
        client
            .stream_events(|notification| {
                seen.push(notification);
                if seen.len() == 2 {
                    ControlFlow::Break(())
                } else {
                    ControlFlow::Continue(())
                }
            })
            .await
            .unwrap();

        assert_eq!(seen.len(), 2);
        assert_eq!(
            seen[0],
            Notification::SensorStarted {
                class: SensorClass::Presence,
                port: "/dev/ttyUSB0".to_string(),
            }
        );
        match &seen[1] {
            Notification::SensorUpdate { reading, .. } => {
                assert_eq!(reading.value, 16);
                assert_eq!(reading.status, SensorStatus::Far);
            }
            other => panic!("unexpected notification {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_unreachable_server_reports_attempts() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = KioskClient::with_config(
            format!("http://127.0.0.1:{}", port),
            1,
            1,
            Duration::from_millis(10),
        )
        .unwrap();

        let err = client.get_info().await.unwrap_err().to_string();
        assert!(err.contains("after 2 attempts"), "{}", err);
    }
}

//! Server-sent event stream of session notifications

use crate::api::AppState;
use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
};
use futures_util::stream::{self, Stream};
use kiosk_core::Notification;
use std::convert::Infallible;
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};

fn to_event(notification: &Notification) -> Option<Event> {
    match Event::default()
        .event(notification.name())
        .json_data(notification)
    {
        Ok(event) => Some(event),
        Err(e) => {
            warn!("Failed to encode {} event: {}", notification.name(), e);
            None
        }
    }
}

/// Turn a notification subscription into an SSE stream.
///
/// A subscriber that falls behind skips the notifications it missed.
pub(crate) fn notification_stream(
    rx: broadcast::Receiver<Notification>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(notification) => {
                    if let Some(event) = to_event(&notification) {
                        return Some((Ok(event), rx));
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Event subscriber lagged, {} notifications dropped", skipped);
                }
                Err(RecvError::Closed) => {
                    debug!("Notification channel closed, ending event stream");
                    return None;
                }
            }
        }
    })
}

/// Stream notifications as server-sent events.
///
/// Each event is named after the notification (`sensor_update`, ...) and
/// carries its JSON encoding.
///
/// # Endpoint
///
/// `GET /api/v0/events`
pub async fn stream(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    debug!("Request: GET /api/v0/events");

    Sse::new(notification_stream(state.session.subscribe())).keep_alive(KeepAlive::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_support::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use futures_util::StreamExt;
    use http_body_util::BodyExt;
    use kiosk_core::SensorClass;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_stream_yields_notifications() {
        let (tx, rx) = broadcast::channel(8);
        let stream = notification_stream(rx);
        futures_util::pin_mut!(stream);

        tx.send(Notification::DeviceAttached).unwrap();
        tx.send(Notification::SensorStopped {
            class: SensorClass::Light,
        })
        .unwrap();
        drop(tx);

        let mut count = 0;
        while let Some(event) = stream.next().await {
            assert!(event.is_ok());
            count += 1;
        }
        assert_eq!(count, 2);
    }

    #[tokio::test]
    async fn test_lagged_subscriber_continues() {
        let (tx, rx) = broadcast::channel(2);
        let stream = notification_stream(rx);
        futures_util::pin_mut!(stream);

        for _ in 0..5 {
            tx.send(Notification::DeviceAttached).unwrap();
        }
        drop(tx);

        let remaining = stream.collect::<Vec<_>>().await;
        assert_eq!(remaining.len(), 2);
    }

    #[tokio::test]
    async fn test_events_endpoint() {
        let app = create_test_app();

        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/api/v0/events")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers()["content-type"],
            "text/event-stream"
        );

        app.state.session.refresh_ports(SensorClass::Presence).await.unwrap();

        let mut body = response.into_body();
        let frame = body.frame().await.unwrap().unwrap();
        let text = String::from_utf8(frame.into_data().unwrap().to_vec()).unwrap();
        assert!(text.contains("event: ports_updated"));
        assert!(text.contains("\"class\":\"presence\""));
    }
}

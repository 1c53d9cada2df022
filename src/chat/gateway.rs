//! HTTP intake for chat messages relayed from a gateway connection.
//!
//! `POST /events` takes one [`IncomingMessage`] as JSON and answers
//! `202 Accepted` once it is queued for the registration bot. When a secret
//! is configured the caller must send it in the `x-relay-secret` header.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use log::{debug, error, info};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use super::{ChatEvent, IncomingMessage};

pub const SECRET_HEADER: &str = "x-relay-secret";

#[derive(Clone)]
struct GatewayState {
    events: mpsc::Sender<ChatEvent>,
    secret: Option<Arc<str>>,
}

pub fn router(events: mpsc::Sender<ChatEvent>, secret: Option<String>) -> Router {
    let state = GatewayState {
        events,
        secret: secret.map(Arc::from),
    };
    Router::new()
        .route("/healthz", get(health))
        .route("/events", post(post_event))
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}

async fn post_event(
    State(state): State<GatewayState>,
    headers: HeaderMap,
    Json(message): Json<IncomingMessage>,
) -> StatusCode {
    if let Some(secret) = &state.secret {
        let presented = headers
            .get(SECRET_HEADER)
            .and_then(|value| value.to_str().ok());
        if presented != Some(secret.as_ref()) {
            debug!("Rejected event without a valid {} header", SECRET_HEADER);
            return StatusCode::UNAUTHORIZED;
        }
    }

    match state.events.send(ChatEvent::Message(message)).await {
        Ok(()) => StatusCode::ACCEPTED,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

pub fn spawn_http_gateway(
    bind: SocketAddr,
    events: mpsc::Sender<ChatEvent>,
    secret: Option<String>,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    let app = router(events, secret);
    tokio::spawn(async move {
        let listener = match tokio::net::TcpListener::bind(bind).await {
            Ok(listener) => listener,
            Err(e) => {
                error!("Event gateway could not bind {}: {}", bind, e);
                return;
            }
        };
        info!("Event gateway listening on http://{}", bind);
        let served = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.changed().await;
            })
            .await;
        if let Err(e) = served {
            error!("Event gateway failed: {}", e);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    const BODY: &str = r#"{"author_id":"653638788026990593","author_name":"cookies","channel_id":"1","content":"!register"}"#;

    fn event_request(secret: Option<&str>) -> Request<Body> {
        let mut builder = Request::post("/events").header("content-type", "application/json");
        if let Some(secret) = secret {
            builder = builder.header(SECRET_HEADER, secret);
        }
        builder.body(Body::from(BODY)).unwrap()
    }

    #[tokio::test]
    async fn test_event_is_forwarded() {
        let (tx, mut rx) = mpsc::channel(4);
        let response = router(tx, None).oneshot(event_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let ChatEvent::Message(message) = rx.recv().await.unwrap();
        assert_eq!(message.author_id, "653638788026990593");
        assert_eq!(message.content, "!register");
    }

    #[tokio::test]
    async fn test_secret_is_enforced() {
        let (tx, mut rx) = mpsc::channel(4);
        let app = router(tx, Some("s3cret".to_string()));

        let missing = app.clone().oneshot(event_request(None)).await.unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);
        let wrong = app.clone().oneshot(event_request(Some("nope"))).await.unwrap();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
        assert!(rx.try_recv().is_err());

        let ok = app.oneshot(event_request(Some("s3cret"))).await.unwrap();
        assert_eq!(ok.status(), StatusCode::ACCEPTED);
        assert!(rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_closed_bot_is_unavailable() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let response = router(tx, None).oneshot(event_request(None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}

//! HTTP routes
//!
//! The stream route turns a request into a registered connection whose
//! response body is fed by a dispatcher task. Trigger routes publish a fixed
//! message to the connection named by `?id=`.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{ConnectInfo, Query, State};
use axum::http::{header, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use serde::Deserialize;
use tokio::sync::{OwnedSemaphorePermit, Semaphore, TryAcquireError};
use tokio_util::io::ReaderStream;

use crate::dispatch::StreamDispatcher;
use crate::publisher::Publisher;
use crate::registry::{ConnectionId, ConnectionRegistry};

use super::config::ServerConfig;

/// Response header carrying the ID a client uses to address its stream
pub const CONNECTION_ID_HEADER: &str = "x-connection-id";

/// Shared state for all routes
pub(crate) struct AppState {
    pub(crate) registry: Arc<ConnectionRegistry>,
    pub(crate) dispatcher: StreamDispatcher,
    pub(crate) publisher: Publisher,
    pub(crate) stream_buffer_size: usize,
    pub(crate) connection_semaphore: Option<Arc<Semaphore>>,
}

impl AppState {
    fn try_acquire_permit(&self) -> Result<Option<OwnedSemaphorePermit>, TryAcquireError> {
        match self.connection_semaphore {
            Some(ref sem) => Arc::clone(sem).try_acquire_owned().map(Some),
            None => Ok(None),
        }
    }
}

/// Query string of a trigger request
#[derive(Debug, Deserialize)]
pub struct TargetQuery {
    /// Connection to deliver to
    pub id: Option<u64>,
}

/// Build the router for the stream and trigger routes
pub(crate) fn build_router(state: Arc<AppState>, config: &ServerConfig) -> Router {
    let mut router: Router<Arc<AppState>> =
        Router::new().route(&config.stream_path, get(stream_handler));

    for trigger in &config.triggers {
        let message: Arc<str> = Arc::from(trigger.message.as_str());
        let handler = move |State(state): State<Arc<AppState>>,
                            Query(target): Query<TargetQuery>| {
            let message = Arc::clone(&message);
            async move { trigger_handler(state, target, message).await }
        };

        router = router.route(&trigger.path, get(handler.clone()).post(handler));
    }

    router.with_state(state)
}

async fn stream_handler(
    State(state): State<Arc<AppState>>,
    peer: Option<ConnectInfo<SocketAddr>>,
) -> Response {
    let permit = match state.try_acquire_permit() {
        Ok(permit) => permit,
        Err(_) => {
            tracing::warn!("Stream rejected: connection limit reached");
            return (StatusCode::SERVICE_UNAVAILABLE, "connection limit reached").into_response();
        }
    };

    let registration = state.registry.register();
    let id = registration.id();
    let (writer, reader) = tokio::io::duplex(state.stream_buffer_size);

    tracing::debug!(
        connection_id = %id,
        peer = ?peer.map(|ConnectInfo(addr)| addr),
        "Stream opened"
    );

    let dispatcher = state.dispatcher.clone();
    tokio::spawn(async move {
        let _permit = permit;
        dispatcher.run(registration, writer).await;
    });

    let headers = [
        (header::CONTENT_TYPE, HeaderValue::from_static("text/event-stream")),
        (header::CACHE_CONTROL, HeaderValue::from_static("no-cache")),
        (header::CONNECTION, HeaderValue::from_static("keep-alive")),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, HeaderValue::from_static("*")),
        (
            HeaderName::from_static(CONNECTION_ID_HEADER),
            HeaderValue::from(id.as_u64()),
        ),
    ];

    (headers, Body::from_stream(ReaderStream::new(reader))).into_response()
}

async fn trigger_handler(
    state: Arc<AppState>,
    target: TargetQuery,
    message: Arc<str>,
) -> Response {
    let Some(id) = target.id.map(ConnectionId::from) else {
        return (StatusCode::BAD_REQUEST, "missing connection id").into_response();
    };

    match state.publisher.publish(id, &*message).await {
        Ok(outcome) => {
            tracing::debug!(connection_id = %id, outcome = ?outcome, "Trigger handled");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, Request};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;
    use crate::server::SseServer;

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn open_stream(app: &Router) -> (u64, Body) {
        let response = app.clone().oneshot(get_request("/stream")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let id = response.headers()[CONNECTION_ID_HEADER]
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        (id, response.into_body())
    }

    async fn next_frame(body: &mut Body) -> bytes::Bytes {
        body.frame().await.unwrap().unwrap().into_data().unwrap()
    }

    #[tokio::test]
    async fn test_stream_headers() {
        let server = SseServer::new(ServerConfig::default()).unwrap();
        let app = server.router();

        let response = app.oneshot(get_request("/stream")).await.unwrap();
        let headers = response.headers();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(headers.contains_key(CONNECTION_ID_HEADER));
    }

    #[tokio::test]
    async fn test_trigger_delivers_to_stream() {
        let server = SseServer::new(ServerConfig::default()).unwrap();
        let app = server.router();

        let (id, mut body) = open_stream(&app).await;

        let response = app
            .clone()
            .oneshot(get_request(&format!("/right?id={}", id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(&next_frame(&mut body).await[..], b"data: right\n\n");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri(format!("/send?id={}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(
            &next_frame(&mut body).await[..],
            b"data: you can put json in here as the data\n\n"
        );
    }

    #[tokio::test]
    async fn test_trigger_targets_only_named_stream() {
        let server = SseServer::new(ServerConfig::default()).unwrap();
        let app = server.router();

        let (first, mut first_body) = open_stream(&app).await;
        let (second, mut second_body) = open_stream(&app).await;
        assert_ne!(first, second);

        app.clone()
            .oneshot(get_request(&format!("/left?id={}", second)))
            .await
            .unwrap();
        app.clone()
            .oneshot(get_request(&format!("/right?id={}", first)))
            .await
            .unwrap();

        assert_eq!(&next_frame(&mut second_body).await[..], b"data: left\n\n");
        assert_eq!(&next_frame(&mut first_body).await[..], b"data: right\n\n");
    }

    #[tokio::test]
    async fn test_trigger_without_subscriber() {
        let server = SseServer::new(ServerConfig::default()).unwrap();

        let response = server
            .router()
            .oneshot(get_request("/left?id=4242"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(server.stats().messages_dropped, 1);
    }

    #[tokio::test]
    async fn test_trigger_missing_id() {
        let server = SseServer::new(ServerConfig::default()).unwrap();

        let response = server.router().oneshot(get_request("/left")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = server
            .router()
            .oneshot(get_request("/left?id=abc"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_custom_trigger() {
        let config = ServerConfig::default().triggers(vec![]).trigger("/ping", "pong");
        let server = SseServer::new(config).unwrap();
        let app = server.router();

        let (id, mut body) = open_stream(&app).await;
        app.clone()
            .oneshot(get_request(&format!("/ping?id={}", id)))
            .await
            .unwrap();
        assert_eq!(&next_frame(&mut body).await[..], b"data: pong\n\n");

        let response = app.oneshot(get_request("/left?id=1")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_connection_limit() {
        let server = SseServer::new(ServerConfig::default().max_connections(1)).unwrap();
        let app = server.router();

        let (_id, _body) = open_stream(&app).await;

        let response = app.clone().oneshot(get_request("/stream")).await.unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(server.registry().connection_count(), 1);
    }

    #[tokio::test]
    async fn test_dropped_body_deregisters() {
        let server = SseServer::new(ServerConfig::default()).unwrap();
        let app = server.router();

        let (id, body) = open_stream(&app).await;
        let id = ConnectionId::from(id);
        assert!(server.registry().contains(id));

        // Client goes away; the next write fails and the loop exits
        drop(body);
        let outcome = server.publisher().publish(id, "bye").await.unwrap();
        assert_eq!(outcome, crate::publisher::PublishOutcome::Delivered);

        for _ in 0..100 {
            if !server.registry().contains(id) {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(!server.registry().contains(id));
    }
}

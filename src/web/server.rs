//! HTTP gateway and WebSocket listeners

use axum::http::{header, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

use crate::audio::SharedRingBuffer;
use crate::config::AppConfig;
use crate::hub::{CommandDispatch, Hub};
use crate::recordings::RecordingRegistry;
use crate::state::BridgeState;
use crate::web::{handlers, media, websocket};

/// Shared state for route handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub ring: SharedRingBuffer,
    pub registry: Arc<RecordingRegistry>,
    pub state: Arc<BridgeState>,
    pub hub: Arc<Hub>,
    pub commands: Arc<dyn CommandDispatch>,
    pub shutdown: CancellationToken,
}

/// Every response, preflight included, allows any origin
fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
        .expose_headers([header::CONTENT_RANGE, header::ACCEPT_RANGES, header::CONTENT_LENGTH])
}

/// Routes of the media gateway
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/index.html", get(handlers::index))
        .route("/config.json", get(handlers::config_json))
        .route("/status", get(handlers::status))
        .route("/command", get(handlers::command))
        .route("/api/recordings", get(handlers::list_recordings))
        .route("/live.wav", get(media::live_stream))
        .route("/media/audio/:key", get(media::recording_media))
        .route("/vlc/audio/:file", get(handlers::playlist))
        .fallback(handlers::fallback)
        .layer(cors_layer())
        .with_state(state)
}

/// Routes of the WebSocket port
pub fn ws_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(websocket::ws_upgrade))
        .route("/ws", get(websocket::ws_upgrade))
        .layer(cors_layer())
        .with_state(state)
}

/// Serve `app` until `shutdown` fires
pub async fn serve(
    listener: TcpListener,
    app: Router,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}

/// Plain-text error body
pub fn text_error(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        message.into(),
    )
        .into_response()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::audio::create_shared_buffer;
    use crate::hub::tests::RecordingDispatch;
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    pub(crate) fn test_state() -> AppState {
        let mut config = AppConfig::default();
        config.network.device_ip = "10.0.0.7".into();
        let registry = Arc::new(RecordingRegistry::new());
        let state = Arc::new(BridgeState::new());
        let commands: Arc<dyn CommandDispatch> = Arc::new(RecordingDispatch::default());
        let hub = Arc::new(Hub::new(registry.clone(), state.clone(), commands.clone()));
        AppState {
            config: Arc::new(config),
            ring: create_shared_buffer(64 * 1024),
            registry,
            state,
            hub,
            commands,
            shutdown: CancellationToken::new(),
        }
    }

    pub(crate) async fn send(app: Router, request: Request<Body>) -> (StatusCode, axum::http::HeaderMap, Vec<u8>) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes().to_vec();
        (status, headers, body)
    }

    pub(crate) fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_unknown_path_is_informational_200() {
        let (status, headers, body) = send(router(test_state()), get("/nope")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(String::from_utf8(body).unwrap().contains("/live.wav"));
    }

    #[tokio::test]
    async fn test_options_preflight_is_empty_200() {
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/media/audio/x")
            .body(Body::empty())
            .unwrap();
        let (status, headers, body) = send(router(test_state()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_error_responses_carry_cors() {
        let (status, headers, _) = send(router(test_state()), get("/media/audio/missing")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}

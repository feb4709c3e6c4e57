//! HTTP API handlers

use axum::extract::{Path as UrlPath, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use serde::{Deserialize, Serialize};

use crate::error::CommandError;
use crate::protocol::messages::device_action;
use crate::protocol::ServerMessage;
use crate::recordings::Recording;
use crate::state::StatusSnapshot;
use crate::web::server::{text_error, AppState};

const INDEX_HTML: &str = include_str!("../../assets/index.html");

/// Unreserved characters stay literal in playlist URLs
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// `GET /` and `/index.html`
pub async fn index(State(app): State<AppState>) -> Response {
    match &app.config.ui.index_path {
        None => Html(INDEX_HTML).into_response(),
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(page) => Html(page).into_response(),
            Err(e) => {
                tracing::warn!("Cannot read index page {}: {}", path.display(), e);
                text_error(StatusCode::NOT_FOUND, "Asset Not Found")
            }
        },
    }
}

/// Client bootstrap values
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientConfig {
    pub http_port: u16,
    pub ws_port: u16,
    pub device_ip: String,
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

/// `GET /config.json`
pub async fn config_json(State(app): State<AppState>) -> Json<ClientConfig> {
    let config = &app.config;
    Json(ClientConfig {
        http_port: config.network.http_port,
        ws_port: config.network.ws_port,
        device_ip: config.network.device_ip.clone(),
        sample_rate: config.audio.sample_rate,
        channels: config.audio.channels,
        bits_per_sample: config.audio.bits_per_sample,
    })
}

/// `GET /status`
pub async fn status(State(app): State<AppState>) -> Json<StatusSnapshot> {
    Json(app.state.snapshot(&app.config.network.device_ip))
}

/// `GET /api/recordings`
pub async fn list_recordings(State(app): State<AppState>) -> Json<Vec<Recording>> {
    Json(app.registry.list_all())
}

#[derive(Debug, Default, Deserialize)]
pub struct CommandQuery {
    val: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
}

/// `GET /command?val=<ACTION>`
pub async fn command(State(app): State<AppState>, Query(query): Query<CommandQuery>) -> Response {
    let action = query.val.or(query.kind).unwrap_or_default();
    let action = action.trim();
    if action.is_empty() {
        return text_error(StatusCode::BAD_REQUEST, "Missing command value");
    }

    let payload = device_action(action);
    match app.commands.dispatch(&payload) {
        Ok(()) => {
            tracing::info!("HTTP -> UDP: {}", payload);
            app.state.record_message(&format!("HTTP -> UDP: {}", payload));
            app.hub
                .broadcast(&ServerMessage::Msg(format!("HTTP sent {}", payload)));
            (StatusCode::OK, format!("OK: {}", payload)).into_response()
        }
        Err(CommandError::NoRemote) => {
            text_error(StatusCode::SERVICE_UNAVAILABLE, "No remote device IP configured")
        }
        Err(e) => {
            tracing::warn!("Command {} failed: {}", payload, e);
            text_error(StatusCode::SERVICE_UNAVAILABLE, format!("Command failed: {}", e))
        }
    }
}

/// `GET /vlc/audio/:file`: M3U playlist pointing at the media route
pub async fn playlist(
    State(app): State<AppState>,
    UrlPath(file): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    let Some(key) = file.strip_suffix(".m3u") else {
        return text_error(StatusCode::BAD_REQUEST, "Playlist path must end in .m3u");
    };
    let Some(recording) = app.registry.find_by_id_or_name(key) else {
        return text_error(StatusCode::NOT_FOUND, format!("Recording not found: {}", key));
    };

    let host = headers
        .get(header::HOST)
        .and_then(|h| h.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| format!("127.0.0.1:{}", app.config.network.http_port));
    let url = format!(
        "http://{}/media/audio/{}",
        host,
        utf8_percent_encode(&recording.id, PATH_SEGMENT)
    );
    let body = format!("#EXTM3U\n#EXTINF:-1,{}\n{}\n", recording.name, url);

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "audio/x-mpegurl")],
        body,
    )
        .into_response()
}

/// Any other path: informational route listing
pub async fn fallback() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "Gateway Active\n\
         GET /\n\
         GET /config.json\n\
         GET /status\n\
         GET /command?val=<ACTION>\n\
         GET /api/recordings\n\
         GET /live.wav\n\
         GET /media/audio/<id>\n\
         GET /vlc/audio/<id>.m3u\n",
    )
}

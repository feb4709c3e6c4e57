//! Live WAV stream and range-aware recording downloads

use axum::body::Body;
use axum::extract::{Path as UrlPath, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures_util::{stream, StreamExt};
use std::io::SeekFrom;
use std::path::Path;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::audio::{wav, ReaderCursor, SharedRingBuffer};
use crate::constants::LIVE_READ_CHUNK;
use crate::web::server::{text_error, AppState};

/// How a `Range` header applies to a file of known length
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByteRange {
    Full,
    /// Inclusive span
    Partial { start: u64, end: u64 },
    Unsatisfiable,
    Malformed,
}

impl ByteRange {
    pub fn span_len(&self) -> u64 {
        match *self {
            ByteRange::Partial { start, end } => end - start + 1,
            _ => 0,
        }
    }
}

/// Resolve a single `bytes=start-end` range against `file_len`.
/// Only the first range of a multi-range header is honored.
pub fn resolve_range(header: Option<&str>, file_len: u64) -> ByteRange {
    let Some(value) = header else {
        return ByteRange::Full;
    };
    let Some(spec) = value.trim().strip_prefix("bytes=") else {
        return ByteRange::Malformed;
    };
    let first = spec.split(',').next().unwrap_or_default().trim();
    let Some((start, end)) = first.split_once('-') else {
        return ByteRange::Malformed;
    };

    let start = match start.trim() {
        "" => 0,
        s => match s.parse::<u64>() {
            Ok(v) => v,
            Err(_) => return ByteRange::Malformed,
        },
    };
    let end = match end.trim() {
        "" => None,
        s => match s.parse::<u64>() {
            Ok(v) => Some(v),
            Err(_) => return ByteRange::Malformed,
        },
    };

    if start >= file_len {
        return ByteRange::Unsatisfiable;
    }
    let end = end.map_or(file_len - 1, |e| e.min(file_len - 1));
    if end < start {
        return ByteRange::Unsatisfiable;
    }
    ByteRange::Partial { start, end }
}

/// MIME type from the file extension
pub fn content_type_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("wav") => "audio/wav",
        Some("mp3") => "audio/mpeg",
        Some("m4a") => "audio/mp4",
        Some("aac") => "audio/aac",
        Some("ogg") => "audio/ogg",
        Some("opus") => "audio/opus",
        Some("flac") => "audio/flac",
        _ => "application/octet-stream",
    }
}

/// `GET /media/audio/:key`
pub async fn recording_media(
    State(app): State<AppState>,
    UrlPath(key): UrlPath<String>,
    headers: HeaderMap,
) -> Response {
    let Some(recording) = app.registry.find_by_id_or_name(&key) else {
        return text_error(StatusCode::NOT_FOUND, format!("Recording not found: {}", key));
    };
    let range = headers.get(header::RANGE).and_then(|v| v.to_str().ok());
    serve_file(&recording.path, range).await
}

/// Stream a file, honoring a single byte range
pub async fn serve_file(path: &Path, range: Option<&str>) -> Response {
    let mut file = match File::open(path).await {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return text_error(StatusCode::NOT_FOUND, "Recording file is missing");
        }
        Err(e) => {
            tracing::error!("Cannot open {}: {}", path.display(), e);
            return text_error(StatusCode::INTERNAL_SERVER_ERROR, "Cannot open recording");
        }
    };
    let file_len = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(e) => {
            tracing::error!("Cannot stat {}: {}", path.display(), e);
            return text_error(StatusCode::INTERNAL_SERVER_ERROR, "Cannot read recording");
        }
    };
    let content_type = content_type_for(path).to_string();

    match resolve_range(range, file_len) {
        ByteRange::Full => (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, content_type),
                (header::CONTENT_LENGTH, file_len.to_string()),
                (header::ACCEPT_RANGES, "bytes".to_string()),
            ],
            Body::from_stream(ReaderStream::new(file)),
        )
            .into_response(),
        span @ ByteRange::Partial { start, end } => {
            if let Err(e) = file.seek(SeekFrom::Start(start)).await {
                tracing::error!("Seek failed on {}: {}", path.display(), e);
                return text_error(StatusCode::INTERNAL_SERVER_ERROR, "Cannot read recording");
            }
            (
                StatusCode::PARTIAL_CONTENT,
                [
                    (header::CONTENT_TYPE, content_type),
                    (header::CONTENT_LENGTH, span.span_len().to_string()),
                    (header::ACCEPT_RANGES, "bytes".to_string()),
                    (header::CONTENT_RANGE, format!("bytes {}-{}/{}", start, end, file_len)),
                ],
                Body::from_stream(ReaderStream::new(file.take(span.span_len()))),
            )
                .into_response()
        }
        ByteRange::Unsatisfiable => (
            StatusCode::RANGE_NOT_SATISFIABLE,
            [(header::CONTENT_RANGE, format!("bytes */{}", file_len))],
        )
            .into_response(),
        ByteRange::Malformed => text_error(StatusCode::BAD_REQUEST, "Malformed Range header"),
    }
}

/// `GET /live.wav`: open-ended WAV fed from the ring buffer
pub async fn live_stream(State(app): State<AppState>) -> Response {
    let audio = &app.config.audio;
    let header_bytes = wav::streaming_header(audio.sample_rate, audio.channels, audio.bits_per_sample);

    // Cursor opens at the live edge before the first byte goes out
    let cursor = app.ring.open_reader(true);
    let wav_header = stream::iter([Ok::<_, std::io::Error>(Bytes::copy_from_slice(&header_bytes))]);
    let body = wav_header.chain(live_chunks(app.ring.clone(), cursor));

    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "audio/wav"),
            (header::CACHE_CONTROL, "no-store"),
        ],
        Body::from_stream(body),
    )
        .into_response()
}

/// Ring buffer bytes as a stream that ends when the buffer closes.
/// Dropping the stream (client gone) releases the cursor.
fn live_chunks(
    ring: SharedRingBuffer,
    cursor: ReaderCursor,
) -> impl futures_util::Stream<Item = std::io::Result<Bytes>> + Send + 'static {
    let buf = vec![0u8; LIVE_READ_CHUNK];
    stream::unfold((ring, cursor, buf), |(ring, mut cursor, mut buf)| async move {
        let Some(n) = ring.read_async(&mut cursor, &mut buf).await else {
            if cursor.skipped() > 0 {
                tracing::debug!("Live listener skipped {} bytes while lagging", cursor.skipped());
            }
            tracing::debug!("Live listener finished");
            return None;
        };
        let chunk = Bytes::copy_from_slice(&buf[..n]);
        Some((Ok(chunk), (ring, cursor, buf)))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::server::router;
    use crate::web::server::tests::{get, send, test_state};
    use axum::http::Request;
    use http_body_util::BodyExt;
    use std::time::Duration;
    use tower::ServiceExt;

    #[test]
    fn test_resolve_range() {
        assert_eq!(resolve_range(None, 100), ByteRange::Full);
        assert_eq!(resolve_range(Some("bytes=10-19"), 100), ByteRange::Partial { start: 10, end: 19 });
        assert_eq!(resolve_range(Some("bytes=90-"), 100), ByteRange::Partial { start: 90, end: 99 });
        assert_eq!(resolve_range(Some("bytes=0-500"), 100), ByteRange::Partial { start: 0, end: 99 });
        assert_eq!(resolve_range(Some("bytes=-20"), 100), ByteRange::Partial { start: 0, end: 20 });
        assert_eq!(resolve_range(Some("bytes=5-9, 20-30"), 100), ByteRange::Partial { start: 5, end: 9 });
        assert_eq!(resolve_range(Some("bytes=200-"), 100), ByteRange::Unsatisfiable);
        assert_eq!(resolve_range(Some("bytes=50-40"), 100), ByteRange::Unsatisfiable);
        assert_eq!(resolve_range(Some("bytes=0-"), 0), ByteRange::Unsatisfiable);
        assert_eq!(resolve_range(Some("items=0-1"), 100), ByteRange::Malformed);
        assert_eq!(resolve_range(Some("bytes=a-b"), 100), ByteRange::Malformed);
        assert_eq!(resolve_range(Some("bytes=7"), 100), ByteRange::Malformed);
    }

    #[test]
    fn test_content_type_for() {
        assert_eq!(content_type_for(Path::new("a.WAV")), "audio/wav");
        assert_eq!(content_type_for(Path::new("a.mp3")), "audio/mpeg");
        assert_eq!(content_type_for(Path::new("notes")), "application/octet-stream");
    }

    fn state_with_file(dir: &tempfile::TempDir) -> (AppState, String) {
        let path = dir.path().join("clip.wav");
        let content: Vec<u8> = (0..100u8).collect();
        std::fs::write(&path, content).unwrap();
        let app = test_state();
        let recording = app.registry.register(&path).unwrap();
        (app, recording.id)
    }

    fn ranged(uri: &str, range: &str) -> Request<Body> {
        Request::builder()
            .uri(uri)
            .header(header::RANGE, range)
            .body(Body::empty())
            .unwrap()
    }

    #[tokio::test]
    async fn test_partial_content() {
        let dir = tempfile::tempdir().unwrap();
        let (app, id) = state_with_file(&dir);
        let uri = format!("/media/audio/{}", id);

        let (status, headers, body) = send(router(app), ranged(&uri, "bytes=10-19")).await;
        assert_eq!(status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(headers[header::CONTENT_RANGE], "bytes 10-19/100");
        assert_eq!(headers[header::CONTENT_LENGTH], "10");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(body, (10..20u8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn test_range_past_end_is_416() {
        let dir = tempfile::tempdir().unwrap();
        let (app, id) = state_with_file(&dir);
        let uri = format!("/media/audio/{}", id);

        let (status, headers, body) = send(router(app), ranged(&uri, "bytes=200-")).await;
        assert_eq!(status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(headers[header::CONTENT_RANGE], "bytes */100");
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_full_download_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _id) = state_with_file(&dir);

        let (status, headers, body) = send(router(app), get("/media/audio/clip.wav")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(headers[header::ACCEPT_RANGES], "bytes");
        assert_eq!(headers[header::CONTENT_TYPE], "audio/wav");
        assert_eq!(body.len(), 100);
    }

    #[tokio::test]
    async fn test_malformed_range_is_400() {
        let dir = tempfile::tempdir().unwrap();
        let (app, id) = state_with_file(&dir);
        let uri = format!("/media/audio/{}", id);

        let (status, _, _) = send(router(app), ranged(&uri, "pages=1")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_live_stream_header_then_data() {
        let app = test_state();
        let ring = app.ring.clone();
        ring.write(b"old audio");

        let response = router(app).oneshot(get("/live.wav")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");

        let mut body = response.into_body();
        let first = body.frame().await.unwrap().unwrap().into_data().unwrap();
        assert_eq!(first.len(), wav::HEADER_LEN);
        assert_eq!(&first[..4], b"RIFF");
        assert_eq!(&first[40..44], &wav::UNKNOWN_SIZE.to_le_bytes());

        ring.write(b"fresh");
        let next = tokio::time::timeout(Duration::from_secs(3), body.frame())
            .await
            .unwrap()
            .unwrap()
            .unwrap()
            .into_data()
            .unwrap();
        assert_eq!(&next[..], b"fresh");

        ring.close();
        let end = tokio::time::timeout(Duration::from_secs(3), body.frame()).await.unwrap();
        assert!(end.is_none());
    }

    #[test]
    fn test_range_download_with_open_live_listeners_on_small_blocking_pool() {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .max_blocking_threads(2)
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let dir = tempfile::tempdir().unwrap();
            let (app, id) = state_with_file(&dir);
            let ring = app.ring.clone();

            // More open listeners than blocking threads
            let mut listeners = Vec::new();
            for _ in 0..4 {
                let response = router(app.clone()).oneshot(get("/live.wav")).await.unwrap();
                let mut body = response.into_body();
                body.frame().await.unwrap().unwrap();
                listeners.push(body);
            }

            let uri = format!("/media/audio/{}", id);
            let (status, _, body) = tokio::time::timeout(
                Duration::from_secs(3),
                send(router(app), ranged(&uri, "bytes=0-9")),
            )
            .await
            .expect("range download must not wait on live listeners");
            assert_eq!(status, StatusCode::PARTIAL_CONTENT);
            assert_eq!(body, (0..10u8).collect::<Vec<_>>());

            ring.write(b"still live");
            for body in listeners.iter_mut() {
                let chunk = tokio::time::timeout(Duration::from_secs(3), body.frame())
                    .await
                    .unwrap()
                    .unwrap()
                    .unwrap()
                    .into_data()
                    .unwrap();
                assert_eq!(&chunk[..], b"still live");
            }
        });
    }
}

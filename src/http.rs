// HTTP adapter: JSON info endpoint, streamed download endpoint, static files

use std::path::Path;

use axum::body::Body;
use axum::extract::State;
use axum::http::header::{CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::io::ReaderStream;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::downloader::models::{MediaDescriptor, MediaInfo, PlaylistDescriptor, QualityOption};
use crate::downloader::{DownloadError, DownloadRequest, Downloader};

pub fn router(downloader: Downloader, static_dir: &Path) -> Router {
    Router::new()
        .route("/info", post(info))
        .route("/download", post(download))
        .fallback_service(ServeDir::new(static_dir))
        .layer(TraceLayer::new_for_http())
        .with_state(downloader)
}

#[derive(Debug, Deserialize)]
pub struct InfoRequest {
    #[serde(default)]
    pub url: String,
}

/// Video metadata plus the quality picker options
#[derive(Debug, Serialize)]
pub struct VideoInfo {
    #[serde(flatten)]
    pub media: MediaDescriptor,
    pub formats: Vec<QualityOption>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InfoResponse {
    Video { video: VideoInfo },
    Playlist { playlist: PlaylistDescriptor },
}

impl From<MediaInfo> for InfoResponse {
    fn from(info: MediaInfo) -> Self {
        match info {
            MediaInfo::Video(media) => Self::Video {
                video: VideoInfo {
                    formats: media.quality_options(),
                    media,
                },
            },
            MediaInfo::Playlist(playlist) => Self::Playlist { playlist },
        }
    }
}

/// Error returned to HTTP callers. Carries only the public text; the full
/// error is logged where it is created.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl From<DownloadError> for ApiError {
    fn from(e: DownloadError) -> Self {
        tracing::error!(
            error = %e,
            diagnostics = e.diagnostics().unwrap_or(""),
            "request failed"
        );
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: e.public_message().to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

async fn info(
    State(downloader): State<Downloader>,
    Json(request): Json<InfoRequest>,
) -> Result<Json<InfoResponse>, ApiError> {
    let url = request.url.trim();
    if url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }

    let info = downloader.get_info(url).await?;
    Ok(Json(info.into()))
}

async fn download(
    State(downloader): State<Downloader>,
    Json(mut request): Json<DownloadRequest>,
) -> Result<Response, ApiError> {
    request.url = request.url.trim().to_string();
    if request.url.is_empty() {
        return Err(ApiError::bad_request("url is required"));
    }

    let download = downloader.download(&request).await?;

    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(download.content_type));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(download.stream.content_length()));
    if let Ok(value) = HeaderValue::from_str(&content_disposition(&download.filename)) {
        headers.insert(CONTENT_DISPOSITION, value);
    }

    tracing::info!(
        request_id = %download.stream.request_id(),
        filename = %download.filename,
        bytes = download.stream.content_length(),
        "streaming download"
    );

    // The body owns the stream; dropping it (done or disconnected) deletes the artifact
    let body = Body::from_stream(ReaderStream::new(download.stream));
    Ok((headers, body).into_response())
}

/// `attachment` with an ASCII fallback name plus the exact UTF-8 name
fn content_disposition(filename: &str) -> String {
    format!(
        "attachment; filename=\"{}\"; filename*=UTF-8''{}",
        sanitize_header_filename(filename),
        urlencoding::encode(filename)
    )
}

/// Reduce a filename to characters that are safe inside a quoted header value
fn sanitize_header_filename(filename: &str) -> String {
    let sanitized: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_' | ' ' | '(' | ')') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = sanitized.trim();
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

//! Session API handlers: snapshot, upload, preview, generate.

use std::sync::Arc;

use axum::{
    extract::{Multipart, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use stillfade_core::{GenerateError, OutputVideo, SessionSnapshot, UploadError, UploadedFile};
use tracing::{debug, warn};

use super::handlers::{error_response, ApiError};
use super::video::{object_url, DOWNLOAD_URL};
use crate::metrics::{TRANSCODES_TOTAL, TRANSCODE_DURATION, UPLOADS_TOTAL};
use crate::state::AppState;

/// Multipart field carrying the picked file.
const FILE_FIELD: &str = "file";
const FALLBACK_MEDIA_TYPE: &str = "application/octet-stream";

// ============================================================================
// Response types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct GenerateResponse {
    #[serde(flatten)]
    pub output: OutputVideo,
    /// Playback URL of the produced clip.
    pub url: String,
    pub download_url: String,
}

// ============================================================================
// Handlers
// ============================================================================

pub async fn get_session(State(state): State<Arc<AppState>>) -> Json<SessionSnapshot> {
    Json(state.session().snapshot().await)
}

/// Accepts a multipart upload with the image in the `file` field.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<SessionSnapshot>, ApiError> {
    let mut file: Option<UploadedFile> = None;

    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                UPLOADS_TOTAL.with_label_values(&["malformed"]).inc();
                return Err(error_response(
                    StatusCode::BAD_REQUEST,
                    format!("Invalid multipart body: {}", e),
                ));
            }
        };
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let file_name = field.file_name().map(|s| s.to_string());
        // Browsers submit an empty, nameless part when nothing was picked.
        if file_name.as_deref() == Some("") {
            break;
        }
        let media_type = field
            .content_type()
            .unwrap_or(FALLBACK_MEDIA_TYPE)
            .to_string();

        file = Some(match field.bytes().await {
            Ok(bytes) => UploadedFile::new(file_name, media_type, bytes.to_vec()),
            Err(e) => {
                debug!(error = %e, "Failed to read upload body");
                UploadedFile::unreadable(file_name, media_type, e.to_string())
            }
        });
        break;
    }

    match state.session().upload(file).await {
        Ok(_) => {
            UPLOADS_TOTAL.with_label_values(&["accepted"]).inc();
            Ok(Json(state.session().snapshot().await))
        }
        Err(e) => {
            let (status, outcome) = match e {
                UploadError::NoFile | UploadError::InvalidType { .. } => {
                    (StatusCode::BAD_REQUEST, "rejected")
                }
                UploadError::Read { .. } => (StatusCode::BAD_REQUEST, "read_failed"),
                UploadError::EngineNotReady => (StatusCode::SERVICE_UNAVAILABLE, "not_ready"),
                UploadError::Busy => (StatusCode::CONFLICT, "busy"),
            };
            UPLOADS_TOTAL.with_label_values(&[outcome]).inc();
            Err(error_response(status, e.to_string()))
        }
    }
}

/// Serves the current source image with its own media type.
pub async fn preview(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let source = state
        .session()
        .source()
        .await
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "No image uploaded"))?;

    let bytes = source.decode().map_err(|e| {
        warn!(error = %e, "Stored source image could not be decoded");
        error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok((
        [
            (header::CONTENT_TYPE, source.media_type),
            (header::CACHE_CONTROL, "no-store".to_string()),
        ],
        bytes,
    )
        .into_response())
}

/// Runs one transcode of the current source image.
pub async fn generate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<GenerateResponse>, ApiError> {
    match state.session().generate().await {
        Ok(output) => {
            TRANSCODES_TOTAL.with_label_values(&["success"]).inc();
            TRANSCODE_DURATION.observe(output.elapsed_ms as f64 / 1000.0);
            Ok(Json(GenerateResponse {
                url: object_url(&output.object),
                download_url: DOWNLOAD_URL.to_string(),
                output,
            }))
        }
        Err(e) => {
            TRANSCODES_TOTAL.with_label_values(&[e.kind()]).inc();
            let status = match e {
                GenerateError::NotReady => StatusCode::BAD_REQUEST,
                GenerateError::Busy => StatusCode::CONFLICT,
                _ => StatusCode::UNPROCESSABLE_ENTITY,
            };
            Err(error_response(status, e.user_message()))
        }
    }
}

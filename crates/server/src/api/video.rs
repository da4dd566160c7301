//! Playback and download of produced clips.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use stillfade_core::{ObjectRef, StoredObject, DOWNLOAD_FILE_NAME};

use super::handlers::{error_response, ApiError};
use crate::state::AppState;

/// Route prefix under which object references resolve.
pub const OBJECTS_PATH: &str = "/api/v1/objects";
pub const DOWNLOAD_URL: &str = "/api/v1/video/download";

/// URL serving the object behind `object_ref`.
pub fn object_url(object_ref: &ObjectRef) -> String {
    format!("{}/{}", OBJECTS_PATH, object_ref.id())
}

fn no_video() -> ApiError {
    error_response(StatusCode::NOT_FOUND, "No video has been generated")
}

fn inline(object: StoredObject) -> Response {
    let length = object.data.len().to_string();
    (
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::CONTENT_LENGTH, length),
        ],
        object.data.as_ref().clone(),
    )
        .into_response()
}

/// Current clip, for inline playback.
pub async fn play(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let object = state.session().output_object().await.ok_or_else(no_video)?;
    Ok(inline(object))
}

/// Current clip as an attachment.
pub async fn download(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    let object = state.session().output_object().await.ok_or_else(no_video)?;
    let length = object.data.len().to_string();

    Ok((
        [
            (header::CONTENT_TYPE, object.content_type),
            (header::CONTENT_LENGTH, length),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", DOWNLOAD_FILE_NAME),
            ),
        ],
        object.data.as_ref().clone(),
    )
        .into_response())
}

/// Resolves a live object reference by id.
pub async fn get_object(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Response, ApiError> {
    let object = ObjectRef::parse(&id)
        .and_then(|object_ref| state.session().object(&object_ref))
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Object not found or revoked"))?;
    Ok(inline(object))
}

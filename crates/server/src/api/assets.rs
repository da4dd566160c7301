//! Static engine assets served with fixed caching and cross-origin headers.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::{error, warn};

use super::handlers::{error_response, ApiError};
use crate::state::AppState;

/// Route pattern for assets under `base_path`.
pub fn route_pattern(base_path: &str) -> String {
    format!("{}/{{file}}", base_path.trim_end_matches('/'))
}

pub async fn serve_asset(
    State(state): State<Arc<AppState>>,
    Path(file): Path<String>,
) -> Result<Response, ApiError> {
    let rule = state
        .asset_rules()
        .for_file(&file)
        .ok_or_else(|| error_response(StatusCode::NOT_FOUND, "Asset not found"))?;

    let path = state.config().assets.dir.join(rule.file_name);
    let data = match tokio::fs::read(&path).await {
        Ok(data) => data,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            warn!(path = %path.display(), "Engine asset missing on disk");
            return Err(error_response(StatusCode::NOT_FOUND, "Asset not found"));
        }
        Err(e) => {
            error!(path = %path.display(), error = %e, "Failed to read engine asset");
            return Err(error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to read asset",
            ));
        }
    };

    Ok((rule.headers(), data).into_response())
}

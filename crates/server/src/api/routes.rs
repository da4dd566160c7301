use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;

use super::{assets, handlers, session, video, ws};
use super::middleware::metrics_middleware;
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let config = state.config();

    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Session
        .route("/session", get(session::get_session))
        .route("/upload", post(session::upload))
        .route("/preview", get(session::preview))
        .route("/generate", post(session::generate))
        // Produced clips
        .route("/video", get(video::play))
        .route("/video/download", get(video::download))
        .route("/objects/{id}", get(video::get_object))
        // Live updates
        .route("/ws", get(ws::ws_handler))
        .layer(DefaultBodyLimit::max(config.server.max_upload_bytes));

    let mut router = Router::new()
        .nest("/api/v1", api_routes)
        .route(
            &assets::route_pattern(&config.assets.base_path),
            get(assets::serve_asset),
        )
        .route("/metrics", get(handlers::metrics));

    // Serve the front-end with SPA fallback
    if let Some(ui_dir) = &config.server.ui_dir {
        let index_path = ui_dir.join("index.html");
        let serve_dir = ServeDir::new(ui_dir).fallback(ServeFile::new(index_path));
        router = router.fallback_service(serve_dir);
    }

    router
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

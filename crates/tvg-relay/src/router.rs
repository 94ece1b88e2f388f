//! Axum router construction.
//!
//! Builds the full application router: relay endpoints at the root, the
//! channel API under `/api`, and optional static file serving for a UI
//! build.

use axum::middleware;
use axum::routing::get;
use axum::Router;
use std::path::PathBuf;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::context::RelayContext;
use crate::middleware::request_id::request_id_middleware;
use crate::routes;

/// Build the complete Axum router.
///
/// The relay endpoints set their CORS headers themselves, so the blanket
/// [`CorsLayer`] is scoped to the `/api` group only.
pub fn build_router(ctx: RelayContext, static_dir: Option<PathBuf>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        .route("/channels", get(routes::channels::list))
        .route("/channels/{id}", get(routes::channels::get))
        .layer(cors);

    let mut app = Router::new()
        .route(routes::relay::STREAM_ROUTE, get(routes::relay::stream))
        .route(routes::relay::SEGMENT_ROUTE, get(routes::relay::segment))
        .route("/health", get(routes::health::health))
        .nest("/api", api)
        .layer(middleware::from_fn(request_id_middleware))
        .layer(TraceLayer::new_for_http())
        .with_state(ctx);

    // Static file serving for UI build.
    if let Some(dir) = static_dir {
        if dir.exists() {
            tracing::info!("Serving static files from {:?}", dir);
            let index_path = dir.join("index.html");
            app = app.fallback_service(
                tower_http::services::ServeDir::new(&dir)
                    .append_index_html_on_directories(true)
                    .not_found_service(tower_http::services::ServeFile::new(index_path)),
            );
        }
    }

    app
}

use crate::{handlers, AppState};
use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Router,
};
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Creates the Axum router and associates routes with handlers.
pub fn create_router(state: Arc<AppState>, max_upload_bytes: usize) -> Router {
    Router::new()
        .route(
            "/campgrounds",
            get(handlers::list_campgrounds).post(handlers::create_campground),
        )
        .route(
            "/campgrounds/{id}",
            get(handlers::show_campground)
                .put(handlers::update_campground)
                .delete(handlers::delete_campground),
        )
        // Middleware Layers
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::AppState;

mod error;
mod handlers;
mod identity;
mod routes;

pub use error::AppError;
pub use identity::ClientIdentity;

pub fn router(state: AppState) -> Router {
    let body_limit = DefaultBodyLimit::max(state.upload_max_bytes);

    Router::new()
        .merge(routes::health())
        .merge(routes::geocoding())
        .merge(routes::reports())
        .layer(body_limit)
        // The reporting frontend is served from anywhere.
        .layer(CorsLayer::permissive())
        .with_state(state)
}

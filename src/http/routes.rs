use axum::{routing::delete, routing::get, routing::post, routing::put, Router};

use crate::http::handlers;
use crate::AppState;

pub fn health() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health))
}

pub fn geocoding() -> Router<AppState> {
    Router::new()
        .route("/geocode", post(handlers::geocode))
        .route("/reverse-geocode", post(handlers::reverse_geocode))
}

pub fn reports() -> Router<AppState> {
    Router::new()
        .route("/reports", get(handlers::list_reports))
        .route("/reports", post(handlers::create_report))
        .route("/reports/:id", get(handlers::get_report))
        .route("/reports/:id", put(handlers::update_report_status))
        .route("/reports/:id", delete(handlers::delete_report))
        .route("/reports/:id/sightings", post(handlers::add_sighting))
        .route("/reports/:id/resolved", post(handlers::add_resolved))
        .route("/reports/:id/user-status", get(handlers::user_status))
}

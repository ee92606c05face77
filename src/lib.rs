pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use std::sync::Arc;

use crate::infra::{geocoder::Geocoder, storage::ImageStore, store::ReportStore};

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ReportStore>,
    pub images: Arc<dyn ImageStore>,
    pub geocoder: Arc<dyn Geocoder>,
    pub resolved_vote_threshold: u32,
    pub upload_max_bytes: usize,
}

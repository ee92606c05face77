use anyhow::Result;
use axum::Router;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bantay::config::AppConfig;
use bantay::infra::db::Db;
use bantay::infra::geocoder::{Geocoder, NominatimGeocoder};
use bantay::infra::memory::{MemoryImageStore, MemoryReportStore};
use bantay::infra::storage::{ImageStore, S3ImageStore};
use bantay::infra::store::{PgReportStore, ReportStore};
use bantay::{http, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let (store, images): (Arc<dyn ReportStore>, Arc<dyn ImageStore>) =
        match config.store_backend.as_str() {
            "memory" => {
                tracing::warn!("using the in-memory store; reports will not survive a restart");
                (
                    Arc::new(MemoryReportStore::new()),
                    Arc::new(MemoryImageStore::new()),
                )
            }
            _ => {
                let db = Db::connect(&config).await?;
                let storage = S3ImageStore::new(&config).await?;
                (Arc::new(PgReportStore::new(db)), Arc::new(storage))
            }
        };

    let geocoder: Arc<dyn Geocoder> = Arc::new(NominatimGeocoder::new(
        &config.nominatim_url,
        Duration::from_secs(config.geocoder_timeout_seconds),
    )?);

    let state = AppState {
        store,
        images,
        geocoder,
        resolved_vote_threshold: config.resolved_vote_threshold,
        upload_max_bytes: config.upload_max_bytes,
    };

    let app: Router = http::router(state).layer(TraceLayer::new_for_http());
    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    tracing::info!("listening on {}", config.http_addr);

    // ConnectInfo feeds the caller-identity fallback.
    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received");
}

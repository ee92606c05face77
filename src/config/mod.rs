use anyhow::{anyhow, Result};
use std::net::SocketAddr;
use std::str::FromStr;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub http_addr: String,
    pub store_backend: String,
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub db_connect_timeout_seconds: u64,
    pub db_idle_timeout_seconds: u64,
    pub db_max_lifetime_seconds: u64,
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    pub s3_bucket: Option<String>,
    pub nominatim_url: String,
    pub geocoder_timeout_seconds: u64,
    pub resolved_vote_threshold: u32,
    pub upload_max_bytes: usize,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        let http_addr = env_or("HTTP_ADDR", "0.0.0.0:8080");
        let _parsed_http_addr = SocketAddr::from_str(&http_addr)
            .map_err(|err| anyhow!("invalid HTTP_ADDR: {}", err))?;

        let store_backend = env_or("STORE_BACKEND", "postgres");
        if store_backend != "postgres" && store_backend != "memory" {
            return Err(anyhow!("invalid STORE_BACKEND: {}", store_backend));
        }

        let config = Self {
            http_addr,
            store_backend,
            database_url: std::env::var("DATABASE_URL").ok(),
            db_max_connections: env_or_parse("DB_MAX_CONNECTIONS", "25")?,
            db_connect_timeout_seconds: env_or_parse("DB_CONNECT_TIMEOUT_SECONDS", "5")?,
            db_idle_timeout_seconds: env_or_parse("DB_IDLE_TIMEOUT_SECONDS", "300")?,
            db_max_lifetime_seconds: env_or_parse("DB_MAX_LIFETIME_SECONDS", "1800")?,
            s3_endpoint: std::env::var("S3_ENDPOINT").ok(),
            s3_region: env_or("S3_REGION", "ap-southeast-1"),
            s3_bucket: std::env::var("S3_BUCKET").ok(),
            nominatim_url: env_or("NOMINATIM_URL", "https://nominatim.openstreetmap.org"),
            geocoder_timeout_seconds: env_or_parse("GEOCODER_TIMEOUT_SECONDS", "10")?,
            resolved_vote_threshold: env_or_parse("RESOLVED_VOTE_THRESHOLD", "5")?,
            upload_max_bytes: env_or_parse("UPLOAD_MAX_BYTES", "10485760")?,
        };

        if config.resolved_vote_threshold == 0 {
            return Err(anyhow!("RESOLVED_VOTE_THRESHOLD must be at least 1"));
        }

        if config.store_backend == "postgres" {
            if config.database_url.is_none() {
                return Err(anyhow!("missing required env var: DATABASE_URL"));
            }
            if config.s3_bucket.is_none() {
                return Err(anyhow!("missing required env var: S3_BUCKET"));
            }
        }

        Ok(config)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_or_parse<T>(key: &str, default: &str) -> Result<T>
where
    T: FromStr,
    <T as FromStr>::Err: std::fmt::Display,
{
    let value = std::env::var(key).unwrap_or_else(|_| default.to_string());
    value
        .parse::<T>()
        .map_err(|err| anyhow!("invalid {}: {}", key, err))
}

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GeocodeError {
    #[error("geocoding provider unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone)]
pub struct GeocodedLocation {
    pub display_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// Address/coordinate lookup. Implementations carry bounded timeouts;
/// outages surface as [`GeocodeError::Unavailable`], never a hang.
#[async_trait]
pub trait Geocoder: Send + Sync {
    /// Address to coordinates; None when the provider knows no match.
    async fn forward(&self, address: &str) -> Result<Option<GeocodedLocation>, GeocodeError>;

    /// Coordinates to a display address; None when nothing is there.
    async fn reverse(&self, latitude: f64, longitude: f64)
        -> Result<Option<String>, GeocodeError>;
}

pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct SearchHit {
    display_name: String,
    lat: String,
    lon: String,
}

#[derive(Deserialize)]
struct ReverseHit {
    display_name: Option<String>,
    error: Option<String>,
}

impl NominatimGeocoder {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("bantay/0.1 (civic issue reports)")
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn fetch<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, GeocodeError> {
        let response = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(query)
            .send()
            .await
            .map_err(|err| GeocodeError::Unavailable(err.to_string()))?;

        if !response.status().is_success() {
            return Err(GeocodeError::Unavailable(format!(
                "provider answered {}",
                response.status()
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|err| GeocodeError::Unavailable(format!("malformed response: {}", err)))
    }
}

#[async_trait]
impl Geocoder for NominatimGeocoder {
    async fn forward(&self, address: &str) -> Result<Option<GeocodedLocation>, GeocodeError> {
        let hits: Vec<SearchHit> = self
            .fetch(
                "/search",
                &[
                    ("q", address.to_string()),
                    ("format", "jsonv2".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let Some(hit) = hits.into_iter().next() else {
            return Ok(None);
        };

        let latitude: f64 = hit
            .lat
            .parse()
            .map_err(|_| GeocodeError::Unavailable("malformed latitude in response".into()))?;
        let longitude: f64 = hit
            .lon
            .parse()
            .map_err(|_| GeocodeError::Unavailable("malformed longitude in response".into()))?;

        Ok(Some(GeocodedLocation {
            display_name: hit.display_name,
            latitude,
            longitude,
        }))
    }

    async fn reverse(
        &self,
        latitude: f64,
        longitude: f64,
    ) -> Result<Option<String>, GeocodeError> {
        let hit: ReverseHit = self
            .fetch(
                "/reverse",
                &[
                    ("lat", latitude.to_string()),
                    ("lon", longitude.to_string()),
                    ("format", "jsonv2".to_string()),
                ],
            )
            .await?;

        // Nominatim reports "nothing there" as a 200 with an error field.
        if hit.error.is_some() {
            return Ok(None);
        }
        Ok(hit.display_name)
    }
}

#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::extract::connect_info::ConnectInfo;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use time::{Duration, OffsetDateTime};
use tower::ServiceExt;
use uuid::Uuid;

use bantay::domain::report::{Report, ReportStatus, VoteTally};
use bantay::infra::geocoder::{GeocodeError, GeocodedLocation, Geocoder};
use bantay::infra::memory::{MemoryImageStore, MemoryReportStore};
use bantay::infra::storage::ImageStore;
use bantay::infra::store::ReportStore;
use bantay::{http, AppState};

pub const DEFAULT_CLIENT_IP: &str = "127.0.0.1";

/// A PNG signature is enough for format sniffing.
pub const PNG_BYTES: &[u8] = &[
    0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D,
];

// ---------------------------------------------------------------------------
// Scripted geocoder
// ---------------------------------------------------------------------------

pub struct ScriptedGeocoder {
    pub known: HashMap<String, GeocodedLocation>,
    pub reverse_address: Option<String>,
    pub available: bool,
}

impl ScriptedGeocoder {
    pub fn unavailable() -> Self {
        Self {
            known: HashMap::new(),
            reverse_address: None,
            available: false,
        }
    }
}

impl Default for ScriptedGeocoder {
    fn default() -> Self {
        let mut known = HashMap::new();
        known.insert(
            "Rizal Park, Manila".to_string(),
            GeocodedLocation {
                display_name: "Rizal Park, Ermita, Manila, Metro Manila, Philippines".to_string(),
                latitude: 14.5832,
                longitude: 120.9794,
            },
        );
        Self {
            known,
            reverse_address: Some("Taft Avenue, Ermita, Manila, Metro Manila, Philippines".to_string()),
            available: true,
        }
    }
}

#[async_trait]
impl Geocoder for ScriptedGeocoder {
    async fn forward(&self, address: &str) -> Result<Option<GeocodedLocation>, GeocodeError> {
        if !self.available {
            return Err(GeocodeError::Unavailable("scripted outage".to_string()));
        }
        Ok(self.known.get(address).cloned())
    }

    async fn reverse(
        &self,
        _latitude: f64,
        _longitude: f64,
    ) -> Result<Option<String>, GeocodeError> {
        if !self.available {
            return Err(GeocodeError::Unavailable("scripted outage".to_string()));
        }
        Ok(self.reverse_address.clone())
    }
}

// ---------------------------------------------------------------------------
// TestApp — fresh per test, backed by the in-memory drivers
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub store: Arc<MemoryReportStore>,
    pub images: Arc<MemoryImageStore>,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(5, ScriptedGeocoder::default())
    }

    pub fn with_threshold(threshold: u32) -> Self {
        Self::build(threshold, ScriptedGeocoder::default())
    }

    pub fn with_geocoder(geocoder: ScriptedGeocoder) -> Self {
        Self::build(5, geocoder)
    }

    fn build(resolved_vote_threshold: u32, geocoder: ScriptedGeocoder) -> Self {
        let store = Arc::new(MemoryReportStore::new());
        let images = Arc::new(MemoryImageStore::new());

        let state = AppState {
            store: store.clone(),
            images: images.clone(),
            geocoder: Arc::new(geocoder),
            resolved_vote_threshold,
            upload_max_bytes: 10 * 1024 * 1024,
        };

        TestApp {
            router: http::router(state),
            store,
            images,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
        client_ip: &str,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        for &(key, value) in headers {
            builder = builder.header(key, value);
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let addr: IpAddr = client_ip.parse().expect("invalid test client ip");
        let mut request = request;
        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from((addr, 0))));

        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    // ------------------------------------------------------------------
    // Convenience HTTP helpers
    // ------------------------------------------------------------------
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Method::GET, path, None, &[], DEFAULT_CLIENT_IP)
            .await
    }

    pub async fn get_from(&self, ip: &str, path: &str) -> TestResponse {
        self.request(Method::GET, path, None, &[], ip).await
    }

    pub async fn post_json(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::POST, path, Some(body), &[], DEFAULT_CLIENT_IP)
            .await
    }

    pub async fn put_json(&self, path: &str, body: Value) -> TestResponse {
        self.request(Method::PUT, path, Some(body), &[], DEFAULT_CLIENT_IP)
            .await
    }

    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request(Method::DELETE, path, None, &[], DEFAULT_CLIENT_IP)
            .await
    }

    /// POST with no body from a specific client address.
    pub async fn post_from(&self, ip: &str, path: &str) -> TestResponse {
        self.request(Method::POST, path, None, &[], ip).await
    }

    /// POST with no body carrying an `x-device-id` header.
    pub async fn post_with_device(&self, ip: &str, device_id: &str, path: &str) -> TestResponse {
        self.request(Method::POST, path, None, &[("x-device-id", device_id)], ip)
            .await
    }

    /// POST with no body carrying an `x-forwarded-for` header.
    pub async fn post_forwarded(&self, forwarded_for: &str, path: &str) -> TestResponse {
        self.request(
            Method::POST,
            path,
            None,
            &[("x-forwarded-for", forwarded_for)],
            DEFAULT_CLIENT_IP,
        )
        .await
    }

    /// Multipart POST for report creation.
    pub async fn post_multipart(
        &self,
        path: &str,
        fields: &[(&str, &str)],
        image: Option<(&str, &[u8])>,
    ) -> TestResponse {
        let boundary = "bantay-test-boundary-4f9a27";
        let mut body: Vec<u8> = Vec::new();

        for (name, value) in fields {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
                )
                .as_bytes(),
            );
        }
        if let Some((filename, data)) = image {
            body.extend_from_slice(
                format!(
                    "--{boundary}\r\nContent-Disposition: form-data; name=\"image\"; \
                     filename=\"{filename}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
                )
                .as_bytes(),
            );
            body.extend_from_slice(data);
            body.extend_from_slice(b"\r\n");
        }
        body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

        let mut request = Request::builder()
            .method(Method::POST)
            .uri(path)
            .header("host", "localhost")
            .header(
                "content-type",
                format!("multipart/form-data; boundary={boundary}"),
            )
            .body(Body::from(body))
            .unwrap();

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([127, 0, 0, 1], 0))));

        self.send(request).await
    }

    // ------------------------------------------------------------------
    // Test data helpers
    // ------------------------------------------------------------------

    /// Insert a report directly in the store. Returns its id.
    pub async fn seed_report(&self, latitude: f64, longitude: f64) -> Uuid {
        self.seed_report_aged(latitude, longitude, 0).await
    }

    /// Insert a report whose creation time lies `minutes_old` in the past.
    pub async fn seed_report_aged(&self, latitude: f64, longitude: f64, minutes_old: i64) -> Uuid {
        let report = sample_report(latitude, longitude, minutes_old);
        let id = report.id;
        self.store
            .insert(&report)
            .await
            .expect("seeding report failed");
        id
    }

    /// Insert a report together with a stored image blob.
    pub async fn seed_report_with_image(&self, latitude: f64, longitude: f64) -> (Uuid, String) {
        let mut report = sample_report(latitude, longitude, 0);
        let key = format!("images/{}.png", Uuid::new_v4());
        report.image_key = Some(key.clone());

        self.images
            .put(&key, "image/png", bytes::Bytes::from_static(PNG_BYTES))
            .await
            .expect("seeding image failed");
        let id = report.id;
        self.store
            .insert(&report)
            .await
            .expect("seeding report failed");

        (id, key)
    }
}

fn sample_report(latitude: f64, longitude: f64, minutes_old: i64) -> Report {
    let created_at = OffsetDateTime::now_utc() - Duration::minutes(minutes_old);
    Report {
        id: Uuid::new_v4(),
        issue_type: "pothole".to_string(),
        custom_issue: None,
        description: Some("deep pothole near the crossing".to_string()),
        location_name: "Taft Avenue".to_string(),
        latitude,
        longitude,
        image_key: None,
        status: ReportStatus::Pending,
        sightings: VoteTally::default(),
        resolved: VoteTally::default(),
        created_at,
        updated_at: created_at,
    }
}

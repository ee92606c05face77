use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::app::reports::{ImageUpload, ReportDraft, ReportService, VoteOutcome};
use crate::app::votes::VoteLedger;
use crate::domain::geo::GeoPoint;
use crate::domain::report::{Report, ReportError, ReportStatus, VoteKind};
use crate::http::{AppError, ClientIdentity};
use crate::AppState;

const ALLOWED_IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "gif"];

fn report_service(state: &AppState) -> ReportService {
    ReportService::new(
        state.store.clone(),
        state.images.clone(),
        state.resolved_vote_threshold,
    )
}

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.store.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };

    Json(HealthResponse { status })
}

// ---------------------------------------------------------------------------
// Geocoding
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct GeocodeRequest {
    pub address: Option<String>,
}

#[derive(Serialize)]
pub struct GeocodeResponse {
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
}

pub async fn geocode(
    State(state): State<AppState>,
    Json(payload): Json<GeocodeRequest>,
) -> Result<Json<GeocodeResponse>, AppError> {
    let address = payload
        .address
        .as_deref()
        .map(str::trim)
        .filter(|address| !address.is_empty())
        .ok_or_else(|| AppError::bad_request("address is required"))?;

    let location = state.geocoder.forward(address).await.map_err(|err| {
        tracing::warn!(error = %err, "forward geocoding failed");
        AppError::unavailable("geocoding provider unavailable, try again shortly")
    })?;

    match location {
        Some(location) => Ok(Json(GeocodeResponse {
            location_name: location.display_name,
            latitude: location.latitude,
            longitude: location.longitude,
        })),
        None => Err(AppError::not_found("location not found")),
    }
}

#[derive(Deserialize)]
pub struct ReverseGeocodeRequest {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Serialize)]
pub struct AddressResponse {
    pub address: String,
}

#[derive(Serialize)]
struct ReverseGeocodeFallback {
    error: String,
    fallback_name: String,
}

pub async fn reverse_geocode(
    State(state): State<AppState>,
    Json(payload): Json<ReverseGeocodeRequest>,
) -> Result<Response, AppError> {
    let (latitude, longitude) = match (payload.latitude, payload.longitude) {
        (Some(latitude), Some(longitude)) => (latitude, longitude),
        _ => return Err(AppError::bad_request("latitude and longitude are required")),
    };

    match state.geocoder.reverse(latitude, longitude).await {
        Ok(Some(address)) => Ok(Json(AddressResponse { address }).into_response()),
        Ok(None) => Err(AppError::not_found(
            "no address found for the given coordinates",
        )),
        Err(err) => {
            tracing::warn!(error = %err, "reverse geocoding failed");
            // The caller still gets something renderable without a second
            // round trip.
            let fallback = ReverseGeocodeFallback {
                error: "reverse geocoding unavailable, try again shortly".to_string(),
                fallback_name: format!("{:.5}, {:.5}", latitude, longitude),
            };
            Ok((StatusCode::SERVICE_UNAVAILABLE, Json(fallback)).into_response())
        }
    }
}

// ---------------------------------------------------------------------------
// Reports
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct ListReportsQuery {
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: Option<String>,
}

#[derive(Serialize)]
pub struct ReportListResponse {
    pub items: Vec<Report>,
    pub total: usize,
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(query): Query<ListReportsQuery>,
) -> Result<Json<ReportListResponse>, AppError> {
    let reference = match (query.latitude, query.longitude) {
        (Some(latitude), Some(longitude)) => Some(GeoPoint {
            latitude,
            longitude,
        }),
        (None, None) => None,
        _ => {
            return Err(AppError::bad_request(
                "latitude and longitude must be supplied together",
            ))
        }
    };

    let status = match query.status.as_deref() {
        Some(value) => Some(ReportStatus::from_db(value).ok_or_else(|| {
            AppError::bad_request("status must be one of pending, in_progress, resolved")
        })?),
        None => None,
    };

    let items = report_service(&state).list(reference, status).await?;
    let total = items.len();

    Ok(Json(ReportListResponse { items, total }))
}

pub async fn create_report(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<Report>), AppError> {
    let mut draft = ReportDraft::default();
    let mut image: Option<ImageUpload> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart payload: {}", err)))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            "image" => {
                let filename = field.file_name().map(str::to_string);
                let data = field.bytes().await.map_err(|err| {
                    AppError::bad_request(format!("failed to read image upload: {}", err))
                })?;
                // Browsers submit an empty part for an untouched file input.
                if data.is_empty() {
                    continue;
                }
                image = Some(validate_image(filename.as_deref(), data)?);
            }
            "issue_type" => draft.issue_type = Some(text_field(field).await?),
            "custom_issue" => draft.custom_issue = Some(text_field(field).await?),
            "description" => draft.description = Some(text_field(field).await?),
            "location_name" => draft.location_name = Some(text_field(field).await?),
            "latitude" => draft.latitude = Some(text_field(field).await?),
            "longitude" => draft.longitude = Some(text_field(field).await?),
            _ => {}
        }
    }

    let report = report_service(&state).create(draft, image).await?;

    Ok((StatusCode::CREATED, Json(report)))
}

async fn text_field(field: axum::extract::multipart::Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|err| AppError::bad_request(format!("invalid multipart field: {}", err)))
}

fn validate_image(filename: Option<&str>, data: Bytes) -> Result<ImageUpload, AppError> {
    let allowed_name = filename
        .filter(|name| name.contains('.'))
        .and_then(|name| name.rsplit('.').next())
        .map(str::to_ascii_lowercase)
        .filter(|ext| ALLOWED_IMAGE_EXTENSIONS.contains(&ext.as_str()));
    if allowed_name.is_none() {
        return Err(AppError::bad_request(
            "image must be a png, jpg, jpeg or gif file",
        ));
    }

    // The stored name comes from the sniffed bytes, not the client filename.
    let format = image::guess_format(&data)
        .map_err(|_| AppError::bad_request("image contents are not a recognized image"))?;
    let (extension, content_type) = match format {
        image::ImageFormat::Png => ("png", "image/png"),
        image::ImageFormat::Jpeg => ("jpg", "image/jpeg"),
        image::ImageFormat::Gif => ("gif", "image/gif"),
        _ => {
            return Err(AppError::bad_request(
                "image must be a png, jpg, jpeg or gif file",
            ))
        }
    };

    Ok(ImageUpload {
        data,
        extension,
        content_type,
    })
}

pub async fn get_report(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<Json<Report>, AppError> {
    let report = report_service(&state).get(id).await?;
    Ok(Json(report))
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: Option<String>,
}

pub async fn update_report_status(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Report>, AppError> {
    let status = payload
        .status
        .ok_or_else(|| AppError::bad_request("status is required"))?;

    let report = report_service(&state).set_status(id, &status).await?;
    Ok(Json(report))
}

pub async fn delete_report(
    Path(id): Path<Uuid>,
    State(state): State<AppState>,
) -> Result<StatusCode, AppError> {
    report_service(&state).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Votes
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct VoteResponse {
    pub count: u64,
    pub report_deleted: bool,
}

pub async fn add_sighting(
    Path(id): Path<Uuid>,
    identity: ClientIdentity,
    State(state): State<AppState>,
) -> Result<Json<VoteResponse>, AppError> {
    let outcome = report_service(&state)
        .record_vote(id, VoteKind::Sighting, &identity.token)
        .await
        .map_err(|err| match err {
            ReportError::AlreadyVoted => {
                AppError::conflict("you have already reported seeing this issue")
            }
            other => AppError::from(other),
        })?;

    Ok(Json(vote_response(outcome)))
}

pub async fn add_resolved(
    Path(id): Path<Uuid>,
    identity: ClientIdentity,
    State(state): State<AppState>,
) -> Result<Json<VoteResponse>, AppError> {
    let outcome = report_service(&state)
        .record_vote(id, VoteKind::Resolved, &identity.token)
        .await
        .map_err(|err| match err {
            ReportError::AlreadyVoted => {
                AppError::conflict("you have already marked this issue as resolved")
            }
            other => AppError::from(other),
        })?;

    Ok(Json(vote_response(outcome)))
}

fn vote_response(outcome: VoteOutcome) -> VoteResponse {
    match outcome {
        VoteOutcome::Recorded(tally) => VoteResponse {
            count: tally.count,
            report_deleted: false,
        },
        VoteOutcome::ReportDeleted(tally) => VoteResponse {
            count: tally.count,
            report_deleted: true,
        },
    }
}

#[derive(Serialize)]
pub struct UserStatusResponse {
    pub has_sighted: bool,
    pub has_resolved: bool,
}

pub async fn user_status(
    Path(id): Path<Uuid>,
    identity: ClientIdentity,
    State(state): State<AppState>,
) -> Result<Json<UserStatusResponse>, AppError> {
    let ledger = VoteLedger::new(state.store.clone());
    let (has_sighted, has_resolved) = ledger.voter_status(id, &identity.token).await?;

    Ok(Json(UserStatusResponse {
        has_sighted,
        has_resolved,
    }))
}

use bytes::Bytes;
use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::votes::VoteLedger;
use crate::domain::geo::{within_proximity, GeoPoint};
use crate::domain::report::{Report, ReportError, ReportStatus, VoteKind, VoteTally};
use crate::infra::storage::ImageStore;
use crate::infra::store::ReportStore;

/// Raw creation input as it arrives off the wire; validation happens in
/// [`ReportService::create`].
#[derive(Debug, Default)]
pub struct ReportDraft {
    pub issue_type: Option<String>,
    pub custom_issue: Option<String>,
    pub description: Option<String>,
    pub location_name: Option<String>,
    pub latitude: Option<String>,
    pub longitude: Option<String>,
}

/// An already-sniffed image ready for blob storage.
#[derive(Debug)]
pub struct ImageUpload {
    pub data: Bytes,
    pub extension: &'static str,
    pub content_type: &'static str,
}

#[derive(Debug)]
pub enum VoteOutcome {
    Recorded(VoteTally),
    ReportDeleted(VoteTally),
}

#[derive(Clone)]
pub struct ReportService {
    store: Arc<dyn ReportStore>,
    images: Arc<dyn ImageStore>,
    ledger: VoteLedger,
    resolved_vote_threshold: u32,
}

impl ReportService {
    pub fn new(
        store: Arc<dyn ReportStore>,
        images: Arc<dyn ImageStore>,
        resolved_vote_threshold: u32,
    ) -> Self {
        let ledger = VoteLedger::new(store.clone());
        Self {
            store,
            images,
            ledger,
            resolved_vote_threshold,
        }
    }

    /// Creates a report. The image (when present) is uploaded first; an
    /// upload failure aborts creation so a record never references a blob
    /// that is not there.
    pub async fn create(
        &self,
        draft: ReportDraft,
        image: Option<ImageUpload>,
    ) -> Result<Report, ReportError> {
        let issue_type = required_text(draft.issue_type, "issue_type")?;
        let location_name = required_text(draft.location_name, "location_name")?;
        let latitude = parse_coordinate(draft.latitude, "latitude", 90.0)?;
        let longitude = parse_coordinate(draft.longitude, "longitude", 180.0)?;

        let custom_issue = if issue_type == "custom" {
            draft
                .custom_issue
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        } else {
            None
        };
        let description = draft
            .description
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());

        let image_key = match image {
            Some(upload) => {
                let key = format!("images/{}.{}", Uuid::new_v4(), upload.extension);
                self.images
                    .put(&key, upload.content_type, upload.data)
                    .await?;
                Some(key)
            }
            None => None,
        };

        let now = OffsetDateTime::now_utc();
        let report = Report {
            id: Uuid::new_v4(),
            issue_type,
            custom_issue,
            description,
            location_name,
            latitude,
            longitude,
            image_key,
            status: ReportStatus::Pending,
            sightings: VoteTally::default(),
            resolved: VoteTally::default(),
            created_at: now,
            updated_at: now,
        };
        self.store.insert(&report).await?;

        Ok(report)
    }

    /// Lists reports, newest first. With a reference point only reports
    /// within the proximity radius are returned.
    pub async fn list(
        &self,
        reference: Option<GeoPoint>,
        status: Option<ReportStatus>,
    ) -> Result<Vec<Report>, ReportError> {
        let mut reports = self.store.list().await?;

        if let Some(status) = status {
            reports.retain(|report| report.status == status);
        }
        if let Some(reference) = reference {
            reports.retain(|report| {
                within_proximity(
                    reference,
                    GeoPoint {
                        latitude: report.latitude,
                        longitude: report.longitude,
                    },
                )
            });
        }

        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(reports)
    }

    pub async fn get(&self, id: Uuid) -> Result<Report, ReportError> {
        self.store.get(id).await?.ok_or(ReportError::NotFound)
    }

    pub async fn set_status(&self, id: Uuid, status: &str) -> Result<Report, ReportError> {
        let status = ReportStatus::from_db(status).ok_or_else(|| {
            ReportError::Validation("status must be one of pending, in_progress, resolved".into())
        })?;

        let now = OffsetDateTime::now_utc();
        if !self.store.set_status(id, status, now).await? {
            return Err(ReportError::NotFound);
        }
        self.get(id).await
    }

    /// Casts a vote through the ledger. A resolved vote that carries the
    /// tally to the configured threshold retires the report, image and all,
    /// and reports that back to the caller.
    pub async fn record_vote(
        &self,
        id: Uuid,
        kind: VoteKind,
        identity: &str,
    ) -> Result<VoteOutcome, ReportError> {
        let tally = self.ledger.cast_vote(id, kind, identity).await?;

        if kind == VoteKind::Resolved && tally.count >= u64::from(self.resolved_vote_threshold) {
            match self.delete(id).await {
                Ok(()) => {}
                // A racing vote past the threshold already removed it.
                Err(ReportError::NotFound) => {}
                Err(err) => return Err(err),
            }
            return Ok(VoteOutcome::ReportDeleted(tally));
        }

        Ok(VoteOutcome::Recorded(tally))
    }

    /// Removes the report. The record is authoritative; blob cleanup is
    /// best-effort and a failure there is logged, never surfaced.
    pub async fn delete(&self, id: Uuid) -> Result<(), ReportError> {
        let removed = self.store.remove(id).await?.ok_or(ReportError::NotFound)?;

        if let Some(image_key) = removed.image_key {
            if let Err(err) = self.images.delete(&image_key).await {
                tracing::warn!(
                    error = ?err,
                    report_id = %id,
                    image_key = %image_key,
                    "failed to delete report image"
                );
            }
        }

        Ok(())
    }
}

fn required_text(value: Option<String>, field: &str) -> Result<String, ReportError> {
    match value.map(|value| value.trim().to_string()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(ReportError::Validation(format!("{} is required", field))),
    }
}

fn parse_coordinate(value: Option<String>, field: &str, bound: f64) -> Result<f64, ReportError> {
    let raw = required_text(value, field)?;
    let parsed: f64 = raw
        .parse()
        .map_err(|_| ReportError::Validation(format!("{} must be a decimal number", field)))?;
    if !parsed.is_finite() || parsed.abs() > bound {
        return Err(ReportError::Validation(format!("{} is out of range", field)));
    }
    Ok(parsed)
}

use anyhow::anyhow;
use async_trait::async_trait;
use sqlx::Row;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::report::{Report, ReportError, ReportStatus, VoteKind, VoteTally};
use crate::infra::db::Db;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            err @ (sqlx::Error::PoolTimedOut | sqlx::Error::Io(_)) => {
                StoreError::Unavailable(err.to_string())
            }
            other => StoreError::Backend(other.into()),
        }
    }
}

impl From<StoreError> for ReportError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(message) => ReportError::Unavailable(message),
            StoreError::Backend(err) => ReportError::Storage(err),
        }
    }
}

/// Outcome of a vote insert; the duplicate check and the insert are resolved
/// atomically by the driver.
#[derive(Debug)]
pub enum VoteInsert {
    Recorded(VoteTally),
    Duplicate,
    NotFound,
}

/// What remains of a removed report, for blob cleanup.
#[derive(Debug)]
pub struct RemovedReport {
    pub image_key: Option<String>,
}

/// Durable home of report records. Drivers must serialize the
/// check-then-write inside [`ReportStore::add_vote`] per report.
#[async_trait]
pub trait ReportStore: Send + Sync {
    async fn ping(&self) -> Result<(), StoreError>;

    async fn insert(&self, report: &Report) -> Result<(), StoreError>;

    async fn get(&self, id: Uuid) -> Result<Option<Report>, StoreError>;

    /// Every report, in no particular order.
    async fn list(&self) -> Result<Vec<Report>, StoreError>;

    /// Returns false when the report does not exist.
    async fn set_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        updated_at: OffsetDateTime,
    ) -> Result<bool, StoreError>;

    async fn add_vote(
        &self,
        id: Uuid,
        kind: VoteKind,
        voter: &str,
        updated_at: OffsetDateTime,
    ) -> Result<VoteInsert, StoreError>;

    /// (has sighting vote, has resolved vote) for one voter; None when the
    /// report does not exist.
    async fn voter_status(&self, id: Uuid, voter: &str)
        -> Result<Option<(bool, bool)>, StoreError>;

    async fn remove(&self, id: Uuid) -> Result<Option<RemovedReport>, StoreError>;
}

#[derive(Clone)]
pub struct PgReportStore {
    db: Db,
}

const REPORT_COLUMNS: &str = "r.id, r.issue_type, r.custom_issue, r.description, \
     r.location_name, r.latitude, r.longitude, r.image_key, r.status, \
     r.created_at, r.updated_at, \
     (SELECT coalesce(array_agg(v.voter), ARRAY[]::text[]) \
        FROM report_votes v WHERE v.report_id = r.id AND v.kind = 'sighting') AS sighting_voters, \
     (SELECT coalesce(array_agg(v.voter), ARRAY[]::text[]) \
        FROM report_votes v WHERE v.report_id = r.id AND v.kind = 'resolved') AS resolved_voters";

impl PgReportStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    fn report_from_row(row: &sqlx::postgres::PgRow) -> Result<Report, StoreError> {
        let status: String = row.get("status");
        let status = ReportStatus::from_db(&status)
            .ok_or_else(|| StoreError::Backend(anyhow!("unknown report status: {}", status)))?;

        let sighting_voters: Vec<String> = row.get("sighting_voters");
        let resolved_voters: Vec<String> = row.get("resolved_voters");

        Ok(Report {
            id: row.get("id"),
            issue_type: row.get("issue_type"),
            custom_issue: row.get("custom_issue"),
            description: row.get("description"),
            location_name: row.get("location_name"),
            latitude: row.get("latitude"),
            longitude: row.get("longitude"),
            image_key: row.get("image_key"),
            status,
            sightings: VoteTally::from_voters(sighting_voters),
            resolved: VoteTally::from_voters(resolved_voters),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        })
    }
}

#[async_trait]
impl ReportStore for PgReportStore {
    async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(self.db.pool()).await?;
        Ok(())
    }

    async fn insert(&self, report: &Report) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO reports \
             (id, issue_type, custom_issue, description, location_name, \
              latitude, longitude, image_key, status, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
        )
        .bind(report.id)
        .bind(&report.issue_type)
        .bind(&report.custom_issue)
        .bind(&report.description)
        .bind(&report.location_name)
        .bind(report.latitude)
        .bind(report.longitude)
        .bind(&report.image_key)
        .bind(report.status.as_db())
        .bind(report.created_at)
        .bind(report.updated_at)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Report>, StoreError> {
        let row = sqlx::query(&format!("SELECT {} FROM reports r WHERE r.id = $1", REPORT_COLUMNS))
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.as_ref().map(Self::report_from_row).transpose()
    }

    async fn list(&self) -> Result<Vec<Report>, StoreError> {
        let rows = sqlx::query(&format!("SELECT {} FROM reports r", REPORT_COLUMNS))
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(Self::report_from_row).collect()
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        updated_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let result = sqlx::query("UPDATE reports SET status = $2, updated_at = $3 WHERE id = $1")
            .bind(id)
            .bind(status.as_db())
            .bind(updated_at)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn add_vote(
        &self,
        id: Uuid,
        kind: VoteKind,
        voter: &str,
        updated_at: OffsetDateTime,
    ) -> Result<VoteInsert, StoreError> {
        let mut tx = self.db.pool().begin().await?;

        // Row lock serializes concurrent votes on the same report.
        let report = sqlx::query("SELECT 1 FROM reports WHERE id = $1 FOR UPDATE")
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?;
        if report.is_none() {
            return Ok(VoteInsert::NotFound);
        }

        let inserted = sqlx::query(
            "INSERT INTO report_votes (report_id, kind, voter) \
             VALUES ($1, $2, $3) ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(kind.as_db())
        .bind(voter)
        .execute(&mut *tx)
        .await?;
        if inserted.rows_affected() == 0 {
            return Ok(VoteInsert::Duplicate);
        }

        sqlx::query("UPDATE reports SET updated_at = $2 WHERE id = $1")
            .bind(id)
            .bind(updated_at)
            .execute(&mut *tx)
            .await?;

        let voters: Vec<String> = sqlx::query_scalar(
            "SELECT coalesce(array_agg(voter), ARRAY[]::text[]) \
             FROM report_votes WHERE report_id = $1 AND kind = $2",
        )
        .bind(id)
        .bind(kind.as_db())
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(VoteInsert::Recorded(VoteTally::from_voters(voters)))
    }

    async fn voter_status(
        &self,
        id: Uuid,
        voter: &str,
    ) -> Result<Option<(bool, bool)>, StoreError> {
        let report = sqlx::query("SELECT 1 FROM reports WHERE id = $1")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        if report.is_none() {
            return Ok(None);
        }

        let kinds: Vec<String> = sqlx::query_scalar(
            "SELECT kind FROM report_votes WHERE report_id = $1 AND voter = $2",
        )
        .bind(id)
        .bind(voter)
        .fetch_all(self.db.pool())
        .await?;

        let has_sighted = kinds.iter().any(|kind| kind.as_str() == VoteKind::Sighting.as_db());
        let has_resolved = kinds.iter().any(|kind| kind.as_str() == VoteKind::Resolved.as_db());
        Ok(Some((has_sighted, has_resolved)))
    }

    async fn remove(&self, id: Uuid) -> Result<Option<RemovedReport>, StoreError> {
        // Votes go with the report via ON DELETE CASCADE.
        let row = sqlx::query("DELETE FROM reports WHERE id = $1 RETURNING image_key")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.map(|row| RemovedReport {
            image_key: row.get("image_key"),
        }))
    }
}

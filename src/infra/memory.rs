//! In-memory drivers for local development and the test suite. Everything
//! lives behind one mutex per store, which also serializes the vote
//! check-then-write the way the Postgres driver's row lock does.

use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::report::{Report, ReportStatus, VoteKind};
use crate::infra::storage::ImageStore;
use crate::infra::store::{RemovedReport, ReportStore, StoreError, VoteInsert};

#[derive(Default)]
pub struct MemoryReportStore {
    reports: Mutex<HashMap<Uuid, Report>>,
}

impl MemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for MemoryReportStore {
    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }

    async fn insert(&self, report: &Report) -> Result<(), StoreError> {
        self.reports
            .lock()
            .await
            .insert(report.id, report.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Report>, StoreError> {
        Ok(self.reports.lock().await.get(&id).cloned())
    }

    async fn list(&self) -> Result<Vec<Report>, StoreError> {
        Ok(self.reports.lock().await.values().cloned().collect())
    }

    async fn set_status(
        &self,
        id: Uuid,
        status: ReportStatus,
        updated_at: OffsetDateTime,
    ) -> Result<bool, StoreError> {
        let mut reports = self.reports.lock().await;
        match reports.get_mut(&id) {
            Some(report) => {
                report.status = status;
                report.updated_at = updated_at;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn add_vote(
        &self,
        id: Uuid,
        kind: VoteKind,
        voter: &str,
        updated_at: OffsetDateTime,
    ) -> Result<VoteInsert, StoreError> {
        let mut reports = self.reports.lock().await;
        let Some(report) = reports.get_mut(&id) else {
            return Ok(VoteInsert::NotFound);
        };

        let tally = match kind {
            VoteKind::Sighting => &mut report.sightings,
            VoteKind::Resolved => &mut report.resolved,
        };
        if !tally.record(voter) {
            return Ok(VoteInsert::Duplicate);
        }

        let tally = tally.clone();
        report.updated_at = updated_at;
        Ok(VoteInsert::Recorded(tally))
    }

    async fn voter_status(
        &self,
        id: Uuid,
        voter: &str,
    ) -> Result<Option<(bool, bool)>, StoreError> {
        let reports = self.reports.lock().await;
        Ok(reports
            .get(&id)
            .map(|report| (report.sightings.contains(voter), report.resolved.contains(voter))))
    }

    async fn remove(&self, id: Uuid) -> Result<Option<RemovedReport>, StoreError> {
        let removed = self.reports.lock().await.remove(&id);
        Ok(removed.map(|report| RemovedReport {
            image_key: report.image_key,
        }))
    }
}

#[derive(Default)]
pub struct MemoryImageStore {
    objects: Mutex<HashMap<String, Bytes>>,
}

impl MemoryImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn contains(&self, key: &str) -> bool {
        self.objects.lock().await.contains_key(key)
    }

    pub async fn len(&self) -> usize {
        self.objects.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.lock().await.is_empty()
    }
}

#[async_trait]
impl ImageStore for MemoryImageStore {
    async fn put(&self, key: &str, _content_type: &str, data: Bytes) -> Result<(), StoreError> {
        self.objects.lock().await.insert(key.to_string(), data);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.objects.lock().await.remove(key);
        Ok(())
    }
}

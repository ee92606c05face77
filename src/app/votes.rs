use std::sync::Arc;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::report::{ReportError, VoteKind, VoteTally};
use crate::infra::store::{ReportStore, VoteInsert};

/// Tracks which identities have confirmed a report, one vote per identity
/// per kind. The store serializes the duplicate check against the insert,
/// so two racing votes from one identity cannot both count.
#[derive(Clone)]
pub struct VoteLedger {
    store: Arc<dyn ReportStore>,
}

impl VoteLedger {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Records a vote and returns the post-update tally. A repeat vote from
    /// the same identity is rejected as [`ReportError::AlreadyVoted`] and
    /// leaves the tally untouched.
    pub async fn cast_vote(
        &self,
        report_id: Uuid,
        kind: VoteKind,
        identity: &str,
    ) -> Result<VoteTally, ReportError> {
        let now = OffsetDateTime::now_utc();
        match self.store.add_vote(report_id, kind, identity, now).await? {
            VoteInsert::Recorded(tally) => Ok(tally),
            VoteInsert::Duplicate => Err(ReportError::AlreadyVoted),
            VoteInsert::NotFound => Err(ReportError::NotFound),
        }
    }

    /// Whether the identity has already cast each vote kind, both kinds in
    /// one lookup.
    pub async fn voter_status(
        &self,
        report_id: Uuid,
        identity: &str,
    ) -> Result<(bool, bool), ReportError> {
        self.store
            .voter_status(report_id, identity)
            .await?
            .ok_or(ReportError::NotFound)
    }
}

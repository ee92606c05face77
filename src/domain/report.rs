use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;
use time::OffsetDateTime;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Report {
    pub id: Uuid,
    pub issue_type: String,
    pub custom_issue: Option<String>,
    pub description: Option<String>,
    pub location_name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub image_key: Option<String>,
    pub status: ReportStatus,
    // Absent on records written before vote tracking existed; defaults to the
    // empty tally on read instead of failing.
    #[serde(default)]
    pub sightings: VoteTally,
    #[serde(default)]
    pub resolved: VoteTally,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Pending,
    InProgress,
    Resolved,
}

impl ReportStatus {
    pub fn from_db(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "in_progress" => Some(Self::InProgress),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }

    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Resolved => "resolved",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteKind {
    Sighting,
    Resolved,
}

impl VoteKind {
    pub fn as_db(&self) -> &'static str {
        match self {
            Self::Sighting => "sighting",
            Self::Resolved => "resolved",
        }
    }
}

/// One kind of confirmation on a report: how many identities voted, and which.
///
/// Invariant: `count == voters.len()` at every observable point. All
/// mutation goes through [`VoteTally::record`] so the two cannot drift.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VoteTally {
    pub count: u64,
    #[serde(default)]
    pub voters: HashSet<String>,
}

impl VoteTally {
    pub fn from_voters(voters: Vec<String>) -> Self {
        let voters: HashSet<String> = voters.into_iter().collect();
        Self {
            count: voters.len() as u64,
            voters,
        }
    }

    /// Returns false when the voter was already counted.
    pub fn record(&mut self, voter: &str) -> bool {
        if self.voters.insert(voter.to_string()) {
            self.count += 1;
            true
        } else {
            false
        }
    }

    pub fn contains(&self, voter: &str) -> bool {
        self.voters.contains(voter)
    }
}

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("{0}")]
    Validation(String),
    #[error("report not found")]
    NotFound,
    #[error("duplicate vote for this identity")]
    AlreadyVoted,
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

//! Submission store gateway - the off-chain review queue
//!
//! Members file submissions as `pending`; the settlement coordinator (or an
//! operator rejection) moves them to a terminal status. The store is the
//! one shared mutable resource among member-facing views, so every row
//! change is broadcast on a live-update channel and observers re-fetch
//! rather than patching local copies.

pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::catalog::TaskId;

/// Row id assigned by the store on insert
pub type SubmissionId = u64;

/// Review status of a submission
///
/// Legal transitions: `Pending -> Approved` (successful settlement only)
/// and `Pending -> Rejected` (operator decision). Terminal states never
/// change again.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SubmissionStatus::Pending)
    }
}

impl fmt::Display for SubmissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// One claim of task completion awaiting review
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    pub id: SubmissionId,
    /// Raw chain address as stored; re-validated before settlement
    pub member_address: String,
    pub task_id: TaskId,
    pub task_title: String,
    /// Member-supplied proof text or URL, unvalidated beyond non-empty
    pub proof: String,
    /// XP value snapshotted from the catalog at submission time
    pub xp_reward: u64,
    pub status: SubmissionStatus,
    /// Unix seconds
    pub submitted_at: u64,
}

/// Fields for a new submission; id, status, and timestamp are assigned by
/// the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSubmission {
    pub member_address: String,
    pub task_id: TaskId,
    pub task_title: String,
    pub proof: String,
    pub xp_reward: u64,
}

/// Row-change notification
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreEvent {
    pub kind: StoreEventKind,
    pub submission_id: SubmissionId,
    pub member_address: String,
    pub status: SubmissionStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoreEventKind {
    Inserted,
    Updated,
}

/// Submission store error
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("submission {0} not found")]
    NotFound(SubmissionId),

    /// Attempted to move a submission out of a terminal status
    #[error("submission {id}: illegal transition {from} -> {to}")]
    InvalidTransition {
        id: SubmissionId,
        from: SubmissionStatus,
        to: SubmissionStatus,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// Typed access to the off-chain submission queue
#[async_trait]
pub trait SubmissionStore: Send + Sync {
    /// Persist a new submission as `pending`; returns the assigned id
    async fn insert(&self, new: NewSubmission) -> Result<SubmissionId, StoreError>;

    async fn get(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError>;

    async fn list_by_status(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError>;

    /// All submissions for a member, any status (address compared
    /// case-insensitively)
    async fn list_by_address(&self, address: &str) -> Result<Vec<Submission>, StoreError>;

    /// Move a submission to a new status, enforcing legal transitions
    async fn update_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<(), StoreError>;

    /// Live-update channel; fires on every insert and status change
    fn subscribe(&self) -> broadcast::Receiver<StoreEvent>;
}

//! Read-side projection - member-facing task and status views
//!
//! Pure functions from (catalog, submission history, ledger record) to the
//! views a client renders. Projections are recomputed from fresh inputs on
//! every store change event; nothing here is cached or authoritative.
//!
//! The one-time lock rules are a *display* discipline. Authoritative
//! double-reward prevention lives in the settlement coordinator: rewards
//! are tied to submission ids, so a duplicate pending submission is an
//! operator-visible review problem, never a ledger-consistency problem.

use serde::{Deserialize, Serialize};

use crate::catalog::{Catalog, TaskId};
use crate::ledger::tier::effective_tier;
use crate::ledger::MemberRecord;
use crate::settlement::guard::{self, MintEligibility};
use crate::store::{Submission, SubmissionStatus};

/// Why a one-time task cannot currently be submitted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockReason {
    /// An approved submission exists
    Completed,
    /// A pending submission is in the review queue
    UnderReview,
}

/// Per-task availability for one member
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum TaskState {
    /// Open for submission
    Available,
    /// A pending submission exists on a repeatable task; resubmission is
    /// still allowed
    AwaitingReview,
    /// One-time task with a non-rejected submission
    Locked { reason: LockReason },
}

/// One catalog task as seen by one member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskView {
    pub task_id: TaskId,
    pub title: String,
    pub xp_reward: u64,
    pub one_time: bool,
    pub state: TaskState,
    pub pending: usize,
    pub approved: usize,
}

/// Dashboard summary reconciling displayed tier with on-chain truth
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemberSummary {
    pub xp: u64,
    /// Effective tier - never below what the XP value alone justifies
    pub tier: u8,
    pub tier_name: String,
    pub tier_color: String,
    pub badge_uri: Option<String>,
    pub has_nft: bool,
    pub can_mint: bool,
    /// Human-readable reason when minting is unavailable
    pub mint_blocked: Option<String>,
}

/// Project the member's per-task view from submission history
///
/// `submissions` should be every submission for this member, any status.
pub fn project_tasks(catalog: &Catalog, submissions: &[Submission]) -> Vec<TaskView> {
    catalog
        .tasks()
        .iter()
        .map(|task| {
            let pending = count(submissions, task.id, SubmissionStatus::Pending);
            let approved = count(submissions, task.id, SubmissionStatus::Approved);

            let state = if task.one_time && approved > 0 {
                TaskState::Locked {
                    reason: LockReason::Completed,
                }
            } else if task.one_time && pending > 0 {
                TaskState::Locked {
                    reason: LockReason::UnderReview,
                }
            } else if pending > 0 {
                TaskState::AwaitingReview
            } else {
                TaskState::Available
            };

            TaskView {
                task_id: task.id,
                title: task.title.clone(),
                xp_reward: task.xp_reward,
                one_time: task.one_time,
                state,
                pending,
                approved,
            }
        })
        .collect()
}

/// Project the member dashboard from a ledger read
pub fn member_summary(catalog: &Catalog, record: &MemberRecord) -> MemberSummary {
    let tier = effective_tier(record.xp, record.tier);
    let badge = catalog.badge(tier);

    let (can_mint, mint_blocked) = match guard::check(record) {
        MintEligibility::Eligible { .. } => (true, None),
        MintEligibility::Ineligible(reason) => (false, Some(reason.to_string())),
    };

    MemberSummary {
        xp: record.xp,
        tier,
        tier_name: badge.name.clone(),
        tier_color: badge.color.clone(),
        badge_uri: badge.metadata_uri.clone(),
        has_nft: record.has_nft,
        can_mint,
        mint_blocked,
    }
}

fn count(submissions: &[Submission], task_id: TaskId, status: SubmissionStatus) -> usize {
    submissions
        .iter()
        .filter(|s| s.task_id == task_id && s.status == status)
        .count()
}

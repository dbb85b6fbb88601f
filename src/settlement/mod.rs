//! Settlement coordinator - pending submissions to confirmed ledger credits
//!
//! The coordinator is the only writer that moves a submission to
//! `approved`, and it does so exactly once per id: ledger write first,
//! store write second. The ledger is authoritative - a store failure after
//! confirmation leaves a recoverable inconsistency (XP paid, bookkeeping
//! lagging), while the reverse ordering could mark rewards "approved" that
//! were never paid, so it is disallowed.
//!
//! Approvals are single-flight process-wide: the transaction-sending
//! primitive has no request-id deduplication, so two concurrent sends could
//! double-credit what the operator believes is one action. A second
//! `approve` while one is in flight fails immediately with
//! [`SettlementError::ConcurrencyConflict`]; it is never queued.
//!
//! A confirmation timeout is an *unknown* outcome, not a failure. The
//! coordinator resolves it by re-reading the ledger against a baseline
//! captured before the send - never by resubmitting blindly.

pub mod guard;

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::catalog::Catalog;
use crate::ledger::{
    Confirmation, LedgerError, LedgerGateway, MemberAddress, RejectReason, TxHandle,
};
use crate::store::{StoreError, SubmissionId, SubmissionStatus, SubmissionStore};
use guard::{IneligibleReason, MintEligibility};

/// Settlement error taxonomy
///
/// Every ledger/store failure comes back as a typed result; the `Display`
/// strings are the short human-readable reasons shown to operators and
/// members, distinct from raw transport errors.
#[derive(Debug, Error)]
pub enum SettlementError {
    /// Malformed chain address; rejected before any I/O
    #[error("invalid wallet address: {0:?}")]
    InvalidAddress(String),

    /// Empty proof; rejected before any I/O
    #[error("proof must not be empty")]
    EmptyProof,

    /// Task id not in the catalog; rejected before any I/O
    #[error("unknown task {0}")]
    UnknownTask(u32),

    #[error("submission {0} not found")]
    NotFound(SubmissionId),

    /// Approve/reject precondition: the submission must still be pending
    #[error("submission {id} is already {status}")]
    NotPending {
        id: SubmissionId,
        status: SubmissionStatus,
    },

    /// Another approval is in flight; retry after it reaches a terminal
    /// outcome
    #[error("approval already in progress")]
    ConcurrencyConflict,

    /// The ledger declined the transaction; the reason code is surfaced
    /// verbatim
    #[error("ledger rejected: {0}")]
    LedgerRejected(RejectReason),

    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    /// Confirmation window elapsed and a ledger re-read shows no effect;
    /// the submission stays pending
    #[error("confirmation timed out with no observable ledger effect")]
    ConfirmationTimeout,

    /// XP is credited on the ledger but the status write failed; display
    /// bookkeeping lags until an operator re-marks the submission
    #[error("xp credited but status write failed for submission {id}: {source}")]
    StoreWrite {
        id: SubmissionId,
        source: StoreError,
    },

    #[error("store error: {0}")]
    Store(StoreError),

    /// Mint guard refused before any transaction was constructed
    #[error("mint refused: {0}")]
    MintRefused(IneligibleReason),
}

impl From<LedgerError> for SettlementError {
    fn from(e: LedgerError) -> Self {
        match e {
            LedgerError::Rejected(reason) => SettlementError::LedgerRejected(reason),
            other => SettlementError::LedgerUnavailable(other.to_string()),
        }
    }
}

/// Successful approval
#[derive(Debug, Clone)]
pub struct ApprovalOutcome {
    pub submission_id: SubmissionId,
    pub member: MemberAddress,
    pub xp_credited: u64,
    pub tx: TxHandle,
    /// The confirmation was not observed directly; the credit was
    /// established by re-reading the ledger after the timeout window
    pub reconciled: bool,
}

/// Successful mint
#[derive(Debug, Clone)]
pub struct MintOutcome {
    pub member: MemberAddress,
    pub tier: u8,
    pub metadata_uri: String,
    pub tx: TxHandle,
    pub reconciled: bool,
}

/// Orchestrates submission review against the ledger and the store
pub struct SettlementCoordinator {
    ledger: Arc<dyn LedgerGateway>,
    store: Arc<dyn SubmissionStore>,
    catalog: Arc<Catalog>,
    confirmation_timeout: Duration,
    /// Process-wide single-flight permit for approvals
    approval_permit: Mutex<()>,
}

impl SettlementCoordinator {
    pub fn new(
        ledger: Arc<dyn LedgerGateway>,
        store: Arc<dyn SubmissionStore>,
        catalog: Arc<Catalog>,
        confirmation_timeout: Duration,
    ) -> Self {
        Self {
            ledger,
            store,
            catalog,
            confirmation_timeout,
            approval_permit: Mutex::new(()),
        }
    }

    /// Settle a pending submission: credit its XP on the ledger, then mark
    /// it approved in the store
    ///
    /// At most one ledger write is attempted per invocation; nothing is
    /// retried automatically.
    pub async fn approve(&self, id: SubmissionId) -> Result<ApprovalOutcome, SettlementError> {
        let _permit = self
            .approval_permit
            .try_lock()
            .map_err(|_| SettlementError::ConcurrencyConflict)?;

        let submission = self
            .store
            .get(id)
            .await
            .map_err(SettlementError::Store)?
            .ok_or(SettlementError::NotFound(id))?;

        if submission.status != SubmissionStatus::Pending {
            return Err(SettlementError::NotPending {
                id,
                status: submission.status,
            });
        }

        // Store rows come from outside; re-validate before building any
        // transaction.
        let member = MemberAddress::parse(&submission.member_address)
            .map_err(|e| SettlementError::InvalidAddress(e.0))?;

        // Baseline read: the only way to resolve a post-timeout unknown.
        let baseline = self.ledger.read_member(&member).await?;

        info!(
            submission_id = id,
            member = %member.short(),
            task = %submission.task_title,
            xp = submission.xp_reward,
            "submitting xp increment"
        );
        let tx = self
            .ledger
            .send_xp_increment(&member, submission.xp_reward)
            .await?;

        let reconciled = match self
            .ledger
            .await_confirmation(&tx, self.confirmation_timeout)
            .await?
        {
            Confirmation::Confirmed => false,
            Confirmation::Failed(reason) => {
                warn!(
                    submission_id = id,
                    %tx,
                    reason = %reason,
                    "transaction reverted; submission stays pending"
                );
                return Err(SettlementError::LedgerRejected(reason));
            }
            Confirmation::TimedOut => {
                let fresh = self.ledger.read_member(&member).await?;
                if fresh.xp >= baseline.xp.saturating_add(submission.xp_reward) {
                    info!(
                        submission_id = id,
                        %tx,
                        "confirmation timed out but the ledger shows the credit; reconciling"
                    );
                    true
                } else {
                    warn!(
                        submission_id = id,
                        %tx,
                        "confirmation timed out and no credit is visible; submission stays pending"
                    );
                    return Err(SettlementError::ConfirmationTimeout);
                }
            }
        };

        // XP is paid from here on. A store failure is an inconsistency to
        // reconcile, not a reason to pretend the credit didn't happen.
        if let Err(source) = self
            .store
            .update_status(id, SubmissionStatus::Approved)
            .await
        {
            error!(
                submission_id = id,
                member = %member.short(),
                xp = submission.xp_reward,
                error = %source,
                "xp credited but status write failed; submission left pending for reconciliation"
            );
            return Err(SettlementError::StoreWrite { id, source });
        }

        info!(submission_id = id, %tx, reconciled, "submission approved");
        Ok(ApprovalOutcome {
            submission_id: id,
            member,
            xp_credited: submission.xp_reward,
            tx,
            reconciled,
        })
    }

    /// Operator reconciliation: mark a pending submission approved without
    /// a new ledger write
    ///
    /// Recovery path for the inconsistency a [`SettlementError::StoreWrite`]
    /// leaves behind: XP confirmed on chain, status still pending.
    /// Re-approving would send a second increment, so this writes the store
    /// only. The current ledger record is read and logged so the operator
    /// decision is taken against on-chain truth, never a cached copy.
    pub async fn mark_settled(&self, id: SubmissionId) -> Result<(), SettlementError> {
        let submission = self
            .store
            .get(id)
            .await
            .map_err(SettlementError::Store)?
            .ok_or(SettlementError::NotFound(id))?;

        if submission.status != SubmissionStatus::Pending {
            return Err(SettlementError::NotPending {
                id,
                status: submission.status,
            });
        }

        let member = MemberAddress::parse(&submission.member_address)
            .map_err(|e| SettlementError::InvalidAddress(e.0))?;
        let record = self.ledger.read_member(&member).await?;

        self.store
            .update_status(id, SubmissionStatus::Approved)
            .await
            .map_err(SettlementError::Store)?;

        info!(
            submission_id = id,
            member = %member.short(),
            ledger_xp = record.xp,
            "submission marked settled by operator"
        );
        Ok(())
    }

    /// Reject a pending submission; store write only, no ledger
    /// interaction, safe to retry
    pub async fn reject(&self, id: SubmissionId) -> Result<(), SettlementError> {
        let submission = self
            .store
            .get(id)
            .await
            .map_err(SettlementError::Store)?
            .ok_or(SettlementError::NotFound(id))?;

        if submission.status != SubmissionStatus::Pending {
            return Err(SettlementError::NotPending {
                id,
                status: submission.status,
            });
        }

        self.store
            .update_status(id, SubmissionStatus::Rejected)
            .await
            .map_err(SettlementError::Store)?;

        info!(submission_id = id, "submission rejected");
        Ok(())
    }

    /// Mint the member's identity NFT for their current effective tier
    ///
    /// The guard runs against a record read here, immediately before the
    /// send - a stale in-memory copy must never gate a mint.
    pub async fn mint(&self, member: &MemberAddress) -> Result<MintOutcome, SettlementError> {
        let fresh = self.ledger.read_member(member).await?;

        let tier = match guard::check(&fresh) {
            MintEligibility::Eligible { tier } => tier,
            MintEligibility::Ineligible(reason) => {
                info!(member = %member.short(), reason = %reason, "mint refused by guard");
                return Err(SettlementError::MintRefused(reason));
            }
        };

        let metadata_uri = self
            .catalog
            .badge(tier)
            .metadata_uri
            .clone()
            .unwrap_or_default();

        info!(member = %member.short(), tier, uri = %metadata_uri, "submitting mint");
        let tx = self.ledger.send_mint(member, &metadata_uri).await?;

        let reconciled = match self
            .ledger
            .await_confirmation(&tx, self.confirmation_timeout)
            .await?
        {
            Confirmation::Confirmed => false,
            Confirmation::Failed(reason) => {
                warn!(member = %member.short(), %tx, reason = %reason, "mint reverted");
                return Err(SettlementError::LedgerRejected(reason));
            }
            Confirmation::TimedOut => {
                let re_read = self.ledger.read_member(member).await?;
                if re_read.has_nft {
                    info!(member = %member.short(), %tx, "mint timed out but NFT is on chain; reconciling");
                    true
                } else {
                    warn!(member = %member.short(), %tx, "mint timed out with no NFT visible");
                    return Err(SettlementError::ConfirmationTimeout);
                }
            }
        };

        info!(member = %member.short(), %tx, tier, reconciled, "identity NFT minted");
        Ok(MintOutcome {
            member: member.clone(),
            tier,
            metadata_uri,
            tx,
            reconciled,
        })
    }
}

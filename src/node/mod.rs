//! Registry node - composition root
//!
//! Wires the catalog, gateway adapters, and settlement coordinator together
//! and exposes the member-facing and operator-facing operations. Member
//! input is validated here, before any I/O; everything ledger-shaped is
//! delegated to the coordinator.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tracing::info;

use crate::catalog::{Catalog, TaskId};
use crate::ledger::{LedgerGateway, MemberAddress};
use crate::projection::{self, MemberSummary, TaskView};
use crate::settlement::{ApprovalOutcome, MintOutcome, SettlementCoordinator, SettlementError};
use crate::store::{
    NewSubmission, StoreEvent, Submission, SubmissionId, SubmissionStatus, SubmissionStore,
};

/// The reward settlement runtime
pub struct RegistryNode {
    catalog: Arc<Catalog>,
    ledger: Arc<dyn LedgerGateway>,
    store: Arc<dyn SubmissionStore>,
    coordinator: SettlementCoordinator,
}

impl RegistryNode {
    pub fn new(
        catalog: Catalog,
        ledger: Arc<dyn LedgerGateway>,
        store: Arc<dyn SubmissionStore>,
        confirmation_timeout: Duration,
    ) -> Self {
        let catalog = Arc::new(catalog);
        let coordinator = SettlementCoordinator::new(
            Arc::clone(&ledger),
            Arc::clone(&store),
            Arc::clone(&catalog),
            confirmation_timeout,
        );
        Self {
            catalog,
            ledger,
            store,
            coordinator,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    /// Live-update channel over the submission queue
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.store.subscribe()
    }

    // ==================== Member operations ====================

    /// File a proof of task completion; lands as `pending`
    ///
    /// Address, proof, and task id are validated before any I/O. The XP
    /// value is snapshotted from the catalog here.
    pub async fn submit_proof(
        &self,
        address: &str,
        task_id: TaskId,
        proof: &str,
    ) -> Result<SubmissionId, SettlementError> {
        let member = MemberAddress::parse(address)
            .map_err(|e| SettlementError::InvalidAddress(e.0))?;
        let proof = proof.trim();
        if proof.is_empty() {
            return Err(SettlementError::EmptyProof);
        }
        let task = self
            .catalog
            .task(task_id)
            .ok_or(SettlementError::UnknownTask(task_id))?;

        let id = self
            .store
            .insert(NewSubmission {
                member_address: member.as_str().to_string(),
                task_id: task.id,
                task_title: task.title.clone(),
                proof: proof.to_string(),
                xp_reward: task.xp_reward,
            })
            .await
            .map_err(SettlementError::Store)?;

        info!(
            submission_id = id,
            member = %member.short(),
            task = %task.title,
            "proof submitted"
        );
        Ok(id)
    }

    /// Dashboard summary from a fresh ledger read
    pub async fn member_summary(&self, address: &str) -> Result<MemberSummary, SettlementError> {
        let member = MemberAddress::parse(address)
            .map_err(|e| SettlementError::InvalidAddress(e.0))?;
        let record = self.ledger.read_member(&member).await?;
        Ok(projection::member_summary(&self.catalog, &record))
    }

    /// Per-task availability for a member
    pub async fn task_views(&self, address: &str) -> Result<Vec<TaskView>, SettlementError> {
        let member = MemberAddress::parse(address)
            .map_err(|e| SettlementError::InvalidAddress(e.0))?;
        let submissions = self
            .store
            .list_by_address(member.as_str())
            .await
            .map_err(SettlementError::Store)?;
        Ok(projection::project_tasks(&self.catalog, &submissions))
    }

    /// Mint the member's identity NFT (guarded, fresh-read)
    pub async fn mint(&self, address: &str) -> Result<MintOutcome, SettlementError> {
        let member = MemberAddress::parse(address)
            .map_err(|e| SettlementError::InvalidAddress(e.0))?;
        self.coordinator.mint(&member).await
    }

    // ==================== Operator operations ====================

    /// Submissions awaiting review
    pub async fn pending_queue(&self) -> Result<Vec<Submission>, SettlementError> {
        self.store
            .list_by_status(SubmissionStatus::Pending)
            .await
            .map_err(SettlementError::Store)
    }

    /// Approve and settle one pending submission
    pub async fn approve(&self, id: SubmissionId) -> Result<ApprovalOutcome, SettlementError> {
        self.coordinator.approve(id).await
    }

    /// Reject one pending submission
    pub async fn reject(&self, id: SubmissionId) -> Result<(), SettlementError> {
        self.coordinator.reject(id).await
    }

    /// Mark a pending submission approved with no ledger write, after the
    /// operator has verified the credit already landed
    pub async fn mark_settled(&self, id: SubmissionId) -> Result<(), SettlementError> {
        self.coordinator.mark_settled(id).await
    }
}

//! In-process ledger adapter
//!
//! Behaves like the deployed registry contract: operator-role gate on XP
//! writes, the full mint rule set with machine-readable reject reasons, and
//! effects that become visible only at confirmation time. Confirmation
//! outcomes can be scripted so callers can exercise the ambiguous-timeout
//! paths (transaction landed vs. dropped) deterministically.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use super::tier::{effective_tier, MAX_TIER};
use super::{
    Confirmation, LedgerError, LedgerGateway, MemberAddress, MemberRecord, RejectReason, TxHandle,
};

/// Scripted outcome for the next confirmation wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimOutcome {
    /// Mine and apply the transaction
    Confirm,
    /// Mine but revert with the given reason
    Fail(RejectReason),
    /// Apply the transaction, but report the wait as timed out - the
    /// "landed after the client gave up" case
    TimeoutLanded,
    /// Never mine the transaction; the wait times out
    TimeoutDropped,
}

#[derive(Debug, Clone)]
enum TxKind {
    XpIncrement { member: MemberAddress, amount: u64 },
    Mint { member: MemberAddress },
}

/// In-memory [`LedgerGateway`] implementation
pub struct SimLedger {
    members: RwLock<HashMap<MemberAddress, MemberRecord>>,
    pending: Mutex<HashMap<TxHandle, TxKind>>,
    script: Mutex<VecDeque<SimOutcome>>,
    operator_authorized: bool,
    minting_allowed: bool,
}

impl SimLedger {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            members: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            script: Mutex::new(VecDeque::new()),
            operator_authorized: true,
            minting_allowed: true,
        })
    }

    /// A ledger whose operator account lacks the admin role
    pub fn unauthorized() -> Arc<Self> {
        Arc::new(Self {
            members: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            script: Mutex::new(VecDeque::new()),
            operator_authorized: false,
            minting_allowed: true,
        })
    }

    /// A ledger with minting globally disabled
    pub fn minting_disabled() -> Arc<Self> {
        Arc::new(Self {
            members: RwLock::new(HashMap::new()),
            pending: Mutex::new(HashMap::new()),
            script: Mutex::new(VecDeque::new()),
            operator_authorized: true,
            minting_allowed: false,
        })
    }

    /// Seed a member record
    pub async fn register(&self, member: MemberAddress, record: MemberRecord) {
        self.members.write().await.insert(member, record);
    }

    /// Overwrite a member's posted tier (models the contract's own tier
    /// recalculation, which the core treats as eventually consistent)
    pub async fn post_tier(&self, member: &MemberAddress, tier: u8) {
        if let Some(record) = self.members.write().await.get_mut(member) {
            record.tier = tier;
        }
    }

    /// Force the member's NFT flag, e.g. to stage a mint race from another
    /// flow
    pub async fn set_nft(&self, member: &MemberAddress, has_nft: bool) {
        if let Some(record) = self.members.write().await.get_mut(member) {
            record.has_nft = has_nft;
        }
    }

    /// Script the outcome of the next confirmation wait (FIFO; defaults to
    /// [`SimOutcome::Confirm`] when the script is empty)
    pub async fn script_next(&self, outcome: SimOutcome) {
        self.script.lock().await.push_back(outcome);
    }

    async fn apply(&self, kind: &TxKind) {
        let mut members = self.members.write().await;
        match kind {
            TxKind::XpIncrement { member, amount } => {
                let record = members.entry(member.clone()).or_default();
                record.xp = record.xp.saturating_add(*amount);
                // The contract recalculates tier on its own schedule; the
                // posted tier deliberately lags here.
            }
            TxKind::Mint { member } => {
                let record = members.entry(member.clone()).or_default();
                record.has_nft = true;
            }
        }
    }

    fn handle() -> TxHandle {
        TxHandle(format!("0x{}", Uuid::new_v4().simple()))
    }
}

#[async_trait]
impl LedgerGateway for SimLedger {
    async fn read_member(&self, member: &MemberAddress) -> Result<MemberRecord, LedgerError> {
        Ok(self
            .members
            .read()
            .await
            .get(member)
            .copied()
            .unwrap_or_default())
    }

    async fn send_xp_increment(
        &self,
        member: &MemberAddress,
        amount: u64,
    ) -> Result<TxHandle, LedgerError> {
        if !self.operator_authorized {
            return Err(LedgerError::Rejected(RejectReason::Unauthorized));
        }

        let tx = Self::handle();
        debug!(%tx, %member, amount, "xp increment submitted");
        self.pending.lock().await.insert(
            tx.clone(),
            TxKind::XpIncrement {
                member: member.clone(),
                amount,
            },
        );
        Ok(tx)
    }

    async fn send_mint(
        &self,
        member: &MemberAddress,
        metadata_uri: &str,
    ) -> Result<TxHandle, LedgerError> {
        let record = {
            let members = self.members.read().await;
            members.get(member).copied()
        };

        // Same require-chain the contract runs; the mint guard should have
        // short-circuited before any of these fire.
        let record = record.ok_or(LedgerError::Rejected(RejectReason::NotRegistered))?;
        if record.has_nft {
            return Err(LedgerError::Rejected(RejectReason::AlreadyMinted));
        }
        if !self.minting_allowed {
            return Err(LedgerError::Rejected(RejectReason::MintingNotAllowed));
        }
        let tier = effective_tier(record.xp, record.tier);
        if tier == 0 {
            return Err(LedgerError::Rejected(RejectReason::InsufficientXp));
        }
        if tier > MAX_TIER {
            return Err(LedgerError::Rejected(RejectReason::InvalidTier));
        }
        if metadata_uri.is_empty() {
            return Err(LedgerError::Rejected(RejectReason::NotEligible));
        }

        let tx = Self::handle();
        debug!(%tx, %member, tier, "mint submitted");
        self.pending.lock().await.insert(
            tx.clone(),
            TxKind::Mint {
                member: member.clone(),
            },
        );
        Ok(tx)
    }

    async fn await_confirmation(
        &self,
        tx: &TxHandle,
        _timeout: Duration,
    ) -> Result<Confirmation, LedgerError> {
        let outcome = self
            .script
            .lock()
            .await
            .pop_front()
            .unwrap_or(SimOutcome::Confirm);

        let kind = {
            let mut pending = self.pending.lock().await;
            match outcome {
                // A dropped transaction stays pending forever.
                SimOutcome::TimeoutDropped => pending.get(tx).cloned(),
                _ => pending.remove(tx),
            }
        };
        let kind = kind.ok_or_else(|| LedgerError::UnknownTransaction(tx.clone()))?;

        match outcome {
            SimOutcome::Confirm => {
                self.apply(&kind).await;
                Ok(Confirmation::Confirmed)
            }
            SimOutcome::Fail(reason) => Ok(Confirmation::Failed(reason)),
            SimOutcome::TimeoutLanded => {
                self.apply(&kind).await;
                Ok(Confirmation::TimedOut)
            }
            SimOutcome::TimeoutDropped => Ok(Confirmation::TimedOut),
        }
    }
}

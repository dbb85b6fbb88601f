//! Mint guard - pre-flight eligibility check
//!
//! Run against a record read immediately before the mint transaction is
//! sent, not a cached one. A failed guard short-circuits before any
//! transaction is constructed, so no fees are spent on a send the contract
//! would reject anyway. The guard never mutates state.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ledger::tier::effective_tier;
use crate::ledger::MemberRecord;

/// Result of the pre-flight check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MintEligibility {
    /// Clear to send; `tier` is the effective tier the badge is minted for
    Eligible { tier: u8 },
    Ineligible(IneligibleReason),
}

impl MintEligibility {
    pub fn is_eligible(&self) -> bool {
        matches!(self, MintEligibility::Eligible { .. })
    }
}

/// Why a mint must not be attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IneligibleReason {
    /// One NFT per member, and this member already holds one
    #[error("already minted")]
    AlreadyMinted,

    /// Effective tier is 0
    #[error("insufficient XP")]
    InsufficientXp,
}

/// Check mint eligibility against a freshly read ledger record
///
/// Rules in order: an existing NFT blocks regardless of tier; then the
/// effective tier must be above 0.
pub fn check(fresh: &MemberRecord) -> MintEligibility {
    if fresh.has_nft {
        return MintEligibility::Ineligible(IneligibleReason::AlreadyMinted);
    }

    let tier = effective_tier(fresh.xp, fresh.tier);
    if tier == 0 {
        return MintEligibility::Ineligible(IneligibleReason::InsufficientXp);
    }

    MintEligibility::Eligible { tier }
}

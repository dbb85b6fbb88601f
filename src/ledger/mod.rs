//! Ledger gateway - typed access to the on-chain member registry
//!
//! The ledger is the authoritative store of member XP, tier, and NFT state.
//! It is mutated only by signed transactions from the operator account; this
//! module exposes it behind the [`LedgerGateway`] trait so the settlement
//! core never touches a transport directly. Adapters implement the trait
//! (the in-process [`sim::SimLedger`] ships with the crate).

pub mod sim;
pub mod tier;

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// A validated, lowercase-normalized chain address
///
/// Parsing is the single validation point: anything held in a
/// `MemberAddress` is well-formed (`0x` + 40 hex digits). The submission
/// store keeps raw strings, so the coordinator re-parses before any
/// transaction is built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MemberAddress(String);

/// A string that failed chain-address validation
#[derive(Debug, Clone, Error)]
#[error("invalid chain address: {0:?}")]
pub struct InvalidAddress(pub String);

impl MemberAddress {
    pub fn parse(raw: &str) -> Result<Self, InvalidAddress> {
        let trimmed = raw.trim();
        let digits = trimmed
            .strip_prefix("0x")
            .or_else(|| trimmed.strip_prefix("0X"))
            .ok_or_else(|| InvalidAddress(raw.to_string()))?;
        if digits.len() != 40 || hex::decode(digits).is_err() {
            return Err(InvalidAddress(raw.to_string()));
        }
        Ok(Self(format!("0x{}", digits.to_ascii_lowercase())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `0x1234...abcd` form for log lines and listings
    pub fn short(&self) -> String {
        format!("{}...{}", &self.0[..6], &self.0[self.0.len() - 4..])
    }
}

impl fmt::Display for MemberAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for MemberAddress {
    type Error = InvalidAddress;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<MemberAddress> for String {
    fn from(value: MemberAddress) -> Self {
        value.0
    }
}

/// Point-in-time read of a member's on-chain record
///
/// Owned entirely by the ledger; the core never holds a writable copy.
/// Unregistered members read as all zeroes, matching the contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberRecord {
    pub xp: u64,
    pub tier: u8,
    pub has_nft: bool,
}

/// Handle to a transaction submitted to the network
///
/// Once sent, a transaction cannot be cancelled; the only terminal actions
/// are waiting for confirmation or timing out and re-reading ledger state.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxHandle(pub String);

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of waiting for a transaction to be mined
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Mined and applied
    Confirmed,
    /// Mined but reverted
    Failed(RejectReason),
    /// Not observed within the timeout window; outcome unknown until the
    /// ledger is re-read
    TimedOut,
}

/// Machine-readable reason codes surfaced by the contract
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RejectReason {
    AlreadyMinted,
    NotEligible,
    TierNotMet,
    InsufficientXp,
    NotRegistered,
    MintingNotAllowed,
    InvalidTier,
    Unauthorized,
}

impl RejectReason {
    /// The wire-level reason code
    pub fn code(&self) -> &'static str {
        match self {
            RejectReason::AlreadyMinted => "already-minted",
            RejectReason::NotEligible => "not-eligible",
            RejectReason::TierNotMet => "tier-not-met",
            RejectReason::InsufficientXp => "insufficient-xp",
            RejectReason::NotRegistered => "not-registered",
            RejectReason::MintingNotAllowed => "minting-not-allowed",
            RejectReason::InvalidTier => "invalid-tier",
            RejectReason::Unauthorized => "unauthorized",
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Ledger gateway error
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// The contract declined the transaction
    #[error("ledger rejected: {0}")]
    Rejected(RejectReason),

    /// The ledger could not be reached
    #[error("ledger unreachable: {0}")]
    Transport(String),

    /// No transaction known for the handle
    #[error("unknown transaction: {0}")]
    UnknownTransaction(TxHandle),
}

/// Typed read/write access to the on-chain member registry
///
/// Reads are side-effect-free. Writes return a [`TxHandle`] immediately;
/// effects are visible only after [`await_confirmation`] reports
/// [`Confirmation::Confirmed`], or after a re-read proves they landed.
///
/// [`await_confirmation`]: LedgerGateway::await_confirmation
#[async_trait]
pub trait LedgerGateway: Send + Sync {
    /// Read a member's record; unregistered members read as zeroes
    async fn read_member(&self, member: &MemberAddress) -> Result<MemberRecord, LedgerError>;

    /// Submit an XP-increment transaction for `member`
    ///
    /// Fails with [`RejectReason::Unauthorized`] when the sending account
    /// lacks the operator role.
    async fn send_xp_increment(
        &self,
        member: &MemberAddress,
        amount: u64,
    ) -> Result<TxHandle, LedgerError>;

    /// Submit a mint transaction for the member's identity NFT
    async fn send_mint(
        &self,
        member: &MemberAddress,
        metadata_uri: &str,
    ) -> Result<TxHandle, LedgerError>;

    /// Wait for a submitted transaction to reach a terminal state
    async fn await_confirmation(
        &self,
        tx: &TxHandle,
        timeout: Duration,
    ) -> Result<Confirmation, LedgerError>;
}

//! Node configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub node: NodeConfig,
    #[serde(default)]
    pub ledger: LedgerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub seed: SeedConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Unique node identifier
    #[serde(default = "default_node_id")]
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// Deployed registry contract address
    #[serde(default = "default_contract_address")]
    pub contract_address: String,

    /// Operator account expected to hold the admin role
    #[serde(default)]
    pub operator_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Buffer size of the live-update broadcast channel; slow subscribers
    /// that fall more than this far behind miss events and must re-fetch
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    /// How long to wait for a transaction confirmation before treating the
    /// outcome as unknown
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,
}

impl SettlementConfig {
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
}

/// Local-mode seed data for the in-process ledger and store
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeedConfig {
    #[serde(default)]
    pub members: Vec<SeedMember>,

    #[serde(default)]
    pub submissions: Vec<SeedSubmission>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedMember {
    pub address: String,
    #[serde(default)]
    pub xp: u64,
    #[serde(default)]
    pub tier: u8,
    #[serde(default)]
    pub has_nft: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSubmission {
    pub address: String,
    pub task: u32,
    pub proof: String,
}

// Defaults
fn default_node_id() -> String {
    "registry-node-1".to_string()
}
fn default_contract_address() -> String {
    "0x1d13fcc1820f6b1bc725473f2ce9184333211000".to_string()
}
fn default_confirmation_timeout() -> u64 {
    60
}
fn default_event_capacity() -> usize {
    64
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            id: default_node_id(),
        }
    }
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            contract_address: default_contract_address(),
            operator_address: None,
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout_secs: default_confirmation_timeout(),
        }
    }
}

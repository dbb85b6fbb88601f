//! registry-node: Reward settlement runtime for the Identity Registry
//! community program
//!
//! Members earn XP for community tasks and redeem it for a tier badge and
//! an on-chain identity NFT. This crate is the coordination core between
//! the two systems of record:
//! - the on-chain ledger (XP, tier, NFT flag), mutated only by operator
//!   transactions and treated as authoritative
//! - the off-chain submission queue (pending/approved/rejected), mutated
//!   by member inserts and operator review
//!
//! The settlement coordinator moves a submission from `pending` to a
//! blockchain-confirmed `approved` exactly once; the projection layer
//! derives every client-visible view from fresh reads of both.

pub mod catalog;
pub mod config;
pub mod ledger;
pub mod node;
pub mod projection;
pub mod settlement;
pub mod store;

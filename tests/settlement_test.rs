//! Settlement coordinator integration tests
//!
//! Exercises the full approve/reject/mint paths against the in-process
//! adapters:
//! - exactly-once XP crediting, ledger-first write ordering
//! - single-flight approval serialization
//! - ambiguous-timeout reconciliation (landed vs dropped)
//! - ledger-credited-but-store-write-failed inconsistency
//! - mint guard short-circuit and fresh-read race

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use registry_node::catalog::Catalog;
use registry_node::ledger::sim::{SimLedger, SimOutcome};
use registry_node::ledger::{
    Confirmation, LedgerError, LedgerGateway, MemberAddress, MemberRecord, RejectReason, TxHandle,
};
use registry_node::node::RegistryNode;
use registry_node::settlement::guard::IneligibleReason;
use registry_node::settlement::SettlementError;
use registry_node::store::memory::MemoryStore;
use registry_node::store::{NewSubmission, SubmissionStatus, SubmissionStore};

const MEMBER: &str = "0xabcdef0123456789abcdef0123456789abcdef01";
const OTHER: &str = "0x1111111111111111111111111111111111111111";

fn member() -> MemberAddress {
    MemberAddress::parse(MEMBER).unwrap()
}

fn build() -> (Arc<RegistryNode>, Arc<SimLedger>, Arc<MemoryStore>) {
    let ledger = SimLedger::new();
    let store = MemoryStore::new();
    let node = RegistryNode::new(
        Catalog::builtin(),
        ledger.clone(),
        store.clone(),
        Duration::from_secs(5),
    );
    (Arc::new(node), ledger, store)
}

// =============================================================================
// Approval happy path
// =============================================================================

#[tokio::test]
async fn approve_credits_exactly_the_snapshot_reward() {
    let (node, ledger, store) = build();
    ledger.register(member(), MemberRecord::default()).await;

    // Task 1 ("Follow on Twitter") is worth 50 XP.
    let id = node
        .submit_proof(MEMBER, 1, "https://twitter.com/me/status/1")
        .await
        .unwrap();

    let outcome = node.approve(id).await.unwrap();
    assert_eq!(outcome.xp_credited, 50);
    assert!(!outcome.reconciled);

    let row = store.get(id).await.unwrap().unwrap();
    assert_eq!(row.status, SubmissionStatus::Approved);

    let record = ledger.read_member(&member()).await.unwrap();
    assert_eq!(record.xp, 50);
}

#[tokio::test]
async fn approve_is_tied_to_the_submission_snapshot_not_the_catalog() {
    let (node, ledger, _store) = build();
    ledger.register(member(), MemberRecord::default()).await;

    // Two submissions for different tasks credit their own snapshots.
    let a = node.submit_proof(MEMBER, 3, "discord screenshot").await.unwrap();
    let b = node.submit_proof(MEMBER, 2, "https://blog.example/post").await.unwrap();

    assert_eq!(node.approve(a).await.unwrap().xp_credited, 30);
    assert_eq!(node.approve(b).await.unwrap().xp_credited, 150);
    assert_eq!(ledger.read_member(&member()).await.unwrap().xp, 180);
}

// =============================================================================
// Input validation
// =============================================================================

#[tokio::test]
async fn approve_with_malformed_address_sends_nothing() {
    let (node, ledger, store) = build();

    // Rows arrive from outside the process; insert a corrupt one directly.
    let id = store
        .insert(NewSubmission {
            member_address: "not-an-address".to_string(),
            task_id: 1,
            task_title: "Follow on Twitter".to_string(),
            proof: "proof".to_string(),
            xp_reward: 50,
        })
        .await
        .unwrap();

    let err = node.approve(id).await.unwrap_err();
    assert!(matches!(err, SettlementError::InvalidAddress(_)));

    // Still pending, and nothing was credited anywhere.
    let row = store.get(id).await.unwrap().unwrap();
    assert_eq!(row.status, SubmissionStatus::Pending);
    assert_eq!(ledger.read_member(&member()).await.unwrap().xp, 0);
}

#[tokio::test]
async fn submit_proof_validates_before_any_io() {
    let (node, _ledger, store) = build();

    assert!(matches!(
        node.submit_proof("0x123", 1, "proof").await.unwrap_err(),
        SettlementError::InvalidAddress(_)
    ));
    assert!(matches!(
        node.submit_proof(MEMBER, 1, "   ").await.unwrap_err(),
        SettlementError::EmptyProof
    ));
    assert!(matches!(
        node.submit_proof(MEMBER, 99, "proof").await.unwrap_err(),
        SettlementError::UnknownTask(99)
    ));

    // Nothing reached the store.
    let queue = store
        .list_by_status(SubmissionStatus::Pending)
        .await
        .unwrap();
    assert!(queue.is_empty());
}

#[tokio::test]
async fn approve_missing_or_settled_submissions_fails() {
    let (node, ledger, _store) = build();
    ledger.register(member(), MemberRecord::default()).await;

    assert!(matches!(
        node.approve(42).await.unwrap_err(),
        SettlementError::NotFound(42)
    ));

    let id = node.submit_proof(MEMBER, 1, "proof").await.unwrap();
    node.approve(id).await.unwrap();

    let err = node.approve(id).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::NotPending {
            status: SubmissionStatus::Approved,
            ..
        }
    ));
    // The ledger write ran once; re-approval attempts change nothing.
    assert_eq!(ledger.read_member(&member()).await.unwrap().xp, 50);
}

// =============================================================================
// Single-flight serialization
// =============================================================================

/// Wraps the sim ledger with confirmation latency so a second approve can
/// arrive while the first is still in flight.
struct SlowLedger {
    inner: Arc<SimLedger>,
    delay: Duration,
}

#[async_trait]
impl LedgerGateway for SlowLedger {
    async fn read_member(&self, m: &MemberAddress) -> Result<MemberRecord, LedgerError> {
        self.inner.read_member(m).await
    }

    async fn send_xp_increment(
        &self,
        m: &MemberAddress,
        amount: u64,
    ) -> Result<TxHandle, LedgerError> {
        self.inner.send_xp_increment(m, amount).await
    }

    async fn send_mint(&self, m: &MemberAddress, uri: &str) -> Result<TxHandle, LedgerError> {
        self.inner.send_mint(m, uri).await
    }

    async fn await_confirmation(
        &self,
        tx: &TxHandle,
        timeout: Duration,
    ) -> Result<Confirmation, LedgerError> {
        tokio::time::sleep(self.delay).await;
        self.inner.await_confirmation(tx, timeout).await
    }
}

#[tokio::test]
async fn second_approve_is_rejected_while_one_is_in_flight() {
    let sim = SimLedger::new();
    sim.register(member(), MemberRecord::default()).await;
    sim.register(MemberAddress::parse(OTHER).unwrap(), MemberRecord::default())
        .await;

    let ledger = Arc::new(SlowLedger {
        inner: sim.clone(),
        delay: Duration::from_millis(200),
    });
    let store = MemoryStore::new();
    let node = Arc::new(RegistryNode::new(
        Catalog::builtin(),
        ledger,
        store,
        Duration::from_secs(5),
    ));

    let first = node.submit_proof(MEMBER, 1, "proof one").await.unwrap();
    let second = node.submit_proof(OTHER, 3, "proof two").await.unwrap();

    let worker = {
        let node = Arc::clone(&node);
        tokio::spawn(async move { node.approve(first).await })
    };

    // Let the first approval reach its confirmation wait.
    tokio::time::sleep(Duration::from_millis(50)).await;

    let err = node.approve(second).await.unwrap_err();
    assert!(matches!(err, SettlementError::ConcurrencyConflict));

    // The in-flight approval is unaffected, and the permit frees up after
    // its terminal outcome.
    worker.await.unwrap().unwrap();
    node.approve(second).await.unwrap();
}

// =============================================================================
// Ledger rejection and timeout handling
// =============================================================================

#[tokio::test]
async fn unauthorized_operator_leaves_submission_pending() {
    let ledger = SimLedger::unauthorized();
    let store = MemoryStore::new();
    let node = RegistryNode::new(
        Catalog::builtin(),
        ledger.clone(),
        store.clone(),
        Duration::from_secs(5),
    );

    let id = node.submit_proof(MEMBER, 1, "proof").await.unwrap();
    let err = node.approve(id).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::LedgerRejected(RejectReason::Unauthorized)
    ));

    let row = store.get(id).await.unwrap().unwrap();
    assert_eq!(row.status, SubmissionStatus::Pending);
}

#[tokio::test]
async fn reverted_transaction_surfaces_its_reason_code() {
    let (node, ledger, store) = build();
    ledger.register(member(), MemberRecord::default()).await;
    ledger
        .script_next(SimOutcome::Fail(RejectReason::NotRegistered))
        .await;

    let id = node.submit_proof(MEMBER, 1, "proof").await.unwrap();
    let err = node.approve(id).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::LedgerRejected(RejectReason::NotRegistered)
    ));
    assert_eq!(
        store.get(id).await.unwrap().unwrap().status,
        SubmissionStatus::Pending
    );
}

#[tokio::test]
async fn timeout_with_landed_transaction_reconciles_to_approved() {
    let (node, ledger, store) = build();
    ledger.register(member(), MemberRecord::default()).await;
    ledger.script_next(SimOutcome::TimeoutLanded).await;

    let id = node.submit_proof(MEMBER, 1, "proof").await.unwrap();
    let outcome = node.approve(id).await.unwrap();

    // The credit was proven by re-reading the ledger, not by observing the
    // confirmation.
    assert!(outcome.reconciled);
    assert_eq!(
        store.get(id).await.unwrap().unwrap().status,
        SubmissionStatus::Approved
    );
    assert_eq!(ledger.read_member(&member()).await.unwrap().xp, 50);
}

#[tokio::test]
async fn timeout_with_dropped_transaction_stays_pending() {
    let (node, ledger, store) = build();
    ledger.register(member(), MemberRecord::default()).await;
    ledger.script_next(SimOutcome::TimeoutDropped).await;

    let id = node.submit_proof(MEMBER, 1, "proof").await.unwrap();
    let err = node.approve(id).await.unwrap_err();
    assert!(matches!(err, SettlementError::ConfirmationTimeout));

    assert_eq!(
        store.get(id).await.unwrap().unwrap().status,
        SubmissionStatus::Pending
    );
    assert_eq!(ledger.read_member(&member()).await.unwrap().xp, 0);
}

#[tokio::test]
async fn store_failure_after_credit_is_surfaced_not_swallowed() {
    let (node, ledger, store) = build();
    ledger.register(member(), MemberRecord::default()).await;

    let id = node.submit_proof(MEMBER, 1, "proof").await.unwrap();
    store.fail_next_update();

    let err = node.approve(id).await.unwrap_err();
    assert!(matches!(err, SettlementError::StoreWrite { .. }));

    // XP is already correct on the ledger; only the bookkeeping lags.
    assert_eq!(ledger.read_member(&member()).await.unwrap().xp, 50);
    assert_eq!(
        store.get(id).await.unwrap().unwrap().status,
        SubmissionStatus::Pending
    );
}

#[tokio::test]
async fn mark_settled_recovers_the_lagging_store_without_a_second_credit() {
    let (node, ledger, store) = build();
    ledger.register(member(), MemberRecord::default()).await;

    let id = node.submit_proof(MEMBER, 1, "proof").await.unwrap();
    store.fail_next_update();
    assert!(matches!(
        node.approve(id).await.unwrap_err(),
        SettlementError::StoreWrite { .. }
    ));

    // The operator verifies the credit landed, then re-marks the row.
    node.mark_settled(id).await.unwrap();

    assert_eq!(
        store.get(id).await.unwrap().unwrap().status,
        SubmissionStatus::Approved
    );
    // Exactly one credit, not two.
    assert_eq!(ledger.read_member(&member()).await.unwrap().xp, 50);
}

// =============================================================================
// Rejection path
// =============================================================================

#[tokio::test]
async fn reject_writes_the_store_and_never_touches_the_ledger() {
    let (node, ledger, store) = build();
    ledger.register(member(), MemberRecord::default()).await;

    let id = node.submit_proof(MEMBER, 1, "weak proof").await.unwrap();
    node.reject(id).await.unwrap();

    assert_eq!(
        store.get(id).await.unwrap().unwrap().status,
        SubmissionStatus::Rejected
    );
    assert_eq!(ledger.read_member(&member()).await.unwrap().xp, 0);

    // Rejected is terminal for approve and reject alike.
    assert!(matches!(
        node.reject(id).await.unwrap_err(),
        SettlementError::NotPending { .. }
    ));
    assert!(matches!(
        node.approve(id).await.unwrap_err(),
        SettlementError::NotPending { .. }
    ));
}

// =============================================================================
// Mint guard and mint flow
// =============================================================================

#[tokio::test]
async fn mint_succeeds_for_an_eligible_member() {
    let (node, ledger, _store) = build();
    ledger
        .register(
            member(),
            MemberRecord {
                xp: 150,
                tier: 0,
                has_nft: false,
            },
        )
        .await;

    let outcome = node.mint(MEMBER).await.unwrap();
    assert_eq!(outcome.tier, 1);
    assert_eq!(outcome.metadata_uri, "ipfs://QmBronzeURI");

    assert!(ledger.read_member(&member()).await.unwrap().has_nft);
}

#[tokio::test]
async fn mint_below_threshold_is_refused_before_any_transaction() {
    let (node, ledger, _store) = build();
    ledger
        .register(
            member(),
            MemberRecord {
                xp: 80,
                tier: 0,
                has_nft: false,
            },
        )
        .await;

    // A guard refusal is distinct from a contract rejection: no transaction
    // was constructed at all.
    let err = node.mint(MEMBER).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::MintRefused(IneligibleReason::InsufficientXp)
    ));
    assert!(!ledger.read_member(&member()).await.unwrap().has_nft);
}

#[tokio::test]
async fn mint_race_is_caught_by_the_fresh_read() {
    let (node, ledger, _store) = build();
    ledger
        .register(
            member(),
            MemberRecord {
                xp: 150,
                tier: 0,
                has_nft: false,
            },
        )
        .await;

    // Another flow mints first; the guard's fresh read must see it.
    ledger.set_nft(&member(), true).await;

    let err = node.mint(MEMBER).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::MintRefused(IneligibleReason::AlreadyMinted)
    ));
}

#[tokio::test]
async fn mint_timeout_reconciles_via_nft_flag() {
    let (node, ledger, _store) = build();
    ledger
        .register(
            member(),
            MemberRecord {
                xp: 600,
                tier: 0,
                has_nft: false,
            },
        )
        .await;
    ledger.script_next(SimOutcome::TimeoutLanded).await;

    let outcome = node.mint(MEMBER).await.unwrap();
    assert!(outcome.reconciled);
    assert_eq!(outcome.tier, 2);
    assert!(ledger.read_member(&member()).await.unwrap().has_nft);
}

#[tokio::test]
async fn globally_disabled_minting_is_a_contract_rejection_not_a_guard_refusal() {
    let ledger = SimLedger::minting_disabled();
    let store = MemoryStore::new();
    let node = RegistryNode::new(
        Catalog::builtin(),
        ledger.clone(),
        store,
        Duration::from_secs(5),
    );
    ledger
        .register(
            member(),
            MemberRecord {
                xp: 150,
                tier: 0,
                has_nft: false,
            },
        )
        .await;

    // The guard sees an eligible member; the contract itself says no.
    let err = node.mint(MEMBER).await.unwrap_err();
    assert!(matches!(
        err,
        SettlementError::LedgerRejected(RejectReason::MintingNotAllowed)
    ));
}

#[tokio::test]
async fn mint_respects_a_posted_ledger_tier() {
    let (node, ledger, _store) = build();
    // XP alone says tier 0, but the contract has posted tier 2.
    ledger
        .register(
            member(),
            MemberRecord {
                xp: 40,
                tier: 2,
                has_nft: false,
            },
        )
        .await;

    let outcome = node.mint(MEMBER).await.unwrap();
    assert_eq!(outcome.tier, 2);
    assert_eq!(outcome.metadata_uri, "ipfs://QmSilverURI");
}

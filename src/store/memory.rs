//! In-memory submission store
//!
//! Rows live in a map behind an RwLock; ids are monotonic like the
//! database rows the production adapter fronts. Every mutation publishes a
//! [`StoreEvent`] on a broadcast channel. A one-shot failure switch lets
//! tests exercise the ledger-credited-but-store-write-failed path.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

use super::{
    NewSubmission, StoreError, StoreEvent, StoreEventKind, Submission, SubmissionId,
    SubmissionStatus, SubmissionStore,
};

const DEFAULT_EVENT_CAPACITY: usize = 64;

/// In-memory [`SubmissionStore`] implementation
pub struct MemoryStore {
    rows: RwLock<BTreeMap<SubmissionId, Submission>>,
    next_id: AtomicU64,
    events: broadcast::Sender<StoreEvent>,
    fail_next_update: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Self::with_event_capacity(DEFAULT_EVENT_CAPACITY)
    }

    /// Subscribers that fall more than `capacity` events behind miss the
    /// overflow and should re-fetch
    pub fn with_event_capacity(capacity: usize) -> Arc<Self> {
        let (events, _) = broadcast::channel(capacity);
        Arc::new(Self {
            rows: RwLock::new(BTreeMap::new()),
            next_id: AtomicU64::new(1),
            events,
            fail_next_update: AtomicBool::new(false),
        })
    }

    /// Make the next `update_status` fail with [`StoreError::Unavailable`]
    pub fn fail_next_update(&self) {
        self.fail_next_update.store(true, Ordering::SeqCst);
    }

    fn publish(&self, event: StoreEvent) {
        // No subscribers is fine; send only fails when nobody listens.
        let _ = self.events.send(event);
    }
}

#[async_trait]
impl SubmissionStore for MemoryStore {
    async fn insert(&self, new: NewSubmission) -> Result<SubmissionId, StoreError> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let submission = Submission {
            id,
            member_address: new.member_address,
            task_id: new.task_id,
            task_title: new.task_title,
            proof: new.proof,
            xp_reward: new.xp_reward,
            status: SubmissionStatus::Pending,
            submitted_at: now(),
        };

        let event = StoreEvent {
            kind: StoreEventKind::Inserted,
            submission_id: id,
            member_address: submission.member_address.clone(),
            status: submission.status,
        };

        self.rows.write().await.insert(id, submission);
        debug!(submission_id = id, "submission inserted");
        self.publish(event);
        Ok(id)
    }

    async fn get(&self, id: SubmissionId) -> Result<Option<Submission>, StoreError> {
        Ok(self.rows.read().await.get(&id).cloned())
    }

    async fn list_by_status(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, StoreError> {
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|s| s.status == status)
            .cloned()
            .collect())
    }

    async fn list_by_address(&self, address: &str) -> Result<Vec<Submission>, StoreError> {
        let needle = address.to_ascii_lowercase();
        Ok(self
            .rows
            .read()
            .await
            .values()
            .filter(|s| s.member_address.to_ascii_lowercase() == needle)
            .cloned()
            .collect())
    }

    async fn update_status(
        &self,
        id: SubmissionId,
        status: SubmissionStatus,
    ) -> Result<(), StoreError> {
        if self.fail_next_update.swap(false, Ordering::SeqCst) {
            return Err(StoreError::Unavailable("injected write failure".into()));
        }

        let event = {
            let mut rows = self.rows.write().await;
            let row = rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;

            if row.status.is_terminal() || status == SubmissionStatus::Pending {
                return Err(StoreError::InvalidTransition {
                    id,
                    from: row.status,
                    to: status,
                });
            }

            row.status = status;
            StoreEvent {
                kind: StoreEventKind::Updated,
                submission_id: id,
                member_address: row.member_address.clone(),
                status,
            }
        };

        debug!(submission_id = id, status = %status, "submission status updated");
        self.publish(event);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }
}

fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

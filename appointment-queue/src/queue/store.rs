use async_trait::async_trait;
use dashmap::DashMap;
use tracing::debug;

use super::key::QueueKey;
use super::ranked::RankedSet;
use crate::error::StoreError;

/// Ordered per-department ranking structure.
///
/// Implementations must be safe for concurrent callers on the same key.
/// `insert` and `remove` are idempotent so callers can retry them freely.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Upserts `member` with `score`. Returns true if the member was newly added.
    async fn insert(&self, key: &QueueKey, member: u64, score: u64) -> Result<bool, StoreError>;

    /// Removes `member` if present. Returns true if something was removed.
    async fn remove(&self, key: &QueueKey, member: u64) -> Result<bool, StoreError>;

    /// Zero-based position of `member` in ascending score order.
    async fn rank(&self, key: &QueueKey, member: u64) -> Result<Option<usize>, StoreError>;

    async fn cardinality(&self, key: &QueueKey) -> Result<usize, StoreError>;

    /// Members in ascending score order.
    async fn members(&self, key: &QueueKey) -> Result<Vec<u64>, StoreError>;

    /// Releases the backend handle at shutdown.
    async fn close(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// In-process queue store. Each queue key is its own shard, so departments
/// never contend with each other.
#[derive(Default)]
pub struct MemoryQueueStore {
    queues: DashMap<QueueKey, RankedSet>,
}

impl MemoryQueueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueStore for MemoryQueueStore {
    async fn insert(&self, key: &QueueKey, member: u64, score: u64) -> Result<bool, StoreError> {
        let added = self.queues.entry(*key).or_default().insert(member, score);
        debug!(%key, member, score, added, "queue insert");
        Ok(added)
    }

    async fn remove(&self, key: &QueueKey, member: u64) -> Result<bool, StoreError> {
        let removed = match self.queues.get_mut(key) {
            Some(mut queue) => queue.remove(member),
            None => false,
        };
        self.queues.remove_if(key, |_, queue| queue.is_empty());
        debug!(%key, member, removed, "queue remove");
        Ok(removed)
    }

    async fn rank(&self, key: &QueueKey, member: u64) -> Result<Option<usize>, StoreError> {
        Ok(self.queues.get(key).and_then(|queue| queue.rank(member)))
    }

    async fn cardinality(&self, key: &QueueKey) -> Result<usize, StoreError> {
        Ok(self.queues.get(key).map_or(0, |queue| queue.len()))
    }

    async fn members(&self, key: &QueueKey) -> Result<Vec<u64>, StoreError> {
        Ok(self.queues.get(key).map(|queue| queue.members()).unwrap_or_default())
    }

    async fn close(&self) -> Result<(), StoreError> {
        debug!(queues = self.queues.len(), "closing in-memory queue store");
        self.queues.clear();
        Ok(())
    }
}

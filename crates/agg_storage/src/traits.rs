use std::time::Duration;

use agg_types::{AggregatorRecord, Block, BlockRecords, Commitment, CommitmentCursor, RequestId, SmtNode};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::stream::BoxStream;
use uuid::Uuid;

use crate::error::StorageError;

/// A commitment as it sits in the durable queue: the storage-assigned
/// monotonically increasing sequence id used for cursor bookkeeping, plus
/// the receipt timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct QueuedCommitment {
    pub sequence_id: i64,
    pub received_at: DateTime<Utc>,
    pub commitment: Commitment,
}

/// The atomic write set of one finalized round: all five
/// writes land together or none do.
#[derive(Debug, Clone)]
pub struct FinalizeBatch {
    pub records: Vec<AggregatorRecord>,
    pub smt_nodes: Vec<SmtNode>,
    pub block: Block,
    pub block_records: BlockRecords,
    pub cursor: CommitmentCursor,
}

/// A follower's bookkeeping marker into the change feed: the last
/// `BlockRecords.blockNumber` it has applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct ResumePoint(pub u64);

/// One change-feed notification: a finalized block's number and the
/// request ids it carries, matching the Postgres 8000-byte `NOTIFY`
/// payload cap by name only — the subscriber always re-fetches the full
/// `BlockRecords` row rather than trusting the payload body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockRecordEvent {
    pub block_number: u64,
    pub request_ids: Vec<RequestId>,
}

/// The commitment queue and the five durable stores the Round Manager
/// writes, plus the leader lock and change feed the HA/follower layers
/// need. Kept as one capability interface collapsed to a single trait
/// object since this crate ships exactly two implementations.
#[async_trait]
pub trait AggregatorStorage: Send + Sync {
    async fn read_cursor(&self) -> Result<CommitmentCursor, StorageError>;

    /// Enqueues a validated commitment, returning its assigned sequence id.
    async fn enqueue_commitment(&self, commitment: Commitment) -> Result<i64, StorageError>;

    /// Reads `(after_id, after_id + limit]` ordered ascending by sequence id.
    async fn read_batch(
        &self,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<QueuedCommitment>, StorageError>;

    /// Compare-and-swap the cursor to `IN_PROGRESS` with the given batch
    /// end, failing with [`StorageError::Conflict`] if another writer has
    /// already advanced it.
    async fn mark_batch_in_progress(
        &self,
        expected: CommitmentCursor,
        batch_end_id: i64,
    ) -> Result<(), StorageError>;

    async fn find_record_by_request_id(
        &self,
        request_id: RequestId,
    ) -> Result<Option<AggregatorRecord>, StorageError>;

    /// The five writes of a finalized round, applied atomically.
    async fn finalize_batch(&self, batch: FinalizeBatch) -> Result<(), StorageError>;

    async fn latest_block(&self) -> Result<Option<Block>, StorageError>;

    async fn find_block(&self, index: u64) -> Result<Option<Block>, StorageError>;

    async fn find_block_records(
        &self,
        block_number: u64,
    ) -> Result<Option<BlockRecords>, StorageError>;

    /// All persisted SMT leaves plus the change-feed position they are
    /// consistent as of, for follower startup snapshotting.
    async fn load_smt_snapshot(&self) -> Result<(Vec<SmtNode>, ResumePoint), StorageError>;

    async fn try_acquire_lock(
        &self,
        lock_id: &str,
        leader_id: Uuid,
        ttl: Duration,
    ) -> Result<bool, StorageError>;

    /// Extends a lock this `leader_id` currently holds. Returns `false`
    /// (not an error) if ownership was lost, e.g. to TTL expiry.
    async fn heartbeat_lock(
        &self,
        lock_id: &str,
        leader_id: Uuid,
        ttl: Duration,
    ) -> Result<bool, StorageError>;

    async fn release_lock(&self, lock_id: &str, leader_id: Uuid) -> Result<(), StorageError>;

    async fn save_resume_token(
        &self,
        replica_id: &str,
        token: ResumePoint,
    ) -> Result<(), StorageError>;

    async fn load_resume_token(
        &self,
        replica_id: &str,
    ) -> Result<Option<ResumePoint>, StorageError>;

    /// Subscribes to finalized blocks from `from` onward (exclusive).
    /// In-memory via a `broadcast` channel; Postgres via `LISTEN/NOTIFY`
    /// plus a catch-up query.
    fn watch_block_records(&self, from: ResumePoint) -> BoxStream<'static, BlockRecordEvent>;
}

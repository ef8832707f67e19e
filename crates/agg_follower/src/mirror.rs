use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use agg_smt::{ConcurrentSmt, SmtConcurrencyError};
use agg_storage::{AggregatorStorage, BlockRecordEvent, ResumePoint, StorageError};
use agg_types::{digest_of, path_of, SmtNode};
use futures::{FutureExt, StreamExt};
use tokio::sync::watch;

/// How long to wait before resubscribing after the change feed drops
/// (the Postgres listener's connection died, or the in-memory
/// broadcast's subscriber lagged off the end of its buffer).
pub const DEFAULT_RECONNECT_BACKOFF: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum MirrorError {
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Smt(#[from] SmtConcurrencyError),
}

/// The follower's hot SMT replica: on startup, snapshots the durable leaf
/// set and then tails the finalized-block change feed from that point
/// on, so a promoted follower can serve proofs and become leader without
/// a cold rebuild.
///
/// Grounded on the same `watch::Receiver<bool>`-gated task shape as
/// [`agg_round::RoundManager`] and the teacher's `ViaBtcInscriptionManager`,
/// but driven by a change-feed stream instead of a fixed-interval ticker.
pub struct FollowerMirror {
    storage: Arc<dyn AggregatorStorage>,
    smt: Arc<ConcurrentSmt>,
    server_id: String,
    lock_timeout: Duration,
    reconnect_backoff: Duration,
}

impl FollowerMirror {
    pub fn new(
        storage: Arc<dyn AggregatorStorage>,
        smt: Arc<ConcurrentSmt>,
        server_id: impl Into<String>,
        lock_timeout: Duration,
    ) -> Self {
        Self {
            storage,
            smt,
            server_id: server_id.into(),
            lock_timeout,
            reconnect_backoff: DEFAULT_RECONNECT_BACKOFF,
        }
    }

    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        while !*stop.borrow_and_update() {
            match AssertUnwindSafe(self.tail_once(&mut stop)).catch_unwind().await {
                Ok(Ok(true)) => break,
                Ok(Ok(false)) => {
                    tracing::warn!(server_id = %self.server_id, "change feed closed, resubscribing");
                    tokio::time::sleep(self.reconnect_backoff).await;
                }
                Ok(Err(err)) => {
                    tracing::error!(server_id = %self.server_id, %err, "follower mirror error, retrying");
                    tokio::time::sleep(self.reconnect_backoff).await;
                }
                Err(_) => {
                    tracing::error!(server_id = %self.server_id, "UNHANDLED panic in follower mirror iteration, continuing");
                    tokio::time::sleep(self.reconnect_backoff).await;
                }
            }
        }
        tracing::info!(server_id = %self.server_id, "follower mirror shutting down");
    }

    /// Subscribes once and drains events until the feed closes or a stop
    /// signal arrives. Returns `Ok(true)` on a clean stop, `Ok(false)` on
    /// an unexpected feed closure that should trigger a reconnect.
    async fn tail_once(&self, stop: &mut watch::Receiver<bool>) -> Result<bool, MirrorError> {
        let resume_from = match self.storage.load_resume_token(&self.server_id).await? {
            Some(token) => token,
            None => self.bootstrap().await?,
        };

        let mut stream = self.storage.watch_block_records(resume_from);
        loop {
            tokio::select! {
                event = stream.next() => {
                    let Some(event) = event else {
                        return Ok(false);
                    };
                    self.apply_event(event).await?;
                }
                _ = stop.changed() => return Ok(true),
            }
        }
    }

    /// First-run (or history-lost recovery) path: loads every persisted
    /// `SmtNode` directly rather than replaying `BlockRecords` one at a
    /// time, and records the snapshot's own resume point so the
    /// subscription that follows picks up exactly where it left off.
    /// This ordering ensures no insert between the snapshot and the
    /// subscribe call is missed.
    async fn bootstrap(&self) -> Result<ResumePoint, MirrorError> {
        let (nodes, resume_point) = self.storage.load_smt_snapshot().await?;
        self.smt.add_leaves(nodes, self.lock_timeout).await?;
        self.storage
            .save_resume_token(&self.server_id, resume_point)
            .await?;
        tracing::info!(
            server_id = %self.server_id,
            resume_point = resume_point.0,
            "follower mirror bootstrapped from snapshot",
        );
        Ok(resume_point)
    }

    /// Applies one finalized block's leaves to the local mirror and
    /// advances the resume token. Re-derives leaves from the referenced
    /// `AggregatorRecord`s rather than trusting the event's own payload,
    /// since the event is a bare pointer to the block, not the data
    /// itself (Postgres `NOTIFY` payloads are capped well under what a
    /// full batch of leaves would need).
    async fn apply_event(&self, event: BlockRecordEvent) -> Result<(), MirrorError> {
        let mut nodes = Vec::with_capacity(event.request_ids.len());
        for request_id in &event.request_ids {
            match self.storage.find_record_by_request_id(*request_id).await? {
                Some(record) => nodes.push(SmtNode {
                    path: path_of(&record.request_id),
                    value: digest_of(&record.transaction_hash.digest),
                }),
                None => {
                    tracing::warn!(
                        %request_id,
                        block_number = event.block_number,
                        "block record references a missing aggregator record, skipping",
                    );
                }
            }
        }

        // Idempotent: a leaf already present with the identical value is
        // swallowed by `ConcurrentSmt`/`SparseMerkleTree`, so replaying
        // an event (after a reconnect that resumed slightly early) is safe.
        self.smt.add_leaves(nodes, self.lock_timeout).await?;

        self.storage
            .save_resume_token(&self.server_id, ResumePoint(event.block_number))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use agg_storage::{FinalizeBatch, InMemoryStorage};
    use agg_types::{
        AggregatorRecord, Authenticator, Block, BlockRecords, CommitmentCursor, Digest32,
        HashAlgorithm, HexBlob, PublicKeyBytes, RequestId, SignatureAlgorithm, SignatureBytes,
        TransactionHash,
    };

    use super::*;

    fn sample_record(byte: u8) -> AggregatorRecord {
        AggregatorRecord {
            request_id: RequestId([byte; 32]),
            transaction_hash: TransactionHash {
                algorithm: HashAlgorithm::Sha256,
                digest: Digest32([byte; 32]),
            },
            authenticator: Authenticator {
                algorithm: SignatureAlgorithm::Secp256k1,
                public_key: PublicKeyBytes([byte; 33]),
                signature: SignatureBytes([byte; 64]),
                state_hash: Digest32([byte; 32]),
            },
        }
    }

    fn sample_block(number: u64) -> Block {
        Block {
            index: number,
            chain_id: 1,
            version: "1".to_string(),
            fork_id: 0,
            timestamp: 0,
            root_hash: Digest32([number as u8; 32]),
            previous_block_hash: HexBlob(vec![0; 32]),
            tx_proof: HexBlob(vec![]),
        }
    }

    async fn finalize_one(storage: &Arc<dyn AggregatorStorage>, byte: u8, block_number: u64) {
        let record = sample_record(byte);
        let node = SmtNode {
            path: path_of(&record.request_id),
            value: digest_of(&record.transaction_hash.digest),
        };
        storage
            .finalize_batch(FinalizeBatch {
                records: vec![record.clone()],
                smt_nodes: vec![node],
                block: sample_block(block_number),
                block_records: BlockRecords {
                    block_number,
                    request_ids: vec![record.request_id],
                },
                cursor: CommitmentCursor::genesis(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn bootstrap_loads_existing_snapshot_before_subscribing() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        finalize_one(&storage, 1, 1).await;

        let smt = Arc::new(ConcurrentSmt::new());
        let mirror = FollowerMirror::new(storage.clone(), smt.clone(), "replica-a", Duration::from_secs(1));
        let resume_point = mirror.bootstrap().await.unwrap();

        assert_eq!(resume_point, ResumePoint(1));
        assert_eq!(smt.len(), 1);
        assert_eq!(
            storage.load_resume_token("replica-a").await.unwrap(),
            Some(ResumePoint(1))
        );
    }

    #[tokio::test]
    async fn tailing_applies_live_block_records() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let smt = Arc::new(ConcurrentSmt::new());
        let mirror = FollowerMirror::new(storage.clone(), smt.clone(), "replica-b", Duration::from_secs(1));

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(mirror.run(stop_rx));

        finalize_one(&storage, 2, 1).await;

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while smt.len() == 0 && tokio::time::Instant::now() < deadline {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(smt.len(), 1);

        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        loop {
            if storage.load_resume_token("replica-b").await.unwrap() == Some(ResumePoint(1)) {
                break;
            }
            assert!(tokio::time::Instant::now() < deadline, "resume token never advanced");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn replaying_the_same_event_is_idempotent() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let smt = Arc::new(ConcurrentSmt::new());
        let mirror = FollowerMirror::new(storage.clone(), smt.clone(), "replica-c", Duration::from_secs(1));
        finalize_one(&storage, 3, 1).await;

        let event = BlockRecordEvent {
            block_number: 1,
            request_ids: vec![RequestId([3; 32])],
        };
        mirror.apply_event(event.clone()).await.unwrap();
        mirror.apply_event(event).await.unwrap();

        assert_eq!(smt.len(), 1);
    }
}

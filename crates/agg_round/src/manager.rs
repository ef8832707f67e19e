use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use agg_bft::BftAnchorClient;
use agg_config::{ChainConfig, RoundConfig};
use agg_leader::LeaderRole;
use agg_smt::ConcurrentSmt;
use agg_storage::{AggregatorStorage, FinalizeBatch, QueuedCommitment};
use agg_types::{
    digest_of, path_of, AggregatorRecord, Block, BlockRecords, CommitmentCursor, CursorStatus,
    Digest32, HexBlob, RequestId, SmtNode, TransactionHash,
};
use chrono::Utc;
use futures::FutureExt;
use tokio::sync::watch;
use tokio::time::Duration;

use crate::error::RoundError;

/// What one tick of [`RoundManager::run_round_once`] did, surfaced purely
/// for logging at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundOutcome {
    /// No commitments past the cursor; nothing was produced.
    Idle,
    Produced { block_number: u64 },
}

/// The block-production state machine: single writer, gated on
/// leadership, crash-safe and exactly-once via the commitment cursor.
///
/// Shaped like the teacher's `ViaBtcInscriptionManager`: a
/// `tokio::time::interval` ticker raced against a `watch::Receiver<bool>`
/// stop signal, one `run_round_once` per tick, no panic escapes the loop.
pub struct RoundManager {
    storage: Arc<dyn AggregatorStorage>,
    smt: Arc<ConcurrentSmt>,
    bft: Arc<dyn BftAnchorClient>,
    bft_submit_timeout: Duration,
    chain: ChainConfig,
    round_config: RoundConfig,
    leader_role: watch::Receiver<LeaderRole>,
}

impl RoundManager {
    pub fn new(
        storage: Arc<dyn AggregatorStorage>,
        smt: Arc<ConcurrentSmt>,
        bft: Arc<dyn BftAnchorClient>,
        bft_submit_timeout: Duration,
        chain: ChainConfig,
        round_config: RoundConfig,
        leader_role: watch::Receiver<LeaderRole>,
    ) -> Self {
        Self {
            storage,
            smt,
            bft,
            bft_submit_timeout,
            chain,
            round_config,
            leader_role,
        }
    }

    pub async fn run(mut self, mut stop: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.round_config.round_duration());

        while !*stop.borrow_and_update() {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = stop.changed() => break,
            }

            if !self.leader_role.borrow_and_update().is_leader() {
                continue;
            }

            match AssertUnwindSafe(self.run_round_once()).catch_unwind().await {
                Ok(Ok(RoundOutcome::Idle)) => {}
                Ok(Ok(RoundOutcome::Produced { block_number })) => {
                    tracing::info!(block_number, "produced block");
                }
                Ok(Err(err)) => {
                    tracing::error!(%err, "round failed, will retry next tick");
                }
                Err(_) => {
                    tracing::error!("UNHANDLED panic in round manager iteration, continuing");
                }
            }
        }

        tracing::info!("round manager shutting down");
    }

    /// Claims a batch, materializes it, anchors it, and finalizes it,
    /// all in one tick. Returns without touching the cursor on any
    /// failure so the next tick replays from the same point; the cursor
    /// only ever advances inside `finalize_batch`.
    async fn run_round_once(&self) -> Result<RoundOutcome, RoundError> {
        let cursor = self.storage.read_cursor().await?;
        let Some((rows, batch_end_id)) = self.acquire_batch(cursor).await? else {
            return Ok(RoundOutcome::Idle);
        };

        let (records, nodes, request_ids) = self.materialize(&rows).await?;

        let root_hash = self
            .smt
            .add_leaves(nodes.clone(), self.round_config.smt_lock_timeout())
            .await?;

        let receipt = self
            .bft
            .submit_hash(root_hash, self.bft_submit_timeout)
            .await?;

        let next_index = self
            .storage
            .latest_block()
            .await?
            .map(|b| b.index + 1)
            .unwrap_or(1);

        let previous_block_hash = match receipt.previous_payload {
            Some(bytes) => HexBlob(bytes),
            None => HexBlob(self.chain.initial_block_hash.as_bytes().to_vec()),
        };

        let block = Block {
            index: next_index,
            chain_id: self.chain.chain_id,
            version: self.chain.version.clone(),
            fork_id: self.chain.fork_id,
            timestamp: Utc::now().timestamp(),
            root_hash: Digest32(root_hash),
            previous_block_hash,
            tx_proof: HexBlob(receipt.tx_proof),
        };

        let cursor = CommitmentCursor {
            last_processed_id: batch_end_id,
            status: CursorStatus::Complete,
            current_batch_end_id: None,
        };

        self.storage
            .finalize_batch(FinalizeBatch {
                records,
                smt_nodes: nodes,
                block,
                block_records: BlockRecords {
                    block_number: next_index,
                    request_ids,
                },
                cursor,
            })
            .await?;

        Ok(RoundOutcome::Produced {
            block_number: next_index,
        })
    }

    /// Step 1: claims the next batch, or the already-claimed one on
    /// replay after a crash. `None` means the queue is empty past the
    /// cursor.
    async fn acquire_batch(
        &self,
        cursor: CommitmentCursor,
    ) -> Result<Option<(Vec<QueuedCommitment>, i64)>, RoundError> {
        match cursor.status {
            CursorStatus::Complete => {
                let rows = self
                    .storage
                    .read_batch(cursor.last_processed_id, self.round_config.commitment_batch_size)
                    .await?;
                let Some(last) = rows.last() else {
                    return Ok(None);
                };
                let batch_end_id = last.sequence_id;
                self.storage
                    .mark_batch_in_progress(cursor, batch_end_id)
                    .await?;
                Ok(Some((rows, batch_end_id)))
            }
            CursorStatus::InProgress => {
                let batch_end_id = cursor
                    .current_batch_end_id
                    .expect("IN_PROGRESS cursor always carries a batch end");
                let rows = self
                    .storage
                    .read_batch(cursor.last_processed_id, self.round_config.commitment_batch_size)
                    .await?
                    .into_iter()
                    .filter(|row| row.sequence_id <= batch_end_id)
                    .collect();
                Ok(Some((rows, batch_end_id)))
            }
        }
    }

    /// Step 2: derives `(path, value)` and an `AggregatorRecord` per
    /// commitment, applying the `REQUEST_ID_EXISTS` conflict rule both
    /// against already-finalized storage and against earlier rows in
    /// this same batch (a client can resubmit fast enough to land twice
    /// in one drain).
    async fn materialize(
        &self,
        rows: &[QueuedCommitment],
    ) -> Result<(Vec<AggregatorRecord>, Vec<SmtNode>, Vec<RequestId>), RoundError> {
        let mut seen: HashMap<RequestId, TransactionHash> = HashMap::new();
        let mut records = Vec::new();
        let mut nodes = Vec::new();
        let mut request_ids = Vec::new();

        for row in rows {
            let c = &row.commitment;

            if let Some(existing_tx) = seen.get(&c.request_id) {
                if *existing_tx != c.transaction_hash {
                    tracing::warn!(request_id = %c.request_id, "REQUEST_ID_EXISTS within batch, dropping");
                }
                continue;
            }

            match self.storage.find_record_by_request_id(c.request_id).await? {
                Some(existing) if existing.transaction_hash == c.transaction_hash => {
                    seen.insert(c.request_id, c.transaction_hash);
                    continue;
                }
                Some(_) => {
                    tracing::warn!(request_id = %c.request_id, "REQUEST_ID_EXISTS, dropping");
                    seen.insert(c.request_id, c.transaction_hash);
                    continue;
                }
                None => {}
            }

            seen.insert(c.request_id, c.transaction_hash);
            records.push(AggregatorRecord {
                request_id: c.request_id,
                transaction_hash: c.transaction_hash,
                authenticator: c.authenticator.clone(),
            });
            nodes.push(SmtNode {
                path: path_of(&c.request_id),
                value: digest_of(&c.transaction_hash.digest),
            });
            request_ids.push(c.request_id);
        }

        Ok((records, nodes, request_ids))
    }
}

#[cfg(test)]
mod tests {
    use agg_bft::MockBftAnchorClient;
    use agg_crypto::Keypair;
    use agg_storage::InMemoryStorage;
    use agg_types::{
        commitment::derive_request_id, Authenticator, Commitment, Digest32, HashAlgorithm,
        SignatureAlgorithm,
    };
    use assert_matches::assert_matches;

    use super::*;

    fn signed_commitment(keypair: &Keypair, state_hash: Digest32, tx_digest: Digest32) -> Commitment {
        let request_id = derive_request_id(&keypair.public_key_bytes(), &state_hash);
        let signature = keypair.sign(tx_digest.as_bytes()).unwrap();
        Commitment {
            request_id,
            transaction_hash: TransactionHash {
                algorithm: HashAlgorithm::Sha256,
                digest: tx_digest,
            },
            authenticator: Authenticator {
                algorithm: SignatureAlgorithm::Secp256k1,
                public_key: keypair.public_key_bytes(),
                signature,
                state_hash,
            },
        }
    }

    fn manager(
        storage: Arc<dyn AggregatorStorage>,
    ) -> (RoundManager, Arc<ConcurrentSmt>) {
        let smt = Arc::new(ConcurrentSmt::new());
        let bft: Arc<dyn BftAnchorClient> = Arc::new(MockBftAnchorClient::new([0u8; 32]));
        let (_leader_tx, leader_rx) = watch::channel(LeaderRole::Leader);
        let manager = RoundManager::new(
            storage,
            smt.clone(),
            bft,
            Duration::from_secs(5),
            ChainConfig::for_tests(),
            RoundConfig::for_tests(),
            leader_rx,
        );
        (manager, smt)
    }

    #[tokio::test]
    async fn empty_queue_is_idle_and_produces_nothing() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let (manager, _smt) = manager(storage.clone());

        let outcome = manager.run_round_once().await.unwrap();
        assert_eq!(outcome, RoundOutcome::Idle);
        assert!(storage.latest_block().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn happy_path_produces_block_one_with_matching_root() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let (manager, smt) = manager(storage.clone());
        let keypair = Keypair::generate();
        let commitment = signed_commitment(&keypair, Digest32([1; 32]), Digest32([2; 32]));
        storage.enqueue_commitment(commitment.clone()).await.unwrap();

        let outcome = manager.run_round_once().await.unwrap();
        assert_matches!(outcome, RoundOutcome::Produced { block_number: 1 });

        let block = storage.latest_block().await.unwrap().unwrap();
        assert_eq!(block.index, 1);
        assert_eq!(block.root_hash.0, smt.root_hash());

        let cursor = storage.read_cursor().await.unwrap();
        assert_eq!(cursor.status, CursorStatus::Complete);
        assert_eq!(cursor.last_processed_id, 1);
    }

    #[tokio::test]
    async fn idempotent_resubmit_in_same_batch_yields_one_record() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let (manager, _smt) = manager(storage.clone());
        let keypair = Keypair::generate();
        let commitment = signed_commitment(&keypair, Digest32([1; 32]), Digest32([2; 32]));
        storage.enqueue_commitment(commitment.clone()).await.unwrap();
        storage.enqueue_commitment(commitment.clone()).await.unwrap();

        manager.run_round_once().await.unwrap();

        let record = storage
            .find_record_by_request_id(commitment.request_id)
            .await
            .unwrap();
        assert!(record.is_some());
    }

    #[tokio::test]
    async fn conflicting_resubmit_is_dropped() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let (manager, _smt) = manager(storage.clone());
        let keypair = Keypair::generate();
        let first = signed_commitment(&keypair, Digest32([1; 32]), Digest32([2; 32]));
        let mut second = first.clone();
        second.transaction_hash.digest = Digest32([9; 32]);
        second.authenticator.signature = keypair.sign(Digest32([9; 32]).as_bytes()).unwrap();
        storage.enqueue_commitment(first.clone()).await.unwrap();
        storage.enqueue_commitment(second).await.unwrap();

        manager.run_round_once().await.unwrap();

        let record = storage
            .find_record_by_request_id(first.request_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(record.transaction_hash, first.transaction_hash);
    }

    #[tokio::test]
    async fn crash_between_claim_and_finalize_replays_identically() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let (manager, _smt) = manager(storage.clone());
        let keypair = Keypair::generate();
        let commitment = signed_commitment(&keypair, Digest32([1; 32]), Digest32([2; 32]));
        storage.enqueue_commitment(commitment).await.unwrap();

        // Simulate a crash that claimed the batch but never finalized it.
        let cursor = storage.read_cursor().await.unwrap();
        storage.mark_batch_in_progress(cursor, 1).await.unwrap();
        assert_eq!(
            storage.read_cursor().await.unwrap().status,
            CursorStatus::InProgress
        );

        let outcome = manager.run_round_once().await.unwrap();
        assert_matches!(outcome, RoundOutcome::Produced { block_number: 1 });
        assert_eq!(
            storage.read_cursor().await.unwrap().status,
            CursorStatus::Complete
        );
    }

    #[tokio::test]
    async fn second_round_produces_contiguous_block_number() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let (manager, _smt) = manager(storage.clone());
        let keypair = Keypair::generate();

        storage
            .enqueue_commitment(signed_commitment(&keypair, Digest32([1; 32]), Digest32([2; 32])))
            .await
            .unwrap();
        manager.run_round_once().await.unwrap();

        storage
            .enqueue_commitment(signed_commitment(&keypair, Digest32([3; 32]), Digest32([4; 32])))
            .await
            .unwrap();
        let outcome = manager.run_round_once().await.unwrap();
        assert_matches!(outcome, RoundOutcome::Produced { block_number: 2 });
    }

    #[tokio::test]
    async fn non_leader_never_produces() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let smt = Arc::new(ConcurrentSmt::new());
        let bft: Arc<dyn BftAnchorClient> = Arc::new(MockBftAnchorClient::new([0u8; 32]));
        let (leader_tx, leader_rx) = watch::channel(LeaderRole::Follower);
        let manager = RoundManager::new(
            storage.clone(),
            smt,
            bft,
            Duration::from_secs(5),
            ChainConfig::for_tests(),
            RoundConfig::for_tests(),
            leader_rx,
        );
        let keypair = Keypair::generate();
        storage
            .enqueue_commitment(signed_commitment(&keypair, Digest32([1; 32]), Digest32([2; 32])))
            .await
            .unwrap();

        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(manager.run(stop_rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        stop_tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(storage.latest_block().await.unwrap().is_none());
        drop(leader_tx);
    }
}

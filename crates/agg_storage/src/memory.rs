use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use agg_types::{
    AggregatorRecord, Block, BlockRecords, Commitment, CommitmentCursor, CursorStatus, RequestId,
    SmtNode,
};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, BoxStream, StreamExt};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use crate::error::StorageError;
use crate::traits::{
    AggregatorStorage, BlockRecordEvent, FinalizeBatch, QueuedCommitment, ResumePoint,
};

#[derive(Debug, Clone, PartialEq)]
struct LockRow {
    leader_id: Uuid,
    last_heartbeat: chrono::DateTime<Utc>,
}

struct State {
    cursor: CommitmentCursor,
    queue: Vec<QueuedCommitment>,
    next_sequence_id: i64,
    records_by_request_id: HashMap<RequestId, AggregatorRecord>,
    blocks: Vec<Block>,
    block_records: Vec<BlockRecords>,
    smt_nodes: Vec<SmtNode>,
    locks: HashMap<String, LockRow>,
    resume_tokens: HashMap<String, ResumePoint>,
}

impl Default for State {
    fn default() -> Self {
        Self {
            cursor: CommitmentCursor::genesis(),
            queue: Vec::new(),
            next_sequence_id: 1,
            records_by_request_id: HashMap::new(),
            blocks: Vec::new(),
            block_records: Vec::new(),
            smt_nodes: Vec::new(),
            locks: HashMap::new(),
            resume_tokens: HashMap::new(),
        }
    }
}

/// A process-local backend for tests and standalone demos (`STORAGE_URI =
/// memory://`). Mutations lock a plain [`std::sync::Mutex`] for the
/// short, non-blocking critical sections below (none of them await while
/// holding it). The change feed is a `broadcast` channel fed directly by
/// `finalize_batch`, replayed against the in-memory block log for
/// subscribers that join after some blocks already finalized.
pub struct InMemoryStorage {
    state: Mutex<State>,
    change_tx: broadcast::Sender<BlockRecordEvent>,
}

impl Default for InMemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStorage {
    pub fn new() -> Self {
        let (change_tx, _) = broadcast::channel(1024);
        Self {
            state: Mutex::new(State {
                next_sequence_id: 1,
                ..Default::default()
            }),
            change_tx,
        }
    }
}

#[async_trait]
impl AggregatorStorage for InMemoryStorage {
    async fn read_cursor(&self) -> Result<CommitmentCursor, StorageError> {
        Ok(self.state.lock().unwrap().cursor)
    }

    async fn enqueue_commitment(&self, commitment: Commitment) -> Result<i64, StorageError> {
        let mut state = self.state.lock().unwrap();
        let sequence_id = state.next_sequence_id;
        state.next_sequence_id += 1;
        state.queue.push(QueuedCommitment {
            sequence_id,
            received_at: Utc::now(),
            commitment,
        });
        Ok(sequence_id)
    }

    async fn read_batch(
        &self,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<QueuedCommitment>, StorageError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .queue
            .iter()
            .filter(|q| q.sequence_id > after_id)
            .take(limit as usize)
            .cloned()
            .collect())
    }

    async fn mark_batch_in_progress(
        &self,
        expected: CommitmentCursor,
        batch_end_id: i64,
    ) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        if state.cursor != expected {
            return Err(StorageError::Conflict(
                "cursor changed since it was read".to_string(),
            ));
        }
        state.cursor = CommitmentCursor {
            last_processed_id: expected.last_processed_id,
            status: CursorStatus::InProgress,
            current_batch_end_id: Some(batch_end_id),
        };
        Ok(())
    }

    async fn find_record_by_request_id(
        &self,
        request_id: RequestId,
    ) -> Result<Option<AggregatorRecord>, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .records_by_request_id
            .get(&request_id)
            .cloned())
    }

    async fn finalize_batch(&self, batch: FinalizeBatch) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        for record in &batch.records {
            state
                .records_by_request_id
                .entry(record.request_id)
                .or_insert_with(|| record.clone());
        }
        state.smt_nodes.extend(batch.smt_nodes);
        state.blocks.push(batch.block);
        state.block_records.push(batch.block_records.clone());
        state.cursor = batch.cursor;

        let event = BlockRecordEvent {
            block_number: batch.block_records.block_number,
            request_ids: batch.block_records.request_ids,
        };
        let _ = self.change_tx.send(event);
        Ok(())
    }

    async fn latest_block(&self) -> Result<Option<Block>, StorageError> {
        Ok(self.state.lock().unwrap().blocks.last().cloned())
    }

    async fn find_block(&self, index: u64) -> Result<Option<Block>, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .blocks
            .iter()
            .find(|b| b.index == index)
            .cloned())
    }

    async fn find_block_records(
        &self,
        block_number: u64,
    ) -> Result<Option<BlockRecords>, StorageError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .block_records
            .iter()
            .find(|br| br.block_number == block_number)
            .cloned())
    }

    async fn load_smt_snapshot(&self) -> Result<(Vec<SmtNode>, ResumePoint), StorageError> {
        let state = self.state.lock().unwrap();
        let resume_point = state
            .block_records
            .last()
            .map(|b| ResumePoint(b.block_number))
            .unwrap_or(ResumePoint(0));
        Ok((state.smt_nodes.clone(), resume_point))
    }

    async fn try_acquire_lock(
        &self,
        lock_id: &str,
        leader_id: Uuid,
        ttl: Duration,
    ) -> Result<bool, StorageError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        let acquired = match state.locks.get(lock_id) {
            Some(row) if now - row.last_heartbeat < ttl && row.leader_id != leader_id => false,
            _ => true,
        };
        if acquired {
            state.locks.insert(
                lock_id.to_string(),
                LockRow {
                    leader_id,
                    last_heartbeat: now,
                },
            );
        }
        Ok(acquired)
    }

    async fn heartbeat_lock(
        &self,
        lock_id: &str,
        leader_id: Uuid,
        ttl: Duration,
    ) -> Result<bool, StorageError> {
        let mut state = self.state.lock().unwrap();
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::zero());
        match state.locks.get_mut(lock_id) {
            Some(row) if row.leader_id == leader_id => {
                row.last_heartbeat = now;
                Ok(true)
            }
            Some(row) if now - row.last_heartbeat >= ttl => Ok(false),
            _ => Ok(false),
        }
    }

    async fn release_lock(&self, lock_id: &str, leader_id: Uuid) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap();
        if let Some(row) = state.locks.get(lock_id) {
            if row.leader_id == leader_id {
                state.locks.remove(lock_id);
            }
        }
        Ok(())
    }

    async fn save_resume_token(
        &self,
        replica_id: &str,
        token: ResumePoint,
    ) -> Result<(), StorageError> {
        self.state
            .lock()
            .unwrap()
            .resume_tokens
            .insert(replica_id.to_string(), token);
        Ok(())
    }

    async fn load_resume_token(
        &self,
        replica_id: &str,
    ) -> Result<Option<ResumePoint>, StorageError> {
        Ok(self.state.lock().unwrap().resume_tokens.get(replica_id).copied())
    }

    fn watch_block_records(&self, from: ResumePoint) -> BoxStream<'static, BlockRecordEvent> {
        // Snapshot and subscribe while holding the same lock `finalize_batch`
        // takes, so no finalize can land in the gap between them.
        let state = self.state.lock().unwrap();
        let receiver = self.change_tx.subscribe();
        let replay: Vec<BlockRecordEvent> = state
            .block_records
            .iter()
            .filter(|br| br.block_number > from.0)
            .map(|br| BlockRecordEvent {
                block_number: br.block_number,
                request_ids: br.request_ids.clone(),
            })
            .collect();
        drop(state);
        let last_replayed = replay.last().map(|e| e.block_number).unwrap_or(from.0);

        let live = BroadcastStream::new(receiver).filter_map(move |item| {
            futures::future::ready(match item {
                Ok(event) if event.block_number > last_replayed => Some(event),
                _ => None,
            })
        });

        stream::iter(replay).chain(live).boxed()
    }
}

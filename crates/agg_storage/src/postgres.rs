use std::time::Duration;

use agg_types::{
    AggregatorRecord, Authenticator, Block, BlockRecords, Commitment, CommitmentCursor,
    CursorStatus, Digest32, HashAlgorithm, HexBlob, PublicKeyBytes, RequestId, SignatureAlgorithm,
    SignatureBytes, SmtNode, SmtPath, TransactionHash,
};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use sqlx::postgres::PgListener;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::error::StorageError;
use crate::traits::{
    AggregatorStorage, BlockRecordEvent, FinalizeBatch, QueuedCommitment, ResumePoint,
};

const BLOCK_RECORDS_CHANNEL: &str = "aggregator_block_records";

/// The durable backend: Postgres via `sqlx`, queried with runtime-checked
/// `query`/`query_as` rather than the `query!` macros, since those require
/// either a live database or a checked-in `.sqlx` cache at compile time.
/// Grounded on the teacher's DAL layer (`ViaBtcSenderDal`,
/// `ViaVotesDal`): one struct wrapping a `PgPool`, upsert-on-conflict
/// writes, and a single transaction per finalize.
pub struct PostgresStorage {
    pool: PgPool,
}

fn transient(err: sqlx::Error) -> StorageError {
    match &err {
        sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => {
            StorageError::Transient(err.into())
        }
        sqlx::Error::Database(db) if db.code().as_deref() == Some("40001") => {
            StorageError::Conflict(db.message().to_string())
        }
        _ => StorageError::Other(err.into()),
    }
}

impl PostgresStorage {
    pub async fn connect(uri: &str) -> Result<Self, StorageError> {
        let pool = PgPool::connect(uri).await.map_err(transient)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Creates the tables this backend expects. Idempotent; intended for
    /// local/dev bootstrapping, not as a migration tool.
    pub async fn run_migrations(&self) -> Result<(), StorageError> {
        sqlx::query(SCHEMA).execute(&self.pool).await.map_err(transient)?;
        Ok(())
    }
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS commitment_queue (
    sequence_id BIGSERIAL PRIMARY KEY,
    received_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    request_id BYTEA NOT NULL,
    tx_algorithm TEXT NOT NULL,
    tx_digest BYTEA NOT NULL,
    auth_algorithm TEXT NOT NULL,
    public_key BYTEA NOT NULL,
    signature BYTEA NOT NULL,
    state_hash BYTEA NOT NULL
);

CREATE TABLE IF NOT EXISTS commitment_cursor (
    id BOOLEAN PRIMARY KEY DEFAULT true CHECK (id),
    last_processed_id BIGINT NOT NULL,
    status TEXT NOT NULL,
    current_batch_end_id BIGINT
);
INSERT INTO commitment_cursor (id, last_processed_id, status, current_batch_end_id)
VALUES (true, 0, 'complete', NULL)
ON CONFLICT (id) DO NOTHING;

CREATE TABLE IF NOT EXISTS aggregator_records (
    request_id BYTEA PRIMARY KEY,
    tx_algorithm TEXT NOT NULL,
    tx_digest BYTEA NOT NULL,
    auth_algorithm TEXT NOT NULL,
    public_key BYTEA NOT NULL,
    signature BYTEA NOT NULL,
    state_hash BYTEA NOT NULL
);

CREATE TABLE IF NOT EXISTS smt_nodes (
    path BYTEA PRIMARY KEY,
    value BYTEA NOT NULL
);

CREATE TABLE IF NOT EXISTS blocks (
    index BIGINT PRIMARY KEY,
    chain_id BIGINT NOT NULL,
    version TEXT NOT NULL,
    fork_id BIGINT NOT NULL,
    timestamp BIGINT NOT NULL,
    root_hash BYTEA NOT NULL,
    previous_block_hash BYTEA NOT NULL,
    tx_proof BYTEA NOT NULL
);

CREATE TABLE IF NOT EXISTS block_records (
    block_number BIGINT PRIMARY KEY,
    request_ids BYTEA[] NOT NULL
);

CREATE TABLE IF NOT EXISTS leader_locks (
    lock_id TEXT PRIMARY KEY,
    leader_id UUID NOT NULL,
    last_heartbeat TIMESTAMPTZ NOT NULL
);

CREATE TABLE IF NOT EXISTS replica_resume_tokens (
    replica_id TEXT PRIMARY KEY,
    block_number BIGINT NOT NULL
);
"#;

#[async_trait]
impl AggregatorStorage for PostgresStorage {
    async fn read_cursor(&self) -> Result<CommitmentCursor, StorageError> {
        let row = sqlx::query("SELECT last_processed_id, status, current_batch_end_id FROM commitment_cursor")
            .fetch_one(&self.pool)
            .await
            .map_err(transient)?;
        let status: String = row.try_get("status").map_err(transient)?;
        Ok(CommitmentCursor {
            last_processed_id: row.try_get("last_processed_id").map_err(transient)?,
            status: if status == "complete" {
                CursorStatus::Complete
            } else {
                CursorStatus::InProgress
            },
            current_batch_end_id: row.try_get("current_batch_end_id").map_err(transient)?,
        })
    }

    async fn enqueue_commitment(&self, commitment: Commitment) -> Result<i64, StorageError> {
        let row = sqlx::query(
            "INSERT INTO commitment_queue
                (request_id, tx_algorithm, tx_digest, auth_algorithm, public_key, signature, state_hash)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING sequence_id",
        )
        .bind(commitment.request_id.as_bytes().to_vec())
        .bind(format!("{:?}", commitment.transaction_hash.algorithm))
        .bind(commitment.transaction_hash.digest.as_bytes().to_vec())
        .bind(format!("{:?}", commitment.authenticator.algorithm))
        .bind(commitment.authenticator.public_key.as_bytes().to_vec())
        .bind(commitment.authenticator.signature.as_bytes().to_vec())
        .bind(commitment.authenticator.state_hash.as_bytes().to_vec())
        .fetch_one(&self.pool)
        .await
        .map_err(transient)?;
        row.try_get("sequence_id").map_err(transient)
    }

    async fn read_batch(
        &self,
        after_id: i64,
        limit: u32,
    ) -> Result<Vec<QueuedCommitment>, StorageError> {
        let rows = sqlx::query(
            "SELECT sequence_id, received_at, request_id, tx_digest, public_key, signature, state_hash
             FROM commitment_queue WHERE sequence_id > $1 ORDER BY sequence_id ASC LIMIT $2",
        )
        .bind(after_id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(transient)?;

        rows.into_iter()
            .map(|row| {
                let request_id: Vec<u8> = row.try_get("request_id").map_err(transient)?;
                let tx_digest: Vec<u8> = row.try_get("tx_digest").map_err(transient)?;
                let public_key: Vec<u8> = row.try_get("public_key").map_err(transient)?;
                let signature: Vec<u8> = row.try_get("signature").map_err(transient)?;
                let state_hash: Vec<u8> = row.try_get("state_hash").map_err(transient)?;
                Ok(QueuedCommitment {
                    sequence_id: row.try_get("sequence_id").map_err(transient)?,
                    received_at: row.try_get("received_at").map_err(transient)?,
                    commitment: Commitment {
                        request_id: RequestId::from_slice(&request_id).map_err(|e| {
                            StorageError::Other(anyhow::anyhow!(e.to_string()))
                        })?,
                        transaction_hash: TransactionHash::sha256(
                            Digest32::from_slice(&tx_digest)
                                .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
                        ),
                        authenticator: Authenticator {
                            algorithm: SignatureAlgorithm::Secp256k1,
                            public_key: PublicKeyBytes::from_slice(&public_key)
                                .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
                            signature: SignatureBytes::from_slice(&signature)
                                .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
                            state_hash: Digest32::from_slice(&state_hash)
                                .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
                        },
                    },
                })
            })
            .collect()
    }

    async fn mark_batch_in_progress(
        &self,
        expected: CommitmentCursor,
        batch_end_id: i64,
    ) -> Result<(), StorageError> {
        let expected_status = match expected.status {
            CursorStatus::Complete => "complete",
            CursorStatus::InProgress => "in_progress",
        };
        let result = sqlx::query(
            "UPDATE commitment_cursor SET status = 'in_progress', current_batch_end_id = $1
             WHERE last_processed_id = $2 AND status = $3",
        )
        .bind(batch_end_id)
        .bind(expected.last_processed_id)
        .bind(expected_status)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        if result.rows_affected() == 0 {
            return Err(StorageError::Conflict(
                "cursor changed since it was read".to_string(),
            ));
        }
        Ok(())
    }

    async fn find_record_by_request_id(
        &self,
        request_id: RequestId,
    ) -> Result<Option<AggregatorRecord>, StorageError> {
        let row = sqlx::query(
            "SELECT tx_digest, public_key, signature, state_hash
             FROM aggregator_records WHERE request_id = $1",
        )
        .bind(request_id.as_bytes().to_vec())
        .fetch_optional(&self.pool)
        .await
        .map_err(transient)?;

        let Some(row) = row else { return Ok(None) };
        let tx_digest: Vec<u8> = row.try_get("tx_digest").map_err(transient)?;
        let public_key: Vec<u8> = row.try_get("public_key").map_err(transient)?;
        let signature: Vec<u8> = row.try_get("signature").map_err(transient)?;
        let state_hash: Vec<u8> = row.try_get("state_hash").map_err(transient)?;
        Ok(Some(AggregatorRecord {
            request_id,
            transaction_hash: TransactionHash::sha256(
                Digest32::from_slice(&tx_digest)
                    .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
            ),
            authenticator: Authenticator {
                algorithm: SignatureAlgorithm::Secp256k1,
                public_key: PublicKeyBytes::from_slice(&public_key)
                    .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
                signature: SignatureBytes::from_slice(&signature)
                    .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
                state_hash: Digest32::from_slice(&state_hash)
                    .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
            },
        }))
    }

    async fn finalize_batch(&self, batch: FinalizeBatch) -> Result<(), StorageError> {
        let mut tx = self.pool.begin().await.map_err(transient)?;

        for record in &batch.records {
            sqlx::query(
                "INSERT INTO aggregator_records
                    (request_id, tx_algorithm, tx_digest, auth_algorithm, public_key, signature, state_hash)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (request_id) DO NOTHING",
            )
            .bind(record.request_id.as_bytes().to_vec())
            .bind(format!("{:?}", record.transaction_hash.algorithm))
            .bind(record.transaction_hash.digest.as_bytes().to_vec())
            .bind(format!("{:?}", record.authenticator.algorithm))
            .bind(record.authenticator.public_key.as_bytes().to_vec())
            .bind(record.authenticator.signature.as_bytes().to_vec())
            .bind(record.authenticator.state_hash.as_bytes().to_vec())
            .execute(&mut *tx)
            .await
            .map_err(transient)?;
        }

        for node in &batch.smt_nodes {
            sqlx::query(
                "INSERT INTO smt_nodes (path, value) VALUES ($1, $2) ON CONFLICT (path) DO NOTHING",
            )
            .bind(node.path.0.to_vec())
            .bind(node.value.to_vec())
            .execute(&mut *tx)
            .await
            .map_err(transient)?;
        }

        sqlx::query(
            "INSERT INTO blocks
                (index, chain_id, version, fork_id, timestamp, root_hash, previous_block_hash, tx_proof)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(batch.block.index as i64)
        .bind(batch.block.chain_id as i64)
        .bind(&batch.block.version)
        .bind(batch.block.fork_id as i64)
        .bind(batch.block.timestamp)
        .bind(batch.block.root_hash.as_bytes().to_vec())
        .bind(batch.block.previous_block_hash.0.clone())
        .bind(batch.block.tx_proof.0.clone())
        .execute(&mut *tx)
        .await
        .map_err(transient)?;

        let request_id_bytes: Vec<Vec<u8>> = batch
            .block_records
            .request_ids
            .iter()
            .map(|id| id.as_bytes().to_vec())
            .collect();
        sqlx::query("INSERT INTO block_records (block_number, request_ids) VALUES ($1, $2)")
            .bind(batch.block_records.block_number as i64)
            .bind(&request_id_bytes)
            .execute(&mut *tx)
            .await
            .map_err(transient)?;

        let status = match batch.cursor.status {
            CursorStatus::Complete => "complete",
            CursorStatus::InProgress => "in_progress",
        };
        sqlx::query(
            "UPDATE commitment_cursor SET last_processed_id = $1, status = $2, current_batch_end_id = $3",
        )
        .bind(batch.cursor.last_processed_id)
        .bind(status)
        .bind(batch.cursor.current_batch_end_id)
        .execute(&mut *tx)
        .await
        .map_err(transient)?;

        sqlx::query(&format!(
            "NOTIFY {BLOCK_RECORDS_CHANNEL}, '{}'",
            batch.block_records.block_number
        ))
        .execute(&mut *tx)
        .await
        .map_err(transient)?;

        tx.commit().await.map_err(transient)?;
        Ok(())
    }

    async fn latest_block(&self) -> Result<Option<Block>, StorageError> {
        let row = sqlx::query(
            "SELECT index, chain_id, version, fork_id, timestamp, root_hash, previous_block_hash, tx_proof
             FROM blocks ORDER BY index DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await
        .map_err(transient)?;

        let Some(row) = row else { return Ok(None) };
        let root_hash: Vec<u8> = row.try_get("root_hash").map_err(transient)?;
        Ok(Some(Block {
            index: row.try_get::<i64, _>("index").map_err(transient)? as u64,
            chain_id: row.try_get::<i64, _>("chain_id").map_err(transient)? as u64,
            version: row.try_get("version").map_err(transient)?,
            fork_id: row.try_get::<i64, _>("fork_id").map_err(transient)? as u64,
            timestamp: row.try_get("timestamp").map_err(transient)?,
            root_hash: Digest32::from_slice(&root_hash)
                .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
            previous_block_hash: HexBlob(row.try_get("previous_block_hash").map_err(transient)?),
            tx_proof: HexBlob(row.try_get("tx_proof").map_err(transient)?),
        }))
    }

    async fn find_block(&self, index: u64) -> Result<Option<Block>, StorageError> {
        let row = sqlx::query(
            "SELECT index, chain_id, version, fork_id, timestamp, root_hash, previous_block_hash, tx_proof
             FROM blocks WHERE index = $1",
        )
        .bind(index as i64)
        .fetch_optional(&self.pool)
        .await
        .map_err(transient)?;

        let Some(row) = row else { return Ok(None) };
        let root_hash: Vec<u8> = row.try_get("root_hash").map_err(transient)?;
        Ok(Some(Block {
            index: row.try_get::<i64, _>("index").map_err(transient)? as u64,
            chain_id: row.try_get::<i64, _>("chain_id").map_err(transient)? as u64,
            version: row.try_get("version").map_err(transient)?,
            fork_id: row.try_get::<i64, _>("fork_id").map_err(transient)? as u64,
            timestamp: row.try_get("timestamp").map_err(transient)?,
            root_hash: Digest32::from_slice(&root_hash)
                .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))?,
            previous_block_hash: HexBlob(row.try_get("previous_block_hash").map_err(transient)?),
            tx_proof: HexBlob(row.try_get("tx_proof").map_err(transient)?),
        }))
    }

    async fn find_block_records(
        &self,
        block_number: u64,
    ) -> Result<Option<BlockRecords>, StorageError> {
        let row = sqlx::query("SELECT block_number, request_ids FROM block_records WHERE block_number = $1")
            .bind(block_number as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;

        let Some(row) = row else { return Ok(None) };
        let request_id_bytes: Vec<Vec<u8>> = row.try_get("request_ids").map_err(transient)?;
        let request_ids = request_id_bytes
            .into_iter()
            .map(|bytes| {
                RequestId::from_slice(&bytes)
                    .map_err(|e| StorageError::Other(anyhow::anyhow!(e.to_string())))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Some(BlockRecords {
            block_number: row.try_get::<i64, _>("block_number").map_err(transient)? as u64,
            request_ids,
        }))
    }

    async fn load_smt_snapshot(&self) -> Result<(Vec<SmtNode>, ResumePoint), StorageError> {
        let node_rows = sqlx::query("SELECT path, value FROM smt_nodes")
            .fetch_all(&self.pool)
            .await
            .map_err(transient)?;
        let mut nodes = Vec::with_capacity(node_rows.len());
        for row in node_rows {
            let path: Vec<u8> = row.try_get("path").map_err(transient)?;
            let value: Vec<u8> = row.try_get("value").map_err(transient)?;
            let mut path_bytes = [0u8; 32];
            path_bytes.copy_from_slice(&path);
            let mut value_bytes = [0u8; 32];
            value_bytes.copy_from_slice(&value);
            nodes.push(SmtNode {
                path: SmtPath(path_bytes),
                value: value_bytes,
            });
        }

        let max_block: Option<i64> = sqlx::query("SELECT max(block_number) AS max FROM block_records")
            .fetch_one(&self.pool)
            .await
            .map_err(transient)?
            .try_get("max")
            .map_err(transient)?;

        Ok((nodes, ResumePoint(max_block.unwrap_or(0) as u64)))
    }

    async fn try_acquire_lock(
        &self,
        lock_id: &str,
        leader_id: Uuid,
        ttl: Duration,
    ) -> Result<bool, StorageError> {
        let ttl_secs = ttl.as_secs_f64();
        let result = sqlx::query(
            "INSERT INTO leader_locks (lock_id, leader_id, last_heartbeat)
             VALUES ($1, $2, now())
             ON CONFLICT (lock_id) DO UPDATE
               SET leader_id = EXCLUDED.leader_id, last_heartbeat = now()
             WHERE leader_locks.leader_id = EXCLUDED.leader_id
                OR now() - leader_locks.last_heartbeat > make_interval(secs => $3)",
        )
        .bind(lock_id)
        .bind(leader_id)
        .bind(ttl_secs)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(result.rows_affected() > 0)
    }

    async fn heartbeat_lock(
        &self,
        lock_id: &str,
        leader_id: Uuid,
        ttl: Duration,
    ) -> Result<bool, StorageError> {
        let ttl_secs = ttl.as_secs_f64();
        let result = sqlx::query(
            "UPDATE leader_locks SET last_heartbeat = now()
             WHERE lock_id = $1 AND leader_id = $2
               AND now() - last_heartbeat <= make_interval(secs => $3)",
        )
        .bind(lock_id)
        .bind(leader_id)
        .bind(ttl_secs)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(result.rows_affected() > 0)
    }

    async fn release_lock(&self, lock_id: &str, leader_id: Uuid) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM leader_locks WHERE lock_id = $1 AND leader_id = $2")
            .bind(lock_id)
            .bind(leader_id)
            .execute(&self.pool)
            .await
            .map_err(transient)?;
        Ok(())
    }

    async fn save_resume_token(
        &self,
        replica_id: &str,
        token: ResumePoint,
    ) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO replica_resume_tokens (replica_id, block_number) VALUES ($1, $2)
             ON CONFLICT (replica_id) DO UPDATE SET block_number = EXCLUDED.block_number",
        )
        .bind(replica_id)
        .bind(token.0 as i64)
        .execute(&self.pool)
        .await
        .map_err(transient)?;
        Ok(())
    }

    async fn load_resume_token(
        &self,
        replica_id: &str,
    ) -> Result<Option<ResumePoint>, StorageError> {
        let row = sqlx::query("SELECT block_number FROM replica_resume_tokens WHERE replica_id = $1")
            .bind(replica_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(transient)?;
        Ok(row
            .map(|r| r.try_get::<i64, _>("block_number"))
            .transpose()
            .map_err(transient)?
            .map(|n| ResumePoint(n as u64)))
    }

    fn watch_block_records(&self, from: ResumePoint) -> BoxStream<'static, BlockRecordEvent> {
        let pool = self.pool.clone();
        Box::pin(stream::unfold(
            WatchState::Starting { pool, from },
            advance_watch,
        ))
    }
}

/// Drives `watch_block_records`'s catch-up-then-tail state machine: first
/// drains every block at or after `from` via a plain query, then holds a
/// live `LISTEN` connection and re-fetches each notified block (the
/// notify payload itself is untrusted given Postgres's 8000-byte NOTIFY cap).
enum WatchState {
    Starting {
        pool: PgPool,
        from: ResumePoint,
    },
    CatchingUp {
        pool: PgPool,
        backlog: std::vec::IntoIter<BlockRecordEvent>,
        last_seen: u64,
    },
    Listening {
        pool: PgPool,
        listener: Box<PgListener>,
        last_seen: u64,
    },
}

async fn fetch_block_records_after(
    pool: &PgPool,
    after: u64,
) -> Result<Vec<BlockRecordEvent>, sqlx::Error> {
    let rows = sqlx::query(
        "SELECT block_number, request_ids FROM block_records WHERE block_number > $1 ORDER BY block_number ASC",
    )
    .bind(after as i64)
    .fetch_all(pool)
    .await?;

    rows.into_iter()
        .map(|row| {
            let block_number: i64 = row.try_get("block_number")?;
            let request_id_bytes: Vec<Vec<u8>> = row.try_get("request_ids")?;
            let request_ids = request_id_bytes
                .into_iter()
                .filter_map(|bytes| RequestId::from_slice(&bytes).ok())
                .collect();
            Ok(BlockRecordEvent {
                block_number: block_number as u64,
                request_ids,
            })
        })
        .collect()
}

async fn advance_watch(mut state: WatchState) -> Option<(BlockRecordEvent, WatchState)> {
    loop {
        state = match state {
            WatchState::Starting { pool, from } => {
                let backlog = fetch_block_records_after(&pool, from.0).await.ok()?;
                WatchState::CatchingUp {
                    pool,
                    backlog: backlog.into_iter(),
                    last_seen: from.0,
                }
            }
            WatchState::CatchingUp {
                pool,
                mut backlog,
                last_seen,
            } => match backlog.next() {
                Some(event) => {
                    let last_seen = event.block_number;
                    return Some((
                        event,
                        WatchState::CatchingUp {
                            pool,
                            backlog,
                            last_seen,
                        },
                    ));
                }
                None => {
                    let mut listener = PgListener::connect_with(&pool).await.ok()?;
                    listener.listen(BLOCK_RECORDS_CHANNEL).await.ok()?;
                    WatchState::Listening {
                        pool,
                        listener: Box::new(listener),
                        last_seen,
                    }
                }
            },
            WatchState::Listening {
                pool,
                mut listener,
                last_seen,
            } => {
                let notification = listener.recv().await.ok()?;
                let notified_number: u64 = notification.payload().parse().ok()?;
                if notified_number <= last_seen {
                    WatchState::Listening {
                        pool,
                        listener,
                        last_seen,
                    }
                } else {
                    // The notification only carries a block number (the
                    // 8000-byte NOTIFY cap); re-fetch from storage
                    // rather than trust it, and drop this listener rather
                    // than keep it idle through the catch-up pass below.
                    drop(listener);
                    let backlog = fetch_block_records_after(&pool, last_seen).await.ok()?;
                    WatchState::CatchingUp {
                        pool,
                        backlog: backlog.into_iter(),
                        last_seen,
                    }
                }
            }
        };
    }
}

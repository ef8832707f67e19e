use std::sync::Arc;
use std::time::Duration;

use agg_config::ChainConfig;
use agg_crypto::Keypair;
use agg_leader::static_leader;
use agg_smt::ConcurrentSmt;
use agg_storage::{FinalizeBatch, InMemoryStorage};
use agg_types::{
    commitment::derive_request_id, path_of, Authenticator, Block, BlockRecords, CommitmentCursor,
    Digest32, HashAlgorithm, HexBlob, SignatureAlgorithm, SmtNode, SubmitStatus, TransactionHash,
};
use agg_validator::ValidatorPool;

use crate::dto::{BlockNumberParam, RequestIdParams, SubmitCommitmentParams, TransactionHashParams};
use crate::error::RpcError;
use crate::namespace::{AggregatorApiServer, AggregatorNamespace};
use crate::state::RpcState;

fn build_namespace(storage: Arc<dyn agg_storage::AggregatorStorage>) -> AggregatorNamespace {
    let smt = Arc::new(ConcurrentSmt::new());
    let pool = Arc::new(ValidatorPool::spawn(2, 16));
    let state = RpcState::new(
        storage,
        smt,
        pool,
        ChainConfig::for_tests(),
        static_leader(),
        Some(Keypair::generate()),
        "test-server".to_string(),
        Duration::from_secs(10),
        true,
        2,
    );
    AggregatorNamespace::new(state)
}

fn submit_params(keypair: &Keypair, byte: u8, receipt: bool) -> SubmitCommitmentParams {
    let state_hash = Digest32([byte; 32]);
    let tx_digest = Digest32([byte.wrapping_add(1); 32]);
    let request_id = derive_request_id(&keypair.public_key_bytes(), &state_hash);
    let signature = keypair.sign(tx_digest.as_bytes()).unwrap();
    SubmitCommitmentParams {
        request_id,
        transaction_hash: TransactionHashParams {
            algorithm: HashAlgorithm::Sha256,
            digest: tx_digest,
        },
        authenticator: crate::dto::AuthenticatorParams {
            algorithm: SignatureAlgorithm::Secp256k1,
            public_key: keypair.public_key_bytes(),
            signature,
            state_hash,
        },
        receipt,
    }
}

#[tokio::test]
async fn submit_commitment_enqueues_and_returns_success() {
    let storage: Arc<dyn agg_storage::AggregatorStorage> = Arc::new(InMemoryStorage::new());
    let namespace = build_namespace(storage.clone());
    let keypair = Keypair::generate();

    let result = namespace
        .submit_commitment(submit_params(&keypair, 1, false))
        .await
        .unwrap();

    assert_eq!(result.status, SubmitStatus::Success);
    assert!(result.receipt.is_none());
    assert_eq!(storage.read_batch(0, 10).await.unwrap().len(), 1);
}

#[tokio::test]
async fn submit_commitment_with_receipt_returns_signed_payload() {
    let storage: Arc<dyn agg_storage::AggregatorStorage> = Arc::new(InMemoryStorage::new());
    let namespace = build_namespace(storage);
    let keypair = Keypair::generate();

    let result = namespace
        .submit_commitment(submit_params(&keypair, 2, true))
        .await
        .unwrap();

    assert!(result.receipt.is_some());
}

#[tokio::test]
async fn submit_commitment_rejects_tampered_signature() {
    let storage: Arc<dyn agg_storage::AggregatorStorage> = Arc::new(InMemoryStorage::new());
    let namespace = build_namespace(storage);
    let keypair = Keypair::generate();

    let mut params = submit_params(&keypair, 3, false);
    params.authenticator.signature = agg_types::SignatureBytes([0; 64]);

    let err = namespace.submit_commitment(params).await.unwrap_err();
    assert_eq!(err.code(), -32000);
}

#[tokio::test]
async fn get_inclusion_proof_returns_404_when_absent() {
    let storage: Arc<dyn agg_storage::AggregatorStorage> = Arc::new(InMemoryStorage::new());
    let namespace = build_namespace(storage);

    let err = namespace
        .get_inclusion_proof(RequestIdParams {
            request_id: agg_types::RequestId([9; 32]),
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), -32001);
}

async fn finalize_one_block(
    storage: &Arc<dyn agg_storage::AggregatorStorage>,
    smt: &ConcurrentSmt,
    byte: u8,
) -> agg_types::AggregatorRecord {
    let record = agg_types::AggregatorRecord {
        request_id: agg_types::RequestId([byte; 32]),
        transaction_hash: TransactionHash {
            algorithm: HashAlgorithm::Sha256,
            digest: Digest32([byte; 32]),
        },
        authenticator: Authenticator {
            algorithm: SignatureAlgorithm::Secp256k1,
            public_key: agg_types::PublicKeyBytes([byte; 33]),
            signature: agg_types::SignatureBytes([byte; 64]),
            state_hash: Digest32([byte; 32]),
        },
    };
    let node = SmtNode {
        path: path_of(&record.request_id),
        value: record.transaction_hash.digest.0,
    };
    smt.add_leaves([node], Duration::from_secs(1)).await.unwrap();

    storage
        .finalize_batch(FinalizeBatch {
            records: vec![record.clone()],
            smt_nodes: vec![node],
            block: Block {
                index: 1,
                chain_id: 1,
                version: "1".to_string(),
                fork_id: 0,
                timestamp: 0,
                root_hash: Digest32(smt.root_hash()),
                previous_block_hash: HexBlob(vec![0; 32]),
                tx_proof: HexBlob(vec![]),
            },
            block_records: BlockRecords {
                block_number: 1,
                request_ids: vec![record.request_id],
            },
            cursor: CommitmentCursor::genesis(),
        })
        .await
        .unwrap();
    record
}

#[tokio::test]
async fn get_inclusion_proof_returns_proof_for_known_record() {
    let storage: Arc<dyn agg_storage::AggregatorStorage> = Arc::new(InMemoryStorage::new());
    let smt = Arc::new(ConcurrentSmt::new());
    let record = finalize_one_block(&storage, &smt, 5).await;

    let pool = Arc::new(ValidatorPool::spawn(1, 4));
    let state = RpcState::new(
        storage,
        smt,
        pool,
        ChainConfig::for_tests(),
        static_leader(),
        None,
        "test-server".to_string(),
        Duration::from_secs(10),
        true,
        2,
    );
    let namespace = AggregatorNamespace::new(state);

    let proof = namespace
        .get_inclusion_proof(RequestIdParams {
            request_id: record.request_id,
        })
        .await
        .unwrap();
    assert_eq!(proof.transaction_hash.digest, record.transaction_hash.digest);
}

#[tokio::test]
async fn get_block_height_reflects_latest_finalized_block() {
    let storage: Arc<dyn agg_storage::AggregatorStorage> = Arc::new(InMemoryStorage::new());
    let smt = Arc::new(ConcurrentSmt::new());
    finalize_one_block(&storage, &smt, 6).await;
    let namespace = build_namespace(storage);

    let height = namespace.get_block_height().await.unwrap();
    assert_eq!(height.block_number.0, 1);
}

#[tokio::test]
async fn get_block_resolves_latest_and_explicit_number() {
    let storage: Arc<dyn agg_storage::AggregatorStorage> = Arc::new(InMemoryStorage::new());
    let smt = Arc::new(ConcurrentSmt::new());
    finalize_one_block(&storage, &smt, 7).await;
    let namespace = build_namespace(storage);

    let latest = namespace
        .get_block(BlockNumberParam("latest".to_string()))
        .await
        .unwrap();
    assert_eq!(latest.index.0, 1);

    let explicit = namespace
        .get_block(BlockNumberParam("1".to_string()))
        .await
        .unwrap();
    assert_eq!(explicit.index.0, 1);

    let missing = namespace
        .get_block(BlockNumberParam("99".to_string()))
        .await
        .unwrap_err();
    assert_eq!(missing.code(), -32001);
}

#[tokio::test]
async fn get_block_commitments_lists_requests_in_the_block() {
    let storage: Arc<dyn agg_storage::AggregatorStorage> = Arc::new(InMemoryStorage::new());
    let smt = Arc::new(ConcurrentSmt::new());
    let record = finalize_one_block(&storage, &smt, 8).await;
    let namespace = build_namespace(storage);

    let commitments = namespace
        .get_block_commitments(crate::dto::DecimalU64(1))
        .await
        .unwrap();
    assert_eq!(commitments.len(), 1);
    assert_eq!(commitments[0].request_id, record.request_id);
}

#[test]
fn submit_commitment_result_serializes_as_camel_case() {
    let result = crate::dto::SubmitCommitmentResult {
        status: SubmitStatus::Success,
        receipt: None,
    };
    let value = serde_json::to_value(&result).unwrap();
    assert!(value.get("status").is_some());
    assert!(value.get("receipt").is_none());
}

#[test]
fn block_result_serializes_with_camel_case_keys() {
    let block = Block {
        index: 1,
        chain_id: 7,
        version: "1".to_string(),
        fork_id: 0,
        timestamp: 123,
        root_hash: Digest32([1; 32]),
        previous_block_hash: HexBlob(vec![0; 32]),
        tx_proof: HexBlob(vec![]),
    };
    let dto = crate::dto::BlockResult::from_block(&block, HexBlob(vec![9; 32]));
    let value = serde_json::to_value(&dto).unwrap();

    for key in [
        "index",
        "chainId",
        "version",
        "forkId",
        "timestamp",
        "rootHash",
        "previousBlockHash",
        "noDeletionProofHash",
    ] {
        assert!(value.get(key).is_some(), "missing camelCase key {key}");
    }
    assert!(value.get("chain_id").is_none());
    assert!(value.get("no_deletion_proof_hash").is_none());
}

#[tokio::test]
async fn admission_control_rejects_once_capacity_is_exhausted() {
    let storage: Arc<dyn agg_storage::AggregatorStorage> = Arc::new(InMemoryStorage::new());
    let smt = Arc::new(ConcurrentSmt::new());
    let pool = Arc::new(ValidatorPool::spawn(1, 4));
    let state = RpcState::new(
        storage,
        smt,
        pool,
        ChainConfig::for_tests(),
        static_leader(),
        None,
        "test-server".to_string(),
        Duration::from_secs(10),
        true,
        1,
    );

    let _held = state.try_admit().unwrap();
    let namespace = AggregatorNamespace::new(state);
    let err = namespace.get_block_height().await.unwrap_err();
    assert_eq!(err.code(), -32000);
}

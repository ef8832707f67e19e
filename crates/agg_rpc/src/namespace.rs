use agg_crypto::ReceiptRequest;
use agg_types::{path_of, HexBlob};
use agg_validator::validate;
use jsonrpsee::core::{async_trait, RpcResult};
use jsonrpsee::proc_macros::rpc;

use crate::dto::{
    BlockCommitmentDto, BlockHeightResult, BlockNumberParam, BlockResult, DecimalU64,
    InclusionProofResult, NoDeletionProofResult, RequestIdParams, SubmitCommitmentParams,
    SubmitCommitmentResult,
};
use crate::error::RpcError;
use crate::state::RpcState;

/// The JSON-RPC 2.0 surface exposed at `/`, matching the teacher's
/// `#[rpc(server, client, ...)]` trait-per-namespace shape
/// (`zksync_web3_decl::namespaces::ViaNamespace`) but unnamespaced: every
/// method is called bare (`submit_commitment`, not `via_submitCommitment`).
#[rpc(server)]
pub trait AggregatorApi {
    #[method(name = "submit_commitment")]
    async fn submit_commitment(
        &self,
        params: SubmitCommitmentParams,
    ) -> RpcResult<SubmitCommitmentResult>;

    #[method(name = "get_inclusion_proof")]
    async fn get_inclusion_proof(&self, params: RequestIdParams) -> RpcResult<InclusionProofResult>;

    #[method(name = "get_no_deletion_proof")]
    async fn get_no_deletion_proof(&self) -> RpcResult<NoDeletionProofResult>;

    #[method(name = "get_block_height")]
    async fn get_block_height(&self) -> RpcResult<BlockHeightResult>;

    #[method(name = "get_block")]
    async fn get_block(&self, block_number: BlockNumberParam) -> RpcResult<BlockResult>;

    #[method(name = "get_block_commitments")]
    async fn get_block_commitments(
        &self,
        block_number: DecimalU64,
    ) -> RpcResult<Vec<BlockCommitmentDto>>;
}

/// Implements [`AggregatorApiServer`] over [`RpcState`]. Each method
/// acquires an admission slot before doing any work and releases it on
/// return via [`crate::state::AdmissionGuard`]'s drop.
pub struct AggregatorNamespace {
    state: RpcState,
}

impl AggregatorNamespace {
    pub fn new(state: RpcState) -> Self {
        Self { state }
    }

    fn admit(&self) -> Result<crate::state::AdmissionGuard, RpcError> {
        self.state.try_admit().ok_or(RpcError::CapacityExceeded)
    }

    async fn submit_commitment_impl(
        &self,
        params: SubmitCommitmentParams,
    ) -> Result<SubmitCommitmentResult, RpcError> {
        let receipt_wanted = params.receipt;
        let commitment: agg_types::Commitment = params.into();
        let request_id = commitment.request_id;
        let transaction_hash = commitment.transaction_hash;
        let state_hash = commitment.authenticator.state_hash;

        let status = validate(&self.state.validator_pool, &self.state.storage, commitment.clone())
            .await
            .map_err(anyhow::Error::from)?;

        if !status.is_success() {
            return Err(RpcError::Domain(format!("{status:?}")));
        }

        // `validate` only checks; a duplicate-but-identical resubmit
        // still needs to be enqueued so the Round Manager's own
        // idempotency check (not this one) is the single source of
        // truth for whether it lands in a new block.
        self.state
            .storage
            .enqueue_commitment(commitment)
            .await
            .map_err(anyhow::Error::from)?;

        let receipt = if receipt_wanted {
            match &self.state.receipt_keypair {
                Some(keypair) => {
                    let request = ReceiptRequest {
                        service: "aggregator",
                        method: "submit_commitment",
                        request_id,
                        transaction_hash: transaction_hash.digest,
                        state_hash,
                    };
                    Some(
                        agg_crypto::sign_receipt(keypair, &request)
                            .map_err(|e| RpcError::Internal(anyhow::anyhow!(e.to_string())))?,
                    )
                }
                None => None,
            }
        } else {
            None
        };

        Ok(SubmitCommitmentResult { status, receipt })
    }

    async fn get_inclusion_proof_impl(
        &self,
        params: RequestIdParams,
    ) -> Result<InclusionProofResult, RpcError> {
        let record = self
            .state
            .storage
            .find_record_by_request_id(params.request_id)
            .await
            .map_err(anyhow::Error::from)?
            .ok_or(RpcError::NotFound)?;

        let path = path_of(&record.request_id);
        let merkle_tree_path = self.state.smt.merkle_path(&path);
        let (transaction_hash, authenticator) = crate::dto::split_record(&record);

        Ok(InclusionProofResult {
            merkle_tree_path: (&merkle_tree_path).into(),
            authenticator,
            transaction_hash,
        })
    }

    fn get_no_deletion_proof_impl(&self) -> NoDeletionProofResult {
        // Fixed opaque payload with no asserted structure:
        // `H("no-deletion-proof-v1" || rootHash)`.
        let root = self.state.smt.root_hash();
        let mut preimage = b"no-deletion-proof-v1".to_vec();
        preimage.extend_from_slice(&root);
        let digest = agg_crypto::sha256(&preimage);
        NoDeletionProofResult {
            proof: format!("0x{}", hex::encode(digest)),
        }
    }

    fn no_deletion_proof_hash(&self) -> HexBlob {
        HexBlob(hex::decode(&self.get_no_deletion_proof_impl().proof[2..]).unwrap_or_default())
    }

    async fn get_block_height_impl(&self) -> Result<BlockHeightResult, RpcError> {
        let block = self.state.storage.latest_block().await.map_err(anyhow::Error::from)?;
        Ok(BlockHeightResult {
            block_number: DecimalU64(block.map(|b| b.index).unwrap_or(0)),
        })
    }

    async fn get_block_impl(&self, block_number: BlockNumberParam) -> Result<BlockResult, RpcError> {
        let requested = block_number
            .resolve()
            .map_err(|e| RpcError::InvalidParams(e.to_string()))?;

        let block = match requested {
            None => self
                .state
                .storage
                .latest_block()
                .await
                .map_err(anyhow::Error::from)?,
            Some(index) => self
                .state
                .storage
                .find_block(index)
                .await
                .map_err(anyhow::Error::from)?,
        }
        .ok_or(RpcError::NotFound)?;

        Ok(BlockResult::from_block(&block, self.no_deletion_proof_hash()))
    }

    async fn get_block_commitments_impl(
        &self,
        block_number: DecimalU64,
    ) -> Result<Vec<BlockCommitmentDto>, RpcError> {
        let block_records = self
            .state
            .storage
            .find_block_records(block_number.0)
            .await
            .map_err(anyhow::Error::from)?
            .ok_or(RpcError::NotFound)?;

        let mut out = Vec::with_capacity(block_records.request_ids.len());
        for request_id in block_records.request_ids {
            let record = self
                .state
                .storage
                .find_record_by_request_id(request_id)
                .await
                .map_err(anyhow::Error::from)?
                .ok_or(RpcError::NotFound)?;
            out.push((&record).into());
        }
        Ok(out)
    }
}

#[async_trait]
impl AggregatorApiServer for AggregatorNamespace {
    async fn submit_commitment(
        &self,
        params: SubmitCommitmentParams,
    ) -> RpcResult<SubmitCommitmentResult> {
        let _permit = self.admit().map_err(jsonrpsee::types::ErrorObjectOwned::from)?;
        self.submit_commitment_impl(params)
            .await
            .map_err(Into::into)
    }

    async fn get_inclusion_proof(&self, params: RequestIdParams) -> RpcResult<InclusionProofResult> {
        let _permit = self.admit().map_err(jsonrpsee::types::ErrorObjectOwned::from)?;
        self.get_inclusion_proof_impl(params).await.map_err(Into::into)
    }

    async fn get_no_deletion_proof(&self) -> RpcResult<NoDeletionProofResult> {
        let _permit = self.admit().map_err(jsonrpsee::types::ErrorObjectOwned::from)?;
        Ok(self.get_no_deletion_proof_impl())
    }

    async fn get_block_height(&self) -> RpcResult<BlockHeightResult> {
        let _permit = self.admit().map_err(jsonrpsee::types::ErrorObjectOwned::from)?;
        self.get_block_height_impl().await.map_err(Into::into)
    }

    async fn get_block(&self, block_number: BlockNumberParam) -> RpcResult<BlockResult> {
        let _permit = self.admit().map_err(jsonrpsee::types::ErrorObjectOwned::from)?;
        self.get_block_impl(block_number).await.map_err(Into::into)
    }

    async fn get_block_commitments(
        &self,
        block_number: DecimalU64,
    ) -> RpcResult<Vec<BlockCommitmentDto>> {
        let _permit = self.admit().map_err(jsonrpsee::types::ErrorObjectOwned::from)?;
        self.get_block_commitments_impl(block_number)
            .await
            .map_err(Into::into)
    }
}

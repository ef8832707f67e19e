//! Wire DTOs for the JSON-RPC methods: hex strings for binary fields,
//! decimal strings for `bigint` fields, camelCase field names throughout,
//! kept distinct from the internal `agg_types` model so the wire format
//! can evolve independently.

use agg_smt::MerklePath;
use agg_types::{
    AggregatorRecord, Authenticator, Block, Commitment, HashAlgorithm, HexBlob, PublicKeyBytes,
    RequestId, SignatureAlgorithm, SignatureBytes, SubmitStatus, TransactionHash,
};
use agg_crypto::Receipt;
use serde::{Deserialize, Serialize};

/// A decimal-string-encoded `u64`, used for block numbers and timestamps:
/// all `bigint`-range wire fields are decimal strings, never JSON numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecimalU64(pub u64);

impl Serialize for DecimalU64 {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for DecimalU64 {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse::<u64>()
            .map(DecimalU64)
            .map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorParams {
    pub algorithm: SignatureAlgorithm,
    pub public_key: PublicKeyBytes,
    pub signature: SignatureBytes,
    pub state_hash: agg_types::Digest32,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommitmentParams {
    pub request_id: RequestId,
    pub transaction_hash: TransactionHashParams,
    pub authenticator: AuthenticatorParams,
    #[serde(default)]
    pub receipt: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHashParams {
    #[serde(default)]
    pub algorithm: HashAlgorithm,
    pub digest: agg_types::Digest32,
}

impl From<SubmitCommitmentParams> for Commitment {
    fn from(params: SubmitCommitmentParams) -> Self {
        Commitment {
            request_id: params.request_id,
            transaction_hash: TransactionHash {
                algorithm: params.transaction_hash.algorithm,
                digest: params.transaction_hash.digest,
            },
            authenticator: Authenticator {
                algorithm: params.authenticator.algorithm,
                public_key: params.authenticator.public_key,
                signature: params.authenticator.signature,
                state_hash: params.authenticator.state_hash,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitCommitmentResult {
    pub status: SubmitStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestIdParams {
    pub request_id: RequestId,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticatorDto {
    pub algorithm: SignatureAlgorithm,
    pub public_key: PublicKeyBytes,
    pub signature: SignatureBytes,
    pub state_hash: agg_types::Digest32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionHashDto {
    pub algorithm: HashAlgorithm,
    pub digest: agg_types::Digest32,
}

/// Splits a stored record into its two wire DTOs; a plain function
/// rather than a `From` impl on a tuple, which the orphan rules wouldn't
/// accept cleanly for a foreign trait.
pub fn split_record(record: &AggregatorRecord) -> (TransactionHashDto, AuthenticatorDto) {
    (
        TransactionHashDto {
            algorithm: record.transaction_hash.algorithm,
            digest: record.transaction_hash.digest,
        },
        AuthenticatorDto {
            algorithm: record.authenticator.algorithm,
            public_key: record.authenticator.public_key,
            signature: record.authenticator.signature,
            state_hash: record.authenticator.state_hash,
        },
    )
}

/// `MerklePath` re-expressed with hex-encoded fields for the wire.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleTreePathDto {
    pub leaf_value: Option<String>,
    pub siblings: Vec<String>,
}

impl From<&MerklePath> for MerkleTreePathDto {
    fn from(path: &MerklePath) -> Self {
        Self {
            leaf_value: path.leaf_value.map(|v| format!("0x{}", hex::encode(v))),
            siblings: path
                .siblings
                .iter()
                .map(|s| format!("0x{}", hex::encode(s)))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProofResult {
    pub merkle_tree_path: MerkleTreePathDto,
    pub authenticator: AuthenticatorDto,
    pub transaction_hash: TransactionHashDto,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NoDeletionProofResult {
    pub proof: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockHeightResult {
    pub block_number: DecimalU64,
}

/// `blockNumber: decimal string | "latest"`. Deserialized as a plain
/// string and parsed by the handler, since `"latest"` and a decimal
/// numeral share no common serde representation worth an untagged enum.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct BlockNumberParam(pub String);

impl BlockNumberParam {
    pub fn resolve(&self) -> Result<Option<u64>, std::num::ParseIntError> {
        if self.0 == "latest" {
            return Ok(None);
        }
        self.0.parse().map(Some)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockResult {
    pub index: DecimalU64,
    pub chain_id: DecimalU64,
    pub version: String,
    pub fork_id: DecimalU64,
    pub timestamp: DecimalU64,
    pub root_hash: agg_types::Digest32,
    pub previous_block_hash: HexBlob,
    pub no_deletion_proof_hash: HexBlob,
}

impl BlockResult {
    pub fn from_block(block: &Block, no_deletion_proof_hash: HexBlob) -> Self {
        Self {
            index: DecimalU64(block.index),
            chain_id: DecimalU64(block.chain_id),
            version: block.version.clone(),
            fork_id: DecimalU64(block.fork_id),
            timestamp: DecimalU64(block.timestamp.max(0) as u64),
            root_hash: block.root_hash,
            previous_block_hash: block.previous_block_hash.clone(),
            no_deletion_proof_hash,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockCommitmentDto {
    pub request_id: RequestId,
    pub transaction_hash: TransactionHashDto,
    pub authenticator: AuthenticatorDto,
}

impl From<&AggregatorRecord> for BlockCommitmentDto {
    fn from(record: &AggregatorRecord) -> Self {
        let (transaction_hash, authenticator) = split_record(record);
        Self {
            request_id: record.request_id,
            transaction_hash,
            authenticator,
        }
    }
}

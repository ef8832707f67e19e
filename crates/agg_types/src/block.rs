use serde::{Deserialize, Serialize};

use crate::hexbytes::{Digest32, HexBlob, RequestId};

/// A numbered unit of aggregated commitments with a single SMT root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub index: u64,
    pub chain_id: u64,
    pub version: String,
    pub fork_id: u64,
    pub timestamp: i64,
    pub root_hash: Digest32,
    pub previous_block_hash: HexBlob,
    pub tx_proof: HexBlob,
}

/// The ordered list of request IDs belonging to a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecords {
    pub block_number: u64,
    pub request_ids: Vec<RequestId>,
}

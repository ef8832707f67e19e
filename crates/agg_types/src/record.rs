use serde::{Deserialize, Serialize};

use crate::{
    commitment::{Authenticator, TransactionHash},
    hexbytes::RequestId,
};

/// The canonical accepted form of a commitment. Write-once; never
/// mutated once inserted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorRecord {
    pub request_id: RequestId,
    pub transaction_hash: TransactionHash,
    pub authenticator: Authenticator,
}

/// A single leaf mutation to apply to the SMT: `(path, value)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SmtNode {
    pub path: crate::path::SmtPath,
    pub value: [u8; 32],
}

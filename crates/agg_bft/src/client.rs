use std::time::Duration;

use async_trait::async_trait;

/// What the BFT layer hands back for a successfully anchored root hash:
/// the previous anchor's payload (chained into this block's
/// `previousBlockHash`) and the transaction proof the BFT network
/// produced for this submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorReceipt {
    pub previous_payload: Option<Vec<u8>>,
    pub tx_proof: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum AnchorError {
    #[error("anchor submission timed out after {0:?}")]
    Timeout(Duration),
    #[error("anchor network rejected submission: {0}")]
    Rejected(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// The BFT anchor client contract: submit a root hash, get back the
/// previous payload and a proof. The wire protocol underneath is out of
/// scope here — only this submit/anchor boundary is relied on.
#[async_trait]
pub trait BftAnchorClient: Send + Sync {
    async fn submit_hash(
        &self,
        root_hash: [u8; 32],
        deadline: Duration,
    ) -> Result<AnchorReceipt, AnchorError>;
}

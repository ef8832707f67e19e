use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::client::{AnchorError, AnchorReceipt, BftAnchorClient};

/// A local stand-in for the BFT network, seeded with `INITIAL_BLOCK_HASH`.
/// Each submission "anchors" by chaining the previous payload forward and
/// fabricating a deterministic proof over the submitted root, so tests
/// can assert on proof contents without a real consensus network.
pub struct MockBftAnchorClient {
    last_payload: Mutex<Vec<u8>>,
}

impl MockBftAnchorClient {
    pub fn new(initial_block_hash: [u8; 32]) -> Self {
        Self {
            last_payload: Mutex::new(initial_block_hash.to_vec()),
        }
    }
}

#[async_trait]
impl BftAnchorClient for MockBftAnchorClient {
    async fn submit_hash(
        &self,
        root_hash: [u8; 32],
        _deadline: Duration,
    ) -> Result<AnchorReceipt, AnchorError> {
        let mut last_payload = self.last_payload.lock().unwrap();
        let previous_payload = Some(last_payload.clone());

        let mut tx_proof = Vec::with_capacity(64);
        tx_proof.extend_from_slice(&root_hash);
        tx_proof.extend_from_slice(&last_payload);

        *last_payload = root_hash.to_vec();

        Ok(AnchorReceipt {
            previous_payload,
            tx_proof,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn first_submission_chains_from_the_initial_hash() {
        let client = MockBftAnchorClient::new([7u8; 32]);
        let receipt = client.submit_hash([1u8; 32], Duration::from_secs(1)).await.unwrap();
        assert_eq!(receipt.previous_payload, Some(vec![7u8; 32]));
    }

    #[tokio::test]
    async fn successive_submissions_chain_forward() {
        let client = MockBftAnchorClient::new([0u8; 32]);
        client.submit_hash([1u8; 32], Duration::from_secs(1)).await.unwrap();
        let second = client.submit_hash([2u8; 32], Duration::from_secs(1)).await.unwrap();
        assert_eq!(second.previous_payload, Some(vec![1u8; 32]));
    }
}

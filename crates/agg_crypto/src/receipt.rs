use agg_types::{Digest32, PublicKeyBytes, RequestId, SignatureBytes};
use serde::{Deserialize, Serialize};

use crate::signer::{CryptoError, Keypair};

/// The request payload a receipt signs over:
/// `H(service||method||requestId||transactionHash||stateHash)`.
#[derive(Debug, Clone)]
pub struct ReceiptRequest<'a> {
    pub service: &'a str,
    pub method: &'a str,
    pub request_id: RequestId,
    pub transaction_hash: Digest32,
    pub state_hash: Digest32,
}

impl ReceiptRequest<'_> {
    fn to_signable_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(
            self.service.len() + self.method.len() + RequestId::LEN + Digest32::LEN * 2,
        );
        buf.extend_from_slice(self.service.as_bytes());
        buf.extend_from_slice(self.method.as_bytes());
        buf.extend_from_slice(self.request_id.as_bytes());
        buf.extend_from_slice(self.transaction_hash.as_bytes());
        buf.extend_from_slice(self.state_hash.as_bytes());
        buf
    }
}

/// `{algorithm, publicKey, signature, request}` returned from
/// `submit_commitment` when `receipt=true`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Receipt {
    pub algorithm: &'static str,
    pub public_key: PublicKeyBytes,
    pub signature: SignatureBytes,
    pub request: String,
}

/// Signs a [`ReceiptRequest`] with the server's receipt-signing key. Kept
/// separate from any BFT-anchor key: a dedicated [`Keypair`] is
/// threaded in by the caller rather than shared global state.
pub fn sign_receipt(
    keypair: &Keypair,
    request: &ReceiptRequest<'_>,
) -> Result<Receipt, CryptoError> {
    let signable = request.to_signable_bytes();
    let signature = keypair.sign(&signable)?;
    Ok(Receipt {
        algorithm: "SECP256K1_SHA256",
        public_key: keypair.public_key_bytes(),
        signature,
        request: format!("{}.{}", request.service, request.method),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn receipt_signature_verifies_against_public_key() {
        let keypair = Keypair::generate();
        let req = ReceiptRequest {
            service: "aggregator",
            method: "submit_commitment",
            request_id: RequestId([1u8; 32]),
            transaction_hash: Digest32([2u8; 32]),
            state_hash: Digest32([3u8; 32]),
        };
        let receipt = sign_receipt(&keypair, &req).unwrap();
        assert!(crate::signer::verify(
            &receipt.public_key,
            &receipt.signature,
            &req.to_signable_bytes()
        )
        .unwrap());
    }
}

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::hexbytes::{Digest32, PublicKeyBytes, RequestId, SignatureBytes};

/// Hash algorithm tag carried alongside a digest ("imprinted hash").
/// Only `Sha256` is produced by this codebase; the tag exists so the wire
/// format can evolve without changing the shape of every digest field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HashAlgorithm {
    Sha256,
}

impl Default for HashAlgorithm {
    fn default() -> Self {
        HashAlgorithm::Sha256
    }
}

/// Signature algorithm tag for an [`Authenticator`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SignatureAlgorithm {
    Secp256k1,
}

impl Default for SignatureAlgorithm {
    fn default() -> Self {
        SignatureAlgorithm::Secp256k1
    }
}

/// An algorithm-tagged digest representing the committed state transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionHash {
    pub algorithm: HashAlgorithm,
    pub digest: Digest32,
}

impl TransactionHash {
    pub fn sha256(digest: Digest32) -> Self {
        Self {
            algorithm: HashAlgorithm::Sha256,
            digest,
        }
    }
}

/// `(algorithm, publicKey, signature, stateHash)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authenticator {
    pub algorithm: SignatureAlgorithm,
    pub public_key: PublicKeyBytes,
    pub signature: SignatureBytes,
    pub state_hash: Digest32,
}

/// A submitted `(requestId, transactionHash, authenticator)` triple, prior
/// to validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commitment {
    pub request_id: RequestId,
    pub transaction_hash: TransactionHash,
    pub authenticator: Authenticator,
}

/// Computes `requestId = H(publicKey || stateHash)` (invariant I1).
pub fn derive_request_id(public_key: &PublicKeyBytes, state_hash: &Digest32) -> RequestId {
    let mut hasher = Sha256::new();
    hasher.update(public_key.as_bytes());
    hasher.update(state_hash.as_bytes());
    let digest = hasher.finalize();
    RequestId::from_slice(&digest).expect("SHA-256 digest is always 32 bytes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_request_id_is_deterministic() {
        let pk = PublicKeyBytes([1u8; 33]);
        let state_hash = Digest32([2u8; 32]);
        let a = derive_request_id(&pk, &state_hash);
        let b = derive_request_id(&pk, &state_hash);
        assert_eq!(a, b);
    }

    #[test]
    fn derive_request_id_changes_with_inputs() {
        let pk = PublicKeyBytes([1u8; 33]);
        let a = derive_request_id(&pk, &Digest32([2u8; 32]));
        let b = derive_request_id(&pk, &Digest32([3u8; 32]));
        assert_ne!(a, b);
    }
}

//! ECDSA signing and verification over secp256k1, grounded on the
//! request-signing helpers in the teacher repo's verifier coordinator
//! (`sign_request`/`verify_signature`, compact-serialized signatures over
//! a SHA-256 digest of the payload).
//!
//! Hashing and signing are treated as abstract, swappable collaborators
//! elsewhere in the gateway; this module is the one concrete
//! implementation it ships with.

use agg_types::{PublicKeyBytes, SignatureBytes};
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("invalid secret key: {0}")]
    InvalidSecretKey(secp256k1::Error),
    #[error("invalid public key: {0}")]
    InvalidPublicKey(secp256k1::Error),
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(secp256k1::Error),
    #[error("invalid hex: {0}")]
    InvalidHex(hex::FromHexError),
}

/// A server-held secp256k1 keypair used either to verify client
/// authenticators or to sign receipts/anchors, depending on which key
/// material is loaded — the server signing key is kept isolated from
/// the BFT-anchor signing key.
#[derive(Clone)]
pub struct Keypair {
    secret_key: SecretKey,
    public_key: PublicKey,
}

impl Keypair {
    pub fn from_secret_hex(hex_str: &str) -> Result<Self, CryptoError> {
        let bytes = hex::decode(hex_str.strip_prefix("0x").unwrap_or(hex_str))
            .map_err(CryptoError::InvalidHex)?;
        let secret_key = SecretKey::from_slice(&bytes).map_err(CryptoError::InvalidSecretKey)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::signing_only(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut rand::thread_rng());
        Self {
            secret_key,
            public_key,
        }
    }

    pub fn public_key_bytes(&self) -> PublicKeyBytes {
        PublicKeyBytes(self.public_key.serialize())
    }

    /// Signs the SHA-256 digest of `message` with the compact (64-byte)
    /// ECDSA encoding.
    pub fn sign(&self, message: &[u8]) -> Result<SignatureBytes, CryptoError> {
        let digest = crate::hasher::sha256(message);
        let msg = Message::from_slice(&digest).expect("sha256 digest is 32 bytes");
        let secp = Secp256k1::signing_only();
        let sig = secp.sign_ecdsa(&msg, &self.secret_key);
        Ok(SignatureBytes(sig.serialize_compact()))
    }
}

/// Verifies that `signature` covers `message` under `public_key`.
/// Returns `Ok(false)` rather than an error when the
/// signature simply doesn't verify; `Err` is reserved for malformed
/// key/signature encodings.
pub fn verify(
    public_key: &PublicKeyBytes,
    signature: &SignatureBytes,
    message: &[u8],
) -> Result<bool, CryptoError> {
    let secp = Secp256k1::verification_only();
    let public_key =
        PublicKey::from_slice(public_key.as_bytes()).map_err(CryptoError::InvalidPublicKey)?;
    let signature =
        Signature::from_compact(signature.as_bytes()).map_err(CryptoError::InvalidSignature)?;
    let digest = crate::hasher::sha256(message);
    let msg = Message::from_slice(&digest).expect("sha256 digest is 32 bytes");
    Ok(secp.verify_ecdsa(&msg, &signature, &public_key).is_ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify_round_trips() {
        let keypair = Keypair::generate();
        let message = b"transaction-hash-bytes";
        let signature = keypair.sign(message).unwrap();
        assert!(verify(&keypair.public_key_bytes(), &signature, message).unwrap());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let keypair = Keypair::generate();
        let other = Keypair::generate();
        let message = b"transaction-hash-bytes";
        let signature = keypair.sign(message).unwrap();
        assert!(!verify(&other.public_key_bytes(), &signature, message).unwrap());
    }

    #[test]
    fn verify_rejects_tampered_message() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"original").unwrap();
        assert!(!verify(&keypair.public_key_bytes(), &signature, b"tampered").unwrap());
    }
}

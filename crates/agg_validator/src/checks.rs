use agg_types::{commitment::derive_request_id, Commitment, SubmitStatus};

/// CPU-bound verification that the request id derives correctly from the
/// authenticator and that the signature over the state hash checks out. Pure and
/// synchronous so it can be dispatched onto a blocking worker without
/// any storage or network dependency; the `REQUEST_ID_EXISTS` branch
/// lives a level up, since it needs a storage lookup.
pub fn verify_authenticator(commitment: &Commitment) -> SubmitStatus {
    let expected_request_id = derive_request_id(
        &commitment.authenticator.public_key,
        &commitment.authenticator.state_hash,
    );
    if expected_request_id != commitment.request_id {
        return SubmitStatus::RequestIdMismatch;
    }

    let verified = agg_crypto::verify(
        &commitment.authenticator.public_key,
        &commitment.authenticator.signature,
        commitment.transaction_hash.digest.as_bytes(),
    )
    .unwrap_or(false);

    if !verified {
        return SubmitStatus::AuthenticatorVerificationFailed;
    }

    SubmitStatus::Success
}

#[cfg(test)]
mod tests {
    use agg_crypto::Keypair;
    use agg_types::{Authenticator, Digest32, HashAlgorithm, SignatureAlgorithm, TransactionHash};

    use super::*;

    fn signed_commitment(keypair: &Keypair, state_hash: Digest32, tx_digest: Digest32) -> Commitment {
        let request_id = derive_request_id(&keypair.public_key_bytes(), &state_hash);
        let signature = keypair.sign(tx_digest.as_bytes()).unwrap();
        Commitment {
            request_id,
            transaction_hash: TransactionHash {
                algorithm: HashAlgorithm::Sha256,
                digest: tx_digest,
            },
            authenticator: Authenticator {
                algorithm: SignatureAlgorithm::Secp256k1,
                public_key: keypair.public_key_bytes(),
                signature,
                state_hash,
            },
        }
    }

    #[test]
    fn accepts_a_correctly_signed_commitment() {
        let keypair = Keypair::generate();
        let commitment = signed_commitment(&keypair, Digest32([1; 32]), Digest32([2; 32]));
        assert_eq!(verify_authenticator(&commitment), SubmitStatus::Success);
    }

    #[test]
    fn rejects_mismatched_request_id() {
        let keypair = Keypair::generate();
        let mut commitment = signed_commitment(&keypair, Digest32([1; 32]), Digest32([2; 32]));
        commitment.request_id = agg_types::RequestId([9; 32]);
        assert_eq!(
            verify_authenticator(&commitment),
            SubmitStatus::RequestIdMismatch
        );
    }

    #[test]
    fn rejects_signature_over_the_wrong_transaction_hash() {
        let keypair = Keypair::generate();
        let mut commitment = signed_commitment(&keypair, Digest32([1; 32]), Digest32([2; 32]));
        commitment.transaction_hash.digest = Digest32([7; 32]);
        assert_eq!(
            verify_authenticator(&commitment),
            SubmitStatus::AuthenticatorVerificationFailed
        );
    }
}

use agg_types::{Commitment, SubmitStatus};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::checks::verify_authenticator;

struct Job {
    commitment: Commitment,
    reply: oneshot::Sender<SubmitStatus>,
}

#[derive(Debug, thiserror::Error)]
pub enum ValidatorPoolError {
    #[error("validator pool is shut down")]
    Closed,
}

/// A bounded pool of blocking workers dedicated to authenticator
/// verification: `tokio::spawn_blocking` tasks pulling off a
/// shared `mpsc` queue, replying through a `oneshot` per job. Sized
/// `min(4, available_parallelism())` by default so CPU-bound signature
/// checks never starve the async reactor driving RPC/storage I/O.
pub struct ValidatorPool {
    sender: mpsc::Sender<Job>,
    workers: Vec<JoinHandle<()>>,
}

impl ValidatorPool {
    pub fn spawn(size: usize, queue_depth: usize) -> Self {
        let (sender, receiver) = mpsc::channel(queue_depth);
        let receiver = std::sync::Arc::new(tokio::sync::Mutex::new(receiver));
        let workers = (0..size.max(1))
            .map(|id| {
                let receiver = receiver.clone();
                tokio::spawn(worker_loop(id, receiver))
            })
            .collect();
        Self { sender, workers }
    }

    /// Dispatches one commitment for I1/I2 verification and awaits the
    /// result. Cheap to call concurrently: the bound is on in-flight
    /// blocking work, not on callers.
    pub async fn verify(&self, commitment: Commitment) -> Result<SubmitStatus, ValidatorPoolError> {
        let (reply, receive) = oneshot::channel();
        self.sender
            .send(Job { commitment, reply })
            .await
            .map_err(|_| ValidatorPoolError::Closed)?;
        receive.await.map_err(|_| ValidatorPoolError::Closed)
    }

    pub async fn shutdown(self) {
        drop(self.sender);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

async fn worker_loop(id: usize, receiver: std::sync::Arc<tokio::sync::Mutex<mpsc::Receiver<Job>>>) {
    loop {
        let job = {
            let mut receiver = receiver.lock().await;
            receiver.recv().await
        };
        let Some(job) = job else {
            tracing::debug!(worker = id, "validator worker shutting down");
            return;
        };
        let status = tokio::task::spawn_blocking(move || verify_authenticator(&job.commitment))
            .await
            .unwrap_or(SubmitStatus::AuthenticatorVerificationFailed);
        let _ = job.reply.send(status);
    }
}

#[cfg(test)]
mod tests {
    use agg_crypto::Keypair;
    use agg_types::{
        commitment::derive_request_id, Authenticator, Digest32, HashAlgorithm, RequestId,
        SignatureAlgorithm, TransactionHash,
    };

    use super::*;

    #[tokio::test]
    async fn verifies_concurrently_submitted_jobs() {
        let pool = ValidatorPool::spawn(2, 16);
        let keypair = Keypair::generate();
        let state_hash = Digest32([1; 32]);
        let tx_digest = Digest32([2; 32]);
        let request_id = derive_request_id(&keypair.public_key_bytes(), &state_hash);
        let signature = keypair.sign(tx_digest.as_bytes()).unwrap();
        let commitment = Commitment {
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
        };

        let status = pool.verify(commitment).await.unwrap();
        assert_eq!(status, SubmitStatus::Success);
        pool.shutdown().await;
    }

    #[tokio::test]
    async fn rejects_unsigned_garbage_without_panicking() {
        let pool = ValidatorPool::spawn(1, 4);
        let commitment = Commitment {
            request_id: RequestId([0; 32]),
            transaction_hash: TransactionHash {
                algorithm: HashAlgorithm::Sha256,
                digest: Digest32([0; 32]),
            },
            authenticator: Authenticator {
                algorithm: SignatureAlgorithm::Secp256k1,
                public_key: agg_types::PublicKeyBytes([0; 33]),
                signature: agg_types::SignatureBytes([0; 64]),
                state_hash: Digest32([0; 32]),
            },
        };
        let status = pool.verify(commitment).await.unwrap();
        assert_ne!(status, SubmitStatus::Success);
        pool.shutdown().await;
    }
}

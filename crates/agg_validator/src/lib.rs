//! CPU-parallel authenticator verification plus the
//! `REQUEST_ID_EXISTS` storage pre-check that completes the full
//! `validate(commitment)` contract.

mod checks;
mod pool;

pub use checks::verify_authenticator;
pub use pool::{ValidatorPool, ValidatorPoolError};

use std::sync::Arc;

use agg_storage::{AggregatorStorage, StorageError};
use agg_types::{Commitment, SubmitStatus};

#[derive(Debug, thiserror::Error)]
pub enum ValidationError {
    #[error(transparent)]
    Pool(#[from] ValidatorPoolError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Full `validate(commitment)` contract: the crypto checks via the pool,
/// then the `REQUEST_ID_EXISTS` idempotency check against `AggregatorRecord`
/// storage — if an existing record has the same transaction hash,
/// return success; if it differs, return `REQUEST_ID_EXISTS`.
pub async fn validate(
    pool: &ValidatorPool,
    storage: &Arc<dyn AggregatorStorage>,
    commitment: Commitment,
) -> Result<SubmitStatus, ValidationError> {
    let request_id = commitment.request_id;
    let crypto_status = pool.verify(commitment.clone()).await?;
    if crypto_status != SubmitStatus::Success {
        return Ok(crypto_status);
    }

    match storage.find_record_by_request_id(request_id).await? {
        Some(existing) if existing.transaction_hash == commitment.transaction_hash => {
            Ok(SubmitStatus::Success)
        }
        Some(_) => Ok(SubmitStatus::RequestIdExists),
        None => Ok(SubmitStatus::Success),
    }
}

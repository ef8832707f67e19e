use agg_storage::StorageError;
use agg_validator::ValidationError;
use jsonrpsee::types::ErrorObjectOwned;

/// The centralized JSON-RPC error mapping for this crate, grounded on the
/// teacher's `zksync_web3_decl::error::Web3Error` — one enum owning the
/// wire error code for every failure mode a handler can produce, so
/// individual methods never hand-pick a code.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    #[error("invalid params: {0}")]
    InvalidParams(String),
    #[error("not found")]
    NotFound,
    #[error("{0}")]
    Domain(String),
    #[error("server is at capacity")]
    CapacityExceeded,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<StorageError> for RpcError {
    fn from(err: StorageError) -> Self {
        RpcError::Internal(err.into())
    }
}

impl From<ValidationError> for RpcError {
    fn from(err: ValidationError) -> Self {
        RpcError::Internal(err.into())
    }
}

impl From<RpcError> for ErrorObjectOwned {
    fn from(err: RpcError) -> Self {
        let code = match &err {
            RpcError::InvalidParams(_) => -32602,
            RpcError::NotFound => -32001,
            RpcError::Domain(_) | RpcError::CapacityExceeded => -32000,
            RpcError::Internal(_) => -32603,
        };
        ErrorObjectOwned::owned(code, err.to_string(), None::<()>)
    }
}

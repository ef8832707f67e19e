//! The JSON-RPC/HTTP transport boundary: translates the wire
//! protocol to calls against the validator pool, SMT, and storage,
//! admission-controlled by a fixed concurrency limit.

mod docs;
mod dto;
mod error;
mod health;
mod namespace;
mod router;
mod server;
mod state;
#[cfg(test)]
mod tests;

pub use dto::{
    BlockCommitmentDto, BlockHeightResult, BlockNumberParam, BlockResult, DecimalU64,
    InclusionProofResult, NoDeletionProofResult, RequestIdParams, SubmitCommitmentParams,
    SubmitCommitmentResult,
};
pub use error::RpcError;
pub use health::HealthResponse;
pub use namespace::{AggregatorApiServer, AggregatorNamespace};
pub use router::build_router;
pub use server::{run, ServerError};
pub use state::{AdmissionGuard, RpcState};

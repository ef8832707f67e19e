//! The sparse Merkle tree the gateway commits request ids and transaction
//! hashes into, plus the concurrency wrapper ([`ConcurrentSmt`]) that
//! serializes mutation while keeping reads lock-free. Used both by the
//! round manager's canonical tree and the follower mirror's tailing copy.

pub mod concurrent;
mod empty_hashes;
pub mod tree;

pub use concurrent::{ConcurrentSmt, SmtConcurrencyError, DEFAULT_LOCK_TIMEOUT};
pub use empty_hashes::EMPTY_HASHES;
pub use tree::{recompute_root, MerklePath, SmtError, SparseMerkleTree};

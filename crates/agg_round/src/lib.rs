//! The Round Manager: the leader's block-production loop. Drains
//! the commitment queue, mutates the SMT, anchors the root externally,
//! and finalizes a block in one storage transaction, advancing the
//! commitment cursor only on success.

mod error;
mod manager;

pub use error::RoundError;
pub use manager::{RoundManager, RoundOutcome};

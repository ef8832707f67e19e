//! The follower SMT mirror: tails the change feed of finalized blocks to
//! keep a hot, read-only copy of the canonical SMT, so a replica promoted
//! to leader is correct from its very first round.

mod mirror;

pub use mirror::{FollowerMirror, MirrorError, DEFAULT_RECONNECT_BACKOFF};

//! Core data model for the aggregator gateway: commitments, records, the
//! SMT path mapping, blocks, the commitment cursor, and the leader lock.

pub mod block;
pub mod commitment;
pub mod cursor;
pub mod hexbytes;
pub mod leader_lock;
pub mod path;
pub mod record;
pub mod status;

pub use block::{Block, BlockRecords};
pub use commitment::{
    derive_request_id, Authenticator, Commitment, HashAlgorithm, SignatureAlgorithm,
    TransactionHash,
};
pub use cursor::{CommitmentCursor, CursorStatus};
pub use hexbytes::{Digest32, HexBlob, HexBytesError, PublicKeyBytes, RequestId, SignatureBytes};
pub use leader_lock::LeaderLock;
pub use path::{digest_of, path_of, SmtPath};
pub use record::{AggregatorRecord, SmtNode};
pub use status::{ReplicaRole, SubmitStatus};

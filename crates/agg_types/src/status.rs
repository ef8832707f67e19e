use serde::{Deserialize, Serialize};

/// The outcome of validating and (attempting to) enqueue a [`Commitment`](crate::commitment::Commitment),
/// returned verbatim on the `submit_commitment` wire response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubmitStatus {
    Success,
    RequestIdMismatch,
    AuthenticatorVerificationFailed,
    RequestIdExists,
}

impl SubmitStatus {
    pub fn is_success(self) -> bool {
        matches!(self, SubmitStatus::Success)
    }
}

/// The role a replica is currently playing, reported on `GET /health`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReplicaRole {
    Leader,
    Follower,
    Standalone,
}

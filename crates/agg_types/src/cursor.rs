use serde::{Deserialize, Serialize};

/// The Round Manager's progress marker over the commitment queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CursorStatus {
    Complete,
    InProgress,
}

/// Process-wide singleton tracking the boundary between committed and
/// pending commitments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitmentCursor {
    pub last_processed_id: i64,
    pub status: CursorStatus,
    pub current_batch_end_id: Option<i64>,
}

impl CommitmentCursor {
    pub fn genesis() -> Self {
        Self {
            last_processed_id: 0,
            status: CursorStatus::Complete,
            current_batch_end_id: None,
        }
    }
}

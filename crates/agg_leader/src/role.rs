use tokio::sync::watch;

/// Whether this process currently holds the leader lock. Cheap to
/// read from any task via the `watch::Receiver` the elector publishes on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaderRole {
    Leader,
    Follower,
}

impl LeaderRole {
    pub fn is_leader(self) -> bool {
        matches!(self, LeaderRole::Leader)
    }
}

/// A role channel that is permanently `Leader`, for `DISABLE_HIGH_AVAILABILITY`
/// standalone mode: no lock, no contention, always in charge.
pub fn static_leader() -> watch::Receiver<LeaderRole> {
    let (tx, rx) = watch::channel(LeaderRole::Leader);
    // Leaked deliberately: standalone mode has no elector task to own the
    // sender, and a closed channel would make `.changed()` return early.
    std::mem::forget(tx);
    rx
}

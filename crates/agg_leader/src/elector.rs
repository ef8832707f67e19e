use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use agg_storage::AggregatorStorage;
use futures::FutureExt;
use tokio::sync::watch;
use uuid::Uuid;

use crate::role::LeaderRole;

/// Drives the TTL-fenced leader lock: polls for it while a follower,
/// heartbeats it while leader, steps down the moment a heartbeat is
/// rejected, and releases it on graceful shutdown. Shaped like the round
/// manager's own task loop — a `tokio::select!` over an interval tick and
/// a `watch::Receiver<bool>` stop signal, with each iteration's panics
/// caught so one bad lock response never takes the whole elector down.
pub struct LeaderElector {
    lock_id: String,
    self_id: Uuid,
    storage: Arc<dyn AggregatorStorage>,
    ttl: Duration,
    heartbeat_interval: Duration,
    polling_interval: Duration,
    role_tx: watch::Sender<LeaderRole>,
}

impl LeaderElector {
    pub fn new(
        lock_id: impl Into<String>,
        storage: Arc<dyn AggregatorStorage>,
        ttl: Duration,
        heartbeat_interval: Duration,
        polling_interval: Duration,
    ) -> (Self, watch::Receiver<LeaderRole>) {
        let (role_tx, role_rx) = watch::channel(LeaderRole::Follower);
        let elector = Self {
            lock_id: lock_id.into(),
            self_id: Uuid::new_v4(),
            storage,
            ttl,
            heartbeat_interval,
            polling_interval,
            role_tx,
        };
        (elector, role_rx)
    }

    pub fn self_id(&self) -> Uuid {
        self.self_id
    }

    pub async fn run(self, mut stop: watch::Receiver<bool>) {
        let mut poll_timer = tokio::time::interval(self.polling_interval);

        while !*stop.borrow_and_update() {
            tokio::select! {
                _ = poll_timer.tick() => {}
                _ = stop.changed() => break,
            }

            match AssertUnwindSafe(self.poll_once(&mut stop)).catch_unwind().await {
                Ok(true) => break,
                Ok(false) => {}
                Err(_) => {
                    tracing::error!(lock_id = %self.lock_id, "UNHANDLED panic in leader elector iteration, continuing");
                }
            }
        }

        if *self.role_tx.borrow() == LeaderRole::Leader {
            let _ = self.storage.release_lock(&self.lock_id, self.self_id).await;
        }
        tracing::info!(lock_id = %self.lock_id, "leader elector shutting down");
    }

    /// One poll attempt: tries to acquire the lock and, on success, holds
    /// it until it's lost or a stop signal arrives. Returns `true` when
    /// the caller should stop polling outright (a clean shutdown was
    /// observed while holding the lock).
    async fn poll_once(&self, stop: &mut watch::Receiver<bool>) -> bool {
        match self
            .storage
            .try_acquire_lock(&self.lock_id, self.self_id, self.ttl)
            .await
        {
            Ok(true) => {
                tracing::info!(lock_id = %self.lock_id, self_id = %self.self_id, "acquired leader lock");
                let _ = self.role_tx.send(LeaderRole::Leader);
                if self.hold_lock(stop).await {
                    return true;
                }
                let _ = self.role_tx.send(LeaderRole::Follower);
                false
            }
            Ok(false) => false,
            Err(err) => {
                tracing::warn!(lock_id = %self.lock_id, %err, "lock acquisition attempt failed");
                false
            }
        }
    }

    /// Heartbeats until a stop signal arrives (returns `true`, caller
    /// should exit) or the heartbeat is rejected, i.e. this process lost
    /// the lock (returns `false`, caller resumes polling).
    async fn hold_lock(&self, stop: &mut watch::Receiver<bool>) -> bool {
        let mut heartbeat_timer = tokio::time::interval(self.heartbeat_interval);
        heartbeat_timer.tick().await; // first tick fires immediately

        loop {
            tokio::select! {
                _ = heartbeat_timer.tick() => {}
                _ = stop.changed() => return true,
            }

            match self
                .storage
                .heartbeat_lock(&self.lock_id, self.self_id, self.ttl)
                .await
            {
                Ok(true) => {}
                Ok(false) => {
                    tracing::warn!(lock_id = %self.lock_id, "lost leader lock, stepping down");
                    return false;
                }
                Err(err) => {
                    tracing::warn!(lock_id = %self.lock_id, %err, "heartbeat failed, stepping down");
                    return false;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use agg_storage::InMemoryStorage;

    use super::*;

    #[tokio::test]
    async fn acquires_and_reports_leadership() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let (elector, mut role_rx) = LeaderElector::new(
            "round-manager",
            storage,
            Duration::from_secs(30),
            Duration::from_millis(20),
            Duration::from_millis(5),
        );
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle = tokio::spawn(elector.run(stop_rx));

        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                if *role_rx.borrow() == LeaderRole::Leader {
                    break;
                }
                role_rx.changed().await.unwrap();
            }
        })
        .await
        .unwrap();

        stop_tx.send(true).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn only_one_of_two_electors_becomes_leader() {
        let storage: Arc<dyn AggregatorStorage> = Arc::new(InMemoryStorage::new());
        let (elector_a, mut role_a) = LeaderElector::new(
            "round-manager",
            storage.clone(),
            Duration::from_secs(30),
            Duration::from_millis(20),
            Duration::from_millis(5),
        );
        let (elector_b, mut role_b) = LeaderElector::new(
            "round-manager",
            storage,
            Duration::from_secs(30),
            Duration::from_millis(20),
            Duration::from_millis(5),
        );
        let (stop_tx, stop_rx) = watch::channel(false);
        let handle_a = tokio::spawn(elector_a.run(stop_rx.clone()));
        let handle_b = tokio::spawn(elector_b.run(stop_rx));

        tokio::time::sleep(Duration::from_millis(200)).await;
        let a_leader = *role_a.borrow() == LeaderRole::Leader;
        let b_leader = *role_b.borrow() == LeaderRole::Leader;
        assert!(a_leader ^ b_leader);

        stop_tx.send(true).unwrap();
        handle_a.await.unwrap();
        handle_b.await.unwrap();
    }
}

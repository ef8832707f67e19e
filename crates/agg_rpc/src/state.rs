use std::sync::Arc;
use std::time::Duration;

use agg_config::ChainConfig;
use agg_crypto::Keypair;
use agg_leader::LeaderRole;
use agg_smt::ConcurrentSmt;
use agg_storage::AggregatorStorage;
use agg_validator::ValidatorPool;
use tokio::sync::{watch, Semaphore};

/// Shared, cheaply-clonable state every RPC handler closes over.
/// Grounded on the teacher's `RpcState` (`api_server::web3::RpcState`): a
/// plain struct of already-constructed collaborators, never itself
/// performing I/O.
pub struct RpcState {
    pub storage: Arc<dyn AggregatorStorage>,
    pub smt: Arc<ConcurrentSmt>,
    pub validator_pool: Arc<ValidatorPool>,
    pub chain: ChainConfig,
    pub leader_role: watch::Receiver<LeaderRole>,
    pub receipt_keypair: Option<Arc<Keypair>>,
    pub server_id: String,
    pub smt_lock_timeout: Duration,
    standalone: bool,
    admission: Arc<Semaphore>,
    max_concurrent_requests: usize,
}

/// RAII guard releasing an admission-control permit when a request
/// finishes, successfully or not.
pub struct AdmissionGuard(#[allow(dead_code)] tokio::sync::OwnedSemaphorePermit);

impl RpcState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        storage: Arc<dyn AggregatorStorage>,
        smt: Arc<ConcurrentSmt>,
        validator_pool: Arc<ValidatorPool>,
        chain: ChainConfig,
        leader_role: watch::Receiver<LeaderRole>,
        receipt_keypair: Option<Keypair>,
        server_id: String,
        smt_lock_timeout: Duration,
        standalone: bool,
        concurrency_limit: usize,
    ) -> Self {
        Self {
            storage,
            smt,
            validator_pool,
            chain,
            leader_role,
            receipt_keypair: receipt_keypair.map(Arc::new),
            server_id,
            smt_lock_timeout,
            standalone,
            admission: Arc::new(Semaphore::new(concurrency_limit)),
            max_concurrent_requests: concurrency_limit,
        }
    }

    /// Tries to reserve one of `concurrencyLimit` admission slots. `None`
    /// means the server is at capacity; the caller maps that to the
    /// structured `-32000` envelope rather than a bare HTTP 503.
    pub fn try_admit(&self) -> Option<AdmissionGuard> {
        Arc::clone(&self.admission)
            .try_acquire_owned()
            .ok()
            .map(AdmissionGuard)
    }

    pub fn active_requests(&self) -> usize {
        self.max_concurrent_requests - self.admission.available_permits()
    }

    pub fn max_concurrent_requests(&self) -> usize {
        self.max_concurrent_requests
    }

    pub fn role(&self) -> agg_types::ReplicaRole {
        if self.standalone {
            agg_types::ReplicaRole::Standalone
        } else if *self.leader_role.borrow() == LeaderRole::Leader {
            agg_types::ReplicaRole::Leader
        } else {
            agg_types::ReplicaRole::Follower
        }
    }
}

impl Clone for RpcState {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            smt: self.smt.clone(),
            validator_pool: self.validator_pool.clone(),
            chain: self.chain.clone(),
            leader_role: self.leader_role.clone(),
            receipt_keypair: self.receipt_keypair.clone(),
            server_id: self.server_id.clone(),
            smt_lock_timeout: self.smt_lock_timeout,
            standalone: self.standalone,
            admission: self.admission.clone(),
            max_concurrent_requests: self.max_concurrent_requests,
        }
    }
}

use std::sync::Arc;
use std::time::Duration;

use agg_types::{SmtNode, SmtPath};
use arc_swap::ArcSwap;
use tokio::sync::Mutex;
use tokio::time::timeout;

use crate::tree::{MerklePath, SmtError, SparseMerkleTree};

/// Default bound on how long a mutation waits to acquire the tree's
/// single-writer lock before giving up. Overridable via
/// `SMT_LOCK_TIMEOUT_MS`.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, thiserror::Error)]
pub enum SmtConcurrencyError {
    #[error("timed out waiting for the SMT mutation lock")]
    LockTimeout,
    #[error(transparent)]
    Tree(#[from] SmtError),
}

/// An immutable point-in-time view of the tree, published after each
/// successful mutation. Readers load this without ever touching the
/// mutation lock, so a read never blocks behind a writer.
struct Snapshot {
    tree: SparseMerkleTree,
    root_hash: [u8; 32],
}

/// Serializes mutation through a single async lock while letting
/// `root_hash`/`merkle_path` reads proceed lock-free against the most
/// recently published [`Snapshot`].
///
/// Grounded on the same shape the round manager and follower mirror both
/// need: one writer applying a batch at a time, many concurrent readers
/// (JSON-RPC handlers answering `getBlockProof`/status queries) that
/// must never be blocked behind it.
pub struct ConcurrentSmt {
    mutation_lock: Mutex<SparseMerkleTree>,
    snapshot: ArcSwap<Snapshot>,
}

impl Default for ConcurrentSmt {
    fn default() -> Self {
        Self::new()
    }
}

impl ConcurrentSmt {
    pub fn new() -> Self {
        let tree = SparseMerkleTree::new();
        let root_hash = tree.root_hash();
        Self {
            mutation_lock: Mutex::new(tree.clone()),
            snapshot: ArcSwap::new(Arc::new(Snapshot { tree, root_hash })),
        }
    }

    /// Applies a batch of leaf insertions atomically: either all nodes
    /// land and a fresh snapshot is published, or the batch is rejected
    /// and the tree is left exactly as it was.
    pub async fn add_leaves(
        &self,
        nodes: impl IntoIterator<Item = SmtNode>,
        lock_timeout: Duration,
    ) -> Result<[u8; 32], SmtConcurrencyError> {
        let mut guard = timeout(lock_timeout, self.mutation_lock.lock())
            .await
            .map_err(|_| SmtConcurrencyError::LockTimeout)?;
        let mut candidate = guard.clone();
        candidate.add_leaves(nodes)?;
        let root_hash = candidate.root_hash();
        self.snapshot.store(Arc::new(Snapshot {
            tree: candidate.clone(),
            root_hash,
        }));
        *guard = candidate;
        Ok(root_hash)
    }

    /// Lock-free read of the current committed root hash.
    pub fn root_hash(&self) -> [u8; 32] {
        self.snapshot.load().root_hash
    }

    /// Lock-free read of a leaf's current inclusion/non-inclusion proof.
    pub fn merkle_path(&self, path: &SmtPath) -> MerklePath {
        self.snapshot.load().tree.merkle_path(path)
    }

    pub fn len(&self) -> usize {
        self.snapshot.load().tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.load().tree.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    fn node(byte0: u8, value: u8) -> SmtNode {
        let mut path = [0u8; 32];
        path[0] = byte0;
        SmtNode {
            path: SmtPath(path),
            value: [value; 32],
        }
    }

    #[tokio::test]
    async fn reads_see_committed_batch() {
        let smt = ConcurrentSmt::new();
        let empty_root = smt.root_hash();

        let root = smt
            .add_leaves([node(1, 1), node(2, 2)], DEFAULT_LOCK_TIMEOUT)
            .await
            .unwrap();

        assert_ne!(root, empty_root);
        assert_eq!(smt.root_hash(), root);
        assert_eq!(smt.len(), 2);
    }

    #[tokio::test]
    async fn rejected_batch_leaves_tree_unchanged() {
        let smt = ConcurrentSmt::new();
        smt.add_leaves([node(1, 7)], DEFAULT_LOCK_TIMEOUT)
            .await
            .unwrap();
        let root_before = smt.root_hash();

        let result = smt
            .add_leaves([node(1, 99)], DEFAULT_LOCK_TIMEOUT)
            .await;

        assert_matches!(result, Err(SmtConcurrencyError::Tree(_)));
        assert_eq!(smt.root_hash(), root_before);
        assert_eq!(smt.len(), 1);
    }

    #[tokio::test]
    async fn merkle_path_is_consistent_with_root_hash() {
        let smt = ConcurrentSmt::new();
        let target = node(5, 42);
        smt.add_leaves([target, node(6, 1)], DEFAULT_LOCK_TIMEOUT)
            .await
            .unwrap();

        let proof = smt.merkle_path(&target.path);
        assert_eq!(
            crate::tree::recompute_root(&target.path, &proof),
            smt.root_hash()
        );
    }

    #[tokio::test]
    async fn lock_timeout_is_surfaced_when_writer_holds_the_lock_too_long() {
        let smt = Arc::new(ConcurrentSmt::new());
        let held = smt.mutation_lock.lock().await;
        let result = smt
            .add_leaves([node(9, 9)], Duration::from_millis(10))
            .await;
        assert_matches!(result, Err(SmtConcurrencyError::LockTimeout));
        drop(held);
    }
}

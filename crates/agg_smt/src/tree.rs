use std::collections::HashMap;

use agg_crypto::hash_pair;
use agg_types::{SmtNode, SmtPath};

use crate::empty_hashes::EMPTY_HASHES;

/// A 256-entry inclusion/non-inclusion proof: the sibling hash at each
/// depth from the leaf up to the root, in leaf-to-root order.
/// `siblings[0]` is the leaf's immediate sibling; `siblings[DEPTH - 1]`
/// is the sibling of the root's own child.
#[derive(Debug, Clone)]
pub struct MerklePath {
    pub leaf_value: Option<[u8; 32]>,
    pub siblings: Vec<[u8; 32]>,
}

#[derive(Debug, thiserror::Error)]
pub enum SmtError {
    /// `addLeaf`/`addLeaves` found an existing leaf at this path whose
    /// value disagrees with the one being inserted. A path identifies at
    /// most one leaf and leaves are never overwritten, so this is always
    /// a conflict rather than an update.
    #[error("path already holds a leaf with a different value")]
    LeafInBranch { existing_value: [u8; 32] },
}

/// The sparse Merkle tree itself: a flat map from full 256-bit leaf path
/// to its 32-byte value, with the tree shape (and every internal node's
/// hash) derived on demand rather than stored.
///
/// This favors simplicity over the incremental-update performance a
/// production-scale tree would need: every `root_hash`/`path_of` call
/// walks the whole leaf set. That's the right tradeoff here — block
/// sizes are bounded by `COMMITMENT_BATCH_SIZE`, not by chain history.
#[derive(Debug, Default, Clone)]
pub struct SparseMerkleTree {
    leaves: HashMap<SmtPath, [u8; 32]>,
}

impl SparseMerkleTree {
    pub fn new() -> Self {
        Self {
            leaves: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.leaves.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leaves.is_empty()
    }

    pub fn get(&self, path: &SmtPath) -> Option<[u8; 32]> {
        self.leaves.get(path).copied()
    }

    /// Inserts a single leaf. Idempotent when the same `(path, value)`
    /// pair is re-inserted; errors when the path is already occupied by
    /// a different value.
    pub fn add_leaf(&mut self, node: SmtNode) -> Result<(), SmtError> {
        match self.leaves.get(&node.path) {
            Some(existing) if *existing == node.value => Ok(()),
            Some(existing) => Err(SmtError::LeafInBranch {
                existing_value: *existing,
            }),
            None => {
                self.leaves.insert(node.path, node.value);
                Ok(())
            }
        }
    }

    /// Inserts a batch of leaves. Stops at the first genuine conflict;
    /// leaves inserted before the conflict remain (callers apply this
    /// against a tree they're prepared to discard on error).
    pub fn add_leaves(&mut self, nodes: impl IntoIterator<Item = SmtNode>) -> Result<(), SmtError> {
        for node in nodes {
            self.add_leaf(node)?;
        }
        Ok(())
    }

    pub fn root_hash(&self) -> [u8; 32] {
        let entries: Vec<(&SmtPath, &[u8; 32])> = self.leaves.iter().collect();
        Self::subtree_hash(&entries, 0)
    }

    /// Builds the [`MerklePath`] for `path`: its current value (if any)
    /// and the 256 sibling hashes needed to recompute the root.
    pub fn merkle_path(&self, path: &SmtPath) -> MerklePath {
        let entries: Vec<(&SmtPath, &[u8; 32])> = self.leaves.iter().collect();
        let mut siblings = Vec::with_capacity(SmtPath::DEPTH);
        Self::subtree_hash_with_proof(&entries, 0, path, &mut siblings);
        MerklePath {
            leaf_value: self.get(path),
            siblings,
        }
    }

    fn subtree_hash(entries: &[(&SmtPath, &[u8; 32])], depth: usize) -> [u8; 32] {
        if entries.is_empty() {
            return EMPTY_HASHES[depth];
        }
        if depth == SmtPath::DEPTH {
            return *entries[0].1;
        }
        let (left, right): (Vec<_>, Vec<_>) =
            entries.iter().copied().partition(|(p, _)| !p.bit(depth));
        let left_hash = Self::subtree_hash(&left, depth + 1);
        let right_hash = Self::subtree_hash(&right, depth + 1);
        hash_pair(&left_hash, &right_hash)
    }

    /// Same traversal as [`Self::subtree_hash`], but along the way it
    /// records the sibling hash of whichever branch `target` doesn't
    /// take at each depth. Pushes deepest-first, so `siblings` ends up
    /// in leaf-to-root order.
    fn subtree_hash_with_proof(
        entries: &[(&SmtPath, &[u8; 32])],
        depth: usize,
        target: &SmtPath,
        siblings: &mut Vec<[u8; 32]>,
    ) -> [u8; 32] {
        if entries.is_empty() {
            return EMPTY_HASHES[depth];
        }
        if depth == SmtPath::DEPTH {
            return *entries[0].1;
        }
        let (left, right): (Vec<_>, Vec<_>) =
            entries.iter().copied().partition(|(p, _)| !p.bit(depth));
        if target.bit(depth) {
            let sibling_hash = Self::subtree_hash(&left, depth + 1);
            let sub_hash = Self::subtree_hash_with_proof(&right, depth + 1, target, siblings);
            siblings.push(sibling_hash);
            hash_pair(&sibling_hash, &sub_hash)
        } else {
            let sub_hash = Self::subtree_hash_with_proof(&left, depth + 1, target, siblings);
            let sibling_hash = Self::subtree_hash(&right, depth + 1);
            siblings.push(sibling_hash);
            hash_pair(&sub_hash, &sibling_hash)
        }
    }
}

/// Recomputes a root hash from a [`MerklePath`], for verifying that a
/// proof this tree produced is actually consistent with its root.
pub fn recompute_root(path: &SmtPath, merkle_path: &MerklePath) -> [u8; 32] {
    let mut hash = merkle_path
        .leaf_value
        .unwrap_or(EMPTY_HASHES[SmtPath::DEPTH]);
    for (i, sibling) in merkle_path.siblings.iter().enumerate() {
        let depth = SmtPath::DEPTH - 1 - i;
        hash = if path.bit(depth) {
            hash_pair(sibling, &hash)
        } else {
            hash_pair(&hash, sibling)
        };
    }
    hash
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

    #[test]
    fn empty_tree_root_matches_empty_hashes_table() {
        let tree = SparseMerkleTree::new();
        assert_eq!(tree.root_hash(), EMPTY_HASHES[0]);
    }

    #[test]
    fn add_leaf_is_idempotent_for_identical_value() {
        let mut tree = SparseMerkleTree::new();
        let n = node(0b1000_0000, 7);
        tree.add_leaf(n).unwrap();
        tree.add_leaf(n).unwrap();
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn add_leaf_rejects_conflicting_value_at_same_path() {
        let mut tree = SparseMerkleTree::new();
        let n = node(0b1000_0000, 7);
        tree.add_leaf(n).unwrap();
        let conflicting = SmtNode {
            path: n.path,
            value: [9; 32],
        };
        assert_matches!(
            tree.add_leaf(conflicting),
            Err(SmtError::LeafInBranch { existing_value }) if existing_value == [7; 32]
        );
    }

    #[test]
    fn single_leaf_changes_root_from_empty() {
        let mut tree = SparseMerkleTree::new();
        let empty_root = tree.root_hash();
        tree.add_leaf(node(0b0101_0101, 3)).unwrap();
        assert_ne!(tree.root_hash(), empty_root);
    }

    #[test]
    fn insertion_order_does_not_affect_root() {
        let a = node(0b0000_0001, 1);
        let b = node(0b1111_1110, 2);
        let c = node(0b1010_1010, 3);

        let mut first = SparseMerkleTree::new();
        first.add_leaves([a, b, c]).unwrap();

        let mut second = SparseMerkleTree::new();
        second.add_leaves([c, b, a]).unwrap();

        assert_eq!(first.root_hash(), second.root_hash());
    }

    #[test]
    fn merkle_path_recomputes_to_current_root() {
        let mut tree = SparseMerkleTree::new();
        let target = node(0b1100_0000, 5);
        tree.add_leaves([target, node(0b0011_0000, 6), node(0b1111_1111, 8)])
            .unwrap();

        let proof = tree.merkle_path(&target.path);
        assert_eq!(proof.leaf_value, Some([5u8; 32]));
        assert_eq!(proof.siblings.len(), SmtPath::DEPTH);
        assert_eq!(recompute_root(&target.path, &proof), tree.root_hash());
    }

    #[test]
    fn merkle_path_for_absent_path_proves_non_inclusion() {
        let mut tree = SparseMerkleTree::new();
        tree.add_leaf(node(0b0000_0000, 1)).unwrap();

        let mut absent_path = [0u8; 32];
        absent_path[0] = 0b1111_1111;
        let absent = SmtPath(absent_path);

        let proof = tree.merkle_path(&absent);
        assert_eq!(proof.leaf_value, None);
        assert_eq!(recompute_root(&absent, &proof), tree.root_hash());
    }
}

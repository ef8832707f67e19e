use agg_crypto::hash_pair;
use once_cell::sync::Lazy;

use agg_types::SmtPath;

/// `EMPTY_HASHES[d]` is the hash of an empty subtree rooted at depth `d`
/// (0 = tree root, `SmtPath::DEPTH` = leaf level). Index 256 is the hash
/// of an empty leaf; every other entry is `H(child||child)` of the next
/// deeper empty hash.
pub static EMPTY_HASHES: Lazy<[[u8; 32]; SmtPath::DEPTH + 1]> = Lazy::new(|| {
    let mut table = [[0u8; 32]; SmtPath::DEPTH + 1];
    table[SmtPath::DEPTH] = agg_crypto::sha256(b"");
    for depth in (0..SmtPath::DEPTH).rev() {
        table[depth] = hash_pair(&table[depth + 1], &table[depth + 1]);
    }
    table
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_is_internally_consistent() {
        for depth in 0..SmtPath::DEPTH {
            assert_eq!(
                EMPTY_HASHES[depth],
                hash_pair(&EMPTY_HASHES[depth + 1], &EMPTY_HASHES[depth + 1])
            );
        }
    }

    #[test]
    fn leaf_level_is_empty_leaf_hash() {
        assert_eq!(EMPTY_HASHES[SmtPath::DEPTH], agg_crypto::sha256(b""));
    }
}

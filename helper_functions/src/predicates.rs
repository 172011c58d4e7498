use types::primitives::H256;

/// Checks a branch of sibling hashes ordered from the leaf up.
#[must_use]
pub fn is_valid_merkle_branch(
    leaf: H256,
    branch: impl IntoIterator<Item = H256>,
    index: u64,
    root: H256,
) -> bool {
    branch_root(leaf, branch, index) == root
}

/// Checks a deposit proof against a root with the deposit count mixed in.
#[must_use]
pub fn is_valid_deposit_proof(
    leaf: H256,
    branch: &[H256],
    index: u64,
    deposit_count: u64,
    deposit_root: H256,
) -> bool {
    let tree_root = branch_root(leaf, branch.iter().copied(), index);
    hashing::mix_in_length(tree_root, deposit_count) == deposit_root
}

fn branch_root(leaf: H256, branch: impl IntoIterator<Item = H256>, index: u64) -> H256 {
    branch
        .into_iter()
        .enumerate()
        .fold(leaf, |hash, (height, node)| {
            if (index >> height) & 1 == 1 {
                hashing::hash_256_256(node, hash)
            } else {
                hashing::hash_256_256(hash, node)
            }
        })
}

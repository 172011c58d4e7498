use crate::primitives::H256;

/// SSZ `hash_tree_root` for the containers this workspace needs.
pub trait HashTreeRoot {
    fn hash_tree_root(&self) -> H256;
}

impl HashTreeRoot for u64 {
    fn hash_tree_root(&self) -> H256 {
        hashing::uint_chunk(*self)
    }
}

impl HashTreeRoot for H256 {
    fn hash_tree_root(&self) -> H256 {
        *self
    }
}

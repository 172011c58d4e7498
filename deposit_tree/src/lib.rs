pub use crate::{
    deposit_tree::{DepositTree, DepositTreeSerialization, Error},
    merkle_tree::{MerkleTreeError, SparseMerkleTree},
};

mod deposit_tree;
mod merkle_tree;

use anyhow::{ensure, Result};
use hashing::MAX_DEPTH;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use types::primitives::{DepositIndex, DepositProof, H256};

use crate::merkle_tree::SparseMerkleTree;

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum Error {
    #[error("wrong deposit index (expected: {expected}, got: {got})")]
    WrongDepositIndex {
        expected: DepositIndex,
        got: DepositIndex,
    },
    #[error("deposit tree is full (depth: {depth})")]
    Full { depth: usize },
    #[error("deposit tree depth {depth} is not in 1..={MAX_DEPTH}")]
    InvalidDepth { depth: usize },
    #[error("no deposit at index {index} (count: {count})")]
    MissingDeposit {
        index: DepositIndex,
        count: DepositIndex,
    },
}

/// Persisted form of [`DepositTree`]. The tree itself is rebuilt from the leaves.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct DepositTreeSerialization {
    pub depth: usize,
    pub leaves: Vec<H256>,
}

/// Append-only accumulator of deposit leaves.
///
/// [`DepositTree::root`] mixes in the number of leaves like the deposit contract does.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
#[serde(
    try_from = "DepositTreeSerialization",
    into = "DepositTreeSerialization"
)]
pub struct DepositTree {
    depth: usize,
    leaves: Vec<H256>,
    merkle_tree: SparseMerkleTree,
}

impl TryFrom<DepositTreeSerialization> for DepositTree {
    type Error = Error;

    fn try_from(serialization: DepositTreeSerialization) -> Result<Self, Self::Error> {
        let DepositTreeSerialization { depth, leaves } = serialization;

        validate_depth(depth)?;

        if leaves.len() > (1 << depth) {
            return Err(Error::Full { depth });
        }

        let merkle_tree = SparseMerkleTree::create(&leaves, depth);

        Ok(Self {
            depth,
            leaves,
            merkle_tree,
        })
    }
}

impl From<DepositTree> for DepositTreeSerialization {
    fn from(deposit_tree: DepositTree) -> Self {
        deposit_tree.to_serialization()
    }
}

impl DepositTree {
    pub fn new(depth: usize) -> Result<Self> {
        validate_depth(depth)?;

        Ok(Self {
            depth,
            leaves: vec![],
            merkle_tree: SparseMerkleTree::Zero(depth),
        })
    }

    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    #[must_use]
    pub fn count(&self) -> DepositIndex {
        self.leaves.len() as DepositIndex
    }

    /// Root of the tree with the deposit count mixed in.
    #[must_use]
    pub fn root(&self) -> H256 {
        hashing::mix_in_length(self.merkle_tree.hash(), self.count())
    }

    pub fn insert(&mut self, leaf: H256, index: DepositIndex) -> Result<()> {
        let count = self.count();

        ensure!(
            index == count,
            Error::WrongDepositIndex {
                expected: count,
                got: index,
            },
        );

        ensure!(
            self.leaves.len() < (1 << self.depth),
            Error::Full { depth: self.depth },
        );

        self.merkle_tree.push_leaf(leaf, self.depth)?;
        self.leaves.push(leaf);

        Ok(())
    }

    /// Sibling hashes of the leaf at `index` ordered from the bottom up.
    ///
    /// The proof does not include the length mix-in.
    pub fn proof(&self, index: DepositIndex) -> Result<DepositProof> {
        let count = self.count();

        ensure!(index < count, Error::MissingDeposit { index, count });

        let (_, proof) = self
            .merkle_tree
            .generate_proof(usize::try_from(index)?, self.depth)?;

        Ok(proof)
    }

    #[must_use]
    pub fn to_serialization(&self) -> DepositTreeSerialization {
        DepositTreeSerialization {
            depth: self.depth,
            leaves: self.leaves.clone(),
        }
    }
}

const fn validate_depth(depth: usize) -> Result<(), Error> {
    if depth == 0 || depth > MAX_DEPTH {
        return Err(Error::InvalidDepth { depth });
    }

    Ok(())
}

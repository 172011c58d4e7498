use hashing::{MAX_DEPTH, ZERO_HASHES};
use thiserror::Error;
use types::primitives::H256;

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum MerkleTreeError {
    #[error("cannot push below a leaf")]
    LeafReached,
    #[error("tree is full")]
    TreeFull,
    #[error("tree has a node with a leaf on the right and an empty subtree on the left")]
    Invalid,
    #[error("depth must be at least 1")]
    DepthTooSmall,
    #[error("depth {depth} exceeds maximum of {MAX_DEPTH}")]
    DepthTooLarge { depth: usize },
}

/// Merkle tree of fixed depth in which only a prefix of the leaves is populated.
///
/// Unpopulated subtrees are represented by their depth alone.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum SparseMerkleTree {
    Zero(usize),
    Leaf(H256),
    Node(H256, Box<Self>, Box<Self>),
}

impl SparseMerkleTree {
    #[must_use]
    pub fn create(leaves: &[H256], depth: usize) -> Self {
        if leaves.is_empty() {
            return Self::Zero(depth);
        }

        if depth == 0 {
            debug_assert_eq!(leaves.len(), 1);
            return Self::Leaf(leaves[0]);
        }

        let subtree_capacity = 1 << (depth - 1);

        let (left_leaves, right_leaves) = if leaves.len() <= subtree_capacity {
            (leaves, &[][..])
        } else {
            leaves.split_at(subtree_capacity)
        };

        let left = Self::create(left_leaves, depth - 1);
        let right = Self::create(right_leaves, depth - 1);
        let hash = hashing::hash_256_256(left.hash(), right.hash());

        Self::Node(hash, Box::new(left), Box::new(right))
    }

    pub fn push_leaf(&mut self, leaf: H256, depth: usize) -> Result<(), MerkleTreeError> {
        if depth == 0 {
            return Err(MerkleTreeError::DepthTooSmall);
        }

        if depth > MAX_DEPTH {
            return Err(MerkleTreeError::DepthTooLarge { depth });
        }

        match self {
            Self::Leaf(_) => return Err(MerkleTreeError::LeafReached),
            Self::Zero(_) => *self = Self::create(&[leaf], depth),
            Self::Node(hash, left, right) => {
                match (&**left, &**right) {
                    (Self::Leaf(_), Self::Leaf(_)) => return Err(MerkleTreeError::TreeFull),
                    (Self::Zero(_), Self::Zero(_)) => **left = Self::create(&[leaf], depth - 1),
                    (Self::Leaf(_), Self::Zero(_)) => **right = Self::create(&[leaf], depth - 1),
                    (Self::Node(..), Self::Node(..)) => right.push_leaf(leaf, depth - 1)?,
                    (Self::Node(..), Self::Zero(_)) => match left.push_leaf(leaf, depth - 1) {
                        Ok(()) => {}
                        Err(MerkleTreeError::TreeFull) => {
                            **right = Self::create(&[leaf], depth - 1);
                        }
                        Err(error) => return Err(error),
                    },
                    _ => return Err(MerkleTreeError::Invalid),
                }

                *hash = hashing::hash_256_256(left.hash(), right.hash());
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn hash(&self) -> H256 {
        match self {
            Self::Zero(depth) => ZERO_HASHES[*depth],
            Self::Leaf(hash) | Self::Node(hash, _, _) => *hash,
        }
    }

    /// Returns the leaf at `index` along with its siblings ordered from the bottom up.
    pub fn generate_proof(
        &self,
        index: usize,
        depth: usize,
    ) -> Result<(H256, Vec<H256>), MerkleTreeError> {
        let mut proof = Vec::with_capacity(depth);
        let mut node = self;

        for level in (0..depth).rev() {
            match node {
                Self::Node(_, left, right) => {
                    if (index >> level) & 1 == 1 {
                        proof.push(left.hash());
                        node = right;
                    } else {
                        proof.push(right.hash());
                        node = left;
                    }
                }
                Self::Zero(_) => {
                    // Everything below an empty subtree is empty too.
                    proof.extend(ZERO_HASHES[..=level].iter().rev());
                    proof.reverse();
                    return Ok((H256::zero(), proof));
                }
                Self::Leaf(_) => return Err(MerkleTreeError::LeafReached),
            }
        }

        proof.reverse();

        Ok((node.hash(), proof))
    }
}

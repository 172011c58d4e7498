use bitvec::{order::Lsb0, vec::BitVec};
use serde::{Deserialize, Serialize};

use crate::{
    primitives::{
        DepositProof, Epoch, ExecutionAddress, ExecutionBlockHash, ExecutionTransactionHash, Gwei,
        PublicKeyBytes, SignatureBytes, Slot, ValidatorIndex, H256,
    },
    traits::HashTreeRoot,
};

/// Deposit as emitted by the staking contract.
///
/// Unlike the standard container this one records who made the deposit and in which transaction.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct DepositData {
    pub pubkey: PublicKeyBytes,
    pub creator_address: ExecutionAddress,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
    pub signature: SignatureBytes,
    pub init_tx_hash: ExecutionTransactionHash,
}

impl HashTreeRoot for DepositData {
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(
            &[
                bytes_root(self.pubkey.as_bytes()),
                bytes_root(self.creator_address.as_bytes()),
                self.withdrawal_credentials,
                self.amount.hash_tree_root(),
                bytes_root(self.signature.as_bytes()),
                self.init_tx_hash,
            ],
            3,
        )
    }
}

impl DepositData {
    #[must_use]
    pub const fn message(&self) -> DepositMessage {
        DepositMessage {
            pubkey: self.pubkey,
            withdrawal_credentials: self.withdrawal_credentials,
            amount: self.amount,
        }
    }
}

/// The part of a deposit covered by its signature.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct DepositMessage {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub amount: Gwei,
}

impl HashTreeRoot for DepositMessage {
    fn hash_tree_root(&self) -> H256 {
        hashing::merkleize(
            &[
                bytes_root(self.pubkey.as_bytes()),
                self.withdrawal_credentials,
                self.amount.hash_tree_root(),
            ],
            2,
        )
    }
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct Deposit {
    /// Sibling hashes from the leaf up, without the length mix-in.
    pub proof: Option<DepositProof>,
    pub data: DepositData,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct Eth1Data {
    pub deposit_root: H256,
    pub deposit_count: u64,
    pub block_hash: ExecutionBlockHash,
    pub candidates: Vec<ExecutionBlockHash>,
    pub finalization: Vec<ExecutionBlockHash>,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct Withdrawal {
    pub epoch: Epoch,
    pub validator_index: ValidatorIndex,
    pub amount: Gwei,
    pub init_tx_hash: ExecutionTransactionHash,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct VoluntaryExit {
    pub epoch: Epoch,
    pub validator_index: ValidatorIndex,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct SignedVoluntaryExit {
    pub message: VoluntaryExit,
    pub signature: SignatureBytes,
}

#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct VotingAttestation {
    pub aggregation_bits: BitVec<u8, Lsb0>,
    pub data_root: H256,
    pub signature: SignatureBytes,
}

/// Votes collected for the execution candidates proposed in one beacon block.
#[derive(Clone, PartialEq, Eq, Default, Debug)]
pub struct BlockVoting {
    pub beacon_block_root: H256,
    pub slot: Slot,
    pub total_attesters: u64,
    pub candidates: Vec<u8>,
    pub attestations: Vec<VotingAttestation>,
}

fn bytes_root(bytes: &[u8]) -> H256 {
    hashing::merkleize_packed(&hashing::pack_bytes(bytes))
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    fn deposit_data() -> DepositData {
        DepositData {
            pubkey: PublicKeyBytes::repeat_byte(1),
            creator_address: ExecutionAddress::repeat_byte(2),
            withdrawal_credentials: H256::repeat_byte(3),
            amount: 32_000_000_000,
            signature: SignatureBytes::repeat_byte(4),
            init_tx_hash: H256::repeat_byte(5),
        }
    }

    #[test]
    fn deposit_data_root_survives_serialization() -> Result<()> {
        let original = deposit_data();
        let bytes = bincode::serialize(&original)?;
        let decoded = bincode::deserialize::<DepositData>(&bytes)?;

        assert_eq!(decoded, original);
        assert_eq!(decoded.hash_tree_root(), original.hash_tree_root());

        Ok(())
    }

    #[test]
    fn deposit_data_root_covers_every_field() {
        let original = deposit_data();
        let root = original.hash_tree_root();

        let variants = [
            DepositData {
                pubkey: PublicKeyBytes::zero(),
                ..original
            },
            DepositData {
                creator_address: ExecutionAddress::zero(),
                ..original
            },
            DepositData {
                withdrawal_credentials: H256::zero(),
                ..original
            },
            DepositData {
                amount: 1,
                ..original
            },
            DepositData {
                signature: SignatureBytes::zero(),
                ..original
            },
            DepositData {
                init_tx_hash: H256::zero(),
                ..original
            },
        ];

        for variant in variants {
            assert_ne!(variant.hash_tree_root(), root);
        }
    }

    #[test]
    fn deposit_message_root_ignores_provenance() {
        let data = deposit_data();

        let other = DepositData {
            creator_address: ExecutionAddress::zero(),
            init_tx_hash: H256::zero(),
            signature: SignatureBytes::zero(),
            ..data
        };

        assert_eq!(
            data.message().hash_tree_root(),
            other.message().hash_tree_root(),
        );
    }

    #[test]
    fn deposit_message_root_matches_standard_layout() {
        let message = DepositMessage {
            pubkey: PublicKeyBytes::zero(),
            withdrawal_credentials: H256::zero(),
            amount: 0,
        };

        // A 48 byte public key occupies two chunks, so its root is the zero tree of depth 1.
        let pubkey_root = hashing::ZERO_HASHES[1];

        assert_eq!(
            message.hash_tree_root(),
            hashing::hash_256_256(
                hashing::hash_256_256(pubkey_root, H256::zero()),
                hashing::ZERO_HASHES[1],
            ),
        );
    }
}

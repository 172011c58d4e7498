use fixed_hash::construct_fixed_hash;
use impl_serde::impl_fixed_hash_serde;

pub use ethereum_types::{H160, H256, H32, H64, U256, U64};

pub type ChainId = u64;
pub type DepositIndex = u64;
pub type Epoch = u64;
pub type Gwei = u64;
pub type NetworkId = u64;
pub type Slot = u64;
pub type UnixSeconds = u64;
pub type ValidatorIndex = u64;

pub type Domain = H256;
pub type DomainType = H32;
pub type Version = H32;

pub type ExecutionAddress = H160;
pub type ExecutionBlockHash = H256;
pub type ExecutionTransactionHash = H256;

/// Finalization number of an execution block. Zero means the block is not finalized yet.
pub type ExecutionBlockNumber = u64;

/// Position of an execution block in the chain regardless of finalization.
pub type ExecutionBlockHeight = u64;

pub type DepositProof = Vec<H256>;

construct_fixed_hash! {
    pub struct PublicKeyBytes(48);
}

construct_fixed_hash! {
    pub struct SignatureBytes(96);
}

impl_fixed_hash_serde!(PublicKeyBytes, 48);
impl_fixed_hash_serde!(SignatureBytes, 96);

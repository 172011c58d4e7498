use serde::{Deserialize, Serialize};

use crate::{
    containers::{Deposit, Eth1Data},
    primitives::{
        DepositIndex, ExecutionBlockHash, ExecutionBlockHeight, ExecutionBlockNumber, Slot,
        UnixSeconds, H256,
    },
};

/// Finalized reference point carried by execution headers.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct ExecutionCheckpoint {
    pub hash: ExecutionBlockHash,
    pub number: ExecutionBlockNumber,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct ExecutionHeader {
    pub hash: ExecutionBlockHash,
    pub number: ExecutionBlockNumber,
    pub height: ExecutionBlockHeight,
    pub timestamp: UnixSeconds,
    pub checkpoint: Option<ExecutionCheckpoint>,
    pub slot: Slot,
}

impl ExecutionHeader {
    /// A header with a zero finalization number is only finalized if it is the genesis block.
    #[must_use]
    pub const fn is_finalized(&self) -> bool {
        self.number != 0 || self.height == 0
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct LatestExecutionData {
    pub block_height: ExecutionBlockHeight,
    pub block_time: UnixSeconds,
    pub block_hash: ExecutionBlockHash,
    pub last_requested_block: ExecutionBlockHeight,
    pub checkpoint_hash: ExecutionBlockHash,
    pub checkpoint_number: ExecutionBlockNumber,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct ChainStartData {
    pub chain_started: bool,
    pub genesis_time: UnixSeconds,
    pub genesis_block_height: ExecutionBlockHeight,
    pub eth1_data: Eth1Data,
    pub chainstart_deposits: Vec<Deposit>,
}

#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct DepositContainer {
    pub index: DepositIndex,
    pub block_height: ExecutionBlockHeight,
    pub deposit: Deposit,
    pub deposit_root: H256,
}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::*;

    #[test_case(0, 0 => true; "genesis")]
    #[test_case(0, 5 => false; "pending finalization")]
    #[test_case(3, 5 => true; "finalized")]
    fn execution_header_is_finalized(number: u64, height: u64) -> bool {
        ExecutionHeader {
            number,
            height,
            ..ExecutionHeader::default()
        }
        .is_finalized()
    }
}

use thiserror::Error;
use types::primitives::{DepositIndex, ExecutionBlockHash, ExecutionBlockHeight, H256};

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum Error {
    #[error("execution header {hash:?} at height {height} is not finalized")]
    NonFinalizedHeader {
        hash: ExecutionBlockHash,
        height: ExecutionBlockHeight,
    },
    #[error("execution header at height {height} has an empty block hash")]
    EmptyBlockHash { height: ExecutionBlockHeight },
    #[error("deposit {index} does not follow the {count} deposits already in the deposit tree")]
    OutOfOrderDepositIndex {
        index: DepositIndex,
        count: DepositIndex,
    },
    #[error("wrong deposit index (expected: {expected}, got: {got})")]
    WrongDepositIndex {
        expected: DepositIndex,
        got: DepositIndex,
    },
    #[error("service has no execution endpoints configured")]
    NilExecutionFetcher,
    #[error("no beacon state found for block {block_root:?}")]
    StateRetrieval { block_root: H256 },
    #[error("failed to persist execution chain snapshot")]
    Persistence,
    #[error("deposit {index} could not be applied to the pre-genesis state")]
    InvalidDepositData { index: DepositIndex },
    #[error("exit request log in block {block_number:?} is malformed")]
    MalformedExitLog { block_number: Option<u64> },
    #[error("withdrawal request log in block {block_number:?} is malformed")]
    MalformedWithdrawalLog { block_number: Option<u64> },
    #[error("service is shutting down")]
    Shutdown,
}

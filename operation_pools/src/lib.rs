pub use crate::{
    block_voting_pool::BlockVotingPool,
    misc::{PoolAdditionOutcome, PoolRejectionReason},
    voluntary_exit_pool::VoluntaryExitPool,
    withdrawal_pool::WithdrawalPool,
};

mod block_voting_pool;
mod misc;
mod voluntary_exit_pool;
mod withdrawal_pool;

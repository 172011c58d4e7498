use core::future::Future;

use anyhow::Result;
use genesis::PreGenesisState;
use parking_lot::RwLock;
use types::{
    containers::{Deposit, Eth1Data},
    nonstandard::{DepositContainer, ExecutionHeader},
    primitives::{
        DepositIndex, ExecutionBlockHash, ExecutionBlockHeight, Slot, UnixSeconds, H256,
    },
};

/// Data gathered before chain start that genesis is built from.
pub trait ChainStartFetcher {
    fn chain_start_deposits(&self) -> Vec<Deposit>;

    fn chain_start_eth1_data(&self) -> Eth1Data;

    fn pre_genesis_state(&self) -> PreGenesisState;
}

pub trait ChainInfoFetcher {
    fn genesis_execution_chain_info(&self) -> (UnixSeconds, ExecutionBlockHeight);

    fn is_connected_to_execution(&self) -> bool;

    /// Returns the last error the polling loop ran into, if it has not recovered since.
    fn status(&self) -> Result<()>;
}

pub trait BlockFetcher {
    fn header_by_hash(
        &self,
        hash: ExecutionBlockHash,
    ) -> impl Future<Output = Result<Option<ExecutionHeader>>> + Send;

    fn header_by_height(
        &self,
        height: ExecutionBlockHeight,
    ) -> impl Future<Output = Result<Option<ExecutionHeader>>> + Send;

    fn block_hash_by_height(
        &self,
        height: ExecutionBlockHeight,
    ) -> impl Future<Output = Result<Option<ExecutionBlockHash>>> + Send;

    fn block_time_by_height(
        &self,
        height: ExecutionBlockHeight,
    ) -> impl Future<Output = Result<Option<UnixSeconds>>> + Send;

    fn block_exists(
        &self,
        hash: ExecutionBlockHash,
    ) -> impl Future<Output = Result<Option<ExecutionBlockHeight>>> + Send;
}

/// Deposits seen after chain start that still have to be included in beacon blocks.
pub trait PendingDepositsCache: Send + Sync {
    fn insert_pending_deposit(&self, container: DepositContainer);
}

/// Parts of a beacon state the service reads when following the beacon chain.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug)]
pub struct BeaconStateSummary {
    pub slot: Slot,
    pub eth1_deposit_index: DepositIndex,
    pub base_spine: ExecutionBlockHash,
}

pub trait BeaconStateProvider: Send + Sync {
    fn state_by_block_root(&self, block_root: H256) -> Option<BeaconStateSummary>;
}

#[derive(Default)]
pub struct PendingDeposits {
    containers: RwLock<Vec<DepositContainer>>,
}

impl PendingDepositsCache for PendingDeposits {
    fn insert_pending_deposit(&self, container: DepositContainer) {
        let mut containers = self.containers.write();

        if containers.iter().all(|pending| pending.index != container.index) {
            containers.push(container);
        }
    }
}

impl PendingDeposits {
    /// Returns pending deposits starting at `start_index` in index order.
    #[must_use]
    pub fn pending(&self, start_index: DepositIndex) -> Vec<DepositContainer> {
        let mut pending = self
            .containers
            .read()
            .iter()
            .filter(|container| container.index >= start_index)
            .cloned()
            .collect::<Vec<_>>();

        pending.sort_by_key(|container| container.index);
        pending
    }

    /// Drops deposits that have been included in the chain.
    pub fn prune(&self, included_index: DepositIndex) {
        self.containers
            .write()
            .retain(|container| container.index >= included_index);
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.containers.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.containers.read().is_empty()
    }
}

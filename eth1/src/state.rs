use anyhow::Result;
use deposit_tree::DepositTree;
use genesis::PreGenesisState;
use types::{
    config::Config,
    consts::GENESIS_SLOT,
    containers::Deposit,
    nonstandard::{ChainStartData, DepositContainer, LatestExecutionData},
    primitives::{DepositIndex, ExecutionBlockHeight, Slot},
    traits::HashTreeRoot as _,
};

use crate::snapshot::Snapshot;

/// Mutable part of the execution service.
pub struct ServiceState {
    pub latest: LatestExecutionData,
    pub chain_start: ChainStartData,
    pub pre_genesis: PreGenesisState,
    pub deposit_tree: DepositTree,
    pub deposit_containers: Vec<DepositContainer>,
    pub last_received_index: Option<DepositIndex>,
    pub run_error: Option<String>,
    pub connected: bool,
    pub last_handled_slot: Slot,
}

impl ServiceState {
    pub fn new(config: &Config, contract_deployment_block: ExecutionBlockHeight) -> Result<Self> {
        Ok(Self {
            latest: LatestExecutionData {
                last_requested_block: contract_deployment_block,
                ..LatestExecutionData::default()
            },
            chain_start: ChainStartData::default(),
            pre_genesis: PreGenesisState::new(config),
            deposit_tree: DepositTree::new(config.deposit_contract_tree_depth)?,
            deposit_containers: vec![],
            last_received_index: None,
            run_error: None,
            connected: false,
            last_handled_slot: GENESIS_SLOT,
        })
    }

    #[must_use]
    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        let Snapshot {
            latest_execution_data,
            chain_start_data,
            pre_genesis_state,
            deposit_tree,
            deposit_containers,
        } = snapshot;

        Self {
            latest: latest_execution_data,
            chain_start: chain_start_data,
            pre_genesis: pre_genesis_state,
            last_received_index: deposit_tree.count().checked_sub(1),
            deposit_tree,
            deposit_containers,
            run_error: None,
            connected: false,
            last_handled_slot: GENESIS_SLOT,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            latest_execution_data: self.latest,
            chain_start_data: self.chain_start.clone(),
            pre_genesis_state: self.pre_genesis.clone(),
            deposit_tree: self.deposit_tree.clone(),
            deposit_containers: self.deposit_containers.clone(),
        }
    }
}

/// Rebuilds deposit data of a started chain from the deposits it was started with.
///
/// Deposits processed after genesis are downloaded again starting at the genesis block.
pub fn snapshot_from_genesis(config: &Config, chain_start: ChainStartData) -> Result<Snapshot> {
    let mut deposit_tree = DepositTree::new(config.deposit_contract_tree_depth)?;
    let mut deposit_containers = Vec::with_capacity(chain_start.chainstart_deposits.len());

    for (index, deposit) in (0..).zip(&chain_start.chainstart_deposits) {
        deposit_tree.insert(deposit.data.hash_tree_root(), index)?;

        deposit_containers.push(DepositContainer {
            index,
            block_height: chain_start.genesis_block_height,
            deposit: Deposit {
                proof: None,
                data: deposit.data,
            },
            deposit_root: deposit_tree.root(),
        });
    }

    Ok(Snapshot {
        latest_execution_data: LatestExecutionData {
            last_requested_block: chain_start.genesis_block_height,
            ..LatestExecutionData::default()
        },
        chain_start_data: chain_start,
        pre_genesis_state: PreGenesisState::new(config),
        deposit_tree,
        deposit_containers,
    })
}

use anyhow::{Context as _, Result};
use database::Database;
use deposit_tree::DepositTree;
use genesis::PreGenesisState;
use serde::{Deserialize, Serialize};
use types::nonstandard::{ChainStartData, DepositContainer, LatestExecutionData};

use crate::error::Error;

const SNAPSHOT_KEY: &str = "powchain-data";

/// Everything the service needs to resume after a restart.
#[derive(Clone, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Snapshot {
    pub latest_execution_data: LatestExecutionData,
    pub chain_start_data: ChainStartData,
    pub pre_genesis_state: PreGenesisState,
    pub deposit_tree: DepositTree,
    pub deposit_containers: Vec<DepositContainer>,
}

impl Snapshot {
    pub fn load(database: &Database) -> Result<Option<Self>> {
        database
            .get(SNAPSHOT_KEY)?
            .map(|bytes| {
                bincode::deserialize(&bytes).context("failed to decode execution chain snapshot")
            })
            .transpose()
    }

    pub fn save(&self, database: &Database) -> Result<()> {
        let bytes = bincode::serialize(self).context(Error::Persistence)?;
        database.put(SNAPSHOT_KEY, bytes).context(Error::Persistence)
    }
}

/// Sorts `containers` by index and checks that the indices are `0..containers.len()`.
pub fn validate_deposit_containers(containers: &mut [DepositContainer]) -> bool {
    containers.sort_by_key(|container| container.index);

    containers
        .iter()
        .zip(0..)
        .all(|(container, expected)| container.index == expected)
}

use core::num::NonZeroU64;
use std::sync::Arc;

use anyhow::{ensure, Result};
use deposit_tree::DepositTree;
use helper_functions::{predicates, signing};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use types::{
    config::Config,
    consts::{FAR_FUTURE_EPOCH, GENESIS_EPOCH},
    containers::{Deposit, DepositData, Eth1Data},
    primitives::{
        DepositIndex, Epoch, ExecutionBlockHash, Gwei, PublicKeyBytes, UnixSeconds,
        ValidatorIndex, Version, H256,
    },
    traits::HashTreeRoot as _,
};

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum Error {
    #[error("deposit {index} has no Merkle proof")]
    MissingProof { index: DepositIndex },
    #[error("deposit {index} has an invalid Merkle proof")]
    InvalidProof { index: DepositIndex },
    #[error("deposit {index} is beyond deposit count {deposit_count} in eth1_data")]
    DepositBeyondCount {
        index: DepositIndex,
        deposit_count: u64,
    },
}

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum GenesisTriggerError {
    #[error("too early ({actual_genesis_time} < {minimum_genesis_time})")]
    TooEarly {
        minimum_genesis_time: UnixSeconds,
        actual_genesis_time: UnixSeconds,
    },
    #[error("not enough active validators ({actual_validator_count} < {minimum_validator_count})")]
    NotEnoughActiveValidators {
        minimum_validator_count: NonZeroU64,
        actual_validator_count: u64,
    },
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Deserialize, Serialize)]
pub struct Validator {
    pub pubkey: PublicKeyBytes,
    pub withdrawal_credentials: H256,
    pub effective_balance: Gwei,
    pub activation_eligibility_epoch: Epoch,
    pub activation_epoch: Epoch,
    pub exit_epoch: Epoch,
    pub withdrawable_epoch: Epoch,
}

impl Validator {
    #[must_use]
    pub const fn is_active(&self, epoch: Epoch) -> bool {
        self.activation_epoch <= epoch && epoch < self.exit_epoch
    }
}

/// Beacon state as far as it exists before chain start.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
pub struct PreGenesisState {
    pub genesis_time: UnixSeconds,
    pub fork_version: Version,
    pub eth1_data: Eth1Data,
    pub eth1_deposit_index: DepositIndex,
    pub validators: Vec<Validator>,
    pub balances: Vec<Gwei>,
}

impl PreGenesisState {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            fork_version: config.genesis_fork_version,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn index_of_public_key(&self, pubkey: PublicKeyBytes) -> Option<ValidatorIndex> {
        self.validators
            .iter()
            .position(|validator| validator.pubkey == pubkey)
            .and_then(|index| index.try_into().ok())
    }

    #[must_use]
    pub fn active_validator_count(&self) -> u64 {
        self.validators
            .iter()
            .filter(|validator| validator.is_active(GENESIS_EPOCH))
            .count() as u64
    }
}

/// The part of the state transition function needed before chain start.
pub trait StateTransition: Send + Sync {
    /// Applies `deposit` to a copy of `state` after replacing its `eth1_data`.
    ///
    /// Deposits with invalid signatures are consumed without adding a validator.
    fn process_pre_genesis_deposit(
        &self,
        state: &PreGenesisState,
        deposit: &Deposit,
        eth1_data: &Eth1Data,
    ) -> Result<PreGenesisState>;

    fn is_valid_genesis_state(
        &self,
        active_validator_count: u64,
        genesis_time: UnixSeconds,
    ) -> bool;
}

pub struct GenesisTransition {
    config: Arc<Config>,
}

impl GenesisTransition {
    #[must_use]
    pub const fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn apply_deposit_data(&self, state: &mut PreGenesisState, data: DepositData) {
        let DepositData {
            pubkey,
            withdrawal_credentials,
            amount,
            ..
        } = data;

        let validator_index = match state.index_of_public_key(pubkey) {
            Some(validator_index) => validator_index,
            None => {
                if !signing::verify_deposit_signature(&self.config, &data.message(), data.signature)
                {
                    debug!(%pubkey, "skipping pre-genesis deposit with invalid signature");
                    return;
                }

                state.validators.push(Validator {
                    pubkey,
                    withdrawal_credentials,
                    effective_balance: 0,
                    activation_eligibility_epoch: FAR_FUTURE_EPOCH,
                    activation_epoch: FAR_FUTURE_EPOCH,
                    exit_epoch: FAR_FUTURE_EPOCH,
                    withdrawable_epoch: FAR_FUTURE_EPOCH,
                });

                state.balances.push(0);

                state.validators.len() as ValidatorIndex - 1
            }
        };

        let Ok(position) = usize::try_from(validator_index) else {
            return;
        };

        let (Some(validator), Some(balance)) = (
            state.validators.get_mut(position),
            state.balances.get_mut(position),
        ) else {
            return;
        };

        *balance = balance.saturating_add(amount);

        let increment = self.config.effective_balance_increment.get();
        let max_effective_balance = self.config.max_effective_balance;

        validator.effective_balance = (*balance - *balance % increment).min(max_effective_balance);

        if validator.effective_balance == max_effective_balance {
            validator.activation_eligibility_epoch = GENESIS_EPOCH;
            validator.activation_epoch = GENESIS_EPOCH;
        }
    }
}

impl StateTransition for GenesisTransition {
    fn process_pre_genesis_deposit(
        &self,
        state: &PreGenesisState,
        deposit: &Deposit,
        eth1_data: &Eth1Data,
    ) -> Result<PreGenesisState> {
        let index = state.eth1_deposit_index;

        ensure!(
            index < eth1_data.deposit_count,
            Error::DepositBeyondCount {
                index,
                deposit_count: eth1_data.deposit_count,
            },
        );

        let proof = deposit
            .proof
            .as_deref()
            .ok_or(Error::MissingProof { index })?;

        ensure!(
            predicates::is_valid_deposit_proof(
                deposit.data.hash_tree_root(),
                proof,
                index,
                eth1_data.deposit_count,
                eth1_data.deposit_root,
            ),
            Error::InvalidProof { index },
        );

        let mut state = state.clone();

        state.eth1_data = eth1_data.clone();
        state.eth1_deposit_index += 1;

        self.apply_deposit_data(&mut state, deposit.data);

        Ok(state)
    }

    fn is_valid_genesis_state(
        &self,
        active_validator_count: u64,
        genesis_time: UnixSeconds,
    ) -> bool {
        validate_genesis_trigger(&self.config, active_validator_count, genesis_time).is_ok()
    }
}

/// Builds a pre-genesis state from deposit data without going through the execution chain.
pub struct Incremental<'transition> {
    transition: &'transition GenesisTransition,
    state: PreGenesisState,
    deposit_tree: DepositTree,
    deposits: Vec<Deposit>,
}

impl<'transition> Incremental<'transition> {
    pub fn new(transition: &'transition GenesisTransition) -> Result<Self> {
        let config = transition.config();

        Ok(Self {
            transition,
            state: PreGenesisState::new(config),
            deposit_tree: DepositTree::new(config.deposit_contract_tree_depth)?,
            deposits: vec![],
        })
    }

    pub fn set_eth1_timestamp(&mut self, eth1_timestamp: UnixSeconds) {
        self.state.genesis_time = eth1_timestamp + self.transition.config().genesis_delay;
    }

    pub fn add_deposit_data(&mut self, data: DepositData, index: DepositIndex) -> Result<()> {
        self.deposit_tree.insert(data.hash_tree_root(), index)?;

        let deposit = Deposit {
            proof: Some(self.deposit_tree.proof(index)?),
            data,
        };

        let eth1_data = Eth1Data {
            deposit_root: self.deposit_tree.root(),
            deposit_count: self.deposit_tree.count(),
            ..self.state.eth1_data.clone()
        };

        self.state =
            self.transition
                .process_pre_genesis_deposit(&self.state, &deposit, &eth1_data)?;

        self.deposits.push(deposit);

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        validate_genesis_state(self.transition.config(), &self.state)
    }

    #[must_use]
    pub fn finish(
        self,
        eth1_block_hash: ExecutionBlockHash,
    ) -> (PreGenesisState, DepositTree, Vec<Deposit>) {
        let Self {
            mut state,
            deposit_tree,
            deposits,
            ..
        } = self;

        state.eth1_data.block_hash = eth1_block_hash;

        (state, deposit_tree, deposits)
    }
}

pub fn validate_genesis_state(config: &Config, state: &PreGenesisState) -> Result<()> {
    validate_genesis_trigger(config, state.active_validator_count(), state.genesis_time)
}

fn validate_genesis_trigger(
    config: &Config,
    actual_validator_count: u64,
    actual_genesis_time: UnixSeconds,
) -> Result<()> {
    let minimum_genesis_time = config.min_genesis_time;

    ensure!(
        minimum_genesis_time <= actual_genesis_time,
        GenesisTriggerError::TooEarly {
            minimum_genesis_time,
            actual_genesis_time,
        },
    );

    let minimum_validator_count = config.min_genesis_active_validator_count;

    ensure!(
        minimum_validator_count.get() <= actual_validator_count,
        GenesisTriggerError::NotEnoughActiveValidators {
            minimum_validator_count,
            actual_validator_count,
        },
    );

    Ok(())
}

use core::{num::NonZeroU64, time::Duration};
use std::borrow::Cow;

use hex_literal::hex;
use nonzero_ext::nonzero;
use serde::{Deserialize, Serialize};

use crate::primitives::{
    ChainId, ExecutionAddress, ExecutionBlockHash, Gwei, NetworkId, Slot, UnixSeconds, Version,
    H160, H256, H32, U256,
};

/// Chain parameters shared by every component.
///
/// A single value is constructed at startup and passed around behind an `Arc`.
/// Tests build alternate specs with struct update syntax.
#[expect(
    clippy::unsafe_derive_deserialize,
    reason = "A false positive triggered by `nonzero!`. \
              `Config` has no invariants and is deserialized from user input."
)]
#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct Config {
    // Meta
    pub config_name: Cow<'static, str>,

    // Genesis
    pub genesis_delay: u64,
    pub genesis_fork_version: Version,
    pub min_genesis_active_validator_count: NonZeroU64,
    pub min_genesis_time: UnixSeconds,

    // Time parameters
    pub seconds_per_slot: NonZeroU64,
    pub slots_per_epoch: NonZeroU64,
    pub eth1_follow_distance: u64,

    // Deposit contract
    pub deposit_chain_id: ChainId,
    pub deposit_network_id: NetworkId,
    pub deposit_contract_address: ExecutionAddress,
    pub deposit_contract_tree_depth: usize,

    // Gwei values
    pub max_effective_balance: Gwei,
    pub effective_balance_increment: NonZeroU64,

    // Max operations per block
    pub max_voluntary_exits: u64,
    pub max_withdrawals_per_payload: u64,

    // Forks
    pub delegating_stake_fork_slot: Slot,

    // Transition
    pub terminal_total_difficulty: U256,
    pub terminal_block_hash: ExecutionBlockHash,
    pub terminal_block_number: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self::mainnet()
    }
}

impl Config {
    #[must_use]
    pub fn mainnet() -> Self {
        Self {
            config_name: Cow::Borrowed("mainnet"),

            genesis_delay: 604_800,
            genesis_fork_version: H32::zero(),
            min_genesis_active_validator_count: nonzero!(16_384_u64),
            min_genesis_time: 1_606_824_000,

            seconds_per_slot: nonzero!(12_u64),
            slots_per_epoch: nonzero!(32_u64),
            eth1_follow_distance: 2048,

            deposit_chain_id: 1,
            deposit_network_id: 1,
            deposit_contract_address: H160(hex!("00000000219ab540356cBB839Cbe05303d7705Fa")),
            deposit_contract_tree_depth: 32,

            max_effective_balance: 32_000_000_000,
            effective_balance_increment: nonzero!(1_000_000_000_u64),

            max_voluntary_exits: 16,
            max_withdrawals_per_payload: 16,

            delegating_stake_fork_slot: Slot::MAX,

            terminal_total_difficulty: U256::MAX,
            terminal_block_hash: H256::zero(),
            terminal_block_number: 0,
        }
    }

    #[must_use]
    pub fn minimal() -> Self {
        Self {
            config_name: Cow::Borrowed("minimal"),

            genesis_delay: 300,
            genesis_fork_version: H32(hex!("00000001")),
            min_genesis_active_validator_count: nonzero!(64_u64),
            min_genesis_time: 1_578_009_600,

            seconds_per_slot: nonzero!(6_u64),
            slots_per_epoch: nonzero!(8_u64),
            eth1_follow_distance: 16,

            deposit_chain_id: 5,
            deposit_network_id: 5,
            deposit_contract_address: H160(hex!("1234567890123456789012345678901234567890")),

            max_voluntary_exits: 4,
            max_withdrawals_per_payload: 4,

            ..Self::mainnet()
        }
    }

    #[must_use]
    pub const fn slot_duration(&self) -> Duration {
        Duration::from_secs(self.seconds_per_slot.get())
    }

    /// Whether the execution integration is driven by finalized checkpoints rather than polling.
    #[must_use]
    pub const fn is_delegating_stake_slot(&self, slot: Slot) -> bool {
        slot >= self.delegating_stake_fork_slot
    }

    /// Number of leaves the deposit contract can hold.
    #[must_use]
    pub const fn max_deposit_count(&self) -> u64 {
        1 << self.deposit_contract_tree_depth
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;

    use super::*;

    #[test]
    fn config_deserializes_partial_overrides() -> Result<()> {
        let json = r#"{
            "CONFIG_NAME": "custom",
            "MIN_GENESIS_ACTIVE_VALIDATOR_COUNT": 8,
            "DELEGATING_STAKE_FORK_SLOT": 100
        }"#;

        let config = serde_json::from_str::<Config>(json)?;

        assert_eq!(config.config_name, "custom");
        assert_eq!(config.min_genesis_active_validator_count.get(), 8);
        assert_eq!(config.seconds_per_slot, Config::mainnet().seconds_per_slot);
        assert!(!config.is_delegating_stake_slot(99));
        assert!(config.is_delegating_stake_slot(100));

        Ok(())
    }

    #[test]
    fn mainnet_never_activates_delegating_stake() {
        assert!(!Config::mainnet().is_delegating_stake_slot(Slot::MAX - 1));
    }

    #[test]
    fn max_deposit_count_follows_tree_depth() {
        let config = Config {
            deposit_contract_tree_depth: 4,
            ..Config::minimal()
        };

        assert_eq!(config.max_deposit_count(), 16);
    }
}

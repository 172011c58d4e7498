use types::{
    config::Config,
    consts::BLS_WITHDRAWAL_PREFIX,
    primitives::{
        Domain, DomainType, Epoch, PublicKeyBytes, Slot, UnixSeconds, Version, H256,
    },
    traits::HashTreeRoot,
};

#[must_use]
pub const fn compute_epoch_at_slot(config: &Config, slot: Slot) -> Epoch {
    slot / config.slots_per_epoch.get()
}

#[must_use]
pub const fn compute_start_slot_at_epoch(config: &Config, epoch: Epoch) -> Slot {
    epoch.saturating_mul(config.slots_per_epoch.get())
}

/// Slot in progress at `time`. Times before genesis map to the genesis slot.
#[must_use]
pub const fn slot_at_time(config: &Config, genesis_time: UnixSeconds, time: UnixSeconds) -> Slot {
    time.saturating_sub(genesis_time) / config.seconds_per_slot.get()
}

#[must_use]
pub const fn epoch_at_time(config: &Config, genesis_time: UnixSeconds, time: UnixSeconds) -> Epoch {
    compute_epoch_at_slot(config, slot_at_time(config, genesis_time, time))
}

#[must_use]
pub fn bls_withdrawal_credentials(pubkey: PublicKeyBytes) -> H256 {
    let mut withdrawal_credentials = hashing::hash_bytes(pubkey.as_bytes());
    withdrawal_credentials.as_bytes_mut()[0] = BLS_WITHDRAWAL_PREFIX;
    withdrawal_credentials
}

// > Return the 32-byte fork data root for the ``current_version`` and ``genesis_validators_root``.
fn compute_fork_data_root(current_version: Version, genesis_validators_root: H256) -> H256 {
    let mut version_chunk = H256::zero();
    version_chunk[..Version::len_bytes()].copy_from_slice(current_version.as_bytes());
    hashing::hash_256_256(version_chunk, genesis_validators_root)
}

#[must_use]
pub fn compute_domain(
    config: &Config,
    domain_type: DomainType,
    fork_version: Option<Version>,
    genesis_validators_root: Option<H256>,
) -> Domain {
    let fork_version = fork_version.unwrap_or(config.genesis_fork_version);
    let genesis_validators_root = genesis_validators_root.unwrap_or_else(H256::zero);
    let fork_data_root = compute_fork_data_root(fork_version, genesis_validators_root);

    let mut domain = Domain::zero();
    domain[..DomainType::len_bytes()].copy_from_slice(domain_type.as_bytes());
    domain[DomainType::len_bytes()..]
        .copy_from_slice(&fork_data_root[..Domain::len_bytes() - DomainType::len_bytes()]);
    domain
}

#[must_use]
pub fn compute_signing_root(object: &impl HashTreeRoot, domain: Domain) -> H256 {
    hashing::hash_256_256(object.hash_tree_root(), domain)
}

use std::sync::Arc;

use parking_lot::RwLock;
use prometheus_metrics::Metrics;
use tracing::debug;
use types::{
    containers::{BlockVoting, VotingAttestation},
    primitives::{Slot, H256},
};

use crate::misc::{PoolAdditionOutcome, PoolRejectionReason};

const METRIC_LABEL: &str = "block_votings";

/// Votes for execution candidates grouped by the beacon block that proposed them.
#[derive(Default)]
pub struct BlockVotingPool {
    votings: RwLock<Vec<BlockVoting>>,
    metrics: Option<Arc<Metrics>>,
}

impl BlockVotingPool {
    #[must_use]
    pub fn new(metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            votings: RwLock::default(),
            metrics,
        }
    }

    /// Adds `attestation` to the record for `record.beacon_block_root`, creating it if needed.
    ///
    /// Attestations already carried by `record` are merged as well.
    pub fn insert(
        &self,
        record: BlockVoting,
        attestation: VotingAttestation,
    ) -> PoolAdditionOutcome {
        if attestation.aggregation_bits.not_any() {
            return PoolAdditionOutcome::Reject(PoolRejectionReason::EmptyAggregationBits);
        }

        let mut votings = self.votings.write();

        let index = match votings
            .iter()
            .position(|voting| voting.beacon_block_root == record.beacon_block_root)
        {
            Some(index) => index,
            None => {
                votings.push(BlockVoting {
                    attestations: vec![],
                    ..record.clone()
                });

                votings.len() - 1
            }
        };

        let outcome = votings.get_mut(index).map_or(PoolAdditionOutcome::Ignore, |voting| {
            for carried in record.attestations {
                merge_attestation(&mut voting.attestations, carried);
            }

            merge_attestation(&mut voting.attestations, attestation)
        });

        self.track_size(votings.len());

        outcome
    }

    #[must_use]
    pub fn get(&self, beacon_block_root: H256) -> Option<BlockVoting> {
        self.votings
            .read()
            .iter()
            .find(|voting| voting.beacon_block_root == beacon_block_root)
            .cloned()
    }

    #[must_use]
    pub fn all(&self) -> Vec<BlockVoting> {
        self.votings.read().clone()
    }

    /// Drops records of blocks older than `finalized_slot`.
    pub fn prune(&self, finalized_slot: Slot) {
        let mut votings = self.votings.write();
        let before = votings.len();

        votings.retain(|voting| voting.slot >= finalized_slot);

        debug!(
            finalized_slot,
            pruned = before - votings.len(),
            "pruned block votings",
        );

        self.track_size(votings.len());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.votings.read().len()
    }

    fn track_size(&self, size: usize) {
        if let Some(metrics) = self.metrics.as_ref() {
            metrics.set_operation_pool_size(METRIC_LABEL, size);
        }
    }
}

fn merge_attestation(
    attestations: &mut Vec<VotingAttestation>,
    attestation: VotingAttestation,
) -> PoolAdditionOutcome {
    let already_seen = attestations.iter().any(|existing| {
        existing.data_root == attestation.data_root && is_superset(existing, &attestation)
    });

    if already_seen {
        return PoolAdditionOutcome::Ignore;
    }

    attestations.retain(|existing| {
        existing.data_root != attestation.data_root || !is_superset(&attestation, existing)
    });

    attestations.push(attestation);

    PoolAdditionOutcome::Accept
}

fn is_superset(superset: &VotingAttestation, subset: &VotingAttestation) -> bool {
    subset.aggregation_bits.iter_ones().all(|index| {
        superset
            .aggregation_bits
            .get(index)
            .is_some_and(|bit| *bit)
    })
}

#[cfg(test)]
mod tests {
    use bitvec::{bitvec, order::Lsb0};
    use types::primitives::SignatureBytes;

    use super::*;

    fn record(byte: u8, slot: Slot) -> BlockVoting {
        BlockVoting {
            beacon_block_root: H256::repeat_byte(byte),
            slot,
            total_attesters: 4,
            candidates: vec![byte],
            attestations: vec![],
        }
    }

    fn attestation(bits: &[bool]) -> VotingAttestation {
        VotingAttestation {
            aggregation_bits: bits.iter().copied().collect(),
            data_root: H256::repeat_byte(0xdd),
            signature: SignatureBytes::zero(),
        }
    }

    #[test]
    fn subsets_of_existing_attestations_are_ignored() {
        let pool = BlockVotingPool::default();

        assert!(pool
            .insert(record(1, 10), attestation(&[true, true, false, false]))
            .is_accepted());

        assert_eq!(
            pool.insert(record(1, 10), attestation(&[true, false, false, false])),
            PoolAdditionOutcome::Ignore,
        );

        assert_eq!(
            pool.insert(record(1, 10), attestation(&[true, true, false, false])),
            PoolAdditionOutcome::Ignore,
        );

        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn supersets_replace_existing_attestations() {
        let pool = BlockVotingPool::default();

        pool.insert(record(1, 10), attestation(&[true, false, false, false]));
        pool.insert(record(1, 10), attestation(&[false, false, true, false]));
        pool.insert(record(1, 10), attestation(&[true, false, true, true]));

        let voting = pool
            .get(H256::repeat_byte(1))
            .expect("record should be in the pool");

        assert_eq!(voting.attestations.len(), 1);
        assert_eq!(voting.attestations[0].aggregation_bits, bitvec![u8, Lsb0; 1, 0, 1, 1]);
    }

    #[test]
    fn disjoint_attestations_are_kept() {
        let pool = BlockVotingPool::default();

        pool.insert(record(1, 10), attestation(&[true, false]));
        pool.insert(record(1, 10), attestation(&[false, true]));

        let voting = pool
            .get(H256::repeat_byte(1))
            .expect("record should be in the pool");

        assert_eq!(voting.attestations.len(), 2);
    }

    #[test]
    fn empty_aggregation_bits_are_rejected() {
        let pool = BlockVotingPool::default();

        assert_eq!(
            pool.insert(record(1, 10), attestation(&[false, false])),
            PoolAdditionOutcome::Reject(PoolRejectionReason::EmptyAggregationBits),
        );

        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn prune_drops_records_before_finalized_slot() {
        let pool = BlockVotingPool::default();

        pool.insert(record(1, 5), attestation(&[true]));
        pool.insert(record(2, 10), attestation(&[true]));
        pool.insert(record(3, 15), attestation(&[true]));

        pool.prune(10);

        let slots = pool.all().into_iter().map(|voting| voting.slot).collect::<Vec<_>>();

        assert_eq!(slots, [10, 15]);
    }
}

use std::sync::Arc;

use helper_functions::misc;
use parking_lot::RwLock;
use prometheus_metrics::Metrics;
use types::{
    config::Config,
    containers::SignedVoluntaryExit,
    primitives::{Slot, ValidatorIndex},
};

use crate::misc::PoolAdditionOutcome;

const METRIC_LABEL: &str = "voluntary_exits";

/// Exits requested through the deposit contract.
///
/// Signatures of these exits encode the log they came from, so identical requests emitted by
/// different transactions are distinct entries while a log processed twice is stored once.
pub struct VoluntaryExitPool {
    config: Arc<Config>,
    exits: RwLock<Vec<SignedVoluntaryExit>>,
    metrics: Option<Arc<Metrics>>,
}

impl VoluntaryExitPool {
    #[must_use]
    pub fn new(config: Arc<Config>, metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            config,
            exits: RwLock::new(vec![]),
            metrics,
        }
    }

    pub fn insert_by_execution(&self, exit: SignedVoluntaryExit) -> PoolAdditionOutcome {
        let mut exits = self.exits.write();

        if exits.iter().any(|pooled| pooled.signature == exit.signature) {
            return PoolAdditionOutcome::Ignore;
        }

        exits.push(exit);

        self.track_size(exits.len());

        PoolAdditionOutcome::Accept
    }

    /// Returns exits whose epoch has been reached by `slot`, in insertion order.
    #[must_use]
    pub fn pending(&self, slot: Slot, no_limit: bool) -> Vec<SignedVoluntaryExit> {
        let current_epoch = misc::compute_epoch_at_slot(&self.config, slot);
        let limit = if no_limit {
            usize::MAX
        } else {
            usize::try_from(self.config.max_voluntary_exits).unwrap_or(usize::MAX)
        };

        self.exits
            .read()
            .iter()
            .filter(|exit| exit.message.epoch <= current_epoch)
            .take(limit)
            .copied()
            .collect()
    }

    pub fn mark_included(&self, validator_index: ValidatorIndex) {
        let mut exits = self.exits.write();

        exits.retain(|exit| exit.message.validator_index != validator_index);

        self.track_size(exits.len());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.exits.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exits.read().is_empty()
    }

    fn track_size(&self, size: usize) {
        if let Some(metrics) = self.metrics.as_ref() {
            metrics.set_operation_pool_size(METRIC_LABEL, size);
        }
    }
}

#[cfg(test)]
mod tests {
    use types::{
        containers::VoluntaryExit,
        primitives::{Epoch, SignatureBytes},
    };

    use super::*;

    fn exit(epoch: Epoch, validator_index: ValidatorIndex, byte: u8) -> SignedVoluntaryExit {
        SignedVoluntaryExit {
            message: VoluntaryExit {
                epoch,
                validator_index,
            },
            signature: SignatureBytes::repeat_byte(byte),
        }
    }

    fn pool() -> VoluntaryExitPool {
        VoluntaryExitPool::new(Arc::new(Config::minimal()), None)
    }

    #[test]
    fn identical_messages_are_not_deduplicated() {
        let pool = pool();

        assert!(pool.insert_by_execution(exit(0, 1, 1)).is_accepted());
        assert!(pool.insert_by_execution(exit(0, 1, 2)).is_accepted());

        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn exits_from_the_same_log_are_stored_once() {
        let pool = pool();

        assert!(pool.insert_by_execution(exit(0, 1, 1)).is_accepted());
        assert_eq!(
            pool.insert_by_execution(exit(0, 1, 1)),
            PoolAdditionOutcome::Ignore,
        );

        // The epoch of a reprocessed log may have moved on with the clock.
        assert_eq!(
            pool.insert_by_execution(exit(2, 1, 1)),
            PoolAdditionOutcome::Ignore,
        );

        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn pending_skips_future_exits_and_caps_at_limit() {
        let pool = pool();

        for validator_index in 0..6 {
            pool.insert_by_execution(exit(0, validator_index, 1));
        }

        pool.insert_by_execution(exit(3, 6, 1));

        let pending = pool.pending(0, false);

        assert_eq!(pending.len(), 4);
        assert!(pending.iter().all(|exit| exit.message.epoch == 0));

        assert_eq!(pool.pending(0, true).len(), 6);
        assert_eq!(pool.pending(24, true).len(), 7);
    }

    #[test]
    fn mark_included_removes_exits_of_validator() {
        let pool = pool();

        pool.insert_by_execution(exit(0, 1, 1));
        pool.insert_by_execution(exit(0, 1, 2));
        pool.insert_by_execution(exit(0, 2, 3));

        pool.mark_included(1);

        assert_eq!(pool.pending(0, true), [exit(0, 2, 3)]);
        assert!(!pool.is_empty());
    }
}

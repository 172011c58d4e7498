use std::sync::Arc;

use helper_functions::misc;
use itertools::Itertools as _;
use parking_lot::RwLock;
use prometheus_metrics::Metrics;
use tracing::debug;
use types::{config::Config, containers::Withdrawal, primitives::Slot};

use crate::misc::{PoolAdditionOutcome, PoolRejectionReason};

const METRIC_LABEL: &str = "withdrawals";

/// Withdrawals requested through the deposit contract, ordered by epoch.
///
/// Entries with the same epoch keep their insertion order.
pub struct WithdrawalPool {
    config: Arc<Config>,
    withdrawals: RwLock<Vec<Withdrawal>>,
    metrics: Option<Arc<Metrics>>,
}

impl WithdrawalPool {
    #[must_use]
    pub fn new(config: Arc<Config>, metrics: Option<Arc<Metrics>>) -> Self {
        Self {
            config,
            withdrawals: RwLock::new(vec![]),
            metrics,
        }
    }

    pub fn insert_by_execution(&self, withdrawal: Withdrawal) -> PoolAdditionOutcome {
        if withdrawal.init_tx_hash.is_zero() {
            return PoolAdditionOutcome::Reject(PoolRejectionReason::EmptyInitTxHash);
        }

        let mut withdrawals = self.withdrawals.write();

        if withdrawals
            .iter()
            .any(|pooled| pooled.init_tx_hash == withdrawal.init_tx_hash)
        {
            debug!(
                init_tx_hash = ?withdrawal.init_tx_hash,
                "ignoring withdrawal that is already in the pool",
            );

            return PoolAdditionOutcome::Ignore;
        }

        // `slice::sort_by_key` is stable, so ties stay in insertion order.
        withdrawals.push(withdrawal);
        withdrawals.sort_by_key(|withdrawal| withdrawal.epoch);

        self.track_size(withdrawals.len());

        PoolAdditionOutcome::Accept
    }

    /// Returns withdrawals that can be included in a block at `slot`.
    #[must_use]
    pub fn pending(&self, slot: Slot, no_limit: bool) -> Vec<Withdrawal> {
        let current_epoch = misc::compute_epoch_at_slot(&self.config, slot);
        let limit = if no_limit {
            usize::MAX
        } else {
            usize::try_from(self.config.max_withdrawals_per_payload).unwrap_or(usize::MAX)
        };

        self.withdrawals
            .read()
            .iter()
            .take_while(|withdrawal| withdrawal.epoch <= current_epoch)
            .take(limit)
            .copied()
            .collect()
    }

    pub fn mark_included(&self, withdrawal: &Withdrawal) {
        let mut withdrawals = self.withdrawals.write();

        if let Some(position) = withdrawals
            .iter()
            .position(|pooled| pooled.init_tx_hash == withdrawal.init_tx_hash)
        {
            withdrawals.remove(position);
        }

        self.track_size(withdrawals.len());
    }

    pub fn mark_all_included<'withdrawals>(
        &self,
        included: impl IntoIterator<Item = &'withdrawals Withdrawal>,
    ) {
        let included = included
            .into_iter()
            .map(|withdrawal| withdrawal.init_tx_hash)
            .collect_vec();

        let mut withdrawals = self.withdrawals.write();

        withdrawals.retain(|withdrawal| !included.contains(&withdrawal.init_tx_hash));

        self.track_size(withdrawals.len());
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.withdrawals.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.withdrawals.read().is_empty()
    }

    #[must_use]
    pub fn all(&self) -> Vec<Withdrawal> {
        self.withdrawals.read().clone()
    }

    fn track_size(&self, size: usize) {
        if let Some(metrics) = self.metrics.as_ref() {
            metrics.set_operation_pool_size(METRIC_LABEL, size);
        }
    }
}

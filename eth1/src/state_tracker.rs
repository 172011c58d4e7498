use std::sync::Arc;

use anyhow::{anyhow, Result};
use operation_pools::{BlockVotingPool, PoolAdditionOutcome};
use tokio::sync::broadcast::{error::RecvError, Receiver};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{
    containers::{BlockVoting, Deposit, Eth1Data},
    primitives::{Epoch, Slot, UnixSeconds, H256},
};

use crate::{
    error::Error,
    interfaces::{BeaconStateProvider, BeaconStateSummary},
    service::Service,
};

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum StateEvent {
    ChainStarted {
        genesis_time: UnixSeconds,
        eth1_data: Eth1Data,
    },
    BlockProcessed {
        block_root: H256,
        slot: Slot,
        deposits: Vec<Deposit>,
        voting: Option<BlockVoting>,
        initial_sync: bool,
    },
    FinalizedCheckpoint {
        block_root: H256,
        epoch: Epoch,
    },
}

/// Drives the service from beacon chain events.
pub struct StateTracker {
    service: Arc<Service>,
    beacon_states: Arc<dyn BeaconStateProvider>,
    block_voting_pool: Arc<BlockVotingPool>,
    previous_state: Option<BeaconStateSummary>,
    bootstrapped: bool,
}

impl StateTracker {
    #[must_use]
    pub fn new(
        service: Arc<Service>,
        beacon_states: Arc<dyn BeaconStateProvider>,
        block_voting_pool: Arc<BlockVotingPool>,
    ) -> Self {
        Self {
            service,
            beacon_states,
            block_voting_pool,
            previous_state: None,
            bootstrapped: false,
        }
    }

    pub async fn run(mut self, mut events: Receiver<StateEvent>, token: CancellationToken) {
        loop {
            let event = tokio::select! {
                () = token.cancelled() => break,
                event = events.recv() => event,
            };

            match event {
                Ok(event) => {
                    if let Err(error) = self.handle_event(event).await {
                        warn!("failed to handle beacon chain event: {error:?}");
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("state tracker fell behind and skipped {skipped} beacon chain events");
                }
                Err(RecvError::Closed) => break,
            }
        }

        debug!("state tracker stopped");
    }

    pub async fn handle_event(&mut self, event: StateEvent) -> Result<()> {
        match event {
            StateEvent::ChainStarted { genesis_time, .. } => {
                debug!(genesis_time, "beacon chain started");
                Ok(())
            }
            StateEvent::BlockProcessed {
                block_root,
                slot,
                deposits,
                voting,
                initial_sync,
            } => {
                if let Some(voting) = voting {
                    self.append_block_voting(block_root, slot, voting);
                }

                if !initial_sync || deposits.is_empty() {
                    return Ok(());
                }

                self.handle_block_deposits(block_root, &deposits).await
            }
            StateEvent::FinalizedCheckpoint { block_root, epoch } => {
                self.handle_finalized_checkpoint(block_root, epoch).await
            }
        }
    }

    fn append_block_voting(&self, block_root: H256, slot: Slot, mut voting: BlockVoting) {
        let Some(attestation) = voting.attestations.pop() else {
            debug!(slot, "block {block_root:?} carries a voting record without attestations");
            return;
        };

        voting.beacon_block_root = block_root;
        voting.slot = slot;

        if let PoolAdditionOutcome::Reject(reason) =
            self.block_voting_pool.insert(voting, attestation)
        {
            warn!(
                slot,
                reason = <&str>::from(reason),
                "block voting of {block_root:?} rejected by block voting pool",
            );
        }
    }

    async fn handle_block_deposits(&self, block_root: H256, deposits: &[Deposit]) -> Result<()> {
        let state = self.state_by_block_root(block_root)?;
        let deposit_count = u64::try_from(deposits.len())?;

        let first_index = state
            .eth1_deposit_index
            .checked_sub(deposit_count)
            .ok_or_else(|| {
                anyhow!(
                    "state at {block_root:?} has deposit index {} \
                     but its block contains {deposit_count} deposits",
                    state.eth1_deposit_index,
                )
            })?;

        self.service
            .process_block_deposits(deposits, first_index)
            .await
    }

    async fn handle_finalized_checkpoint(&mut self, block_root: H256, epoch: Epoch) -> Result<()> {
        let state = self.state_by_block_root(block_root)?;

        self.block_voting_pool.prune(state.slot);

        if !self.service.is_delegating_stake_active() {
            self.service.set_last_handled_slot(state.slot);
            self.previous_state = Some(state);
            return Ok(());
        }

        if !self.bootstrapped {
            if let Some(previous) = self.previous_state {
                self.bootstrap(previous).await?;
            }

            self.bootstrapped = true;
        }

        let header = self
            .service
            .header_by_hash_cached(state.base_spine)
            .await?
            .ok_or_else(|| {
                anyhow!(
                    "base spine {:?} is unknown to execution endpoint",
                    state.base_spine,
                )
            })?;

        debug!(
            epoch,
            height = header.height,
            "following finalized base spine {:?}",
            state.base_spine,
        );

        self.service.process_block_header(header)?;
        self.service.handle_follow_distance().await?;
        self.service.check_default_endpoint().await?;
        self.service.set_last_handled_slot(state.slot);
        self.previous_state = Some(state);

        Ok(())
    }

    async fn bootstrap(&self, previous: BeaconStateSummary) -> Result<()> {
        let Some(header) = self.service.header_by_hash_cached(previous.base_spine).await? else {
            warn!(
                "base spine {:?} of previously handled state is unknown to execution endpoint",
                previous.base_spine,
            );

            return Ok(());
        };

        info!(
            slot = previous.slot,
            height = header.height,
            "bootstrapping execution data from finalized base spine",
        );

        self.service.process_block_header(header)
    }

    fn state_by_block_root(&self, block_root: H256) -> Result<BeaconStateSummary> {
        self.beacon_states
            .state_by_block_root(block_root)
            .ok_or_else(|| Error::StateRetrieval { block_root }.into())
    }
}

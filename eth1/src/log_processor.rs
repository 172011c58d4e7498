use std::sync::Arc;

use anyhow::{ensure, Context as _, Result};
use database::Database;
use eth1_api::{DepositEvent, ExitRequestEvent, Log, WithdrawalRequestEvent};
use genesis::StateTransition;
use helper_functions::misc;
use operation_pools::{PoolAdditionOutcome, VoluntaryExitPool, WithdrawalPool};
use parking_lot::{Mutex, RwLock};
use prometheus_metrics::Metrics;
use tokio::sync::broadcast::Sender;
use tracing::{debug, info, warn};
use types::{
    config::Config,
    consts::GENESIS_EPOCH,
    containers::{Deposit, DepositData, Eth1Data, SignedVoluntaryExit, VoluntaryExit},
    nonstandard::DepositContainer,
    primitives::{
        DepositIndex, Epoch, ExecutionBlockHash, ExecutionBlockHeight, PublicKeyBytes,
        SignatureBytes, UnixSeconds, H256,
    },
    traits::HashTreeRoot as _,
};

use crate::{
    error::Error, interfaces::PendingDepositsCache, state::ServiceState,
    state_tracker::StateEvent,
};

/// Collaborators the log processor hands its results to.
pub struct Dependencies {
    pub database: Database,
    pub transition: Arc<dyn StateTransition>,
    pub pending_deposits: Arc<dyn PendingDepositsCache>,
    pub voluntary_exit_pool: Arc<VoluntaryExitPool>,
    pub withdrawal_pool: Arc<WithdrawalPool>,
    pub state_feed: Sender<StateEvent>,
    pub metrics: Option<Arc<Metrics>>,
}

pub struct LogProcessor {
    config: Arc<Config>,
    state: Arc<RwLock<ServiceState>>,
    deposit_save_interval: u64,
    deposits_since_save: Mutex<u64>,
    dependencies: Dependencies,
}

impl LogProcessor {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        state: Arc<RwLock<ServiceState>>,
        deposit_save_interval: u64,
        dependencies: Dependencies,
    ) -> Self {
        Self {
            config,
            state,
            deposit_save_interval,
            deposits_since_save: Mutex::new(0),
            dependencies,
        }
    }

    /// Processes a log returned by `eth_getLogs` at time `now`.
    pub fn process_log(&self, log: &Log, now: UnixSeconds) -> Result<()> {
        let signature = log.signature();

        if signature == Some(DepositEvent::TOPIC) {
            self.process_deposit_log(log)
        } else if signature == Some(ExitRequestEvent::TOPIC) {
            self.process_exit_log(log, now);
            Ok(())
        } else if signature == Some(WithdrawalRequestEvent::TOPIC) {
            self.process_withdrawal_log(log, now);
            Ok(())
        } else {
            debug!(
                ?signature,
                block_number = log.block_number,
                "ignoring log with unknown signature",
            );

            Ok(())
        }
    }

    fn process_deposit_log(&self, log: &Log) -> Result<()> {
        let DepositEvent {
            data,
            index,
            block_number,
        } = DepositEvent::try_from(log)?;

        {
            let mut state = self.state.write();

            if state.last_received_index.is_some_and(|last| index <= last) {
                debug!(index, "ignoring deposit that has already been processed");
                return Ok(());
            }

            let expected = state.last_received_index.map_or(0, |last| last + 1);

            if index != expected {
                if let Some(metrics) = self.dependencies.metrics.as_ref() {
                    metrics.missed_deposit_logs.inc();
                }

                return Err(Error::WrongDepositIndex {
                    expected,
                    got: index,
                }
                .into());
            }

            let container = Self::insert_deposit(&mut state, data, index, block_number)?;

            if state.chain_start.chain_started {
                self.dependencies
                    .pending_deposits
                    .insert_pending_deposit(container.clone());

                self.count_valid_deposit();
            } else {
                self.apply_pre_genesis_deposit(&mut state, &container)?;
            }

            state.deposit_containers.push(container);
        }

        self.save_snapshot_periodically()
    }

    fn apply_pre_genesis_deposit(
        &self,
        state: &mut ServiceState,
        container: &DepositContainer,
    ) -> Result<()> {
        let index = container.index;

        let deposit = Deposit {
            proof: Some(state.deposit_tree.proof(index)?),
            data: container.deposit.data,
        };

        let eth1_data = Eth1Data {
            deposit_root: container.deposit_root,
            deposit_count: state.deposit_tree.count(),
            ..state.pre_genesis.eth1_data.clone()
        };

        match self.dependencies.transition.process_pre_genesis_deposit(
            &state.pre_genesis,
            &deposit,
            &eth1_data,
        ) {
            Ok(pre_genesis) => {
                state.pre_genesis = pre_genesis;
                self.count_valid_deposit();
            }
            Err(error) => warn!(
                "{:?}",
                error.context(Error::InvalidDepositData { index }),
            ),
        }

        state.chain_start.chainstart_deposits.push(deposit);

        Ok(())
    }

    /// Adds a deposit from the body of a beacon block processed during initial sync.
    ///
    /// Deposits already in the deposit tree are skipped.
    pub fn process_deposit_block(&self, deposit: &Deposit, index: DepositIndex) -> Result<()> {
        {
            let mut state = self.state.write();
            let count = state.deposit_tree.count();

            if index < count {
                return Ok(());
            }

            ensure!(
                index == count,
                Error::WrongDepositIndex {
                    expected: count,
                    got: index,
                },
            );

            let block_height = state.latest.last_requested_block;
            let container = Self::insert_deposit(&mut state, deposit.data, index, block_height)?;

            state.deposit_containers.push(container);
        }

        self.save_snapshot_periodically()
    }

    fn insert_deposit(
        state: &mut ServiceState,
        data: DepositData,
        index: DepositIndex,
        block_height: ExecutionBlockHeight,
    ) -> Result<DepositContainer> {
        let count = state.deposit_tree.count();

        ensure!(
            count == index,
            Error::OutOfOrderDepositIndex { index, count },
        );

        state.deposit_tree.insert(data.hash_tree_root(), index)?;
        state.last_received_index = Some(index);

        Ok(DepositContainer {
            index,
            block_height,
            deposit: Deposit { proof: None, data },
            deposit_root: state.deposit_tree.root(),
        })
    }

    fn process_exit_log(&self, log: &Log, now: UnixSeconds) {
        let event = match ExitRequestEvent::try_from(log) {
            Ok(event) => event,
            Err(error) => {
                warn!(
                    "{:?}",
                    error.context(Error::MalformedExitLog {
                        block_number: log.block_number,
                    }),
                );

                self.count_malformed_log();
                return;
            }
        };

        let current_epoch = self.current_epoch(now);

        let exit = SignedVoluntaryExit {
            message: VoluntaryExit {
                epoch: event.exit_epoch.map_or(current_epoch, |epoch| epoch.max(current_epoch)),
                validator_index: event.validator_index,
            },
            signature: exit_signature(&event),
        };

        if self
            .dependencies
            .voluntary_exit_pool
            .insert_by_execution(exit)
            .is_accepted()
        {
            debug!(
                validator_index = event.validator_index,
                epoch = exit.message.epoch,
                "added exit request to voluntary exit pool",
            );
        } else {
            debug!(
                validator_index = event.validator_index,
                "exit request from transaction {:?} is already pooled",
                event.transaction_hash,
            );
        }
    }

    fn process_withdrawal_log(&self, log: &Log, now: UnixSeconds) {
        let event = match WithdrawalRequestEvent::try_from(log) {
            Ok(event) => event,
            Err(error) => {
                warn!(
                    "{:?}",
                    error.context(Error::MalformedWithdrawalLog {
                        block_number: log.block_number,
                    }),
                );

                self.count_malformed_log();
                return;
            }
        };

        let withdrawal = event.withdrawal(self.current_epoch(now));

        match self
            .dependencies
            .withdrawal_pool
            .insert_by_execution(withdrawal)
        {
            PoolAdditionOutcome::Accept => debug!(
                validator_index = withdrawal.validator_index,
                epoch = withdrawal.epoch,
                "added withdrawal request to withdrawal pool",
            ),
            PoolAdditionOutcome::Ignore => {}
            PoolAdditionOutcome::Reject(reason) => warn!(
                init_tx_hash = ?withdrawal.init_tx_hash,
                reason = <&str>::from(reason),
                "withdrawal request rejected by withdrawal pool",
            ),
        }
    }

    /// Starts the chain if the pre-genesis state is a valid genesis state at `block_time`.
    ///
    /// Returns `true` if this call started the chain.
    pub fn check_for_chainstart(
        &self,
        block_hash: ExecutionBlockHash,
        block_height: ExecutionBlockHeight,
        block_time: UnixSeconds,
    ) -> Result<bool> {
        let (genesis_time, eth1_data) = {
            let mut state = self.state.write();

            if state.chain_start.chain_started {
                return Ok(false);
            }

            let validator_count = state.pre_genesis.active_validator_count();

            if validator_count == 0 {
                return Ok(false);
            }

            let genesis_time = block_time + self.config.genesis_delay;

            if !self
                .dependencies
                .transition
                .is_valid_genesis_state(validator_count, genesis_time)
            {
                return Ok(false);
            }

            let ServiceState {
                chain_start,
                pre_genesis,
                deposit_tree,
                ..
            } = &mut *state;

            for (index, deposit) in (0..).zip(&mut chain_start.chainstart_deposits) {
                deposit.proof = Some(deposit_tree.proof(index)?);
            }

            let eth1_data = Eth1Data {
                deposit_root: deposit_tree.root(),
                deposit_count: deposit_tree.count(),
                block_hash,
                ..Eth1Data::default()
            };

            chain_start.chain_started = true;
            chain_start.genesis_time = genesis_time;
            chain_start.genesis_block_height = block_height;
            chain_start.eth1_data = eth1_data.clone();

            pre_genesis.genesis_time = genesis_time;
            pre_genesis.eth1_data = eth1_data.clone();

            (genesis_time, eth1_data)
        };

        info!(
            genesis_time,
            block_height,
            deposit_count = eth1_data.deposit_count,
            "minimum genesis conditions reached, chain started",
        );

        if self
            .dependencies
            .state_feed
            .send(StateEvent::ChainStarted {
                genesis_time,
                eth1_data,
            })
            .is_err()
        {
            debug!("chain start has no subscribers");
        }

        self.save_snapshot()?;

        Ok(true)
    }

    pub fn save_snapshot(&self) -> Result<()> {
        let timer = self
            .dependencies
            .metrics
            .as_ref()
            .map(|metrics| metrics.snapshot_save_times.start_timer());

        let snapshot = self.state.read().snapshot();

        snapshot
            .save(&self.dependencies.database)
            .context("failed to save execution chain snapshot")?;

        *self.deposits_since_save.lock() = 0;

        prometheus_metrics::stop_and_record(timer);

        Ok(())
    }

    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.dependencies.database
    }

    fn save_snapshot_periodically(&self) -> Result<()> {
        let due = {
            let mut deposits_since_save = self.deposits_since_save.lock();
            *deposits_since_save += 1;
            *deposits_since_save >= self.deposit_save_interval
        };

        if due {
            self.save_snapshot()?;
        }

        Ok(())
    }

    fn count_valid_deposit(&self) {
        if let Some(metrics) = self.dependencies.metrics.as_ref() {
            metrics.valid_deposits_received.inc();
        }
    }

    fn count_malformed_log(&self) {
        if let Some(metrics) = self.dependencies.metrics.as_ref() {
            metrics.malformed_logs.inc();
        }
    }

    fn current_epoch(&self, now: UnixSeconds) -> Epoch {
        let chain_start = &self.state.read().chain_start;

        if chain_start.chain_started {
            misc::epoch_at_time(&self.config, chain_start.genesis_time, now)
        } else {
            GENESIS_EPOCH
        }
    }
}

/// Encodes where an exit request came from in place of a signature.
///
/// Layout: public key, transaction hash, big-endian block number, big-endian transaction index.
fn exit_signature(event: &ExitRequestEvent) -> SignatureBytes {
    let mut bytes = [0; SignatureBytes::len_bytes()];
    let (pubkey, rest) = bytes.split_at_mut(PublicKeyBytes::len_bytes());
    let (transaction_hash, rest) = rest.split_at_mut(H256::len_bytes());
    let (block_number, transaction_index) = rest.split_at_mut(size_of::<u64>());

    pubkey.copy_from_slice(event.pubkey.as_bytes());
    transaction_hash.copy_from_slice(event.transaction_hash.as_bytes());
    block_number.copy_from_slice(&event.block_number.to_be_bytes());
    transaction_index.copy_from_slice(&event.transaction_index.to_be_bytes());

    SignatureBytes(bytes)
}

#[cfg(test)]
mod tests {
    use genesis::GenesisTransition;
    use helper_functions::predicates;
    use prometheus_metrics::Metrics;
    use tokio::sync::broadcast::{self, Receiver};
    use types::{
        containers::Withdrawal,
        primitives::{ExecutionAddress, Gwei},
    };

    use crate::{interfaces::PendingDeposits, snapshot::Snapshot};

    use super::*;

    const BLOCK_TIME: UnixSeconds = 1_578_009_600;

    struct Context {
        processor: LogProcessor,
        state: Arc<RwLock<ServiceState>>,
        pending_deposits: Arc<PendingDeposits>,
        voluntary_exit_pool: Arc<VoluntaryExitPool>,
        withdrawal_pool: Arc<WithdrawalPool>,
        metrics: Arc<Metrics>,
        events: Receiver<StateEvent>,
    }

    impl Context {
        fn new(config: Config, deposit_save_interval: u64) -> Result<Self> {
            let config = Arc::new(config);
            let state = Arc::new(RwLock::new(ServiceState::new(&config, 0)?));
            let pending_deposits = Arc::new(PendingDeposits::default());
            let voluntary_exit_pool = Arc::new(VoluntaryExitPool::new(Arc::clone(&config), None));
            let withdrawal_pool = Arc::new(WithdrawalPool::new(Arc::clone(&config), None));
            let metrics = Arc::new(Metrics::new()?);
            let (state_feed, events) = broadcast::channel(16);
            let pending_deposits_cache: Arc<dyn PendingDepositsCache> =
                Arc::clone(&pending_deposits);

            let processor = LogProcessor::new(
                Arc::clone(&config),
                Arc::clone(&state),
                deposit_save_interval,
                Dependencies {
                    database: Database::in_memory(),
                    transition: Arc::new(GenesisTransition::new(Arc::clone(&config))),
                    pending_deposits: pending_deposits_cache,
                    voluntary_exit_pool: Arc::clone(&voluntary_exit_pool),
                    withdrawal_pool: Arc::clone(&withdrawal_pool),
                    state_feed,
                    metrics: Some(Arc::clone(&metrics)),
                },
            );

            Ok(Self {
                processor,
                state,
                pending_deposits,
                voluntary_exit_pool,
                withdrawal_pool,
                metrics,
                events,
            })
        }
    }

    // Validators become active with 3200 Gwei so that tests do not need full balances.
    fn config() -> Config {
        Config {
            max_effective_balance: 3200,
            effective_balance_increment: nonzero_ext::nonzero!(100_u64),
            ..Config::minimal()
        }
    }

    fn log(topic: H256, data: Vec<u8>, block_number: u64, transaction_byte: u8) -> Log {
        Log {
            address: ExecutionAddress::repeat_byte(0x12),
            topics: vec![topic],
            data,
            block_number: Some(block_number),
            block_hash: Some(H256::from_low_u64_be(block_number)),
            transaction_hash: Some(H256::repeat_byte(transaction_byte)),
            transaction_index: Some(3),
            log_index: Some(0),
            removed: false,
        }
    }

    fn deposit_log(
        config: &Config,
        validator_index: u64,
        amount: Gwei,
        deposit_index: DepositIndex,
    ) -> Result<Log> {
        let data = interop::deposit_data(config, validator_index, amount)?;

        Ok(log(
            DepositEvent::TOPIC,
            DepositEvent::encode_data(&data, deposit_index),
            10,
            1,
        ))
    }

    #[test]
    fn in_order_deposits_start_the_chain() -> Result<()> {
        let config = config();
        let mut context = Context::new(config.clone(), 1000)?;
        let validator_count = config.min_genesis_active_validator_count.get();

        for index in 0..validator_count {
            let log = deposit_log(&config, index, 3200, index)?;
            context.processor.process_log(&log, BLOCK_TIME)?;
        }

        let started = context.processor.check_for_chainstart(
            H256::repeat_byte(0xab),
            10,
            BLOCK_TIME,
        )?;

        assert!(started);

        let StateEvent::ChainStarted {
            genesis_time,
            eth1_data,
        } = context.events.try_recv()?
        else {
            panic!("first event should be ChainStarted");
        };

        assert_eq!(genesis_time, BLOCK_TIME + config.genesis_delay);
        assert_eq!(eth1_data.deposit_count, validator_count);
        assert_eq!(eth1_data.block_hash, H256::repeat_byte(0xab));

        let state = context.state.read();

        assert!(state.chain_start.chain_started);
        assert_eq!(state.chain_start.genesis_time, genesis_time);
        assert_eq!(state.pre_genesis.active_validator_count(), validator_count);
        assert_eq!(state.deposit_tree.count(), validator_count);

        for (index, deposit) in (0..).zip(&state.chain_start.chainstart_deposits) {
            let proof = deposit.proof.as_deref().expect("proof should be computed");

            assert_eq!(proof.len(), config.deposit_contract_tree_depth);

            assert!(predicates::is_valid_deposit_proof(
                deposit.data.hash_tree_root(),
                proof,
                index,
                eth1_data.deposit_count,
                eth1_data.deposit_root,
            ));
        }

        assert_eq!(context.metrics.valid_deposits_received.get(), validator_count);

        Ok(())
    }

    #[test]
    fn duplicate_public_keys_do_not_start_the_chain() -> Result<()> {
        let config = config();
        let mut context = Context::new(config.clone(), 1000)?;

        // 8 distinct keys, each deposited twice.
        for index in 0..16 {
            let log = deposit_log(&config, index % 8, 3200, index)?;
            context.processor.process_log(&log, BLOCK_TIME)?;
        }

        let started = context.processor.check_for_chainstart(
            H256::repeat_byte(0xab),
            10,
            BLOCK_TIME,
        )?;

        assert!(!started);
        assert!(!context.state.read().chain_start.chain_started);
        assert_eq!(context.state.read().pre_genesis.active_validator_count(), 8);
        assert!(context.events.try_recv().is_err());

        Ok(())
    }

    #[test]
    fn deposit_index_gap_is_rejected() -> Result<()> {
        let config = config();
        let context = Context::new(config.clone(), 1000)?;

        for index in 0..4 {
            let log = deposit_log(&config, index, 3200, index)?;
            context.processor.process_log(&log, BLOCK_TIME)?;
        }

        let root_before = context.state.read().deposit_tree.root();
        let log = deposit_log(&config, 5, 3200, 5)?;

        let error = context
            .processor
            .process_log(&log, BLOCK_TIME)
            .expect_err("gap in deposit indices should be rejected")
            .downcast::<Error>()?;

        assert_eq!(
            error,
            Error::WrongDepositIndex {
                expected: 4,
                got: 5,
            },
        );

        let state = context.state.read();

        assert_eq!(state.deposit_tree.count(), 4);
        assert_eq!(state.deposit_tree.root(), root_before);
        assert_eq!(state.last_received_index, Some(3));
        assert_eq!(context.metrics.missed_deposit_logs.get(), 1);

        Ok(())
    }

    #[test]
    fn already_processed_deposits_are_ignored() -> Result<()> {
        let config = config();
        let context = Context::new(config.clone(), 1000)?;

        let first = deposit_log(&config, 0, 3200, 0)?;
        let second = deposit_log(&config, 1, 3200, 1)?;

        context.processor.process_log(&first, BLOCK_TIME)?;
        context.processor.process_log(&second, BLOCK_TIME)?;
        context.processor.process_log(&first, BLOCK_TIME)?;

        let state = context.state.read();

        assert_eq!(state.deposit_tree.count(), 2);
        assert_eq!(state.deposit_containers.len(), 2);
        assert_eq!(context.metrics.missed_deposit_logs.get(), 0);

        Ok(())
    }

    #[test]
    fn deposits_after_chain_start_go_to_pending_deposits() -> Result<()> {
        let config = config();
        let context = Context::new(config.clone(), 1000)?;

        context.state.write().chain_start.chain_started = true;

        let log = deposit_log(&config, 0, 3200, 0)?;
        context.processor.process_log(&log, BLOCK_TIME)?;

        let pending = context.pending_deposits.pending(0);

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].block_height, 10);
        assert_eq!(pending[0].deposit_root, context.state.read().deposit_tree.root());
        assert!(context.state.read().chain_start.chainstart_deposits.is_empty());

        Ok(())
    }

    #[test]
    fn snapshot_is_saved_every_interval() -> Result<()> {
        let config = config();
        let context = Context::new(config.clone(), 2)?;

        context
            .processor
            .process_log(&deposit_log(&config, 0, 3200, 0)?, BLOCK_TIME)?;

        assert_eq!(Snapshot::load(context.processor.database())?, None);

        context
            .processor
            .process_log(&deposit_log(&config, 1, 3200, 1)?, BLOCK_TIME)?;

        let snapshot = Snapshot::load(context.processor.database())?
            .expect("snapshot should be saved after 2 deposits");

        assert_eq!(snapshot.deposit_containers.len(), 2);
        assert_eq!(snapshot.deposit_tree.count(), 2);

        Ok(())
    }

    #[test]
    fn block_deposits_extend_the_deposit_tree() -> Result<()> {
        let config = config();
        let context = Context::new(config.clone(), 1000)?;
        let deposit = |index| -> Result<Deposit> {
            Ok(Deposit {
                proof: None,
                data: interop::deposit_data(&config, index, 3200)?,
            })
        };

        context.processor.process_deposit_block(&deposit(0)?, 0)?;
        context.processor.process_deposit_block(&deposit(1)?, 1)?;
        context.processor.process_deposit_block(&deposit(0)?, 0)?;

        let error = context
            .processor
            .process_deposit_block(&deposit(3)?, 3)
            .expect_err("deposit beyond the next index should be rejected")
            .downcast::<Error>()?;

        assert_eq!(
            error,
            Error::WrongDepositIndex {
                expected: 2,
                got: 3,
            },
        );

        assert_eq!(context.state.read().deposit_tree.count(), 2);
        assert_eq!(context.state.read().last_received_index, Some(1));

        Ok(())
    }

    #[test]
    fn exit_requests_get_provenance_signatures() -> Result<()> {
        let config = config();
        let context = Context::new(config.clone(), 1000)?;

        {
            let mut state = context.state.write();
            state.chain_start.chain_started = true;
            state.chain_start.genesis_time = BLOCK_TIME;
        }

        // Epoch 3 with 8 slots of 6 seconds per epoch.
        let now = BLOCK_TIME + 3 * 48;
        let pubkey = PublicKeyBytes::repeat_byte(0xaa);

        let without_epoch = ExitRequestEvent::encode_data(
            pubkey,
            ExecutionAddress::repeat_byte(0x11),
            5,
            None,
        );

        let with_epoch = ExitRequestEvent::encode_data(
            pubkey,
            ExecutionAddress::repeat_byte(0x11),
            6,
            Some(9),
        );

        context
            .processor
            .process_log(&log(ExitRequestEvent::TOPIC, without_epoch, 77, 0xcc), now)?;

        context
            .processor
            .process_log(&log(ExitRequestEvent::TOPIC, with_epoch, 78, 0xcd), now)?;

        let exits = context.voluntary_exit_pool.pending(u64::MAX, true);

        assert_eq!(exits.len(), 2);
        assert_eq!(exits[0].message.epoch, 3);
        assert_eq!(exits[0].message.validator_index, 5);
        assert_eq!(exits[1].message.epoch, 9);

        let signature = exits[0].signature;

        assert_eq!(&signature[..48], pubkey.as_bytes());
        assert_eq!(&signature[48..80], H256::repeat_byte(0xcc).as_bytes());
        assert_eq!(signature[80..88], 77_u64.to_be_bytes());
        assert_eq!(signature[88..], 3_u64.to_be_bytes());

        Ok(())
    }

    #[test]
    fn withdrawal_requests_feed_withdrawal_pool() -> Result<()> {
        let config = config();
        let context = Context::new(config, 1000)?;

        let data = WithdrawalRequestEvent::encode_data(
            PublicKeyBytes::repeat_byte(0xaa),
            ExecutionAddress::repeat_byte(0x11),
            7,
            1_000,
            Some(4),
        );

        context
            .processor
            .process_log(&log(WithdrawalRequestEvent::TOPIC, data, 80, 0xee), BLOCK_TIME)?;

        assert_eq!(
            context.withdrawal_pool.all(),
            [Withdrawal {
                epoch: 4,
                validator_index: 7,
                amount: 1_000,
                init_tx_hash: H256::repeat_byte(0xee),
            }],
        );

        Ok(())
    }

    #[test]
    fn malformed_withdrawal_requests_are_dropped() -> Result<()> {
        let context = Context::new(config(), 1000)?;

        let log = log(WithdrawalRequestEvent::TOPIC, vec![0; 7], 80, 0xee);

        context.processor.process_log(&log, BLOCK_TIME)?;

        assert!(context.withdrawal_pool.is_empty());
        assert_eq!(context.metrics.malformed_logs.get(), 1);

        Ok(())
    }

    #[test]
    fn malformed_exit_requests_are_dropped() -> Result<()> {
        let context = Context::new(config(), 1000)?;

        let valid = ExitRequestEvent::encode_data(
            PublicKeyBytes::repeat_byte(0xaa),
            ExecutionAddress::repeat_byte(0x11),
            5,
            None,
        );

        context
            .processor
            .process_log(&log(ExitRequestEvent::TOPIC, vec![0; 7], 77, 0xcc), BLOCK_TIME)?;

        context
            .processor
            .process_log(&log(ExitRequestEvent::TOPIC, valid, 78, 0xcd), BLOCK_TIME)?;

        let exits = context.voluntary_exit_pool.pending(u64::MAX, true);

        assert_eq!(exits.len(), 1);
        assert_eq!(exits[0].message.validator_index, 5);
        assert_eq!(context.metrics.malformed_logs.get(), 1);

        Ok(())
    }

    #[test]
    fn unknown_logs_are_ignored() -> Result<()> {
        let context = Context::new(config(), 1000)?;

        let log = log(H256::repeat_byte(0x99), vec![1, 2, 3], 80, 0xee);

        context.processor.process_log(&log, BLOCK_TIME)?;

        assert_eq!(context.state.read().deposit_tree.count(), 0);
        assert!(context.voluntary_exit_pool.is_empty());
        assert!(context.withdrawal_pool.is_empty());

        Ok(())
    }
}

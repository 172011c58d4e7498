use core::{
    future::Future,
    panic::AssertUnwindSafe,
    sync::atomic::{AtomicU64, Ordering},
};
use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use anyhow::{anyhow, Result};
use eth1_api::{
    is_config_mismatch, is_too_much_data_requested, Auth, DepositEvent, Eth1Api,
    ExitRequestEvent, LogFilter, WithdrawalRequestEvent,
};
use futures::FutureExt as _;
use genesis::PreGenesisState;
use operation_pools::BlockVotingPool;
use parking_lot::{Mutex, RwLock};
use prometheus_metrics::Metrics;
use reqwest::Client;
use tokio::{
    sync::{broadcast::Receiver, RwLock as AsyncRwLock},
    task::JoinHandle,
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use types::{
    config::Config,
    containers::{Deposit, Eth1Data},
    nonstandard::{DepositContainer, ExecutionHeader, LatestExecutionData},
    primitives::{
        DepositIndex, ExecutionBlockHash, ExecutionBlockHeight, Slot, UnixSeconds, H256,
    },
};

use crate::{
    config::ServiceConfig,
    error::Error,
    header_cache::HeaderCache,
    interfaces::{BeaconStateProvider, BlockFetcher, ChainInfoFetcher, ChainStartFetcher},
    log_processor::{Dependencies, LogProcessor},
    snapshot::{self, Snapshot},
    state::{self as service_state, ServiceState},
    state_tracker::{StateEvent, StateTracker},
};

/// Input of one step of the polling loop.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoopEvent {
    Tick,
    Cancelled,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LoopOutcome {
    Running,
    /// The delegating stake fork is active and finalized checkpoints drive the service from now on.
    HandedOff,
    Stopped,
}

/// Follows the execution chain, feeding deposits, exits and withdrawals to the beacon node.
pub struct Service {
    config: Arc<Config>,
    service_config: ServiceConfig,
    api: Option<Eth1Api>,
    header_cache: HeaderCache,
    state: Arc<RwLock<ServiceState>>,
    processor: LogProcessor,
    processing_lock: AsyncRwLock<()>,
    catch_up_batch_size: Mutex<u64>,
    ticks: AtomicU64,
    cancellation_token: CancellationToken,
    metrics: Option<Arc<Metrics>>,
}

impl Service {
    pub fn new(
        config: Arc<Config>,
        service_config: ServiceConfig,
        client: Client,
        dependencies: Dependencies,
    ) -> Result<Self> {
        service_config.validate()?;

        let metrics = dependencies.metrics.clone();
        let state = load_state(&config, &service_config, &dependencies.database)?;

        let api = if service_config.http_endpoints.is_empty() {
            warn!("no execution endpoints configured, execution chain will not be followed");
            None
        } else {
            let auth = Auth::new(service_config.auth_options()).map(Arc::new)?;

            Some(Eth1Api::new(
                Arc::clone(&config),
                client,
                auth,
                service_config.http_endpoints.clone(),
                service_config.api_options(),
                metrics.clone(),
            ))
        };

        let state = Arc::new(RwLock::new(state));

        let processor = LogProcessor::new(
            Arc::clone(&config),
            Arc::clone(&state),
            service_config.deposit_save_interval,
            dependencies,
        );

        Ok(Self {
            header_cache: HeaderCache::new(service_config.header_cache_size),
            catch_up_batch_size: Mutex::new(service_config.eth1_header_req_limit),
            config,
            service_config,
            api,
            state,
            processor,
            processing_lock: AsyncRwLock::new(()),
            ticks: AtomicU64::new(0),
            cancellation_token: CancellationToken::new(),
            metrics,
        })
    }

    /// Spawns the polling loop and the state tracker.
    ///
    /// The state tracker consumes `state_events` until the service is stopped.
    pub fn start(
        self: &Arc<Self>,
        state_events: Receiver<StateEvent>,
        beacon_states: Arc<dyn BeaconStateProvider>,
        block_voting_pool: Arc<BlockVotingPool>,
    ) -> ServiceHandle {
        let service = Arc::clone(self);

        let polling = tokio::spawn(async move {
            if let Err(error) = service.run().await {
                warn!("execution chain polling stopped: {error:?}");
            }
        });

        let tracker = StateTracker::new(Arc::clone(self), beacon_states, block_voting_pool);
        let tracking = tokio::spawn(tracker.run(state_events, self.cancellation_token.clone()));

        ServiceHandle {
            cancellation_token: self.cancellation_token.clone(),
            tasks: vec![polling, tracking],
        }
    }

    pub async fn run(&self) -> Result<()> {
        let mut interval = tokio::time::interval(self.config.slot_duration());
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(
            endpoints = self.service_config.http_endpoints.len(),
            "following execution chain",
        );

        loop {
            let event = tokio::select! {
                () = self.cancellation_token.cancelled() => LoopEvent::Cancelled,
                _ = interval.tick() => LoopEvent::Tick,
            };

            match self.step(event).await {
                LoopOutcome::Running => {}
                LoopOutcome::HandedOff => {
                    info!("delegating stake fork is active, polling of execution chain stopped");
                    return Ok(());
                }
                LoopOutcome::Stopped => {
                    info!("execution chain polling cancelled");
                    return Ok(());
                }
            }
        }
    }

    pub async fn step(&self, event: LoopEvent) -> LoopOutcome {
        match event {
            LoopEvent::Cancelled => LoopOutcome::Stopped,
            LoopEvent::Tick => {
                if self.is_delegating_stake_active() {
                    return LoopOutcome::HandedOff;
                }

                let ticks = self.ticks.fetch_add(1, Ordering::Relaxed) + 1;

                if ticks % self.service_config.fallback_check_interval == 0 {
                    self.poll_connection().await;
                }

                match AssertUnwindSafe(self.handle_tick()).catch_unwind().await {
                    Ok(Ok(())) => self.clear_run_error(),
                    Ok(Err(error)) => self.record_run_error(&error),
                    Err(payload) => panics::log(payload),
                }

                LoopOutcome::Running
            }
        }
    }

    pub fn stop(&self) {
        self.cancellation_token.cancel();
    }

    async fn handle_tick(&self) -> Result<()> {
        let api = self.api()?;

        let header = self
            .cancellable(api.header_by_number(None))
            .await?
            .ok_or_else(|| anyhow!("execution endpoint returned no latest header"))?;

        self.process_block_header(header)?;
        self.handle_follow_distance().await
    }

    /// Records `header` as the latest execution block unless a higher one is already known.
    pub fn process_block_header(&self, header: ExecutionHeader) -> Result<()> {
        let ExecutionHeader {
            hash,
            height,
            timestamp,
            checkpoint,
            ..
        } = header;

        if !header.is_finalized() {
            return Err(Error::NonFinalizedHeader { hash, height }.into());
        }

        if hash.is_zero() {
            return Err(Error::EmptyBlockHash { height }.into());
        }

        self.header_cache.add(header)?;

        let mut state = self.state.write();

        if height < state.latest.block_height {
            debug!(
                height,
                latest_height = state.latest.block_height,
                "ignoring execution header below latest height",
            );

            return Ok(());
        }

        state.latest.block_height = height;
        state.latest.block_time = timestamp;
        state.latest.block_hash = hash;

        if let Some(checkpoint) = checkpoint {
            state.latest.checkpoint_hash = checkpoint.hash;
            state.latest.checkpoint_number = checkpoint.number;
        }

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.set_execution_block_number(height);
        }

        Ok(())
    }

    /// Highest execution block whose logs may be processed.
    #[must_use]
    pub fn follow_block_height(&self) -> ExecutionBlockHeight {
        let state = self.state.read();

        if self.config.is_delegating_stake_slot(state.last_handled_slot) {
            return state.latest.block_height;
        }

        state
            .latest
            .checkpoint_number
            .saturating_sub(self.config.eth1_follow_distance)
    }

    pub async fn handle_follow_distance(&self) -> Result<()> {
        let follow_height = self.follow_block_height();

        let LatestExecutionData {
            last_requested_block,
            checkpoint_number,
            ..
        } = self.state.read().latest;

        if follow_height <= last_requested_block {
            return Ok(());
        }

        if checkpoint_number.saturating_sub(last_requested_block)
            > self.service_config.max_tolerable_header_gap
        {
            return self.process_past_logs(follow_height).await;
        }

        self.request_batched_headers_and_logs(last_requested_block + 1, follow_height)
            .await
    }

    async fn request_batched_headers_and_logs(
        &self,
        from_block: ExecutionBlockHeight,
        to_block: ExecutionBlockHeight,
    ) -> Result<()> {
        debug!("requesting execution logs from block {from_block} to block {to_block}");
        self.process_block_range(from_block, to_block).await
    }

    async fn process_past_logs(&self, follow_height: ExecutionBlockHeight) -> Result<()> {
        let api = self.api()?;
        let limit = self.service_config.eth1_header_req_limit;

        let mut from_block = self
            .state
            .read()
            .latest
            .last_requested_block
            .saturating_add(1)
            .max(self.service_config.contract_deployment_block);

        info!("catching up on execution logs from block {from_block} to block {follow_height}");

        while from_block <= follow_height {
            let batch_size = *self.catch_up_batch_size.lock();
            let mut to_block = follow_height.min(from_block.saturating_add(batch_size - 1));

            // Few logs remain, so the rest of the range fits in one response.
            if to_block < follow_height {
                let deposit_count = self
                    .cancellable(api.deposit_count(Some(follow_height)))
                    .await?;

                let remaining_logs =
                    deposit_count.saturating_sub(self.state.read().deposit_tree.count());

                if remaining_logs < self.service_config.deposit_log_request_limit {
                    to_block = follow_height;
                }
            }

            match self.process_block_range(from_block, to_block).await {
                Ok(()) => {
                    let mut batch_size = self.catch_up_batch_size.lock();
                    *batch_size = grown_batch_size(*batch_size, limit);
                    from_block = to_block + 1;
                }
                Err(error) if is_too_much_data_requested(&error) => {
                    let halved = {
                        let mut batch_size = self.catch_up_batch_size.lock();
                        *batch_size = shrunk_batch_size(*batch_size);
                        *batch_size
                    };

                    debug!(
                        batch_size = halved,
                        "execution endpoint refused log range from block {from_block} to block \
                         {to_block}, retrying with a smaller batch",
                    );

                    self.cancellable(async {
                        tokio::time::sleep(self.service_config.follow_distance_backoff).await;
                        Ok(())
                    })
                    .await?;
                }
                Err(error) => return Err(error),
            }
        }

        Ok(())
    }

    async fn process_block_range(
        &self,
        from_block: ExecutionBlockHeight,
        to_block: ExecutionBlockHeight,
    ) -> Result<()> {
        let api = self.api()?;

        let filter = LogFilter::contract_events(
            self.config.deposit_contract_address,
            from_block..=to_block,
            [
                DepositEvent::TOPIC,
                ExitRequestEvent::TOPIC,
                WithdrawalRequestEvent::TOPIC,
            ],
        );

        let logs = self.cancellable(api.filter_logs(&filter)).await?;

        let headers = if self.state.read().chain_start.chain_started {
            vec![]
        } else {
            self.batch_headers(from_block, to_block).await?
        };

        let _processing = self.processing_lock.read().await;
        let now = unix_time_now();
        let mut headers = headers
            .into_iter()
            .filter(ExecutionHeader::is_finalized)
            .peekable();

        for log in &logs {
            let block_number = log.block_number.unwrap_or(from_block);

            // Genesis can only happen at a block whose logs have all been processed.
            while let Some(header) = headers.next_if(|header| header.height < block_number) {
                self.check_header_for_chainstart(&header)?;
            }

            self.processor.process_log(log, now)?;
        }

        for header in headers {
            self.check_header_for_chainstart(&header)?;
        }

        let mut state = self.state.write();
        state.latest.last_requested_block = state.latest.last_requested_block.max(to_block);

        debug!(
            logs = logs.len(),
            "processed execution logs from block {from_block} to block {to_block}",
        );

        Ok(())
    }

    async fn batch_headers(
        &self,
        from_block: ExecutionBlockHeight,
        to_block: ExecutionBlockHeight,
    ) -> Result<Vec<ExecutionHeader>> {
        let api = self.api()?;
        let limit = self.service_config.eth1_header_req_limit;
        let mut headers = vec![];

        for chunk_start in (from_block..=to_block).step_by(usize::try_from(limit)?) {
            let chunk_end = to_block.min(chunk_start.saturating_add(limit - 1));
            let chunk = self
                .cancellable(api.batch_headers(chunk_start..=chunk_end))
                .await?;

            for header in &chunk {
                if let Err(error) = self.header_cache.add(*header) {
                    debug!("not caching execution header: {error}");
                }
            }

            headers.extend(chunk);
        }

        Ok(headers)
    }

    fn check_header_for_chainstart(&self, header: &ExecutionHeader) -> Result<()> {
        self.processor
            .check_for_chainstart(header.hash, header.height, header.timestamp)?;

        Ok(())
    }

    async fn poll_connection(&self) {
        let Some(api) = self.api.as_ref() else {
            return;
        };

        match self.cancellable(api.check_connection()).await {
            Ok(stats) => {
                self.state.write().connected = stats.sync_eth1_connected;
                self.clear_run_error();
            }
            Err(error) => {
                self.state.write().connected = false;

                if is_config_mismatch(&error) {
                    self.record_run_error(&error);
                } else {
                    warn!("execution endpoint connection check failed: {error:?}");
                }
            }
        }

        if let Err(error) = self.check_default_endpoint().await {
            debug!("primary execution endpoint check failed: {error:?}");
        }
    }

    /// Switches back to the primary endpoint if the service fell back and the primary recovered.
    pub async fn check_default_endpoint(&self) -> Result<()> {
        let api = self.api()?;
        self.cancellable(api.retry_primary()).await?;
        Ok(())
    }

    /// Processes deposits included in a beacon block.
    ///
    /// `first_index` is the deposit index of the first deposit in `deposits`.
    pub async fn process_block_deposits(
        &self,
        deposits: &[Deposit],
        first_index: DepositIndex,
    ) -> Result<()> {
        let _processing = self.processing_lock.read().await;

        for (deposit, index) in deposits.iter().zip(first_index..) {
            self.processor.process_deposit_block(deposit, index)?;
        }

        Ok(())
    }

    pub async fn header_by_hash_cached(
        &self,
        hash: ExecutionBlockHash,
    ) -> Result<Option<ExecutionHeader>> {
        if let Some(header) = self.header_cache.get_by_hash(hash) {
            return Ok(Some(header));
        }

        let header = self.cancellable(self.api()?.header_by_hash(hash)).await?;

        if let Some(header) = header {
            if let Err(error) = self.header_cache.add(header) {
                debug!("not caching execution header: {error}");
            }
        }

        Ok(header)
    }

    async fn header_by_height_cached(
        &self,
        height: ExecutionBlockHeight,
    ) -> Result<Option<ExecutionHeader>> {
        if let Some(header) = self.header_cache.get_by_height(height) {
            return Ok(Some(header));
        }

        let header = self
            .cancellable(self.api()?.header_by_number(Some(height)))
            .await?;

        if let Some(header) = header {
            if let Err(error) = self.header_cache.add(header) {
                debug!("not caching execution header: {error}");
            }
        }

        Ok(header)
    }

    /// Whether finalized checkpoints have taken over from polling the execution head.
    #[must_use]
    pub fn is_delegating_stake_active(&self) -> bool {
        self.config
            .is_delegating_stake_slot(self.state.read().last_handled_slot)
    }

    #[must_use]
    pub fn last_handled_slot(&self) -> Slot {
        self.state.read().last_handled_slot
    }

    pub fn set_last_handled_slot(&self, slot: Slot) {
        let mut state = self.state.write();
        state.last_handled_slot = state.last_handled_slot.max(slot);
    }

    #[must_use]
    pub fn latest_execution_data(&self) -> LatestExecutionData {
        self.state.read().latest
    }

    #[must_use]
    pub fn deposit_containers(&self) -> Vec<DepositContainer> {
        self.state.read().deposit_containers.clone()
    }

    #[must_use]
    pub fn deposit_root(&self) -> (H256, DepositIndex) {
        let state = self.state.read();
        (state.deposit_tree.root(), state.deposit_tree.count())
    }

    #[must_use]
    pub fn is_chain_started(&self) -> bool {
        self.state.read().chain_start.chain_started
    }

    pub fn save_snapshot(&self) -> Result<()> {
        self.processor.save_snapshot()
    }

    pub const fn api(&self) -> Result<&Eth1Api, Error> {
        match self.api.as_ref() {
            Some(api) => Ok(api),
            None => Err(Error::NilExecutionFetcher),
        }
    }

    async fn cancellable<T>(&self, future: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::select! {
            () = self.cancellation_token.cancelled() => Err(Error::Shutdown.into()),
            result = future => result,
        }
    }

    fn record_run_error(&self, error: &anyhow::Error) {
        warn!("execution chain polling failed: {error:?}");
        self.state.write().run_error = Some(format!("{error:#}"));
    }

    fn clear_run_error(&self) {
        if let Some(error) = self.state.write().run_error.take() {
            info!("execution chain polling recovered from: {error}");
        }
    }
}

impl ChainStartFetcher for Service {
    fn chain_start_deposits(&self) -> Vec<Deposit> {
        self.state.read().chain_start.chainstart_deposits.clone()
    }

    fn chain_start_eth1_data(&self) -> Eth1Data {
        self.state.read().chain_start.eth1_data.clone()
    }

    fn pre_genesis_state(&self) -> PreGenesisState {
        self.state.read().pre_genesis.clone()
    }
}

impl ChainInfoFetcher for Service {
    fn genesis_execution_chain_info(&self) -> (UnixSeconds, ExecutionBlockHeight) {
        let chain_start = &self.state.read().chain_start;
        (chain_start.genesis_time, chain_start.genesis_block_height)
    }

    fn is_connected_to_execution(&self) -> bool {
        self.state.read().connected
    }

    fn status(&self) -> Result<()> {
        match self.state.read().run_error.as_ref() {
            Some(error) => Err(anyhow!("{error}")),
            None => Ok(()),
        }
    }
}

impl BlockFetcher for Service {
    fn header_by_hash(
        &self,
        hash: ExecutionBlockHash,
    ) -> impl Future<Output = Result<Option<ExecutionHeader>>> + Send {
        self.header_by_hash_cached(hash)
    }

    fn header_by_height(
        &self,
        height: ExecutionBlockHeight,
    ) -> impl Future<Output = Result<Option<ExecutionHeader>>> + Send {
        self.header_by_height_cached(height)
    }

    fn block_hash_by_height(
        &self,
        height: ExecutionBlockHeight,
    ) -> impl Future<Output = Result<Option<ExecutionBlockHash>>> + Send {
        self.header_by_height_cached(height)
            .map(|result| result.map(|header| header.map(|header| header.hash)))
    }

    fn block_time_by_height(
        &self,
        height: ExecutionBlockHeight,
    ) -> impl Future<Output = Result<Option<UnixSeconds>>> + Send {
        self.header_by_height_cached(height)
            .map(|result| result.map(|header| header.map(|header| header.timestamp)))
    }

    fn block_exists(
        &self,
        hash: ExecutionBlockHash,
    ) -> impl Future<Output = Result<Option<ExecutionBlockHeight>>> + Send {
        self.header_by_hash_cached(hash)
            .map(|result| result.map(|header| header.map(|header| header.height)))
    }
}

/// Tasks spawned by [`Service::start`].
pub struct ServiceHandle {
    cancellation_token: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
}

impl ServiceHandle {
    /// Cancels the service and waits for both tasks to finish.
    pub async fn stop(self) {
        self.cancellation_token.cancel();

        for result in futures::future::join_all(self.tasks).await {
            if let Err(error) = result {
                warn!("execution service task failed: {error}");
            }
        }
    }
}

fn load_state(
    config: &Config,
    service_config: &ServiceConfig,
    database: &database::Database,
) -> Result<ServiceState> {
    let Some(mut snapshot) = Snapshot::load(database)? else {
        return ServiceState::new(config, service_config.contract_deployment_block);
    };

    if snapshot.chain_start_data.chain_started
        && !snapshot::validate_deposit_containers(&mut snapshot.deposit_containers)
    {
        warn!(
            containers = snapshot.deposit_containers.len(),
            "deposit containers in execution chain snapshot are not contiguous, \
             rebuilding them from chain start deposits",
        );

        snapshot = service_state::snapshot_from_genesis(config, snapshot.chain_start_data)?;
        snapshot.save(database)?;
    }

    info!(
        deposits = snapshot.deposit_tree.count(),
        chain_started = snapshot.chain_start_data.chain_started,
        last_requested_block = snapshot.latest_execution_data.last_requested_block,
        "loaded execution chain snapshot",
    );

    Ok(ServiceState::from_snapshot(snapshot))
}

const fn grown_batch_size(batch_size: u64, limit: u64) -> u64 {
    let grown = batch_size.saturating_add(batch_size.div_ceil(10));

    if grown < limit {
        grown
    } else {
        limit
    }
}

const fn shrunk_batch_size(batch_size: u64) -> u64 {
    if batch_size > 1 {
        batch_size / 2
    } else {
        1
    }
}

fn unix_time_now() -> UnixSeconds {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default()
}

#[cfg(test)]
pub mod test_support {
    use database::Database;
    use eth1_api::RawHeader;
    use genesis::GenesisTransition;
    use operation_pools::{VoluntaryExitPool, WithdrawalPool};
    use serde_json::json;
    use tokio::sync::broadcast;

    use crate::interfaces::PendingDeposits;

    use super::*;

    pub fn service(
        config: Config,
        endpoints: Vec<String>,
    ) -> Result<(Arc<Service>, Receiver<StateEvent>)> {
        let service_config = endpoints
            .into_iter()
            .fold(ServiceConfig::builder(), |builder, url| builder.http_endpoint(url))
            .build()?;

        service_with(config, service_config)
    }

    pub fn service_with(
        config: Config,
        service_config: ServiceConfig,
    ) -> Result<(Arc<Service>, Receiver<StateEvent>)> {
        service_in(config, service_config, Database::in_memory())
    }

    pub fn service_in(
        config: Config,
        service_config: ServiceConfig,
        database: Database,
    ) -> Result<(Arc<Service>, Receiver<StateEvent>)> {
        let config = Arc::new(config);
        let (dependencies, events) = self::dependencies(&config, database);
        let service = Service::new(config, service_config, Client::new(), dependencies)?;

        Ok((Arc::new(service), events))
    }

    pub fn dependencies(
        config: &Arc<Config>,
        database: Database,
    ) -> (Dependencies, Receiver<StateEvent>) {
        let (state_feed, events) = broadcast::channel(16);

        let dependencies = Dependencies {
            database,
            transition: Arc::new(GenesisTransition::new(Arc::clone(config))),
            pending_deposits: Arc::new(PendingDeposits::default()),
            voluntary_exit_pool: Arc::new(VoluntaryExitPool::new(Arc::clone(config), None)),
            withdrawal_pool: Arc::new(WithdrawalPool::new(Arc::clone(config), None)),
            state_feed,
            metrics: None,
        };

        (dependencies, events)
    }

    pub fn header_response(
        hash: ExecutionBlockHash,
        height: ExecutionBlockHeight,
        checkpoint_number: u64,
    ) -> String {
        let header = RawHeader::from(ExecutionHeader {
            hash,
            number: height,
            height,
            timestamp: 1_600_000_000 + height * 12,
            checkpoint: Some(types::nonstandard::ExecutionCheckpoint {
                hash: ExecutionBlockHash::repeat_byte(0xcc),
                number: checkpoint_number,
            }),
            slot: 0,
        });

        json!({ "jsonrpc": "2.0", "id": 1, "result": header }).to_string()
    }
}

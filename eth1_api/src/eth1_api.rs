use core::{
    ops::RangeInclusive,
    sync::atomic::{AtomicU64, Ordering},
    time::Duration,
};
use std::sync::Arc;

use anyhow::{ensure, Result};
use ethereum_types::{H64, U64};
use futures::lock::Mutex;
use prometheus_metrics::Metrics;
use reqwest::Client;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};
use thiserror::Error;
use tracing::{debug, info, warn};
use types::{
    config::Config,
    nonstandard::ExecutionHeader,
    primitives::{ChainId, ExecutionBlockHash, ExecutionBlockNumber, NetworkId, Slot},
    redacting_url::RedactingUrl,
};

use crate::{
    abi,
    auth::Auth,
    consensus_info::{
        CandidatesResult, ConsensusInfo, ConsensusResult, CoordinatedState, FinalizationParams,
    },
    endpoints::{Endpoint, Endpoints},
    engine::{
        ExecutionPayloadV1, ForkChoiceStateV1, ForkChoiceUpdatedResponse, PayloadAttributesV1,
        PayloadStatusV1, TransitionConfigurationV1,
    },
    error::RpcError,
    header::RawHeader,
    json_rpc::{self, Request, Response},
    log::{Log, LogFilter},
    messages::BeaconNodeStats,
    quantity,
};

const ENGINE_EXCHANGE_CONFIGURATION_TIMEOUT: Duration = Duration::from_secs(1);
const ENGINE_FORKCHOICE_UPDATED_TIMEOUT: Duration = Duration::from_secs(8);
const ENGINE_GET_PAYLOAD_TIMEOUT: Duration = Duration::from_secs(1);
const ENGINE_NEW_PAYLOAD_TIMEOUT: Duration = Duration::from_secs(8);

// Selector of `get_deposit_count()` in the deposit contract.
const GET_DEPOSIT_COUNT_SELECTOR: [u8; 4] = [0x62, 0x1f, 0xd1, 0x30];

#[derive(Clone, Copy, Debug)]
pub struct ApiOptions {
    pub request_timeout: Duration,
    /// Failures of the current endpoint after which the next one is tried.
    pub max_consecutive_failures: u32,
}

impl Default for ApiOptions {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_consecutive_failures: 3,
        }
    }
}

/// Progress reported by `eth_syncing` while the endpoint is still syncing.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncProgress {
    #[serde(with = "quantity")]
    pub starting_block: ExecutionBlockNumber,
    #[serde(with = "quantity")]
    pub current_block: ExecutionBlockNumber,
    #[serde(with = "quantity")]
    pub highest_block: ExecutionBlockNumber,
}

pub struct Eth1Api {
    config: Arc<Config>,
    client: Client,
    auth: Arc<Auth>,
    endpoints: Mutex<Endpoints>,
    options: ApiOptions,
    next_request_id: AtomicU64,
    metrics: Option<Arc<Metrics>>,
}

impl Eth1Api {
    #[must_use]
    pub fn new(
        config: Arc<Config>,
        client: Client,
        auth: Arc<Auth>,
        eth1_rpc_urls: Vec<RedactingUrl>,
        options: ApiOptions,
        metrics: Option<Arc<Metrics>>,
    ) -> Self {
        Self {
            config,
            client,
            auth,
            endpoints: Mutex::new(Endpoints::new(eth1_rpc_urls)),
            options,
            next_request_id: AtomicU64::new(1),
            metrics,
        }
    }

    pub async fn header_by_hash(
        &self,
        block_hash: ExecutionBlockHash,
    ) -> Result<Option<ExecutionHeader>> {
        let params = vec![json!(block_hash), json!(false)];

        Ok(self
            .execute::<Option<RawHeader>>("eth_getBlockByHash", params, None)
            .await?
            .map(Into::into))
    }

    /// Fetches the header at `block_number` or the latest one if `block_number` is `None`.
    pub async fn header_by_number(
        &self,
        block_number: Option<ExecutionBlockNumber>,
    ) -> Result<Option<ExecutionHeader>> {
        let params = vec![block_tag(block_number), json!(false)];

        Ok(self
            .execute::<Option<RawHeader>>("eth_getBlockByNumber", params, None)
            .await?
            .map(Into::into))
    }

    /// Fetches headers in `block_numbers` in a single batch request.
    ///
    /// Blocks unknown to the endpoint are left out of the result.
    pub async fn batch_headers(
        &self,
        block_numbers: RangeInclusive<ExecutionBlockNumber>,
    ) -> Result<Vec<ExecutionHeader>> {
        if block_numbers.is_empty() {
            return Ok(vec![]);
        }

        let method = "eth_getBlockByNumber";

        let requests = block_numbers
            .map(|block_number| {
                let id = self.next_request_id();
                let params = vec![block_tag(Some(block_number)), json!(false)];
                Request::new(id, method, params)
            })
            .collect::<Vec<_>>();

        let ids = requests.iter().map(|request| request.id).collect::<Vec<_>>();

        let responses = self
            .request_with_bookkeeping::<Vec<Response>>("batch_headers", &requests, None)
            .await?;

        let mut headers = Vec::with_capacity(ids.len());

        for response in json_rpc::sort_batch(responses, &ids)? {
            if let Some(header) = response.into_result::<Option<RawHeader>>(method)? {
                headers.push(header.into());
            }
        }

        Ok(headers)
    }

    pub async fn filter_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        self.execute("eth_getLogs", vec![json!(filter)], None)
            .await
    }

    /// Returns `None` once the endpoint reports that it is synced.
    pub async fn sync_progress(&self) -> Result<Option<SyncProgress>> {
        let syncing = self.execute::<Value>("eth_syncing", vec![], None).await?;

        if syncing == Value::Bool(false) {
            return Ok(None);
        }

        serde_json::from_value(syncing).map(Some).map_err(|error| {
            RpcError::Unexpected {
                message: format!("malformed eth_syncing result: {error}"),
            }
            .into()
        })
    }

    pub async fn chain_id(&self) -> Result<ChainId> {
        Ok(self
            .execute::<U64>("eth_chainId", vec![], None)
            .await?
            .as_u64())
    }

    pub async fn net_version(&self) -> Result<NetworkId> {
        let version = self.execute::<String>("net_version", vec![], None).await?;

        version.parse().map_err(|error| {
            RpcError::Unexpected {
                message: format!("net_version returned {version:?}: {error}"),
            }
            .into()
        })
    }

    /// Reads `get_deposit_count()` from the deposit contract at `block_number` or the latest block.
    pub async fn deposit_count(&self, block_number: Option<ExecutionBlockNumber>) -> Result<u64> {
        #[derive(Deserialize)]
        struct CallOutput(#[serde(with = "impl_serde::serialize")] Vec<u8>);

        let call = json!({
            "to": self.config.deposit_contract_address,
            "data": format!("0x{}", hex::encode(GET_DEPOSIT_COUNT_SELECTOR)),
        });

        let CallOutput(data) = self
            .execute("eth_call", vec![call, block_tag(block_number)], None)
            .await?;

        // The contract returns the count as `bytes` holding a little-endian `u64`.
        abi::ensure_length(&data, &[3 * abi::EVM_WORD_SIZE])?;
        abi::ensure_argument(&data, 0..32, 32..64, size_of::<u64>())?;
        abi::little_endian_u64(&data, 64..72)
    }

    /// Checks that the current endpoint serves the chain this node is configured for.
    pub async fn check_connection(&self) -> Result<BeaconNodeStats> {
        let chain_id = self.chain_id().await?;

        ensure!(
            chain_id == self.config.deposit_chain_id,
            RpcError::ConfigMismatch {
                message: format!(
                    "endpoint chain ID {chain_id} does not match configured chain ID {}",
                    self.config.deposit_chain_id,
                ),
            },
        );

        let network_id = self.net_version().await?;

        ensure!(
            network_id == self.config.deposit_network_id,
            RpcError::ConfigMismatch {
                message: format!(
                    "endpoint network ID {network_id} does not match configured network ID {}",
                    self.config.deposit_network_id,
                ),
            },
        );

        Ok(self.stats().await)
    }

    /// Switches back to the primary endpoint if it responds again.
    ///
    /// Returns `true` if the current endpoint changed.
    pub async fn retry_primary(&self) -> Result<bool> {
        let primary = {
            let endpoints = self.endpoints.lock().await;

            if endpoints.is_primary() {
                return Ok(false);
            }

            endpoints.primary().cloned().ok_or(Error::NoEndpointsProvided)?
        };

        let request = Request::new(self.next_request_id(), "eth_chainId", vec![]);

        let response = self
            .post::<_, Response>(primary.url(), &request, self.options.request_timeout)
            .await
            .and_then(|response| response.into_result::<U64>(request.method));

        if let Err(error) = response {
            debug!("primary Eth1 RPC endpoint {} is still unavailable: {error}", primary.url());
            return Ok(false);
        }

        self.endpoints.lock().await.reset_to_primary();

        if let Some(metrics) = self.metrics.as_ref() {
            metrics.eth1_api_primary_resets.inc();
        }

        info!("switched back to primary Eth1 RPC endpoint {}", primary.url());

        Ok(true)
    }

    pub async fn sync(&self, consensus_info: &ConsensusInfo) -> Result<Vec<ExecutionBlockHash>> {
        let ConsensusResult { error, candidates } = self
            .execute("dag_sync", vec![json!(consensus_info)], None)
            .await?;

        if let Some(message) = error {
            return Err(RpcError::Unexpected { message }.into());
        }

        Ok(candidates)
    }

    pub async fn get_candidates(&self, slot: Slot) -> Result<Vec<ExecutionBlockHash>> {
        self.execute::<CandidatesResult>("dag_getCandidates", vec![json!(U64::from(slot))], None)
            .await?
            .into_candidates()
    }

    pub async fn get_optimistic_spines(
        &self,
        from: ExecutionBlockHash,
    ) -> Result<Vec<Vec<ExecutionBlockHash>>> {
        self.execute("dag_getOptimisticSpines", vec![json!(from)], None)
            .await
    }

    /// Returns the last finalized spine reported by the endpoint.
    pub async fn finalize(
        &self,
        params: &FinalizationParams,
    ) -> Result<Option<ExecutionBlockHash>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct FinalizationResult {
            #[serde(default)]
            error: Option<String>,
            #[serde(default, rename = "lfSpine")]
            last_finalized_spine: Option<ExecutionBlockHash>,
        }

        let FinalizationResult {
            error,
            last_finalized_spine,
        } = self
            .execute("dag_finalize", vec![json!(params)], None)
            .await?;

        if let Some(message) = error {
            return Err(RpcError::Unexpected { message }.into());
        }

        Ok(last_finalized_spine)
    }

    pub async fn coordinated_state(&self) -> Result<CoordinatedState> {
        self.execute("dag_coordinatedState", vec![], None).await
    }

    /// Calls [`engine_exchangeTransitionConfigurationV1`] and compares the result with local
    /// configuration.
    ///
    /// [`engine_exchangeTransitionConfigurationV1`]: https://github.com/ethereum/execution-apis/blob/b7c5d3420e00648f456744d121ffbd929862924d/src/engine/paris.md#engine_exchangetransitionconfigurationv1
    pub async fn exchange_transition_configuration(&self) -> Result<()> {
        let local = TransitionConfigurationV1::from(self.config.as_ref());

        let remote = self
            .execute::<TransitionConfigurationV1>(
                "engine_exchangeTransitionConfigurationV1",
                vec![json!(local)],
                Some(ENGINE_EXCHANGE_CONFIGURATION_TIMEOUT),
            )
            .await?;

        ensure!(
            remote == local,
            RpcError::ConfigMismatch {
                message: format!("transition configuration {remote:?} differs from {local:?}"),
            },
        );

        Ok(())
    }

    /// Calls [`engine_newPayloadV1`].
    ///
    /// [`engine_newPayloadV1`]: https://github.com/ethereum/execution-apis/blob/b7c5d3420e00648f456744d121ffbd929862924d/src/engine/paris.md#engine_newpayloadv1
    pub async fn new_payload(&self, payload: &ExecutionPayloadV1) -> Result<PayloadStatusV1> {
        self.execute(
            "engine_newPayloadV1",
            vec![json!(payload)],
            Some(ENGINE_NEW_PAYLOAD_TIMEOUT),
        )
        .await
    }

    /// Calls [`engine_forkchoiceUpdatedV1`].
    ///
    /// [`engine_forkchoiceUpdatedV1`]: https://github.com/ethereum/execution-apis/blob/b7c5d3420e00648f456744d121ffbd929862924d/src/engine/paris.md#engine_forkchoiceupdatedv1
    pub async fn forkchoice_updated(
        &self,
        fork_choice_state: ForkChoiceStateV1,
        payload_attributes: Option<PayloadAttributesV1>,
    ) -> Result<ForkChoiceUpdatedResponse> {
        self.execute(
            "engine_forkchoiceUpdatedV1",
            vec![json!(fork_choice_state), json!(payload_attributes)],
            Some(ENGINE_FORKCHOICE_UPDATED_TIMEOUT),
        )
        .await
    }

    /// Calls [`engine_getPayloadV1`].
    ///
    /// [`engine_getPayloadV1`]: https://github.com/ethereum/execution-apis/blob/b7c5d3420e00648f456744d121ffbd929862924d/src/engine/paris.md#engine_getpayloadv1
    pub async fn get_payload(&self, payload_id: H64) -> Result<ExecutionPayloadV1> {
        self.execute(
            "engine_getPayloadV1",
            vec![json!(payload_id)],
            Some(ENGINE_GET_PAYLOAD_TIMEOUT),
        )
        .await
    }

    pub async fn stats(&self) -> BeaconNodeStats {
        self.endpoints.lock().await.stats()
    }

    pub async fn el_offline(&self) -> bool {
        self.endpoints.lock().await.el_offline()
    }

    pub async fn is_primary(&self) -> bool {
        self.endpoints.lock().await.is_primary()
    }

    pub async fn sync_fallback_configured(&self) -> bool {
        self.endpoints.lock().await.sync_fallback_configured()
    }

    pub async fn current_endpoint(&self) -> Option<Endpoint> {
        self.endpoints.lock().await.current().cloned()
    }

    /// Moves to the next endpoint regardless of the failure count of the current one.
    pub async fn fallback_to_next(&self) -> bool {
        let switched = self.endpoints.lock().await.fallback_to_next();

        if switched {
            if let Some(metrics) = self.metrics.as_ref() {
                metrics.eth1_api_fallback_count.inc();
            }
        }

        switched
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        method: &str,
        params: Vec<Value>,
        timeout: Option<Duration>,
    ) -> Result<T> {
        let request = Request::new(self.next_request_id(), method, params);

        self.request_with_bookkeeping::<Response>(method, &request, timeout)
            .await?
            .into_result(method)
            .inspect_err(|error| self.record_error_kind(error))
    }

    // The endpoint list is only locked before and after the request so that slow responses do not
    // block other callers.
    async fn request_with_bookkeeping<R: DeserializeOwned>(
        &self,
        label: &str,
        body: &(impl Serialize + Sync + ?Sized),
        timeout: Option<Duration>,
    ) -> Result<R> {
        let endpoint = self
            .current_endpoint()
            .await
            .ok_or(Error::NoEndpointsProvided)?;

        let timer = self.metrics.as_ref().and_then(|metrics| {
            prometheus_metrics::start_timer_vec(&metrics.eth1_api_request_times, label)
        });

        let timeout = timeout.unwrap_or(self.options.request_timeout);

        match self.post(endpoint.url(), body, timeout).await {
            Ok(response) => {
                prometheus_metrics::stop_and_record(timer);
                self.record_success(&endpoint).await;
                Ok(response)
            }
            Err(error) => {
                prometheus_metrics::stop_and_discard(timer);
                self.record_error_kind(&error);
                self.record_failure(&endpoint, &error).await;
                Err(error)
            }
        }
    }

    async fn post<B: Serialize + Sync + ?Sized, R: DeserializeOwned>(
        &self,
        url: &RedactingUrl,
        body: &B,
        timeout: Duration,
    ) -> Result<R> {
        let response = self
            .client
            .post(url.expose().clone())
            .headers(self.auth.headers()?)
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(transport_error)?;

        response.json().await.map_err(|error| transport_error(error).into())
    }

    async fn record_success(&self, endpoint: &Endpoint) {
        let mut endpoints = self.endpoints.lock().await;

        if is_still_current(&endpoints, endpoint) {
            endpoints.record_success();
        }
    }

    async fn record_failure(&self, endpoint: &Endpoint, error: &anyhow::Error) {
        let counts_against_endpoint = error
            .downcast_ref::<RpcError>()
            .is_some_and(RpcError::counts_against_endpoint);

        if !counts_against_endpoint {
            return;
        }

        let mut endpoints = self.endpoints.lock().await;

        // Another request may have already moved on from this endpoint.
        if !is_still_current(&endpoints, endpoint) {
            return;
        }

        let url = endpoint.url();
        let failures = endpoints.record_failure();

        if failures < self.options.max_consecutive_failures {
            warn!("Eth1 RPC endpoint {url} returned an error ({failures} in a row): {error}");
            return;
        }

        if endpoints.fallback_to_next() {
            if let Some(metrics) = self.metrics.as_ref() {
                metrics.eth1_api_fallback_count.inc();
            }

            if let Some(next_endpoint) = endpoints.current() {
                warn!(
                    "Eth1 RPC endpoint {url} returned an error: {error}; \
                     switching to {}",
                    next_endpoint.url(),
                );
            }
        } else {
            warn!("last available Eth1 RPC endpoint {url} returned an error: {error}");
        }
    }

    fn record_error_kind(&self, error: &anyhow::Error) {
        if let Some(metrics) = self.metrics.as_ref() {
            let kind = error
                .downcast_ref::<RpcError>()
                .map_or("other", RpcError::kind);

            metrics.register_eth1_api_error(kind);
        }
    }

    fn next_request_id(&self) -> u64 {
        self.next_request_id.fetch_add(1, Ordering::Relaxed)
    }
}

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
enum Error {
    #[error("attempted to call Eth1 RPC endpoint but none were provided")]
    NoEndpointsProvided,
}

fn block_tag(block_number: Option<ExecutionBlockNumber>) -> Value {
    block_number.map_or_else(|| json!("latest"), |number| json!(U64::from(number)))
}

fn is_still_current(endpoints: &Endpoints, endpoint: &Endpoint) -> bool {
    endpoints.current().map(Endpoint::index) == Some(endpoint.index())
}

fn transport_error(error: reqwest::Error) -> RpcError {
    if error.is_timeout() {
        return RpcError::HttpTimeout;
    }

    RpcError::Unexpected {
        message: error.without_url().to_string(),
    }
}

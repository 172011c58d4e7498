use anyhow::Result;
use prometheus::{
    histogram_opts, opts, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
    IntGaugeVec, Registry,
};
use tracing::warn;

/// Metrics of the execution chain integration.
///
/// The `powchain_*` names are relied upon by dashboards and must not change.
#[derive(Debug)]
pub struct Metrics {
    // Execution chain
    pub valid_deposits_received: IntCounter,
    pub missed_deposit_logs: IntCounter,
    pub malformed_logs: IntCounter,
    execution_block_number: IntGauge,
    pub snapshot_save_times: Histogram,

    // Eth1 API
    pub eth1_api_request_times: HistogramVec,
    eth1_api_errors_count: IntCounterVec,
    pub eth1_api_fallback_count: IntCounter,
    pub eth1_api_primary_resets: IntCounter,

    // Operation pools
    operation_pool_sizes: IntGaugeVec,
}

impl Metrics {
    pub fn new() -> Result<Self> {
        Ok(Self {
            // Execution chain
            valid_deposits_received: IntCounter::new(
                "powchain_valid_deposits_received",
                "Number of valid deposits received from the deposit contract",
            )?,

            missed_deposit_logs: IntCounter::new(
                "powchain_missed_deposit_logs",
                "Number of deposit logs skipped because of a gap in deposit indices",
            )?,

            malformed_logs: IntCounter::new(
                "powchain_malformed_logs",
                "Number of exit and withdrawal request logs dropped as undecodable",
            )?,

            execution_block_number: IntGauge::new(
                "powchain_block_number",
                "Height of the latest execution block processed",
            )?,

            snapshot_save_times: Histogram::with_opts(histogram_opts!(
                "powchain_snapshot_save_times",
                "Times taken to persist the execution chain snapshot",
            ))?,

            // Eth1 API
            eth1_api_request_times: HistogramVec::new(
                histogram_opts!("ETH1_API_REQUEST_TIMES", "Times for ETH1 API calls"),
                &["method"],
            )?,

            eth1_api_errors_count: IntCounterVec::new(
                opts!("ETH1_API_ERRORS_COUNT", "Number of ETH1 API errors by kind"),
                &["kind"],
            )?,

            eth1_api_fallback_count: IntCounter::new(
                "ETH1_API_FALLBACK_COUNT",
                "Number of times ETH1 API switched to the next endpoint",
            )?,

            eth1_api_primary_resets: IntCounter::new(
                "ETH1_API_PRIMARY_RESETS",
                "Number of times ETH1 API returned to the primary endpoint",
            )?,

            // Operation pools
            operation_pool_sizes: IntGaugeVec::new(
                opts!("OPERATION_POOL_SIZES", "Number of entries in operation pools"),
                &["pool"],
            )?,
        })
    }

    pub fn register_with_default_metrics(&self) -> Result<()> {
        self.register(prometheus::default_registry())
    }

    pub fn register(&self, registry: &Registry) -> Result<()> {
        registry.register(Box::new(self.valid_deposits_received.clone()))?;
        registry.register(Box::new(self.missed_deposit_logs.clone()))?;
        registry.register(Box::new(self.malformed_logs.clone()))?;
        registry.register(Box::new(self.execution_block_number.clone()))?;
        registry.register(Box::new(self.snapshot_save_times.clone()))?;
        registry.register(Box::new(self.eth1_api_request_times.clone()))?;
        registry.register(Box::new(self.eth1_api_errors_count.clone()))?;
        registry.register(Box::new(self.eth1_api_fallback_count.clone()))?;
        registry.register(Box::new(self.eth1_api_primary_resets.clone()))?;
        registry.register(Box::new(self.operation_pool_sizes.clone()))?;

        Ok(())
    }

    pub fn set_execution_block_number(&self, height: u64) {
        self.execution_block_number
            .set(i64::try_from(height).unwrap_or(i64::MAX));
    }

    #[must_use]
    pub fn execution_block_number(&self) -> u64 {
        u64::try_from(self.execution_block_number.get()).unwrap_or_default()
    }

    pub fn register_eth1_api_error(&self, kind: &str) {
        match self.eth1_api_errors_count.get_metric_with_label_values(&[kind]) {
            Ok(counter) => counter.inc(),
            Err(error) => warn!("unable to count ETH1 API error of kind {kind}: {error}"),
        }
    }

    pub fn set_operation_pool_size(&self, pool: &str, size: usize) {
        match self.operation_pool_sizes.get_metric_with_label_values(&[pool]) {
            Ok(gauge) => gauge.set(i64::try_from(size).unwrap_or(i64::MAX)),
            Err(error) => warn!("unable to set size of operation pool {pool}: {error}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use prometheus::TextEncoder;

    use super::*;

    #[test]
    fn metrics_register_under_contract_names() -> Result<()> {
        let registry = Registry::new();
        let metrics = Metrics::new()?;

        metrics.register(&registry)?;
        metrics.valid_deposits_received.inc();
        metrics.missed_deposit_logs.inc();
        metrics.malformed_logs.inc();
        metrics.set_execution_block_number(42);
        metrics.register_eth1_api_error("HttpTimeout");
        metrics.set_operation_pool_size("withdrawals", 3);

        let exposition = TextEncoder::new().encode_to_string(&registry.gather())?;

        assert!(exposition.contains("powchain_valid_deposits_received 1"));
        assert!(exposition.contains("powchain_missed_deposit_logs 1"));
        assert!(exposition.contains("powchain_malformed_logs 1"));
        assert!(exposition.contains("powchain_block_number 42"));

        assert_eq!(metrics.execution_block_number(), 42);

        Ok(())
    }

    #[test]
    fn registering_twice_fails() -> Result<()> {
        let registry = Registry::new();
        let metrics = Metrics::new()?;

        metrics.register(&registry)?;

        assert!(metrics.register(&registry).is_err());

        Ok(())
    }
}

use core::{num::NonZeroUsize, time::Duration};
use std::path::PathBuf;

use anyhow::{ensure, Context as _, Result};
use eth1_api::{ApiOptions, AuthOptions};
use nonzero_ext::nonzero;
use thiserror::Error;
use types::{primitives::ExecutionBlockHeight, redacting_url::RedactingUrl};

const DEFAULT_ETH1_HEADER_REQ_LIMIT: u64 = 1000;
const DEFAULT_FALLBACK_CHECK_INTERVAL: u64 = 10;
const DEFAULT_MAX_TOLERABLE_HEADER_GAP: u64 = 50;
const DEFAULT_DEPOSIT_LOG_REQUEST_LIMIT: u64 = 10_000;
const DEFAULT_FOLLOW_DISTANCE_BACKOFF: Duration = Duration::from_secs(1);
const DEFAULT_DEPOSIT_SAVE_INTERVAL: u64 = 1000;
const DEFAULT_HEADER_CACHE_SIZE: NonZeroUsize = nonzero!(1000_usize);

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub(crate) enum Error {
    #[error("{option} must be greater than zero")]
    ZeroOption { option: &'static str },
    #[error("header cache size must be greater than zero")]
    ZeroHeaderCacheSize,
}

/// Options of the execution service that are not chain constants.
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub http_endpoints: Vec<RedactingUrl>,
    pub jwt_secret: Option<PathBuf>,
    pub jwt_id: Option<String>,
    pub jwt_version: Option<String>,
    pub eth1_header_req_limit: u64,
    pub contract_deployment_block: ExecutionBlockHeight,
    /// Number of ticks between connection checks.
    pub fallback_check_interval: u64,
    pub max_tolerable_header_gap: u64,
    pub deposit_log_request_limit: u64,
    /// Delay before retrying a catch-up batch that was rejected for being too large.
    pub follow_distance_backoff: Duration,
    pub deposit_save_interval: u64,
    pub header_cache_size: NonZeroUsize,
    pub request_timeout: Duration,
    pub max_consecutive_failures: u32,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let api_options = ApiOptions::default();

        Self {
            http_endpoints: vec![],
            jwt_secret: None,
            jwt_id: None,
            jwt_version: None,
            eth1_header_req_limit: DEFAULT_ETH1_HEADER_REQ_LIMIT,
            contract_deployment_block: 0,
            fallback_check_interval: DEFAULT_FALLBACK_CHECK_INTERVAL,
            max_tolerable_header_gap: DEFAULT_MAX_TOLERABLE_HEADER_GAP,
            deposit_log_request_limit: DEFAULT_DEPOSIT_LOG_REQUEST_LIMIT,
            follow_distance_backoff: DEFAULT_FOLLOW_DISTANCE_BACKOFF,
            deposit_save_interval: DEFAULT_DEPOSIT_SAVE_INTERVAL,
            header_cache_size: DEFAULT_HEADER_CACHE_SIZE,
            request_timeout: api_options.request_timeout,
            max_consecutive_failures: api_options.max_consecutive_failures,
        }
    }
}

impl ServiceConfig {
    #[must_use]
    pub fn builder() -> ServiceConfigBuilder {
        ServiceConfigBuilder::default()
    }

    #[must_use]
    pub const fn api_options(&self) -> ApiOptions {
        ApiOptions {
            request_timeout: self.request_timeout,
            max_consecutive_failures: self.max_consecutive_failures,
        }
    }

    #[must_use]
    pub fn auth_options(&self) -> AuthOptions {
        AuthOptions {
            secret_path: self.jwt_secret.clone(),
            id: self.jwt_id.clone(),
            version: self.jwt_version.clone(),
        }
    }

    /// Checks options that the service divides by or counts down from.
    pub fn validate(&self) -> Result<()> {
        for (option, value) in [
            ("eth1_header_req_limit", self.eth1_header_req_limit),
            ("fallback_check_interval", self.fallback_check_interval),
            ("deposit_log_request_limit", self.deposit_log_request_limit),
            ("deposit_save_interval", self.deposit_save_interval),
            (
                "max_consecutive_failures",
                self.max_consecutive_failures.into(),
            ),
        ] {
            ensure!(value > 0, Error::ZeroOption { option });
        }

        Ok(())
    }
}

#[derive(Default)]
pub struct ServiceConfigBuilder {
    http_endpoints: Vec<String>,
    config: ServiceConfig,
    header_cache_size: Option<usize>,
}

impl ServiceConfigBuilder {
    /// Appends an endpoint. Endpoints are tried in the order they are added.
    #[must_use]
    pub fn http_endpoint(mut self, url: impl Into<String>) -> Self {
        self.http_endpoints.push(url.into());
        self
    }

    #[must_use]
    pub fn jwt_secret(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.jwt_secret = Some(path.into());
        self
    }

    #[must_use]
    pub fn jwt_id(mut self, id: impl Into<String>) -> Self {
        self.config.jwt_id = Some(id.into());
        self
    }

    #[must_use]
    pub fn jwt_version(mut self, version: impl Into<String>) -> Self {
        self.config.jwt_version = Some(version.into());
        self
    }

    #[must_use]
    pub const fn eth1_header_req_limit(mut self, limit: u64) -> Self {
        self.config.eth1_header_req_limit = limit;
        self
    }

    #[must_use]
    pub const fn contract_deployment_block(mut self, height: ExecutionBlockHeight) -> Self {
        self.config.contract_deployment_block = height;
        self
    }

    #[must_use]
    pub const fn fallback_check_interval(mut self, ticks: u64) -> Self {
        self.config.fallback_check_interval = ticks;
        self
    }

    #[must_use]
    pub const fn max_tolerable_header_gap(mut self, gap: u64) -> Self {
        self.config.max_tolerable_header_gap = gap;
        self
    }

    #[must_use]
    pub const fn deposit_log_request_limit(mut self, limit: u64) -> Self {
        self.config.deposit_log_request_limit = limit;
        self
    }

    #[must_use]
    pub const fn follow_distance_backoff(mut self, backoff: Duration) -> Self {
        self.config.follow_distance_backoff = backoff;
        self
    }

    #[must_use]
    pub const fn deposit_save_interval(mut self, interval: u64) -> Self {
        self.config.deposit_save_interval = interval;
        self
    }

    #[must_use]
    pub const fn header_cache_size(mut self, size: usize) -> Self {
        self.header_cache_size = Some(size);
        self
    }

    #[must_use]
    pub const fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn max_consecutive_failures(mut self, failures: u32) -> Self {
        self.config.max_consecutive_failures = failures;
        self
    }

    pub fn build(self) -> Result<ServiceConfig> {
        let Self {
            http_endpoints,
            mut config,
            header_cache_size,
        } = self;

        config.validate()?;

        if let Some(size) = header_cache_size {
            config.header_cache_size = NonZeroUsize::new(size).ok_or(Error::ZeroHeaderCacheSize)?;
        }

        config.http_endpoints = http_endpoints
            .iter()
            .map(|url| {
                url.parse::<RedactingUrl>()
                    .with_context(|| format!("invalid execution endpoint: {url}"))
            })
            .collect::<Result<_>>()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_defaults_match_service_defaults() -> Result<()> {
        let config = ServiceConfig::builder().build()?;

        assert!(config.http_endpoints.is_empty());
        assert_eq!(config.eth1_header_req_limit, 1000);
        assert_eq!(config.max_tolerable_header_gap, 50);
        assert_eq!(config.deposit_log_request_limit, 10_000);
        assert_eq!(config.deposit_save_interval, 1000);
        assert_eq!(config.header_cache_size.get(), 1000);
        assert_eq!(config.max_consecutive_failures, 3);

        Ok(())
    }

    #[test]
    fn builder_keeps_endpoint_order() -> Result<()> {
        let config = ServiceConfig::builder()
            .http_endpoint("http://primary:8545")
            .http_endpoint("http://secondary:8545")
            .eth1_header_req_limit(64)
            .header_cache_size(8)
            .build()?;

        let hosts = config
            .http_endpoints
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>();

        assert_eq!(hosts, ["http://primary:8545/", "http://secondary:8545/"]);
        assert_eq!(config.eth1_header_req_limit, 64);
        assert_eq!(config.header_cache_size.get(), 8);

        Ok(())
    }

    #[test]
    fn zero_limits_are_rejected() {
        let error = ServiceConfig::builder()
            .deposit_save_interval(0)
            .build()
            .expect_err("zero save interval should be rejected");

        assert_eq!(
            error.downcast::<Error>().ok(),
            Some(Error::ZeroOption {
                option: "deposit_save_interval",
            }),
        );
    }

    #[test]
    fn options_set_directly_are_validated() {
        let config = ServiceConfig {
            fallback_check_interval: 0,
            ..ServiceConfig::default()
        };

        let error = config
            .validate()
            .expect_err("zero check interval should be rejected");

        assert_eq!(
            error.downcast::<Error>().ok(),
            Some(Error::ZeroOption {
                option: "fallback_check_interval",
            }),
        );
    }

    #[test]
    fn zero_header_cache_size_is_rejected() {
        let error = ServiceConfig::builder()
            .header_cache_size(0)
            .build()
            .expect_err("zero cache size should be rejected");

        assert_eq!(error.downcast::<Error>().ok(), Some(Error::ZeroHeaderCacheSize));
    }

    #[test]
    fn malformed_endpoint_is_rejected() {
        ServiceConfig::builder()
            .http_endpoint("not a url")
            .build()
            .expect_err("malformed URL should be rejected");
    }
}

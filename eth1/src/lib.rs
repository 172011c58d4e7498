pub use eth1_api::{DepositEvent, ExitRequestEvent, WithdrawalRequestEvent};

pub use crate::{
    config::{ServiceConfig, ServiceConfigBuilder},
    error::Error,
    header_cache::HeaderCache,
    interfaces::{
        BeaconStateProvider, BeaconStateSummary, BlockFetcher, ChainInfoFetcher,
        ChainStartFetcher, PendingDeposits, PendingDepositsCache,
    },
    log_processor::{Dependencies, LogProcessor},
    service::{LoopEvent, LoopOutcome, Service, ServiceHandle},
    snapshot::{validate_deposit_containers, Snapshot},
    state_tracker::{StateEvent, StateTracker},
};

mod config;
mod error;
mod header_cache;
mod interfaces;
mod log_processor;
mod service;
mod snapshot;
mod state;
mod state_tracker;

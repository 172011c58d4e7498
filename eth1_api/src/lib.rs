pub use crate::{
    abi::{Error as AbiError, MinedLog},
    auth::{Auth, Options as AuthOptions},
    consensus_info::{
        CandidateSpine, CandidatesResult, ConsensusInfo, ConsensusResult, CoordinatedState,
        FinalizationParams,
    },
    deposit_event::DepositEvent,
    endpoints::{Endpoint, EndpointStatus},
    engine::{
        ExecutionPayloadV1, ForkChoiceStateV1, ForkChoiceUpdatedResponse, PayloadAttributesV1,
        PayloadStatusV1, PayloadValidationStatus, TransitionConfigurationV1,
    },
    error::{is_config_mismatch, is_too_much_data_requested, RpcError},
    eth1_api::{ApiOptions, Eth1Api, SyncProgress},
    exit_event::ExitRequestEvent,
    header::{RawCheckpoint, RawHeader},
    log::{Log, LogFilter},
    messages::BeaconNodeStats,
    withdrawal_event::WithdrawalRequestEvent,
};

pub mod abi;
pub mod deposit_event;
pub mod exit_event;
pub mod withdrawal_event;

mod auth;
mod consensus_info;
mod endpoints;
mod engine;
mod error;
mod eth1_api;
mod header;
mod json_rpc;
mod log;
mod messages;
mod quantity;

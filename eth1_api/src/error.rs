use serde_json::Value;
use strum::IntoStaticStr;
use thiserror::Error;
use types::primitives::ExecutionBlockNumber;

pub const PARSE_ERROR_CODE: i64 = -32700;
pub const INVALID_REQUEST_CODE: i64 = -32600;
pub const METHOD_NOT_FOUND_CODE: i64 = -32601;
pub const INVALID_PARAMS_CODE: i64 = -32602;
pub const INTERNAL_ERROR_CODE: i64 = -32603;
pub const UNKNOWN_PAYLOAD_CODE: i64 = -32001;
pub const SERVER_ERROR_CODE: i64 = -32000;

// Messages execution clients and RPC providers use when a log query covers too much.
const TOO_MUCH_DATA_PATTERNS: &[&str] = &[
    "query returned more than",
    "response size exceeded",
    "log response size exceeded",
    "exceed maximum block range",
    "query timeout exceeded",
    "too many logs",
];

/// Failures of calls to the execution chain endpoint.
#[derive(Clone, Debug, Error, IntoStaticStr)]
#[cfg_attr(test, derive(PartialEq, Eq))]
#[strum(serialize_all = "snake_case")]
pub enum RpcError {
    #[error("endpoint could not parse request: {message}")]
    Parse { message: String },
    #[error("invalid request: {message}")]
    InvalidRequest { message: String },
    #[error("method not found: {message}")]
    MethodNotFound { message: String },
    #[error("invalid params: {message}")]
    InvalidParams { message: String },
    #[error("internal endpoint error: {message}")]
    Internal { message: String },
    #[error("unknown payload: {message}")]
    UnknownPayload { message: String },
    #[error("server error: {message} (data: {data:?})")]
    ServerData {
        message: String,
        data: Option<Value>,
    },
    #[error("HTTP request timed out")]
    HttpTimeout,
    #[error("candidate chain has a gap (expected number {expected}, got {actual})")]
    ChainGap {
        expected: ExecutionBlockNumber,
        actual: ExecutionBlockNumber,
    },
    #[error("endpoint configuration does not match local configuration: {message}")]
    ConfigMismatch { message: String },
    #[error("unexpected RPC failure: {message}")]
    Unexpected { message: String },
}

impl RpcError {
    #[must_use]
    pub fn from_error_object(code: i64, message: String, data: Option<Value>) -> Self {
        match code {
            PARSE_ERROR_CODE => Self::Parse { message },
            INVALID_REQUEST_CODE => Self::InvalidRequest { message },
            METHOD_NOT_FOUND_CODE => Self::MethodNotFound { message },
            INVALID_PARAMS_CODE => Self::InvalidParams { message },
            INTERNAL_ERROR_CODE => Self::Internal { message },
            UNKNOWN_PAYLOAD_CODE => Self::UnknownPayload { message },
            SERVER_ERROR_CODE => Self::ServerData { message, data },
            _ => Self::Unexpected {
                message: format!("code {code}: {message}"),
            },
        }
    }

    /// Label used for the `eth1_api_errors_count` metric.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        self.into()
    }

    #[must_use]
    pub fn is_too_much_data_requested(&self) -> bool {
        let message = match self {
            Self::InvalidParams { message }
            | Self::Internal { message }
            | Self::ServerData { message, .. }
            | Self::Unexpected { message } => message,
            _ => return false,
        };

        let message = message.to_lowercase();

        TOO_MUCH_DATA_PATTERNS
            .iter()
            .any(|pattern| message.contains(pattern))
    }

    /// Whether the failure says something about the health of the endpoint itself.
    ///
    /// Errors reported in a well-formed JSON-RPC response do not.
    #[must_use]
    pub const fn counts_against_endpoint(&self) -> bool {
        matches!(
            self,
            Self::HttpTimeout | Self::Internal { .. } | Self::Unexpected { .. },
        )
    }

    #[must_use]
    pub const fn is_config_mismatch(&self) -> bool {
        matches!(self, Self::ConfigMismatch { .. })
    }
}

#[must_use]
pub fn is_too_much_data_requested(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<RpcError>()
        .is_some_and(RpcError::is_too_much_data_requested)
}

#[must_use]
pub fn is_config_mismatch(error: &anyhow::Error) -> bool {
    error
        .downcast_ref::<RpcError>()
        .is_some_and(RpcError::is_config_mismatch)
}

#[cfg(test)]
mod tests {
    use anyhow::Error as AnyhowError;
    use serde_json::json;
    use test_case::test_case;

    use super::*;

    #[test_case(-32700 => "parse")]
    #[test_case(-32600 => "invalid_request")]
    #[test_case(-32601 => "method_not_found")]
    #[test_case(-32602 => "invalid_params")]
    #[test_case(-32603 => "internal")]
    #[test_case(-32001 => "unknown_payload")]
    #[test_case(-32000 => "server_data")]
    #[test_case(-39999 => "unexpected")]
    fn error_codes_map_to_kinds(code: i64) -> &'static str {
        RpcError::from_error_object(code, "failure".to_owned(), None).kind()
    }

    #[test]
    fn server_error_keeps_data() {
        let data = json!({ "reason": "busy" });

        assert_eq!(
            RpcError::from_error_object(-32000, "busy".to_owned(), Some(data.clone())),
            RpcError::ServerData {
                message: "busy".to_owned(),
                data: Some(data),
            },
        );
    }

    #[test_case(-32000, "query returned more than 10000 results" => true)]
    #[test_case(-32602, "Log response size exceeded. You can make eth_getLogs requests with up to a 2K block range" => true)]
    #[test_case(-32000, "header not found" => false)]
    #[test_case(-32601, "query returned more than 10000 results" => false)]
    fn too_much_data_is_detected_from_message(code: i64, message: &str) -> bool {
        let error = AnyhowError::new(RpcError::from_error_object(code, message.to_owned(), None));
        is_too_much_data_requested(&error)
    }

    #[test]
    fn config_mismatch_is_detected_through_anyhow() {
        let error = AnyhowError::new(RpcError::ConfigMismatch {
            message: "chain id".to_owned(),
        });

        assert!(is_config_mismatch(&error));
        assert!(!is_config_mismatch(&AnyhowError::msg("other")));
    }
}

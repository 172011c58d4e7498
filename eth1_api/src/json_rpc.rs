use anyhow::Result;
use itertools::Itertools as _;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::RpcError;

const JSON_RPC_VERSION: &str = "2.0";

#[derive(Clone, Debug, Serialize)]
pub struct Request<'method> {
    jsonrpc: &'static str,
    pub id: u64,
    pub method: &'method str,
    pub params: Vec<Value>,
}

impl<'method> Request<'method> {
    #[must_use]
    pub const fn new(id: u64, method: &'method str, params: Vec<Value>) -> Self {
        Self {
            jsonrpc: JSON_RPC_VERSION,
            id,
            method,
            params,
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct ErrorObject {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<Value>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Response {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<ErrorObject>,
}

impl Response {
    /// Converts the response into `T`, treating a missing result as `null`.
    pub fn into_result<T: DeserializeOwned>(self, method: &str) -> Result<T> {
        if let Some(ErrorObject {
            code,
            message,
            data,
        }) = self.error
        {
            return Err(RpcError::from_error_object(code, message, data).into());
        }

        let result = self.result.unwrap_or(Value::Null);

        serde_json::from_value(result).map_err(|error| {
            RpcError::Unexpected {
                message: format!("malformed {method} result: {error}"),
            }
            .into()
        })
    }
}

/// Orders batch responses by request ID and checks that none are missing.
pub fn sort_batch(responses: Vec<Response>, ids: &[u64]) -> Result<Vec<Response>> {
    let responses = responses
        .into_iter()
        .sorted_by_key(|response| response.id)
        .collect_vec();

    let returned_ids = responses.iter().map(|response| response.id).collect_vec();
    let expected_ids = ids.iter().copied().map(Some).collect_vec();

    if returned_ids != expected_ids {
        return Err(RpcError::Unexpected {
            message: format!(
                "batch response IDs {returned_ids:?} do not match request IDs {expected_ids:?}",
            ),
        }
        .into());
    }

    Ok(responses)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn request_serializes_as_json_rpc_2() -> Result<()> {
        let request = Request::new(7, "eth_chainId", vec![]);

        assert_eq!(
            serde_json::to_value(request)?,
            json!({ "jsonrpc": "2.0", "id": 7, "method": "eth_chainId", "params": [] }),
        );

        Ok(())
    }

    #[test]
    fn error_object_becomes_rpc_error() -> Result<()> {
        let response = serde_json::from_value::<Response>(json!({
            "jsonrpc": "2.0",
            "id": 1,
            "error": { "code": -32601, "message": "the method dag_sync does not exist" },
        }))?;

        let error = response
            .into_result::<Value>("dag_sync")
            .expect_err("error object should be returned as an error")
            .downcast::<RpcError>()?;

        assert_eq!(
            error,
            RpcError::MethodNotFound {
                message: "the method dag_sync does not exist".to_owned(),
            },
        );

        Ok(())
    }

    #[test]
    fn null_result_deserializes_into_none() -> Result<()> {
        let response =
            serde_json::from_value::<Response>(json!({ "jsonrpc": "2.0", "id": 1, "result": null }))?;

        assert_eq!(response.into_result::<Option<u64>>("eth_getBlockByHash")?, None);

        Ok(())
    }

    #[test]
    fn batch_responses_are_sorted_and_checked() -> Result<()> {
        let responses = serde_json::from_value::<Vec<Response>>(json!([
            { "jsonrpc": "2.0", "id": 2, "result": "0x2" },
            { "jsonrpc": "2.0", "id": 1, "result": "0x1" },
        ]))?;

        let sorted = sort_batch(responses.clone(), &[1, 2])?;

        assert_eq!(sorted.iter().map(|response| response.id).collect_vec(), [Some(1), Some(2)]);

        sort_batch(responses, &[1, 2, 3]).expect_err("missing response should be detected");

        Ok(())
    }
}

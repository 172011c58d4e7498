//! Types of the `dag_*` methods used to coordinate finalization with the execution chain.

use anyhow::{ensure, Result};
use itertools::Itertools as _;
use serde::{Deserialize, Serialize};
use types::primitives::{ExecutionAddress, ExecutionBlockHash, ExecutionBlockNumber, Slot};

use crate::{error::RpcError, header::RawCheckpoint, quantity};

/// Parameters of `dag_sync`.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusInfo {
    #[serde(with = "quantity")]
    pub slot: Slot,
    pub creators: Vec<ExecutionAddress>,
    pub finalizing: Vec<ExecutionBlockHash>,
}

/// Result of `dag_sync`.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub candidates: Vec<ExecutionBlockHash>,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSpine {
    pub hash: ExecutionBlockHash,
    #[serde(with = "quantity")]
    pub number: ExecutionBlockNumber,
}

/// Result of `dag_getCandidates`.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidatesResult {
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub candidates: Vec<CandidateSpine>,
}

impl CandidatesResult {
    /// Returns candidate hashes after checking that their numbers are consecutive.
    pub fn into_candidates(self) -> Result<Vec<ExecutionBlockHash>> {
        if let Some(message) = self.error {
            return Err(RpcError::Unexpected { message }.into());
        }

        for (previous, next) in self.candidates.iter().tuple_windows() {
            let expected = previous.number + 1;

            ensure!(
                next.number == expected,
                RpcError::ChainGap {
                    expected,
                    actual: next.number,
                },
            );
        }

        Ok(self
            .candidates
            .into_iter()
            .map(|candidate| candidate.hash)
            .collect())
    }
}

/// Parameters of `dag_finalize`.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizationParams {
    pub spines: Vec<ExecutionBlockHash>,
    #[serde(default)]
    pub base_spine: Option<ExecutionBlockHash>,
    #[serde(default)]
    pub checkpoint: Option<RawCheckpoint>,
}

/// Result of `dag_coordinatedState`.
#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinatedState {
    pub last_finalized_hash: ExecutionBlockHash,
    #[serde(with = "quantity")]
    pub last_finalized_number: ExecutionBlockNumber,
    #[serde(default)]
    pub checkpoint: Option<RawCheckpoint>,
}

#[cfg(test)]
mod tests {
    use types::primitives::H256;

    use super::*;

    fn spine(byte: u8, number: ExecutionBlockNumber) -> CandidateSpine {
        CandidateSpine {
            hash: H256::repeat_byte(byte),
            number,
        }
    }

    #[test]
    fn consecutive_candidates_are_accepted() -> Result<()> {
        let result = CandidatesResult {
            error: None,
            candidates: vec![spine(1, 10), spine(2, 11), spine(3, 12)],
        };

        assert_eq!(
            result.into_candidates()?,
            [H256::repeat_byte(1), H256::repeat_byte(2), H256::repeat_byte(3)],
        );

        Ok(())
    }

    #[test]
    fn gap_in_candidates_is_chain_gap() -> Result<()> {
        let result = CandidatesResult {
            error: None,
            candidates: vec![spine(1, 10), spine(2, 11), spine(3, 13)],
        };

        let error = result
            .into_candidates()
            .expect_err("gap should be detected")
            .downcast::<RpcError>()?;

        assert_eq!(
            error,
            RpcError::ChainGap {
                expected: 12,
                actual: 13,
            },
        );

        Ok(())
    }

    #[test]
    fn error_in_result_is_returned() {
        let result = CandidatesResult {
            error: Some("slot is too far in the future".to_owned()),
            candidates: vec![],
        };

        result
            .into_candidates()
            .expect_err("error field should turn into an error");
    }
}

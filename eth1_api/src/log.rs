use core::ops::RangeInclusive;

use serde::{Deserialize, Serialize};
use types::primitives::{ExecutionAddress, ExecutionBlockNumber, H256};

use crate::quantity;

/// Log entry as returned by `eth_getLogs`.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Log {
    pub address: ExecutionAddress,
    pub topics: Vec<H256>,
    #[serde(with = "impl_serde::serialize")]
    pub data: Vec<u8>,
    #[serde(default, with = "quantity::option")]
    pub block_number: Option<ExecutionBlockNumber>,
    #[serde(default)]
    pub block_hash: Option<H256>,
    #[serde(default)]
    pub transaction_hash: Option<H256>,
    #[serde(default, with = "quantity::option")]
    pub transaction_index: Option<u64>,
    #[serde(default, with = "quantity::option")]
    pub log_index: Option<u64>,
    #[serde(default)]
    pub removed: bool,
}

impl Log {
    #[must_use]
    pub fn signature(&self) -> Option<H256> {
        self.topics.first().copied()
    }
}

/// Parameters of `eth_getLogs`.
#[derive(Clone, PartialEq, Eq, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogFilter {
    #[serde(with = "quantity")]
    pub from_block: ExecutionBlockNumber,
    #[serde(with = "quantity")]
    pub to_block: ExecutionBlockNumber,
    pub address: Vec<ExecutionAddress>,
    pub topics: Vec<Vec<H256>>,
}

impl LogFilter {
    /// Matches logs emitted by `address` whose first topic is one of `signatures`.
    #[must_use]
    pub fn contract_events(
        address: ExecutionAddress,
        block_numbers: RangeInclusive<ExecutionBlockNumber>,
        signatures: impl IntoIterator<Item = H256>,
    ) -> Self {
        Self {
            from_block: *block_numbers.start(),
            to_block: *block_numbers.end(),
            address: vec![address],
            topics: vec![signatures.into_iter().collect()],
        }
    }

    #[must_use]
    pub fn block_numbers(&self) -> RangeInclusive<ExecutionBlockNumber> {
        self.from_block..=self.to_block
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use hex_literal::hex;
    use serde_json::json;

    use super::*;

    #[test]
    fn log_deserializes_from_rpc_response() -> Result<()> {
        let log = serde_json::from_value::<Log>(json!({
            "address": "0x1234567890123456789012345678901234567890",
            "topics": ["0x9690c6325860650852f0f0bd0e7d47145a3d0c2c5c92cba852bad61c02928b09"],
            "data": "0x0102",
            "blockNumber": "0x1b4",
            "blockHash": "0x0000000000000000000000000000000000000000000000000000000000000001",
            "transactionHash": "0x0000000000000000000000000000000000000000000000000000000000000002",
            "transactionIndex": "0x0",
            "logIndex": "0x3",
            "removed": false,
        }))?;

        assert_eq!(
            log.signature(),
            Some(H256(hex!(
                "9690c6325860650852f0f0bd0e7d47145a3d0c2c5c92cba852bad61c02928b09"
            ))),
        );
        assert_eq!(log.data, [1, 2]);
        assert_eq!(log.block_number, Some(436));
        assert_eq!(log.transaction_index, Some(0));
        assert_eq!(log.log_index, Some(3));

        Ok(())
    }

    #[test]
    fn filter_serializes_topic_alternatives() -> Result<()> {
        let filter = LogFilter::contract_events(
            ExecutionAddress::repeat_byte(0x11),
            16..=31,
            [H256::repeat_byte(1), H256::repeat_byte(2)],
        );

        assert_eq!(
            serde_json::to_value(&filter)?,
            json!({
                "fromBlock": "0x10",
                "toBlock": "0x1f",
                "address": ["0x1111111111111111111111111111111111111111"],
                "topics": [[
                    "0x0101010101010101010101010101010101010101010101010101010101010101",
                    "0x0202020202020202020202020202020202020202020202020202020202020202",
                ]],
            }),
        );

        assert_eq!(filter.block_numbers(), 16..=31);

        Ok(())
    }
}

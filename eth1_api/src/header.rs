use serde::{Deserialize, Serialize};
use types::{
    nonstandard::{ExecutionCheckpoint, ExecutionHeader},
    primitives::{
        ExecutionBlockHash, ExecutionBlockHeight, ExecutionBlockNumber, Slot, UnixSeconds,
    },
};

use crate::quantity;

/// Block header fields returned by `eth_getBlockByNumber` and `eth_getBlockByHash`.
///
/// `number` is only present once the block has been finalized by the execution chain.
#[derive(Clone, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawHeader {
    #[serde(default)]
    pub hash: Option<ExecutionBlockHash>,
    #[serde(default, with = "quantity::option")]
    pub number: Option<ExecutionBlockNumber>,
    #[serde(with = "quantity")]
    pub height: ExecutionBlockHeight,
    #[serde(with = "quantity")]
    pub timestamp: UnixSeconds,
    #[serde(default)]
    pub checkpoint: Option<RawCheckpoint>,
    #[serde(default, with = "quantity::option")]
    pub slot: Option<Slot>,
}

#[derive(Clone, Copy, PartialEq, Eq, Default, Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawCheckpoint {
    pub root: ExecutionBlockHash,
    #[serde(with = "quantity")]
    pub number: ExecutionBlockNumber,
}

impl From<RawHeader> for ExecutionHeader {
    fn from(raw: RawHeader) -> Self {
        let RawHeader {
            hash,
            number,
            height,
            timestamp,
            checkpoint,
            slot,
        } = raw;

        Self {
            hash: hash.unwrap_or_default(),
            number: number.unwrap_or_default(),
            height,
            timestamp,
            checkpoint: checkpoint.map(|RawCheckpoint { root, number }| ExecutionCheckpoint {
                hash: root,
                number,
            }),
            slot: slot.unwrap_or_default(),
        }
    }
}

impl From<ExecutionHeader> for RawHeader {
    fn from(header: ExecutionHeader) -> Self {
        let ExecutionHeader {
            hash,
            number,
            height,
            timestamp,
            checkpoint,
            slot,
        } = header;

        Self {
            hash: Some(hash),
            number: (number != 0).then_some(number),
            height,
            timestamp,
            checkpoint: checkpoint.map(|ExecutionCheckpoint { hash, number }| RawCheckpoint {
                root: hash,
                number,
            }),
            slot: Some(slot),
        }
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Result;
    use serde_json::json;
    use types::primitives::H256;

    use super::*;

    #[test]
    fn pending_header_has_no_number() -> Result<()> {
        let raw = serde_json::from_value::<RawHeader>(json!({
            "hash": "0x0101010101010101010101010101010101010101010101010101010101010101",
            "number": null,
            "height": "0x20",
            "timestamp": "0x5f5e100",
            "slot": "0x40",
        }))?;

        let header = ExecutionHeader::from(raw);

        assert_eq!(header.hash, H256::repeat_byte(1));
        assert_eq!(header.number, 0);
        assert_eq!(header.height, 32);
        assert_eq!(header.slot, 64);
        assert!(!header.is_finalized());

        Ok(())
    }

    #[test]
    fn finalized_header_carries_checkpoint() -> Result<()> {
        let raw = serde_json::from_value::<RawHeader>(json!({
            "hash": "0x0202020202020202020202020202020202020202020202020202020202020202",
            "number": "0x1f",
            "height": "0x20",
            "timestamp": "0x5f5e100",
            "checkpoint": {
                "root": "0x0303030303030303030303030303030303030303030303030303030303030303",
                "number": "0x10",
            },
        }))?;

        let header = ExecutionHeader::from(raw.clone());

        assert!(header.is_finalized());
        assert_eq!(
            header.checkpoint,
            Some(ExecutionCheckpoint {
                hash: H256::repeat_byte(3),
                number: 16,
            }),
        );
        assert_eq!(RawHeader::from(header).checkpoint, raw.checkpoint);

        Ok(())
    }
}

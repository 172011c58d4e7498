//! Helpers shared by the staking contract event decoders.
//!
//! The contract emits every argument as `bytes`, so each event starts with one offset word per
//! argument followed by a length word and the padded contents of each argument in order.
//! Integers inside those byte strings are little-endian like in SSZ.

use core::ops::Range;

use anyhow::{bail, ensure, Result};
use thiserror::Error;
use types::primitives::{ExecutionBlockNumber, ExecutionTransactionHash, H256};

use crate::log::Log;

pub type EvmWord = [u8; 32];

pub const EVM_WORD_SIZE: usize = size_of::<EvmWord>();

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
pub enum Error {
    #[error("log has unexpected topics: {topics:?}")]
    UnexpectedTopics { topics: Vec<H256> },
    #[error("log has been removed (transaction: {transaction_hash:?})")]
    Removed {
        transaction_hash: Option<ExecutionTransactionHash>,
    },
    #[error("log is not part of a mined block")]
    Pending,
    #[error("log data has the wrong length (expected one of {expected:?}, got {actual})")]
    WrongLength { expected: Vec<usize>, actual: usize },
    #[error("log data has a malformed head or length word at byte {position}")]
    MalformedArgument { position: usize },
}

/// Fields of a mined log needed by the event decoders.
pub struct MinedLog<'log> {
    pub data: &'log [u8],
    pub block_number: ExecutionBlockNumber,
    pub transaction_hash: ExecutionTransactionHash,
    pub transaction_index: u64,
}

pub fn mined_log(log: &Log, topic: H256) -> Result<MinedLog<'_>> {
    ensure!(
        log.topics == [topic],
        Error::UnexpectedTopics {
            topics: log.topics.clone(),
        },
    );

    ensure!(
        !log.removed,
        Error::Removed {
            transaction_hash: log.transaction_hash,
        },
    );

    let (Some(block_number), Some(transaction_hash), Some(transaction_index)) = (
        log.block_number,
        log.transaction_hash,
        log.transaction_index,
    ) else {
        bail!(Error::Pending);
    };

    Ok(MinedLog {
        data: log.data.as_slice(),
        block_number,
        transaction_hash,
        transaction_index,
    })
}

pub fn ensure_length(data: &[u8], expected: &[usize]) -> Result<()> {
    ensure!(
        expected.contains(&data.len()),
        Error::WrongLength {
            expected: expected.to_vec(),
            actual: data.len(),
        },
    );

    Ok(())
}

/// Checks the head word of a `bytes` argument and the length word it points at.
pub fn ensure_argument(
    data: &[u8],
    head: Range<usize>,
    length: Range<usize>,
    expected_length: usize,
) -> Result<()> {
    let position = head.start;
    let offset = length.start;

    ensure!(
        big_endian_word(data, head) == Some(offset as u64),
        Error::MalformedArgument { position },
    );

    ensure!(
        big_endian_word(data, length) == Some(expected_length as u64),
        Error::MalformedArgument { position: offset },
    );

    Ok(())
}

pub fn little_endian_u64(data: &[u8], range: Range<usize>) -> Result<u64> {
    let position = range.start;

    data.get(range)
        .and_then(|bytes| bytes.try_into().ok())
        .map(u64::from_le_bytes)
        .ok_or_else(|| Error::MalformedArgument { position }.into())
}

pub fn slice(data: &[u8], range: Range<usize>) -> Result<&[u8]> {
    let position = range.start;

    data.get(range)
        .ok_or_else(|| Error::MalformedArgument { position }.into())
}

/// Writes a head or length word. Used to build logs the way the contract emits them.
pub fn write_word(data: &mut [u8], range: Range<usize>, value: usize) {
    if let Some(low) = data
        .get_mut(range)
        .and_then(|word| word.get_mut(EVM_WORD_SIZE - size_of::<u64>()..))
    {
        low.copy_from_slice(&(value as u64).to_be_bytes());
    }
}

fn big_endian_word(data: &[u8], range: Range<usize>) -> Option<u64> {
    let word = data.get(range)?;
    let (high, low) = word.split_at_checked(EVM_WORD_SIZE - size_of::<u64>())?;

    if high.iter().any(|byte| *byte != 0) {
        return None;
    }

    low.try_into().ok().map(u64::from_be_bytes)
}

// `ExitRequestEvent(bytes pubkey, bytes creator_address, bytes validator_index, bytes exit_epoch)`.
//
// `exit_epoch` may be empty, in which case the data ends after its length word.

use core::ops::Range;

use anyhow::{ensure, Error as AnyhowError, Result};
use hex_literal::hex;
use memoffset::span_of;
use static_assertions::assert_eq_size;
use types::primitives::{
    Epoch, ExecutionAddress, ExecutionBlockNumber, ExecutionTransactionHash, PublicKeyBytes,
    ValidatorIndex, H256,
};

use crate::{
    abi::{self, EvmWord},
    log::Log,
};

#[repr(C)]
struct RawExitRequestEvent {
    _pubkey_offset: EvmWord,
    _creator_address_offset: EvmWord,
    _validator_index_offset: EvmWord,
    _exit_epoch_offset: EvmWord,
    _pubkey_length: EvmWord,
    pubkey: PublicKeyBytes,
    _pubkey_padding: [u8; 16],
    _creator_address_length: EvmWord,
    creator_address: ExecutionAddress,
    _creator_address_padding: [u8; 12],
    _validator_index_length: EvmWord,
    validator_index: ValidatorIndex,
    _validator_index_padding: [u8; 24],
    _exit_epoch_length: EvmWord,
    exit_epoch: Epoch,
    _exit_epoch_padding: [u8; 24],
}

assert_eq_size!(RawExitRequestEvent, [EvmWord; 13]);

fn fixed_arguments() -> [(Range<usize>, Range<usize>, usize); 3] {
    [
        (
            span_of!(RawExitRequestEvent, _pubkey_offset),
            span_of!(RawExitRequestEvent, _pubkey_length),
            size_of::<PublicKeyBytes>(),
        ),
        (
            span_of!(RawExitRequestEvent, _creator_address_offset),
            span_of!(RawExitRequestEvent, _creator_address_length),
            size_of::<ExecutionAddress>(),
        ),
        (
            span_of!(RawExitRequestEvent, _validator_index_offset),
            span_of!(RawExitRequestEvent, _validator_index_length),
            size_of::<ValidatorIndex>(),
        ),
    ]
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ExitRequestEvent {
    pub pubkey: PublicKeyBytes,
    pub creator_address: ExecutionAddress,
    pub validator_index: ValidatorIndex,
    pub exit_epoch: Option<Epoch>,
    pub block_number: ExecutionBlockNumber,
    pub transaction_hash: ExecutionTransactionHash,
    pub transaction_index: u64,
}

impl TryFrom<&Log> for ExitRequestEvent {
    type Error = AnyhowError;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let mined = abi::mined_log(log, Self::TOPIC)?;
        let data = mined.data;

        abi::ensure_length(data, &[Self::LENGTH_WITHOUT_EPOCH, Self::LENGTH])?;

        for (head, length, size) in fixed_arguments() {
            abi::ensure_argument(data, head, length, size)?;
        }

        let has_epoch = data.len() == Self::LENGTH;
        let epoch_size = if has_epoch { size_of::<Epoch>() } else { 0 };

        abi::ensure_argument(
            data,
            span_of!(RawExitRequestEvent, _exit_epoch_offset),
            span_of!(RawExitRequestEvent, _exit_epoch_length),
            epoch_size,
        )?;

        let exit_epoch = if has_epoch {
            Some(abi::little_endian_u64(
                data,
                span_of!(RawExitRequestEvent, exit_epoch),
            )?)
        } else {
            None
        };

        let pubkey = PublicKeyBytes::from_slice(abi::slice(
            data,
            span_of!(RawExitRequestEvent, pubkey),
        )?);

        let creator_address = ExecutionAddress::from_slice(abi::slice(
            data,
            span_of!(RawExitRequestEvent, creator_address),
        )?);

        let validator_index =
            abi::little_endian_u64(data, span_of!(RawExitRequestEvent, validator_index))?;

        ensure!(
            !pubkey.is_zero(),
            abi::Error::MalformedArgument {
                position: span_of!(RawExitRequestEvent, pubkey).start,
            },
        );

        Ok(Self {
            pubkey,
            creator_address,
            validator_index,
            exit_epoch,
            block_number: mined.block_number,
            transaction_hash: mined.transaction_hash,
            transaction_index: mined.transaction_index,
        })
    }
}

impl ExitRequestEvent {
    /// Keccak-256 hash of `ExitRequestEvent(bytes,bytes,bytes,bytes)`.
    pub const TOPIC: H256 = H256(hex!(
        "02c5b61b57cdba917537437962eb2dc0e5859a76710d0b1f4e1fd40e9c80f8e3"
    ));

    pub const LENGTH: usize = size_of::<RawExitRequestEvent>();

    const LENGTH_WITHOUT_EPOCH: usize = Self::LENGTH - size_of::<EvmWord>();

    #[must_use]
    pub fn encode_data(
        pubkey: PublicKeyBytes,
        creator_address: ExecutionAddress,
        validator_index: ValidatorIndex,
        exit_epoch: Option<Epoch>,
    ) -> Vec<u8> {
        let length = if exit_epoch.is_some() {
            Self::LENGTH
        } else {
            Self::LENGTH_WITHOUT_EPOCH
        };

        let mut bytes = vec![0; length];

        for (head, length, size) in fixed_arguments() {
            abi::write_word(&mut bytes, head, length.start);
            abi::write_word(&mut bytes, length, size);
        }

        let epoch_length = span_of!(RawExitRequestEvent, _exit_epoch_length);

        abi::write_word(
            &mut bytes,
            span_of!(RawExitRequestEvent, _exit_epoch_offset),
            epoch_length.start,
        );

        bytes[span_of!(RawExitRequestEvent, pubkey)].copy_from_slice(pubkey.as_bytes());
        bytes[span_of!(RawExitRequestEvent, creator_address)]
            .copy_from_slice(creator_address.as_bytes());
        bytes[span_of!(RawExitRequestEvent, validator_index)]
            .copy_from_slice(&validator_index.to_le_bytes());

        if let Some(epoch) = exit_epoch {
            abi::write_word(&mut bytes, epoch_length, size_of::<Epoch>());
            bytes[span_of!(RawExitRequestEvent, exit_epoch)].copy_from_slice(&epoch.to_le_bytes());
        }

        bytes
    }
}

// Layout of `DepositEvent` log data (each line is an EVM word):
// ```text
// 00000000000000000000000000000000000000000000000000000000000000c0 pubkey                 offset
// 0000000000000000000000000000000000000000000000000000000000000120 creator_address        offset
// 0000000000000000000000000000000000000000000000000000000000000160 withdrawal_credentials offset
// 00000000000000000000000000000000000000000000000000000000000001a0 amount                 offset
// 00000000000000000000000000000000000000000000000000000000000001e0 signature              offset
// 0000000000000000000000000000000000000000000000000000000000000260 index                  offset
// 0000000000000000000000000000000000000000000000000000000000000030 pubkey                 length
// ................................................................ pubkey
// ................................00000000000000000000000000000000 pubkey
// 0000000000000000000000000000000000000000000000000000000000000014 creator_address        length
// ........................................000000000000000000000000 creator_address
// 0000000000000000000000000000000000000000000000000000000000000020 withdrawal_credentials length
// ................................................................ withdrawal_credentials
// 0000000000000000000000000000000000000000000000000000000000000008 amount                 length
// ................000000000000000000000000000000000000000000000000 amount
// 0000000000000000000000000000000000000000000000000000000000000060 signature              length
// ................................................................ signature
// ................................................................ signature
// ................................................................ signature
// 0000000000000000000000000000000000000000000000000000000000000008 index                  length
// ................000000000000000000000000000000000000000000000000 index
// ```

use core::ops::Range;

use anyhow::{Error as AnyhowError, Result};
use hex_literal::hex;
use memoffset::span_of;
use static_assertions::assert_eq_size;
use types::{
    containers::DepositData,
    primitives::{
        DepositIndex, ExecutionAddress, ExecutionBlockNumber, Gwei, PublicKeyBytes,
        SignatureBytes, H256,
    },
};

use crate::{
    abi::{self, EvmWord},
    log::Log,
};

#[repr(C)]
struct RawDepositEvent {
    _pubkey_offset: EvmWord,
    _creator_address_offset: EvmWord,
    _withdrawal_credentials_offset: EvmWord,
    _amount_offset: EvmWord,
    _signature_offset: EvmWord,
    _index_offset: EvmWord,
    _pubkey_length: EvmWord,
    pubkey: PublicKeyBytes,
    _pubkey_padding: [u8; 16],
    _creator_address_length: EvmWord,
    creator_address: ExecutionAddress,
    _creator_address_padding: [u8; 12],
    _withdrawal_credentials_length: EvmWord,
    withdrawal_credentials: H256,
    _amount_length: EvmWord,
    amount: Gwei,
    _amount_padding: [u8; 24],
    _signature_length: EvmWord,
    signature: SignatureBytes,
    _index_length: EvmWord,
    index: DepositIndex,
    _index_padding: [u8; 24],
}

assert_eq_size!(RawDepositEvent, [EvmWord; 21]);

// Head word, length word and content size of each argument.
fn arguments() -> [(Range<usize>, Range<usize>, usize); 6] {
    [
        (
            span_of!(RawDepositEvent, _pubkey_offset),
            span_of!(RawDepositEvent, _pubkey_length),
            size_of::<PublicKeyBytes>(),
        ),
        (
            span_of!(RawDepositEvent, _creator_address_offset),
            span_of!(RawDepositEvent, _creator_address_length),
            size_of::<ExecutionAddress>(),
        ),
        (
            span_of!(RawDepositEvent, _withdrawal_credentials_offset),
            span_of!(RawDepositEvent, _withdrawal_credentials_length),
            size_of::<H256>(),
        ),
        (
            span_of!(RawDepositEvent, _amount_offset),
            span_of!(RawDepositEvent, _amount_length),
            size_of::<Gwei>(),
        ),
        (
            span_of!(RawDepositEvent, _signature_offset),
            span_of!(RawDepositEvent, _signature_length),
            size_of::<SignatureBytes>(),
        ),
        (
            span_of!(RawDepositEvent, _index_offset),
            span_of!(RawDepositEvent, _index_length),
            size_of::<DepositIndex>(),
        ),
    ]
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct DepositEvent {
    pub data: DepositData,
    pub index: DepositIndex,
    pub block_number: ExecutionBlockNumber,
}

impl TryFrom<&Log> for DepositEvent {
    type Error = AnyhowError;

    fn try_from(log: &Log) -> Result<Self, Self::Error> {
        let mined = abi::mined_log(log, Self::TOPIC)?;
        let data = mined.data;

        abi::ensure_length(data, &[Self::LENGTH])?;

        for (head, length, size) in arguments() {
            abi::ensure_argument(data, head, length, size)?;
        }

        let pubkey = PublicKeyBytes::from_slice(abi::slice(
            data,
            span_of!(RawDepositEvent, pubkey),
        )?);

        let creator_address = ExecutionAddress::from_slice(abi::slice(
            data,
            span_of!(RawDepositEvent, creator_address),
        )?);

        let withdrawal_credentials = H256::from_slice(abi::slice(
            data,
            span_of!(RawDepositEvent, withdrawal_credentials),
        )?);

        let amount = abi::little_endian_u64(data, span_of!(RawDepositEvent, amount))?;

        let signature = SignatureBytes::from_slice(abi::slice(
            data,
            span_of!(RawDepositEvent, signature),
        )?);

        let index = abi::little_endian_u64(data, span_of!(RawDepositEvent, index))?;

        Ok(Self {
            data: DepositData {
                pubkey,
                creator_address,
                withdrawal_credentials,
                amount,
                signature,
                init_tx_hash: mined.transaction_hash,
            },
            index,
            block_number: mined.block_number,
        })
    }
}

impl DepositEvent {
    /// Keccak-256 hash of `DepositEvent(bytes,bytes,bytes,bytes,bytes,bytes)`.
    pub const TOPIC: H256 = H256(hex!(
        "9690c6325860650852f0f0bd0e7d47145a3d0c2c5c92cba852bad61c02928b09"
    ));

    pub const LENGTH: usize = size_of::<RawDepositEvent>();

    /// Encodes the event the way the staking contract does.
    #[must_use]
    pub fn encode_data(data: &DepositData, index: DepositIndex) -> Vec<u8> {
        let mut bytes = vec![0; Self::LENGTH];

        for (head, length, size) in arguments() {
            abi::write_word(&mut bytes, head, length.start);
            abi::write_word(&mut bytes, length, size);
        }

        bytes[span_of!(RawDepositEvent, pubkey)].copy_from_slice(data.pubkey.as_bytes());
        bytes[span_of!(RawDepositEvent, creator_address)]
            .copy_from_slice(data.creator_address.as_bytes());
        bytes[span_of!(RawDepositEvent, withdrawal_credentials)]
            .copy_from_slice(data.withdrawal_credentials.as_bytes());
        bytes[span_of!(RawDepositEvent, amount)].copy_from_slice(&data.amount.to_le_bytes());
        bytes[span_of!(RawDepositEvent, signature)].copy_from_slice(data.signature.as_bytes());
        bytes[span_of!(RawDepositEvent, index)].copy_from_slice(&index.to_le_bytes());

        bytes
    }
}

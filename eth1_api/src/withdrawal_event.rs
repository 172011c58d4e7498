// `WithdrawalRequestEvent(bytes pubkey, bytes creator_address, bytes validator_index,
// bytes amount, bytes epoch)`.
//
// `epoch` may be empty, in which case the data ends after its length word.

use core::ops::Range;

use anyhow::{Error as AnyhowError, Result};
use hex_literal::hex;
use memoffset::span_of;
use static_assertions::assert_eq_size;
use types::{
    containers::Withdrawal,
    primitives::{
        Epoch, ExecutionAddress, ExecutionBlockNumber, ExecutionTransactionHash, Gwei,
        PublicKeyBytes, ValidatorIndex, H256,
    },
};

use crate::{
    abi::{self, EvmWord},
    log::Log,
};

#[repr(C)]
struct RawWithdrawalRequestEvent {
    _pubkey_offset: EvmWord,
    _creator_address_offset: EvmWord,
    _validator_index_offset: EvmWord,
    _amount_offset: EvmWord,
    _epoch_offset: EvmWord,
    _pubkey_length: EvmWord,
    pubkey: PublicKeyBytes,
    _pubkey_padding: [u8; 16],
    _creator_address_length: EvmWord,
    creator_address: ExecutionAddress,
    _creator_address_padding: [u8; 12],
    _validator_index_length: EvmWord,
    validator_index: ValidatorIndex,
    _validator_index_padding: [u8; 24],
    _amount_length: EvmWord,
    amount: Gwei,
    _amount_padding: [u8; 24],
    _epoch_length: EvmWord,
    epoch: Epoch,
    _epoch_padding: [u8; 24],
}

assert_eq_size!(RawWithdrawalRequestEvent, [EvmWord; 16]);

fn fixed_arguments() -> [(Range<usize>, Range<usize>, usize); 4] {
    [
        (
            span_of!(RawWithdrawalRequestEvent, _pubkey_offset),
            span_of!(RawWithdrawalRequestEvent, _pubkey_length),
            size_of::<PublicKeyBytes>(),
        ),
        (
            span_of!(RawWithdrawalRequestEvent, _creator_address_offset),
            span_of!(RawWithdrawalRequestEvent, _creator_address_length),
            size_of::<ExecutionAddress>(),
        ),
        (
            span_of!(RawWithdrawalRequestEvent, _validator_index_offset),
            span_of!(RawWithdrawalRequestEvent, _validator_index_length),
            size_of::<ValidatorIndex>(),
        ),
        (
            span_of!(RawWithdrawalRequestEvent, _amount_offset),
            span_of!(RawWithdrawalRequestEvent, _amount_length),
            size_of::<Gwei>(),
        ),
    ]
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct WithdrawalRequestEvent {
    pub pubkey: PublicKeyBytes,
    pub creator_address: ExecutionAddress,
    pub validator_index: ValidatorIndex,
    pub amount: Gwei,
    pub epoch: Option<Epoch>,
    pub block_number: ExecutionBlockNumber,
    pub transaction_hash: ExecutionTransactionHash,
}

impl TryFrom<&Log> for WithdrawalRequestEvent {
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
            span_of!(RawWithdrawalRequestEvent, _epoch_offset),
            span_of!(RawWithdrawalRequestEvent, _epoch_length),
            epoch_size,
        )?;

        let epoch = if has_epoch {
            Some(abi::little_endian_u64(
                data,
                span_of!(RawWithdrawalRequestEvent, epoch),
            )?)
        } else {
            None
        };

        Ok(Self {
            pubkey: PublicKeyBytes::from_slice(abi::slice(
                data,
                span_of!(RawWithdrawalRequestEvent, pubkey),
            )?),
            creator_address: ExecutionAddress::from_slice(abi::slice(
                data,
                span_of!(RawWithdrawalRequestEvent, creator_address),
            )?),
            validator_index: abi::little_endian_u64(
                data,
                span_of!(RawWithdrawalRequestEvent, validator_index),
            )?,
            amount: abi::little_endian_u64(data, span_of!(RawWithdrawalRequestEvent, amount))?,
            epoch,
            block_number: mined.block_number,
            transaction_hash: mined.transaction_hash,
        })
    }
}

impl WithdrawalRequestEvent {
    /// Keccak-256 hash of `WithdrawalRequestEvent(bytes,bytes,bytes,bytes,bytes)`.
    pub const TOPIC: H256 = H256(hex!(
        "8177b848f3f508103546f1ada109c21f5e54a426536323ed2cab90a2c225945b"
    ));

    pub const LENGTH: usize = size_of::<RawWithdrawalRequestEvent>();

    const LENGTH_WITHOUT_EPOCH: usize = Self::LENGTH - size_of::<EvmWord>();

    /// Pool entry for the request. Requests for past epochs are due at `current_epoch`.
    #[must_use]
    pub fn withdrawal(&self, current_epoch: Epoch) -> Withdrawal {
        Withdrawal {
            epoch: self.epoch.unwrap_or_default().max(current_epoch),
            validator_index: self.validator_index,
            amount: self.amount,
            init_tx_hash: self.transaction_hash,
        }
    }

    #[must_use]
    pub fn encode_data(
        pubkey: PublicKeyBytes,
        creator_address: ExecutionAddress,
        validator_index: ValidatorIndex,
        amount: Gwei,
        epoch: Option<Epoch>,
    ) -> Vec<u8> {
        let length = if epoch.is_some() {
            Self::LENGTH
        } else {
            Self::LENGTH_WITHOUT_EPOCH
        };

        let mut bytes = vec![0; length];

        for (head, length, size) in fixed_arguments() {
            abi::write_word(&mut bytes, head, length.start);
            abi::write_word(&mut bytes, length, size);
        }

        let epoch_length = span_of!(RawWithdrawalRequestEvent, _epoch_length);

        abi::write_word(
            &mut bytes,
            span_of!(RawWithdrawalRequestEvent, _epoch_offset),
            epoch_length.start,
        );

        bytes[span_of!(RawWithdrawalRequestEvent, pubkey)].copy_from_slice(pubkey.as_bytes());
        bytes[span_of!(RawWithdrawalRequestEvent, creator_address)]
            .copy_from_slice(creator_address.as_bytes());
        bytes[span_of!(RawWithdrawalRequestEvent, validator_index)]
            .copy_from_slice(&validator_index.to_le_bytes());
        bytes[span_of!(RawWithdrawalRequestEvent, amount)].copy_from_slice(&amount.to_le_bytes());

        if let Some(epoch) = epoch {
            abi::write_word(&mut bytes, epoch_length, size_of::<Epoch>());
            bytes[span_of!(RawWithdrawalRequestEvent, epoch)]
                .copy_from_slice(&epoch.to_le_bytes());
        }

        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::test_support;

    fn withdrawal_log(epoch: Option<Epoch>) -> Log {
        let data = WithdrawalRequestEvent::encode_data(
            PublicKeyBytes::repeat_byte(0xaa),
            ExecutionAddress::repeat_byte(0x11),
            9,
            1_000_000_000,
            epoch,
        );

        test_support::mined(WithdrawalRequestEvent::TOPIC, data)
    }

    #[test]
    fn decodes_encoded_event() -> Result<()> {
        let event = WithdrawalRequestEvent::try_from(&withdrawal_log(Some(12)))?;

        assert_eq!(event.validator_index, 9);
        assert_eq!(event.amount, 1_000_000_000);
        assert_eq!(event.epoch, Some(12));
        assert_eq!(event.transaction_hash, H256::repeat_byte(0xcc));

        Ok(())
    }

    #[test]
    fn withdrawal_is_never_due_before_current_epoch() -> Result<()> {
        let requested = WithdrawalRequestEvent::try_from(&withdrawal_log(Some(12)))?;
        let unspecified = WithdrawalRequestEvent::try_from(&withdrawal_log(None))?;

        assert_eq!(requested.withdrawal(10).epoch, 12);
        assert_eq!(requested.withdrawal(15).epoch, 15);
        assert_eq!(unspecified.withdrawal(10).epoch, 10);
        assert_eq!(
            unspecified.withdrawal(10).init_tx_hash,
            H256::repeat_byte(0xcc),
        );

        Ok(())
    }

    #[test]
    fn truncated_data_is_rejected() {
        let mut log = withdrawal_log(None);
        log.data.pop();

        WithdrawalRequestEvent::try_from(&log).expect_err("truncated data should be rejected");
    }
}

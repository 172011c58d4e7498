//! Deterministic keys and deposits for tests and local networks.

use anyhow::{Error, Result};
use blst::min_pk::SecretKey;
use helper_functions::{misc, signing};
use hex_literal::hex;
use num_bigint::BigUint;
use types::{
    config::Config,
    containers::{DepositData, DepositMessage},
    primitives::{ExecutionAddress, Gwei, PublicKeyBytes, ValidatorIndex},
};

/// <https://github.com/ethereum/eth2.0-pm/tree/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start#pubkeyprivkey-generation>
///
/// Encoded in binary to avoid parsing a decimal string at runtime.
const CURVE_ORDER: &[u8] =
    &hex!("73eda753299d7d483339d80809a1d80553bda402fffe5bfeffffffff00000001");

const SECRET_KEY_SIZE: usize = 32;

/// <https://github.com/ethereum/eth2.0-pm/tree/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start#pubkeyprivkey-generation>
pub fn secret_key(validator_index: ValidatorIndex) -> Result<SecretKey> {
    let index_hash = hashing::hash_bytes(hashing::uint_chunk(validator_index).as_bytes());
    let curve_order = BigUint::from_bytes_be(CURVE_ORDER);
    let secret_key_uint = BigUint::from_bytes_le(index_hash.as_bytes()) % &curve_order;
    let unpadded = secret_key_uint.to_bytes_be();

    let mut padded = [0; SECRET_KEY_SIZE];
    padded[SECRET_KEY_SIZE - unpadded.len()..].copy_from_slice(&unpadded);

    SecretKey::from_bytes(&padded)
        .map_err(|error| Error::msg(format!("invalid interop secret key: {error:?}")))
}

#[must_use]
pub fn public_key(secret_key: &SecretKey) -> PublicKeyBytes {
    PublicKeyBytes(secret_key.sk_to_pk().compress())
}

/// Signed deposit for the interop validator with index `validator_index`.
///
/// Creator and transaction hash are derived from the index so that deposits are distinct.
pub fn deposit_data(
    config: &Config,
    validator_index: ValidatorIndex,
    amount: Gwei,
) -> Result<DepositData> {
    let secret_key = secret_key(validator_index)?;
    let pubkey = public_key(&secret_key);

    let message = DepositMessage {
        pubkey,
        withdrawal_credentials: misc::bls_withdrawal_credentials(pubkey),
        amount,
    };

    Ok(DepositData {
        pubkey,
        creator_address: ExecutionAddress::from_low_u64_be(validator_index),
        withdrawal_credentials: message.withdrawal_credentials,
        amount,
        signature: signing::sign_deposit_message(config, &message, &secret_key),
        init_tx_hash: hashing::hash_bytes(&validator_index.to_le_bytes()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curve_order_matches_standard() {
        assert_eq!(
            BigUint::from_bytes_be(CURVE_ORDER).to_string(),
            "52435875175126190479447740508185965837690552500527637822603658699938581184513",
        );
    }

    // <https://github.com/ethereum/eth2.0-pm/blob/b7c76e7a9d036ce73ca6aa0b7065db92f7728f41/interop/mocked_start/keygen_10_validators.yaml>
    #[test]
    fn keypairs_match_standard() -> Result<()> {
        let expected_keypairs = [
            (
                hex!("25295f0d1d592a90b333e26e85149708208e9f8e8bc18f6c77bd62f8ad7a6866"),
                hex!("a99a76ed7796f7be22d5b7e85deeb7c5677e88e511e0b337618f8c4eb61349b4bf2d153f649f7b53359fe8b94a38e44c"),
            ),
            (
                hex!("51d0b65185db6989ab0b560d6deed19c7ead0e24b9b6372cbecb1f26bdfad000"),
                hex!("b89bebc699769726a318c8e9971bd3171297c61aea4a6578a7a4f94b547dcba5bac16a89108b6b6a1fe3695d1a874a0b"),
            ),
            (
                hex!("315ed405fafe339603932eebe8dbfd650ce5dafa561f6928664c75db85f97857"),
                hex!("a3a32b0f8b4ddb83f1a0a853d81dd725dfe577d4f4c3db8ece52ce2b026eca84815c1a7e8e92a4de3d755733bf7e4a9b"),
            ),
        ];

        for ((secret_key_bytes, public_key_bytes), validator_index) in
            expected_keypairs.into_iter().zip(0..)
        {
            let actual = secret_key(validator_index)?;

            assert_eq!(actual.to_bytes(), secret_key_bytes);
            assert_eq!(public_key(&actual), PublicKeyBytes(public_key_bytes));
        }

        Ok(())
    }

    #[test]
    fn deposit_data_is_signed_for_config() -> Result<()> {
        let config = Config::minimal();
        let data = deposit_data(&config, 3, config.max_effective_balance)?;

        assert!(signing::verify_deposit_signature(
            &config,
            &data.message(),
            data.signature,
        ));

        assert_ne!(
            data.init_tx_hash,
            deposit_data(&config, 4, config.max_effective_balance)?.init_tx_hash,
        );

        Ok(())
    }
}

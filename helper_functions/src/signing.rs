use blst::{
    min_pk::{PublicKey, SecretKey, Signature},
    BLST_ERROR,
};
use types::{
    config::Config,
    consts::DOMAIN_DEPOSIT,
    containers::DepositMessage,
    primitives::{SignatureBytes, H256},
};

use crate::misc;

pub const DOMAIN_SEPARATION_TAG: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_POP_";

// > Fork-agnostic domain since deposits are valid across forks
#[must_use]
pub fn deposit_signing_root(config: &Config, message: &DepositMessage) -> H256 {
    let domain = misc::compute_domain(config, DOMAIN_DEPOSIT, None, None);
    misc::compute_signing_root(message, domain)
}

/// Returns `false` for malformed keys and signatures as well as for signatures that do not verify.
#[must_use]
pub fn verify_deposit_signature(
    config: &Config,
    message: &DepositMessage,
    signature: SignatureBytes,
) -> bool {
    let Ok(public_key) = PublicKey::key_validate(message.pubkey.as_bytes()) else {
        return false;
    };

    let Ok(signature) = Signature::uncompress(signature.as_bytes()) else {
        return false;
    };

    let signing_root = deposit_signing_root(config, message);

    let result = signature.verify(
        true,
        signing_root.as_bytes(),
        DOMAIN_SEPARATION_TAG,
        &[],
        &public_key,
        false,
    );

    result == BLST_ERROR::BLST_SUCCESS
}

#[must_use]
pub fn sign_deposit_message(
    config: &Config,
    message: &DepositMessage,
    secret_key: &SecretKey,
) -> SignatureBytes {
    let signing_root = deposit_signing_root(config, message);
    let signature = secret_key.sign(signing_root.as_bytes(), DOMAIN_SEPARATION_TAG, &[]);
    SignatureBytes(signature.compress())
}

use core::{
    fmt::{Binary, Display, LowerExp, LowerHex, Octal, Pointer, UpperExp, UpperHex},
    ops::Deref,
};
use std::path::PathBuf;

use anyhow::{ensure, Context as _, Result};
use jwt_simple::{
    algorithms::{HS256Key, MACLike as _},
    claims::Claims,
    prelude::Duration,
};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde::{Deserialize, Serialize};
use static_assertions::assert_not_impl_any;
use thiserror::Error;
use zeroize::Zeroizing;

#[cfg(test)]
use derive_more::Debug;

const JWT_SECRET_MIN_SIZE: usize = 32;
const TOKEN_LIFETIME_SECONDS: u64 = 60;

#[derive(Clone, Default, Debug)]
pub struct Options {
    pub secret_path: Option<PathBuf>,
    pub id: Option<String>,
    pub version: Option<String>,
}

#[derive(Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct JwtClaims {
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    clv: Option<String>,
}

/// Bearer token source for authenticated execution endpoints.
#[derive(Default)]
#[cfg_attr(test, derive(Debug))]
pub struct Auth {
    secret: Option<Secret>,
    id: Option<String>,
    version: Option<String>,
}

assert_not_impl_any! {
    Auth:

    Clone,
    Copy,
    Deref,
    ToOwned,

    Binary,
    Display,
    LowerExp,
    LowerHex,
    Octal,
    Pointer,
    UpperExp,
    UpperHex,

    Serialize,
}

impl Auth {
    pub fn new(options: Options) -> Result<Self> {
        let Options {
            secret_path,
            id,
            version,
        } = options;

        let secret = secret_path
            .map(|path| {
                let contents = fs_err::read(&path).map(Zeroizing::new)?;
                Secret::from_hex(contents.as_slice())
                    .with_context(|| format!("failed to load JWT secret from {}", path.display()))
            })
            .transpose()?;

        Ok(Self {
            secret,
            id,
            version,
        })
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.secret.is_some()
    }

    /// Returns an `Authorization` header with a freshly issued token if a secret is configured.
    pub fn headers(&self) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        let Some(secret) = &self.secret else {
            return Ok(headers);
        };

        let custom_claims = JwtClaims {
            id: self.id.clone(),
            clv: self.version.clone(),
        };

        let lifetime = Duration::from_secs(TOKEN_LIFETIME_SECONDS);
        let claims = Claims::with_custom_claims(custom_claims, lifetime);
        let token = Zeroizing::new(secret.key.authenticate(claims)?);
        let bearer = Zeroizing::new(format!("Bearer {}", token.as_str()));

        let mut value = HeaderValue::from_str(bearer.as_str())?;
        value.set_sensitive(true);

        headers.insert(AUTHORIZATION, value);

        Ok(headers)
    }
}

#[cfg_attr(test, derive(Debug))]
#[cfg_attr(test, debug("[REDACTED]"))]
struct Secret {
    key: HS256Key,
}

assert_not_impl_any! {
    Secret:

    Clone,
    Copy,
    Deref,
    ToOwned,

    Binary,
    Display,
    LowerExp,
    LowerHex,
    Octal,
    Pointer,
    UpperExp,
    UpperHex,

    Serialize,
}

impl Secret {
    fn from_hex(contents: &[u8]) -> Result<Self> {
        let digits = contents.trim_ascii();
        let digits = digits.strip_prefix(b"0x").unwrap_or(digits);

        let bytes = hex::decode(digits)
            .map(Zeroizing::new)
            .context(SecretError::NotHex)?;

        ensure!(
            bytes.len() >= JWT_SECRET_MIN_SIZE,
            SecretError::TooShort { size: bytes.len() },
        );

        Ok(Self {
            key: HS256Key::from_bytes(bytes.as_slice()),
        })
    }
}

#[derive(Debug, Error)]
#[cfg_attr(test, derive(PartialEq, Eq))]
enum SecretError {
    #[error("JWT secret is not hexadecimal")]
    NotHex,
    #[error("JWT secret has {size} bytes but must have at least {JWT_SECRET_MIN_SIZE}")]
    TooShort { size: usize },
}

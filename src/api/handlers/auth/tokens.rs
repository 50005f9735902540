//! JWT codec for access and refresh tokens.
//!
//! Access and refresh tokens are signed with distinct secrets so one can never
//! be replayed as the other. Refresh tokens additionally carry a `jti` that
//! keys the rotation ledger.

use anyhow::{Context, Result};
use chrono::Utc;
use jsonwebtoken::{
    decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation,
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

use super::types::Role;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub email: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<Uuid>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token")]
    Invalid,
}

pub struct TokenCodec {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    #[must_use]
    pub fn new(
        access_secret: &SecretString,
        refresh_secret: &SecretString,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.expose_secret().as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.expose_secret().as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    pub fn sign_access(&self, sub: Uuid, email: &str, role: Role) -> Result<String> {
        self.sign(&self.access_encoding, self.access_ttl, sub, email, role, None)
    }

    pub fn sign_refresh(&self, sub: Uuid, email: &str, role: Role, jti: Uuid) -> Result<String> {
        self.sign(
            &self.refresh_encoding,
            self.refresh_ttl,
            sub,
            email,
            role,
            Some(jti),
        )
    }

    fn sign(
        &self,
        key: &EncodingKey,
        ttl: Duration,
        sub: Uuid,
        email: &str,
        role: Role,
        jti: Option<Uuid>,
    ) -> Result<String> {
        let now = Utc::now();
        let ttl = chrono::Duration::from_std(ttl).context("token TTL out of range")?;
        let claims = Claims {
            sub,
            email: email.to_string(),
            role,
            iat: now.timestamp(),
            exp: (now + ttl).timestamp(),
            jti,
        };
        encode(&Header::new(Algorithm::HS256), &claims, key).context("failed to sign token")
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        Self::verify(&self.access_decoding, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        Self::verify(&self.refresh_decoding, token)
    }

    fn verify(key: &DecodingKey, token: &str) -> Result<Claims, TokenError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        match decode::<Claims>(token, key, &validation) {
            Ok(data) => Ok(data.claims),
            Err(err) => match err.kind() {
                ErrorKind::ExpiredSignature => Err(TokenError::Expired),
                _ => Err(TokenError::Invalid),
            },
        }
    }

    #[must_use]
    pub const fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }
}

//! Shared helpers for auth handlers.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use axum::http::HeaderMap;
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    // Lazy is fine here, the pattern is a compile-time constant.
    #[allow(clippy::unwrap_used)]
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap()
});

pub(super) fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub(super) fn valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// At least 8 characters, at least one letter and one digit, no whitespace.
pub(super) fn valid_password(password: &str) -> bool {
    password.len() >= 8
        && !password.chars().any(char::is_whitespace)
        && password.chars().any(|c| c.is_ascii_alphabetic())
        && password.chars().any(|c| c.is_ascii_digit())
}

/// Uniform six-digit code in `[100000, 999999)`.
pub(super) fn generate_verification_code() -> String {
    rand::thread_rng().gen_range(100_000..999_999).to_string()
}

/// SHA-256 digest of a raw token. Only digests are persisted.
pub(super) fn hash_token(token: &str) -> Vec<u8> {
    Sha256::digest(token.as_bytes()).to_vec()
}

pub(super) fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow::anyhow!("failed to hash password: {err}"))?;
    Ok(hash.to_string())
}

pub(super) fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow::anyhow!("malformed password hash: {err}"))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// True for PostgreSQL unique-constraint violations (SQLSTATE 23505).
pub(super) fn is_unique_violation(err: &sqlx::Error) -> bool {
    if let sqlx::Error::Database(db_err) = err {
        return db_err.code().as_deref() == Some("23505");
    }
    false
}

/// Client IP for rate limiting, from proxy headers. Returns `None` when the
/// service is reached directly without a trusted proxy in front.
pub(super) fn extract_client_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get("x-forwarded-for") {
        if let Ok(value) = forwarded.to_str() {
            if let Some(first) = value.split(',').next() {
                let first = first.trim();
                if !first.is_empty() {
                    return Some(first.to_string());
                }
            }
        }
    }

    headers
        .get("x-real-ip")
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

pub(super) fn extract_bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?;
    let value = header.to_str().ok()?;
    value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderValue;

    #[test]
    fn normalize_email_trims_and_lowercases() {
        assert_eq!(normalize_email("  Alice@Example.COM "), "alice@example.com");
    }

    #[test]
    fn valid_email_rejects_garbage() {
        assert!(valid_email("alice@example.com"));
        assert!(valid_email("a.b+c@sub.example.io"));
        assert!(!valid_email("alice"));
        assert!(!valid_email("alice@example"));
        assert!(!valid_email("al ice@example.com"));
        assert!(!valid_email("@example.com"));
    }

    #[test]
    fn valid_password_requires_letter_and_digit() {
        assert!(valid_password("passw0rd"));
        assert!(valid_password("aVeryLong1Password"));
        assert!(!valid_password("short1a"));
        assert!(!valid_password("onlyletters"));
        assert!(!valid_password("12345678"));
        assert!(!valid_password("has space1"));
    }

    #[test]
    fn verification_code_is_six_digits() {
        for _ in 0..100 {
            let code = generate_verification_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.chars().next(), Some('0'));
        }
    }

    #[test]
    fn hash_token_is_stable() {
        let a = hash_token("some-token");
        let b = hash_token("some-token");
        let c = hash_token("other-token");
        assert_eq!(a.len(), 32);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn password_hash_round_trip() -> Result<()> {
        let hash = hash_password("passw0rd")?;
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("passw0rd", &hash)?);
        assert!(!verify_password("wrongpass1", &hash)?);
        Ok(())
    }

    #[test]
    fn verify_password_rejects_malformed_hash() {
        assert!(verify_password("passw0rd", "not-a-hash").is_err());
    }

    #[test]
    fn client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.9, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("203.0.113.9"));

        headers.remove("x-forwarded-for");
        assert_eq!(extract_client_ip(&headers).as_deref(), Some("198.51.100.2"));

        headers.remove("x-real-ip");
        assert_eq!(extract_client_ip(&headers), None);
    }

    #[test]
    fn bearer_token_extraction() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer abc.def.ghi"),
        );
        assert_eq!(extract_bearer_token(&headers), Some("abc.def.ghi"));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("bearer xyz"),
        );
        assert_eq!(extract_bearer_token(&headers), Some("xyz"));

        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Basic abc"),
        );
        assert_eq!(extract_bearer_token(&headers), None);

        headers.remove(axum::http::header::AUTHORIZATION);
        assert_eq!(extract_bearer_token(&headers), None);
    }
}

//! Authentication endpoints.
//!
//! Flow: `register` stores a pending signup and mails a six-digit code;
//! `verify-email` turns the pending signup into a verified user and starts a
//! session; `login` checks credentials; `refresh` rotates the single-use
//! refresh token; `logout` revokes; `me` returns the profile behind a Bearer
//! access token.

pub(crate) mod error;
pub(crate) mod login;
pub(crate) mod logout;
pub(crate) mod me;
mod rate_limit;
pub(crate) mod refresh;
pub(crate) mod register;
mod session;
mod state;
mod storage;
mod tokens;
pub(crate) mod types;
mod utils;
pub(crate) mod verify_email;

#[cfg(test)]
mod tests;

pub use error::AuthError;
pub use rate_limit::{NoopRateLimiter, RateLimiter, WindowRateLimiter};
pub use state::{AuthConfig, AuthState};
pub use tokens::TokenCodec;

pub(crate) use storage::{backfill_verified_at, spawn_token_sweeper};

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use storage::UserRecord;
use types::{TokenPair, UserProfile};
use utils::hash_token;

/// Sign an access/refresh pair for the user and persist the refresh token's
/// digest under the given `jti`.
async fn issue_token_pair(
    pool: &PgPool,
    state: &AuthState,
    user: &UserRecord,
    jti: Uuid,
) -> Result<TokenPair> {
    let codec = state.codec();
    let access_token = codec.sign_access(user.id, &user.email, user.role)?;
    let refresh_token = codec.sign_refresh(user.id, &user.email, user.role, jti)?;

    let ttl = chrono::Duration::from_std(codec.refresh_ttl()).context("refresh TTL out of range")?;
    let expires_at = Utc::now() + ttl;

    storage::insert_refresh_token(pool, user.id, jti, &hash_token(&refresh_token), expires_at)
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

fn user_profile(user: &UserRecord) -> UserProfile {
    UserProfile {
        id: user.id.to_string(),
        email: user.email.clone(),
        first_name: user.first_name.clone(),
        last_name: user.last_name.clone(),
        role: user.role,
        email_verified: user.verified_at.is_some(),
    }
}

#[cfg(test)]
fn test_state() -> Result<std::sync::Arc<AuthState>> {
    use crate::api::mail::MailClient;
    use secrecy::SecretString;
    use std::sync::Arc;
    use std::time::Duration;

    let codec = TokenCodec::new(
        &SecretString::from("access-secret-with-enough-entropy!!"),
        &SecretString::from("refresh-secret-with-enough-entropy!"),
        Duration::from_secs(900),
        Duration::from_secs(604_800),
    );
    let mailer = MailClient::new("http://localhost:4600".to_string())?;
    let config = AuthConfig::new("http://localhost:5173".to_string());
    Ok(Arc::new(AuthState::new(
        config,
        codec,
        mailer,
        Arc::new(NoopRateLimiter),
    )))
}

#[cfg(test)]
fn test_pool() -> Result<PgPool> {
    use sqlx::postgres::PgPoolOptions;

    // Lazy pool, never connects; used only for handler paths that return
    // before touching the database.
    PgPoolOptions::new()
        .connect_lazy("postgres://localhost/woodtech_auth_test")
        .context("failed to build lazy pool")
}

//! Database access for users, pending verifications and the refresh-token
//! ledger.
//!
//! Raw refresh tokens are never stored, only their SHA-256 digests. Rotation
//! keeps history: a rotated token is marked revoked and linked to its
//! successor through `replaced_by` rather than deleted.

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::sleep;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use super::types::Role;
use super::utils::is_unique_violation;

#[derive(Debug, Clone)]
pub(super) struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
    pub verified_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub(super) struct PendingVerification {
    pub email: String,
    pub password_hash: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug)]
pub(super) struct RefreshTokenRecord {
    pub user_id: Uuid,
    pub token_hash: Vec<u8>,
    pub expires_at: DateTime<Utc>,
    pub revoked: bool,
}

/// Outcome of inserting a user when a concurrent insert may win the unique
/// email index.
#[derive(Debug)]
pub(super) enum InsertUserOutcome {
    Created(UserRecord),
    Conflict,
}

fn user_from_row(row: &PgRow) -> Result<UserRecord> {
    let role: String = row.get("role");
    let role = Role::parse(&role).ok_or_else(|| anyhow!("unknown user role: {role}"))?;
    Ok(UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        role,
        verified_at: row.get("verified_at"),
    })
}

pub(super) async fn lookup_user_by_email(
    pool: &PgPool,
    email: &str,
) -> Result<Option<UserRecord>> {
    let query = "SELECT id, email, password_hash, first_name, last_name, role, verified_at \
                 FROM users WHERE email = $1";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );

    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up user by email")?;

    row.as_ref().map(user_from_row).transpose()
}

pub(super) async fn lookup_user_by_id(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>> {
    let query = "SELECT id, email, password_hash, first_name, last_name, role, verified_at \
                 FROM users WHERE id = $1";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );

    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up user by id")?;

    row.as_ref().map(user_from_row).transpose()
}

/// Create a verified user from a completed pending verification. A concurrent
/// signup can win the unique email index; that surfaces as `Conflict` rather
/// than an error.
pub(super) async fn insert_verified_user(
    pool: &PgPool,
    pending: &PendingVerification,
) -> Result<InsertUserOutcome> {
    let query = "INSERT INTO users (email, password_hash, first_name, last_name, verified_at) \
                 VALUES ($1, $2, $3, $4, NOW()) \
                 RETURNING id, email, password_hash, first_name, last_name, role, verified_at";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    let result = sqlx::query(query)
        .bind(&pending.email)
        .bind(&pending.password_hash)
        .bind(&pending.first_name)
        .bind(&pending.last_name)
        .fetch_one(pool)
        .instrument(span)
        .await;

    match result {
        Ok(row) => Ok(InsertUserOutcome::Created(user_from_row(&row)?)),
        Err(err) if is_unique_violation(&err) => Ok(InsertUserOutcome::Conflict),
        Err(err) => Err(err).context("failed to insert user"),
    }
}

pub(super) async fn mark_user_verified(pool: &PgPool, id: Uuid) -> Result<Option<UserRecord>> {
    let query = "UPDATE users SET verified_at = NOW(), updated_at = NOW() WHERE id = $1 \
                 RETURNING id, email, password_hash, first_name, last_name, role, verified_at";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );

    let row = sqlx::query(query)
        .bind(id)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to mark user verified")?;

    row.as_ref().map(user_from_row).transpose()
}

/// Remove a stale unverified user so the email can be registered again.
/// Refresh tokens go with it via the foreign key cascade.
pub(super) async fn delete_user(pool: &PgPool, id: Uuid) -> Result<()> {
    let query = "DELETE FROM users WHERE id = $1";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );

    sqlx::query(query)
        .bind(id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete user")?;

    Ok(())
}

/// Accounts created before verification existed have no `verified_at`. Treat
/// them as verified once, at startup.
pub(crate) async fn backfill_verified_at(pool: &PgPool) -> Result<u64> {
    let query = "UPDATE users SET verified_at = created_at, updated_at = NOW() \
                 WHERE verified_at IS NULL";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );

    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to backfill verified_at")?;

    Ok(result.rows_affected())
}

/// Upsert keyed on email: re-registering replaces the previous code, password
/// and expiry in one statement, so there is no read-then-write race.
pub(super) async fn upsert_pending_verification(
    pool: &PgPool,
    pending: &PendingVerification,
) -> Result<()> {
    let query = "INSERT INTO pending_verifications \
                 (email, password_hash, first_name, last_name, code, expires_at) \
                 VALUES ($1, $2, $3, $4, $5, $6) \
                 ON CONFLICT (email) DO UPDATE SET \
                 password_hash = EXCLUDED.password_hash, \
                 first_name = EXCLUDED.first_name, \
                 last_name = EXCLUDED.last_name, \
                 code = EXCLUDED.code, \
                 expires_at = EXCLUDED.expires_at, \
                 created_at = NOW()";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    sqlx::query(query)
        .bind(&pending.email)
        .bind(&pending.password_hash)
        .bind(&pending.first_name)
        .bind(&pending.last_name)
        .bind(&pending.code)
        .bind(pending.expires_at)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to upsert pending verification")?;

    Ok(())
}

pub(super) async fn lookup_pending_verification(
    pool: &PgPool,
    email: &str,
) -> Result<Option<PendingVerification>> {
    let query = "SELECT email, password_hash, first_name, last_name, code, expires_at \
                 FROM pending_verifications WHERE email = $1";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );

    let row = sqlx::query(query)
        .bind(email)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up pending verification")?;

    Ok(row.map(|row| PendingVerification {
        email: row.get("email"),
        password_hash: row.get("password_hash"),
        first_name: row.get("first_name"),
        last_name: row.get("last_name"),
        code: row.get("code"),
        expires_at: row.get("expires_at"),
    }))
}

pub(super) async fn delete_pending_verification(pool: &PgPool, email: &str) -> Result<()> {
    let query = "DELETE FROM pending_verifications WHERE email = $1";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );

    sqlx::query(query)
        .bind(email)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete pending verification")?;

    Ok(())
}

pub(super) async fn insert_refresh_token(
    pool: &PgPool,
    user_id: Uuid,
    jti: Uuid,
    token_hash: &[u8],
    expires_at: DateTime<Utc>,
) -> Result<()> {
    let query = "INSERT INTO refresh_tokens (user_id, jti, token_hash, expires_at) \
                 VALUES ($1, $2, $3, $4)";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "INSERT",
        db.statement = query
    );

    sqlx::query(query)
        .bind(user_id)
        .bind(jti)
        .bind(token_hash)
        .bind(expires_at)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to insert refresh token")?;

    Ok(())
}

pub(super) async fn lookup_refresh_token(
    pool: &PgPool,
    jti: Uuid,
) -> Result<Option<RefreshTokenRecord>> {
    let query = "SELECT user_id, token_hash, expires_at, revoked \
                 FROM refresh_tokens WHERE jti = $1";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "SELECT",
        db.statement = query
    );

    let row = sqlx::query(query)
        .bind(jti)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to look up refresh token")?;

    Ok(row.map(|row| RefreshTokenRecord {
        user_id: row.get("user_id"),
        token_hash: row.get("token_hash"),
        expires_at: row.get("expires_at"),
        revoked: row.get("revoked"),
    }))
}

/// Conditionally claim a rotation. Returns false when another request already
/// rotated or revoked this token, so concurrent refreshes of the same token
/// resolve to exactly one winner.
pub(super) async fn claim_refresh_rotation(
    pool: &PgPool,
    jti: Uuid,
    replaced_by: Uuid,
) -> Result<bool> {
    let query = "UPDATE refresh_tokens SET revoked = TRUE, replaced_by = $2 \
                 WHERE jti = $1 AND NOT revoked RETURNING id";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );

    let row = sqlx::query(query)
        .bind(jti)
        .bind(replaced_by)
        .fetch_optional(pool)
        .instrument(span)
        .await
        .context("failed to claim refresh rotation")?;

    Ok(row.is_some())
}

pub(super) async fn revoke_refresh_token(pool: &PgPool, jti: Uuid) -> Result<()> {
    let query = "UPDATE refresh_tokens SET revoked = TRUE WHERE jti = $1";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );

    sqlx::query(query)
        .bind(jti)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh token")?;

    Ok(())
}

pub(super) async fn revoke_refresh_token_by_hash(pool: &PgPool, token_hash: &[u8]) -> Result<()> {
    let query = "UPDATE refresh_tokens SET revoked = TRUE WHERE token_hash = $1";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );

    sqlx::query(query)
        .bind(token_hash)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke refresh token by hash")?;

    Ok(())
}

pub(super) async fn revoke_user_refresh_tokens(pool: &PgPool, user_id: Uuid) -> Result<()> {
    let query = "UPDATE refresh_tokens SET revoked = TRUE WHERE user_id = $1";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "UPDATE",
        db.statement = query
    );

    sqlx::query(query)
        .bind(user_id)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to revoke user refresh tokens")?;

    Ok(())
}

async fn delete_expired_refresh_tokens(pool: &PgPool) -> Result<u64> {
    let query = "DELETE FROM refresh_tokens WHERE expires_at < NOW()";

    let span = info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = "DELETE",
        db.statement = query
    );

    let result = sqlx::query(query)
        .execute(pool)
        .instrument(span)
        .await
        .context("failed to delete expired refresh tokens")?;

    Ok(result.rows_affected())
}

/// Background sweeper for the refresh-token ledger. Expired rows are useless
/// for rotation auditing, so they are deleted outright on a fixed cadence.
pub(crate) fn spawn_token_sweeper(pool: PgPool, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            sleep(interval).await;
            match delete_expired_refresh_tokens(&pool).await {
                Ok(0) => {}
                Ok(deleted) => info!("Swept {deleted} expired refresh tokens"),
                Err(err) => error!("Refresh token sweep failed: {err:#}"),
            }
        }
    })
}

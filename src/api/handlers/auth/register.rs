//! POST /auth/register

use anyhow::Context;
use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::error::{AuthError, ErrorBody};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::{
    delete_user, lookup_user_by_email, upsert_pending_verification, PendingVerification,
};
use super::types::{Envelope, RegisterAccepted, RegisterRequest};
use super::utils::{
    extract_client_ip, generate_verification_code, hash_password, normalize_email, valid_email,
    valid_password,
};

fn clean_name(name: Option<String>) -> Result<Option<String>, AuthError> {
    let Some(name) = name else {
        return Ok(None);
    };
    let name = name.trim();
    if name.is_empty() {
        return Ok(None);
    }
    if name.chars().count() > 100 {
        return Err(AuthError::validation("Name must be at most 100 characters"));
    }
    Ok(Some(name.to_string()))
}

#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 202, description = "Verification code sent", body = Envelope<RegisterAccepted>),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 409, description = "Email is already registered", body = ErrorBody),
        (status = 429, description = "Too many requests", body = ErrorBody),
        (status = 500, description = "Internal server error", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn register(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RegisterRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::validation("Invalid email address"));
    }
    if !valid_password(&request.password) {
        return Err(AuthError::validation(
            "Password must contain at least one letter and one number",
        ));
    }
    let first_name = clean_name(request.first_name)?;
    let last_name = clean_name(request.last_name)?;

    let ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(ip.as_deref(), RateLimitAction::Register)
        == RateLimitDecision::Limited
    {
        return Err(AuthError::rate_limited(
            "Too many requests, please try again later",
        ));
    }

    if let Some(existing) = lookup_user_by_email(&pool, &email).await? {
        if existing.verified_at.is_some() {
            return Err(AuthError::conflict("Email is already registered"));
        }
        // Stale unverified account, clean it up so this signup can proceed.
        // The foreign key cascade removes any refresh tokens with it.
        delete_user(&pool, existing.id).await?;
        info!(email = %email, "Removed stale unverified user");
    }

    let code = generate_verification_code();
    let ttl = chrono::Duration::from_std(auth_state.config().verification_ttl())
        .context("verification TTL out of range")?;
    let pending = PendingVerification {
        email: email.clone(),
        password_hash: hash_password(&request.password)?,
        first_name,
        last_name,
        code,
        expires_at: Utc::now() + ttl,
    };

    upsert_pending_verification(&pool, &pending).await?;

    auth_state
        .mailer()
        .send_verification_code(&pending.email, pending.first_name.as_deref(), &pending.code)
        .await?;

    info!(email = %email, "Registration pending verification");

    let body = Envelope::new(RegisterAccepted {
        status: "pending_verification".to_string(),
        email,
    });
    Ok((StatusCode::ACCEPTED, Json(body)).into_response())
}

//! POST /auth/verify-email

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::{AuthError, ErrorBody};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::refresh_cookie;
use super::state::AuthState;
use super::storage::{
    delete_pending_verification, insert_verified_user, lookup_pending_verification,
    lookup_user_by_email, mark_user_verified, InsertUserOutcome,
};
use super::types::{Envelope, SessionResponse, VerifyEmailRequest};
use super::utils::{extract_client_ip, normalize_email, valid_email};
use super::{issue_token_pair, user_profile};

#[utoipa::path(
    post,
    path = "/auth/verify-email",
    request_body = VerifyEmailRequest,
    responses(
        (status = 200, description = "Email verified, session started", body = Envelope<SessionResponse>),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 401, description = "Verification failed", body = ErrorBody),
        (status = 409, description = "Email is already registered", body = ErrorBody),
        (status = 429, description = "Too many requests", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn verify_email(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<VerifyEmailRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::validation("Invalid email address"));
    }
    if request.code.len() != 6 {
        return Err(AuthError::validation("Verification code must be 6 digits"));
    }

    let ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(ip.as_deref(), RateLimitAction::VerifyEmail)
        == RateLimitDecision::Limited
    {
        return Err(AuthError::rate_limited(
            "Too many requests, please try again later",
        ));
    }

    let existing = lookup_user_by_email(&pool, &email).await?;
    if let Some(user) = &existing {
        if user.verified_at.is_some() {
            return Err(AuthError::authentication(
                "Account already verified. Please log in.",
            ));
        }
    }

    let Some(pending) = lookup_pending_verification(&pool, &email).await? else {
        return Err(AuthError::authentication("Verification not requested"));
    };
    if pending.expires_at < Utc::now() {
        delete_pending_verification(&pool, &email).await?;
        return Err(AuthError::authentication("Verification code expired"));
    }
    if pending.code != request.code {
        // Pending entry stays so the user can retry with the right code.
        return Err(AuthError::authentication("Invalid verification code"));
    }

    let user = match existing {
        Some(unverified) => mark_user_verified(&pool, unverified.id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("user disappeared during verification"))?,
        None => match insert_verified_user(&pool, &pending).await? {
            InsertUserOutcome::Created(user) => user,
            InsertUserOutcome::Conflict => {
                delete_pending_verification(&pool, &email).await?;
                return Err(AuthError::conflict("Email is already registered"));
            }
        },
    };

    delete_pending_verification(&pool, &email).await?;

    let tokens = issue_token_pair(&pool, &auth_state, &user, Uuid::new_v4()).await?;

    info!(email = %email, "Email verified");

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = refresh_cookie(&auth_state, &tokens.refresh_token) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    let body = Envelope::new(SessionResponse {
        user: user_profile(&user),
        tokens,
    });
    Ok((StatusCode::OK, response_headers, Json(body)).into_response())
}

//! POST /auth/refresh

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use sqlx::PgPool;
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use super::error::{AuthError, ErrorBody};
use super::issue_token_pair;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::{extract_refresh_cookie, refresh_cookie};
use super::state::AuthState;
use super::storage::{
    claim_refresh_rotation, lookup_refresh_token, lookup_user_by_id, revoke_refresh_token,
};
use super::types::{Envelope, RefreshRequest, TokenPair};
use super::utils::{extract_client_ip, hash_token};

#[utoipa::path(
    post,
    path = "/auth/refresh",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Tokens rotated", body = Envelope<TokenPair>),
        (status = 400, description = "Refresh token is required", body = ErrorBody),
        (status = 401, description = "Refresh token rejected", body = ErrorBody),
        (status = 429, description = "Too many requests", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn refresh(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<RefreshRequest>>,
) -> Result<Response, AuthError> {
    let body_token = payload
        .and_then(|Json(request)| request.refresh_token)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty());

    let Some(raw) = body_token.or_else(|| extract_refresh_cookie(&headers)) else {
        return Err(AuthError::validation("Refresh token is required"));
    };

    let ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(ip.as_deref(), RateLimitAction::Refresh)
        == RateLimitDecision::Limited
    {
        return Err(AuthError::rate_limited(
            "Too many requests, please try again later",
        ));
    }

    let tokens = match rotate(&pool, &auth_state, &raw).await {
        Ok(tokens) => tokens,
        // Storage or signing failures must not leak through a credential
        // endpoint; normalize them to a generic rejection.
        Err(AuthError::Internal(err)) => {
            warn!("Refresh rotation failed: {err:#}");
            return Err(AuthError::authentication("Invalid refresh token"));
        }
        Err(err) => return Err(err),
    };

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = refresh_cookie(&auth_state, &tokens.refresh_token) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    let body = Envelope::new(tokens);
    Ok((StatusCode::OK, response_headers, Json(body)).into_response())
}

async fn rotate(pool: &PgPool, state: &AuthState, raw: &str) -> Result<TokenPair, AuthError> {
    let claims = state
        .codec()
        .verify_refresh(raw)
        .map_err(|_| AuthError::authentication("Invalid refresh token"))?;
    let jti = claims
        .jti
        .ok_or_else(|| AuthError::authentication("Invalid refresh token"))?;

    let Some(stored) = lookup_refresh_token(pool, jti).await? else {
        return Err(AuthError::authentication("Refresh token revoked"));
    };
    if stored.revoked {
        return Err(AuthError::authentication("Refresh token revoked"));
    }
    if stored.expires_at <= Utc::now() {
        revoke_refresh_token(pool, jti).await?;
        return Err(AuthError::authentication("Refresh token expired"));
    }
    if stored.token_hash != hash_token(raw) {
        // A valid signature with the wrong digest means the ledger entry was
        // issued for a different token. Kill it.
        revoke_refresh_token(pool, jti).await?;
        return Err(AuthError::authentication("Refresh token mismatch"));
    }

    let Some(user) = lookup_user_by_id(pool, stored.user_id).await? else {
        return Err(AuthError::authentication("User not found"));
    };

    // Claim the rotation before issuing the successor so two concurrent
    // refreshes of the same token resolve to one winner.
    let new_jti = Uuid::new_v4();
    if !claim_refresh_rotation(pool, jti, new_jti).await? {
        return Err(AuthError::authentication("Refresh token revoked"));
    }

    let tokens = issue_token_pair(pool, state, &user, new_jti).await?;
    Ok(tokens)
}

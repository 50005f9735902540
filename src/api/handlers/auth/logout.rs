//! POST /auth/logout
//!
//! Idempotent: always clears the cookie and returns 204, whatever state the
//! tokens were in.

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;

use super::error::AuthError;
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::{clear_refresh_cookie, extract_refresh_cookie};
use super::state::AuthState;
use super::storage::{revoke_refresh_token_by_hash, revoke_user_refresh_tokens};
use super::types::LogoutRequest;
use super::utils::{extract_bearer_token, extract_client_ip, hash_token};

#[utoipa::path(
    post,
    path = "/auth/logout",
    request_body = LogoutRequest,
    responses(
        (status = 204, description = "Session terminated")
    ),
    tag = "auth"
)]
pub async fn logout(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LogoutRequest>>,
) -> Result<Response, AuthError> {
    let ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(ip.as_deref(), RateLimitAction::Logout)
        == RateLimitDecision::Limited
    {
        return Err(AuthError::rate_limited(
            "Too many requests, please try again later",
        ));
    }

    let refresh_token = payload
        .and_then(|Json(request)| request.refresh_token)
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .or_else(|| extract_refresh_cookie(&headers));

    if let Some(token) = refresh_token {
        revoke_refresh_token_by_hash(&pool, &hash_token(&token)).await?;
    }

    // A valid access token widens the logout to every session of the user.
    if let Some(bearer) = extract_bearer_token(&headers) {
        if let Ok(claims) = auth_state.codec().verify_access(bearer) {
            revoke_user_refresh_tokens(&pool, claims.sub).await?;
            info!(user_id = %claims.sub, "Revoked all sessions on logout");
        }
    }

    let mut response_headers = HeaderMap::new();
    if let Ok(cookie) = clear_refresh_cookie(&auth_state) {
        response_headers.insert(SET_COOKIE, cookie);
    }

    Ok((StatusCode::NO_CONTENT, response_headers).into_response())
}

#[cfg(test)]
mod tests {
    use super::super::{test_pool, test_state};
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn logout_without_tokens_still_succeeds() -> Result<()> {
        let state = test_state()?;
        let response = logout(
            HeaderMap::new(),
            Extension(test_pool()?),
            Extension(state),
            None,
        )
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;

        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let cookie = response
            .headers()
            .get(SET_COOKIE)
            .and_then(|value| value.to_str().ok())
            .unwrap_or_default();
        assert!(cookie.starts_with("rt=;"));
        assert!(cookie.contains("Max-Age=0"));
        Ok(())
    }

    #[tokio::test]
    async fn logout_ignores_invalid_bearer_token() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            axum::http::HeaderValue::from_static("Bearer not.a.jwt"),
        );
        let response = logout(
            headers,
            Extension(test_pool()?),
            Extension(test_state()?),
            None,
        )
        .await
        .map_err(|err| anyhow::anyhow!("{err}"))?;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        Ok(())
    }
}

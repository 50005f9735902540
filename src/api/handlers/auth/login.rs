//! POST /auth/login

use axum::{
    extract::Extension,
    http::{header::SET_COOKIE, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use super::error::{AuthError, ErrorBody};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::session::refresh_cookie;
use super::state::AuthState;
use super::storage::{lookup_pending_verification, lookup_user_by_email};
use super::types::{Envelope, LoginRequest, SessionResponse};
use super::utils::{extract_client_ip, normalize_email, valid_email, verify_password};
use super::{issue_token_pair, user_profile};

#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Session started", body = Envelope<SessionResponse>),
        (status = 400, description = "Invalid payload", body = ErrorBody),
        (status = 401, description = "Invalid credentials or unverified email", body = ErrorBody),
        (status = 429, description = "Too many requests", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn login(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
    payload: Option<Json<LoginRequest>>,
) -> Result<Response, AuthError> {
    let Some(Json(request)) = payload else {
        return Err(AuthError::validation("Missing payload"));
    };

    let email = normalize_email(&request.email);
    if !valid_email(&email) {
        return Err(AuthError::validation("Invalid email address"));
    }
    if request.password.len() < 8 {
        return Err(AuthError::validation(
            "Password must be at least 8 characters",
        ));
    }

    let ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(ip.as_deref(), RateLimitAction::Login)
        == RateLimitDecision::Limited
    {
        return Err(AuthError::rate_limited(
            "Too many requests, please try again later",
        ));
    }

    let user = lookup_user_by_email(&pool, &email).await?;
    let pending = lookup_pending_verification(&pool, &email).await?;

    // A pending signup means the email was claimed but never verified; say so
    // even before the credential check.
    if pending.is_some() {
        return Err(AuthError::authentication("Email not verified"));
    }
    let Some(user) = user else {
        return Err(AuthError::authentication("Invalid credentials"));
    };
    if user.verified_at.is_none() {
        return Err(AuthError::authentication("Email not verified"));
    }
    if !verify_password(&request.password, &user.password_hash)? {
        return Err(AuthError::authentication("Invalid credentials"));
    }

    let tokens = issue_token_pair(&pool, &auth_state, &user, Uuid::new_v4()).await?;

    info!(email = %email, "User logged in");

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

#[cfg(test)]
mod tests {
    use super::super::{test_pool, test_state};
    use super::*;
    use anyhow::Result;

    #[tokio::test]
    async fn login_requires_payload() -> Result<()> {
        let result = login(
            HeaderMap::new(),
            Extension(test_pool()?),
            Extension(test_state()?),
            None,
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_invalid_email() -> Result<()> {
        let result = login(
            HeaderMap::new(),
            Extension(test_pool()?),
            Extension(test_state()?),
            Some(Json(LoginRequest {
                email: "not-an-email".to_string(),
                password: "passw0rd".to_string(),
            })),
        )
        .await;
        assert!(matches!(result, Err(AuthError::Validation { .. })));
        Ok(())
    }

    #[tokio::test]
    async fn login_rejects_short_password_without_db_lookup() -> Result<()> {
        let result = login(
            HeaderMap::new(),
            Extension(test_pool()?),
            Extension(test_state()?),
            Some(Json(LoginRequest {
                email: "alice@example.com".to_string(),
                password: "short".to_string(),
            })),
        )
        .await;
        match result {
            Err(AuthError::Validation { message, .. }) => {
                assert_eq!(message, "Password must be at least 8 characters");
            }
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }
}

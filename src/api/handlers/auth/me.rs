//! GET /auth/me

use axum::{
    extract::Extension,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use sqlx::PgPool;
use std::sync::Arc;

use super::error::{AuthError, ErrorBody};
use super::rate_limit::{RateLimitAction, RateLimitDecision};
use super::state::AuthState;
use super::storage::lookup_user_by_id;
use super::types::{Envelope, UserProfile};
use super::user_profile;
use super::utils::{extract_bearer_token, extract_client_ip};

#[utoipa::path(
    get,
    path = "/auth/me",
    responses(
        (status = 200, description = "Authenticated user profile", body = Envelope<UserProfile>),
        (status = 401, description = "Missing or invalid access token", body = ErrorBody)
    ),
    tag = "auth"
)]
pub async fn me(
    headers: HeaderMap,
    pool: Extension<PgPool>,
    auth_state: Extension<Arc<AuthState>>,
) -> Result<Response, AuthError> {
    let ip = extract_client_ip(&headers);
    if auth_state
        .rate_limiter()
        .check_ip(ip.as_deref(), RateLimitAction::Me)
        == RateLimitDecision::Limited
    {
        return Err(AuthError::rate_limited(
            "Too many requests, please try again later",
        ));
    }

    let Some(bearer) = extract_bearer_token(&headers) else {
        return Err(AuthError::authentication("Unauthorized"));
    };

    let claims = auth_state
        .codec()
        .verify_access(bearer)
        .map_err(|_| AuthError::authentication("Unauthorized"))?;

    let Some(user) = lookup_user_by_id(&pool, claims.sub).await? else {
        return Err(AuthError::authentication("User not found"));
    };

    let body = Envelope::new(user_profile(&user));
    Ok((StatusCode::OK, Json(body)).into_response())
}

#[cfg(test)]
mod tests {
    use super::super::{test_pool, test_state};
    use super::*;
    use anyhow::Result;
    use axum::http::HeaderValue;

    #[tokio::test]
    async fn me_requires_bearer_token() -> Result<()> {
        let result = me(
            HeaderMap::new(),
            Extension(test_pool()?),
            Extension(test_state()?),
        )
        .await;
        match result {
            Err(AuthError::Authentication(message)) => assert_eq!(message, "Unauthorized"),
            other => panic!("unexpected result: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn me_rejects_garbage_token() -> Result<()> {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer not.a.jwt"),
        );
        let result = me(headers, Extension(test_pool()?), Extension(test_state()?)).await;
        assert!(matches!(result, Err(AuthError::Authentication(_))));
        Ok(())
    }
}

//! Refresh cookie handling.
//!
//! The refresh token rides in an HttpOnly cookie scoped to the refresh route,
//! so browser scripts never see it and it is only sent where it is needed.
//! Non-browser clients may pass it in the request body instead.

use axum::http::header::HeaderValue;
use axum::http::HeaderMap;

use super::state::AuthState;

pub(super) const REFRESH_COOKIE_NAME: &str = "rt";
const REFRESH_COOKIE_PATH: &str = "/auth/refresh";

pub(super) fn refresh_cookie(
    state: &AuthState,
    token: &str,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let max_age = state.codec().refresh_ttl().as_secs();
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}={token}; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Strict; Max-Age={max_age}"
    );
    if state.config().refresh_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

pub(super) fn clear_refresh_cookie(
    state: &AuthState,
) -> Result<HeaderValue, axum::http::header::InvalidHeaderValue> {
    let mut cookie = format!(
        "{REFRESH_COOKIE_NAME}=; Path={REFRESH_COOKIE_PATH}; HttpOnly; SameSite=Strict; Max-Age=0"
    );
    if state.config().refresh_cookie_secure() {
        cookie.push_str("; Secure");
    }
    HeaderValue::from_str(&cookie)
}

/// Pull the refresh token out of the `Cookie` header, if present.
pub(super) fn extract_refresh_cookie(headers: &HeaderMap) -> Option<String> {
    let header = headers.get(axum::http::header::COOKIE)?;
    let value = header.to_str().ok()?;
    for pair in value.split(';') {
        let mut parts = pair.trim().splitn(2, '=');
        if parts.next() == Some(REFRESH_COOKIE_NAME) {
            // A bare `rt` attribute has no value; keep scanning.
            let Some(token) = parts.next() else {
                continue;
            };
            let token = token.trim();
            if !token.is_empty() {
                return Some(token.to_string());
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::super::rate_limit::NoopRateLimiter;
    use super::super::state::AuthConfig;
    use super::super::tokens::TokenCodec;
    use super::*;
    use crate::api::mail::MailClient;
    use anyhow::Result;
    use axum::http::HeaderValue;
    use secrecy::SecretString;
    use std::sync::Arc;
    use std::time::Duration;

    fn state(frontend: &str) -> Result<AuthState> {
        let codec = TokenCodec::new(
            &SecretString::from("access-secret-with-enough-entropy!!"),
            &SecretString::from("refresh-secret-with-enough-entropy!"),
            Duration::from_secs(900),
            Duration::from_secs(604_800),
        );
        let mailer = MailClient::new("http://localhost:4600".to_string())?;
        Ok(AuthState::new(
            AuthConfig::new(frontend.to_string()),
            codec,
            mailer,
            Arc::new(NoopRateLimiter),
        ))
    }

    #[test]
    fn refresh_cookie_attributes() -> Result<()> {
        let state = state("http://localhost:5173")?;
        let cookie = refresh_cookie(&state, "tok123")?;
        assert_eq!(
            cookie.to_str()?,
            "rt=tok123; Path=/auth/refresh; HttpOnly; SameSite=Strict; Max-Age=604800"
        );
        Ok(())
    }

    #[test]
    fn refresh_cookie_secure_for_https_frontend() -> Result<()> {
        let state = state("https://shop.example.com")?;
        let cookie = refresh_cookie(&state, "tok123")?;
        assert!(cookie.to_str()?.ends_with("; Secure"));
        Ok(())
    }

    #[test]
    fn clear_cookie_zeroes_max_age() -> Result<()> {
        let state = state("http://localhost:5173")?;
        let cookie = clear_refresh_cookie(&state)?;
        assert_eq!(
            cookie.to_str()?,
            "rt=; Path=/auth/refresh; HttpOnly; SameSite=Strict; Max-Age=0"
        );
        Ok(())
    }

    #[test]
    fn extracts_refresh_cookie_among_others() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("theme=dark; rt=abc.def; session=xyz"),
        );
        assert_eq!(extract_refresh_cookie(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn bare_attribute_does_not_stop_the_scan() {
        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("rt; theme=dark; rt=abc.def"),
        );
        assert_eq!(extract_refresh_cookie(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn missing_or_empty_cookie_is_none() {
        let headers = HeaderMap::new();
        assert_eq!(extract_refresh_cookie(&headers), None);

        let mut headers = HeaderMap::new();
        headers.insert(
            axum::http::header::COOKIE,
            HeaderValue::from_static("rt=; theme=dark"),
        );
        assert_eq!(extract_refresh_cookie(&headers), None);
    }
}

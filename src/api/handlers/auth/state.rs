//! Shared state for auth handlers.

use std::sync::Arc;
use std::time::Duration;

use crate::api::mail::MailClient;

use super::rate_limit::RateLimiter;
use super::tokens::TokenCodec;

const DEFAULT_VERIFICATION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Clone, Debug)]
pub struct AuthConfig {
    frontend_base_url: String,
    verification_ttl: Duration,
    cookie_secure: Option<bool>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(frontend_base_url: String) -> Self {
        Self {
            frontend_base_url,
            verification_ttl: DEFAULT_VERIFICATION_TTL,
            cookie_secure: None,
        }
    }

    #[must_use]
    pub fn with_verification_ttl(mut self, ttl: Duration) -> Self {
        self.verification_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_cookie_secure(mut self, secure: Option<bool>) -> Self {
        self.cookie_secure = secure;
        self
    }

    #[must_use]
    pub fn frontend_base_url(&self) -> &str {
        &self.frontend_base_url
    }

    pub(super) fn verification_ttl(&self) -> Duration {
        self.verification_ttl
    }

    /// Explicit override wins, otherwise follow the frontend scheme.
    pub(super) fn refresh_cookie_secure(&self) -> bool {
        self.cookie_secure
            .unwrap_or_else(|| self.frontend_base_url.starts_with("https://"))
    }
}

pub struct AuthState {
    config: AuthConfig,
    codec: TokenCodec,
    mailer: MailClient,
    rate_limiter: Arc<dyn RateLimiter>,
}

impl AuthState {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        codec: TokenCodec,
        mailer: MailClient,
        rate_limiter: Arc<dyn RateLimiter>,
    ) -> Self {
        Self {
            config,
            codec,
            mailer,
            rate_limiter,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    pub(super) fn codec(&self) -> &TokenCodec {
        &self.codec
    }

    pub(super) fn mailer(&self) -> &MailClient {
        &self.mailer
    }

    pub(super) fn rate_limiter(&self) -> &dyn RateLimiter {
        self.rate_limiter.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = AuthConfig::new("http://localhost:5173".to_string());
        assert_eq!(config.verification_ttl(), Duration::from_secs(86_400));
        assert!(!config.refresh_cookie_secure());
    }

    #[test]
    fn cookie_secure_follows_frontend_scheme() {
        let config = AuthConfig::new("https://shop.example.com".to_string());
        assert!(config.refresh_cookie_secure());
    }

    #[test]
    fn cookie_secure_override_wins() {
        let config =
            AuthConfig::new("https://shop.example.com".to_string()).with_cookie_secure(Some(false));
        assert!(!config.refresh_cookie_secure());

        let config =
            AuthConfig::new("http://localhost:5173".to_string()).with_cookie_secure(Some(true));
        assert!(config.refresh_cookie_secure());
    }

    #[test]
    fn verification_ttl_override() {
        let config = AuthConfig::new("http://localhost:5173".to_string())
            .with_verification_ttl(Duration::from_secs(600));
        assert_eq!(config.verification_ttl(), Duration::from_secs(600));
    }
}

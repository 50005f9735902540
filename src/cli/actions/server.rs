use crate::api::{
    self,
    handlers::auth::{AuthConfig, AuthState, TokenCodec, WindowRateLimiter},
    mail::MailClient,
};
use anyhow::Result;
use secrecy::SecretString;
use std::{sync::Arc, time::Duration};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub dsn: String,
    pub access_token_secret: SecretString,
    pub refresh_token_secret: SecretString,
    pub access_token_ttl: Duration,
    pub refresh_token_ttl: Duration,
    pub verification_code_ttl: Duration,
    pub frontend_base_url: String,
    pub mail_service_url: String,
    pub cookie_secure: Option<bool>,
    pub rate_limit_window: Duration,
    pub rate_limit_max: u32,
    pub rate_limit_sensitive_max: u32,
}

/// Assemble the auth state from parsed arguments and hand off to the server.
///
/// # Errors
/// Returns an error if the mail client cannot be built or the server fails.
pub async fn execute(args: Args) -> Result<()> {
    let codec = TokenCodec::new(
        &args.access_token_secret,
        &args.refresh_token_secret,
        args.access_token_ttl,
        args.refresh_token_ttl,
    );

    let mailer = MailClient::new(args.mail_service_url)?;

    let rate_limiter = Arc::new(WindowRateLimiter::new(
        args.rate_limit_window,
        args.rate_limit_max,
        args.rate_limit_sensitive_max,
    ));

    let config = AuthConfig::new(args.frontend_base_url)
        .with_verification_ttl(args.verification_code_ttl)
        .with_cookie_secure(args.cookie_secure);

    let state = AuthState::new(config, codec, mailer, rate_limiter);

    api::new(args.port, args.dsn, state).await
}

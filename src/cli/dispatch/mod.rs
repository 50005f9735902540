//! Command-line argument dispatch and server initialization.
//!
//! This module parses validated CLI arguments and maps them to the appropriate
//! action, such as starting the API server with its full configuration state.

use crate::cli::actions::{server::Args, Action};
use crate::cli::commands::{service, tokens};
use anyhow::{Context, Result};
use secrecy::SecretString;
use std::time::Duration;

/// Map validated CLI matches to a server action.
///
/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    let port = matches.get_one::<u16>("port").copied().unwrap_or(4001);
    let dsn = matches
        .get_one::<String>("dsn")
        .cloned()
        .context("missing required argument: --dsn")?;

    let access_token_secret = matches
        .get_one::<String>(tokens::ARG_ACCESS_TOKEN_SECRET)
        .cloned()
        .with_context(|| {
            format!(
                "missing required argument: --{}",
                tokens::ARG_ACCESS_TOKEN_SECRET
            )
        })?;
    let refresh_token_secret = matches
        .get_one::<String>(tokens::ARG_REFRESH_TOKEN_SECRET)
        .cloned()
        .with_context(|| {
            format!(
                "missing required argument: --{}",
                tokens::ARG_REFRESH_TOKEN_SECRET
            )
        })?;

    let access_token_ttl = tokens::parse_ttl(
        matches
            .get_one::<String>(tokens::ARG_ACCESS_TOKEN_TTL)
            .map_or("15m", String::as_str),
    )
    .context("invalid --access-token-ttl")?;
    let refresh_token_ttl = tokens::parse_ttl(
        matches
            .get_one::<String>(tokens::ARG_REFRESH_TOKEN_TTL)
            .map_or("7d", String::as_str),
    )
    .context("invalid --refresh-token-ttl")?;

    let verification_code_ttl = Duration::from_secs(
        matches
            .get_one::<u64>(service::ARG_VERIFICATION_CODE_TTL)
            .copied()
            .unwrap_or(86_400),
    );
    let rate_limit_window = Duration::from_secs(
        matches
            .get_one::<u64>(service::ARG_RATE_LIMIT_WINDOW)
            .copied()
            .unwrap_or(60),
    );

    Ok(Action::Server(Args {
        port,
        dsn,
        access_token_secret: SecretString::from(access_token_secret),
        refresh_token_secret: SecretString::from(refresh_token_secret),
        access_token_ttl,
        refresh_token_ttl,
        verification_code_ttl,
        frontend_base_url: matches
            .get_one::<String>(service::ARG_FRONTEND_BASE_URL)
            .cloned()
            .unwrap_or_else(|| "http://localhost:5173".to_string()),
        mail_service_url: matches
            .get_one::<String>(service::ARG_MAIL_SERVICE_URL)
            .cloned()
            .unwrap_or_else(|| "http://localhost:4600".to_string()),
        cookie_secure: matches
            .get_one::<bool>(service::ARG_COOKIE_SECURE)
            .copied(),
        rate_limit_window,
        rate_limit_max: matches
            .get_one::<u32>(service::ARG_RATE_LIMIT_MAX)
            .copied()
            .unwrap_or(100),
        rate_limit_sensitive_max: matches
            .get_one::<u32>(service::ARG_RATE_LIMIT_SENSITIVE_MAX)
            .copied()
            .unwrap_or(5),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn builds_server_action_from_env() {
        temp_env::with_vars(
            [
                (
                    "WOODTECH_AUTH_DSN",
                    Some("postgres://user@localhost:5432/woodtech"),
                ),
                (
                    "WOODTECH_AUTH_ACCESS_TOKEN_SECRET",
                    Some("an-access-secret-of-sufficient-size!"),
                ),
                (
                    "WOODTECH_AUTH_REFRESH_TOKEN_SECRET",
                    Some("a-refresh-secret-of-sufficient-size!"),
                ),
                ("WOODTECH_AUTH_ACCESS_TOKEN_TTL", Some("5m")),
                ("WOODTECH_AUTH_REFRESH_TOKEN_TTL", Some("2w")),
                ("WOODTECH_AUTH_RATE_LIMIT_SENSITIVE_MAX", Some("10")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["woodtech-auth"]);
                let action = handler(&matches);
                assert!(action.is_ok());
                if let Ok(Action::Server(args)) = action {
                    assert_eq!(args.port, 4001);
                    assert_eq!(args.dsn, "postgres://user@localhost:5432/woodtech");
                    assert_eq!(
                        args.access_token_secret.expose_secret(),
                        "an-access-secret-of-sufficient-size!"
                    );
                    assert_eq!(args.access_token_ttl, Duration::from_secs(300));
                    assert_eq!(args.refresh_token_ttl, Duration::from_secs(1_209_600));
                    assert_eq!(args.verification_code_ttl, Duration::from_secs(86_400));
                    assert_eq!(args.rate_limit_window, Duration::from_secs(60));
                    assert_eq!(args.rate_limit_max, 100);
                    assert_eq!(args.rate_limit_sensitive_max, 10);
                    assert_eq!(args.cookie_secure, None);
                }
            },
        );
    }

    #[test]
    fn invalid_ttl_is_rejected() {
        temp_env::with_vars(
            [
                (
                    "WOODTECH_AUTH_DSN",
                    Some("postgres://user@localhost:5432/woodtech"),
                ),
                (
                    "WOODTECH_AUTH_ACCESS_TOKEN_SECRET",
                    Some("an-access-secret-of-sufficient-size!"),
                ),
                (
                    "WOODTECH_AUTH_REFRESH_TOKEN_SECRET",
                    Some("a-refresh-secret-of-sufficient-size!"),
                ),
                ("WOODTECH_AUTH_ACCESS_TOKEN_TTL", Some("soon")),
            ],
            || {
                let command = crate::cli::commands::new();
                let matches = command.get_matches_from(vec!["woodtech-auth"]);
                let result = handler(&matches);
                assert!(result.is_err());
                if let Err(err) = result {
                    assert!(err.to_string().contains("invalid --access-token-ttl"));
                }
            },
        );
    }
}

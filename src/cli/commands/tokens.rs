//! Token signing arguments: secrets and TTLs.

use anyhow::{bail, Context, Result};
use clap::{builder::ValueParser, Arg, Command};
use std::time::Duration;

pub const ARG_ACCESS_TOKEN_SECRET: &str = "access-token-secret";
pub const ARG_REFRESH_TOKEN_SECRET: &str = "refresh-token-secret";
pub const ARG_ACCESS_TOKEN_TTL: &str = "access-token-ttl";
pub const ARG_REFRESH_TOKEN_TTL: &str = "refresh-token-ttl";

const MIN_SECRET_LEN: usize = 32;

#[must_use]
pub fn validator_secret() -> ValueParser {
    ValueParser::from(
        move |secret: &str| -> std::result::Result<String, String> {
            if secret.len() < MIN_SECRET_LEN {
                return Err(format!(
                    "secret must be at least {MIN_SECRET_LEN} characters"
                ));
            }
            Ok(secret.to_string())
        },
    )
}

/// Parse a TTL like `900`, `15m`, `12h` or `7d` into a `Duration`.
/// A bare number means seconds.
///
/// # Errors
/// Returns an error for empty input, unknown suffixes or a zero duration.
pub fn parse_ttl(value: &str) -> Result<Duration> {
    let value = value.trim();
    if value.is_empty() {
        bail!("empty duration");
    }

    let (number, multiplier) = match value.chars().last() {
        Some('s') => (&value[..value.len() - 1], 1),
        Some('m') => (&value[..value.len() - 1], 60),
        Some('h') => (&value[..value.len() - 1], 3600),
        Some('d') => (&value[..value.len() - 1], 86_400),
        Some('w') => (&value[..value.len() - 1], 604_800),
        _ => (value, 1),
    };

    let number: u64 = number
        .trim()
        .parse()
        .with_context(|| format!("invalid duration: {value}"))?;
    if number == 0 {
        bail!("duration must be greater than zero: {value}");
    }

    let seconds = number
        .checked_mul(multiplier)
        .with_context(|| format!("duration too large: {value}"))?;
    Ok(Duration::from_secs(seconds))
}

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_SECRET)
                .long(ARG_ACCESS_TOKEN_SECRET)
                .help("HS256 secret for signing access tokens (min 32 chars)")
                .env("WOODTECH_AUTH_ACCESS_TOKEN_SECRET")
                .value_parser(validator_secret())
                .required(true),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_SECRET)
                .long(ARG_REFRESH_TOKEN_SECRET)
                .help("HS256 secret for signing refresh tokens (min 32 chars)")
                .env("WOODTECH_AUTH_REFRESH_TOKEN_SECRET")
                .value_parser(validator_secret())
                .required(true),
        )
        .arg(
            Arg::new(ARG_ACCESS_TOKEN_TTL)
                .long(ARG_ACCESS_TOKEN_TTL)
                .help("Access token lifetime (e.g. 900, 15m)")
                .env("WOODTECH_AUTH_ACCESS_TOKEN_TTL")
                .default_value("15m"),
        )
        .arg(
            Arg::new(ARG_REFRESH_TOKEN_TTL)
                .long(ARG_REFRESH_TOKEN_TTL)
                .help("Refresh token lifetime (e.g. 7d, 2w)")
                .env("WOODTECH_AUTH_REFRESH_TOKEN_TTL")
                .default_value("7d"),
        )
}

//! Service wiring arguments: frontend origin, mail service, verification and
//! rate-limit settings.

use clap::{Arg, Command};

pub const ARG_FRONTEND_BASE_URL: &str = "frontend-base-url";
pub const ARG_MAIL_SERVICE_URL: &str = "mail-service-url";
pub const ARG_COOKIE_SECURE: &str = "cookie-secure";
pub const ARG_VERIFICATION_CODE_TTL: &str = "verification-code-ttl-seconds";
pub const ARG_RATE_LIMIT_WINDOW: &str = "rate-limit-window-seconds";
pub const ARG_RATE_LIMIT_MAX: &str = "rate-limit-max";
pub const ARG_RATE_LIMIT_SENSITIVE_MAX: &str = "rate-limit-sensitive-max";

#[must_use]
pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_FRONTEND_BASE_URL)
                .long(ARG_FRONTEND_BASE_URL)
                .help("Frontend origin allowed by CORS")
                .env("WOODTECH_AUTH_FRONTEND_BASE_URL")
                .default_value("http://localhost:5173"),
        )
        .arg(
            Arg::new(ARG_MAIL_SERVICE_URL)
                .long(ARG_MAIL_SERVICE_URL)
                .help("Base URL of the mail service")
                .env("WOODTECH_AUTH_MAIL_SERVICE_URL")
                .default_value("http://localhost:4600"),
        )
        .arg(
            Arg::new(ARG_COOKIE_SECURE)
                .long(ARG_COOKIE_SECURE)
                .help("Force the Secure attribute on the refresh cookie (default: follow frontend scheme)")
                .env("WOODTECH_AUTH_COOKIE_SECURE")
                .value_parser(clap::value_parser!(bool)),
        )
        .arg(
            Arg::new(ARG_VERIFICATION_CODE_TTL)
                .long(ARG_VERIFICATION_CODE_TTL)
                .help("Seconds a verification code stays valid")
                .env("WOODTECH_AUTH_VERIFICATION_CODE_TTL_SECONDS")
                .default_value("86400")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_WINDOW)
                .long(ARG_RATE_LIMIT_WINDOW)
                .help("Rate limit window in seconds")
                .env("WOODTECH_AUTH_RATE_LIMIT_WINDOW_SECONDS")
                .default_value("60")
                .value_parser(clap::value_parser!(u64)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_MAX)
                .long(ARG_RATE_LIMIT_MAX)
                .help("Requests allowed per IP per window")
                .env("WOODTECH_AUTH_RATE_LIMIT_MAX")
                .default_value("100")
                .value_parser(clap::value_parser!(u32)),
        )
        .arg(
            Arg::new(ARG_RATE_LIMIT_SENSITIVE_MAX)
                .long(ARG_RATE_LIMIT_SENSITIVE_MAX)
                .help("Requests allowed per IP per window on register/login/verify")
                .env("WOODTECH_AUTH_RATE_LIMIT_SENSITIVE_MAX")
                .default_value("5")
                .value_parser(clap::value_parser!(u32)),
        )
}

//! # WoodTech Auth
//!
//! `woodtech-auth` is the authentication service for the WoodTech commerce
//! platform. It owns user credentials, signup email verification and JWT
//! session management; every other service only verifies access tokens.
//!
//! ## Signup flow
//!
//! Registration never creates an account directly. It stores a pending
//! verification (one per email, newest wins) and mails a six-digit code;
//! `POST /auth/verify-email` with that code creates the verified user and
//! starts a session. Codes expire after 24 hours by default.
//!
//! ## Sessions
//!
//! Sessions are a pair of HS256 JWTs signed with distinct secrets: a short
//! lived access token and a single-use refresh token. Refresh tokens carry a
//! `jti` tracked in a database ledger, and every refresh rotates the token,
//! marking the old row revoked and linking it to its successor. Only SHA-256
//! digests of refresh tokens are stored. Browsers hold the refresh token in
//! an HttpOnly cookie scoped to `/auth/refresh`.

pub mod api;
pub mod cli;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        // Should be a hex string (full SHA-1 is 40 chars, but could be short)
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}

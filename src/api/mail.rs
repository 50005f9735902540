//! Client for the platform mail service.

use anyhow::{bail, Context, Result};
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{info, info_span, Instrument};

const MAIL_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Clone, Debug)]
pub struct MailClient {
    base_url: String,
    client: Client,
}

#[derive(Serialize)]
struct VerificationMail<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    code: &'a str,
}

impl MailClient {
    pub fn new(base_url: String) -> Result<Self> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(MAIL_TIMEOUT)
            .build()
            .context("failed to build mail HTTP client")?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    /// Deliver the signup verification code. Errors propagate so registration
    /// fails loudly instead of leaving the user waiting for a mail that never
    /// arrives.
    pub(crate) async fn send_verification_code(
        &self,
        email: &str,
        name: Option<&str>,
        code: &str,
    ) -> Result<()> {
        let url = format!("{}/mail/verification", self.base_url);
        let span = info_span!(
            "mail.send",
            http.method = "POST",
            url = %url,
            template = "verification"
        );

        async {
            let response = self
                .client
                .post(&url)
                .json(&VerificationMail { email, name, code })
                .send()
                .await
                .context("failed to reach mail service")?;

            let status = response.status();
            if !status.is_success() {
                bail!("mail service returned {status}");
            }

            info!(email = %email, "Verification email sent");
            Ok(())
        }
        .instrument(span)
        .await
    }
}

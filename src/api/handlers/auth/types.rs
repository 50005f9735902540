//! Request/response types for auth endpoints.
//!
//! All JSON fields use camelCase to match the storefront client.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Success envelope wrapping every 2xx JSON body.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct Envelope<T> {
    pub success: bool,
    pub data: T,
}

impl<T> Envelope<T> {
    pub(crate) fn new(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub(super) fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Self::User),
            "admin" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Registration never creates the user directly; the account materializes on
/// `verify-email`.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct RegisterAccepted {
    pub status: String,
    pub email: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub code: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct LogoutRequest {
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Sanitized user view; the password hash never leaves the storage layer.
#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    pub role: Role,
    pub email_verified: bool,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(ToSchema, Serialize, Deserialize, Debug)]
pub struct SessionResponse {
    pub user: UserProfile,
    pub tokens: TokenPair,
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{Context, Result};

    #[test]
    fn envelope_wraps_data_with_success_flag() -> Result<()> {
        let envelope = Envelope::new(RegisterAccepted {
            status: "pending_verification".to_string(),
            email: "alice@example.com".to_string(),
        });
        let value = serde_json::to_value(&envelope)?;
        assert_eq!(value.get("success"), Some(&serde_json::json!(true)));
        let email = value
            .get("data")
            .and_then(|data| data.get("email"))
            .and_then(serde_json::Value::as_str)
            .context("missing email")?;
        assert_eq!(email, "alice@example.com");
        Ok(())
    }

    #[test]
    fn register_request_accepts_camel_case_names() -> Result<()> {
        let request: RegisterRequest = serde_json::from_value(serde_json::json!({
            "email": "alice@example.com",
            "password": "s3cretpass",
            "firstName": "Alice",
        }))?;
        assert_eq!(request.first_name.as_deref(), Some("Alice"));
        assert_eq!(request.last_name, None);
        Ok(())
    }

    #[test]
    fn user_profile_serializes_camel_case() -> Result<()> {
        let profile = UserProfile {
            id: "42".to_string(),
            email: "bob@example.com".to_string(),
            first_name: None,
            last_name: Some("Builder".to_string()),
            role: Role::User,
            email_verified: true,
        };
        let value = serde_json::to_value(&profile)?;
        assert_eq!(value.get("emailVerified"), Some(&serde_json::json!(true)));
        assert_eq!(value.get("role"), Some(&serde_json::json!("user")));
        assert!(value.get("firstName").is_none());
        assert_eq!(value.get("lastName"), Some(&serde_json::json!("Builder")));
        Ok(())
    }

    #[test]
    fn refresh_request_token_is_optional() -> Result<()> {
        let request: RefreshRequest = serde_json::from_value(serde_json::json!({}))?;
        assert_eq!(request.refresh_token, None);
        let request: RefreshRequest =
            serde_json::from_value(serde_json::json!({"refreshToken": "abc"}))?;
        assert_eq!(request.refresh_token.as_deref(), Some("abc"));
        Ok(())
    }

    #[test]
    fn role_parses_storage_format() {
        assert_eq!(Role::parse("user"), Some(Role::User));
        assert_eq!(Role::parse("admin"), Some(Role::Admin));
        assert_eq!(Role::parse("root"), None);
    }
}

//! Firebase Authentication via the Identity Toolkit REST API.

use reqwest::Response;

use crate::error::{FirebaseError, Result};
use crate::types::{
    ApiErrorBody, OobCodeRequest, SignUpRequest, SignUpResponse, UserRecord,
};

const BASE_URL: &str = "https://identitytoolkit.googleapis.com/v1";

#[derive(Clone)]
pub struct IdentityToolkit {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl IdentityToolkit {
    pub fn new(api_key: String) -> Self {
        Self::with_base_url(api_key, BASE_URL.to_string())
    }

    pub fn with_base_url(api_key: String, base_url: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create an email/password account.
    pub async fn create_user(&self, email: &str, password: &str) -> Result<UserRecord> {
        let url = format!("{}/accounts:signUp", self.base_url);
        let body = SignUpRequest {
            email,
            password,
            return_secure_token: false,
        };
        let resp = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?;
        let resp = check(resp).await?;

        let created: SignUpResponse = resp.json().await?;
        tracing::info!(uid = %created.local_id, "Created auth user");
        Ok(UserRecord {
            uid: created.local_id,
            email: created.email,
        })
    }

    /// Ask Firebase to mail a password-reset link to `email`.
    pub async fn send_password_reset_email(&self, email: &str) -> Result<()> {
        let url = format!("{}/accounts:sendOobCode", self.base_url);
        let body = OobCodeRequest {
            request_type: "PASSWORD_RESET",
            email,
        };
        let resp = self
            .client
            .post(&url)
            .query(&[("key", &self.api_key)])
            .json(&body)
            .send()
            .await?;
        check(resp).await?;
        tracing::info!("Password reset email requested");
        Ok(())
    }
}

/// Identity Toolkit errors carry a machine-readable code such as
/// `EMAIL_EXISTS` in `error.message`; surface that instead of the raw body.
async fn check(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|parsed| parsed.error.message)
        .unwrap_or(body);
    Err(FirebaseError::Api {
        status: status.as_u16(),
        message,
    })
}

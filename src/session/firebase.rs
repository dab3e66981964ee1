//! Identity Toolkit (Firebase Auth) REST provider.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{AuthGrant, IdentityProvider};
use crate::errors::AuthError;
use crate::models::Identity;

/// Provider error codes that mean "the user got something wrong".
const CREDENTIAL_ERRORS: &[&str] = &[
    "EMAIL_NOT_FOUND",
    "INVALID_PASSWORD",
    "INVALID_LOGIN_CREDENTIALS",
    "USER_DISABLED",
    "EMAIL_EXISTS",
    "INVALID_EMAIL",
    "WEAK_PASSWORD",
    "MISSING_PASSWORD",
    "INVALID_IDP_RESPONSE",
];

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordRequest<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct IdpRequest {
    post_body: String,
    request_uri: String,
    return_idp_credential: bool,
    return_secure_token: bool,
}

/// Form-encoded credential for `signInWithIdp`.
fn idp_post_body(provider_id: &str, access_token: &str) -> Result<String, AuthError> {
    serde_urlencoded::to_string([("access_token", access_token), ("providerId", provider_id)])
        .map_err(|e| {
            tracing::warn!("Failed to encode identity provider credential: {}", e);
            AuthError::ProviderError
        })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AccountResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    /// Seconds, as a decimal string
    #[serde(default)]
    expires_in: Option<String>,
}

impl AccountResponse {
    fn into_grant(self) -> AuthGrant {
        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());
        AuthGrant {
            identity: Identity {
                uid: self.local_id,
                display_name: non_empty(self.display_name),
                email: self.email.unwrap_or_default(),
                photo_url: non_empty(self.photo_url),
            },
            expires_in: self
                .expires_in
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs),
        }
    }
}

pub struct FirebaseIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl FirebaseIdentityProvider {
    pub fn new(base_url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key,
        }
    }

    fn endpoint(&self, action: &str) -> Result<String, AuthError> {
        let Some(key) = &self.api_key else {
            tracing::warn!("FIREBASE_API_KEY is not configured; sign-in unavailable");
            return Err(AuthError::ProviderError);
        };
        Ok(format!(
            "{}/v1/accounts:{}?key={}",
            self.base_url.trim_end_matches('/'),
            action,
            key
        ))
    }

    async fn call<B: Serialize + Sync>(
        &self,
        action: &str,
        body: &B,
    ) -> Result<AuthGrant, AuthError> {
        let url = self.endpoint(action)?;

        let response = self.http.post(url).json(body).send().await.map_err(|e| {
            tracing::warn!(action, "Identity provider unreachable: {}", e.without_url());
            AuthError::ProviderError
        })?;

        let status = response.status();
        let body: Value = response.json().await.map_err(|e| {
            tracing::warn!(
                action,
                %status,
                "Unreadable identity provider response: {}",
                e.without_url()
            );
            AuthError::ProviderError
        })?;

        if !status.is_success() {
            let error = classify(&body);
            tracing::debug!(action, %status, ?error, "Identity provider refused sign-in");
            return Err(error);
        }

        let account: AccountResponse = serde_json::from_value(body).map_err(|e| {
            tracing::warn!(action, "Unexpected identity provider response: {}", e);
            AuthError::ProviderError
        })?;

        Ok(account.into_grant())
    }
}

/// Map an Identity Toolkit error body to a classified error.
///
/// Messages look like `"INVALID_PASSWORD"` or `"WEAK_PASSWORD : Password should be..."`.
fn classify(body: &Value) -> AuthError {
    let code = body
        .get("error")
        .and_then(|e| e.get("message"))
        .and_then(Value::as_str)
        .and_then(|message| message.split(|c: char| c == ' ' || c == ':').next())
        .unwrap_or_default();

    if CREDENTIAL_ERRORS.contains(&code) {
        AuthError::InvalidCredentials
    } else {
        AuthError::ProviderError
    }
}

#[async_trait]
impl IdentityProvider for FirebaseIdentityProvider {
    async fn sign_in_with_oauth(
        &self,
        provider_id: &str,
        access_token: &str,
    ) -> Result<AuthGrant, AuthError> {
        let request = IdpRequest {
            post_body: idp_post_body(provider_id, access_token)?,
            request_uri: "http://localhost/".to_string(),
            return_idp_credential: true,
            return_secure_token: true,
        };
        self.call("signInWithIdp", &request).await
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<AuthGrant, AuthError> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        self.call("signInWithPassword", &request).await
    }

    async fn create_account(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError> {
        let request = PasswordRequest {
            email,
            password,
            return_secure_token: true,
        };
        self.call("signUp", &request).await
    }
}

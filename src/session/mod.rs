//! Session manager: tracks the signed-in identity and pushes changes to observers.
//!
//! A manager starts in [`SessionState::Unknown`] and resolves once the identity
//! provider answers. Observers hold a `watch` receiver, so feeds and the role gate
//! recompute as soon as the session changes.

mod firebase;

pub use firebase::FirebaseIdentityProvider;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::watch;

use crate::errors::AuthError;
use crate::models::{Identity, SessionState};

/// How a user signs in.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "method", rename_all = "camelCase")]
pub enum SignInMethod {
    /// Exchange an OAuth access token from a popup/redirect flow
    #[serde(rename = "oauth", rename_all = "camelCase")]
    OAuth {
        provider_id: String,
        access_token: String,
    },
    Password {
        email: String,
        password: String,
    },
    CreateAccount {
        email: String,
        password: String,
    },
}

impl SignInMethod {
    pub fn label(&self) -> &'static str {
        match self {
            SignInMethod::OAuth { .. } => "oauth",
            SignInMethod::Password { .. } => "password",
            SignInMethod::CreateAccount { .. } => "createAccount",
        }
    }
}

/// What the provider hands back on success.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthGrant {
    pub identity: Identity,
    /// Lifetime of the provider token, when reported
    pub expires_in: Option<Duration>,
}

/// External identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in_with_oauth(
        &self,
        provider_id: &str,
        access_token: &str,
    ) -> Result<AuthGrant, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
        -> Result<AuthGrant, AuthError>;

    async fn create_account(&self, email: &str, password: &str) -> Result<AuthGrant, AuthError>;
}

pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        let (state, _) = watch::channel(SessionState::Unknown);
        Self { provider, state }
    }

    pub fn current(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity().cloned()
    }

    /// Receiver notified on every session change.
    pub fn watch(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub async fn sign_in(&self, method: SignInMethod) -> Result<AuthGrant, AuthError> {
        let label = method.label();
        let result = match &method {
            SignInMethod::OAuth {
                provider_id,
                access_token,
            } => {
                self.provider
                    .sign_in_with_oauth(provider_id, access_token)
                    .await
            }
            SignInMethod::Password { email, password } => {
                self.provider.sign_in_with_password(email, password).await
            }
            SignInMethod::CreateAccount { email, password } => {
                self.provider.create_account(email, password).await
            }
        };

        match result {
            Ok(grant) => {
                tracing::info!(uid = %grant.identity.uid, method = label, "Signed in");
                self.state
                    .send_replace(SessionState::SignedIn(grant.identity.clone()));
                Ok(grant)
            }
            Err(e) => {
                tracing::warn!(method = label, "Sign-in failed: {}", e);
                // A failed first attempt still resolves the session
                self.state.send_if_modified(|state| {
                    if *state == SessionState::Unknown {
                        *state = SessionState::SignedOut;
                        true
                    } else {
                        false
                    }
                });
                Err(e)
            }
        }
    }

    /// Clear the identity. Idempotent: observers are only notified on an actual change.
    pub fn sign_out(&self) {
        let changed = self.state.send_if_modified(|state| {
            if *state == SessionState::SignedOut {
                false
            } else {
                *state = SessionState::SignedOut;
                true
            }
        });
        if changed {
            tracing::info!("Signed out");
        }
    }

    /// The provider token lapsed.
    pub fn expire(&self) {
        if self.state.borrow().identity().is_some() {
            tracing::info!("Session expired");
        }
        self.sign_out();
    }
}

//! Bearer-token sessions for the HTTP layer.
//!
//! Each successful sign-in gets its own [`SessionManager`], stored under a random
//! token. The middleware resolves that token into the request's session.

use std::collections::HashMap;
use std::sync::Arc;

use axum::{
    extract::Request,
    http::{header, HeaderMap, Uri},
    middleware::Next,
    response::{IntoResponse, Response},
};
use parking_lot::RwLock;
use uuid::Uuid;

use crate::errors::{AppError, AuthError};
use crate::session::{AuthGrant, IdentityProvider, SessionManager, SignInMethod};

/// Header carrying the session token when `Authorization` is unavailable.
pub const SESSION_HEADER: &str = "x-session-token";

/// Session of the authenticated request, set by [`session_auth_layer`].
#[derive(Clone)]
pub struct CurrentSession(pub Arc<SessionManager>);

/// A fresh sign-in.
pub struct NewSession {
    pub token: String,
    pub session: Arc<SessionManager>,
    pub grant: AuthGrant,
}

/// Live sessions by token.
pub struct Sessions {
    provider: Arc<dyn IdentityProvider>,
    entries: RwLock<HashMap<String, Arc<SessionManager>>>,
}

impl Sessions {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self {
            provider,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Sign in through the provider and register the session.
    ///
    /// When the provider reports a token lifetime, the session expires with it.
    pub async fn sign_in(self: &Arc<Self>, method: SignInMethod) -> Result<NewSession, AuthError> {
        let session = Arc::new(SessionManager::new(Arc::clone(&self.provider)));
        let grant = session.sign_in(method).await?;

        let token = Uuid::new_v4().simple().to_string();
        self.entries
            .write()
            .insert(token.clone(), Arc::clone(&session));
        tracing::debug!(active = self.active_count(), "Session registered");

        if let Some(ttl) = grant.expires_in {
            let sessions = Arc::clone(self);
            let token = token.clone();
            tokio::spawn(async move {
                tokio::time::sleep(ttl).await;
                sessions.expire(&token);
            });
        }

        Ok(NewSession {
            token,
            session,
            grant,
        })
    }

    pub fn get(&self, token: &str) -> Option<Arc<SessionManager>> {
        self.entries.read().get(token).cloned()
    }

    /// Session named by the request's token, if it is still live.
    pub fn resolve(&self, headers: &HeaderMap, uri: &Uri) -> Option<Arc<SessionManager>> {
        session_token(headers, uri).and_then(|token| self.get(&token))
    }

    /// Remove a session and notify its observers. Unknown tokens are a no-op.
    pub fn sign_out(&self, token: &str) -> bool {
        let removed = self.entries.write().remove(token);
        match removed {
            Some(session) => {
                session.sign_out();
                true
            }
            None => false,
        }
    }

    fn expire(&self, token: &str) {
        let removed = self.entries.write().remove(token);
        if let Some(session) = removed {
            session.expire();
        }
    }

    pub fn active_count(&self) -> usize {
        self.entries.read().len()
    }
}

/// Token from `Authorization: Bearer`, the session header, or `?token=` (WebSocket upgrades).
pub fn session_token(headers: &HeaderMap, uri: &Uri) -> Option<String> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.strip_prefix("Bearer "));

    let from_header = || {
        headers
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
    };

    let from_query = || {
        uri.query()?
            .split('&')
            .find_map(|pair| pair.strip_prefix("token="))
    };

    bearer
        .or_else(from_header)
        .or_else(from_query)
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

/// Session authentication layer: rejects requests without a live session.
pub async fn session_auth_layer(
    sessions: Arc<Sessions>,
    mut request: Request,
    next: Next,
) -> Response {
    match sessions.resolve(request.headers(), request.uri()) {
        Some(session) => {
            request.extensions_mut().insert(CurrentSession(session));
            next.run(request).await
        }
        None => AppError::Unauthorized("Missing or expired session".to_string()).into_response(),
    }
}

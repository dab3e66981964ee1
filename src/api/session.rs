//! Session endpoints.

use axum::{
    extract::State,
    http::{HeaderMap, Uri},
    Json,
};
use serde::Serialize;

use super::{success, ApiResult};
use crate::auth::session_token;
use crate::errors::AppError;
use crate::models::Identity;
use crate::role::Role;
use crate::session::SignInMethod;
use crate::AppState;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub token: String,
    pub identity: Identity,
    pub role: Role,
    /// Seconds until the session expires, when the provider reports it
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    pub identity: Option<Identity>,
    pub role: Role,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOutResponse {
    pub signed_out: bool,
}

/// POST /api/session - Sign in or create an account.
pub async fn sign_in(
    State(state): State<AppState>,
    Json(method): Json<SignInMethod>,
) -> ApiResult<SignInResponse> {
    let new = state.sessions.sign_in(method).await?;
    let identity = new.grant.identity;

    success(SignInResponse {
        token: new.token,
        role: state.gate.role_of(Some(&identity)),
        expires_in: new.grant.expires_in.map(|ttl| ttl.as_secs()),
        identity,
    })
}

/// DELETE /api/session - Sign out. Succeeds for unknown or missing tokens too.
pub async fn sign_out(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> ApiResult<SignOutResponse> {
    if let Some(token) = session_token(&headers, &uri) {
        state.sessions.sign_out(&token);
    }
    success(SignOutResponse { signed_out: true })
}

/// GET /api/session - Current identity and role.
pub async fn get_session(
    State(state): State<AppState>,
    headers: HeaderMap,
    uri: Uri,
) -> ApiResult<SessionView> {
    let session = state
        .sessions
        .resolve(&headers, &uri)
        .ok_or_else(|| AppError::Unauthorized("Missing or expired session".to_string()))?;
    let identity = session.identity();
    success(SessionView {
        role: state.gate.role_of(identity.as_ref()),
        identity,
    })
}

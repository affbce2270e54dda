//! Auth gate: sessions issued and verified by the identity provider.
//!
//! [`IdentityProvider`] is the seam; [`gotrue::GoTrueClient`] implements it over the
//! `/auth/v1` REST API. Sessions are never persisted here; the access token travels
//! in a cookie and is re-verified on every request.

pub mod gotrue;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::config::AccessPolicy;

/// A logged-in user as seen by the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Session {
    #[serde(skip)]
    pub access_token: String,
    pub email: String,
}

/// Why a sign-in did not produce a session.
#[derive(Debug, thiserror::Error)]
pub enum SignInError {
    #[error("invalid login credentials")]
    InvalidCredentials,
    #[error(transparent)]
    Provider(#[from] anyhow::Error),
}

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SignInError>;

    /// Resolve a token to its session. `Ok(None)` for expired or unknown tokens.
    async fn verify(&self, access_token: &str) -> Result<Option<Session>>;

    async fn sign_out(&self, access_token: &str) -> Result<()>;
}

/// What an anonymous visitor may see.
pub fn can_search(policy: AccessPolicy, session: Option<&Session>) -> bool {
    match policy {
        AccessPolicy::UploadOnly => true,
        AccessPolicy::Everything => session.is_some(),
    }
}

/// Upload always needs a session.
pub fn can_upload(session: Option<&Session>) -> bool {
    session.is_some()
}

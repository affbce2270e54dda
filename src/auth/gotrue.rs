//! Identity provider client for the `/auth/v1` REST API.

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

use super::{IdentityProvider, Session, SignInError};
use crate::storage::supabase::ensure_success;

pub struct GoTrueClient {
    http: Client,
    base: Url,
    key: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    user: UserResponse,
}

#[derive(Debug, Deserialize)]
struct UserResponse {
    #[serde(default)]
    email: Option<String>,
}

impl GoTrueClient {
    pub fn new(base_url: &str, key: &str) -> Result<Self> {
        let base = Url::parse(base_url)
            .with_context(|| format!("invalid identity provider URL: {base_url}"))?;
        Ok(Self {
            http: Client::new(),
            base,
            key: key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("identity provider URL cannot be a base: {}", self.base))?
            .pop_if_empty()
            .extend(["auth", "v1", path]);
        Ok(url)
    }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, SignInError> {
        let mut url = self.endpoint("token")?;
        url.query_pairs_mut().append_pair("grant_type", "password");

        let response = self
            .http
            .post(url)
            .header("apikey", &self.key)
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await
            .context("sign-in request failed")?;

        // Wrong credentials come back as 400 invalid_grant.
        if matches!(
            response.status(),
            StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED
        ) {
            tracing::info!(email, "sign-in rejected");
            return Err(SignInError::InvalidCredentials);
        }

        let token: TokenResponse = ensure_success(response, "sign-in")
            .await?
            .json()
            .await
            .context("failed to parse sign-in response")?;

        tracing::info!(email, "signed in");
        Ok(Session {
            access_token: token.access_token,
            email: token.user.email.unwrap_or_else(|| email.to_string()),
        })
    }

    async fn verify(&self, access_token: &str) -> Result<Option<Session>> {
        let response = self
            .http
            .get(self.endpoint("user")?)
            .header("apikey", &self.key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("session verification request failed")?;

        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            tracing::debug!("session token rejected");
            return Ok(None);
        }

        let user: UserResponse = ensure_success(response, "session verification")
            .await?
            .json()
            .await
            .context("failed to parse user response")?;

        Ok(Some(Session {
            access_token: access_token.to_string(),
            email: user.email.unwrap_or_default(),
        }))
    }

    async fn sign_out(&self, access_token: &str) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint("logout")?)
            .header("apikey", &self.key)
            .bearer_auth(access_token)
            .send()
            .await
            .context("sign-out request failed")?;
        ensure_success(response, "sign-out").await?;
        Ok(())
    }
}

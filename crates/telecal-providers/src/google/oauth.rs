//! OAuth 2.0 authorization code flow with PKCE for Google APIs.
//!
//! The redirect URI points at the bot's own `/auth/callback` route, so the
//! consent page can be opened from any device and the code lands on the
//! server.

use std::time::Duration;

use serde::Deserialize;
use tracing::{debug, info};

use crate::auth::{OAuthGrant, PkceFlow};
use crate::credential::Credential;
use crate::error::{ProviderError, ProviderResult};
use crate::provider::BoxFuture;

use super::config::{GoogleConfig, OAuthCredentials};

/// Google OAuth endpoints.
const GOOGLE_AUTH_URL: &str = "https://accounts.google.com/o/oauth2/v2/auth";
const GOOGLE_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

/// OAuth client for Google APIs.
#[derive(Debug)]
pub struct OAuthClient {
    credentials: OAuthCredentials,
    redirect_uri: String,
    scopes: Vec<String>,
    http_client: reqwest::Client,
}

impl OAuthClient {
    pub fn new(config: &GoogleConfig) -> ProviderResult<Self> {
        let http_client = build_http_client(config.timeout, &config.user_agent)?;

        Ok(Self {
            credentials: config.credentials.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scopes: config.scopes.clone(),
            http_client,
        })
    }

    /// Posts a form to the token endpoint and decodes the response.
    async fn token_request(
        &self,
        params: &[(&str, &str)],
        what: &str,
    ) -> ProviderResult<TokenResponse> {
        let response = self
            .http_client
            .post(GOOGLE_TOKEN_URL)
            .form(params)
            .send()
            .await
            .map_err(|e| {
                ProviderError::network(format!("{} request failed: {}", what, e))
                    .with_provider("google")
            })?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProviderError::network(format!("failed to read response: {}", e)).with_provider("google")
        })?;

        if !status.is_success() {
            return Err(ProviderError::authentication(format!(
                "{} failed ({}): {}",
                what, status, body
            ))
            .with_provider("google"));
        }

        serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response(format!("invalid token response: {}", e))
                .with_provider("google")
        })
    }

    async fn refresh_token(&self, refresh_token: &str) -> ProviderResult<(String, Option<i64>)> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];

        let token = self.token_request(&params, "token refresh").await?;
        info!("successfully refreshed access token");
        Ok((token.access_token, token.expires_in))
    }

    async fn exchange(&self, code: &str, verifier: &str) -> ProviderResult<Credential> {
        let params = [
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("code", code),
            ("code_verifier", verifier),
            ("grant_type", "authorization_code"),
            ("redirect_uri", self.redirect_uri.as_str()),
        ];

        let token = self.token_request(&params, "token exchange").await?;
        info!("successfully obtained tokens");
        Ok(token.into_credential(&self.scopes))
    }
}

impl OAuthGrant for OAuthClient {
    fn scopes(&self) -> &[String] {
        &self.scopes
    }

    fn authorization_url(&self, flow: &PkceFlow) -> String {
        let scope = self.scopes.join(" ");
        let url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&\
            code_challenge={}&code_challenge_method=S256&state={}&\
            access_type=offline&prompt=consent&include_granted_scopes=true",
            GOOGLE_AUTH_URL,
            urlencoding::encode(&self.credentials.client_id),
            urlencoding::encode(&self.redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&flow.challenge),
            urlencoding::encode(&flow.state),
        );
        debug!("authorization URL: {}", url);
        url
    }

    fn refresh<'a>(
        &'a self,
        refresh_token: &'a str,
    ) -> BoxFuture<'a, ProviderResult<(String, Option<i64>)>> {
        Box::pin(self.refresh_token(refresh_token))
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        verifier: &'a str,
    ) -> BoxFuture<'a, ProviderResult<Credential>> {
        Box::pin(self.exchange(code, verifier))
    }
}

pub(super) fn build_http_client(timeout: Duration, user_agent: &str) -> ProviderResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .user_agent(user_agent)
        .build()
        .map_err(|e| {
            ProviderError::configuration(format!("failed to create HTTP client: {}", e))
                .with_source(e)
        })
}

/// Response from Google's token endpoint.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    /// Space separated scopes actually granted.
    #[serde(default)]
    scope: Option<String>,
}

impl TokenResponse {
    fn into_credential(self, requested: &[String]) -> Credential {
        let scopes = match self.scope {
            Some(granted) if !granted.trim().is_empty() => {
                granted.split_whitespace().map(str::to_string).collect()
            }
            _ => requested.to_vec(),
        };
        Credential::new(self.access_token, self.refresh_token, self.expires_in, scopes)
    }
}

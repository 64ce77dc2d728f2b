//! Provider endpoint configuration and the confidential-client token
//! exchanges.

use crate::errors::{OidcError, Result};
use crate::types::TokenResponse;
use reqwest::Client;
use std::collections::HashMap;
use url::Url;

/// Immutable provider settings handed to every component at construction.
///
/// The endpoint set is explicit so deployments and tests can point at any
/// conformant provider; [`ProviderConfig::cognito`] derives the well-known
/// Cognito shapes from a region, user pool id, and Hosted UI domain.
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub scopes: Vec<String>,
    /// Where the provider sends the browser after its own logout.
    pub logout_redirect_uri: String,
    /// Well-known issuer URL, matched against the `iss` claim.
    pub issuer: String,
    pub authorize_url: String,
    pub token_url: String,
    pub logout_url: String,
    pub jwks_url: String,
}

impl ProviderConfig {
    /// Endpoint set for a Cognito user pool with a Hosted UI domain, e.g.
    /// `myapp.auth.ap-northeast-1.amazoncognito.com`.
    #[allow(clippy::too_many_arguments)]
    pub fn cognito(
        region: &str,
        user_pool_id: &str,
        domain: &str,
        client_id: String,
        client_secret: String,
        redirect_uri: String,
        logout_redirect_uri: String,
    ) -> Self {
        let issuer = format!("https://cognito-idp.{region}.amazonaws.com/{user_pool_id}");
        Self {
            client_id,
            client_secret,
            redirect_uri,
            scopes: vec![
                "openid".to_string(),
                "email".to_string(),
                "profile".to_string(),
            ],
            logout_redirect_uri,
            jwks_url: format!("{issuer}/.well-known/jwks.json"),
            issuer,
            authorize_url: format!("https://{domain}/oauth2/authorize"),
            token_url: format!("https://{domain}/oauth2/token"),
            logout_url: format!("https://{domain}/logout"),
        }
    }
}

/// Client for the provider's OAuth endpoints.
///
/// Holds the confidential client secret; the code exchange is the dual-proof
/// step where the secret proves the caller is the legitimate client and the
/// PKCE verifier proves it initiated this specific authorization request.
/// Neither proof alone is sufficient.
pub struct ProviderClient {
    http: Client,
    config: ProviderConfig,
}

impl ProviderClient {
    pub fn new(http: Client, config: ProviderConfig) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Authorization endpoint URL carrying the code response type, PKCE
    /// challenge, state, and nonce. Pure URL assembly, no network.
    pub fn build_authorize_url(
        &self,
        code_challenge: &str,
        state: &str,
        nonce: &str,
    ) -> Result<String> {
        let mut url = Url::parse(&self.config.authorize_url)
            .map_err(|e| OidcError::ConfigurationInvalid(format!("invalid auth URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", &self.config.redirect_uri)
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("code_challenge_method", "S256")
            .append_pair("code_challenge", code_challenge)
            .append_pair("state", state)
            .append_pair("nonce", nonce);

        Ok(url.to_string())
    }

    /// Exchange an authorization code for tokens. Not retried: a used code
    /// is guaranteed to fail again.
    pub async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<TokenResponse> {
        let mut params = HashMap::new();
        params.insert("grant_type", "authorization_code");
        params.insert("client_id", self.config.client_id.as_str());
        params.insert("client_secret", self.config.client_secret.as_str());
        params.insert("code", code);
        params.insert("redirect_uri", self.config.redirect_uri.as_str());
        params.insert("code_verifier", code_verifier);

        self.token_request(params).await
    }

    /// Obtain a fresh access/ID token pair. The response carries no new
    /// refresh token; callers keep reusing the one they already hold.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse> {
        let mut params = HashMap::new();
        params.insert("grant_type", "refresh_token");
        params.insert("client_id", self.config.client_id.as_str());
        params.insert("client_secret", self.config.client_secret.as_str());
        params.insert("refresh_token", refresh_token);

        self.token_request(params).await
    }

    /// Provider logout URL. Redirecting the browser there invalidates the
    /// Hosted UI's own session cookie.
    pub fn build_logout_url(&self) -> Result<String> {
        let mut url = Url::parse(&self.config.logout_url)
            .map_err(|e| OidcError::ConfigurationInvalid(format!("invalid logout URL: {e}")))?;

        url.query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("logout_uri", &self.config.logout_redirect_uri);

        Ok(url.to_string())
    }

    async fn token_request(&self, params: HashMap<&str, &str>) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(OidcError::ExchangeFailed { status, body });
        }

        Ok(response.json().await?)
    }
}

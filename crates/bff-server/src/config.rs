//! Environment-driven server configuration.

use anyhow::{bail, Context, Result};
use bff_oidc::ProviderConfig;
use bff_store::StoreBackend;
use std::env;
use std::net::SocketAddr;
use url::Url;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub region: String,
    pub user_pool_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub cognito_domain: String,
    /// Where Cognito redirects the browser after login; must match a
    /// callback URL registered on the app client.
    pub redirect_uri: String,
    /// Exact origin of the SPA. Used for CORS and post-login redirects.
    pub frontend_origin: String,
    /// Where Cognito sends the browser after its own logout.
    pub logout_uri: String,
    pub secure_cookies: bool,
    /// SameSite=None cookies for deployments where the SPA and the BFF live
    /// on different sites. Forces the Secure attribute.
    pub cross_site_cookies: bool,
    pub store_backend: StoreBackend,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let region = require("COGNITO_REGION")?;
        let user_pool_id = require("COGNITO_USER_POOL_ID")?;
        let client_id = require("COGNITO_CLIENT_ID")?;
        let client_secret = require("COGNITO_CLIENT_SECRET")?;
        let cognito_domain = require("COGNITO_DOMAIN")?;

        let bind_address = env_or("BIND_ADDRESS", "127.0.0.1:3000")
            .parse()
            .context("invalid BIND_ADDRESS")?;

        let frontend_origin = env_or("FRONTEND_ORIGIN", "http://localhost:5173");
        Url::parse(&frontend_origin).context("invalid FRONTEND_ORIGIN")?;

        let redirect_uri = env_or("REDIRECT_URI", "http://localhost:3000/callback");
        let logout_uri = env::var("LOGOUT_URI").unwrap_or_else(|_| frontend_origin.clone());

        let store_backend = match env_or("SESSION_STORE", "memory").as_str() {
            "memory" => StoreBackend::Memory,
            "redis" => StoreBackend::Redis {
                url: require("REDIS_URL")?,
            },
            other => bail!("unknown SESSION_STORE {other:?}, expected \"memory\" or \"redis\""),
        };

        Ok(Self {
            bind_address,
            region,
            user_pool_id,
            client_id,
            client_secret,
            cognito_domain,
            redirect_uri,
            frontend_origin,
            logout_uri,
            secure_cookies: env_flag("SECURE_COOKIES", false),
            cross_site_cookies: env_flag("CROSS_SITE_COOKIES", false),
            store_backend,
        })
    }

    pub fn provider_config(&self) -> ProviderConfig {
        ProviderConfig::cognito(
            &self.region,
            &self.user_pool_id,
            &self.cognito_domain,
            self.client_id.clone(),
            self.client_secret.clone(),
            self.redirect_uri.clone(),
            self.logout_uri.clone(),
        )
    }
}

fn require(name: &str) -> Result<String> {
    env::var(name).with_context(|| format!("missing required environment variable {name}"))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .map(|v| matches!(v.as_str(), "1" | "true" | "yes"))
        .unwrap_or(default)
}

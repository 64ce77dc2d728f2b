//! JWT verification against the user pool's published key set.
//!
//! The JWKS is fetched lazily and cached for the process lifetime with a
//! one-hour refresh window. An unknown `kid` or a signature failure triggers
//! exactly one forced refetch to cover key rotation; nothing else is retried.
//! Concurrent first use is idempotent: racing fetches write the same content
//! and the last one wins.

use crate::errors::{OidcError, Result};
use crate::provider::ProviderConfig;
use crate::types::{AccessTokenClaims, IdTokenClaims, JwkSet};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::sync::RwLock;

const JWKS_CACHE_TTL_SECS: u64 = 3600;

fn current_timestamp() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

struct CachedJwks {
    keys: JwkSet,
    fetched_at: u64,
}

pub struct TokenVerifier {
    http: Client,
    jwks_url: String,
    issuer: String,
    client_id: String,
    cache: RwLock<Option<CachedJwks>>,
}

impl TokenVerifier {
    pub fn new(http: Client, config: &ProviderConfig) -> Self {
        Self {
            http,
            jwks_url: config.jwks_url.clone(),
            issuer: config.issuer.clone(),
            client_id: config.client_id.clone(),
            cache: RwLock::new(None),
        }
    }

    /// Verify an ID token: signature, expiry, issuer, audience, and
    /// `token_use == "id"`.
    ///
    /// `expected_nonce` is supplied only on the callback path. A mismatch is
    /// a replay signal and fails closed; re-verification later without an
    /// expected nonce skips the check.
    pub async fn verify_id_token(
        &self,
        token: &str,
        expected_nonce: Option<&str>,
    ) -> Result<IdTokenClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.client_id]);
        validation.leeway = 60;

        let claims: IdTokenClaims = self.decode_verified(token, &validation).await?;

        if claims.token_use != "id" {
            return Err(OidcError::TokenInvalid(format!(
                "expected token_use \"id\", got \"{}\"",
                claims.token_use
            )));
        }

        if let Some(expected) = expected_nonce {
            match claims.nonce.as_deref() {
                Some(nonce) if nonce == expected => {}
                _ => {
                    return Err(OidcError::TokenInvalid(
                        "nonce mismatch, possible ID token replay".to_string(),
                    ))
                }
            }
        }

        Ok(claims)
    }

    /// Verify an access token: signature, expiry, issuer, and
    /// `token_use == "access"`. Cognito access tokens carry no `aud` claim,
    /// so audience is deliberately not checked.
    pub async fn verify_access_token(&self, token: &str) -> Result<AccessTokenClaims> {
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_issuer(&[&self.issuer]);
        validation.validate_aud = false;
        validation.leeway = 60;

        let claims: AccessTokenClaims = self.decode_verified(token, &validation).await?;

        if claims.token_use != "access" {
            return Err(OidcError::TokenInvalid(format!(
                "expected token_use \"access\", got \"{}\"",
                claims.token_use
            )));
        }

        Ok(claims)
    }

    async fn decode_verified<C: DeserializeOwned>(
        &self,
        token: &str,
        validation: &Validation,
    ) -> Result<C> {
        let header = decode_header(token)
            .map_err(|e| OidcError::TokenInvalid(format!("malformed token header: {e}")))?;

        if header.alg != Algorithm::RS256 {
            return Err(OidcError::TokenInvalid(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }

        let kid = header
            .kid
            .ok_or_else(|| OidcError::TokenInvalid("missing kid in token header".to_string()))?;

        let mut force_refresh = false;
        loop {
            let jwks = self.jwks(force_refresh).await?;

            let Some(jwk) = jwks.find_key(&kid) else {
                if force_refresh {
                    return Err(OidcError::TokenInvalid(format!(
                        "no published key matches kid {kid}"
                    )));
                }
                // Possible key rotation; refetch once.
                force_refresh = true;
                continue;
            };

            let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
                .map_err(|e| OidcError::JwksFetch(format!("invalid RSA key material: {e}")))?;

            match decode::<C>(token, &key, validation) {
                Ok(data) => return Ok(data.claims),
                Err(e) if !force_refresh && matches!(e.kind(), ErrorKind::InvalidSignature) => {
                    tracing::debug!(%kid, "signature failed against cached JWKS, refetching");
                    force_refresh = true;
                }
                Err(e) => {
                    return Err(OidcError::TokenInvalid(format!("verification failed: {e}")))
                }
            }
        }
    }

    async fn jwks(&self, force_refresh: bool) -> Result<JwkSet> {
        if !force_refresh {
            let cache = self.cache.read().await;
            if let Some(cached) = cache.as_ref() {
                if cached.fetched_at + JWKS_CACHE_TTL_SECS > current_timestamp() {
                    return Ok(cached.keys.clone());
                }
            }
        }

        let keys: JwkSet = self
            .http
            .get(&self.jwks_url)
            .send()
            .await
            .map_err(|e| OidcError::JwksFetch(e.to_string()))?
            .json()
            .await
            .map_err(|e| OidcError::JwksFetch(e.to_string()))?;

        let mut cache = self.cache.write().await;
        *cache = Some(CachedJwks {
            keys: keys.clone(),
            fetched_at: current_timestamp(),
        });

        Ok(keys)
    }
}

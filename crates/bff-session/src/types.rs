use bff_oidc::{AccessTokenClaims, IdTokenClaims};
use serde::{Deserialize, Serialize};

/// Token material held server-side for one session. Opaque strings as far as
/// this crate is concerned; never serialized into any browser-facing
/// response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionTokens {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
}

/// Everything stored for an authenticated session: raw tokens plus the
/// verified claim sets they carried. The creation instant lives in the store
/// envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub tokens: SessionTokens,
    pub id_token_claims: IdTokenClaims,
    pub access_token_claims: AccessTokenClaims,
}

/// One in-flight login attempt, keyed by its `state` parameter: the PKCE
/// verifier to redeem the authorization code with, and the nonce the ID
/// token must echo back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAuthorization {
    pub code_verifier: String,
    pub nonce: String,
}
